use std::time::Duration;

use async_trait::async_trait;
use lingo_core::model::PronunciationItem;
use rand::{Rng, rng};

use super::{AudioClip, PronunciationScorer};
use crate::error::ScoringError;

/// Placeholder scorer: waits as if analysing, then returns a score in 60..=100.
///
/// It does not look at the audio beyond rejecting an empty recording.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedScorer {
    delay: Duration,
}

impl Default for SimulatedScorer {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
        }
    }
}

impl SimulatedScorer {
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl PronunciationScorer for SimulatedScorer {
    async fn score(
        &self,
        item: &PronunciationItem,
        recording: &AudioClip,
    ) -> Result<u8, ScoringError> {
        if recording.is_empty() {
            return Err(ScoringError::EmptyRecording);
        }
        tokio::time::sleep(self.delay).await;
        let score = rng().random_range(60..=100);
        tracing::debug!(word = %item.word, score, "simulated pronunciation score");
        Ok(score)
    }
}

/// Always returns the same score.
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer(pub u8);

#[async_trait]
impl PronunciationScorer for FixedScorer {
    async fn score(
        &self,
        _item: &PronunciationItem,
        recording: &AudioClip,
    ) -> Result<u8, ScoringError> {
        if recording.is_empty() {
            return Err(ScoringError::EmptyRecording);
        }
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> AudioClip {
        AudioClip::new(vec![1, 2, 3], "audio/wav")
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_scores_stay_in_band() {
        let scorer = SimulatedScorer::default();
        let item = PronunciationItem::default();
        for _ in 0..50 {
            let score = scorer.score(&item, &clip()).await.unwrap();
            assert!((60..=100).contains(&score));
        }
    }

    #[tokio::test]
    async fn empty_recording_is_rejected() {
        let scorer = SimulatedScorer::with_delay(Duration::ZERO);
        let err = scorer
            .score(&PronunciationItem::default(), &AudioClip::new(Vec::new(), "audio/wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::EmptyRecording));
    }
}
