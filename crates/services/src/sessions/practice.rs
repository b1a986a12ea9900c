use std::sync::Arc;
use std::time::Duration;

use lingo_core::model::{LearnerId, LevelId};
use lingo_core::progression::can_open;
use lingo_core::pronunciation::{PracticeError, PronunciationFeedback, PronunciationSession};
use tracing::{debug, info, warn};

use crate::error::{PracticeServiceError, ScoringError};
use crate::level_service::LevelService;
use crate::progress_service::ProgressService;
use crate::speech::{AudioClip, PronunciationScorer};

/// Score and feedback for one recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PracticeAttempt {
    pub score: u8,
    pub feedback: PronunciationFeedback,
}

/// Starts pronunciation practice and scores recordings through the injected scorer.
#[derive(Clone)]
pub struct PracticeService {
    levels: Arc<LevelService>,
    progress: Arc<ProgressService>,
    scorer: Arc<dyn PronunciationScorer>,
    scoring_timeout: Duration,
}

impl PracticeService {
    pub const DEFAULT_SCORING_TIMEOUT: Duration = Duration::from_secs(10);

    #[must_use]
    pub fn new(
        levels: Arc<LevelService>,
        progress: Arc<ProgressService>,
        scorer: Arc<dyn PronunciationScorer>,
    ) -> Self {
        Self {
            levels,
            progress,
            scorer,
            scoring_timeout: Self::DEFAULT_SCORING_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_scoring_timeout(mut self, timeout: Duration) -> Self {
        self.scoring_timeout = timeout;
        self
    }

    /// # Errors
    ///
    /// Returns `PracticeServiceError::Locked` above the gate, `Practice(Empty)`
    /// for a level without words, or a store error.
    pub async fn start_practice(
        &self,
        learner: LearnerId,
        level_id: LevelId,
    ) -> Result<PronunciationSession, PracticeServiceError> {
        let progress = self.progress.load(learner).await?;
        if !can_open(&progress, level_id) {
            return Err(PracticeServiceError::Locked {
                level: level_id,
                current: progress.current_level(),
            });
        }

        let level = self.levels.get_level(level_id).await?;
        let session = PronunciationSession::new(level.id, level.pronunciations)?;
        info!(%learner, level = %level_id, words = session.len(), "practice started");
        Ok(session)
    }

    /// Score a recording of the session's current word.
    ///
    /// # Errors
    ///
    /// Returns `Practice(Finished)` once the session is over, `ScoreOutOfRange`
    /// if the scorer misbehaves, or the scorer's own error. A scorer that does
    /// not answer within the scoring timeout yields a retryable
    /// `ScoringError::Backend`.
    pub async fn record(
        &self,
        session: &PronunciationSession,
        recording: &AudioClip,
    ) -> Result<PracticeAttempt, PracticeServiceError> {
        let item = session.current().ok_or(PracticeError::Finished)?;
        let score = match tokio::time::timeout(
            self.scoring_timeout,
            self.scorer.score(item, recording),
        )
        .await
        {
            Ok(scored) => scored?,
            Err(_) => {
                warn!(word = %item.word, timeout = ?self.scoring_timeout, "pronunciation scoring timed out");
                return Err(ScoringError::Backend(format!(
                    "scoring timed out after {:?}",
                    self.scoring_timeout
                ))
                .into());
            }
        };
        if score > 100 {
            return Err(PracticeError::ScoreOutOfRange(score).into());
        }
        let feedback = PronunciationFeedback::from_score(score);
        debug!(word = %item.word, score, ?feedback, "recording scored");
        Ok(PracticeAttempt { score, feedback })
    }
}
