//! Speech boundary: synthesis, playback and pronunciation scoring.
//!
//! Each capability is a trait so the services can run against HTTP backends,
//! local devices, or test doubles.

mod narrator;
mod scorer;
mod tts;

use async_trait::async_trait;
use lingo_core::model::PronunciationItem;

use crate::error::{ScoringError, SpeechError};

pub use narrator::Narrator;
pub use scorer::{FixedScorer, SimulatedScorer};
pub use tts::HttpSpeechSynthesizer;

/// Encoded audio plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl AudioClip {
    #[must_use]
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Turns text into spoken audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, SpeechError>;
}

/// Plays audio on some output. `play` replaces anything already playing.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, clip: &AudioClip) -> Result<(), SpeechError>;
    fn stop(&self);
}

/// Scores a learner's recording of one pronunciation item, 0..=100.
#[async_trait]
pub trait PronunciationScorer: Send + Sync {
    async fn score(&self, item: &PronunciationItem, recording: &AudioClip)
    -> Result<u8, ScoringError>;
}
