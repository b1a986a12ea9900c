//! Pronunciation practice session and score feedback bands.

use thiserror::Error;

use crate::model::{LevelId, PronunciationItem};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("level has no pronunciation items")]
    Empty,

    #[error("practice session finished")]
    Finished,

    #[error("score {0} is out of range 0..=100")]
    ScoreOutOfRange(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeState {
    AtWord(usize),
    Finished,
}

/// Message band for a 0..=100 pronunciation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PronunciationFeedback {
    Excellent,
    Good,
    KeepPracticing,
    TryAgain,
}

impl PronunciationFeedback {
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => Self::Excellent,
            75..=89 => Self::Good,
            60..=74 => Self::KeepPracticing,
            _ => Self::TryAgain,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent pronunciation!",
            Self::Good => "Good job, almost there.",
            Self::KeepPracticing => "Keep practicing.",
            Self::TryAgain => "Try again.",
        }
    }
}

/// Steps through a level's words. Scoring happens outside, through an injected scorer.
#[derive(Debug, Clone)]
pub struct PronunciationSession {
    level_id: LevelId,
    items: Vec<PronunciationItem>,
    state: PracticeState,
}

impl PronunciationSession {
    /// # Errors
    ///
    /// Returns `PracticeError::Empty` if the level has no words to practice.
    pub fn new(level_id: LevelId, items: Vec<PronunciationItem>) -> Result<Self, PracticeError> {
        if items.is_empty() {
            return Err(PracticeError::Empty);
        }
        Ok(Self {
            level_id,
            items,
            state: PracticeState::AtWord(0),
        })
    }

    #[must_use]
    pub fn level_id(&self) -> LevelId {
        self.level_id
    }

    #[must_use]
    pub fn state(&self) -> PracticeState {
        self.state
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn current(&self) -> Option<&PronunciationItem> {
        match self.state {
            PracticeState::AtWord(i) => self.items.get(i),
            PracticeState::Finished => None,
        }
    }

    /// Advance to the next word, or finish after the last one.
    pub fn next(&mut self) -> PracticeState {
        if let PracticeState::AtWord(i) = self.state {
            self.state = if i + 1 < self.items.len() {
                PracticeState::AtWord(i + 1)
            } else {
                PracticeState::Finished
            };
        }
        self.state
    }

    /// Step back one word. No-op on the first word and once finished.
    pub fn previous(&mut self) -> PracticeState {
        if let PracticeState::AtWord(i) = self.state {
            if i > 0 {
                self.state = PracticeState::AtWord(i - 1);
            }
        }
        self.state
    }

    pub fn restart(&mut self) {
        self.state = PracticeState::AtWord(0);
    }
}
