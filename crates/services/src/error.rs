//! Shared error types for the services crate.
//!
//! Nothing here is fatal to the caller: every variant maps to a user-facing
//! notice, and `is_retryable` tells the UI whether to offer a retry.

use std::time::Duration;

use thiserror::Error;

use lingo_core::model::LevelId;
use lingo_core::pronunciation::PracticeError;
use lingo_core::quiz::QuizError;
use storage::repository::StorageError;
use storage::seed::SeedError;
use storage::sqlite::SqliteInitError;

/// A store call that failed or did not answer in time.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StoreError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout(_)
                | StoreError::Storage(StorageError::Connection(_) | StorageError::Conflict)
        )
    }
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("learner has no progress record")]
    NoProgress,
    #[error("learner already signed up")]
    AlreadySignedUp,
    #[error("progress kept changing underneath us after {attempts} attempts")]
    Contended { attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProgressServiceError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ProgressServiceError::Contended { .. } => true,
            ProgressServiceError::Store(e) => e.is_retryable(),
            ProgressServiceError::NoProgress | ProgressServiceError::AlreadySignedUp => false,
        }
    }
}

/// Errors emitted by `LevelService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LevelServiceError {
    #[error("level {0} not found")]
    NotFound(LevelId),
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LevelServiceError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            LevelServiceError::Store(e) => e.is_retryable(),
            LevelServiceError::NotFound(_) | LevelServiceError::Seed(_) => false,
        }
    }
}

/// Errors emitted by the quiz loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("level {level} is locked (current level is {current})")]
    Locked { level: LevelId, current: LevelId },
    #[error("quiz is not finished yet")]
    NotCompleted,
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Level(#[from] LevelServiceError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
}

impl QuizServiceError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            QuizServiceError::Level(e) => e.is_retryable(),
            QuizServiceError::Progress(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Errors emitted by the pronunciation practice loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeServiceError {
    #[error("level {level} is locked (current level is {current})")]
    Locked { level: LevelId, current: LevelId },
    #[error(transparent)]
    Practice(#[from] PracticeError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Level(#[from] LevelServiceError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
}

impl PracticeServiceError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            PracticeServiceError::Scoring(ScoringError::Backend(_)) => true,
            PracticeServiceError::Level(e) => e.is_retryable(),
            PracticeServiceError::Progress(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Errors emitted by a `PronunciationScorer`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScoringError {
    #[error("recording is empty")]
    EmptyRecording,
    #[error("scoring backend failed: {0}")]
    Backend(String),
}

/// Errors emitted by speech synthesis and playback.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpeechError {
    #[error("text-to-speech is not configured")]
    Disabled,
    #[error("nothing to say")]
    EmptyText,
    #[error("text-to-speech returned no audio")]
    EmptyAudio,
    #[error("text-to-speech request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("audio playback failed: {0}")]
    Playback(String),
}

impl SpeechError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SpeechError::Http(e) => e.is_timeout() || e.is_connect(),
            SpeechError::HttpStatus(status) => status.is_server_error() || status.as_u16() == 429,
            SpeechError::EmptyAudio | SpeechError::Playback(_) => true,
            SpeechError::Disabled | SpeechError::EmptyText => false,
        }
    }
}

/// Errors emitted by `TutorChatService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatError {
    #[error("tutor chat is not configured")]
    Disabled,
    #[error("conversation is empty")]
    EmptyConversation,
    #[error("tutor chat returned an empty response")]
    EmptyResponse,
    #[error("tutor chat request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ChatError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Http(e) => e.is_timeout() || e.is_connect(),
            ChatError::HttpStatus(status) => status.is_server_error() || status.as_u16() == 429,
            ChatError::EmptyResponse => true,
            ChatError::Disabled | ChatError::EmptyConversation => false,
        }
    }
}

/// Errors while reading configuration from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {raw:?}")]
    InvalidNumber { var: &'static str, raw: String },
    #[error("{var} is not a valid URL: {raw:?}")]
    InvalidUrl { var: &'static str, raw: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Speech(#[from] SpeechError),
    #[error(transparent)]
    Chat(#[from] ChatError),
}
