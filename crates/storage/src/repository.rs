use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lingo_core::model::{LearnerId, Level, LevelId, UserProgress};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// The record changed since it was read (version mismatch) or already exists.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// An atomic multi-field update of a progress record.
///
/// Each variant is written as a whole or not at all; fields are never written
/// independently of their partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressPatch {
    Streak {
        streak: u32,
        last_access_at: DateTime<Utc>,
        achievements: BTreeSet<String>,
    },
    Completion {
        completed_levels: BTreeSet<LevelId>,
        current_level: LevelId,
        achievements: BTreeSet<String>,
    },
    /// Back to signup defaults.
    Reset { now: DateTime<Utc> },
}

impl ProgressPatch {
    /// Apply the patch to an in-memory record and bump its version.
    pub fn apply_to(self, progress: &mut UserProgress) {
        match self {
            ProgressPatch::Streak {
                streak,
                last_access_at,
                achievements,
            } => {
                progress.set_streak(streak, last_access_at);
                progress.add_achievements(achievements);
            }
            ProgressPatch::Completion {
                completed_levels,
                current_level,
                achievements,
            } => {
                progress.set_completion(completed_levels, current_level);
                progress.add_achievements(achievements);
            }
            ProgressPatch::Reset { now } => {
                *progress = progress.reset_to_defaults(now);
            }
        }
        progress.bump_version();
    }
}

/// Repository contract for learner progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Full write of a brand-new record. Only used at signup.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the learner already has a record.
    async fn insert_progress(&self, progress: &UserProgress) -> Result<(), StorageError>;

    /// Fetch a learner's progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_progress(&self, learner: LearnerId) -> Result<Option<UserProgress>, StorageError>;

    /// Apply `patch` only if the stored version still equals `expected_version`.
    ///
    /// Returns the record as stored after the write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the learner has no record and
    /// `StorageError::Conflict` if the version moved.
    async fn apply_patch(
        &self,
        learner: LearnerId,
        expected_version: u64,
        patch: ProgressPatch,
    ) -> Result<UserProgress, StorageError>;
}

/// Repository contract for curriculum content.
#[async_trait]
pub trait LevelRepository: Send + Sync {
    /// Persist or replace a level.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the level cannot be stored.
    async fn upsert_level(&self, level: &Level) -> Result<(), StorageError>;

    /// Fetch a level by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_level(&self, id: LevelId) -> Result<Option<Level>, StorageError>;

    /// List levels ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_levels(&self) -> Result<Vec<Level>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<LearnerId, UserProgress>>>,
    levels: Arc<Mutex<BTreeMap<LevelId, Level>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn insert_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(&progress.learner_id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(progress.learner_id(), progress.clone());
        Ok(())
    }

    async fn get_progress(&self, learner: LearnerId) -> Result<Option<UserProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&learner).cloned())
    }

    async fn apply_patch(
        &self,
        learner: LearnerId,
        expected_version: u64,
        patch: ProgressPatch,
    ) -> Result<UserProgress, StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let stored = guard.get_mut(&learner).ok_or(StorageError::NotFound)?;
        if stored.version() != expected_version {
            return Err(StorageError::Conflict);
        }
        patch.apply_to(stored);
        Ok(stored.clone())
    }
}

#[async_trait]
impl LevelRepository for InMemoryRepository {
    async fn upsert_level(&self, level: &Level) -> Result<(), StorageError> {
        let mut guard = self
            .levels
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(level.id, level.clone());
        Ok(())
    }

    async fn get_level(&self, id: LevelId) -> Result<Option<Level>, StorageError> {
        let guard = self
            .levels
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_levels(&self) -> Result<Vec<Level>, StorageError> {
        let guard = self
            .levels
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.values().cloned().collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub levels: Arc<dyn LevelRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let levels: Arc<dyn LevelRepository> = Arc::new(repo);
        Self { progress, levels }
    }
}
