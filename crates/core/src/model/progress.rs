use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LearnerId, LevelId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("current level must be >= 1, got {0}")]
    InvalidCurrentLevel(u32),
}

//
// ─── USER PROGRESS ─────────────────────────────────────────────────────────────
//

/// Per-learner progression record.
///
/// `current_level` is the gate: the next level the learner is expected to attempt.
/// It and `completed_levels` only grow, except through [`UserProgress::reset_to_defaults`].
/// `version` is the optimistic-concurrency token maintained by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    learner_id: LearnerId,
    streak: u32,
    last_access_at: DateTime<Utc>,
    current_level: LevelId,
    completed_levels: BTreeSet<LevelId>,
    achievements: BTreeSet<String>,
    version: u64,
}

impl UserProgress {
    /// Signup state: zeroed counters, gated on level 1.
    #[must_use]
    pub fn new(learner_id: LearnerId, now: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            streak: 0,
            last_access_at: now,
            current_level: LevelId::FIRST,
            completed_levels: BTreeSet::new(),
            achievements: BTreeSet::new(),
            version: 0,
        }
    }

    /// Rehydrate a progress record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidCurrentLevel` if `current_level` is 0.
    pub fn from_persisted(
        learner_id: LearnerId,
        streak: u32,
        last_access_at: DateTime<Utc>,
        current_level: LevelId,
        completed_levels: BTreeSet<LevelId>,
        achievements: BTreeSet<String>,
        version: u64,
    ) -> Result<Self, ProgressError> {
        if current_level.value() == 0 {
            return Err(ProgressError::InvalidCurrentLevel(0));
        }
        Ok(Self {
            learner_id,
            streak,
            last_access_at,
            current_level,
            completed_levels,
            achievements,
            version,
        })
    }

    /// Defaults for the same learner, keeping the version so the store can guard the write.
    #[must_use]
    pub fn reset_to_defaults(&self, now: DateTime<Utc>) -> Self {
        Self {
            version: self.version,
            ..Self::new(self.learner_id, now)
        }
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[must_use]
    pub fn last_access_at(&self) -> DateTime<Utc> {
        self.last_access_at
    }

    #[must_use]
    pub fn current_level(&self) -> LevelId {
        self.current_level
    }

    #[must_use]
    pub fn completed_levels(&self) -> &BTreeSet<LevelId> {
        &self.completed_levels
    }

    #[must_use]
    pub fn achievements(&self) -> &BTreeSet<String> {
        &self.achievements
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn has_completed(&self, level_id: LevelId) -> bool {
        self.completed_levels.contains(&level_id)
    }

    /// Applies a streak patch. Used by storage adapters after the version check passed.
    pub fn set_streak(&mut self, streak: u32, last_access_at: DateTime<Utc>) {
        self.streak = streak;
        self.last_access_at = last_access_at;
    }

    /// Applies a completion patch. Neither field is allowed to move backwards.
    pub fn set_completion(&mut self, completed_levels: BTreeSet<LevelId>, current_level: LevelId) {
        self.completed_levels.extend(completed_levels);
        self.current_level = self.current_level.max(current_level);
    }

    /// Merges earned badges; the set never shrinks outside of a reset.
    pub fn add_achievements<I>(&mut self, badges: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.achievements.extend(badges);
    }

    /// Bumps the version after a successful write.
    pub fn bump_version(&mut self) {
        self.version = self.version.saturating_add(1);
    }
}
