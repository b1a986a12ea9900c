//! Level completion and unlocking.

use std::collections::BTreeSet;

use crate::model::{LevelId, UserProgress};

/// New values for the two gated fields, to be written together in one patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub level_id: LevelId,
    pub completed_levels: BTreeSet<LevelId>,
    pub current_level: LevelId,
    /// False on a replay of a level already in `completed_levels`.
    pub newly_completed: bool,
    /// The level that became reachable, if the gate moved.
    pub unlocked: Option<LevelId>,
}

impl CompletionOutcome {
    /// True when applying this outcome would not change the stored record.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.newly_completed && self.unlocked.is_none()
    }
}

/// Whether `level_id` is within the learner's gate.
#[must_use]
pub fn can_open(progress: &UserProgress, level_id: LevelId) -> bool {
    level_id.value() >= 1 && level_id <= progress.current_level()
}

/// Apply the completion rule for `level_id`.
///
/// The level joins `completed_levels` if absent. The gate advances by one only
/// when the learner finished exactly the level they were gated on; replays of
/// earlier levels leave it alone.
#[must_use]
pub fn complete_level(progress: &UserProgress, level_id: LevelId) -> CompletionOutcome {
    let mut completed_levels = progress.completed_levels().clone();
    let newly_completed = completed_levels.insert(level_id);

    let (current_level, unlocked) = if level_id == progress.current_level() {
        let next = progress.current_level().next();
        (next, Some(next))
    } else {
        (progress.current_level(), None)
    };

    CompletionOutcome {
        level_id,
        completed_levels,
        current_level,
        newly_completed,
        unlocked,
    }
}
