//! Badge rules.
//!
//! Badges are earned from the progress record itself plus the event that just
//! happened, and are stored by their string id in `UserProgress::achievements`.

use std::collections::BTreeSet;

use crate::model::UserProgress;
use crate::quiz::QuizResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Badge {
    FirstSteps,
    FiveLevels,
    TenLevels,
    Streak3,
    Streak7,
    Streak30,
    PerfectQuiz,
}

impl Badge {
    pub const ALL: [Badge; 7] = [
        Badge::FirstSteps,
        Badge::FiveLevels,
        Badge::TenLevels,
        Badge::Streak3,
        Badge::Streak7,
        Badge::Streak30,
        Badge::PerfectQuiz,
    ];

    /// Stable identifier persisted in the achievements set.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Badge::FirstSteps => "first_steps",
            Badge::FiveLevels => "five_levels",
            Badge::TenLevels => "ten_levels",
            Badge::Streak3 => "streak_3",
            Badge::Streak7 => "streak_7",
            Badge::Streak30 => "streak_30",
            Badge::PerfectQuiz => "perfect_quiz",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Badge::FirstSteps => "First Steps",
            Badge::FiveLevels => "Getting Serious",
            Badge::TenLevels => "Dedicated Learner",
            Badge::Streak3 => "On Fire",
            Badge::Streak7 => "Week Warrior",
            Badge::Streak30 => "Monthly Master",
            Badge::PerfectQuiz => "Flawless",
        }
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.id() == id)
    }
}

/// What just happened to the learner.
#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    Visit { streak: u32 },
    Completion {
        completed_count: usize,
        result: Option<&'a QuizResult>,
    },
}

fn qualifies(badge: Badge, event: &ProgressEvent<'_>) -> bool {
    match (badge, event) {
        (Badge::Streak3, ProgressEvent::Visit { streak }) => *streak >= 3,
        (Badge::Streak7, ProgressEvent::Visit { streak }) => *streak >= 7,
        (Badge::Streak30, ProgressEvent::Visit { streak }) => *streak >= 30,
        (Badge::FirstSteps, ProgressEvent::Completion { completed_count, .. }) => {
            *completed_count >= 1
        }
        (Badge::FiveLevels, ProgressEvent::Completion { completed_count, .. }) => {
            *completed_count >= 5
        }
        (Badge::TenLevels, ProgressEvent::Completion { completed_count, .. }) => {
            *completed_count >= 10
        }
        (Badge::PerfectQuiz, ProgressEvent::Completion { result, .. }) => {
            result.is_some_and(QuizResult::is_perfect)
        }
        _ => false,
    }
}

/// Badge ids earned by `event` that `progress` does not hold yet.
#[must_use]
pub fn newly_earned(progress: &UserProgress, event: &ProgressEvent<'_>) -> BTreeSet<String> {
    Badge::ALL
        .into_iter()
        .filter(|b| qualifies(*b, event))
        .map(Badge::id)
        .filter(|id| !progress.achievements().contains(*id))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LearnerId, LevelId};
    use crate::time::fixed_now;

    #[test]
    fn streak_badges_accumulate() {
        let progress = UserProgress::new(LearnerId::generate(), fixed_now());
        let earned = newly_earned(&progress, &ProgressEvent::Visit { streak: 7 });
        assert_eq!(
            earned,
            BTreeSet::from(["streak_3".to_string(), "streak_7".to_string()])
        );
    }

    #[test]
    fn held_badges_are_not_reported_again() {
        let mut progress = UserProgress::new(LearnerId::generate(), fixed_now());
        progress.add_achievements(["streak_3".to_string()]);
        let earned = newly_earned(&progress, &ProgressEvent::Visit { streak: 4 });
        assert!(earned.is_empty());
    }

    #[test]
    fn perfect_quiz_needs_full_score() {
        let progress = UserProgress::new(LearnerId::generate(), fixed_now());
        let perfect = QuizResult {
            level_id: LevelId::new(1),
            score: 5,
            total: 5,
        };
        let earned = newly_earned(
            &progress,
            &ProgressEvent::Completion {
                completed_count: 1,
                result: Some(&perfect),
            },
        );
        assert!(earned.contains("perfect_quiz"));
        assert!(earned.contains("first_steps"));

        let imperfect = QuizResult { score: 4, ..perfect };
        let earned = newly_earned(
            &progress,
            &ProgressEvent::Completion {
                completed_count: 1,
                result: Some(&imperfect),
            },
        );
        assert!(!earned.contains("perfect_quiz"));
    }

    #[test]
    fn ids_round_trip() {
        for badge in Badge::ALL {
            assert_eq!(Badge::from_id(badge.id()), Some(badge));
        }
    }
}
