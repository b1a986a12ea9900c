use std::collections::BTreeSet;
use std::sync::Arc;

use lingo_core::achievements::{ProgressEvent, newly_earned};
use lingo_core::model::{LearnerId, LevelId, UserProgress};
use lingo_core::progression::{CompletionOutcome, complete_level};
use lingo_core::quiz::QuizResult;
use lingo_core::streak::{StreakChange, evaluate_streak};
use storage::repository::{ProgressPatch, ProgressRepository, StorageError};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::error::{ProgressServiceError, StoreError};
use crate::store::{StorePolicy, guarded};

/// Result of a home-screen visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitReport {
    pub progress: UserProgress,
    pub change: StreakChange,
    pub new_badges: BTreeSet<String>,
}

/// Result of persisting a finished level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub progress: UserProgress,
    pub outcome: CompletionOutcome,
    pub new_badges: BTreeSet<String>,
}

/// Owns every write to a learner's progress record.
///
/// Writes are version-guarded patches; on a conflict the rule is re-evaluated
/// against a fresh read, up to `StorePolicy::write_attempts` times.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    repo: Arc<dyn ProgressRepository>,
    policy: StorePolicy,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn ProgressRepository>) -> Self {
        Self {
            clock,
            repo,
            policy: StorePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: StorePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Create the signup record: zeroed counters, gated on level 1.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::AlreadySignedUp` if a record exists.
    pub async fn sign_up(&self, learner: LearnerId) -> Result<UserProgress, ProgressServiceError> {
        let progress = UserProgress::new(learner, self.clock.now());
        match guarded(self.policy, self.repo.insert_progress(&progress)).await {
            Ok(()) => {
                info!(%learner, "learner signed up");
                Ok(progress)
            }
            Err(StoreError::Storage(StorageError::Conflict)) => {
                Err(ProgressServiceError::AlreadySignedUp)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load a learner's progress.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NoProgress` if the learner never signed up.
    pub async fn load(&self, learner: LearnerId) -> Result<UserProgress, ProgressServiceError> {
        guarded(self.policy, self.repo.get_progress(learner))
            .await?
            .ok_or(ProgressServiceError::NoProgress)
    }

    /// Evaluate the daily streak for a visit now and persist it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the record is missing, the store fails,
    /// or the record stayed contended for every attempt.
    pub async fn record_visit(&self, learner: LearnerId) -> Result<VisitReport, ProgressServiceError> {
        let now = self.clock.now();
        let (progress, (change, new_badges)) = self
            .read_modify_write(learner, |current| {
                let update = evaluate_streak(current.streak(), current.last_access_at(), now);
                let badges = newly_earned(
                    current,
                    &ProgressEvent::Visit {
                        streak: update.streak,
                    },
                );
                let patch = ProgressPatch::Streak {
                    streak: update.streak,
                    last_access_at: update.last_access_at,
                    achievements: badges.clone(),
                };
                (Some(patch), (update.change, badges))
            })
            .await?;

        if change == StreakChange::ClockSkew {
            warn!(%learner, "last access is in the future; streak left unchanged");
        }
        debug!(%learner, streak = progress.streak(), ?change, "visit recorded");

        Ok(VisitReport {
            progress,
            change,
            new_badges,
        })
    }

    /// Record that `level_id` was finished, unlocking the next level when it was the gate.
    ///
    /// Idempotent: a replay of a completed level writes nothing and returns the
    /// current record.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the record is missing or the write fails.
    pub async fn complete_level(
        &self,
        learner: LearnerId,
        level_id: LevelId,
        result: Option<&QuizResult>,
    ) -> Result<CompletionReport, ProgressServiceError> {
        let (progress, (outcome, new_badges)) = self
            .read_modify_write(learner, |current| {
                let outcome = complete_level(current, level_id);
                let badges = newly_earned(
                    current,
                    &ProgressEvent::Completion {
                        completed_count: outcome.completed_levels.len(),
                        result,
                    },
                );
                if outcome.is_noop() && badges.is_empty() {
                    return (None, (outcome, badges));
                }
                let patch = ProgressPatch::Completion {
                    completed_levels: outcome.completed_levels.clone(),
                    current_level: outcome.current_level,
                    achievements: badges.clone(),
                };
                (Some(patch), (outcome, badges))
            })
            .await?;

        if let Some(unlocked) = outcome.unlocked {
            info!(%learner, level = %level_id, %unlocked, "level completed, next level unlocked");
        } else {
            debug!(%learner, level = %level_id, newly = outcome.newly_completed, "level completed");
        }

        Ok(CompletionReport {
            progress,
            outcome,
            new_badges,
        })
    }

    /// Reset the learner to signup defaults.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the record is missing or the write fails.
    pub async fn reset(&self, learner: LearnerId) -> Result<UserProgress, ProgressServiceError> {
        let now = self.clock.now();
        let (progress, ()) = self
            .read_modify_write(learner, |_| (Some(ProgressPatch::Reset { now }), ()))
            .await?;
        info!(%learner, "progress reset to defaults");
        Ok(progress)
    }

    async fn read_modify_write<R>(
        &self,
        learner: LearnerId,
        mut plan: impl FnMut(&UserProgress) -> (Option<ProgressPatch>, R),
    ) -> Result<(UserProgress, R), ProgressServiceError> {
        let attempts = self.policy.write_attempts.max(1);
        for attempt in 1..=attempts {
            let current = self.load(learner).await?;
            let (patch, extra) = plan(&current);
            let Some(patch) = patch else {
                return Ok((current, extra));
            };

            match guarded(
                self.policy,
                self.repo.apply_patch(learner, current.version(), patch),
            )
            .await
            {
                Ok(stored) => return Ok((stored, extra)),
                Err(StoreError::Storage(StorageError::Conflict)) => {
                    warn!(%learner, attempt, "progress changed concurrently, retrying");
                }
                Err(StoreError::Storage(StorageError::NotFound)) => {
                    return Err(ProgressServiceError::NoProgress);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ProgressServiceError::Contended { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use lingo_core::time::fixed_now;
    use std::sync::Mutex;
    use storage::repository::InMemoryRepository;

    fn service(clock: Clock, repo: &InMemoryRepository) -> ProgressService {
        ProgressService::new(clock, Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn first_visit_on_signup_day_keeps_zero_streak() {
        let repo = InMemoryRepository::new();
        let svc = service(Clock::fixed(fixed_now()), &repo);
        let learner = LearnerId::generate();
        svc.sign_up(learner).await.unwrap();

        let report = svc.record_visit(learner).await.unwrap();
        assert_eq!(report.change, StreakChange::Unchanged);
        assert_eq!(report.progress.streak(), 0);
        assert_eq!(report.progress.version(), 1);
    }

    #[tokio::test]
    async fn consecutive_days_extend_and_award_badges() {
        let repo = InMemoryRepository::new();
        let learner = LearnerId::generate();
        service(Clock::fixed(fixed_now()), &repo)
            .sign_up(learner)
            .await
            .unwrap();

        let mut clock = Clock::fixed(fixed_now());
        let mut last = None;
        for _ in 0..3 {
            clock.advance(Duration::days(1));
            last = Some(service(clock, &repo).record_visit(learner).await.unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.progress.streak(), 3);
        assert_eq!(last.new_badges, BTreeSet::from(["streak_3".to_string()]));
        assert!(last.progress.achievements().contains("streak_3"));
    }

    #[tokio::test]
    async fn visit_without_signup_is_no_progress() {
        let repo = InMemoryRepository::new();
        let err = service(Clock::fixed(fixed_now()), &repo)
            .record_visit(LearnerId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::NoProgress));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn double_signup_is_rejected() {
        let repo = InMemoryRepository::new();
        let svc = service(Clock::fixed(fixed_now()), &repo);
        let learner = LearnerId::generate();
        svc.sign_up(learner).await.unwrap();
        assert!(matches!(
            svc.sign_up(learner).await.unwrap_err(),
            ProgressServiceError::AlreadySignedUp
        ));
    }

    #[tokio::test]
    async fn replay_writes_nothing() {
        let repo = InMemoryRepository::new();
        let svc = service(Clock::fixed(fixed_now()), &repo);
        let learner = LearnerId::generate();
        svc.sign_up(learner).await.unwrap();

        let first = svc.complete_level(learner, LevelId::new(1), None).await.unwrap();
        assert_eq!(first.progress.current_level(), LevelId::new(2));
        assert_eq!(first.new_badges, BTreeSet::from(["first_steps".to_string()]));

        let replay = svc.complete_level(learner, LevelId::new(1), None).await.unwrap();
        assert!(replay.outcome.is_noop());
        assert_eq!(replay.progress.version(), first.progress.version());
        assert_eq!(replay.progress.completed_levels().len(), 1);
    }

    #[tokio::test]
    async fn reset_restores_defaults() {
        let repo = InMemoryRepository::new();
        let svc = service(Clock::fixed(fixed_now()), &repo);
        let learner = LearnerId::generate();
        svc.sign_up(learner).await.unwrap();
        svc.complete_level(learner, LevelId::new(1), None).await.unwrap();

        let reset = svc.reset(learner).await.unwrap();
        assert_eq!(reset.current_level(), LevelId::FIRST);
        assert!(reset.completed_levels().is_empty());
        assert!(reset.achievements().is_empty());
    }

    /// Bumps the stored version behind the caller's back a fixed number of times.
    struct RacingRepo {
        inner: InMemoryRepository,
        races_left: Mutex<u32>,
    }

    #[async_trait]
    impl ProgressRepository for RacingRepo {
        async fn insert_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
            self.inner.insert_progress(progress).await
        }

        async fn get_progress(
            &self,
            learner: LearnerId,
        ) -> Result<Option<UserProgress>, StorageError> {
            self.inner.get_progress(learner).await
        }

        async fn apply_patch(
            &self,
            learner: LearnerId,
            expected_version: u64,
            patch: ProgressPatch,
        ) -> Result<UserProgress, StorageError> {
            let race = {
                let mut left = self.races_left.lock().unwrap();
                let race = *left > 0;
                *left = left.saturating_sub(1);
                race
            };
            if race {
                // Another device finished level 1 in the meantime.
                self.inner
                    .apply_patch(
                        learner,
                        expected_version,
                        ProgressPatch::Completion {
                            completed_levels: BTreeSet::from([LevelId::new(1)]),
                            current_level: LevelId::new(2),
                            achievements: BTreeSet::new(),
                        },
                    )
                    .await?;
            }
            self.inner.apply_patch(learner, expected_version, patch).await
        }
    }

    #[tokio::test]
    async fn conflicting_completion_is_retried_against_fresh_state() {
        let inner = InMemoryRepository::new();
        let racing = Arc::new(RacingRepo {
            inner: inner.clone(),
            races_left: Mutex::new(1),
        });
        let svc = ProgressService::new(Clock::fixed(fixed_now()), racing);
        let learner = LearnerId::generate();
        svc.sign_up(learner).await.unwrap();

        // Learner on this device finished level 1 too; the retry must not double-unlock.
        let report = svc.complete_level(learner, LevelId::new(1), None).await.unwrap();
        assert_eq!(report.progress.current_level(), LevelId::new(2));
        assert_eq!(report.progress.completed_levels().len(), 1);
    }

    #[tokio::test]
    async fn persistent_contention_gives_up() {
        let inner = InMemoryRepository::new();
        let racing = Arc::new(RacingRepo {
            inner,
            races_left: Mutex::new(u32::MAX),
        });
        let svc = ProgressService::new(Clock::fixed(fixed_now()), racing).with_policy(StorePolicy {
            write_attempts: 2,
            ..StorePolicy::default()
        });
        let learner = LearnerId::generate();
        svc.sign_up(learner).await.unwrap();

        let err = svc.record_visit(learner).await.unwrap_err();
        assert!(matches!(err, ProgressServiceError::Contended { attempts: 2 }));
        assert!(err.is_retryable());
    }
}
