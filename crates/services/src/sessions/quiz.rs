use std::sync::Arc;

use lingo_core::model::{LearnerId, LevelId, Quiz};
use lingo_core::progression::can_open;
use lingo_core::quiz::{QuizResult, QuizSession, SubmitOutcome};
use tracing::{info, warn};

use crate::error::QuizServiceError;
use crate::level_service::LevelService;
use crate::progress_service::{CompletionReport, ProgressService};

/// A quiz in flight for one learner.
///
/// Holds the session snapshot and, once the last answer is in, the persisted
/// completion. A completion is written at most once per attempt.
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    learner: LearnerId,
    session: QuizSession,
    completion: Option<CompletionReport>,
}

impl QuizAttempt {
    #[must_use]
    pub fn learner(&self) -> LearnerId {
        self.learner
    }

    #[must_use]
    pub fn level_id(&self) -> LevelId {
        self.session.level_id()
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn current_quiz(&self) -> Option<&Quiz> {
        self.session.current_quiz()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    #[must_use]
    pub fn result(&self) -> Option<QuizResult> {
        self.session.result()
    }

    #[must_use]
    pub fn completion(&self) -> Option<&CompletionReport> {
        self.completion.as_ref()
    }

    /// Set or replace the pending answer.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` if the quiz is finished or the option is unknown.
    pub fn select_answer(&mut self, option: impl Into<String>) -> Result<(), QuizServiceError> {
        self.session.select_answer(option)?;
        Ok(())
    }
}

/// Result of one submit within a quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSubmitResult {
    pub outcome: SubmitOutcome,
    /// Set once the final submit's completion was persisted.
    pub completion: Option<CompletionReport>,
}

/// Orchestrates quiz start, answering, and the completion write.
#[derive(Clone)]
pub struct QuizLoopService {
    levels: Arc<LevelService>,
    progress: Arc<ProgressService>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(levels: Arc<LevelService>, progress: Arc<ProgressService>) -> Self {
        Self { levels, progress }
    }

    /// Start a quiz on `level_id` if the learner's gate allows it.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Locked` above the gate, `Quiz(Empty)` for a
    /// level with no questions, or a store error.
    pub async fn start_quiz(
        &self,
        learner: LearnerId,
        level_id: LevelId,
    ) -> Result<QuizAttempt, QuizServiceError> {
        let progress = self.progress.load(learner).await?;
        if !can_open(&progress, level_id) {
            return Err(QuizServiceError::Locked {
                level: level_id,
                current: progress.current_level(),
            });
        }

        let level = self.levels.get_level(level_id).await?;
        let session = QuizSession::new(level.id, level.quizzes)?;
        info!(%learner, level = %level_id, questions = session.total(), "quiz started");

        Ok(QuizAttempt {
            learner,
            session,
            completion: None,
        })
    }

    /// Submit the pending answer; after the last question, persist the completion.
    ///
    /// If the completion write fails the session still ends `Completed` and the
    /// error is returned; call `finalize_completion` to retry the write.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` for submit misuse or a progress error
    /// from the completion write.
    pub async fn submit(
        &self,
        attempt: &mut QuizAttempt,
    ) -> Result<QuizSubmitResult, QuizServiceError> {
        let outcome = attempt.session.submit()?;
        let completion = match outcome {
            SubmitOutcome::Advanced { .. } => None,
            SubmitOutcome::Completed(result) => {
                info!(
                    learner = %attempt.learner,
                    level = %result.level_id,
                    score = result.score,
                    total = result.total,
                    verdict = ?result.verdict(),
                    "quiz completed"
                );
                Some(self.persist_completion(attempt, result).await?)
            }
        };
        Ok(QuizSubmitResult {
            outcome,
            completion,
        })
    }

    /// Retry the completion write for a finished quiz.
    ///
    /// Returns the stored report without writing again if it was already persisted.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::NotCompleted` if the quiz is still running, or
    /// the progress error from the write.
    pub async fn finalize_completion(
        &self,
        attempt: &mut QuizAttempt,
    ) -> Result<CompletionReport, QuizServiceError> {
        if let Some(report) = &attempt.completion {
            return Ok(report.clone());
        }
        let result = attempt.session.result().ok_or(QuizServiceError::NotCompleted)?;
        self.persist_completion(attempt, result).await
    }

    async fn persist_completion(
        &self,
        attempt: &mut QuizAttempt,
        result: QuizResult,
    ) -> Result<CompletionReport, QuizServiceError> {
        let report = self
            .progress
            .complete_level(attempt.learner, result.level_id, Some(&result))
            .await
            .inspect_err(|e| {
                warn!(learner = %attempt.learner, level = %result.level_id, error = %e, "completion write failed");
            })?;
        attempt.completion = Some(report.clone());
        Ok(report)
    }
}
