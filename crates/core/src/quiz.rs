//! Quiz session state machine.
//!
//! A session walks a snapshot of a level's quizzes in order. Answers are only
//! checked on submit and the score stays hidden until the session completes.

use thiserror::Error;

use crate::model::{LevelId, Quiz};

/// Minimum score ratio framed as a pass in result messaging.
pub const PASS_RATIO: f64 = 0.70;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("level has no quizzes")]
    Empty,

    #[error("quiz session already completed")]
    Completed,

    #[error("no answer selected")]
    NoSelection,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizState {
    InProgress {
        index: usize,
        score: u32,
        selected: Option<String>,
    },
    Completed {
        score: u32,
    },
}

/// Presentational classification of a finished quiz. Never gates progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Effort,
}

/// Final tally of a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizResult {
    pub level_id: LevelId,
    pub score: u32,
    pub total: u32,
}

impl QuizResult {
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.score) / f64::from(self.total)
    }

    #[must_use]
    pub fn verdict(&self) -> Verdict {
        if self.ratio() >= PASS_RATIO {
            Verdict::Pass
        } else {
            Verdict::Effort
        }
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.score == self.total
    }
}

/// What a submit did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Advanced { index: usize },
    Completed(QuizResult),
}

/// Answered / remaining counters for progress bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
pub struct QuizSession {
    level_id: LevelId,
    quizzes: Vec<Quiz>,
    state: QuizState,
}

impl QuizSession {
    /// Start a session over a snapshot of the level's quizzes.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Empty` if there is nothing to ask.
    pub fn new(level_id: LevelId, quizzes: Vec<Quiz>) -> Result<Self, QuizError> {
        if quizzes.is_empty() {
            return Err(QuizError::Empty);
        }
        Ok(Self {
            level_id,
            quizzes,
            state: QuizState::InProgress {
                index: 0,
                score: 0,
                selected: None,
            },
        })
    }

    #[must_use]
    pub fn level_id(&self) -> LevelId {
        self.level_id
    }

    #[must_use]
    pub fn state(&self) -> &QuizState {
        &self.state
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.quizzes.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.state, QuizState::Completed { .. })
    }

    /// Index of the question on screen, `None` once completed.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self.state {
            QuizState::InProgress { index, .. } => Some(index),
            QuizState::Completed { .. } => None,
        }
    }

    #[must_use]
    pub fn current_quiz(&self) -> Option<&Quiz> {
        self.index().and_then(|i| self.quizzes.get(i))
    }

    #[must_use]
    pub fn selected_answer(&self) -> Option<&str> {
        match &self.state {
            QuizState::InProgress { selected, .. } => selected.as_deref(),
            QuizState::Completed { .. } => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        let total = self.total();
        let answered = self.index().unwrap_or(total);
        QuizProgress {
            total,
            answered,
            remaining: total - answered,
        }
    }

    /// The final result, only available once completed.
    #[must_use]
    pub fn result(&self) -> Option<QuizResult> {
        match self.state {
            QuizState::Completed { score } => Some(self.make_result(score)),
            QuizState::InProgress { .. } => None,
        }
    }

    /// Set or replace the pending answer for the current question.
    ///
    /// Any text is accepted; `submit` grades it by exact equality with the
    /// correct answer, so a quiz whose options failed to load can still be
    /// answered and the session can finish.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` after the last submit.
    pub fn select_answer(&mut self, option: impl Into<String>) -> Result<(), QuizError> {
        let option = option.into();
        let QuizState::InProgress {
            index, selected, ..
        } = &mut self.state
        else {
            return Err(QuizError::Completed);
        };
        *selected = Some(option);
        Ok(())
    }

    /// Check the pending answer and move on.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoSelection` when nothing is selected (state untouched)
    /// and `QuizError::Completed` if the session already finished.
    pub fn submit(&mut self) -> Result<SubmitOutcome, QuizError> {
        let QuizState::InProgress {
            index,
            score,
            selected,
        } = &self.state
        else {
            return Err(QuizError::Completed);
        };
        let Some(answer) = selected else {
            return Err(QuizError::NoSelection);
        };

        let index = *index;
        let mut score = *score;
        if *answer == self.quizzes[index].correct {
            score += 1;
        }

        if index + 1 >= self.quizzes.len() {
            self.state = QuizState::Completed { score };
            return Ok(SubmitOutcome::Completed(self.make_result(score)));
        }

        self.state = QuizState::InProgress {
            index: index + 1,
            score,
            selected: None,
        };
        Ok(SubmitOutcome::Advanced { index: index + 1 })
    }

    fn make_result(&self, score: u32) -> QuizResult {
        QuizResult {
            level_id: self.level_id,
            score,
            total: u32::try_from(self.quizzes.len()).unwrap_or(u32::MAX),
        }
    }
}
