use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::LevelId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LevelError {
    #[error("level id must be >= 1")]
    InvalidId,

    #[error("level title cannot be empty")]
    EmptyTitle,

    #[error("quiz {index} has no options")]
    NoOptions { index: usize },

    #[error("quiz {index}: correct answer {correct:?} is not one of the options")]
    CorrectNotInOptions { index: usize, correct: String },
}

//
// ─── CONTENT TYPES ─────────────────────────────────────────────────────────────
//

/// One multiple-choice question. `audio` is the prompt text sent to speech synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct: String,
    #[serde(default)]
    pub audio: String,
}

impl Quiz {
    /// True when `correct` is one of `options`.
    #[must_use]
    pub fn is_answerable(&self) -> bool {
        self.options.iter().any(|o| o == &self.correct)
    }
}

/// Display-only pronunciation exercise.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PronunciationItem {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub pinyin: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub tips: String,
}

/// A unit of curriculum content, authored externally and read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default)]
    pub pronunciations: Vec<PronunciationItem>,
}

impl Level {
    /// Quizzes whose correct answer cannot be selected. Reported, never fatal.
    #[must_use]
    pub fn unanswerable_quizzes(&self) -> Vec<usize> {
        self.quizzes
            .iter()
            .enumerate()
            .filter(|(_, q)| !q.is_answerable())
            .map(|(i, _)| i)
            .collect()
    }
}

//
// ─── AUTHORING ─────────────────────────────────────────────────────────────────
//

/// Strict authoring input. Content coming back from storage skips this and is taken as-is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LevelDraft {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default)]
    pub pronunciations: Vec<PronunciationItem>,
}

impl LevelDraft {
    /// Validate the draft into a `Level`.
    ///
    /// # Errors
    ///
    /// Returns `LevelError` for a zero id, blank title, a quiz without options,
    /// or a quiz whose correct answer is missing from its options.
    pub fn validate(self) -> Result<Level, LevelError> {
        if self.id == 0 {
            return Err(LevelError::InvalidId);
        }
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(LevelError::EmptyTitle);
        }
        for (index, quiz) in self.quizzes.iter().enumerate() {
            if quiz.options.is_empty() {
                return Err(LevelError::NoOptions { index });
            }
            if !quiz.is_answerable() {
                return Err(LevelError::CorrectNotInOptions {
                    index,
                    correct: quiz.correct.clone(),
                });
            }
        }

        Ok(Level {
            id: LevelId::new(self.id),
            title,
            quizzes: self.quizzes,
            pronunciations: self.pronunciations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(options: &[&str], correct: &str) -> Quiz {
        Quiz {
            options: options.iter().map(ToString::to_string).collect(),
            correct: correct.to_string(),
            audio: String::new(),
        }
    }

    #[test]
    fn draft_rejects_correct_outside_options() {
        let draft = LevelDraft {
            id: 1,
            title: "Greetings".into(),
            quizzes: vec![quiz(&["你好", "再见"], "谢谢")],
            pronunciations: vec![],
        };
        let err = draft.validate().unwrap_err();
        assert!(matches!(err, LevelError::CorrectNotInOptions { index: 0, .. }));
    }

    #[test]
    fn draft_rejects_blank_title_and_zero_id() {
        let blank = LevelDraft {
            id: 1,
            title: "  ".into(),
            ..LevelDraft::default()
        };
        assert_eq!(blank.validate().unwrap_err(), LevelError::EmptyTitle);

        let zero = LevelDraft {
            id: 0,
            title: "x".into(),
            ..LevelDraft::default()
        };
        assert_eq!(zero.validate().unwrap_err(), LevelError::InvalidId);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let level: Level = serde_json::from_str(r#"{"id": 4, "quizzes": [{"correct": "a"}]}"#).unwrap();
        assert_eq!(level.id, LevelId::new(4));
        assert!(level.title.is_empty());
        assert!(level.quizzes[0].options.is_empty());
        assert!(level.pronunciations.is_empty());
        assert_eq!(level.unanswerable_quizzes(), vec![0]);
    }
}
