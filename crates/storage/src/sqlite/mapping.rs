use std::collections::BTreeSet;

use lingo_core::model::{LearnerId, LevelId, PronunciationItem, Quiz, UserProgress};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn db_err<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn learner_key(id: LearnerId) -> String {
    id.value().hyphenated().to_string()
}

pub(crate) fn learner_from_str(raw: &str) -> Result<LearnerId, StorageError> {
    raw.parse()
        .map_err(|_| StorageError::Serialization(format!("invalid learner_id: {raw}")))
}

pub(crate) fn level_id_to_i64(id: LevelId) -> i64 {
    i64::from(id.value())
}

pub(crate) fn level_id_from_i64(v: i64) -> Result<LevelId, StorageError> {
    u32::try_from(v)
        .map(LevelId::new)
        .map_err(|_| StorageError::Serialization(format!("level_id out of range: {v}")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range: {v}")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

/// Build a `UserProgress` from the `user_progress` row plus its child sets.
pub(crate) fn map_progress_row(
    row: &SqliteRow,
    completed_levels: BTreeSet<LevelId>,
    achievements: BTreeSet<String>,
) -> Result<UserProgress, StorageError> {
    let learner_raw: String = row.try_get("learner_id").map_err(ser)?;
    let version: i64 = row.try_get("version").map_err(ser)?;

    UserProgress::from_persisted(
        learner_from_str(&learner_raw)?,
        u32_from_i64("streak", row.try_get("streak").map_err(ser)?)?,
        row.try_get("last_access_at").map_err(ser)?,
        level_id_from_i64(row.try_get("current_level").map_err(ser)?)?,
        completed_levels,
        achievements,
        u64::try_from(version)
            .map_err(|_| StorageError::Serialization(format!("invalid version: {version}")))?,
    )
    .map_err(ser)
}

/// Content rows are read leniently: NULLs and undecodable option lists become empty values.
pub(crate) fn map_quiz_row(row: &SqliteRow) -> Result<Quiz, StorageError> {
    let options_json: Option<String> = row.try_get("options").map_err(ser)?;
    let options = match options_json.as_deref() {
        Some(raw) => serde_json::from_str::<Vec<String>>(raw).unwrap_or_else(|err| {
            tracing::warn!(%err, "quiz options are not a JSON string array, using none");
            Vec::new()
        }),
        None => Vec::new(),
    };

    Ok(Quiz {
        options,
        correct: row
            .try_get::<Option<String>, _>("correct")
            .map_err(ser)?
            .unwrap_or_default(),
        audio: row
            .try_get::<Option<String>, _>("audio")
            .map_err(ser)?
            .unwrap_or_default(),
    })
}

pub(crate) fn map_pronunciation_row(row: &SqliteRow) -> Result<PronunciationItem, StorageError> {
    let text = |col: &str| -> Result<String, StorageError> {
        Ok(row
            .try_get::<Option<String>, _>(col)
            .map_err(ser)?
            .unwrap_or_default())
    };
    Ok(PronunciationItem {
        word: text("word")?,
        pinyin: text("pinyin")?,
        translation: text("translation")?,
        tips: text("tips")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learner_key_round_trips() {
        let id = LearnerId::generate();
        assert_eq!(learner_from_str(&learner_key(id)).unwrap(), id);
    }

    #[test]
    fn negative_level_id_is_rejected() {
        assert!(level_id_from_i64(-3).is_err());
        assert_eq!(level_id_from_i64(3).unwrap(), LevelId::new(3));
    }
}
