use std::collections::BTreeSet;

use async_trait::async_trait;
use lingo_core::model::{LearnerId, LevelId, UserProgress};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{
    db_err, level_id_from_i64, level_id_to_i64, learner_key, map_progress_row, ser, u64_to_i64,
};
use crate::repository::{ProgressPatch, ProgressRepository, StorageError};

async fn load_progress(
    conn: &mut SqliteConnection,
    learner: LearnerId,
) -> Result<Option<UserProgress>, StorageError> {
    let key = learner_key(learner);

    let row = sqlx::query(
        r"
        SELECT learner_id, streak, last_access_at, current_level, version
        FROM user_progress WHERE learner_id = ?1
        ",
    )
    .bind(key.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let level_rows = sqlx::query("SELECT level_id FROM completed_levels WHERE learner_id = ?1")
        .bind(key.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
    let mut completed = BTreeSet::new();
    for r in level_rows {
        completed.insert(level_id_from_i64(r.try_get("level_id").map_err(ser)?)?);
    }

    let badge_rows = sqlx::query("SELECT badge FROM achievements WHERE learner_id = ?1")
        .bind(key.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
    let mut badges = BTreeSet::new();
    for r in badge_rows {
        badges.insert(r.try_get::<String, _>("badge").map_err(ser)?);
    }

    map_progress_row(&row, completed, badges).map(Some)
}

async fn insert_completed(
    conn: &mut SqliteConnection,
    key: &str,
    levels: &BTreeSet<LevelId>,
) -> Result<(), StorageError> {
    for level in levels {
        sqlx::query(
            "INSERT INTO completed_levels (learner_id, level_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
        )
        .bind(key)
        .bind(level_id_to_i64(*level))
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

async fn insert_badges(
    conn: &mut SqliteConnection,
    key: &str,
    badges: &BTreeSet<String>,
) -> Result<(), StorageError> {
    for badge in badges {
        sqlx::query(
            "INSERT INTO achievements (learner_id, badge) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
        )
        .bind(key)
        .bind(badge.as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn insert_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        let key = learner_key(progress.learner_id());
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let inserted = sqlx::query(
            r"
            INSERT INTO user_progress (learner_id, streak, last_access_at, current_level, version)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(key.as_str())
        .bind(i64::from(progress.streak()))
        .bind(progress.last_access_at())
        .bind(level_id_to_i64(progress.current_level()))
        .bind(u64_to_i64("version", progress.version())?)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StorageError::Conflict);
            }
            Err(e) => return Err(db_err(e)),
        }

        insert_completed(&mut tx, &key, progress.completed_levels()).await?;
        insert_badges(&mut tx, &key, progress.achievements()).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_progress(&self, learner: LearnerId) -> Result<Option<UserProgress>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        load_progress(&mut conn, learner).await
    }

    async fn apply_patch(
        &self,
        learner: LearnerId,
        expected_version: u64,
        patch: ProgressPatch,
    ) -> Result<UserProgress, StorageError> {
        let key = learner_key(learner);
        let version = u64_to_i64("version", expected_version)?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // The version guard makes the row update the compare-and-swap; child rows
        // are only touched once it succeeded.
        let updated = match &patch {
            ProgressPatch::Streak {
                streak,
                last_access_at,
                ..
            } => {
                sqlx::query(
                    r"
                    UPDATE user_progress
                    SET streak = ?1, last_access_at = ?2, version = version + 1
                    WHERE learner_id = ?3 AND version = ?4
                    ",
                )
                .bind(i64::from(*streak))
                .bind(*last_access_at)
                .bind(key.as_str())
                .bind(version)
                .execute(&mut *tx)
                .await
            }
            ProgressPatch::Completion { current_level, .. } => {
                sqlx::query(
                    r"
                    UPDATE user_progress
                    SET current_level = MAX(current_level, ?1), version = version + 1
                    WHERE learner_id = ?2 AND version = ?3
                    ",
                )
                .bind(level_id_to_i64(*current_level))
                .bind(key.as_str())
                .bind(version)
                .execute(&mut *tx)
                .await
            }
            ProgressPatch::Reset { now } => {
                sqlx::query(
                    r"
                    UPDATE user_progress
                    SET streak = 0, last_access_at = ?1, current_level = 1, version = version + 1
                    WHERE learner_id = ?2 AND version = ?3
                    ",
                )
                .bind(*now)
                .bind(key.as_str())
                .bind(version)
                .execute(&mut *tx)
                .await
            }
        }
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM user_progress WHERE learner_id = ?1")
                .bind(key.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?
                .is_some();
            tx.rollback().await.map_err(db_err)?;
            return Err(if exists {
                StorageError::Conflict
            } else {
                StorageError::NotFound
            });
        }

        match &patch {
            ProgressPatch::Streak { achievements, .. } => {
                insert_badges(&mut tx, &key, achievements).await?;
            }
            ProgressPatch::Completion {
                completed_levels,
                achievements,
                ..
            } => {
                insert_completed(&mut tx, &key, completed_levels).await?;
                insert_badges(&mut tx, &key, achievements).await?;
            }
            ProgressPatch::Reset { .. } => {
                sqlx::query("DELETE FROM completed_levels WHERE learner_id = ?1")
                    .bind(key.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                sqlx::query("DELETE FROM achievements WHERE learner_id = ?1")
                    .bind(key.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
            }
        }

        let stored = load_progress(&mut tx, learner)
            .await?
            .ok_or(StorageError::NotFound)?;
        tx.commit().await.map_err(db_err)?;
        Ok(stored)
    }
}
