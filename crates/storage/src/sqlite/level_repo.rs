use async_trait::async_trait;
use lingo_core::model::{Level, LevelId};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{
    db_err, level_id_from_i64, level_id_to_i64, map_pronunciation_row, map_quiz_row, ser,
};
use crate::repository::{LevelRepository, StorageError};

fn position(i: usize) -> Result<i64, StorageError> {
    i64::try_from(i).map_err(|_| StorageError::Serialization("position overflow".into()))
}

async fn load_children(conn: &mut SqliteConnection, level: &mut Level) -> Result<(), StorageError> {
    let id = level_id_to_i64(level.id);

    let quiz_rows = sqlx::query(
        "SELECT options, correct, audio FROM quizzes WHERE level_id = ?1 ORDER BY position ASC",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    for row in &quiz_rows {
        level.quizzes.push(map_quiz_row(row)?);
    }

    let item_rows = sqlx::query(
        r"
        SELECT word, pinyin, translation, tips
        FROM pronunciations WHERE level_id = ?1 ORDER BY position ASC
        ",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    for row in &item_rows {
        level.pronunciations.push(map_pronunciation_row(row)?);
    }

    let unanswerable = level.unanswerable_quizzes();
    if !unanswerable.is_empty() {
        tracing::warn!(
            level = %level.id,
            ?unanswerable,
            "level has quizzes whose correct answer is not an option"
        );
    }
    Ok(())
}

fn level_shell(row: &sqlx::sqlite::SqliteRow) -> Result<Level, StorageError> {
    Ok(Level {
        id: level_id_from_i64(row.try_get("id").map_err(ser)?)?,
        title: row
            .try_get::<Option<String>, _>("title")
            .map_err(ser)?
            .unwrap_or_default(),
        quizzes: Vec::new(),
        pronunciations: Vec::new(),
    })
}

#[async_trait]
impl LevelRepository for SqliteRepository {
    async fn upsert_level(&self, level: &Level) -> Result<(), StorageError> {
        let id = level_id_to_i64(level.id);
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r"
            INSERT INTO levels (id, title) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET title = excluded.title
            ",
        )
        .bind(id)
        .bind(level.title.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        // Content is replaced wholesale so removed questions do not linger.
        sqlx::query("DELETE FROM quizzes WHERE level_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM pronunciations WHERE level_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for (i, quiz) in level.quizzes.iter().enumerate() {
            let options = serde_json::to_string(&quiz.options).map_err(ser)?;
            sqlx::query(
                r"
                INSERT INTO quizzes (level_id, position, options, correct, audio)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(id)
            .bind(position(i)?)
            .bind(options)
            .bind(quiz.correct.as_str())
            .bind(quiz.audio.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        for (i, item) in level.pronunciations.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO pronunciations (level_id, position, word, pinyin, translation, tips)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(id)
            .bind(position(i)?)
            .bind(item.word.as_str())
            .bind(item.pinyin.as_str())
            .bind(item.translation.as_str())
            .bind(item.tips.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_level(&self, id: LevelId) -> Result<Option<Level>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let row = sqlx::query("SELECT id, title FROM levels WHERE id = ?1")
            .bind(level_id_to_i64(id))
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut level = level_shell(&row)?;
        load_children(&mut conn, &mut level).await?;
        Ok(Some(level))
    }

    async fn list_levels(&self) -> Result<Vec<Level>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let rows = sqlx::query("SELECT id, title FROM levels ORDER BY id ASC")
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;

        let mut levels = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut level = level_shell(row)?;
            load_children(&mut conn, &mut level).await?;
            levels.push(level);
        }
        Ok(levels)
    }
}
