use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates learner progress (with its completed-level and badge sets)
/// and the curriculum tables.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        tracing::info!("applying schema migration v1");
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_progress (
                    learner_id TEXT PRIMARY KEY,
                    streak INTEGER NOT NULL CHECK (streak >= 0),
                    last_access_at TEXT NOT NULL,
                    current_level INTEGER NOT NULL CHECK (current_level >= 1),
                    version INTEGER NOT NULL CHECK (version >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS completed_levels (
                    learner_id TEXT NOT NULL,
                    level_id INTEGER NOT NULL,
                    PRIMARY KEY (learner_id, level_id),
                    FOREIGN KEY (learner_id) REFERENCES user_progress(learner_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS achievements (
                    learner_id TEXT NOT NULL,
                    badge TEXT NOT NULL,
                    PRIMARY KEY (learner_id, badge),
                    FOREIGN KEY (learner_id) REFERENCES user_progress(learner_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS levels (
                    id INTEGER PRIMARY KEY CHECK (id >= 1),
                    title TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quizzes (
                    level_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    options TEXT,
                    correct TEXT,
                    audio TEXT,
                    PRIMARY KEY (level_id, position),
                    FOREIGN KEY (level_id) REFERENCES levels(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS pronunciations (
                    level_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    word TEXT,
                    pinyin TEXT,
                    translation TEXT,
                    tips TEXT,
                    PRIMARY KEY (level_id, position),
                    FOREIGN KEY (level_id) REFERENCES levels(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
