use std::sync::Arc;

use lingo_core::model::{Level, LevelId};
use storage::repository::LevelRepository;
use storage::seed::bundled_levels;
use tracing::{debug, info};

use crate::error::LevelServiceError;
use crate::store::{StorePolicy, guarded};

/// Read access to level content, plus seeding of the starter curriculum.
#[derive(Clone)]
pub struct LevelService {
    repo: Arc<dyn LevelRepository>,
    policy: StorePolicy,
}

impl LevelService {
    #[must_use]
    pub fn new(repo: Arc<dyn LevelRepository>) -> Self {
        Self {
            repo,
            policy: StorePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: StorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// All levels, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `LevelServiceError::Store` if the store fails or times out.
    pub async fn list_levels(&self) -> Result<Vec<Level>, LevelServiceError> {
        let levels = guarded(self.policy, self.repo.list_levels()).await?;
        debug!(count = levels.len(), "levels listed");
        Ok(levels)
    }

    /// Fetch one level by id.
    ///
    /// # Errors
    ///
    /// Returns `LevelServiceError::NotFound` if the level does not exist.
    pub async fn get_level(&self, id: LevelId) -> Result<Level, LevelServiceError> {
        guarded(self.policy, self.repo.get_level(id))
            .await?
            .ok_or(LevelServiceError::NotFound(id))
    }

    /// Write the bundled curriculum into the store, replacing levels with the same id.
    ///
    /// # Errors
    ///
    /// Returns `LevelServiceError` if the bundled content is invalid or a write fails.
    pub async fn seed_levels(&self) -> Result<usize, LevelServiceError> {
        let levels = bundled_levels()?;
        self.import(&levels).await
    }

    /// Upsert the given levels.
    ///
    /// # Errors
    ///
    /// Returns `LevelServiceError::Store` if a write fails.
    pub async fn import(&self, levels: &[Level]) -> Result<usize, LevelServiceError> {
        for level in levels {
            guarded(self.policy, self.repo.upsert_level(level)).await?;
        }
        info!(count = levels.len(), "levels imported");
        Ok(levels.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn seeding_makes_levels_listable() {
        let svc = LevelService::new(Arc::new(InMemoryRepository::new()));
        assert!(svc.list_levels().await.unwrap().is_empty());

        let seeded = svc.seed_levels().await.unwrap();
        let levels = svc.list_levels().await.unwrap();
        assert_eq!(levels.len(), seeded);
        assert_eq!(levels[0].id, LevelId::FIRST);

        // Seeding again replaces rather than duplicates.
        svc.seed_levels().await.unwrap();
        assert_eq!(svc.list_levels().await.unwrap().len(), seeded);
    }

    #[tokio::test]
    async fn missing_level_is_not_found() {
        let svc = LevelService::new(Arc::new(InMemoryRepository::new()));
        let err = svc.get_level(LevelId::new(42)).await.unwrap_err();
        assert!(matches!(err, LevelServiceError::NotFound(id) if id == LevelId::new(42)));
    }
}
