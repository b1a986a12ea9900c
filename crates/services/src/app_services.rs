use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::AppConfig;
use crate::error::AppServicesError;
use crate::level_service::LevelService;
use crate::progress_service::ProgressService;
use crate::sessions::{PracticeService, QuizLoopService};
use crate::speech::{HttpSpeechSynthesizer, PronunciationScorer, SimulatedScorer};
use crate::tutor_chat_service::TutorChatService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
    levels: Arc<LevelService>,
    quiz_loop: Arc<QuizLoopService>,
    practice: Arc<PracticeService>,
    speech: Arc<HttpSpeechSynthesizer>,
    tutor_chat: Arc<TutorChatService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage at `config.db_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or an HTTP client fails.
    pub async fn new_sqlite(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        Self::from_storage(storage, config, clock, Arc::new(SimulatedScorer::default()))
    }

    /// Build services over fresh in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if an HTTP client cannot be built.
    pub fn in_memory(
        config: &AppConfig,
        clock: Clock,
        scorer: Arc<dyn PronunciationScorer>,
    ) -> Result<Self, AppServicesError> {
        Self::from_storage(Storage::in_memory(), config, clock, scorer)
    }

    /// # Errors
    ///
    /// Returns `AppServicesError` if an HTTP client cannot be built.
    pub fn from_storage(
        storage: Storage,
        config: &AppConfig,
        clock: Clock,
        scorer: Arc<dyn PronunciationScorer>,
    ) -> Result<Self, AppServicesError> {
        let progress = Arc::new(
            ProgressService::new(clock, Arc::clone(&storage.progress)).with_policy(config.store),
        );
        let levels = Arc::new(LevelService::new(Arc::clone(&storage.levels)).with_policy(config.store));
        let quiz_loop = Arc::new(QuizLoopService::new(
            Arc::clone(&levels),
            Arc::clone(&progress),
        ));
        let practice = Arc::new(
            PracticeService::new(Arc::clone(&levels), Arc::clone(&progress), scorer)
                .with_scoring_timeout(config.http_timeout),
        );
        let speech = Arc::new(HttpSpeechSynthesizer::new(
            config.speech.clone(),
            config.http_timeout,
        )?);
        let tutor_chat = Arc::new(TutorChatService::new(
            config.chat.clone(),
            config.http_timeout,
        )?);

        Ok(Self {
            progress,
            levels,
            quiz_loop,
            practice,
            speech,
            tutor_chat,
        })
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn levels(&self) -> Arc<LevelService> {
        Arc::clone(&self.levels)
    }

    #[must_use]
    pub fn quiz_loop(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz_loop)
    }

    #[must_use]
    pub fn practice(&self) -> Arc<PracticeService> {
        Arc::clone(&self.practice)
    }

    #[must_use]
    pub fn speech(&self) -> Arc<HttpSpeechSynthesizer> {
        Arc::clone(&self.speech)
    }

    #[must_use]
    pub fn tutor_chat(&self) -> Arc<TutorChatService> {
        Arc::clone(&self.tutor_chat)
    }
}
