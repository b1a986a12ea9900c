#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod level_service;
pub mod progress_service;
pub mod sessions;
pub mod speech;
pub mod store;
pub mod tutor_chat_service;

pub use lingo_core::Clock;

pub use app_services::AppServices;
pub use config::AppConfig;
pub use error::{
    AppServicesError, ChatError, ConfigError, LevelServiceError, PracticeServiceError,
    ProgressServiceError, QuizServiceError, ScoringError, SpeechError, StoreError,
};
pub use level_service::LevelService;
pub use progress_service::{CompletionReport, ProgressService, VisitReport};
pub use sessions::{PracticeAttempt, PracticeService, QuizAttempt, QuizLoopService, QuizSubmitResult};
pub use store::StorePolicy;
pub use tutor_chat_service::{ChatRole, ChatTurn, TutorChatService};
