mod practice;
mod quiz;

pub use practice::{PracticeAttempt, PracticeService};
pub use quiz::{QuizAttempt, QuizLoopService, QuizSubmitResult};
