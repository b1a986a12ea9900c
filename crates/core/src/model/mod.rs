mod ids;
mod level;
mod progress;

pub use ids::{LearnerId, LevelId, ParseIdError};
pub use level::{Level, LevelDraft, LevelError, PronunciationItem, Quiz};
pub use progress::{ProgressError, UserProgress};
