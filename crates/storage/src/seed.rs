//! Built-in starter curriculum.

use lingo_core::model::{Level, LevelDraft, LevelError};
use thiserror::Error;

const BUNDLED_LEVELS: &str = include_str!("../seed/levels.json");

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SeedError {
    #[error("seed content is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Level(#[from] LevelError),
}

/// Parse and validate level drafts from a JSON array.
///
/// # Errors
///
/// Returns `SeedError` if the JSON is malformed or any level fails validation.
pub fn parse_levels(json: &str) -> Result<Vec<Level>, SeedError> {
    let drafts: Vec<LevelDraft> = serde_json::from_str(json)?;
    drafts
        .into_iter()
        .map(|d| d.validate().map_err(SeedError::from))
        .collect()
}

/// The curriculum shipped with the binary.
///
/// # Errors
///
/// Returns `SeedError` if the embedded content fails validation.
pub fn bundled_levels() -> Result<Vec<Level>, SeedError> {
    parse_levels(BUNDLED_LEVELS)
}
