#![forbid(unsafe_code)]

pub mod achievements;
pub mod model;
pub mod progression;
pub mod pronunciation;
pub mod quiz;
pub mod streak;
pub mod time;

pub use time::Clock;
