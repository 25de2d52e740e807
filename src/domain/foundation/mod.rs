//! Identifiers and time values shared across the domain.

mod ids;
mod timestamp;

pub use ids::{CallId, RunId};
pub use timestamp::Timestamp;
