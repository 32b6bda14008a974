//! Record store for vaporns.
//!
//! Holds the measurement model and the immutable lookup generations built
//! from the current set of winners.

mod generation;
mod models;
mod zones;

pub use generation::*;
pub use models::*;
pub use zones::*;

use std::sync::Arc;

/// Anything that can hand out the currently published generation.
pub trait GenerationSource: Send + Sync {
    /// Returns the published generation, or `None` before the first publish.
    fn current(&self) -> Option<Arc<Generation>>;
}
