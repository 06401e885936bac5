//! Message triage: classification, media handling, and the engine loop.

pub mod classifier;
#[allow(clippy::module_inception)]
pub mod engine;
pub mod media;

pub use classifier::{classify, Category};
pub use engine::Engine;
pub use media::MediaHandler;
