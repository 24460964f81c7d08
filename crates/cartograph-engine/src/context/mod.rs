//! Device context availability.
//!
//! The context is either usable or lost. While lost, every cached handle is
//! gone and no frame is drawn; restoration re-applies the baseline state and
//! lets the caches refill lazily.

mod event;
mod lifecycle;

pub use event::ContextLossEvent;
pub use lifecycle::{ContextLifecycle, ContextState};
