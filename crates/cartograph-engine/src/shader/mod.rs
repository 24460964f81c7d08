//! GPU program stages.
//!
//! A stage is an immutable `(stage, source, token)` triple. Device caches key on
//! the token, never on the text, so two stages with identical source are still
//! two cache entries.
//!
//! The compositor's two stages are process-wide statics with reserved tokens.

mod composite;
mod source;

pub use composite::{COMPOSITE_FRAGMENT, COMPOSITE_VERTEX};
pub use source::{ShaderId, ShaderSource, ShaderStage};
