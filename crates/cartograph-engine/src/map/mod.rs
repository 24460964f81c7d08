//! The map-facing compositor.
//!
//! [`MapRenderer`] owns the device, the resource cache, the context lifecycle
//! and the renderer registry, and turns coalesced redraw requests into frames.

mod compositor;
mod options;
mod scheduler;
mod view;

pub use compositor::{FrameOutcome, MapRenderer};
pub use options::MapOptions;
pub use scheduler::RedrawScheduler;
pub use view::ViewState;
