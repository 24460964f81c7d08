use crate::cache::ResourceCache;
use crate::device::{BaselineState, GraphicsDevice};
use crate::layer::RendererRegistry;

use super::ContextLossEvent;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum ContextState {
    #[default]
    Active,
    Lost,
}

/// Tracks context loss and restoration for one map.
#[derive(Debug, Default)]
pub struct ContextLifecycle {
    state: ContextState,
    losses: u32,
    restorations: u32,
}

impl ContextLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> ContextState {
        self.state
    }

    #[inline]
    pub fn is_lost(&self) -> bool {
        self.state == ContextState::Lost
    }

    #[inline]
    pub fn losses(&self) -> u32 {
        self.losses
    }

    #[inline]
    pub fn restorations(&self) -> u32 {
        self.restorations
    }

    /// Returns `true` on the Active -> Lost transition.
    pub fn mark_lost(&mut self) -> bool {
        if self.is_lost() {
            return false;
        }
        self.state = ContextState::Lost;
        self.losses += 1;
        true
    }

    /// Returns `true` on the Lost -> Active transition.
    pub fn mark_restored(&mut self) -> bool {
        if !self.is_lost() {
            return false;
        }
        self.state = ContextState::Active;
        self.restorations += 1;
        true
    }

    /// Handles a loss notification.
    ///
    /// Claims the event for restoration, then drops every cached handle and
    /// every renderer-held handle without issuing release calls.
    pub fn on_lost<D: GraphicsDevice>(
        &mut self,
        event: &mut ContextLossEvent,
        cache: &mut ResourceCache<D>,
        registry: &mut RendererRegistry<D>,
    ) {
        event.prevent_default();
        if self.mark_lost() {
            log::warn!("graphics context lost (loss #{})", self.losses);
        }
        cache.invalidate_all();
        registry.handle_context_lost();
    }

    /// Handles a restore notification: re-applies the baseline device state
    /// and marks the context usable.
    pub fn on_restored<D: GraphicsDevice>(&mut self, device: &mut D, baseline: &BaselineState) {
        device.reset_state(baseline);
        if self.mark_restored() {
            log::info!("graphics context restored");
        }
    }
}
