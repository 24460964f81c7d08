/// Coalesces redraw requests into at most one pending frame.
#[derive(Debug, Default)]
pub struct RedrawScheduler {
    pending: bool,
}

impl RedrawScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a frame as pending.
    ///
    /// Returns `true` only when no frame was pending before; the host then
    /// asks its window for a refresh.
    pub fn request(&mut self) -> bool {
        !std::mem::replace(&mut self.pending, true)
    }

    /// Consumes the pending frame, if any.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
