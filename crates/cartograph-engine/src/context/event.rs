/// Notification that the device context was lost.
///
/// The host restores the context only if a handler called
/// [`prevent_default`](Self::prevent_default).
#[derive(Debug, Default)]
pub struct ContextLossEvent {
    default_prevented: bool,
}

impl ContextLossEvent {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    #[inline]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}
