use super::ContextAttributes;

/// Initialization parameters for [`Gpu`](super::Gpu).
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Attributes of the drawing context.
    ///
    /// `alpha: false` selects an opaque surface. `depth` and `stencil` must stay
    /// off; the compositor never attaches a depth-stencil target.
    pub attributes: ContextAttributes,

    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior).
    pub present_mode: wgpu::PresentMode,

    /// Enables backend validation and debug labels.
    pub debug: bool,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for the surface. A hint.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            attributes: ContextAttributes::default(),
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            debug: false,
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}
