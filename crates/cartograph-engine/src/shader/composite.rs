use super::{ShaderId, ShaderSource, ShaderStage};

/// Fragment stage of the composition program: samples the bound layer texture.
pub static COMPOSITE_FRAGMENT: ShaderSource = ShaderSource::builtin(
    ShaderId::reserved(1),
    ShaderStage::Fragment,
    include_str!("wgsl/composite_fragment.wgsl"),
);

/// Vertex stage of the composition program: passes the full-screen quad through.
pub static COMPOSITE_VERTEX: ShaderSource = ShaderSource::builtin(
    ShaderId::reserved(2),
    ShaderStage::Vertex,
    include_str!("wgsl/composite_vertex.wgsl"),
);
