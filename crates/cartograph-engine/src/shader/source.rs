use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Pipeline stage a shader source is compiled for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Entry point every stage source must declare.
    #[inline]
    pub const fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Tokens below this value are reserved for built-in stages.
const FIRST_DYNAMIC_ID: u32 = 256;

static NEXT_ID: AtomicU32 = AtomicU32::new(FIRST_DYNAMIC_ID);

/// Cache identity of a shader stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ShaderId(u32);

impl ShaderId {
    pub(crate) const fn reserved(id: u32) -> Self {
        assert!(id < FIRST_DYNAMIC_ID);
        Self(id)
    }

    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable shader stage source.
///
/// Not `Clone`: a copy would share the token, and the token is what makes two
/// stage objects distinct.
#[derive(Debug)]
pub struct ShaderSource {
    id: ShaderId,
    stage: ShaderStage,
    source: Cow<'static, str>,
}

impl ShaderSource {
    /// Creates a stage with a freshly allocated token.
    pub fn new(stage: ShaderStage, source: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id: ShaderId::next(),
            stage,
            source: source.into(),
        }
    }

    pub(crate) const fn builtin(id: ShaderId, stage: ShaderStage, source: &'static str) -> Self {
        Self {
            id,
            stage,
            source: Cow::Borrowed(source),
        }
    }

    #[inline]
    pub fn id(&self) -> ShaderId {
        self.id
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }
}
