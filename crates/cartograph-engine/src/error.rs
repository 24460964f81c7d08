use std::fmt;

use crate::shader::ShaderStage;

/// Errors raised by the rendering backend.
///
/// Compile and link failures are only ever returned while the device context is
/// live; the same failures on a lost context are swallowed by the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The device rejected a shader stage. `log` is the device diagnostic.
    Compile { stage: ShaderStage, log: String },
    /// The device failed to link a program. `log` is the device diagnostic.
    Link { log: String },
    /// No renderer exists for this layer kind.
    UnsupportedLayerKind { kind: &'static str },
    /// Pixel data does not match the declared image dimensions.
    InvalidImage {
        locator: String,
        expected: usize,
        actual: usize,
    },
    /// The surface could not present a frame and cannot recover.
    Present { message: String },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Compile { stage, log } => {
                write!(f, "{stage} shader failed to compile: {log}")
            }
            RenderError::Link { log } => write!(f, "program failed to link: {log}"),
            RenderError::UnsupportedLayerKind { kind } => {
                write!(f, "no renderer for layer kind `{kind}`")
            }
            RenderError::InvalidImage { locator, expected, actual } => write!(
                f,
                "image `{locator}` has {actual} bytes of pixel data, expected {expected}"
            ),
            RenderError::Present { message } => write!(f, "failed to present frame: {message}"),
        }
    }
}

impl std::error::Error for RenderError {}
