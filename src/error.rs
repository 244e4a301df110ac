use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostics::Diagnostics;

/// Why a shader build was rejected.
///
/// Every variant leaves the currently active program untouched.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader compile failed:\n{0}")]
    Compile(Diagnostics),

    #[error("program link failed:\n{0}")]
    Link(Diagnostics),

    /// The driver refused to hand out an object (out of memory, bad enum, ...).
    #[error("GPU resource error: {0}")]
    Backend(String),

    #[error("graphics context lost")]
    ContextLost,
}

impl ShaderError {
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            ShaderError::Compile(d) | ShaderError::Link(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PreviewError {
    /// The watched shader file is missing or unreadable. Non-fatal.
    #[error("shader source unavailable: {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// Nothing compiled at startup; the fallback program is rendering instead.
    #[error("initial compile failed, showing fallback: {0}")]
    InitialCompileFailure(#[source] ShaderError),

    /// Fatal to the render loop; needs a fresh context.
    #[error("graphics context lost")]
    ContextLost,

    #[error("I/O error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error for {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: config version {found} is not supported (expected {supported})", path.display())]
    UnsupportedConfigVersion { path: PathBuf, found: u32, supported: u32 },

    #[error("texture error for {}: {source}", path.display())]
    Texture {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("window setup failed: {0}")]
    Window(String),
}
