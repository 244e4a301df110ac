use std::path::{Path, PathBuf};

use crate::error::PreviewError;

/// Fragment shader text plus where it came from.
///
/// The render loop only ever sees an owned snapshot; the file on disk keeps changing
/// underneath it as the user saves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    path: PathBuf,
    text: String,
}

impl ShaderSource {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self { path: path.into(), text: text.into() }
    }

    /// Read the shader from disk. A missing or unreadable file is `SourceUnavailable`.
    pub fn load(path: &Path) -> Result<Self, PreviewError> {
        let text = std::fs::read_to_string(path).map_err(|e| PreviewError::SourceUnavailable {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::new(path, text))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Resolve a config-provided path relative to `base` unless it is already absolute.
pub fn resolve_path(base: &Path, s: &str) -> PathBuf {
    let p = PathBuf::from(s);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}
