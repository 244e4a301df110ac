//! Preview configuration (`config.json`) and persisted window geometry (`window.json`).
//!
//! Both files are lenient: unknown keys are ignored, missing keys fall back to
//! defaults, and a file that fails to parse is reported and replaced by defaults
//! so the preview still starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compiler::DEFAULT_FALLBACK_COLOR;
use crate::error::PreviewError;
use crate::logw;
use crate::watcher::WatchMode;

pub const APP_DIR: &str = "vimshady";

/// `version` this build reads. Older layouts did not exist; newer ones are refused.
pub const CONFIG_VERSION: u32 = 1;

const MIN_WINDOW_SIDE: u32 = 64;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Layout version of the file, see [`CONFIG_VERSION`].
    pub version: u32,

    /// Where `noise.*` is looked up. Relative paths resolve against the config file.
    pub texture_dir: Option<PathBuf>,

    /// Quiet period after the last write before a reload is attempted.
    pub debounce_ms: u64,

    pub watch_mode: WatchMode,

    /// Poll cadence for `watch_mode: "poll"` (and notify's own poll backend).
    pub poll_interval_ms: u64,

    pub vsync: bool,

    /// Color of the program shown while nothing has compiled.
    pub fallback_color: [f32; 4],

    /// Value fed to `uniform vec2 test`.
    pub test: [f32; 2],

    /// If set, every reload outcome is written here as JSON for the editor.
    pub diagnostics_file: Option<PathBuf>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            texture_dir: None,
            debounce_ms: 150,
            watch_mode: WatchMode::Notify,
            poll_interval_ms: 250,
            vsync: true,
            fallback_color: DEFAULT_FALLBACK_COLOR,
            test: [0.0, 0.0],
            diagnostics_file: None,
        }
    }
}

impl PreviewConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn parse(src: &str, path: &Path) -> Result<Self, PreviewError> {
        let mut cfg: Self = serde_json::from_str(src).map_err(|e| PreviewError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        if cfg.version == 0 || cfg.version > CONFIG_VERSION {
            return Err(PreviewError::UnsupportedConfigVersion {
                path: path.to_path_buf(),
                found: cfg.version,
                supported: CONFIG_VERSION,
            });
        }
        if let (Some(dir), Some(base)) = (cfg.texture_dir.as_ref(), path.parent()) {
            if dir.is_relative() {
                cfg.texture_dir = Some(base.join(dir));
            }
        }
        Ok(cfg)
    }

    /// Load `path`; a missing file means defaults, a broken one is logged and ignored.
    pub fn load_or_default(path: &Path) -> Self {
        let data = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(_) => return Self::default(),
        };
        match Self::parse(&data, path) {
            Ok(cfg) => cfg,
            Err(e) => {
                logw!("CONFIG", "{e}. Using defaults.");
                Self::default()
            }
        }
    }
}

/// `<config_dir>/vimshady/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.json"))
}

/// Window position/size remembered between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowState {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowState {
    fn default() -> Self {
        Self { x: 0, y: 0, width: 640, height: 480 }
    }
}

impl WindowState {
    pub fn load_or_default(path: &Path) -> Self {
        let Ok(data) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Self>(&data) {
            Ok(s) => s.clamped(),
            Err(e) => {
                logw!("CONFIG", "ignoring {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PreviewError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| PreviewError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| PreviewError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| PreviewError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn clamped(self) -> Self {
        Self {
            width: self.width.max(MIN_WINDOW_SIDE),
            height: self.height.max(MIN_WINDOW_SIDE),
            ..self
        }
    }
}

/// `<data_dir>/vimshady/window.json`
pub fn default_window_state_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR).join("window.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults_and_unknown_keys_are_ignored() {
        let cfg = PreviewConfig::parse(r#"{ "debounce_ms": 40, "shiny": true }"#, Path::new("/x/config.json")).unwrap();
        assert_eq!(cfg.debounce(), Duration::from_millis(40));
        assert_eq!(cfg.watch_mode, WatchMode::Notify);
        assert_eq!(cfg.fallback_color, DEFAULT_FALLBACK_COLOR);
    }

    #[test]
    fn relative_texture_dir_resolves_against_config_file() {
        let cfg = PreviewConfig::parse(
            r#"{ "texture_dir": "textures", "watch_mode": "poll" }"#,
            Path::new("/home/me/.config/vimshady/config.json"),
        )
        .unwrap();
        assert_eq!(cfg.texture_dir, Some(PathBuf::from("/home/me/.config/vimshady/textures")));
        assert_eq!(cfg.watch_mode, WatchMode::Poll);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(PreviewConfig::load_or_default(&path), PreviewConfig::default());
        assert_eq!(PreviewConfig::load_or_default(&dir.path().join("absent.json")), PreviewConfig::default());
    }

    #[test]
    fn newer_config_versions_are_refused() {
        let path = Path::new("/x/config.json");
        let err = PreviewConfig::parse(r#"{ "version": 2, "debounce_ms": 5 }"#, path).unwrap_err();
        assert!(
            matches!(err, PreviewError::UnsupportedConfigVersion { found: 2, supported: CONFIG_VERSION, .. }),
            "{err:?}"
        );
        assert!(PreviewConfig::parse(r#"{ "version": 0 }"#, path).is_err());
        assert_eq!(PreviewConfig::parse(r#"{ "version": 1 }"#, path).unwrap().version, CONFIG_VERSION);

        // the whole file is ignored, not just the version key
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, r#"{ "version": 7, "debounce_ms": 5 }"#).unwrap();
        assert_eq!(PreviewConfig::load_or_default(&file), PreviewConfig::default());
    }

    #[test]
    fn window_state_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("window.json");
        let state = WindowState { x: 10, y: 20, width: 800, height: 600 };
        state.save(&path).unwrap();
        assert_eq!(WindowState::load_or_default(&path), state);
    }

    #[test]
    fn tiny_windows_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("window.json");
        std::fs::write(&path, r#"{ "width": 1, "height": 0 }"#).unwrap();
        let s = WindowState::load_or_default(&path);
        assert_eq!((s.width, s.height), (MIN_WINDOW_SIDE, MIN_WINDOW_SIDE));
    }
}
