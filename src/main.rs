use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use vimshady::config::{default_config_path, default_window_state_path, PreviewConfig, WindowState};
use vimshady::watcher::WatchMode;
use vimshady::{loge, logging, logi};

mod app;

/// Live fragment-shader preview: edit the file, watch the window.
#[derive(Debug, Parser)]
#[command(name = "vimshady", version, about)]
struct Cli {
    /// Fragment shader to watch (GLSL 4.10 core)
    shader: PathBuf,

    /// Preview config (JSON). Defaults to <config_dir>/vimshady/config.json
    #[arg(long, env = "VIMSHADY_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding noise.png (or any image named `noise`)
    #[arg(long)]
    texture_dir: Option<PathBuf>,

    /// Append log lines to this file as well
    #[arg(long, env = "VIMSHADY_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Write a JSON report of every reload here (for the editor's quickfix list)
    #[arg(long)]
    diagnostics_file: Option<PathBuf>,

    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Poll mtime instead of using OS file notifications
    #[arg(long)]
    poll: bool,
}

impl Cli {
    /// Flags win over the config file.
    fn apply(&self, cfg: &mut PreviewConfig) {
        if let Some(dir) = &self.texture_dir {
            cfg.texture_dir = Some(dir.clone());
        }
        if let Some(file) = &self.diagnostics_file {
            cfg.diagnostics_file = Some(file.clone());
        }
        if let Some(ms) = self.debounce_ms {
            cfg.debounce_ms = ms;
        }
        if self.poll {
            cfg.watch_mode = WatchMode::Poll;
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir().map(|cwd| cwd.join(path)).unwrap_or_else(|_| path.to_path_buf())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().or_else(default_config_path);
    let mut config = match &config_path {
        Some(p) => {
            logi!("CONFIG", "config: {}", p.display());
            PreviewConfig::load_or_default(p)
        }
        None => PreviewConfig::default(),
    };
    cli.apply(&mut config);

    let window_state_path = default_window_state_path();
    let window_state = window_state_path
        .as_deref()
        .map(WindowState::load_or_default)
        .unwrap_or_default();

    app::run(app::AppOptions {
        shader: absolute(&cli.shader),
        config,
        window_state,
        window_state_path,
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_file.clone());
    logi!("INIT", "vimshady {}", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            loge!("INIT", "{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from(["vimshady", "s.glsl", "--poll", "--debounce-ms", "20", "--texture-dir", "tex"]);
        let mut cfg = PreviewConfig::default();
        cli.apply(&mut cfg);
        assert_eq!(cfg.watch_mode, WatchMode::Poll);
        assert_eq!(cfg.debounce_ms, 20);
        assert_eq!(cfg.texture_dir, Some(PathBuf::from("tex")));
    }

    #[test]
    fn relative_shader_paths_become_absolute() {
        assert!(absolute(Path::new("s.glsl")).is_absolute());
    }
}
