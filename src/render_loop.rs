//! Render loop: owns the active program and hot-swaps it at frame boundaries.
//!
//! States:
//! - `Idle`: nothing started (or shut down). Frames are no-ops.
//! - `Rendering`: the last build succeeded.
//! - `ReloadPending`: a new source arrived and is compiled at the next frame.
//! - `ReloadFailed`: the last build failed; the previous program (or the
//!   fallback, before any success) keeps rendering.
//!
//! The active program is only replaced after its successor linked, so there is
//! always exactly one program to draw with once started.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::compiler::{compile, compile_fallback, CompiledProgram};
use crate::config::PreviewConfig;
use crate::diagnostics::{Diagnostic, Diagnostics, ReloadReport, ReportStatus, Stage};
use crate::error::{PreviewError, ShaderError};
use crate::gpu::{ActiveUniform, GpuBackend, GpuFailure};
use crate::input::PointerState;
use crate::source::ShaderSource;
use crate::texture::TextureImage;
use crate::timer::Timer;
use crate::uniforms::{UniformFrame, NOISE_TEXTURE_UNIT};
use crate::{loge, logi, logw};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Rendering,
    ReloadPending,
    ReloadFailed,
}

/// Result of one build attempt (startup or reload).
#[derive(Debug)]
pub enum ReloadOutcome {
    Swapped {
        path: PathBuf,
        uniforms: Vec<ActiveUniform>,
    },
    /// The build was rejected. At startup `error` is `InitialCompileFailure` or
    /// `SourceUnavailable` and the fallback program is active.
    Rejected {
        path: PathBuf,
        error: PreviewError,
    },
}

impl ReloadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            ReloadOutcome::Swapped { path, .. } | ReloadOutcome::Rejected { path, .. } => path,
        }
    }

    pub fn is_swapped(&self) -> bool {
        matches!(self, ReloadOutcome::Swapped { .. })
    }

    pub fn error(&self) -> Option<&PreviewError> {
        match self {
            ReloadOutcome::Rejected { error, .. } => Some(error),
            ReloadOutcome::Swapped { .. } => None,
        }
    }

    /// The editor-facing summary of this outcome.
    pub fn report(&self) -> ReloadReport {
        match self {
            ReloadOutcome::Swapped { path, uniforms } => {
                ReloadReport::new(ReportStatus::Ok, path, Diagnostics::new(), uniforms.clone())
            }
            ReloadOutcome::Rejected { path, error } => {
                let status = match error {
                    PreviewError::SourceUnavailable { .. } => ReportStatus::Unavailable,
                    PreviewError::InitialCompileFailure(_) => ReportStatus::Fallback,
                    _ => ReportStatus::Failed,
                };
                ReloadReport::new(status, path, diagnostics_of(error), Vec::new())
            }
        }
    }
}

/// Diagnostics carried by `error`, or a single line-less entry describing it.
pub fn diagnostics_of(error: &PreviewError) -> Diagnostics {
    let shader = match error {
        PreviewError::Shader(e) | PreviewError::InitialCompileFailure(e) => Some(e),
        _ => None,
    };
    if let Some(d) = shader.and_then(ShaderError::diagnostics) {
        return d.clone();
    }
    let mut d = Diagnostics::new();
    d.push(Diagnostic::error(Stage::Fragment, error.to_string()));
    d
}

/// Values the loop needs from the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    pub test: [f32; 2],
    pub fallback_color: [f32; 4],
}

impl From<&PreviewConfig> for LoopSettings {
    fn from(cfg: &PreviewConfig) -> Self {
        Self { test: cfg.test, fallback_color: cfg.fallback_color }
    }
}

pub struct RenderLoop<B: GpuBackend> {
    state: RenderState,
    settings: LoopSettings,
    active: Option<CompiledProgram<B>>,
    pending: Option<ShaderSource>,
    noise: Option<B::Texture>,
    timer: Timer,
    pointer: PointerState,
    size: [u32; 2],
    last_frame: UniformFrame,
    frames: u64,
}

impl<B: GpuBackend> RenderLoop<B> {
    pub fn new(settings: LoopSettings, start: Instant) -> Self {
        Self {
            state: RenderState::Idle,
            settings,
            active: None,
            pending: None,
            noise: None,
            timer: Timer::new(start),
            pointer: PointerState::new(),
            size: [1, 1],
            last_frame: UniformFrame::default(),
            frames: 0,
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn active(&self) -> Option<&CompiledProgram<B>> {
        self.active.as_ref()
    }

    /// Uniform values used by the most recent frame.
    pub fn last_frame(&self) -> &UniformFrame {
        &self.last_frame
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn pointer_mut(&mut self) -> &mut PointerState {
        &mut self.pointer
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = [width.max(1), height.max(1)];
        self.pointer.set_viewport_height(self.size[1] as f32);
    }

    /// Upload the noise texture and build the first program.
    ///
    /// A source that is unreadable or fails to build leaves the fallback program
    /// active (state `ReloadFailed`); that is reported in the outcome, not as `Err`.
    /// `Err` means nothing can be drawn at all. Calling this again restarts the loop.
    pub fn start(
        &mut self,
        backend: &mut B,
        initial: Result<ShaderSource, PreviewError>,
        noise: &TextureImage,
    ) -> Result<ReloadOutcome, PreviewError> {
        if self.state != RenderState::Idle {
            logw!("RENDER", "restarting render loop");
            self.shutdown(backend);
        }

        let texture = backend.create_texture(noise).map_err(|f| match f {
            GpuFailure::ContextLost => PreviewError::ContextLost,
            GpuFailure::Rejected(msg) | GpuFailure::Resource(msg) => ShaderError::Backend(msg).into(),
        })?;
        self.noise = Some(texture);

        let started = self.install_initial(backend, initial);
        if started.is_err() {
            // nothing to draw with: give the texture back and stay Idle
            self.shutdown(backend);
        }
        started
    }

    fn install_initial(
        &mut self,
        backend: &mut B,
        initial: Result<ShaderSource, PreviewError>,
    ) -> Result<ReloadOutcome, PreviewError> {
        let (path, error) = match initial {
            Ok(source) => match compile(backend, &source) {
                Ok(program) => {
                    let outcome = self.install(backend, program);
                    self.state = RenderState::Rendering;
                    return Ok(outcome);
                }
                Err(ShaderError::ContextLost) => return Err(PreviewError::ContextLost),
                Err(e) => (source.path().to_path_buf(), PreviewError::InitialCompileFailure(e)),
            },
            Err(e) => {
                let path = match &e {
                    PreviewError::SourceUnavailable { path, .. } => path.clone(),
                    _ => PathBuf::new(),
                };
                (path, e)
            }
        };

        loge!("RENDER", "{error}");
        let fallback = compile_fallback(backend, self.settings.fallback_color).map_err(|e| match e {
            ShaderError::ContextLost => PreviewError::ContextLost,
            other => PreviewError::InitialCompileFailure(other),
        })?;
        logw!("RENDER", "showing fallback program until {} compiles", path.display());
        self.active = Some(fallback);
        self.state = RenderState::ReloadFailed;
        Ok(ReloadOutcome::Rejected { path, error })
    }

    /// Queue `source` for the next frame boundary. The latest queued source wins.
    pub fn notify_change(&mut self, source: ShaderSource) {
        if self.state == RenderState::Idle {
            logw!("HOT", "ignoring change to {} before start", source.path().display());
            return;
        }
        if self.pending.is_some() {
            logi!("HOT", "superseding queued source with newer {}", source.path().display());
        }
        self.pending = Some(source);
        self.state = RenderState::ReloadPending;
    }

    /// Build the queued source, if any, and swap it in on success.
    ///
    /// Normally called by [`RenderLoop::frame`]; exposed for callers that want to
    /// reload without drawing.
    pub fn apply_pending(&mut self, backend: &mut B) -> Result<Option<ReloadOutcome>, PreviewError> {
        let Some(source) = self.pending.take() else {
            return Ok(None);
        };
        match compile(backend, &source) {
            Ok(program) => {
                let outcome = self.install(backend, program);
                self.state = RenderState::Rendering;
                Ok(Some(outcome))
            }
            Err(ShaderError::ContextLost) => Err(PreviewError::ContextLost),
            Err(e) => {
                logw!("HOT", "compile failed for {} (keeping previous)", source.path().display());
                self.state = RenderState::ReloadFailed;
                Ok(Some(ReloadOutcome::Rejected {
                    path: source.path().to_path_buf(),
                    error: PreviewError::Shader(e),
                }))
            }
        }
    }

    /// Draw one frame. Returns the outcome of a reload applied at this boundary.
    pub fn frame(&mut self, backend: &mut B, now: Instant) -> Result<Option<ReloadOutcome>, PreviewError> {
        if self.state == RenderState::Idle {
            return Ok(None);
        }
        if backend.context_lost() {
            loge!("RENDER", "graphics context lost after {} frames", self.frames);
            return Err(PreviewError::ContextLost);
        }

        let outcome = self.apply_pending(backend)?;

        let tick = self.timer.tick(now);
        let resolution = [self.size[0] as f32, self.size[1] as f32];
        let frame = UniformFrame::build(tick, resolution, &self.pointer, self.settings.test);
        self.last_frame = frame;

        backend.begin_frame(self.size[0], self.size[1]);
        if let Some(program) = &self.active {
            backend.use_program(program.handle());
            if let Some(tex) = self.noise {
                backend.bind_texture(NOISE_TEXTURE_UNIT, tex);
            }
            for (u, loc) in program.locations().bound() {
                backend.set_uniform(loc, frame.value(u));
            }
            backend.draw_fullscreen_quad();
        }
        self.frames += 1;
        Ok(outcome)
    }

    /// Release every GPU object and go back to `Idle`.
    pub fn shutdown(&mut self, backend: &mut B) {
        if let Some(program) = self.active.take() {
            program.release(backend);
        }
        if let Some(tex) = self.noise.take() {
            backend.delete_texture(tex);
        }
        self.pending = None;
        self.state = RenderState::Idle;
    }

    /// Short status for the window title.
    pub fn status_label(&self) -> String {
        let fallback = self.active.as_ref().is_some_and(|p| p.is_fallback());
        let reload = match self.state {
            RenderState::Idle => "idle",
            RenderState::Rendering => "ok",
            RenderState::ReloadPending => "reloading",
            RenderState::ReloadFailed if fallback => "error (fallback)",
            RenderState::ReloadFailed => "error (last good)",
        };
        format!("{} | {reload}", self.timer.label())
    }

    fn install(&mut self, backend: &mut B, program: CompiledProgram<B>) -> ReloadOutcome {
        let path = program.source_path().map(Path::to_path_buf).unwrap_or_default();
        let uniforms = program.uniforms().to_vec();

        let names: Vec<&str> = uniforms.iter().map(|u| u.name.as_str()).collect();
        logi!("HOT", "loaded {} | uniforms detected: {}", path.display(), names.join(", "));
        let unbound: Vec<&str> = program.unbound_uniforms().map(|u| u.name.as_str()).collect();
        if !unbound.is_empty() {
            logi!("HOT", "left unbound: {}", unbound.join(", "));
        }

        if let Some(old) = self.active.replace(program) {
            old.release(backend);
        }
        ReloadOutcome::Swapped { path, uniforms }
    }
}
