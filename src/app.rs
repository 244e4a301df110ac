//! Window, GL context and event routing for the preview.
//!
//! Everything runs on the event-loop thread: the watcher is polled in
//! `AboutToWait`, reloads are applied inside `RedrawRequested` at the frame
//! boundary, and input only mutates the pointer/timer state the next frame reads.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Instant;

use glutin::config::ConfigTemplateBuilder;
use glutin::context::{ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentContext, PossiblyCurrentContext, Version};
use glutin::display::GetGlDisplay;
use glutin::error::ErrorKind;
use glutin::prelude::*;
use glutin::surface::{Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;
use raw_window_handle::HasRawWindowHandle;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{ModifiersState, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use vimshady::config::{PreviewConfig, WindowState};
use vimshady::controls::{action_for_key, ControlAction};
use vimshady::diagnostics::{self, ReloadReport};
use vimshady::gpu::GlowBackend;
use vimshady::render_loop::{diagnostics_of, LoopSettings, ReloadOutcome, RenderLoop};
use vimshady::texture::{load_noise, TextureImage, PROCEDURAL_SIZE};
use vimshady::watcher::{SourceWatcher, WatchEvent};
use vimshady::{loge, logi, logw, PreviewError, ShaderSource};

pub struct AppOptions {
    pub shader: PathBuf,
    pub config: PreviewConfig,
    pub window_state: WindowState,
    pub window_state_path: Option<PathBuf>,
}

struct App {
    window: Window,
    gl_surface: Surface<WindowSurface>,
    gl_context: PossiblyCurrentContext,
    backend: GlowBackend,
    render: RenderLoop<GlowBackend>,
    watcher: SourceWatcher,
    shader_name: String,
    modifiers: ModifiersState,
    cursor: [f32; 2],
    diagnostics_file: Option<PathBuf>,
    window_state_path: Option<PathBuf>,
    title: String,
    fatal: Option<PreviewError>,
}

fn non_zero(v: u32) -> NonZeroU32 {
    NonZeroU32::new(v).unwrap_or(NonZeroU32::MIN)
}

fn setup_error(what: &str, e: impl std::fmt::Display) -> PreviewError {
    PreviewError::Window(format!("{what}: {e}"))
}

pub fn run(opts: AppOptions) -> anyhow::Result<()> {
    let AppOptions { shader, config, window_state, window_state_path } = opts;

    let event_loop = EventLoop::new().map_err(|e| setup_error("creating event loop", e))?;
    let window_builder = WindowBuilder::new()
        .with_title("vimshady")
        .with_inner_size(PhysicalSize::new(window_state.width, window_state.height))
        .with_position(PhysicalPosition::new(window_state.x, window_state.y));

    let template = ConfigTemplateBuilder::new().with_alpha_size(8).with_depth_size(0);
    let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

    let (window, gl_config) = display_builder
        .build(&event_loop, template, |configs| {
            configs
                .reduce(|a, b| if a.num_samples() > b.num_samples() { a } else { b })
                // glutin only calls the picker with a non-empty set
                .expect("no GL configs offered")
        })
        .map_err(|e| setup_error("building display", e))?;

    let window = window.ok_or_else(|| setup_error("building display", "no window created"))?;

    let raw_window_handle = window.raw_window_handle();
    let gl_display = gl_config.display();

    let context_attributes = ContextAttributesBuilder::new()
        .with_profile(GlProfile::Core)
        .with_context_api(ContextApi::OpenGl(Some(Version::new(4, 1))))
        .build(Some(raw_window_handle));

    let not_current_gl_context: NotCurrentContext = unsafe {
        gl_display
            .create_context(&gl_config, &context_attributes)
            .map_err(|e| setup_error("create_context", e))?
    };

    let size = window.inner_size();
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        raw_window_handle,
        non_zero(size.width),
        non_zero(size.height),
    );

    let gl_surface = unsafe {
        gl_display
            .create_window_surface(&gl_config, &attrs)
            .map_err(|e| setup_error("create_window_surface", e))?
    };

    let gl_context = not_current_gl_context
        .make_current(&gl_surface)
        .map_err(|e| setup_error("make_current", e))?;

    let interval = if config.vsync { SwapInterval::Wait(NonZeroU32::MIN) } else { SwapInterval::DontWait };
    if let Err(e) = gl_surface.set_swap_interval(&gl_context, interval) {
        logw!("INIT", "could not set swap interval: {e}");
    }

    let gl = unsafe { glow::Context::from_loader_function_cstr(|s| gl_display.get_proc_address(s) as *const _) };
    let mut backend = GlowBackend::new(gl).map_err(|f| setup_error("creating vertex array", format!("{f:?}")))?;
    logi!("INIT", "renderer: {}", backend.renderer_info());

    let noise = load_noise(config.texture_dir.as_deref()).unwrap_or_else(|e| {
        logw!("TEXTURE", "{e}; using procedural noise");
        TextureImage::procedural_noise(PROCEDURAL_SIZE)
    });

    let mut render = RenderLoop::new(LoopSettings::from(&config), Instant::now());
    render.resize(size.width, size.height);
    render.pointer_mut().center(size.width as f32, size.height as f32);

    logi!("INIT", "watching {} ({:?})", shader.display(), config.watch_mode);
    let watcher = SourceWatcher::new(&shader, config.watch_mode, config.debounce(), config.poll_interval());

    let outcome = render.start(&mut backend, ShaderSource::load(&shader), &noise)?;

    let shader_name = shader
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| shader.display().to_string());

    let mut app = App {
        window,
        gl_surface,
        gl_context,
        backend,
        render,
        watcher,
        shader_name,
        modifiers: ModifiersState::empty(),
        cursor: [0.0, 0.0],
        diagnostics_file: config.diagnostics_file.clone(),
        window_state_path,
        title: String::new(),
        fatal: None,
    };
    app.publish(&outcome);
    app.refresh_title();

    event_loop
        .run(|event, target| app.handle(event, target))
        .map_err(|e| setup_error("event loop", e))?;

    app.finish()
}

impl App {
    fn handle(&mut self, event: Event<()>, target: &EventLoopWindowTarget<()>) {
        target.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => target.exit(),

                WindowEvent::ModifiersChanged(m) => self.modifiers = m.state(),

                WindowEvent::KeyboardInput { event, .. } => {
                    if !event.state.is_pressed() {
                        return;
                    }
                    if let PhysicalKey::Code(code) = event.physical_key {
                        if let Some(action) = action_for_key(code, self.modifiers) {
                            self.apply(action, target);
                        }
                    }
                }

                WindowEvent::Resized(new_size) => {
                    self.gl_surface
                        .resize(&self.gl_context, non_zero(new_size.width), non_zero(new_size.height));
                    self.render.resize(new_size.width, new_size.height);
                }

                WindowEvent::CursorMoved { position, .. } => {
                    self.cursor = self.render.pointer().to_gl(position.x, position.y);
                    self.render.pointer_mut().moved(self.cursor);
                }

                WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => match state {
                    ElementState::Pressed => self.render.pointer_mut().press(self.cursor),
                    ElementState::Released => self.render.pointer_mut().release(),
                },

                WindowEvent::MouseWheel { delta, .. } => {
                    let (dx, dy) = match delta {
                        MouseScrollDelta::LineDelta(x, y) => (x, y),
                        MouseScrollDelta::PixelDelta(p) => (p.x as f32, p.y as f32),
                    };
                    self.render.pointer_mut().scrolled(dx, dy);
                }

                WindowEvent::RedrawRequested => self.redraw(target),

                _ => {}
            },

            Event::AboutToWait => {
                self.poll_watcher();
                self.window.request_redraw();
            }

            Event::LoopExiting => self.save_window_state(),

            _ => {}
        }
    }

    fn apply(&mut self, action: ControlAction, target: &EventLoopWindowTarget<()>) {
        match action {
            ControlAction::TogglePause => self.render.timer_mut().toggle_pause(),
            ControlAction::AdjustSpeed(delta) => self.render.timer_mut().adjust_speed(delta),
            ControlAction::Reload => {
                logi!("INPUT", "reload requested");
                self.watcher.request_reload();
            }
            ControlAction::Quit => target.exit(),
        }
        logi!("INPUT", "{action:?} -> {}", self.render.timer().label());
        self.refresh_title();
    }

    fn poll_watcher(&mut self) {
        match self.watcher.poll(Instant::now()) {
            Some(WatchEvent::Changed(source)) => {
                self.render.notify_change(source);
                self.refresh_title();
            }
            Some(WatchEvent::SourceUnavailable { path, error }) => {
                self.write_report(&ReloadReport::unavailable(&path, &error));
            }
            None => {}
        }
    }

    fn redraw(&mut self, target: &EventLoopWindowTarget<()>) {
        match self.render.frame(&mut self.backend, Instant::now()) {
            Ok(Some(outcome)) => {
                self.publish(&outcome);
                self.refresh_title();
            }
            Ok(None) => {}
            Err(e) => {
                loge!("RENDER", "{e}");
                self.fatal = Some(e);
                target.exit();
                return;
            }
        }

        if let Err(e) = self.gl_surface.swap_buffers(&self.gl_context) {
            if e.error_kind() == ErrorKind::ContextLost {
                loge!("RENDER", "swap_buffers: {e}");
                self.fatal = Some(PreviewError::ContextLost);
                target.exit();
            } else {
                logw!("RENDER", "swap_buffers: {e}");
            }
        }
    }

    /// Log a build outcome and hand it to the editor.
    fn publish(&self, outcome: &ReloadOutcome) {
        match outcome {
            ReloadOutcome::Swapped { path, .. } => logi!("HOT", "reloaded frag: {}", path.display()),
            ReloadOutcome::Rejected { path, error } => {
                loge!("HOT", "{} rejected", path.display());
                diagnostics::emit("HOT", &diagnostics_of(error));
            }
        }
        self.write_report(&outcome.report());
    }

    fn write_report(&self, report: &ReloadReport) {
        let Some(target) = &self.diagnostics_file else {
            return;
        };
        if let Err(e) = report.write_to(target) {
            logw!("HOT", "{e}");
        }
    }

    fn refresh_title(&mut self) {
        let title = format!("vimshady | {} | {}", self.shader_name, self.render.status_label());
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
    }

    fn save_window_state(&self) {
        let Some(path) = &self.window_state_path else {
            return;
        };
        let size = self.window.inner_size();
        let (x, y) = self.window.outer_position().map(|p| (p.x, p.y)).unwrap_or((0, 0));
        let state = WindowState { x, y, width: size.width, height: size.height };
        match state.save(path) {
            Ok(()) => logi!("CONFIG", "window state saved to {}", path.display()),
            Err(e) => logw!("CONFIG", "{e}"),
        }
    }

    fn finish(mut self) -> anyhow::Result<()> {
        self.render.shutdown(&mut self.backend);
        self.backend.destroy();
        match self.fatal {
            Some(e) => Err(e.into()),
            None => {
                logi!("INIT", "bye");
                Ok(())
            }
        }
    }
}
