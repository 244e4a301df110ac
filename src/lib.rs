//! vimshady: live fragment-shader preview with hot reload.
//!
//! The binary wires these pieces to a winit window and an OpenGL context. Everything
//! here is usable without a window: the render loop and compiler are generic over
//! [`gpu::GpuBackend`].

pub mod logging;

pub mod compiler;
pub mod config;
pub mod controls;
pub mod diagnostics;
pub mod error;
pub mod gpu;
pub mod input;
pub mod render_loop;
pub mod source;
pub mod texture;
pub mod timer;
pub mod uniforms;
pub mod watcher;

pub use compiler::{compile, compile_fallback, CompiledProgram};
pub use error::{PreviewError, ShaderError};
pub use render_loop::{RenderLoop, RenderState, ReloadOutcome};
pub use source::ShaderSource;
pub use watcher::{SourceWatcher, WatchEvent, WatchMode};
