//! Shader compiler/linker.
//!
//! Builds a program from the user's fragment stage and a fixed vertex stage, then
//! resolves the fixed uniform set by name. A failed build releases every
//! intermediate object and reports diagnostics; it never touches whatever program
//! the caller currently has active. Swap-or-reject is decided by the caller holding
//! on to its old program until `compile` returns `Ok`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostic, Diagnostics, Severity, Stage};
use crate::error::ShaderError;
use crate::gpu::{ActiveUniform, GpuBackend, GpuFailure, ShaderStage};
use crate::source::ShaderSource;
use crate::uniforms::{FixedUniform, UniformLocations};
use crate::logw;

/// Full-screen quad drawn as a 4-vertex triangle strip from `gl_VertexID`.
/// `out_texcoord.xy` is the [0,1] uv, `zw` is (0, 1).
pub const VERTEX_SOURCE: &str = r#"#version 410 core
out vec4 out_texcoord;

void main()
{
    vec2 pos = vec2(float(gl_VertexID & 1), float((gl_VertexID >> 1) & 1)) * 2.0 - 1.0;
    out_texcoord = vec4(pos * 0.5 + 0.5, 0.0, 1.0);
    gl_Position = vec4(pos, 0.0, 1.0);
}
"#;

pub const DEFAULT_FALLBACK_COLOR: [f32; 4] = [0.25, 0.0, 0.25, 1.0];

/// Solid-color fragment stage shown when nothing has compiled yet.
pub fn fallback_fragment_source(color: [f32; 4]) -> String {
    let [r, g, b, a] = color;
    format!(
        "#version 410 core\n\
         layout(location = 0) out vec4 out_color;\n\
         void main()\n\
         {{\n    out_color = vec4({r:.4}, {g:.4}, {b:.4}, {a:.4});\n}}\n"
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramOrigin {
    User(PathBuf),
    Fallback,
}

/// A linked program plus its resolved fixed-uniform locations.
///
/// Not `Drop`: releasing needs the backend, so the owner calls [`CompiledProgram::release`].
pub struct CompiledProgram<B: GpuBackend> {
    handle: B::Program,
    locations: UniformLocations<B::Location>,
    uniforms: Vec<ActiveUniform>,
    origin: ProgramOrigin,
}

impl<B: GpuBackend> CompiledProgram<B> {
    pub fn handle(&self) -> B::Program {
        self.handle
    }

    pub fn locations(&self) -> &UniformLocations<B::Location> {
        &self.locations
    }

    /// Every active uniform the driver reports, fixed or not.
    pub fn uniforms(&self) -> &[ActiveUniform] {
        &self.uniforms
    }

    pub fn origin(&self) -> &ProgramOrigin {
        &self.origin
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == ProgramOrigin::Fallback
    }

    pub fn source_path(&self) -> Option<&Path> {
        match &self.origin {
            ProgramOrigin::User(p) => Some(p),
            ProgramOrigin::Fallback => None,
        }
    }

    /// Declared uniforms this pipeline does not feed (left for manual experiments).
    pub fn unbound_uniforms(&self) -> impl Iterator<Item = &ActiveUniform> {
        self.uniforms.iter().filter(|u| {
            // arrays report as `name[0]`
            let base = u.name.split('[').next().unwrap_or(&u.name);
            FixedUniform::from_name(base).is_none()
        })
    }

    pub fn release(self, backend: &mut B) {
        backend.delete_program(self.handle);
    }
}

impl<B: GpuBackend> fmt::Debug for CompiledProgram<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("handle", &self.handle)
            .field("origin", &self.origin)
            .field("uniforms", &self.uniforms)
            .finish()
    }
}

/// Compile + link `source` against the fixed vertex stage.
pub fn compile<B: GpuBackend>(backend: &mut B, source: &ShaderSource) -> Result<CompiledProgram<B>, ShaderError> {
    let handle = build(backend, source.text())?;
    Ok(finish(backend, handle, ProgramOrigin::User(source.path().to_path_buf())))
}

/// Build the solid-color fallback program.
pub fn compile_fallback<B: GpuBackend>(backend: &mut B, color: [f32; 4]) -> Result<CompiledProgram<B>, ShaderError> {
    let handle = build(backend, &fallback_fragment_source(color))?;
    Ok(finish(backend, handle, ProgramOrigin::Fallback))
}

fn build<B: GpuBackend>(backend: &mut B, fragment: &str) -> Result<B::Program, ShaderError> {
    let vs = backend
        .compile_shader(ShaderStage::Vertex, VERTEX_SOURCE)
        .map_err(|f| failure_to_error(Stage::Vertex, f))?;

    let fs = match backend.compile_shader(ShaderStage::Fragment, fragment) {
        Ok(fs) => fs,
        Err(f) => {
            backend.delete_shader(vs);
            return Err(failure_to_error(Stage::Fragment, f));
        }
    };

    backend
        .link_program(vs, fs)
        .map_err(|f| failure_to_error(Stage::Link, f))
}

fn finish<B: GpuBackend>(backend: &mut B, handle: B::Program, origin: ProgramOrigin) -> CompiledProgram<B> {
    let mut locations = UniformLocations::resolve(|name| backend.uniform_location(handle, name));
    let uniforms = backend.active_uniforms(handle);
    for (u, declared) in mistyped(&uniforms) {
        logw!(
            "HOT",
            "{} is declared as {declared} but is fed as {}; leaving it unbound",
            u.name(),
            u.kind().glsl_name()
        );
        locations.unbind(u);
    }
    CompiledProgram { handle, locations, uniforms, origin }
}

/// Fixed uniforms whose declared type differs from the one the pipeline uploads.
/// Setting them would raise GL_INVALID_OPERATION every frame.
fn mistyped(uniforms: &[ActiveUniform]) -> Vec<(FixedUniform, &str)> {
    uniforms
        .iter()
        .filter_map(|a| {
            let base = a.name.split('[').next().unwrap_or(&a.name);
            let u = FixedUniform::from_name(base)?;
            (a.type_name != u.kind().glsl_name()).then_some((u, a.type_name.as_str()))
        })
        .collect()
}

fn failure_to_error(stage: Stage, failure: GpuFailure) -> ShaderError {
    match failure {
        GpuFailure::Rejected(log) => {
            let mut d = Diagnostics::from_info_log(stage, &log, Severity::Error);
            if d.is_empty() {
                d.push(Diagnostic::error(stage, "rejected by the driver without an info log"));
            }
            match stage {
                Stage::Link => ShaderError::Link(d),
                Stage::Vertex | Stage::Fragment => ShaderError::Compile(d),
            }
        }
        GpuFailure::Resource(msg) => ShaderError::Backend(msg),
        GpuFailure::ContextLost => ShaderError::ContextLost,
    }
}
