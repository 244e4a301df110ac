//! GPU backend seam.
//!
//! The render loop and compiler only talk to [`GpuBackend`]. The real implementation
//! is [`GlowBackend`] (OpenGL via `glow`); tests drive the same code with a fake.
//! All calls happen on the render thread that owns the context.

use glow::HasContext;
use serde::Serialize;

use crate::texture::TextureImage;
use crate::logw;
use crate::uniforms::UniformValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// A backend call that did not produce an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuFailure {
    /// The driver compiled/linked and said no; carries the info log.
    Rejected(String),
    /// Object creation itself failed.
    Resource(String),
    ContextLost,
}

/// A uniform the driver reports as active in a linked program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveUniform {
    pub name: String,
    pub type_name: String,
    pub size: i32,
}

pub trait GpuBackend {
    type Shader;
    type Program: Copy + std::fmt::Debug;
    type Location: Clone + std::fmt::Debug;
    type Texture: Copy + std::fmt::Debug;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Shader, GpuFailure>;

    fn delete_shader(&mut self, shader: Self::Shader);

    /// Link both stages. The stage objects are consumed and released either way.
    fn link_program(&mut self, vertex: Self::Shader, fragment: Self::Shader) -> Result<Self::Program, GpuFailure>;

    fn delete_program(&mut self, program: Self::Program);

    fn uniform_location(&mut self, program: Self::Program, name: &str) -> Option<Self::Location>;

    fn active_uniforms(&mut self, program: Self::Program) -> Vec<ActiveUniform>;

    fn create_texture(&mut self, image: &TextureImage) -> Result<Self::Texture, GpuFailure>;

    fn delete_texture(&mut self, texture: Self::Texture);

    /// Set the viewport and clear the default framebuffer.
    fn begin_frame(&mut self, width: u32, height: u32);

    fn use_program(&mut self, program: Self::Program);

    fn bind_texture(&mut self, unit: u32, texture: Self::Texture);

    fn set_uniform(&mut self, location: &Self::Location, value: UniformValue);

    fn draw_fullscreen_quad(&mut self);

    fn context_lost(&mut self) -> bool;
}

// glGetError keeps one flag per code, so a handful of reads empties the queue.
const MAX_QUEUED_ERRORS: usize = 8;

fn gl_error_name(code: u32) -> &'static str {
    match code {
        glow::INVALID_ENUM => "GL_INVALID_ENUM",
        glow::INVALID_VALUE => "GL_INVALID_VALUE",
        glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
        glow::STACK_OVERFLOW => "GL_STACK_OVERFLOW",
        glow::STACK_UNDERFLOW => "GL_STACK_UNDERFLOW",
        glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        glow::CONTEXT_LOST => "GL_CONTEXT_LOST",
        _ => "unknown",
    }
}

/// Codes already logged since the last successful link. A broken draw raises the
/// same error every frame; it is logged once per program.
#[derive(Debug, Default)]
struct ErrorLatch {
    seen: Vec<u32>,
}

impl ErrorLatch {
    /// True the first time `code` is seen.
    fn report(&mut self, code: u32) -> bool {
        if self.seen.contains(&code) {
            return false;
        }
        self.seen.push(code);
        true
    }

    fn reset(&mut self) {
        self.seen.clear();
    }
}

/// OpenGL backend. Owns the `glow` context plus the empty VAO the quad is drawn with
/// (core profile requires one bound even though positions come from `gl_VertexID`).
pub struct GlowBackend {
    gl: glow::Context,
    vao: glow::NativeVertexArray,
    errors: ErrorLatch,
}

impl GlowBackend {
    pub fn new(gl: glow::Context) -> Result<Self, GpuFailure> {
        let vao = unsafe { gl.create_vertex_array() }.map_err(GpuFailure::Resource)?;
        Ok(Self { gl, vao, errors: ErrorLatch::default() })
    }

    pub fn renderer_info(&self) -> String {
        unsafe {
            format!(
                "{} / {}",
                self.gl.get_parameter_string(glow::RENDERER),
                self.gl.get_parameter_string(glow::VERSION)
            )
        }
    }

    pub fn destroy(self) {
        unsafe { self.gl.delete_vertex_array(self.vao) };
    }
}

impl GpuBackend for GlowBackend {
    type Shader = glow::NativeShader;
    type Program = glow::NativeProgram;
    type Location = glow::NativeUniformLocation;
    type Texture = glow::NativeTexture;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Shader, GpuFailure> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe {
            let shader = self.gl.create_shader(kind).map_err(GpuFailure::Resource)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(GpuFailure::Rejected(log));
            }
            Ok(shader)
        }
    }

    fn delete_shader(&mut self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) };
    }

    fn link_program(&mut self, vertex: Self::Shader, fragment: Self::Shader) -> Result<Self::Program, GpuFailure> {
        unsafe {
            let program = match self.gl.create_program() {
                Ok(p) => p,
                Err(e) => {
                    self.gl.delete_shader(vertex);
                    self.gl.delete_shader(fragment);
                    return Err(GpuFailure::Resource(e));
                }
            };
            self.gl.attach_shader(program, vertex);
            self.gl.attach_shader(program, fragment);
            self.gl.link_program(program);

            let linked = self.gl.get_program_link_status(program);
            let log = if linked { String::new() } else { self.gl.get_program_info_log(program) };

            self.gl.detach_shader(program, vertex);
            self.gl.detach_shader(program, fragment);
            self.gl.delete_shader(vertex);
            self.gl.delete_shader(fragment);

            if !linked {
                self.gl.delete_program(program);
                return Err(GpuFailure::Rejected(log));
            }
            self.errors.reset();
            Ok(program)
        }
    }

    fn delete_program(&mut self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) };
    }

    fn uniform_location(&mut self, program: Self::Program, name: &str) -> Option<Self::Location> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn active_uniforms(&mut self, program: Self::Program) -> Vec<ActiveUniform> {
        unsafe {
            let count = self.gl.get_active_uniforms(program);
            (0..count)
                .filter_map(|i| self.gl.get_active_uniform(program, i))
                .map(|u| ActiveUniform {
                    name: u.name,
                    type_name: glsl_type_name(u.utype),
                    size: u.size,
                })
                .collect()
        }
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<Self::Texture, GpuFailure> {
        unsafe {
            let tex = self.gl.create_texture().map_err(GpuFailure::Resource)?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(tex));
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::SRGB8_ALPHA8 as i32,
                image.width as i32,
                image.height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(image.rgba.as_slice())),
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            Ok(tex)
        }
    }

    fn delete_texture(&mut self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) };
    }

    fn begin_frame(&mut self, width: u32, height: u32) {
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.gl.viewport(0, 0, width as i32, height as i32);
            self.gl.clear_color(0.0, 0.0, 0.0, 1.0);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    fn use_program(&mut self, program: Self::Program) {
        unsafe { self.gl.use_program(Some(program)) };
    }

    fn bind_texture(&mut self, unit: u32, texture: Self::Texture) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        }
    }

    fn set_uniform(&mut self, location: &Self::Location, value: UniformValue) {
        unsafe {
            match value {
                UniformValue::Float(v) => self.gl.uniform_1_f32(Some(location), v),
                UniformValue::Vec2([x, y]) => self.gl.uniform_2_f32(Some(location), x, y),
                UniformValue::Vec4([x, y, z, w]) => self.gl.uniform_4_f32(Some(location), x, y, z, w),
                UniformValue::Sampler(unit) => self.gl.uniform_1_i32(Some(location), unit as i32),
            }
        }
    }

    fn draw_fullscreen_quad(&mut self) {
        unsafe {
            self.gl.bind_vertex_array(Some(self.vao));
            self.gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
            self.gl.bind_vertex_array(None);
        }
    }

    /// Drains the error queue. Anything other than a lost context is logged.
    fn context_lost(&mut self) -> bool {
        for _ in 0..MAX_QUEUED_ERRORS {
            let code = unsafe { self.gl.get_error() };
            match code {
                glow::NO_ERROR => break,
                glow::CONTEXT_LOST => return true,
                _ => {
                    if self.errors.report(code) {
                        logw!("RENDER", "GL error 0x{code:04x} ({})", gl_error_name(code));
                    }
                }
            }
        }
        false
    }
}

fn glsl_type_name(utype: u32) -> String {
    let name = match utype {
        glow::FLOAT => "float",
        glow::FLOAT_VEC2 => "vec2",
        glow::FLOAT_VEC3 => "vec3",
        glow::FLOAT_VEC4 => "vec4",
        glow::INT => "int",
        glow::INT_VEC2 => "ivec2",
        glow::INT_VEC3 => "ivec3",
        glow::INT_VEC4 => "ivec4",
        glow::UNSIGNED_INT => "uint",
        glow::BOOL => "bool",
        glow::FLOAT_MAT2 => "mat2",
        glow::FLOAT_MAT3 => "mat3",
        glow::FLOAT_MAT4 => "mat4",
        glow::SAMPLER_2D => "sampler2D",
        glow::SAMPLER_3D => "sampler3D",
        glow::SAMPLER_CUBE => "samplerCube",
        other => return format!("0x{other:04x}"),
    };
    name.to_string()
}
