//! In-memory GPU backend for driving the compiler and render loop without a context.
//!
//! It understands just enough GLSL to behave like a driver: rejects sources without
//! `#version`/`void main` or with unbalanced braces, honors `#error`, links only when
//! every fragment `in` has a matching vertex `out`, and reports declared uniforms as
//! active. Logs use Mesa's `0:line(col): error: ...` shape.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use vimshady::gpu::{ActiveUniform, GpuBackend, GpuFailure, ShaderStage};
use vimshady::texture::TextureImage;
use vimshady::uniforms::UniformValue;

#[derive(Debug, Clone)]
pub struct FakeShader {
    id: u32,
    stage: ShaderStage,
    uniforms: Vec<(String, String)>,
    inputs: Vec<(String, String)>,
    outputs: Vec<(String, String)>,
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: u32,
    pub uniforms: BTreeMap<String, UniformValue>,
    pub textures: BTreeMap<u32, u32>,
}

#[derive(Debug, Default)]
pub struct FakeGpu {
    next_id: u32,
    pub live_shaders: BTreeSet<u32>,
    pub live_programs: BTreeSet<u32>,
    pub live_textures: BTreeSet<u32>,
    programs: BTreeMap<u32, Vec<(String, String)>>,
    bound_program: Option<u32>,
    bound_textures: BTreeMap<u32, u32>,
    current_uniforms: BTreeMap<String, UniformValue>,
    pub draws: Vec<DrawCall>,
    pub compiles: usize,
    pub lost: bool,
    /// Reject every shader, the fallback included.
    pub reject_compiles: bool,
}

impl FakeGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_draw(&self) -> &DrawCall {
        self.draws.last().expect("no frame drawn")
    }

    fn id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

fn declarations(source: &str, keyword: &str) -> Vec<(String, String)> {
    source
        .lines()
        .filter_map(|l| {
            let l = l.trim();
            // `layout(...) out vec4 x;` counts as an output too
            let l = match l.find(')') {
                Some(i) if l.starts_with("layout") => l[i + 1..].trim(),
                _ => l,
            };
            let rest = l.strip_prefix(keyword)?.strip_prefix(' ')?;
            let rest = rest.split(['=', ';']).next()?.trim();
            let mut parts = rest.split_whitespace();
            let ty = parts.next()?.to_string();
            let name = parts.next()?.to_string();
            Some((ty, name))
        })
        .collect()
}

fn syntax_error(source: &str) -> Option<String> {
    let first = source.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if !first.trim_start().starts_with("#version") {
        return Some("0:1(1): error: GLSL 1.10 is not supported. Supported versions are: 4.10 core".into());
    }
    if let Some((i, line)) = source.lines().enumerate().find(|(_, l)| l.trim_start().starts_with("#error")) {
        let msg = line.trim_start().trim_start_matches("#error").trim();
        return Some(format!("0:{}(2): error: #error {msg}", i + 1));
    }
    let mut depth = 0i32;
    for (i, line) in source.lines().enumerate() {
        for c in line.chars() {
            match c {
                '{' | '(' => depth += 1,
                '}' | ')' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Some(format!("0:{}(1): error: syntax error, unexpected '{c}'", i + 1));
            }
        }
    }
    if depth != 0 {
        let lines = source.lines().count().max(1);
        return Some(format!("0:{lines}(1): error: syntax error, unexpected end of file"));
    }
    if !source.contains("void main") {
        return Some("0:1(1): error: main function not found".into());
    }
    None
}

impl GpuBackend for FakeGpu {
    type Shader = FakeShader;
    type Program = u32;
    type Location = (u32, String);
    type Texture = u32;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<FakeShader, GpuFailure> {
        if self.lost {
            return Err(GpuFailure::ContextLost);
        }
        if stage == ShaderStage::Fragment {
            self.compiles += 1;
        }
        if self.reject_compiles {
            return Err(GpuFailure::Rejected("0:1(1): error: out of resources".into()));
        }
        if let Some(log) = syntax_error(source) {
            return Err(GpuFailure::Rejected(log));
        }
        let id = self.id();
        self.live_shaders.insert(id);
        Ok(FakeShader {
            id,
            stage,
            uniforms: declarations(source, "uniform"),
            inputs: declarations(source, "in"),
            outputs: declarations(source, "out"),
        })
    }

    fn delete_shader(&mut self, shader: FakeShader) {
        assert!(self.live_shaders.remove(&shader.id), "double delete of shader {}", shader.id);
    }

    fn link_program(&mut self, vertex: FakeShader, fragment: FakeShader) -> Result<u32, GpuFailure> {
        assert_eq!(vertex.stage, ShaderStage::Vertex);
        assert_eq!(fragment.stage, ShaderStage::Fragment);

        let missing = fragment.inputs.iter().find(|i| !vertex.outputs.contains(i)).cloned();
        let mut uniforms = vertex.uniforms.clone();
        uniforms.extend(fragment.uniforms.iter().cloned());
        self.delete_shader(vertex);
        self.delete_shader(fragment);

        if let Some((_, name)) = missing {
            return Err(GpuFailure::Rejected(format!(
                "error: fragment shader input `{name}' has no matching output in the previous stage"
            )));
        }
        let id = self.id();
        self.live_programs.insert(id);
        self.programs.insert(id, uniforms);
        Ok(id)
    }

    fn delete_program(&mut self, program: u32) {
        assert!(self.live_programs.remove(&program), "double delete of program {program}");
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
    }

    fn uniform_location(&mut self, program: u32, name: &str) -> Option<(u32, String)> {
        let declared = self.programs.get(&program)?;
        declared.iter().any(|(_, n)| n == name).then(|| (program, name.to_string()))
    }

    fn active_uniforms(&mut self, program: u32) -> Vec<ActiveUniform> {
        self.programs
            .get(&program)
            .map(|us| {
                us.iter()
                    .map(|(ty, name)| ActiveUniform { name: name.clone(), type_name: ty.clone(), size: 1 })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<u32, GpuFailure> {
        if self.lost {
            return Err(GpuFailure::ContextLost);
        }
        assert_eq!(image.rgba.len(), (image.width * image.height * 4) as usize);
        let id = self.id();
        self.live_textures.insert(id);
        Ok(id)
    }

    fn delete_texture(&mut self, texture: u32) {
        assert!(self.live_textures.remove(&texture));
    }

    fn begin_frame(&mut self, _width: u32, _height: u32) {
        self.current_uniforms.clear();
    }

    fn use_program(&mut self, program: u32) {
        assert!(self.live_programs.contains(&program), "binding deleted program {program}");
        self.bound_program = Some(program);
    }

    fn bind_texture(&mut self, unit: u32, texture: u32) {
        assert!(self.live_textures.contains(&texture));
        self.bound_textures.insert(unit, texture);
    }

    fn set_uniform(&mut self, location: &(u32, String), value: UniformValue) {
        assert_eq!(Some(location.0), self.bound_program, "uniform set on a program that is not bound");
        self.current_uniforms.insert(location.1.clone(), value);
    }

    fn draw_fullscreen_quad(&mut self) {
        let program = self.bound_program.expect("draw without a program");
        self.draws.push(DrawCall {
            program,
            uniforms: self.current_uniforms.clone(),
            textures: self.bound_textures.clone(),
        });
    }

    fn context_lost(&mut self) -> bool {
        self.lost
    }
}

pub fn sample_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("assets").join("shaders").join(name)
}

pub fn sample(name: &str) -> vimshady::ShaderSource {
    vimshady::ShaderSource::load(&sample_path(name)).expect("sample shader present")
}

/// A minimal valid fragment shader whose output color is `tag`.
pub fn good_shader(path: &str, tag: f32) -> vimshady::ShaderSource {
    vimshady::ShaderSource::new(
        path,
        format!(
            "#version 410 core\nuniform float fGlobalTime;\nin vec4 out_texcoord;\n\
             layout(location = 0) out vec4 out_color;\n\
             void main()\n{{\n    out_color = vec4({tag:.3}, fGlobalTime, 0.0, 1.0);\n}}\n"
        ),
    )
}

/// Missing closing brace: a compile error on the last line.
pub fn broken_shader(path: &str) -> vimshady::ShaderSource {
    vimshady::ShaderSource::new(
        path,
        "#version 410 core\nlayout(location = 0) out vec4 out_color;\nvoid main()\n{\n    out_color = vec4(1.0);\n",
    )
}
