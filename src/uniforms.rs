//! The fixed, automatically supplied uniform set.
//!
//! Shaders may declare any subset of these; anything else they declare is left
//! unbound for manual experimentation. Names follow the Bonzomatic convention
//! (`fGlobalTime`, `v2Resolution`, `texNoise`) with a few ShaderToy aliases.

use crate::input::PointerState;
use crate::timer::TimerTick;

/// Texture unit the noise texture is kept bound to.
pub const NOISE_TEXTURE_UNIT: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedUniform {
    GlobalTime,
    FrameTime,
    Resolution,
    Time,
    TimeDelta,
    Mouse,
    MouseScroll,
    Test,
    Noise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec4,
    Sampler2D,
}

impl UniformKind {
    /// GLSL type the declaration must use for this pipeline to feed it.
    pub fn glsl_name(self) -> &'static str {
        match self {
            UniformKind::Float => "float",
            UniformKind::Vec2 => "vec2",
            UniformKind::Vec4 => "vec4",
            UniformKind::Sampler2D => "sampler2D",
        }
    }
}

impl FixedUniform {
    pub const ALL: [FixedUniform; 9] = [
        FixedUniform::GlobalTime,
        FixedUniform::FrameTime,
        FixedUniform::Resolution,
        FixedUniform::Time,
        FixedUniform::TimeDelta,
        FixedUniform::Mouse,
        FixedUniform::MouseScroll,
        FixedUniform::Test,
        FixedUniform::Noise,
    ];

    /// GLSL identifier the shader declares.
    pub fn name(self) -> &'static str {
        match self {
            FixedUniform::GlobalTime => "fGlobalTime",
            FixedUniform::FrameTime => "fFrameTime",
            FixedUniform::Resolution => "v2Resolution",
            FixedUniform::Time => "iTime",
            FixedUniform::TimeDelta => "iTimeDelta",
            FixedUniform::Mouse => "iMouse",
            FixedUniform::MouseScroll => "iMouseScroll",
            FixedUniform::Test => "test",
            FixedUniform::Noise => "texNoise",
        }
    }

    pub fn kind(self) -> UniformKind {
        match self {
            FixedUniform::GlobalTime
            | FixedUniform::FrameTime
            | FixedUniform::Time
            | FixedUniform::TimeDelta => UniformKind::Float,
            FixedUniform::Resolution | FixedUniform::MouseScroll | FixedUniform::Test => UniformKind::Vec2,
            FixedUniform::Mouse => UniformKind::Vec4,
            FixedUniform::Noise => UniformKind::Sampler2D,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    /// Texture unit index for a sampler.
    Sampler(u32),
}

/// Locations resolved for the fixed set in one linked program.
///
/// `L` is the backend's location handle; `None` means the shader does not use
/// that uniform (or the driver optimized it away).
#[derive(Debug, Clone)]
pub struct UniformLocations<L> {
    slots: [Option<L>; 9],
}

impl<L> UniformLocations<L> {
    pub fn resolve(mut lookup: impl FnMut(&str) -> Option<L>) -> Self {
        Self { slots: FixedUniform::ALL.map(|u| lookup(u.name())) }
    }

    pub fn get(&self, u: FixedUniform) -> Option<&L> {
        self.slots[u.index()].as_ref()
    }

    pub fn is_bound(&self, u: FixedUniform) -> bool {
        self.get(u).is_some()
    }

    /// Stop feeding `u`, e.g. when the shader declared it with another type.
    pub fn unbind(&mut self, u: FixedUniform) -> Option<L> {
        self.slots[u.index()].take()
    }

    /// Fixed uniforms this program actually consumes.
    pub fn bound(&self) -> impl Iterator<Item = (FixedUniform, &L)> + '_ {
        FixedUniform::ALL
            .into_iter()
            .filter_map(move |u| self.get(u).map(|l| (u, l)))
    }
}

/// Per-frame values of the fixed set. Rebuilt every frame, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformFrame {
    pub elapsed: f32,
    pub frame_time: f32,
    pub resolution: [f32; 2],
    pub mouse: [f32; 4],
    pub scroll: [f32; 2],
    pub test: [f32; 2],
    pub noise_unit: u32,
}

impl Default for UniformFrame {
    fn default() -> Self {
        Self {
            elapsed: 0.0,
            frame_time: 0.0,
            resolution: [0.0, 0.0],
            mouse: [0.0; 4],
            scroll: [0.0, 0.0],
            test: [0.0, 0.0],
            noise_unit: NOISE_TEXTURE_UNIT,
        }
    }
}

impl UniformFrame {
    pub fn build(tick: TimerTick, resolution: [f32; 2], pointer: &PointerState, test: [f32; 2]) -> Self {
        Self {
            elapsed: tick.total,
            frame_time: tick.frame,
            resolution,
            mouse: pointer.mouse_uniform(),
            scroll: pointer.scroll(),
            test,
            noise_unit: NOISE_TEXTURE_UNIT,
        }
    }

    pub fn value(&self, u: FixedUniform) -> UniformValue {
        match u {
            FixedUniform::GlobalTime | FixedUniform::Time => UniformValue::Float(self.elapsed),
            FixedUniform::FrameTime | FixedUniform::TimeDelta => UniformValue::Float(self.frame_time),
            FixedUniform::Resolution => UniformValue::Vec2(self.resolution),
            FixedUniform::Mouse => UniformValue::Vec4(self.mouse),
            FixedUniform::MouseScroll => UniformValue::Vec2(self.scroll),
            FixedUniform::Test => UniformValue::Vec2(self.test),
            FixedUniform::Noise => UniformValue::Sampler(self.noise_unit),
        }
    }
}
