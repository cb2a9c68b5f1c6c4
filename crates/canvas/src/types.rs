use serde::{Deserialize, Serialize};

/// The closed set of GLSL types a uniform provider may declare.
///
/// Serialises as the lowercase GLSL keyword (`"vec3"`, `"ivec2"`, ...) so the
/// same names round-trip through project files and uniform declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniformType {
    Float,
    Int,
    Vec2,
    IVec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl UniformType {
    /// Every supported type, in declaration-menu order.
    pub const ALL: [UniformType; 9] = [
        UniformType::Float,
        UniformType::Int,
        UniformType::Vec2,
        UniformType::IVec2,
        UniformType::Vec3,
        UniformType::Vec4,
        UniformType::Mat2,
        UniformType::Mat3,
        UniformType::Mat4,
    ];

    /// The GLSL keyword for this type.
    pub fn glsl_name(&self) -> &'static str {
        match self {
            UniformType::Float => "float",
            UniformType::Int => "int",
            UniformType::Vec2 => "vec2",
            UniformType::IVec2 => "ivec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
            UniformType::Mat2 => "mat2",
            UniformType::Mat3 => "mat3",
            UniformType::Mat4 => "mat4",
        }
    }

    /// Number of scalar components a value of this type carries.
    pub fn component_count(&self) -> usize {
        match self {
            UniformType::Float | UniformType::Int => 1,
            UniformType::Vec2 | UniformType::IVec2 => 2,
            UniformType::Vec3 => 3,
            UniformType::Vec4 | UniformType::Mat2 => 4,
            UniformType::Mat3 => 9,
            UniformType::Mat4 => 16,
        }
    }

    /// Parses a GLSL keyword back into a type.
    pub fn from_glsl_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.glsl_name() == name)
    }
}

impl std::fmt::Display for UniformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// A uniform value whose shape mirrors its [`UniformType`].
///
/// Matrices are column-major, matching what GLSL expects.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    IVec2([i32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat2([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
}

impl UniformValue {
    /// The type whose shape this value satisfies.
    pub fn kind(&self) -> UniformType {
        match self {
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::IVec2(_) => UniformType::IVec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat2(_) => UniformType::Mat2,
            UniformValue::Mat3(_) => UniformType::Mat3,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Whether this value can be dispatched to a uniform declared as `ty`.
    pub fn matches(&self, ty: UniformType) -> bool {
        self.kind() == ty
    }
}

/// Per-frame inputs handed to every dynamic uniform provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Canvas width in physical pixels.
    pub canvas_width: u32,
    /// Canvas height in physical pixels.
    pub canvas_height: u32,
    /// Seconds since the animation driver started ticking.
    pub time_seconds: f64,
    /// Pointer position in shader-space coordinates (height-normalised,
    /// origin at the canvas centre, y up).
    pub pointer: [f32; 2],
    /// Held pointer buttons as a browser-style mask: left=1, right=2, middle=4.
    pub buttons: u8,
}
