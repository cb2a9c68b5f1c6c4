//! Bundled content: the fixed vertex stage, the injected GLSL helper
//! library, the built-in scripted uniforms, and the default project.

use canvas::{SourceSegment, UniformRegistry, UniformScript, UniformType};

use crate::project::{Project, StaticValue, UniformDef};

/// Vertex stage shared by every program. `fragCoord` is aspect-corrected so a
/// unit in x and a unit in y cover the same number of pixels.
pub const VERTEX_SHADER: &str = "\
layout(location = 0) in vec2 a_position;
layout(location = 0) out vec2 fragCoord;

uniform float aspectRatio;

void main() {
    gl_Position = vec4(a_position, 1.0, 1.0);
    fragCoord = vec2(1.0 / aspectRatio, 1.0) * a_position;
}
";

/// Fragment body used when no project file is given.
pub const DEFAULT_MAIN: &str = "\
void main() {
    fragColor = vec4(0.5 + 0.5 * cos(fragCoord.xyx + vec3(0.0, 2.0, 4.0)), 1.0);
}
";

/// Helper library injected between the header and the user body. Compile
/// errors in here must never be attributed to user lines, which is why the
/// segment carrying it is marked injected.
pub const BUILTIN_LIBRARY: &str = "\
// Helpers available to every shader.

const float PI = 3.141592653589793;
const float TAU = 6.283185307179586;
const float PHI = 1.618033988749895;
const float E = 2.718281828459045;

float sqr(float v) { return v * v; }
vec2 sqr(vec2 v) { return v * v; }
vec3 sqr(vec3 v) { return v * v; }
vec4 sqr(vec4 v) { return v * v; }

float lengthSq(vec2 v) { return dot(v, v); }
float lengthSq(vec3 v) { return dot(v, v); }
float lengthSq(vec4 v) { return dot(v, v); }

float sum(vec2 v) { return v.x + v.y; }
float sum(vec3 v) { return v.x + v.y + v.z; }
float sum(vec4 v) { return v.x + v.y + v.z + v.w; }

float invert(float m) { return 1.0 / m; }

mat2 invert(mat2 m) {
    return mat2(m[1][1], -m[0][1], -m[1][0], m[0][0])
        / (m[0][0] * m[1][1] - m[0][1] * m[1][0]);
}

mat3 invert(mat3 m) {
    float a00 = m[0][0];
    float a01 = m[0][1];
    float a02 = m[0][2];
    float a10 = m[1][0];
    float a11 = m[1][1];
    float a12 = m[1][2];
    float a20 = m[2][0];
    float a21 = m[2][1];
    float a22 = m[2][2];

    float b01 = a22 * a11 - a12 * a21;
    float b11 = -a22 * a10 + a12 * a20;
    float b21 = a21 * a10 - a11 * a20;

    float det = a00 * b01 + a01 * b11 + a02 * b21;

    return mat3(
        b01, -a22 * a01 + a02 * a21, a12 * a01 - a02 * a11,
        b11, a22 * a00 - a02 * a20, -a12 * a00 + a02 * a10,
        b21, -a21 * a00 + a01 * a20, a11 * a00 - a01 * a10
    ) / det;
}

int absi(int v) { return v > 0 ? v : -v; }
ivec2 absi(ivec2 v) { return ivec2(absi(v.x), absi(v.y)); }

// Truncate v to the given precision.
float decimate(float v, float p) { return floor(v * p) / p; }
vec2 decimate(vec2 v, float p) { return floor(v * p) / p; }
vec3 decimate(vec3 v, float p) { return floor(v * p) / p; }

float _lib_cubic(float v) { return v * v * (3.0 - 2.0 * v); }

float cubicMix(float a, float b, float t) { return a + (b - a) * _lib_cubic(t); }
vec2 cubicMix(vec2 a, vec2 b, float t) { return a + (b - a) * _lib_cubic(t); }
vec3 cubicMix(vec3 a, vec3 b, float t) { return a + (b - a) * _lib_cubic(t); }
vec4 cubicMix(vec4 a, vec4 b, float t) { return a + (b - a) * _lib_cubic(t); }

// abs() with the cusp rounded to a minimum of n.
float almostAbs(float x, float n) { return sqrt(x * x + n * n); }

// Integral of the builtin smoothstep.
float integralSmoothstep(float x) {
    if (x < 0.0) return 0.0;
    if (x > 1.0) return x - 0.5;
    return x * x * x * (1.0 - x * 0.5);
}

float gaussian(float d, float s) { return exp(-(d * d) / (2.0 * s * s)); }
float gaussian(vec2 d, float s) { return exp(-lengthSq(d) / (2.0 * s * s)); }
float gaussian(vec3 d, float s) { return exp(-lengthSq(d) / (2.0 * s * s)); }

// Abramowitz/Stegun approximation, maximum error 2.5e-5.
const float _lib_erf_p = 0.47047;
const float _lib_erf_a1 = 0.3480242;
const float _lib_erf_a2 = -0.0958798;
const float _lib_erf_a3 = 0.7478556;

float erf(float x) {
    float t = 1.0 / (1.0 + _lib_erf_p * abs(x));
    float r = 1.0 - t * (_lib_erf_a1 + t * (_lib_erf_a2 + t * _lib_erf_a3)) * exp(-(x * x));
    return r * sign(x);
}

float mapRange(float v, float inMin, float inMax, float outMin, float outMax) {
    return outMin + (outMax - outMin) * (v - inMin) / (inMax - inMin);
}
vec2 mapRange(vec2 v, vec2 inMin, vec2 inMax, vec2 outMin, vec2 outMax) {
    return outMin + (outMax - outMin) * (v - inMin) / (inMax - inMin);
}
vec3 mapRange(vec3 v, vec3 inMin, vec3 inMax, vec3 outMin, vec3 outMax) {
    return outMin + (outMax - outMin) * (v - inMin) / (inMax - inMin);
}

vec3 hue2rgb(float hue) {
    float h = mod(hue, 1.0);
    float r = abs(h * 6.0 - 3.0) - 1.0;
    float g = 2.0 - abs(h * 6.0 - 2.0);
    float b = 2.0 - abs(h * 6.0 - 4.0);
    return clamp(vec3(r, g, b), 0.0, 1.0);
}

vec3 hsv2rgb(vec3 hsv) {
    vec3 rgb = hue2rgb(hsv.x);
    return ((rgb - 1.0) * hsv.y + 1.0) * hsv.z;
}

vec3 hsl2rgb(vec3 hsl) {
    vec3 rgb = hue2rgb(hsl.x);
    float c = (1.0 - abs(2.0 * hsl.z - 1.0)) * hsl.y;
    return (rgb - 0.5) * c + hsl.z;
}

const float _lib_hcv_epsilon = 1e-10;

vec3 rgb2hcv(vec3 rgb) {
    vec4 p = (rgb.g < rgb.b) ? vec4(rgb.bg, -1.0, 2.0 / 3.0) : vec4(rgb.gb, 0.0, -1.0 / 3.0);
    vec4 q = (rgb.r < p.x) ? vec4(p.xyw, rgb.r) : vec4(rgb.r, p.yzx);
    float c = q.x - min(q.w, q.y);
    float h = abs((q.w - q.y) / (6.0 * c + _lib_hcv_epsilon) + q.z);
    return vec3(h, c, q.x);
}

vec3 rgb2hsv(vec3 rgb) {
    vec3 hcv = rgb2hcv(rgb);
    float s = hcv.y / (hcv.z + _lib_hcv_epsilon);
    return vec3(hcv.x, s, hcv.z);
}

vec3 rgb2hsl(vec3 rgb) {
    vec3 hcv = rgb2hcv(rgb);
    float l = hcv.z - hcv.y * 0.5;
    float s = hcv.y / (1.0 - abs(l * 2.0 - 1.0) + _lib_hcv_epsilon);
    return vec3(hcv.x, s, l);
}

float linear2srgb(float channel) {
    if (channel <= 0.0031308) return 12.92 * channel;
    return 1.055 * pow(channel, 1.0 / 2.4) - 0.055;
}

float srgb2linear(float channel) {
    if (channel <= 0.04045) return channel / 12.92;
    return pow((channel + 0.055) / 1.055, 2.4);
}

vec3 rgb2srgb(vec3 rgb) {
    return vec3(linear2srgb(rgb.r), linear2srgb(rgb.g), linear2srgb(rgb.b));
}

vec3 srgb2rgb(vec3 srgb) {
    return vec3(srgb2linear(srgb.r), srgb2linear(srgb.g), srgb2linear(srgb.b));
}
";

/// The four uniforms every session carries, expressed as ordinary uniform
/// scripts so they run through the same evaluator as user-defined ones.
pub fn builtin_uniform_scripts() -> Vec<UniformScript> {
    vec![
        UniformScript {
            name: "aspectRatio".into(),
            ty: UniformType::Float,
            init: "// Built-in uniform.".into(),
            frame: "// canvas is a { width, height } map describing the output window.\ncanvas.height / canvas.width".into(),
        },
        UniformScript {
            name: "elapsedTime".into(),
            ty: UniformType::Float,
            init: "// Built-in uniform.\nlet start_time = -1.0;".into(),
            frame: "// time is the current time in seconds.\nif start_time < 0.0 {\n    start_time = time;\n}\ntime - start_time".into(),
        },
        UniformScript {
            name: "mousePosition".into(),
            ty: UniformType::Vec2,
            init: "// Built-in uniform.".into(),
            frame: "// mouse.position is the pointer in shader coordinates,\n// or [0, 0] while the pointer is off the canvas.\nmouse.position".into(),
        },
        UniformScript {
            name: "mouseButtons".into(),
            ty: UniformType::Int,
            init: "// Built-in uniform.".into(),
            frame: "// mouse.buttons is a browser-style button mask.\nmouse.buttons".into(),
        },
    ]
}

/// Project written by `shaderpad init`: the default shader plus one example
/// of each uniform flavour.
pub fn default_project() -> Project {
    Project {
        main: Some(DEFAULT_MAIN.to_string()),
        main_path: None,
        uniforms: vec![
            UniformDef {
                name: "pulse".into(),
                ty: UniformType::Float,
                value: None,
                init: None,
                frame: Some("0.5 + 0.5 * sin(time * TAU * 0.25)".into()),
            },
            UniformDef {
                name: "tint".into(),
                ty: UniformType::Vec3,
                value: Some(StaticValue::List(vec![1.0, 1.0, 1.0])),
                init: None,
                frame: None,
            },
        ],
    }
}

/// Generates the header segment: interpolated IO plus one declaration per
/// registered uniform provider.
pub fn header_source(declarations: &[(String, UniformType)]) -> String {
    let mut header = String::from(
        "layout(location = 0) in vec2 fragCoord;\nlayout(location = 0) out vec4 fragColor;\n",
    );
    for (name, ty) in declarations {
        header.push_str(&format!("uniform {ty} {name};\n"));
    }
    header
}

/// The three segments submitted on every recompile: generated header, the
/// injected helper library, and the user body.
pub fn build_segments(registry: &UniformRegistry, body: &str) -> Vec<SourceSegment> {
    vec![
        SourceSegment::user("header", header_source(&registry.declarations())),
        SourceSegment::injected("builtins", BUILTIN_LIBRARY),
        SourceSegment::user("body", body),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas::{assemble, FrameContext, ScriptEngine, SegmentKind, UniformValue};
    use scripting::RhaiUniformEngine;

    fn ctx(time: f64) -> FrameContext {
        FrameContext {
            canvas_width: 800,
            canvas_height: 600,
            time_seconds: time,
            pointer: [0.5, 0.25],
            buttons: 1,
        }
    }

    #[test]
    fn builtin_scripts_compile_and_evaluate() {
        let engine = RhaiUniformEngine::new();
        for script in builtin_uniform_scripts() {
            let mut evaluator = engine
                .compile(&script)
                .unwrap_or_else(|err| panic!("builtin '{}' failed: {err}", script.name));
            evaluator
                .evaluate(&ctx(1.0))
                .unwrap_or_else(|err| panic!("builtin '{}' failed: {err}", script.name));
        }
    }

    #[test]
    fn elapsed_time_latches_its_start() {
        let engine = RhaiUniformEngine::new();
        let script = builtin_uniform_scripts().remove(1);
        assert_eq!(script.name, "elapsedTime");
        let mut evaluator = engine.compile(&script).unwrap();
        assert_eq!(
            evaluator.evaluate(&ctx(10.0)).unwrap(),
            UniformValue::Float(0.0)
        );
        assert_eq!(
            evaluator.evaluate(&ctx(12.0)).unwrap(),
            UniformValue::Float(2.0)
        );
    }

    #[test]
    fn header_lists_registered_uniforms() {
        let header = header_source(&[
            ("aspectRatio".to_string(), UniformType::Float),
            ("spin".to_string(), UniformType::Mat2),
        ]);
        assert!(header.contains("uniform float aspectRatio;"));
        assert!(header.contains("uniform mat2 spin;"));
        assert!(header.contains("in vec2 fragCoord;"));
    }

    #[test]
    fn segments_mark_only_the_library_as_injected() {
        let registry = UniformRegistry::new();
        let segments = build_segments(&registry, DEFAULT_MAIN);
        let kinds: Vec<SegmentKind> = segments.iter().map(|segment| segment.kind).collect();
        assert_eq!(
            kinds,
            [SegmentKind::User, SegmentKind::Injected, SegmentKind::User]
        );
        assert_eq!(segments[2].text, DEFAULT_MAIN);
    }

    #[test]
    fn default_session_source_passes_the_compiler() {
        let engine = RhaiUniformEngine::new();
        let mut registry = UniformRegistry::new();
        for script in builtin_uniform_scripts() {
            let id = registry.add_scripted(script);
            registry.compile_provider(id, &engine).unwrap();
        }
        let segments = build_segments(&registry, DEFAULT_MAIN);
        let source = assemble(&segments);
        if let Err(log) = canvas::gpu::check_fragment_source(&source) {
            panic!("default shader failed to compile:\n{log}");
        }
    }

    #[test]
    fn default_project_round_trips_through_toml() {
        let project = default_project();
        let serialized = toml::to_string_pretty(&project).unwrap();
        let parsed: Project = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, project);
    }
}
