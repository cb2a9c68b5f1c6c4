//! Rhai-backed implementation of the uniform script evaluator.
//!
//! A provider's script is two blobs: init statements, run once when the
//! script is compiled, and a frame body evaluated every tick. Both share one
//! persistent `Scope`, which is how init-time state (`let start_time = -1.0;`)
//! survives across frames. Each tick the scope is rewound to its post-init
//! checkpoint before the frame bindings (`canvas`, `time`, `mouse`) are
//! pushed, so per-frame `let`s never accumulate.

use std::rc::Rc;

use canvas::{
    FrameContext, ScriptCompileError, ScriptEngine, ScriptRuntimeError, UniformEvaluator,
    UniformScript, UniformType, UniformValue,
};
use rhai::{Dynamic, Engine, Scope, AST};

/// Shared engine with runaway-script limits applied. This bounds operations
/// and call depth only; it is not a capability sandbox.
pub struct RhaiUniformEngine {
    engine: Rc<Engine>,
}

impl RhaiUniformEngine {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(1_000_000);
        engine.set_max_call_levels(32);
        Self {
            engine: Rc::new(engine),
        }
    }
}

impl Default for RhaiUniformEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for RhaiUniformEngine {
    fn compile(
        &self,
        script: &UniformScript,
    ) -> Result<Box<dyn UniformEvaluator>, ScriptCompileError> {
        let init_ast = self
            .engine
            .compile(&script.init)
            .map_err(|err| ScriptCompileError::Parse(err.to_string()))?;
        let frame_ast = self
            .engine
            .compile(&script.frame)
            .map_err(|err| ScriptCompileError::Parse(err.to_string()))?;

        let mut scope = Scope::new();
        push_math_constants(&mut scope);
        self.engine
            .run_ast_with_scope(&mut scope, &init_ast)
            .map_err(|err| ScriptCompileError::Init(err.to_string()))?;
        let checkpoint = scope.len();

        Ok(Box::new(RhaiEvaluator {
            engine: self.engine.clone(),
            frame_ast,
            scope,
            checkpoint,
            ty: script.ty,
        }))
    }
}

/// Math constants every script can read; the function side of the namespace
/// (sin, cos, sqrt, ...) comes with rhai's standard package.
fn push_math_constants(scope: &mut Scope<'_>) {
    scope.push_constant("PI", std::f64::consts::PI);
    scope.push_constant("TAU", std::f64::consts::TAU);
    scope.push_constant("E", std::f64::consts::E);
    scope.push_constant("PHI", 1.618_033_988_749_895_f64);
}

struct RhaiEvaluator {
    engine: Rc<Engine>,
    frame_ast: AST,
    scope: Scope<'static>,
    checkpoint: usize,
    ty: UniformType,
}

impl UniformEvaluator for RhaiEvaluator {
    fn evaluate(&mut self, ctx: &FrameContext) -> Result<UniformValue, ScriptRuntimeError> {
        self.scope.rewind(self.checkpoint);

        let mut canvas = rhai::Map::new();
        canvas.insert("width".into(), Dynamic::from(ctx.canvas_width as f64));
        canvas.insert("height".into(), Dynamic::from(ctx.canvas_height as f64));

        let position: rhai::Array = ctx
            .pointer
            .iter()
            .map(|component| Dynamic::from(f64::from(*component)))
            .collect();
        let mut mouse = rhai::Map::new();
        mouse.insert("position".into(), Dynamic::from(position));
        mouse.insert("buttons".into(), Dynamic::from(i64::from(ctx.buttons)));

        self.scope.push("canvas", canvas);
        self.scope.push("time", ctx.time_seconds);
        self.scope.push("mouse", mouse);

        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut self.scope, &self.frame_ast)
            .map_err(|err| ScriptRuntimeError::Evaluation(err.to_string()))?;
        to_uniform(value, self.ty)
    }
}

fn number(value: &Dynamic) -> Option<f64> {
    value
        .as_float()
        .ok()
        .or_else(|| value.as_int().ok().map(|v| v as f64))
}

fn to_uniform(value: Dynamic, ty: UniformType) -> Result<UniformValue, ScriptRuntimeError> {
    match ty {
        UniformType::Float => number(&value)
            .map(|v| UniformValue::Float(v as f32))
            .ok_or_else(|| mismatch(ty, &value)),
        UniformType::Int => number(&value)
            .map(|v| UniformValue::Int(v as i32))
            .ok_or_else(|| mismatch(ty, &value)),
        UniformType::Vec2 => components::<2>(value, ty).map(UniformValue::Vec2),
        UniformType::IVec2 => {
            components::<2>(value, ty).map(|v| UniformValue::IVec2(v.map(|c| c as i32)))
        }
        UniformType::Vec3 => components::<3>(value, ty).map(UniformValue::Vec3),
        UniformType::Vec4 => components::<4>(value, ty).map(UniformValue::Vec4),
        UniformType::Mat2 => components::<4>(value, ty).map(UniformValue::Mat2),
        UniformType::Mat3 => components::<9>(value, ty).map(UniformValue::Mat3),
        UniformType::Mat4 => components::<16>(value, ty).map(UniformValue::Mat4),
    }
}

fn components<const N: usize>(
    value: Dynamic,
    ty: UniformType,
) -> Result<[f32; N], ScriptRuntimeError> {
    let type_name = value.type_name();
    let Some(array) = value.try_cast::<rhai::Array>() else {
        return Err(ScriptRuntimeError::ShapeMismatch {
            expected: ty,
            actual: type_name.to_string(),
        });
    };
    if array.len() != N {
        return Err(ScriptRuntimeError::ShapeMismatch {
            expected: ty,
            actual: format!("an array of {} elements", array.len()),
        });
    }
    let mut out = [0.0_f32; N];
    for (slot, element) in out.iter_mut().zip(&array) {
        *slot = number(element).ok_or_else(|| ScriptRuntimeError::ShapeMismatch {
            expected: ty,
            actual: format!("an array containing {}", element.type_name()),
        })? as f32;
    }
    Ok(out)
}

fn mismatch(expected: UniformType, value: &Dynamic) -> ScriptRuntimeError {
    ScriptRuntimeError::ShapeMismatch {
        expected,
        actual: value.type_name().to_string(),
    }
}
