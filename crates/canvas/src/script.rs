//! The opaque scripting-evaluator boundary.
//!
//! Dynamic uniform providers carry source text in a scripting language; an
//! injected [`ScriptEngine`] turns that text into a callable evaluator. The
//! core assumes nothing about the engine beyond this contract — in particular
//! not its sandboxing properties.

use crate::types::{FrameContext, UniformType, UniformValue};

/// Source for a scripted uniform provider: statements run once when the
/// script is (re)compiled, plus a body evaluated every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformScript {
    pub name: String,
    pub ty: UniformType,
    pub init: String,
    pub frame: String,
}

/// The engine rejected the script before it could produce an evaluator.
#[derive(Debug, thiserror::Error)]
pub enum ScriptCompileError {
    #[error("script parse error: {0}")]
    Parse(String),
    #[error("script initialisation failed: {0}")]
    Init(String),
}

/// A compiled evaluator misbehaved for one frame.
#[derive(Debug, thiserror::Error)]
pub enum ScriptRuntimeError {
    #[error("script evaluation failed: {0}")]
    Evaluation(String),
    #[error("script produced {actual}, expected a {expected} value")]
    ShapeMismatch {
        expected: UniformType,
        actual: String,
    },
}

/// A compiled per-frame value callback. Evaluators may keep internal state
/// across frames; the init/frame script split depends on it.
pub trait UniformEvaluator {
    fn evaluate(&mut self, ctx: &FrameContext) -> Result<UniformValue, ScriptRuntimeError>;
}

/// Compiles uniform scripts into evaluators. The declared type travels with
/// the script so the engine can coerce its result; the registry re-checks the
/// shape regardless.
pub trait ScriptEngine {
    fn compile(&self, script: &UniformScript)
        -> Result<Box<dyn UniformEvaluator>, ScriptCompileError>;
}
