//! Shader compilation and uniform-binding core.
//!
//! The crate is split along the seams an editor frontend plugs into: it
//! consumes plain source segments and typed uniform providers, and hands back
//! line-keyed diagnostics and frames. The GPU sits behind the
//! [`GraphicsBackend`] trait; [`WgpuCanvas`] is the shipped implementation.

mod backend;
mod controller;
pub mod diagnostics;
pub mod gpu;
mod script;
mod segment;
mod types;
mod uniforms;

pub use backend::{CompileFailure, GraphicsBackend, ProgramId, Stage, StageLog};
pub use controller::{ProgramPhase, ShaderController};
pub use diagnostics::{DiagnosticSet, LINK_LINE};
pub use gpu::{SnapshotImage, WgpuCanvas};
pub use script::{
    ScriptCompileError, ScriptEngine, ScriptRuntimeError, UniformEvaluator, UniformScript,
};
pub use segment::{assemble, SegmentKind, SourceSegment};
pub use types::{FrameContext, UniformType, UniformValue};
pub use uniforms::{ProviderId, RegistryError, UniformProvider, UniformRegistry, UniformUpdate};
