use crate::types::{UniformType, UniformValue};

/// Opaque handle to a linked program owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(u64);

impl ProgramId {
    pub fn new(raw: u64) -> Self {
        ProgramId(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Pipeline stage a compile log originated from. Vertex and fragment logs are
/// reported separately and remapped against their own segment tables; link
/// logs carry no line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
    Link,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
            Stage::Link => f.write_str("link"),
        }
    }
}

/// Raw info log for one failed stage.
#[derive(Debug, Clone)]
pub struct StageLog {
    pub stage: Stage,
    pub log: String,
}

/// Program creation was rejected; carries each failing stage's raw log.
#[derive(Debug, Clone, thiserror::Error)]
#[error("shader compilation failed in {} stage(s)", stages.len())]
pub struct CompileFailure {
    pub stages: Vec<StageLog>,
}

impl CompileFailure {
    pub fn single(stage: Stage, log: impl Into<String>) -> Self {
        Self {
            stages: vec![StageLog {
                stage,
                log: log.into(),
            }],
        }
    }
}

/// Minimal capability surface the controller needs from a GPU API.
///
/// Info logs follow the `ERROR: <unit>:<line>: <message>` shape with `<line>`
/// 0-indexed against the exact source handed to [`compile_program`]; see
/// [`crate::diagnostics::parse_log`]. Implementations are used from a single
/// thread only; callers are responsible for not interleaving calls.
///
/// [`compile_program`]: GraphicsBackend::compile_program
pub trait GraphicsBackend {
    /// Compiles and links a program from vertex and fragment sources.
    fn compile_program(&mut self, vertex: &str, fragment: &str)
        -> Result<ProgramId, CompileFailure>;

    /// Releases a program previously returned by
    /// [`GraphicsBackend::compile_program`]. Unknown handles are ignored.
    fn destroy_program(&mut self, program: ProgramId);

    /// Uploads one uniform value. Names that do not resolve to an active
    /// uniform are silently ignored: a declared-but-unreferenced uniform is
    /// expected, not an error.
    fn set_uniform(&mut self, program: ProgramId, name: &str, ty: UniformType, value: &UniformValue);

    /// Matches the render target to the current canvas dimensions.
    fn resize_viewport(&mut self, width: u32, height: u32);

    /// Draws one frame with `program`, or does nothing when `None`.
    fn draw(&mut self, program: Option<ProgramId>);
}
