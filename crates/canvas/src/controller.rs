//! Program lifecycle: recompile orchestration, diagnostic remapping, and the
//! per-frame draw cycle.

use crate::backend::{CompileFailure, GraphicsBackend, ProgramId, Stage};
use crate::diagnostics::{self, DiagnosticSet, RemappedDiagnostic};
use crate::segment::{self, SegmentKind, SourceSegment};
use crate::types::FrameContext;
use crate::uniforms::UniformRegistry;

/// Where the controller stands in the compile lifecycle. There is no distinct
/// drawing phase: drawing is a read operation, permitted in both `Linked` and
/// `Failed` (using the last good program, if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramPhase {
    /// No compile has been attempted yet.
    Empty,
    /// The most recent compile linked successfully.
    Linked,
    /// The most recent compile failed; any previously linked program is
    /// retained and keeps rendering.
    Failed,
}

/// Owns the current program handle and drives recompiles and frames.
///
/// The vertex stage is fixed at construction; only the fragment stage is
/// rebuilt from segments on [`ShaderController::recompile`].
pub struct ShaderController<B: GraphicsBackend> {
    backend: B,
    vertex_source: String,
    program: Option<ProgramId>,
    phase: ProgramPhase,
    diagnostics: DiagnosticSet,
}

impl<B: GraphicsBackend> ShaderController<B> {
    pub fn new(backend: B, vertex_source: impl Into<String>) -> Self {
        Self {
            backend,
            vertex_source: vertex_source.into(),
            program: None,
            phase: ProgramPhase::Empty,
            diagnostics: DiagnosticSet::new(),
        }
    }

    pub fn phase(&self) -> ProgramPhase {
        self.phase
    }

    /// Diagnostics produced by the most recent [`ShaderController::recompile`].
    pub fn diagnostics(&self) -> &DiagnosticSet {
        &self.diagnostics
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Rebuilds the fragment stage from `segments` and relinks.
    ///
    /// The previous diagnostic set is cleared before the backend is invoked:
    /// diagnostics are always the product of the most recent compile only. On
    /// success the old program is released; on failure it is retained so the
    /// last good frame keeps rendering, and the failure is remapped into
    /// user-visible line numbers (injected segments are excluded from those
    /// and routed to the log instead).
    pub fn recompile(&mut self, segments: &[SourceSegment]) -> &DiagnosticSet {
        self.diagnostics.clear();
        let fragment = segment::assemble(segments);
        match self.backend.compile_program(&self.vertex_source, &fragment) {
            Ok(program) => {
                if let Some(old) = self.program.replace(program) {
                    self.backend.destroy_program(old);
                }
                self.phase = ProgramPhase::Linked;
                tracing::debug!(segments = segments.len(), "shader program linked");
            }
            Err(failure) => {
                self.phase = ProgramPhase::Failed;
                self.apply_failure(failure, segments);
                tracing::debug!(
                    diagnostics = self.diagnostics.len(),
                    "shader recompile failed; previous program retained"
                );
            }
        }
        &self.diagnostics
    }

    /// Runs one frame: viewport resize, uniform evaluation, dispatch, draw.
    /// Does nothing beyond the resize until a program has linked once.
    pub fn draw_frame(&mut self, uniforms: &mut UniformRegistry, ctx: &FrameContext) {
        self.backend
            .resize_viewport(ctx.canvas_width, ctx.canvas_height);
        let Some(program) = self.program else {
            return;
        };
        for update in uniforms.evaluate_all(ctx) {
            self.backend
                .set_uniform(program, &update.name, update.ty, &update.value);
        }
        self.backend.draw(Some(program));
    }

    fn apply_failure(&mut self, failure: CompileFailure, segments: &[SourceSegment]) {
        let vertex_segments = [SourceSegment::injected("vertex", self.vertex_source.clone())];
        for stage_log in failure.stages {
            let raw = diagnostics::parse_log(&stage_log.log);
            let table: &[SourceSegment] = match stage_log.stage {
                Stage::Vertex => &vertex_segments,
                Stage::Fragment => segments,
                // Link logs carry no usable line numbers; remapping against an
                // empty table turns every record into a link-level one.
                Stage::Link => &[],
            };
            for remapped in diagnostics::remap(raw, table) {
                self.record(remapped, stage_log.stage, table);
            }
        }
    }

    fn record(&mut self, remapped: RemappedDiagnostic, stage: Stage, table: &[SourceSegment]) {
        match remapped {
            RemappedDiagnostic::Link { message } => self.diagnostics.push_link(message),
            RemappedDiagnostic::Line {
                segment_index,
                kind,
                global_line,
                local_line,
                message,
            } => {
                if kind == SegmentKind::Injected {
                    // Machine-generated code the user never sees; pointing at a
                    // user line here would be a lie.
                    tracing::error!(
                        %stage,
                        segment = %table[segment_index].name,
                        line = local_line,
                        message = %message,
                        "compile error in injected shader code"
                    );
                    return;
                }
                let hidden: usize = table[..segment_index]
                    .iter()
                    .filter(|segment| segment.kind == SegmentKind::Injected)
                    .map(SourceSegment::line_count)
                    .sum();
                self.diagnostics.push(global_line - hidden, message);
            }
        }
    }
}

impl<B: GraphicsBackend> Drop for ShaderController<B> {
    fn drop(&mut self) {
        if let Some(program) = self.program.take() {
            self.backend.destroy_program(program);
        }
    }
}
