//! GLSL source processing for the wgpu backend.
//!
//! Submitted sources are WebGL-style GLSL with plain `uniform <type> <name>;`
//! declarations. wgpu has no named uniform slots, so the declarations are
//! *lowered*: each declaration line is blanked (count-preserving, so
//! diagnostics keep their line numbers), the gathered interface becomes a
//! single std140 uniform block in an injected prelude, and `#define` aliases
//! map the original names onto block members. The prelude's own line count is
//! subtracted again when naga diagnostics are serialised, keeping the
//! backend's log 0-indexed against the submitted text.

use wgpu::naga;
use wgpu::naga::front::glsl;
use wgpu::naga::valid;
use wgpu::naga::ShaderStage;

use crate::types::UniformType;

/// A stage source with its uniform declarations stripped out.
pub(crate) struct LoweredStage {
    pub text: String,
    pub interface: Vec<(String, UniformType)>,
}

/// Blanks `#version`/`precision` directives and `uniform` declarations,
/// recording the declared interface. The output has the same line numbering
/// as the input.
pub(crate) fn lower_stage_source(source: &str) -> LoweredStage {
    let mut interface = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    for line in source.lines() {
        if let Some(declaration) = parse_uniform_declaration(line) {
            interface.push(declaration);
            lines.push("");
            continue;
        }
        let trimmed = line.trim_start();
        if trimmed.starts_with("#version") || trimmed.starts_with("precision ") {
            lines.push("");
            continue;
        }
        lines.push(line);
    }
    LoweredStage {
        text: lines.join("\n"),
        interface,
    }
}

fn parse_uniform_declaration(line: &str) -> Option<(String, UniformType)> {
    let trimmed = line.trim();
    let body = trimmed.strip_prefix("uniform")?;
    if !body.starts_with(char::is_whitespace) || !trimmed.ends_with(';') {
        return None;
    }
    let body = &body[..body.len() - 1];
    let mut tokens = body.split_whitespace();
    let mut ty_token = tokens.next()?;
    if matches!(ty_token, "lowp" | "mediump" | "highp") {
        ty_token = tokens.next()?;
    }
    let ty = UniformType::from_glsl_name(ty_token)?;
    let name = tokens.next()?;
    if tokens.next().is_some() || !is_identifier(name) {
        return None;
    }
    Some((name.to_string(), ty))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Unions per-stage interfaces; uniforms are program-global, so a name
/// declared in both stages must agree on its type.
pub(crate) fn merge_interfaces(
    stages: &[&[(String, UniformType)]],
) -> Result<Vec<(String, UniformType)>, String> {
    let mut merged: Vec<(String, UniformType)> = Vec::new();
    for interface in stages {
        for (name, ty) in interface.iter() {
            match merged.iter().find(|(existing, _)| existing == name) {
                Some((_, existing)) if existing == ty => {}
                Some((_, existing)) => {
                    return Err(format!(
                        "uniform '{name}' declared as both {existing} and {ty}"
                    ));
                }
                None => merged.push((name.clone(), *ty)),
            }
        }
    }
    Ok(merged)
}

/// Prelude prepended to every lowered stage: version directive plus, when the
/// interface is non-empty, the std140 block and name aliases. Always ends in
/// a newline so lowered line 0 follows immediately after the prelude lines.
pub(crate) fn block_prelude(interface: &[(String, UniformType)]) -> String {
    let mut prelude = String::from("#version 450\n");
    if interface.is_empty() {
        return prelude;
    }
    prelude.push_str("layout(std140, set = 0, binding = 0) uniform ShaderParams {\n");
    for (name, ty) in interface {
        prelude.push_str(&format!("    {} _{name};\n", ty.glsl_name()));
    }
    prelude.push_str("} _ubo;\n");
    for (name, _) in interface {
        prelude.push_str(&format!("#define {name} _ubo._{name}\n"));
    }
    prelude
}

pub(crate) fn prelude_line_count(prelude: &str) -> usize {
    prelude.matches('\n').count()
}

/// Parses and validates one wrapped stage. On failure returns a log in the
/// backend's `ERROR: 0:<line>: <message>` convention, 0-indexed against the
/// submitted (pre-wrap) source.
pub(crate) fn build_module(
    wrapped: &str,
    stage: ShaderStage,
    prelude_lines: usize,
) -> Result<naga::Module, String> {
    let mut frontend = glsl::Frontend::default();
    let module = match frontend.parse(&glsl::Options::from(stage), wrapped) {
        Ok(module) => module,
        Err(errors) => {
            let mut log_lines: Vec<String> = errors
                .errors
                .iter()
                .map(|error| {
                    let location = error.meta.location(wrapped);
                    format_log_line(
                        location.line_number as usize,
                        &error.kind.to_string(),
                        prelude_lines,
                    )
                })
                .collect();
            if log_lines.is_empty() {
                log_lines.push("shader failed to parse".to_string());
            }
            return Err(log_lines.join("\n"));
        }
    };

    let mut validator = valid::Validator::new(valid::ValidationFlags::all(), valid::Capabilities::all());
    if let Err(error) = validator.validate(&module) {
        let location = error.location(wrapped);
        let inner = error.into_inner();
        return Err(match location {
            Some(location) => {
                format_log_line(location.line_number as usize, &inner.to_string(), prelude_lines)
            }
            None => inner.to_string(),
        });
    }
    Ok(module)
}

fn format_log_line(line_number: usize, message: &str, prelude_lines: usize) -> String {
    let zero_based = line_number.saturating_sub(1);
    if zero_based < prelude_lines {
        // Inside our own prelude; there is no submitted line to point at.
        return message.to_string();
    }
    format!("ERROR: 0:{}: {}", zero_based - prelude_lines, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{self, RemappedDiagnostic};
    use crate::segment::{self, SourceSegment};

    #[test]
    fn lowering_blanks_declarations_and_directives() {
        let source = "#version 300 es\nprecision mediump float;\nuniform vec2 mouse;\nvoid main() {}";
        let lowered = lower_stage_source(source);
        assert_eq!(lowered.interface, vec![("mouse".to_string(), UniformType::Vec2)]);
        assert_eq!(lowered.text, "\n\n\nvoid main() {}");
    }

    #[test]
    fn lowering_accepts_precision_qualifiers() {
        let lowered = lower_stage_source("uniform mediump float aspectRatio;");
        assert_eq!(
            lowered.interface,
            vec![("aspectRatio".to_string(), UniformType::Float)]
        );
    }

    #[test]
    fn lowering_leaves_unknown_declarations_alone() {
        let source = "uniform sampler2D tex;";
        let lowered = lower_stage_source(source);
        assert!(lowered.interface.is_empty());
        assert_eq!(lowered.text, source);
    }

    #[test]
    fn merge_rejects_conflicting_types() {
        let vertex = vec![("t".to_string(), UniformType::Float)];
        let fragment = vec![("t".to_string(), UniformType::Vec2)];
        assert!(merge_interfaces(&[&vertex, &fragment]).is_err());
        let agreeing = vec![("t".to_string(), UniformType::Float)];
        assert_eq!(merge_interfaces(&[&vertex, &agreeing]).unwrap().len(), 1);
    }

    #[test]
    fn prelude_declares_block_and_aliases() {
        let prelude = block_prelude(&[("speed".to_string(), UniformType::Float)]);
        assert!(prelude.contains("float _speed;"));
        assert!(prelude.contains("#define speed _ubo._speed"));
        assert_eq!(block_prelude(&[]), "#version 450\n");
    }

    #[test]
    fn well_formed_fragment_stage_builds() {
        let source = "layout(location = 0) out vec4 fragColor;\nuniform float t;\nvoid main() { fragColor = vec4(t); }";
        let lowered = lower_stage_source(source);
        let prelude = block_prelude(&lowered.interface);
        let wrapped = format!("{prelude}{}", lowered.text);
        build_module(
            &wrapped,
            ShaderStage::Fragment,
            prelude_line_count(&prelude),
        )
        .expect("fragment should compile");
    }

    #[test]
    fn malformed_body_reports_into_the_body_segment() {
        let segments = [
            SourceSegment::user("header", "uniform float x;"),
            SourceSegment::user("gap", ""),
            SourceSegment::user("body", "void main(){ x = }"),
        ];
        let assembled = segment::assemble(&segments);
        let lowered = lower_stage_source(&assembled);
        let prelude = block_prelude(&lowered.interface);
        let wrapped = format!("{prelude}{}", lowered.text);
        let log = build_module(
            &wrapped,
            ShaderStage::Fragment,
            prelude_line_count(&prelude),
        )
        .expect_err("malformed body must fail");

        let remapped = diagnostics::remap(diagnostics::parse_log(&log), &segments);
        let in_body = remapped.iter().any(|diagnostic| {
            matches!(
                diagnostic,
                RemappedDiagnostic::Line {
                    segment_index: 2,
                    global_line: 2,
                    local_line: 0,
                    ..
                }
            )
        });
        assert!(in_body, "expected a diagnostic in the body segment: {remapped:?}");
    }
}
