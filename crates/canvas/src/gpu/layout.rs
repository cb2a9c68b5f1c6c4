//! std140 layout for the lowered uniform block.
//!
//! Plain `uniform <type> <name>;` declarations are gathered into a single
//! uniform block shared by both stages; this module computes where each
//! member lives so [`super::WgpuCanvas`] can write values by name into a CPU
//! scratch buffer. Offsets must agree with what a std140-compliant compiler
//! derives for the same member order — matrices occupy vec4-aligned columns.

use crate::types::{UniformType, UniformValue};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LayoutEntry {
    pub name: String,
    pub ty: UniformType,
    pub offset: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct UniformBlockLayout {
    entries: Vec<LayoutEntry>,
    size: usize,
}

/// std140 `(alignment, size)` for each supported type.
fn extent(ty: UniformType) -> (usize, usize) {
    match ty {
        UniformType::Float | UniformType::Int => (4, 4),
        UniformType::Vec2 | UniformType::IVec2 => (8, 8),
        UniformType::Vec3 => (16, 12),
        UniformType::Vec4 => (16, 16),
        UniformType::Mat2 => (16, 32),
        UniformType::Mat3 => (16, 48),
        UniformType::Mat4 => (16, 64),
    }
}

fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

impl UniformBlockLayout {
    pub fn new(interface: &[(String, UniformType)]) -> Self {
        let mut entries = Vec::with_capacity(interface.len());
        let mut cursor = 0;
        for (name, ty) in interface {
            let (alignment, size) = extent(*ty);
            let offset = align_to(cursor, alignment);
            entries.push(LayoutEntry {
                name: name.clone(),
                ty: *ty,
                offset,
            });
            cursor = offset + size;
        }
        Self {
            entries,
            size: align_to(cursor.max(1), 16),
        }
    }

    /// Buffer size in bytes, rounded to std140 block alignment.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Option<&LayoutEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Writes `value` into `scratch` at the member's offset. Returns false —
    /// without touching the buffer — when the name is not a member or the
    /// value's shape does not match the declaration.
    pub fn write(&self, scratch: &mut [u8], name: &str, value: &UniformValue) -> bool {
        let Some(entry) = self.entry(name) else {
            return false;
        };
        if !value.matches(entry.ty) {
            return false;
        }
        let at = entry.offset;
        match value {
            UniformValue::Float(v) => write_floats(scratch, at, &[*v]),
            UniformValue::Int(v) => write_ints(scratch, at, &[*v]),
            UniformValue::Vec2(v) => write_floats(scratch, at, v),
            UniformValue::IVec2(v) => write_ints(scratch, at, v),
            UniformValue::Vec3(v) => write_floats(scratch, at, v),
            UniformValue::Vec4(v) => write_floats(scratch, at, v),
            UniformValue::Mat2(v) => write_columns(scratch, at, v, 2),
            UniformValue::Mat3(v) => write_columns(scratch, at, v, 3),
            UniformValue::Mat4(v) => write_columns(scratch, at, v, 4),
        }
        true
    }
}

fn write_floats(scratch: &mut [u8], offset: usize, values: &[f32]) {
    let bytes: &[u8] = bytemuck::cast_slice(values);
    scratch[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn write_ints(scratch: &mut [u8], offset: usize, values: &[i32]) {
    let bytes: &[u8] = bytemuck::cast_slice(values);
    scratch[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Matrices are column-major with each column padded to a vec4 stride.
fn write_columns(scratch: &mut [u8], offset: usize, values: &[f32], dimension: usize) {
    for column in 0..dimension {
        let source = &values[column * dimension..(column + 1) * dimension];
        write_floats(scratch, offset + column * 16, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interface(types: &[(&str, UniformType)]) -> Vec<(String, UniformType)> {
        types
            .iter()
            .map(|(name, ty)| (name.to_string(), *ty))
            .collect()
    }

    #[test]
    fn scalars_pack_tightly() {
        let layout = UniformBlockLayout::new(&interface(&[
            ("a", UniformType::Float),
            ("b", UniformType::Int),
            ("c", UniformType::Float),
        ]));
        let offsets: Vec<usize> = layout.entries.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, [0, 4, 8]);
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn vec3_aligns_to_sixteen_and_leaves_its_tail_free() {
        let layout = UniformBlockLayout::new(&interface(&[
            ("a", UniformType::Float),
            ("v", UniformType::Vec3),
            ("t", UniformType::Float),
        ]));
        let offsets: Vec<usize> = layout.entries.iter().map(|e| e.offset).collect();
        // vec3 starts at 16 and occupies 12 bytes; the float slots into 28.
        assert_eq!(offsets, [0, 16, 28]);
        assert_eq!(layout.size(), 32);
    }

    #[test]
    fn matrices_use_vec4_column_strides() {
        let layout = UniformBlockLayout::new(&interface(&[
            ("m2", UniformType::Mat2),
            ("m3", UniformType::Mat3),
            ("m4", UniformType::Mat4),
        ]));
        let offsets: Vec<usize> = layout.entries.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, [0, 32, 80]);
        assert_eq!(layout.size(), 144);
    }

    #[test]
    fn mat3_columns_are_padded_when_written() {
        let layout = UniformBlockLayout::new(&interface(&[("m", UniformType::Mat3)]));
        let mut scratch = vec![0u8; layout.size()];
        let m = UniformValue::Mat3([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert!(layout.write(&mut scratch, "m", &m));

        let floats: &[f32] = bytemuck::cast_slice(&scratch);
        assert_eq!(&floats[0..3], [1.0, 2.0, 3.0]);
        assert_eq!(&floats[4..7], [4.0, 5.0, 6.0]);
        assert_eq!(&floats[8..11], [7.0, 8.0, 9.0]);
    }

    #[test]
    fn write_rejects_unknown_names_and_wrong_shapes() {
        let layout = UniformBlockLayout::new(&interface(&[("v", UniformType::Vec2)]));
        let mut scratch = vec![0u8; layout.size()];
        assert!(!layout.write(&mut scratch, "missing", &UniformValue::Float(1.0)));
        assert!(!layout.write(&mut scratch, "v", &UniformValue::Vec3([0.0; 3])));
        assert!(scratch.iter().all(|byte| *byte == 0));
    }
}
