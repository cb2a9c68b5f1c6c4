//! Project files: the shader body plus uniform definitions, as TOML.
//!
//! Uniform entries come in two forms — a fixed `value`, or `init`/`frame`
//! script sources — mirroring the static/scripted provider split in the core.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use canvas::{UniformScript, UniformType, UniformValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Fragment body inline. Mutually exclusive with `main_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Fragment body on disk, relative to the project file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uniforms: Vec<UniformDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: UniformType,
    /// Fixed value for static uniforms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<StaticValue>,
    /// Initialisation code for scripted uniforms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<String>,
    /// Per-frame code for scripted uniforms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StaticValue {
    Scalar(f64),
    List(Vec<f64>),
}

/// What a [`UniformDef`] resolves to once validated.
pub enum ProviderSpec {
    Static(UniformValue),
    Scripted(UniformScript),
}

impl UniformDef {
    pub fn provider(&self) -> Result<ProviderSpec> {
        match (&self.value, &self.frame) {
            (Some(_), Some(_)) => {
                anyhow::bail!("uniform '{}' declares both a value and frame code", self.name)
            }
            (None, None) => anyhow::bail!(
                "uniform '{}' declares neither a value nor frame code",
                self.name
            ),
            (Some(value), None) => Ok(ProviderSpec::Static(static_value(self.ty, value)?)),
            (None, Some(frame)) => Ok(ProviderSpec::Scripted(UniformScript {
                name: self.name.clone(),
                ty: self.ty,
                init: self.init.clone().unwrap_or_default(),
                frame: frame.clone(),
            })),
        }
    }
}

fn static_value(ty: UniformType, value: &StaticValue) -> Result<UniformValue> {
    let components: Vec<f64> = match value {
        StaticValue::Scalar(v) => vec![*v],
        StaticValue::List(vs) => vs.clone(),
    };
    if components.len() != ty.component_count() {
        anyhow::bail!(
            "value has {} component(s) but {} needs {}",
            components.len(),
            ty,
            ty.component_count()
        );
    }
    Ok(match ty {
        UniformType::Float => UniformValue::Float(components[0] as f32),
        UniformType::Int => UniformValue::Int(components[0] as i32),
        UniformType::Vec2 => UniformValue::Vec2(floats(&components)),
        UniformType::IVec2 => {
            UniformValue::IVec2([components[0] as i32, components[1] as i32])
        }
        UniformType::Vec3 => UniformValue::Vec3(floats(&components)),
        UniformType::Vec4 => UniformValue::Vec4(floats(&components)),
        UniformType::Mat2 => UniformValue::Mat2(floats(&components)),
        UniformType::Mat3 => UniformValue::Mat3(floats(&components)),
        UniformType::Mat4 => UniformValue::Mat4(floats(&components)),
    })
}

fn floats<const N: usize>(components: &[f64]) -> [f32; N] {
    std::array::from_fn(|index| components[index] as f32)
}

impl Project {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read project file at {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse project file at {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| {
                format!("failed to prepare directory for project file at {}", dir.display())
            })?;
        }
        let serialized =
            toml::to_string_pretty(self).context("failed to serialize project to TOML")?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write project file to {}", path.display()))?;
        Ok(())
    }

    /// Returns the fragment body, reading `main_path` relative to `base_dir`.
    pub fn resolve_main(&self, base_dir: &Path) -> Result<String> {
        match (&self.main, &self.main_path) {
            (Some(_), Some(_)) => {
                anyhow::bail!("project defines both 'main' and 'main_path'")
            }
            (Some(main), None) => Ok(main.clone()),
            (None, Some(relative)) => {
                let path = if relative.is_absolute() {
                    relative.clone()
                } else {
                    base_dir.join(relative)
                };
                fs::read_to_string(&path)
                    .with_context(|| format!("failed to read shader body at {}", path.display()))
            }
            (None, None) => anyhow::bail!("project defines neither 'main' nor 'main_path'"),
        }
    }
}
