use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Phong material as described by a Wavefront MTL entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub alpha: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffuse_map: Option<PathBuf>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            ambient: Vec3::splat(0.5),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::splat(0.2),
            shininess: 10.0,
            alpha: 1.0,
            diffuse_map: None,
        }
    }
}

/// Named materials loaded from one or more MTL files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialLibrary {
    materials: HashMap<String, Material>,
}

impl MaterialLibrary {
    /// Reads an MTL file; texture paths are resolved against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("unable to read material library {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&data, base_dir)
            .with_context(|| format!("failed to parse material library {}", path.display()))
    }

    pub fn parse(data: &str, base_dir: &Path) -> Result<Self> {
        let mut materials = HashMap::new();
        let mut current: Option<Material> = None;

        for (line_no, line) in data.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (tag, rest) = trimmed
                .split_once(char::is_whitespace)
                .map(|(tag, rest)| (tag, rest.trim()))
                .unwrap_or((trimmed, ""));

            if tag == "newmtl" {
                if let Some(done) = current.take() {
                    materials.insert(done.name.clone(), done);
                }
                if rest.is_empty() {
                    return Err(anyhow!("unnamed material on line {}", line_no + 1));
                }
                current = Some(Material {
                    name: rest.to_string(),
                    ..Material::default()
                });
                continue;
            }

            let known = matches!(tag, "Ka" | "Kd" | "Ks" | "Ns" | "d" | "Tr" | "map_Kd");
            if !known {
                continue;
            }
            let material = current.as_mut().ok_or_else(|| {
                anyhow!("`{tag}` on line {} appears before any newmtl", line_no + 1)
            })?;
            let context = || format!("invalid `{tag}` on line {}", line_no + 1);
            match tag {
                "Ka" => material.ambient = parse_color(rest).with_context(context)?,
                "Kd" => material.diffuse = parse_color(rest).with_context(context)?,
                "Ks" => material.specular = parse_color(rest).with_context(context)?,
                "Ns" => material.shininess = parse_scalar(rest).with_context(context)?,
                "d" => material.alpha = parse_scalar(rest).with_context(context)?.clamp(0.0, 1.0),
                "Tr" => {
                    material.alpha = (1.0 - parse_scalar(rest).with_context(context)?).clamp(0.0, 1.0)
                }
                "map_Kd" => {
                    // Options such as `-s 1 1 1` precede the file name.
                    let file = rest
                        .split_whitespace()
                        .last()
                        .ok_or_else(|| anyhow!("missing texture path"))
                        .with_context(context)?;
                    material.diffuse_map = Some(base_dir.join(file));
                }
                _ => {}
            }
        }

        if let Some(done) = current.take() {
            materials.insert(done.name.clone(), done);
        }
        Ok(Self { materials })
    }

    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    pub fn extend(&mut self, other: MaterialLibrary) {
        self.materials.extend(other.materials);
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

fn parse_color(value: &str) -> Result<Vec3> {
    let components = value
        .split_whitespace()
        .map(str::parse::<f32>)
        .collect::<Result<Vec<_>, _>>()?;
    match components.as_slice() {
        [grey] => Ok(Vec3::splat(*grey)),
        [r, g, b, ..] => Ok(Vec3::new(*r, *g, *b)),
        _ => Err(anyhow!("color is missing components")),
    }
}

fn parse_scalar(value: &str) -> Result<f32> {
    let first = value
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow!("missing value"))?;
    Ok(first.parse::<f32>()?)
}
