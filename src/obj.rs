use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::material::{Material, MaterialLibrary};

/// Number of floats per interleaved vertex: position, normal, uv.
pub const VERTEX_STRIDE: usize = 8;

/// GPU ready mesh buffers produced from one object/material run of an OBJ file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjMesh {
    pub name: String,
    pub material: Material,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl ObjMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Loads an OBJ file together with the MTL libraries it references.
///
/// The file is split into one mesh per `o`/`g`/`usemtl` run, mirroring how
/// exporters group faces by material.
pub fn load_obj_file(path: &Path) -> Result<Vec<ObjMesh>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("unable to read OBJ file {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut library = MaterialLibrary::default();
    for name in material_libraries(&data) {
        let mtl_path = base_dir.join(name);
        match MaterialLibrary::load(&mtl_path) {
            Ok(loaded) => {
                debug!(
                    "loaded {} material(s) from {}",
                    loaded.len(),
                    mtl_path.display()
                );
                library.extend(loaded);
            }
            Err(err) => warn!("using default materials for {}: {err:#}", path.display()),
        }
    }

    load_obj_from_str(&data, &library).with_context(|| format!("failed to parse {}", path.display()))
}

/// Returns the library names referenced by `mtllib` statements.
pub fn material_libraries(data: &str) -> Vec<&str> {
    data.lines()
        .filter_map(|line| line.trim().strip_prefix("mtllib"))
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .flat_map(str::split_whitespace)
        .collect()
}

/// Parses an OBJ file from memory, resolving `usemtl` against `library`.
pub fn load_obj_from_str(data: &str, library: &MaterialLibrary) -> Result<Vec<ObjMesh>> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut texcoords = Vec::new();
    let mut runs = vec![FaceRun::default()];

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "vt" => texcoords.push(
                parse_vec2(parts)
                    .with_context(|| format!("invalid texture coordinate on line {}", line_no + 1))?,
            ),
            "f" => {
                let counts = AttributeCounts {
                    positions: positions.len(),
                    texcoords: texcoords.len(),
                    normals: normals.len(),
                };
                let polygon = parse_face(parts, &counts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                let run = runs.last_mut().ok_or_else(|| anyhow!("no active face group"))?;
                triangulate_face(&polygon, &mut run.faces);
            }
            "o" | "g" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                start_run(&mut runs, |run| run.name = Some(name));
            }
            "usemtl" => {
                let material = parts.collect::<Vec<_>>().join(" ");
                start_run(&mut runs, |run| run.material = Some(material));
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let attributes = Attributes {
        positions: &positions,
        normals: &normals,
        texcoords: &texcoords,
    };
    let mut meshes = Vec::new();
    for (index, run) in runs.into_iter().enumerate() {
        if run.faces.is_empty() {
            continue;
        }
        let mut mesh = build_mesh(&attributes, &run.faces);
        mesh.material = match run.material.as_deref() {
            Some(name) => library.get(name).cloned().unwrap_or_else(|| {
                warn!("material `{name}` not found, using default");
                Material::default()
            }),
            None => Material::default(),
        };
        mesh.name = run
            .name
            .or(run.material)
            .unwrap_or_else(|| format!("mesh{index}"));
        meshes.push(mesh);
    }

    if meshes.is_empty() {
        return Err(anyhow!("OBJ file does not define any faces"));
    }
    Ok(meshes)
}

#[derive(Debug, Default)]
struct FaceRun {
    name: Option<String>,
    material: Option<String>,
    faces: Vec<[Key; 3]>,
}

/// Opens a new run that inherits the current name and material, unless the
/// current run has no faces yet and can simply be relabelled.
fn start_run(runs: &mut Vec<FaceRun>, update: impl FnOnce(&mut FaceRun)) {
    let inherited = match runs.last() {
        Some(last) if last.faces.is_empty() => None,
        Some(last) => Some(FaceRun {
            name: last.name.clone(),
            material: last.material.clone(),
            faces: Vec::new(),
        }),
        None => Some(FaceRun::default()),
    };
    if let Some(run) = inherited {
        runs.push(run);
    }
    if let Some(run) = runs.last_mut() {
        update(run);
    }
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let x = parts
        .next()
        .ok_or_else(|| anyhow!("missing vector component"))?
        .parse::<f32>()?;
    let y = parts
        .next()
        .ok_or_else(|| anyhow!("missing vector component"))?
        .parse::<f32>()?;
    let z = parts
        .next()
        .ok_or_else(|| anyhow!("missing vector component"))?
        .parse::<f32>()?;
    Ok(Vec3::new(x, y, z))
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let u = parts
        .next()
        .ok_or_else(|| anyhow!("missing texture component"))?
        .parse::<f32>()?;
    let v = match parts.next() {
        Some(value) => value.parse::<f32>()?,
        None => 0.0,
    };
    Ok(Vec2::new(u, v))
}

/// Attribute counts at the point a face is read; relative indices resolve
/// against these.
struct AttributeCounts {
    positions: usize,
    texcoords: usize,
    normals: usize,
}

fn parse_face<'a>(
    parts: impl Iterator<Item = &'a str>,
    counts: &AttributeCounts,
) -> Result<Vec<Key>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let position =
            fix_index(v, counts.positions).ok_or_else(|| anyhow!("invalid vertex index {v}"))?;
        let texcoord = match parse_optional_index(segments.next())? {
            0 => None,
            vt => Some(
                fix_index(vt, counts.texcoords)
                    .ok_or_else(|| anyhow!("invalid texture coordinate index {vt}"))?,
            ),
        };
        let normal = match parse_optional_index(segments.next())? {
            0 => None,
            vn => Some(
                fix_index(vn, counts.normals)
                    .ok_or_else(|| anyhow!("invalid normal index {vn}"))?,
            ),
        };
        indices.push(Key {
            position,
            texcoord,
            normal,
        });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn parse_optional_index(segment: Option<&str>) -> Result<i32> {
    match segment {
        Some(s) if !s.is_empty() => Ok(s.parse::<i32>()?),
        _ => Ok(0),
    }
}

fn triangulate_face(polygon: &[Key], faces: &mut Vec<[Key; 3]>) {
    if polygon.len() < 3 {
        return;
    }
    for i in 1..(polygon.len() - 1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    texcoord: Option<usize>,
    normal: Option<usize>,
}

struct Attributes<'a> {
    positions: &'a [Vec3],
    normals: &'a [Vec3],
    texcoords: &'a [Vec2],
}

/// Deduplicates face corners into interleaved vertices. Corners without a
/// `vn` get smooth normals averaged from the faces that share them.
fn build_mesh(attributes: &Attributes<'_>, faces: &[[Key; 3]]) -> ObjMesh {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let mut missing_normal = Vec::new();

    for face in faces {
        for &key in face {
            let next_index = (vertices.len() / VERTEX_STRIDE) as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                missing_normal.push(key.normal.is_none());
                let position = attributes.positions[key.position];
                vertices.extend_from_slice(&position.to_array());
                let normal = key
                    .normal
                    .map(|i| attributes.normals[i])
                    .unwrap_or(Vec3::ZERO);
                vertices.extend_from_slice(&normal.to_array());
                // OBJ puts v=0 at the bottom of the image, wgpu at the top.
                let uv = key
                    .texcoord
                    .map(|i| attributes.texcoords[i])
                    .unwrap_or(Vec2::ZERO);
                vertices.extend_from_slice(&[uv.x, 1.0 - uv.y]);
                next_index
            });
            indices.push(*entry);
        }
    }

    let mut mesh = ObjMesh {
        vertices,
        indices,
        ..ObjMesh::default()
    };
    if missing_normal.contains(&true) {
        compute_normals(&mut mesh, &missing_normal);
    }
    mesh
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}

/// Only vertices flagged in `missing` are overwritten.
fn compute_normals(mesh: &mut ObjMesh, missing: &[bool]) {
    let vertex_count = mesh.vertex_count();
    let mut accum = vec![Vec3::ZERO; vertex_count];
    let position = |vertices: &[f32], i: usize| {
        Vec3::from_slice(&vertices[i * VERTEX_STRIDE..i * VERTEX_STRIDE + 3])
    };

    for triangle in mesh.indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;
        let p0 = position(&mesh.vertices, i0);
        let p1 = position(&mesh.vertices, i1);
        let p2 = position(&mesh.vertices, i2);
        let normal = (p1 - p0).cross(p2 - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (i, normal) in accum.into_iter().enumerate() {
        if !missing[i] {
            continue;
        }
        let normal = normal.normalize_or_zero();
        let base = i * VERTEX_STRIDE;
        mesh.vertices[base + 3..base + 6].copy_from_slice(&normal.to_array());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(obj: &str) -> Vec<ObjMesh> {
        load_obj_from_str(obj, &MaterialLibrary::default()).unwrap()
    }

    #[test]
    fn parses_simple_triangle() {
        let meshes = parse("\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].indices, vec![0, 1, 2]);
        assert_eq!(meshes[0].vertices.len(), 3 * VERTEX_STRIDE);
    }

    #[test]
    fn computes_missing_normals() {
        let meshes = parse("\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
        for chunk in meshes[0].vertices.chunks_exact(VERTEX_STRIDE) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert!(normal.abs_diff_eq(Vec3::Z, 1e-5));
        }
    }

    #[test]
    fn quads_are_fan_triangulated() {
        let meshes = parse("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n");
        assert_eq!(meshes[0].triangle_count(), 2);
        assert_eq!(meshes[0].indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn texcoords_and_normals_are_interleaved() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.25 0.75\nvn 0 1 0\nf 1/1/1 2/1/1 3/1/1\n";
        let meshes = parse(obj);
        let first = &meshes[0].vertices[..VERTEX_STRIDE];
        assert_eq!(&first[3..6], &[0.0, 1.0, 0.0]);
        assert_eq!(&first[6..8], &[0.25, 0.25]);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let meshes = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n");
        assert_eq!(meshes[0].vertex_count(), 3);
    }

    #[test]
    fn negative_indices_resolve_where_the_face_is_read() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n\
                   v 5 5 5\nv 6 5 5\nv 5 6 5\nf -3 -2 -1\n";
        let mesh = &parse(obj)[0];
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(&mesh.vertices[..3], &[0.0, 0.0, 0.0]);
        let fourth = 3 * VERTEX_STRIDE;
        assert_eq!(&mesh.vertices[fourth..fourth + 3], &[5.0, 5.0, 5.0]);
    }

    #[test]
    fn out_of_range_texcoord_and_normal_indices_are_errors() {
        let library = MaterialLibrary::default();
        let texcoord = load_obj_from_str(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/9 2/9 3/9\n",
            &library,
        )
        .unwrap_err();
        assert!(format!("{texcoord:#}").contains("invalid texture coordinate index 9"));
        let normal = load_obj_from_str(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//2 2//2 3//2\n",
            &library,
        )
        .unwrap_err();
        assert!(format!("{normal:#}").contains("invalid normal index 2"));
        // A relative index may not reach past attributes declared so far.
        assert!(load_obj_from_str("v 0 0 0\nv 1 0 0\nf -3 -2 -1\nv 0 1 0\n", &library).is_err());
    }

    #[test]
    fn supplied_normals_survive_alongside_computed_ones() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nvn 0 0 -1\n\
                   f 1//1 2//1 3//1\nf 2 4 3\n";
        let mesh = &parse(obj)[0];
        assert_eq!(mesh.vertex_count(), 6);
        for chunk in mesh.vertices.chunks_exact(VERTEX_STRIDE).take(3) {
            assert_eq!(&chunk[3..6], &[0.0, 0.0, -1.0]);
        }
        for chunk in mesh.vertices.chunks_exact(VERTEX_STRIDE).skip(3) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert!(normal.abs_diff_eq(Vec3::Z, 1e-5));
        }
    }

    #[test]
    fn usemtl_splits_meshes_and_resolves_materials() {
        let library = MaterialLibrary::parse(
            "newmtl Bark\nKd 0.4 0.2 0.1\nnewmtl Leaves\nKd 0.1 0.6 0.1\n",
            Path::new("."),
        )
        .unwrap();
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\n\
                   usemtl Bark\nf 1 2 3\n\
                   usemtl Leaves\nf 2 4 3\n";
        let meshes = load_obj_from_str(obj, &library).unwrap();
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0].name, "Bark");
        assert_eq!(meshes[0].material.diffuse, Vec3::new(0.4, 0.2, 0.1));
        assert_eq!(meshes[1].material.name, "Leaves");
    }

    #[test]
    fn unknown_material_falls_back_to_default() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl Missing\nf 1 2 3\n";
        let meshes = parse(obj);
        assert_eq!(meshes[0].material, Material::default());
    }

    #[test]
    fn object_names_label_meshes() {
        let obj = "o Palm\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        assert_eq!(parse(obj)[0].name, "Palm");
    }

    #[test]
    fn rejects_files_without_faces_or_vertices() {
        let library = MaterialLibrary::default();
        assert!(load_obj_from_str("# empty\n", &library).is_err());
        assert!(load_obj_from_str("v 0 0 0\n", &library).is_err());
        assert!(load_obj_from_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n", &library).is_err());
        assert!(load_obj_from_str("v 0 zero 0\n", &library).is_err());
    }

    #[test]
    fn lists_material_libraries() {
        let obj = "mtllib trees.mtl extra.mtl\nmtllibrary nope\nv 0 0 0\n";
        assert_eq!(material_libraries(obj), vec!["trees.mtl", "extra.mtl"]);
    }

    #[test]
    fn loads_materials_next_to_the_obj_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut mtl = std::fs::File::create(dir.path().join("rock.mtl")).unwrap();
        writeln!(mtl, "newmtl Rock\nKd 0.5 0.5 0.5\nmap_Kd rock.png").unwrap();
        let obj_path = dir.path().join("rock.obj");
        std::fs::write(
            &obj_path,
            "mtllib rock.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl Rock\nf 1 2 3\n",
        )
        .unwrap();

        let meshes = load_obj_file(&obj_path).unwrap();
        assert_eq!(meshes[0].material.name, "Rock");
        assert_eq!(
            meshes[0].material.diffuse_map.as_deref(),
            Some(dir.path().join("rock.png").as_path())
        );
    }

    #[test]
    fn missing_obj_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_obj_file(&dir.path().join("absent.obj")).is_err());
    }
}
