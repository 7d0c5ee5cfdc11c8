use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::Mat4;
use log::{debug, info};

use crate::obj::{load_obj_file, ObjMesh};
use crate::scene::{ModelGroup, SceneLayout};

/// Meshes of one [`ModelGroup`] after loading, with its model matrix applied.
#[derive(Debug, Clone)]
pub struct LoadedGroup {
    pub group: ModelGroup,
    pub model: Mat4,
    pub meshes: Vec<ObjMesh>,
}

impl LoadedGroup {
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(ObjMesh::triangle_count).sum()
    }
}

/// CPU side copy of every asset the layout references.
#[derive(Debug, Clone)]
pub struct LoadedScene {
    pub layout: SceneLayout,
    pub groups: Vec<LoadedGroup>,
    pub asset_dir: PathBuf,
}

impl LoadedScene {
    pub fn load(layout: SceneLayout, asset_dir: &Path) -> Result<Self> {
        let mut groups = Vec::with_capacity(layout.groups.len());
        for group in &layout.groups {
            let path = asset_dir.join(&group.mesh);
            let mut meshes = load_obj_file(&path).with_context(|| {
                format!("failed to load {} mesh from {}", group.name, path.display())
            })?;
            if let Some(alpha) = group.alpha {
                for mesh in &mut meshes {
                    mesh.material.alpha = alpha;
                }
            }
            debug!("{}: {} mesh(es) from {}", group.name, meshes.len(), path.display());
            groups.push(LoadedGroup {
                group: group.clone(),
                model: group.model_matrix(),
                meshes,
            });
        }

        let scene = Self {
            layout,
            groups,
            asset_dir: asset_dir.to_path_buf(),
        };
        info!(
            "loaded {} group(s), {} triangle(s) from {}",
            scene.groups.len(),
            scene.triangle_count(),
            asset_dir.display()
        );
        Ok(scene)
    }

    pub fn mesh_count(&self) -> usize {
        self.groups.iter().map(|group| group.meshes.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.groups.iter().map(LoadedGroup::triangle_count).sum()
    }

    /// Human readable description printed by `--summary-only`.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Loaded scene with {} groups ({} meshes, {} triangles)",
            self.groups.len(),
            self.mesh_count(),
            self.triangle_count()
        )];
        for loaded in &self.groups {
            let group = &loaded.group;
            let mut line = format!(
                " - {}: {} mesh(es), {} triangles [shading={}, cull={}, blend={}",
                group.name,
                loaded.meshes.len(),
                loaded.triangle_count(),
                group.shading,
                group.cull,
                group.blend
            );
            if let Some(alpha) = group.alpha {
                line.push_str(&format!(", alpha={alpha:.2}"));
            }
            if group.casts_shadow {
                line.push_str(", casts shadow");
            }
            line.push(']');
            lines.push(line);
        }
        lines.push(format!("Draw order: {}", self.layout.describe_plan()));
        let casters: Vec<&str> = self
            .layout
            .shadow_casters()
            .into_iter()
            .map(|index| self.layout.groups[index].name.as_str())
            .collect();
        lines.push(format!("Shadow casters: {}", casters.join(", ")));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
    const QUAD: &str = "v 0 0 0\nv 1 0 0\nv 1 0 1\nv 0 0 1\nf 1 2 3 4\n";

    fn write_jungle(dir: &Path) {
        for name in ["terrain", "trees", "shadows", "shrubs"] {
            fs::write(dir.join(format!("{name}.obj")), TRIANGLE).unwrap();
        }
        fs::write(dir.join("water.obj"), QUAD).unwrap();
    }

    #[test]
    fn loads_every_group_and_overrides_alpha() {
        let dir = tempfile::tempdir().unwrap();
        write_jungle(dir.path());

        let scene = LoadedScene::load(SceneLayout::jungle(), dir.path()).unwrap();
        assert_eq!(scene.groups.len(), 5);
        assert_eq!(scene.mesh_count(), 5);
        assert_eq!(scene.triangle_count(), 6);

        let water = scene.groups.iter().find(|g| g.group.name == "water").unwrap();
        assert!(water.meshes.iter().all(|m| (m.material.alpha - 0.23).abs() < 1e-6));
        let trees = scene.groups.iter().find(|g| g.group.name == "trees").unwrap();
        assert_eq!(trees.model, trees.group.model_matrix());
        assert_eq!(trees.meshes[0].material.alpha, 1.0);
    }

    #[test]
    fn summary_lists_groups_and_order() {
        let dir = tempfile::tempdir().unwrap();
        write_jungle(dir.path());
        let scene = LoadedScene::load(SceneLayout::jungle(), dir.path()).unwrap();
        let summary = scene.summary();
        assert_eq!(
            summary[0],
            "Loaded scene with 5 groups (5 meshes, 6 triangles)"
        );
        assert!(summary.iter().any(|line| line
            == " - water: 1 mesh(es), 2 triangles [shading=phong, cull=back, blend=alpha, alpha=0.23]"));
        assert!(summary
            .iter()
            .any(|line| line == "Draw order: trees -> terrain -> shadows -> shrubs -> water -> skybox"));
        assert!(summary
            .iter()
            .any(|line| line == "Shadow casters: trees, shadows"));
    }

    #[test]
    fn missing_mesh_names_the_group() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("terrain.obj"), TRIANGLE).unwrap();
        let err = LoadedScene::load(SceneLayout::jungle(), dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load trees mesh"));
    }
}
