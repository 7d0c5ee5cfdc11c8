use std::f32::consts::FRAC_PI_2;
use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::light::LightSource;
use crate::transform::{compose, TransformStep};

/// Scale applied to the terrain and everything placed on it.
pub const TERRAIN_SCALE: f32 = 0.065;
/// Vertical offset that sinks the terrain below the camera centre.
pub const VERTICAL_TRANSLATION: f32 = -7.0;
/// Opacity of the water plane.
pub const WATER_ALPHA: f32 = 0.23;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shading {
    Phong,
    /// Phong shading darkened where the shadow map says the light is blocked.
    ShadowMapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cull {
    Back,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Blend {
    Opaque,
    /// `src_alpha, one_minus_src_alpha` blending.
    Alpha,
}

/// All meshes of one OBJ file, drawn with the same transform and state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelGroup {
    pub name: String,
    /// OBJ file, relative to the asset directory.
    pub mesh: PathBuf,
    pub transform: Vec<TransformStep>,
    pub shading: Shading,
    pub cull: Cull,
    pub blend: Blend,
    pub casts_shadow: bool,
    /// Replaces the alpha of every material in the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
}

impl ModelGroup {
    pub fn new(name: impl Into<String>, mesh: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            mesh: mesh.into(),
            transform: Vec::new(),
            shading: Shading::Phong,
            cull: Cull::Back,
            blend: Blend::Opaque,
            casts_shadow: false,
            alpha: None,
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        compose(&self.transform)
    }

    fn with_transform(mut self, transform: Vec<TransformStep>) -> Self {
        self.transform = transform;
        self
    }
}

/// One entry of the per-frame draw sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStep {
    /// Index into [`SceneLayout::groups`].
    Group(usize),
    Skybox,
}

/// Fixed description of what the scene contains and where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneLayout {
    pub groups: Vec<ModelGroup>,
    pub light: LightSource,
    pub camera_center: Vec3,
    pub skybox: bool,
}

impl SceneLayout {
    /// The jungle scene: terrain with trees, shrubs and shadow-casting
    /// props, a water plane and a skybox.
    pub fn jungle() -> Self {
        let ground = || {
            vec![
                TransformStep::Translate(Vec3::new(0.0, VERTICAL_TRANSLATION, 0.0)),
                TransformStep::Scale(Vec3::splat(TERRAIN_SCALE)),
            ]
        };

        let mut trees_transform = ground();
        trees_transform.push(TransformStep::RotateZ(-FRAC_PI_2));

        let water = ModelGroup {
            blend: Blend::Alpha,
            alpha: Some(WATER_ALPHA),
            ..ModelGroup::new("water", "water.obj")
        }
        .with_transform(vec![
            TransformStep::Translate(Vec3::new(0.0, -5.6, 0.0)),
            TransformStep::Scale(Vec3::new(55.0, 1.0, 55.0)),
        ]);
        let terrain = ModelGroup {
            shading: Shading::ShadowMapped,
            ..ModelGroup::new("terrain", "terrain.obj")
        }
        .with_transform(ground());
        // Leaves are single sided, so the trees are drawn without culling.
        let trees = ModelGroup {
            cull: Cull::None,
            casts_shadow: true,
            ..ModelGroup::new("trees", "trees.obj")
        }
        .with_transform(trees_transform);
        let shadows = ModelGroup {
            casts_shadow: true,
            ..ModelGroup::new("shadows", "shadows.obj")
        }
        .with_transform(ground());
        let shrubs = ModelGroup::new("shrubs", "shrubs.obj").with_transform(ground());

        Self {
            groups: vec![trees, terrain, shadows, shrubs, water],
            light: LightSource::new(Vec3::new(-5.0, 10.0, 5.0)),
            camera_center: Vec3::new(0.0, 3.0, 0.0),
            skybox: true,
        }
    }

    /// Parses a layout document.
    ///
    /// ```xml
    /// <scene skybox="true">
    ///   <light><position>-5 10 5</position></light>
    ///   <camera><center>0 3 0</center></camera>
    ///   <group>
    ///     <name>trees</name>
    ///     <mesh>trees.obj</mesh>
    ///     <transform>
    ///       <translate>0 -7 0</translate>
    ///       <scale>0.065 0.065 0.065</scale>
    ///       <rotate axis="z">-90</rotate>
    ///     </transform>
    ///     <cull>none</cull>
    ///     <shadow>true</shadow>
    ///   </group>
    /// </scene>
    /// ```
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid layout XML")?;
        let root = document.root_element();
        if !root.has_tag_name("scene") {
            return Err(anyhow!("layout root must be <scene>"));
        }

        let mut groups = Vec::new();
        for node in root.children().filter(|n| n.has_tag_name("group")) {
            let name = required_text(&node, "name")?;
            let group = parse_group(&node, name.clone())
                .with_context(|| format!("invalid group `{name}`"))?;
            groups.push(group);
        }
        if groups.is_empty() {
            return Err(anyhow!("layout does not define any <group>"));
        }

        let mut light = LightSource::default();
        if let Some(node) = child(&root, "light") {
            light.position = parse_vec3(optional_text(&node, "position"), light.position)?;
            light.ambient = parse_vec3(optional_text(&node, "ambient"), light.ambient)?;
            light.diffuse = parse_vec3(optional_text(&node, "diffuse"), light.diffuse)?;
            light.specular = parse_vec3(optional_text(&node, "specular"), light.specular)?;
        }

        let camera_center = match child(&root, "camera") {
            Some(node) => parse_vec3(optional_text(&node, "center"), Vec3::ZERO)?,
            None => Vec3::ZERO,
        };

        let skybox = match root.attribute("skybox") {
            Some(value) => parse_bool(value)?,
            None => true,
        };

        Ok(Self {
            groups,
            light,
            camera_center,
            skybox,
        })
    }

    /// Order in which the main pass draws the scene.
    ///
    /// Opaque groups come first in layout order, blended groups after them so
    /// that they composite over finished geometry, and the skybox last so it
    /// only fills pixels nothing else covered.
    pub fn frame_plan(&self) -> Vec<DrawStep> {
        let opaque = self
            .groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.blend == Blend::Opaque);
        let blended = self
            .groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.blend == Blend::Alpha);
        let mut plan: Vec<DrawStep> = opaque
            .chain(blended)
            .map(|(index, _)| DrawStep::Group(index))
            .collect();
        if self.skybox {
            plan.push(DrawStep::Skybox);
        }
        plan
    }

    /// Groups rendered into the shadow map.
    pub fn shadow_casters(&self) -> Vec<usize> {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.casts_shadow)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn describe_plan(&self) -> String {
        self.frame_plan()
            .iter()
            .map(|step| match step {
                DrawStep::Group(index) => self.groups[*index].name.as_str(),
                DrawStep::Skybox => "skybox",
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl fmt::Display for Shading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Phong => "phong",
            Self::ShadowMapped => "shadow-mapped",
        })
    }
}

impl fmt::Display for Cull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Back => "back",
            Self::None => "none",
        })
    }
}

impl fmt::Display for Blend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Opaque => "opaque",
            Self::Alpha => "alpha",
        })
    }
}

fn parse_group(node: &Node<'_, '_>, name: String) -> Result<ModelGroup> {
    let mesh = required_text(node, "mesh")?;
    let mut group = ModelGroup::new(name, mesh);

    if let Some(transform) = child(node, "transform") {
        for step in transform.children().filter(Node::is_element) {
            group.transform.push(parse_step(&step)?);
        }
    }
    if let Some(shading) = optional_text(node, "shading") {
        group.shading = match shading.as_str() {
            "phong" => Shading::Phong,
            "shadow" | "shadow-mapped" => Shading::ShadowMapped,
            other => return Err(anyhow!("unknown shading `{other}`")),
        };
    }
    if let Some(cull) = optional_text(node, "cull") {
        group.cull = match cull.as_str() {
            "back" => Cull::Back,
            "none" => Cull::None,
            other => return Err(anyhow!("unknown cull mode `{other}`")),
        };
    }
    if let Some(blend) = optional_text(node, "blend") {
        group.blend = match blend.as_str() {
            "opaque" => Blend::Opaque,
            "alpha" => Blend::Alpha,
            other => return Err(anyhow!("unknown blend mode `{other}`")),
        };
    }
    if let Some(shadow) = optional_text(node, "shadow") {
        group.casts_shadow = parse_bool(&shadow)?;
    }
    if let Some(alpha) = optional_text(node, "alpha") {
        let alpha = alpha
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse alpha: {err}"))?;
        group.alpha = Some(alpha.clamp(0.0, 1.0));
    }
    Ok(group)
}

fn parse_step(node: &Node<'_, '_>) -> Result<TransformStep> {
    let text = node.text().map(str::trim).unwrap_or_default();
    match node.tag_name().name() {
        "translate" => Ok(TransformStep::Translate(parse_components(text)?)),
        "scale" => {
            let factors = match text.parse::<f32>() {
                Ok(uniform) => Vec3::splat(uniform),
                Err(_) => parse_components(text)?,
            };
            Ok(TransformStep::Scale(factors))
        }
        "rotate" => {
            let degrees = text
                .parse::<f32>()
                .map_err(|err| anyhow!("failed to parse rotation angle: {err}"))?;
            let angle = degrees.to_radians();
            match node.attribute("axis").unwrap_or("z") {
                "x" => Ok(TransformStep::RotateX(angle)),
                "y" => Ok(TransformStep::RotateY(angle)),
                "z" => Ok(TransformStep::RotateZ(angle)),
                other => Err(anyhow!("unknown rotation axis `{other}`")),
            }
        }
        other => Err(anyhow!("unknown transform step <{other}>")),
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => parse_components(&value),
        None => Ok(default),
    }
}

fn parse_components(value: &str) -> Result<Vec3> {
    let numbers = value
        .split_whitespace()
        .map(str::parse::<f32>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow!("failed to parse vector `{value}`: {err}"))?;
    match numbers.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(anyhow!("vector `{value}` must have 3 components")),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(anyhow!("expected a boolean, found `{other}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <scene skybox="false">
        <light>
            <position>1 8 2</position>
            <ambient>0.1 0.1 0.1</ambient>
        </light>
        <camera><center>0 1 0</center></camera>
        <group>
            <name>pond</name>
            <mesh>pond.obj</mesh>
            <blend>alpha</blend>
            <alpha>0.5</alpha>
        </group>
        <group>
            <name>palms</name>
            <mesh>palms.obj</mesh>
            <transform>
                <translate>0 -7 0</translate>
                <scale>0.065</scale>
                <rotate axis="z">-90</rotate>
            </transform>
            <cull>none</cull>
            <shadow>true</shadow>
        </group>
        <group>
            <name>ground</name>
            <mesh>ground.obj</mesh>
            <shading>shadow</shading>
        </group>
    </scene>
    "#;

    fn names(layout: &SceneLayout, plan: &[DrawStep]) -> Vec<String> {
        plan.iter()
            .map(|step| match step {
                DrawStep::Group(i) => layout.groups[*i].name.clone(),
                DrawStep::Skybox => "skybox".to_string(),
            })
            .collect()
    }

    #[test]
    fn jungle_draws_opaque_groups_before_water_and_sky() {
        let layout = SceneLayout::jungle();
        let plan = layout.frame_plan();
        assert_eq!(
            names(&layout, &plan),
            ["trees", "terrain", "shadows", "shrubs", "water", "skybox"]
        );
        assert_eq!(
            layout.describe_plan(),
            "trees -> terrain -> shadows -> shrubs -> water -> skybox"
        );
    }

    #[test]
    fn jungle_state_flags() {
        let layout = SceneLayout::jungle();
        let group = |name: &str| layout.groups.iter().find(|g| g.name == name).unwrap();
        assert_eq!(group("trees").cull, Cull::None);
        assert_eq!(group("terrain").cull, Cull::Back);
        assert_eq!(group("terrain").shading, Shading::ShadowMapped);
        assert_eq!(group("water").blend, Blend::Alpha);
        assert_eq!(group("water").alpha, Some(WATER_ALPHA));
        assert_eq!(group("shrubs").shading, Shading::Phong);
        assert_eq!(layout.light.position, Vec3::new(-5.0, 10.0, 5.0));
        assert_eq!(layout.light.ambient, Vec3::splat(0.2));
    }

    #[test]
    fn jungle_shadow_casters_are_props_and_trees() {
        let layout = SceneLayout::jungle();
        let casters: Vec<&str> = layout
            .shadow_casters()
            .into_iter()
            .map(|i| layout.groups[i].name.as_str())
            .collect();
        assert_eq!(casters, ["trees", "shadows"]);
    }

    #[test]
    fn jungle_transforms() {
        let layout = SceneLayout::jungle();
        let group = |name: &str| layout.groups.iter().find(|g| g.name == name).unwrap();

        let water = group("water").model_matrix();
        let corner = water.transform_point3(Vec3::new(0.5, 0.0, 0.5));
        assert!(corner.abs_diff_eq(Vec3::new(27.5, -5.6, 27.5), 1e-4));

        let terrain = group("terrain").model_matrix();
        let point = terrain.transform_point3(Vec3::new(100.0, 0.0, 0.0));
        assert!(point.abs_diff_eq(Vec3::new(6.5, -7.0, 0.0), 1e-4));

        // Trees are rotated a quarter turn about Z before scaling.
        let trees = group("trees").model_matrix();
        let up = trees.transform_point3(Vec3::new(0.0, 100.0, 0.0));
        assert!(up.abs_diff_eq(Vec3::new(6.5, -7.0, 0.0), 1e-4));
    }

    #[test]
    fn blended_groups_move_after_opaque_ones() {
        let layout = SceneLayout::from_xml(SAMPLE).unwrap();
        let plan = layout.frame_plan();
        assert_eq!(names(&layout, &plan), ["palms", "ground", "pond"]);
    }

    #[test]
    fn parses_xml_layout() {
        let layout = SceneLayout::from_xml(SAMPLE).unwrap();
        assert_eq!(layout.groups.len(), 3);
        assert!(!layout.skybox);
        assert_eq!(layout.camera_center, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(layout.light.position, Vec3::new(1.0, 8.0, 2.0));
        assert_eq!(layout.light.ambient, Vec3::splat(0.1));
        assert_eq!(layout.light.diffuse, LightSource::default().diffuse);

        let palms = &layout.groups[1];
        assert_eq!(palms.mesh, PathBuf::from("palms.obj"));
        assert_eq!(palms.cull, Cull::None);
        assert!(palms.casts_shadow);
        let jungle_trees = &SceneLayout::jungle().groups[0];
        assert!(palms
            .model_matrix()
            .abs_diff_eq(jungle_trees.model_matrix(), 1e-5));

        assert_eq!(layout.groups[0].alpha, Some(0.5));
        assert_eq!(layout.groups[2].shading, Shading::ShadowMapped);
        assert_eq!(layout.shadow_casters(), vec![1]);
    }

    #[test]
    fn missing_mesh_is_an_error() {
        let bad = "<scene><group><name>x</name></group></scene>";
        let err = SceneLayout::from_xml(bad).unwrap_err();
        assert!(format!("{err:#}").contains("<mesh> tag is missing"));
    }

    #[test]
    fn rejects_unknown_states_and_empty_layouts() {
        assert!(SceneLayout::from_xml("<scene></scene>").is_err());
        assert!(SceneLayout::from_xml("<world/>").is_err());
        let bad_cull =
            "<scene><group><name>x</name><mesh>x.obj</mesh><cull>front</cull></group></scene>";
        assert!(SceneLayout::from_xml(bad_cull).is_err());
        let bad_step = "<scene><group><name>x</name><mesh>x.obj</mesh>\
                        <transform><shear>1</shear></transform></group></scene>";
        assert!(SceneLayout::from_xml(bad_step).is_err());
    }
}
