use crate::camera::OrbitCamera;
use crate::light::LightSource;
use crate::scene::SceneLayout;

/// Everything the user can change while the scene is running.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub camera: OrbitCamera,
    pub light: LightSource,
    pub wireframe: bool,
    pub show_shadow_map: bool,
    pub running: bool,
}

impl ViewState {
    pub fn from_layout(layout: &SceneLayout, show_shadow_map: bool) -> Self {
        Self {
            camera: OrbitCamera::new(layout.camera_center),
            light: layout.light,
            wireframe: false,
            show_shadow_map,
            running: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn starts_from_the_layout() {
        let view = ViewState::from_layout(&SceneLayout::jungle(), true);
        assert_eq!(view.camera.center, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(view.light.position, Vec3::new(-5.0, 10.0, 5.0));
        assert!(view.running);
        assert!(!view.wireframe);
        assert!(view.show_shadow_map);
    }
}
