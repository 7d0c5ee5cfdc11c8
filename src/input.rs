use std::collections::HashSet;

use glam::Vec2;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::view::ViewState;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
}

/// Non-printing keys the scene reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Escape,
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);
}

/// Direction of one mouse wheel notch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    Up,
    Down,
}

/// Translates keyboard and mouse events into changes of a [`ViewState`].
#[derive(Debug)]
pub struct Controller {
    buttons: HashSet<MouseButton>,
    ctrl: bool,
    last_cursor: Option<Vec2>,
    viewport: Vec2,
    wireframe_supported: bool,
}

impl Controller {
    pub const DEPTH_STEP: f32 = 0.1;
    pub const LIGHT_NUDGE: f32 = 0.1;
    pub const LIGHT_PULL: f32 = 0.9;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buttons: HashSet::new(),
            ctrl: false,
            last_cursor: None,
            viewport: viewport_size(width, height),
            wireframe_supported: true,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = viewport_size(width, height);
    }

    pub fn set_wireframe_supported(&mut self, supported: bool) {
        self.wireframe_supported = supported;
    }

    pub fn set_ctrl(&mut self, pressed: bool) {
        self.ctrl = pressed;
    }

    pub fn key_pressed(&mut self, key: KeyCode, view: &mut ViewState) {
        match key {
            KeyCode::Character('A') => view.camera.shift_depth(-Self::DEPTH_STEP),
            KeyCode::Character('D') => view.camera.shift_depth(Self::DEPTH_STEP),
            KeyCode::Character('Q') | KeyCode::Named(NamedKey::Escape) => view.running = false,
            KeyCode::Character('M') => view.show_shadow_map = !view.show_shadow_map,
            KeyCode::Digit(0) => self.toggle_wireframe(view),
            _ => {}
        }
    }

    fn toggle_wireframe(&self, view: &mut ViewState) {
        if view.wireframe {
            info!("--> Rendering using colour fill");
            view.wireframe = false;
        } else if self.wireframe_supported {
            info!("--> Rendering using colour wireframe");
            view.wireframe = true;
        } else {
            warn!("wireframe rendering is not supported by this GPU adapter");
        }
    }

    pub fn mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            self.buttons.insert(button);
        } else {
            self.buttons.remove(&button);
        }
        if !self.dragging() {
            self.last_cursor = None;
        }
    }

    pub fn scroll(&mut self, scroll: Scroll, view: &mut ViewState) {
        match (scroll, self.ctrl) {
            (Scroll::Up, true) => view.light.nudge_x(Self::LIGHT_NUDGE),
            (Scroll::Up, false) => view.camera.zoom_in(),
            (Scroll::Down, true) => view.light.scale_position(Self::LIGHT_PULL),
            (Scroll::Down, false) => view.camera.zoom_out(),
        }
    }

    /// Handles an absolute cursor position in physical pixels.
    ///
    /// The first position of a drag is only recorded; later ones move the
    /// camera by the delta relative to the viewport size.
    pub fn cursor_moved(&mut self, position: Vec2, view: &mut ViewState) {
        if !self.dragging() {
            self.last_cursor = None;
            return;
        }
        let Some(previous) = self.last_cursor.replace(position) else {
            return;
        };
        let delta = (position - previous) / self.viewport;
        if self.buttons.contains(&MouseButton::LEFT) {
            view.camera.pan(delta.x, delta.y);
        } else if self.buttons.contains(&MouseButton::RIGHT) {
            view.camera.orbit(delta.x, delta.y);
        }
    }

    fn dragging(&self) -> bool {
        self.buttons.contains(&MouseButton::LEFT) || self.buttons.contains(&MouseButton::RIGHT)
    }
}

fn viewport_size(width: u32, height: u32) -> Vec2 {
    Vec2::new(width.max(1) as f32, height.max(1) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneLayout;
    use glam::Vec3;

    fn view() -> ViewState {
        ViewState::from_layout(&SceneLayout::jungle(), true)
    }

    #[test]
    fn a_and_d_move_the_centre_in_depth() {
        let mut controller = Controller::new(1400, 1050);
        let mut view = view();
        controller.key_pressed(KeyCode::Character('A'), &mut view);
        controller.key_pressed(KeyCode::Character('A'), &mut view);
        controller.key_pressed(KeyCode::Character('D'), &mut view);
        assert!((view.camera.center.z + 0.1).abs() < 1e-6);
    }

    #[test]
    fn q_and_escape_stop_the_scene() {
        let mut controller = Controller::new(1400, 1050);
        let mut view = view();
        controller.key_pressed(KeyCode::Character('Q'), &mut view);
        assert!(!view.running);

        let mut view = self::view();
        controller.key_pressed(KeyCode::Named(NamedKey::Escape), &mut view);
        assert!(!view.running);
    }

    #[test]
    fn zero_toggles_wireframe() {
        let mut controller = Controller::new(1400, 1050);
        let mut view = view();
        controller.key_pressed(KeyCode::Digit(0), &mut view);
        assert!(view.wireframe);
        controller.key_pressed(KeyCode::Digit(0), &mut view);
        assert!(!view.wireframe);
    }

    #[test]
    fn wireframe_stays_off_when_unsupported() {
        let mut controller = Controller::new(1400, 1050);
        controller.set_wireframe_supported(false);
        let mut view = view();
        controller.key_pressed(KeyCode::Digit(0), &mut view);
        assert!(!view.wireframe);
    }

    #[test]
    fn m_toggles_the_shadow_preview() {
        let mut controller = Controller::new(1400, 1050);
        let mut view = view();
        controller.key_pressed(KeyCode::Character('M'), &mut view);
        assert!(!view.show_shadow_map);
    }

    #[test]
    fn wheel_zooms_without_ctrl() {
        let mut controller = Controller::new(1400, 1050);
        let mut view = view();
        controller.scroll(Scroll::Down, &mut view);
        assert_eq!(view.camera.distance, 6.0);
        controller.scroll(Scroll::Up, &mut view);
        controller.scroll(Scroll::Up, &mut view);
        assert_eq!(view.camera.distance, 4.0);
    }

    #[test]
    fn wheel_moves_the_light_with_ctrl() {
        let mut controller = Controller::new(1400, 1050);
        let mut view = view();
        controller.set_ctrl(true);
        controller.scroll(Scroll::Up, &mut view);
        assert!((view.light.position.x + 4.9).abs() < 1e-5);
        controller.scroll(Scroll::Down, &mut view);
        assert!(view
            .light
            .position
            .abs_diff_eq(Vec3::new(-4.41, 9.0, 4.5), 1e-4));
        assert_eq!(view.camera.distance, 5.0);
    }

    #[test]
    fn left_drag_pans_after_the_first_motion() {
        let mut controller = Controller::new(100, 50);
        let mut view = view();
        controller.mouse_button(MouseButton::LEFT, true);
        controller.cursor_moved(Vec2::new(10.0, 10.0), &mut view);
        assert_eq!(view.camera.center, Vec3::new(0.0, 3.0, 0.0));
        controller.cursor_moved(Vec2::new(20.0, 15.0), &mut view);
        assert!(view
            .camera
            .center
            .abs_diff_eq(Vec3::new(-0.1, 2.9, 0.0), 1e-6));
    }

    #[test]
    fn right_drag_orbits() {
        let mut controller = Controller::new(100, 100);
        let mut view = view();
        controller.mouse_button(MouseButton::RIGHT, true);
        controller.cursor_moved(Vec2::new(0.0, 0.0), &mut view);
        controller.cursor_moved(Vec2::new(50.0, -25.0), &mut view);
        assert!((view.camera.phi + 0.5).abs() < 1e-6);
        assert!((view.camera.psi - 0.25).abs() < 1e-6);
    }

    #[test]
    fn motion_without_buttons_does_nothing() {
        let mut controller = Controller::new(100, 100);
        let mut view = view();
        controller.cursor_moved(Vec2::new(0.0, 0.0), &mut view);
        controller.cursor_moved(Vec2::new(50.0, 50.0), &mut view);
        assert_eq!(view.camera, self::view().camera);
    }

    #[test]
    fn releasing_the_button_ends_the_drag() {
        let mut controller = Controller::new(100, 100);
        let mut view = view();
        controller.mouse_button(MouseButton::LEFT, true);
        controller.cursor_moved(Vec2::new(0.0, 0.0), &mut view);
        controller.mouse_button(MouseButton::LEFT, false);
        controller.mouse_button(MouseButton::LEFT, true);
        controller.cursor_moved(Vec2::new(90.0, 90.0), &mut view);
        assert_eq!(view.camera.center, Vec3::new(0.0, 3.0, 0.0));
    }
}
