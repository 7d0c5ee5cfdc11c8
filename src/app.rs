use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use glam::Vec2;
use log::{info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

use crate::assets::LoadedScene;
use crate::config::RenderSettings;
use crate::error::WindowInitError;
use crate::input::{Controller, KeyCode, MouseButton, NamedKey, Scroll};
use crate::render::{Renderer, SkyboxImages};
use crate::view::ViewState;

pub const WINDOW_TITLE: &str = "Jungle Scene";

/// Opens a window and renders `scene` until the user quits.
///
/// Failing to create the event loop or the window yields a
/// [`WindowInitError`] so callers can fall back to headless output.
pub fn run_interactive(settings: RenderSettings, scene: LoadedScene) -> Result<()> {
    let sky = if scene.layout.skybox {
        Some(SkyboxImages::from_settings(&settings)?)
    } else {
        None
    };

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = SceneApp::new(settings, scene, sky);
    event_loop.run_app(&mut app)?;
    app.finish()
}

/// Window, renderer and interaction state of a running scene.
pub struct SceneApp {
    settings: RenderSettings,
    scene: LoadedScene,
    sky: Option<SkyboxImages>,
    view: ViewState,
    controller: Controller,
    renderer: Option<Renderer>,
    last_error: Option<anyhow::Error>,
}

impl SceneApp {
    pub fn new(settings: RenderSettings, scene: LoadedScene, sky: Option<SkyboxImages>) -> Self {
        let view = ViewState::from_layout(&scene.layout, settings.show_shadow_map);
        let controller = Controller::new(settings.width, settings.height);
        Self {
            settings,
            scene,
            sky,
            view,
            controller,
            renderer: None,
            last_error: None,
        }
    }

    /// Returns the error that stopped the event loop, if any.
    pub fn finish(self) -> Result<()> {
        match self.last_error {
            Some(err) => Err(err),
            None => {
                info!("scene closed");
                Ok(())
            }
        }
    }

    fn init_renderer(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(
                self.settings.width as f64,
                self.settings.height as f64,
            ));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let renderer = block_on(Renderer::new(
            window,
            &self.settings,
            &self.scene,
            self.sky.as_ref(),
        ))?;
        let size = renderer.window().inner_size();
        self.controller.set_viewport(size.width, size.height);
        self.controller
            .set_wireframe_supported(renderer.wireframe_supported());
        info!(
            "window {}x{}, shadow map {}px",
            size.width,
            size.height,
            renderer.shadow_map_size()
        );
        self.renderer = Some(renderer);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.last_error = Some(err);
        event_loop.exit();
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        if let Some(key) = map_key(code) {
            self.controller.key_pressed(key, &mut self.view);
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        match renderer.render(&self.view) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = renderer.window().inner_size();
                renderer.resize(size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, anyhow!("GPU is out of memory"));
            }
            Err(wgpu::SurfaceError::Timeout) => {
                info!("Surface timeout; retrying next frame");
            }
            #[allow(unreachable_patterns)]
            Err(err) => warn!("surface error: {err}"),
        }
    }
}

impl ApplicationHandler for SceneApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        if let Err(err) = self.init_renderer(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self
            .renderer
            .as_ref()
            .map_or(true, |renderer| renderer.window_id() != window_id)
        {
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.view.running = false,
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size);
                }
                self.controller.set_viewport(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),
            WindowEvent::ModifiersChanged(modifiers) => {
                self.controller.set_ctrl(modifiers.state().control_key());
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(button) = map_mouse_button(button) {
                    self.controller
                        .mouse_button(button, state == ElementState::Pressed);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                self.controller.cursor_moved(position, &mut self.view);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(scroll) = scroll_direction(delta) {
                    self.controller.scroll(scroll, &mut self.view);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }

        if !self.view.running {
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if !self.view.running {
            event_loop.exit();
            return;
        }
        if let Some(renderer) = &self.renderer {
            renderer.window().request_redraw();
        }
    }
}

fn map_key(code: winit::keyboard::KeyCode) -> Option<KeyCode> {
    use winit::keyboard::KeyCode as Key;
    let key = match code {
        Key::KeyA => KeyCode::Character('A'),
        Key::KeyD => KeyCode::Character('D'),
        Key::KeyQ => KeyCode::Character('Q'),
        Key::KeyM => KeyCode::Character('M'),
        Key::Digit0 | Key::Numpad0 => KeyCode::Digit(0),
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        _ => return None,
    };
    Some(key)
}

fn map_mouse_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::LEFT),
        winit::event::MouseButton::Right => Some(MouseButton::RIGHT),
        winit::event::MouseButton::Middle => Some(MouseButton::MIDDLE),
        _ => None,
    }
}

/// One wheel event counts as a single notch regardless of its magnitude.
fn scroll_direction(delta: MouseScrollDelta) -> Option<Scroll> {
    let y = match delta {
        MouseScrollDelta::LineDelta(_, y) => y as f64,
        MouseScrollDelta::PixelDelta(position) => position.y,
    };
    if y > 0.0 {
        Some(Scroll::Up)
    } else if y < 0.0 {
        Some(Scroll::Down)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn maps_scene_keys() {
        use winit::keyboard::KeyCode as Key;
        assert_eq!(map_key(Key::KeyA), Some(KeyCode::Character('A')));
        assert_eq!(map_key(Key::KeyQ), Some(KeyCode::Character('Q')));
        assert_eq!(map_key(Key::Numpad0), Some(KeyCode::Digit(0)));
        assert_eq!(
            map_key(Key::Escape),
            Some(KeyCode::Named(NamedKey::Escape))
        );
        assert_eq!(map_key(Key::KeyW), None);
    }

    #[test]
    fn maps_mouse_buttons() {
        assert_eq!(
            map_mouse_button(winit::event::MouseButton::Right),
            Some(MouseButton::RIGHT)
        );
        assert_eq!(map_mouse_button(winit::event::MouseButton::Back), None);
    }

    #[test]
    fn wheel_deltas_become_single_notches() {
        assert_eq!(
            scroll_direction(MouseScrollDelta::LineDelta(0.0, 3.0)),
            Some(Scroll::Up)
        );
        assert_eq!(
            scroll_direction(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -12.5))),
            Some(Scroll::Down)
        );
        assert_eq!(
            scroll_direction(MouseScrollDelta::LineDelta(1.0, 0.0)),
            None
        );
    }
}
