//! Keyboard and mouse state, fed from winit window events.

use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Held and just-pressed keys, held mouse buttons, and cursor motion.
///
/// "Pressed" sets and the mouse delta cover a single frame and are reset by
/// [`begin_frame`](Self::begin_frame).
#[derive(Debug, Default)]
pub struct Input {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    buttons_down: HashSet<MouseButton>,
    cursor: Option<Vec2>,
    mouse_delta: Vec2,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears per-frame state. Call once before feeding a frame's events.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.mouse_delta = Vec2::ZERO;
    }

    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.press_key(key),
                        ElementState::Released => self.release_key(key),
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    self.buttons_down.insert(*button);
                }
                ElementState::Released => {
                    self.buttons_down.remove(button);
                }
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.move_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => self.cursor = None,
            WindowEvent::Focused(false) => {
                self.keys_down.clear();
                self.buttons_down.clear();
            }
            _ => {}
        }
    }

    pub(crate) fn press_key(&mut self, key: KeyCode) {
        // Key repeat re-sends Pressed while held.
        if self.keys_down.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    pub(crate) fn release_key(&mut self, key: KeyCode) {
        self.keys_down.remove(&key);
    }

    pub(crate) fn move_cursor(&mut self, position: Vec2) {
        if let Some(previous) = self.cursor {
            self.mouse_delta += position - previous;
        }
        self.cursor = Some(position);
    }

    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// True only on the frame the key went down.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn shift_down(&self) -> bool {
        self.key_down(KeyCode::ShiftLeft) || self.key_down(KeyCode::ShiftRight)
    }

    pub fn ctrl_down(&self) -> bool {
        self.key_down(KeyCode::ControlLeft) || self.key_down(KeyCode::ControlRight)
    }

    pub fn mouse_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    /// Cursor position in window pixels, if the cursor is inside the window.
    pub fn mouse_position(&self) -> Option<Vec2> {
        self.cursor
    }

    /// Cursor motion since the last [`begin_frame`](Self::begin_frame).
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressed_lasts_one_frame_and_ignores_repeat() {
        let mut input = Input::new();
        input.press_key(KeyCode::Tab);
        assert!(input.key_pressed(KeyCode::Tab));
        assert!(input.key_down(KeyCode::Tab));

        input.begin_frame();
        input.press_key(KeyCode::Tab);
        assert!(!input.key_pressed(KeyCode::Tab));
        assert!(input.key_down(KeyCode::Tab));

        input.release_key(KeyCode::Tab);
        assert!(!input.key_down(KeyCode::Tab));
    }

    #[test]
    fn first_cursor_sample_produces_no_delta() {
        let mut input = Input::new();
        input.move_cursor(Vec2::new(100.0, 100.0));
        assert_eq!(input.mouse_delta(), Vec2::ZERO);

        input.move_cursor(Vec2::new(110.0, 95.0));
        input.move_cursor(Vec2::new(112.0, 95.0));
        assert_eq!(input.mouse_delta(), Vec2::new(12.0, -5.0));

        input.begin_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
        assert_eq!(input.mouse_position(), Some(Vec2::new(112.0, 95.0)));
    }

    #[test]
    fn modifiers_accept_either_side() {
        let mut input = Input::new();
        input.press_key(KeyCode::ShiftRight);
        input.press_key(KeyCode::ControlLeft);
        assert!(input.shift_down());
        assert!(input.ctrl_down());
    }
}
