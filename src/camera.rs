//! A fly camera built on [`Transform`].
//!
//! The camera owns a root transform, so movement and look reuse the same
//! relative-move and pitch/yaw/roll rotation as scene objects. Matrices are
//! left-handed: +Z is forward, depth maps to `[0, 1]`.

use glam::{Mat4, Vec2, Vec3};
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::input::Input;
use crate::transform::Transform;

/// Radians of rotation per pixel of mouse drag at a look speed of 1.
const LOOK_RADIANS_PER_PIXEL: f32 = 0.005;
/// Pitch stays just inside straight up/down.
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.001;

/// Perspective lens parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lens {
    /// Vertical field of view in radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            fov: std::f32::consts::FRAC_PI_4,
            near: 0.01,
            far: 1000.0,
        }
    }
}

/// First-person camera driven by keyboard and mouse drag.
///
/// | Input             | Action              |
/// |-------------------|---------------------|
/// | W / S             | forward / back      |
/// | A / D             | strafe              |
/// | Space / X         | up / down (world Y) |
/// | Shift (held)      | 5x speed            |
/// | Ctrl (held)       | 0.1x speed          |
/// | Left mouse drag   | look                |
#[derive(Clone, Debug)]
pub struct Camera {
    transform: Transform,
    lens: Lens,
    aspect: f32,
    move_speed: f32,
    look_speed: f32,
    view: Mat4,
    projection: Mat4,
}

impl Camera {
    pub fn new(position: Vec3, aspect: f32) -> Self {
        let mut camera = Self {
            transform: Transform::from_position(position),
            lens: Lens::default(),
            aspect,
            move_speed: 3.0,
            look_speed: 1.0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.update_view();
        camera.update_projection(aspect);
        camera
    }

    pub fn with_speeds(mut self, move_speed: f32, look_speed: f32) -> Self {
        self.move_speed = move_speed;
        self.look_speed = look_speed;
        self
    }

    pub fn with_lens(mut self, lens: Lens) -> Self {
        self.lens = lens;
        self.update_projection(self.aspect);
        self
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Mutable access; call [`update_view`](Self::update_view) after editing.
    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position()
    }

    pub fn lens(&self) -> Lens {
        self.lens
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// View matrix without translation, for drawing at infinity.
    pub fn rotation_only_view(&self) -> Mat4 {
        Mat4::from_quat(self.transform.orientation().inverse())
    }

    /// Rebuilds the projection for a new aspect ratio.
    pub fn update_projection(&mut self, aspect: f32) {
        self.aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        self.projection =
            Mat4::perspective_lh(self.lens.fov, self.aspect, self.lens.near, self.lens.far);
    }

    /// Rebuilds the view from the transform.
    pub fn update_view(&mut self) {
        self.view = Mat4::look_to_lh(
            self.transform.position(),
            self.transform.forward(),
            self.transform.up(),
        );
    }

    /// Applies one frame of input.
    pub fn update(&mut self, input: &Input, dt: f32) {
        let mut speed = self.move_speed * dt;
        if input.shift_down() {
            speed *= 5.0;
        }
        if input.ctrl_down() {
            speed *= 0.1;
        }

        let mut local = Vec3::ZERO;
        if input.key_down(KeyCode::KeyW) {
            local.z += 1.0;
        }
        if input.key_down(KeyCode::KeyS) {
            local.z -= 1.0;
        }
        if input.key_down(KeyCode::KeyD) {
            local.x += 1.0;
        }
        if input.key_down(KeyCode::KeyA) {
            local.x -= 1.0;
        }
        if local != Vec3::ZERO {
            self.transform.move_relative(local * speed);
        }
        if input.key_down(KeyCode::Space) {
            self.transform.move_absolute(Vec3::Y * speed);
        }
        if input.key_down(KeyCode::KeyX) {
            self.transform.move_absolute(Vec3::NEG_Y * speed);
        }

        if input.mouse_down(MouseButton::Left) {
            self.look(input.mouse_delta());
        }

        self.update_view();
    }

    /// Turns by a mouse delta in pixels. Pitch is clamped short of vertical.
    pub fn look(&mut self, delta: Vec2) {
        let scale = LOOK_RADIANS_PER_PIXEL * self.look_speed;
        self.transform
            .rotate(Vec3::new(delta.y * scale, delta.x * scale, 0.0));

        let rotation = self.transform.pitch_yaw_roll();
        let clamped = rotation.x.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        if clamped != rotation.x {
            self.transform
                .set_rotation(Vec3::new(clamped, rotation.y, rotation.z));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fresh_camera_looks_down_positive_z() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, -10.0), 16.0 / 9.0);
        let origin = camera.view().transform_point3(Vec3::ZERO);
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.z, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn projection_maps_near_and_far_to_unit_depth() {
        let camera = Camera::new(Vec3::ZERO, 1.0);
        let lens = camera.lens();
        let near = camera.projection().project_point3(Vec3::new(0.0, 0.0, lens.near));
        let far = camera.projection().project_point3(Vec3::new(0.0, 0.0, lens.far));
        assert_relative_eq!(near.z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn look_clamps_pitch() {
        let mut camera = Camera::new(Vec3::ZERO, 1.0);
        camera.look(Vec2::new(0.0, 1.0e6));
        assert!(camera.transform().pitch_yaw_roll().x <= PITCH_LIMIT);
        camera.look(Vec2::new(0.0, -1.0e7));
        assert!(camera.transform().pitch_yaw_roll().x >= -PITCH_LIMIT);
    }

    #[test]
    fn rotation_only_view_ignores_position() {
        let mut camera = Camera::new(Vec3::new(5.0, -3.0, 2.0), 1.0);
        camera.look(Vec2::new(40.0, 10.0));
        camera.update_view();

        let direction = Vec3::new(0.3, 0.2, 1.0).normalize();
        let from_full = camera.view().transform_vector3(direction);
        let from_rotation = camera.rotation_only_view().transform_vector3(direction);
        assert_relative_eq!(from_full.x, from_rotation.x, epsilon = 1e-5);
        assert_relative_eq!(from_full.y, from_rotation.y, epsilon = 1e-5);
        assert_relative_eq!(from_full.z, from_rotation.z, epsilon = 1e-5);
    }

    #[test]
    fn update_projection_rejects_degenerate_aspect() {
        let mut camera = Camera::new(Vec3::ZERO, 2.0);
        camera.update_projection(0.0);
        assert!(camera.projection().is_finite());
    }

    #[test]
    fn held_keys_move_along_facing() {
        let mut input = Input::new();
        input.press_key(KeyCode::KeyW);
        let mut camera = Camera::new(Vec3::ZERO, 1.0);
        camera.update(&input, 1.0);
        assert_relative_eq!(camera.position().z, 3.0, epsilon = 1e-5);

        input.press_key(KeyCode::ShiftLeft);
        camera.update(&input, 1.0);
        assert_relative_eq!(camera.position().z, 18.0, epsilon = 1e-4);
    }
}
