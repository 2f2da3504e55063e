//! Local spatial state for scene objects.
//!
//! A [`Transform`] stores position, pitch/yaw/roll and scale relative to its
//! parent, plus the cached world matrix the [`SceneGraph`](crate::SceneGraph)
//! computes from it. Mutating any local field only marks this transform dirty;
//! the scene graph recomputes the cache the next time someone reads it.
//!
//! # Conventions
//!
//! Rotation is stored as `(pitch, yaw, roll)` in radians and applied roll
//! first, then pitch, then yaw. The local matrix is `T * R * S` in glam's
//! column-vector form, which is the row-vector product `S * R * T`: scale,
//! then rotate, then translate, then the parent's world matrix on top.
//!
//! ```
//! use vesper::{Transform, Vec3};
//!
//! let mut t = Transform::new();
//! t.set_position(Vec3::new(1.0, 2.0, 3.0));
//! t.scale_by(Vec3::splat(2.0));
//! assert_eq!(t.scale(), Vec3::splat(2.0));
//! ```

use glam::{EulerRot, Mat4, Quat, Vec3};
use hecs::Entity;

/// Position, orientation and scale of one scene object, with a cached world matrix.
///
/// Parent and child links are non-owning [`Entity`] handles into the scene
/// graph's world. They are maintained by [`SceneGraph`](crate::SceneGraph);
/// a `Transform` on its own (a camera, say) behaves as a root.
#[derive(Clone, Debug)]
pub struct Transform {
    position: Vec3,
    pitch_yaw_roll: Vec3,
    scale: Vec3,

    pub(crate) world: Mat4,
    pub(crate) world_inverse_transpose: Mat4,
    pub(crate) dirty: bool,
    pub(crate) revision: u64,

    pub(crate) parent: Option<Entity>,
    pub(crate) children: Vec<Entity>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            pitch_yaw_roll: Vec3::ZERO,
            scale: Vec3::ONE,
            world: Mat4::IDENTITY,
            world_inverse_transpose: Mat4::IDENTITY,
            dirty: true,
            revision: 0,
            parent: None,
            children: Vec::new(),
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transform at `position` with identity rotation and unit scale.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Builder form of [`set_scale`](Self::set_scale).
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.set_scale(scale);
        self
    }

    /// Builder form of [`set_rotation`](Self::set_rotation).
    pub fn with_rotation(mut self, pitch_yaw_roll: Vec3) -> Self {
        self.set_rotation(pitch_yaw_roll);
        self
    }

    /// Translates in parent space, ignoring this transform's orientation.
    pub fn move_absolute(&mut self, delta: Vec3) {
        self.position += delta;
        self.dirty = true;
    }

    /// Translates along this transform's own axes.
    ///
    /// Moving by `Vec3::Z` goes one unit "forward" for whatever direction the
    /// transform currently faces.
    pub fn move_relative(&mut self, delta: Vec3) {
        self.position += self.orientation() * delta;
        self.dirty = true;
    }

    /// Adds `(pitch, yaw, roll)` deltas to the current rotation.
    pub fn rotate(&mut self, delta: Vec3) {
        self.pitch_yaw_roll += delta;
        self.dirty = true;
    }

    /// Multiplies the current scale component-wise.
    pub fn scale_by(&mut self, factors: Vec3) {
        self.scale *= factors;
        self.dirty = true;
    }

    // Setters skip the dirty mark when nothing changes: UI code calls them
    // every frame with the value it just read back.

    pub fn set_position(&mut self, position: Vec3) {
        if self.position != position {
            self.position = position;
            self.dirty = true;
        }
    }

    pub fn set_rotation(&mut self, pitch_yaw_roll: Vec3) {
        if self.pitch_yaw_roll != pitch_yaw_roll {
            self.pitch_yaw_roll = pitch_yaw_roll;
            self.dirty = true;
        }
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        if self.scale != scale {
            self.scale = scale;
            self.dirty = true;
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn pitch_yaw_roll(&self) -> Vec3 {
        self.pitch_yaw_roll
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Rotation as a quaternion: roll about Z, then pitch about X, then yaw about Y.
    pub fn orientation(&self) -> Quat {
        let [pitch, yaw, roll] = self.pitch_yaw_roll.to_array();
        Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll)
    }

    /// Unit vector this transform faces (its local +Z axis).
    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.orientation() * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.orientation() * Vec3::Y
    }

    /// Local matrix from the current fields, ignoring any parent.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation(), self.position)
    }

    /// Whether the cached world matrix is stale.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of times the world matrix has been recomputed.
    ///
    /// Two reads with the same revision in between did not recompute.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Parent handle, if attached. Use the scene graph to change it.
    pub fn parent(&self) -> Option<Entity> {
        self.parent
    }

    /// Child handles in attachment order.
    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    /// Recomputes the cache from the local fields and an optional parent world matrix.
    pub(crate) fn recompute(&mut self, parent_world: Option<Mat4>) -> Mat4 {
        let local = self.local_matrix();
        self.world = match parent_world {
            Some(parent) => parent * local,
            None => local,
        };
        // A zero scale component collapses the matrix; keep the last usable normal matrix.
        if self.world.determinant() != 0.0 {
            let inverse_transpose = self.world.inverse().transpose();
            if inverse_transpose.is_finite() {
                self.world_inverse_transpose = inverse_transpose;
            }
        }
        self.dirty = false;
        self.revision += 1;
        self.world
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn new_transform_is_identity_and_dirty() {
        let t = Transform::new();
        assert_eq!(t.local_matrix(), Mat4::IDENTITY);
        assert!(t.is_dirty());
        assert_eq!(t.revision(), 0);
    }

    #[test]
    fn local_matrix_scales_then_rotates_then_translates() {
        let t = Transform::from_position(Vec3::new(10.0, 0.0, 0.0))
            .with_scale(Vec3::splat(2.0))
            .with_rotation(Vec3::new(0.0, FRAC_PI_2, 0.0));

        // +X scaled to 2, yawed a quarter turn onto -Z, then offset by +10 X.
        let p = t.local_matrix().transform_point3(Vec3::X);
        assert_vec3_eq(p, Vec3::new(10.0, 0.0, -2.0));
    }

    #[test]
    fn move_relative_follows_orientation() {
        let mut t = Transform::new().with_rotation(Vec3::new(0.0, FRAC_PI_2, 0.0));
        t.move_relative(Vec3::Z);
        assert_vec3_eq(t.position(), Vec3::X);

        t.move_absolute(Vec3::Z);
        assert_vec3_eq(t.position(), Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn pitch_tilts_forward_downward() {
        let t = Transform::new().with_rotation(Vec3::new(FRAC_PI_2, 0.0, 0.0));
        assert_vec3_eq(t.forward(), -Vec3::Y);
    }

    #[test]
    fn scale_by_multiplies() {
        let mut t = Transform::new().with_scale(Vec3::new(2.0, 3.0, 4.0));
        t.scale_by(Vec3::new(0.5, 2.0, 1.0));
        assert_eq!(t.scale(), Vec3::new(1.0, 6.0, 4.0));
    }

    #[test]
    fn unchanged_setters_keep_cache_clean() {
        let mut t = Transform::from_position(Vec3::ONE);
        t.recompute(None);
        assert!(!t.is_dirty());

        t.set_position(Vec3::ONE);
        t.set_rotation(Vec3::ZERO);
        t.set_scale(Vec3::ONE);
        assert!(!t.is_dirty());

        t.set_position(Vec3::ZERO);
        assert!(t.is_dirty());
    }

    #[test]
    fn recompute_stores_inverse_transpose() {
        let mut t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_scale(Vec3::new(1.0, 2.0, 4.0));
        let world = t.recompute(None);
        let expected = world.inverse().transpose();
        assert!(t.world_inverse_transpose.abs_diff_eq(expected, 1e-6));
        assert_eq!(t.revision(), 1);
    }

    #[test]
    fn zero_scale_keeps_last_finite_inverse_transpose() {
        let mut t = Transform::new().with_scale(Vec3::new(1.0, 0.0, 1.0));
        t.recompute(None);
        assert!(t.world_inverse_transpose.is_finite());
        assert_eq!(t.world_inverse_transpose, Mat4::IDENTITY);

        t.set_scale(Vec3::splat(2.0));
        t.recompute(None);
        let scaled = t.world_inverse_transpose;
        assert!(scaled.abs_diff_eq(Mat4::from_scale(Vec3::splat(0.5)), 1e-6));

        t.set_scale(Vec3::ZERO);
        t.recompute(None);
        assert_eq!(t.world_inverse_transpose, scaled);
    }
}
