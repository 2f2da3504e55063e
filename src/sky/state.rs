//! Render-target bindings and the guard that restores them.
//!
//! wgpu has no ambient "currently bound render target", so the renderer and
//! the bake backends track it explicitly as a [`RenderState`]: which color
//! target and depth target subsequent draws go to, and the viewport. A bake
//! pass rebinds this state many times and must hand it back unchanged, which
//! is what [`StateScope`] guarantees.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a render-target view (color or depth).
///
/// Ids are process-unique, so a restored state can be compared against the
/// captured one without looking at the underlying GPU objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Pixel rectangle and depth range draws are mapped to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-depth viewport covering `width` x `height` from the origin.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    pub fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    pub(crate) fn apply(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_viewport(
            self.x,
            self.y,
            self.width,
            self.height,
            self.min_depth,
            self.max_depth,
        );
    }
}

/// The color target, depth target and viewport draws currently go to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderState {
    pub color: Option<TargetId>,
    pub depth: Option<TargetId>,
    pub viewport: Viewport,
}

impl RenderState {
    pub fn new(color: TargetId, depth: Option<TargetId>, viewport: Viewport) -> Self {
        Self {
            color: Some(color),
            depth,
            viewport,
        }
    }

    /// A single color target with no depth and a viewport matching its size.
    pub fn offscreen(color: TargetId, width: u32, height: u32) -> Self {
        Self {
            color: Some(color),
            depth: None,
            viewport: Viewport::new(width, height),
        }
    }
}

/// Anything that has a bindable [`RenderState`].
pub trait RenderStateHost {
    fn render_state(&self) -> RenderState;
    fn bind_render_state(&mut self, state: RenderState);
}

/// Captures a host's render state on creation and rebinds it on drop.
///
/// The guard dereferences to the host, so the pass body keeps using the host
/// through it. Because restoration lives in `Drop`, an early `?` return out
/// of the pass restores the state just like a normal exit.
pub struct StateScope<'a, H: RenderStateHost> {
    host: &'a mut H,
    saved: RenderState,
}

impl<'a, H: RenderStateHost> StateScope<'a, H> {
    pub fn new(host: &'a mut H) -> Self {
        let saved = host.render_state();
        Self { host, saved }
    }

    /// The state that will be restored.
    pub fn saved(&self) -> RenderState {
        self.saved
    }
}

impl<H: RenderStateHost> Deref for StateScope<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: RenderStateHost> DerefMut for StateScope<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: RenderStateHost> Drop for StateScope<'_, H> {
    fn drop(&mut self) {
        self.host.bind_render_state(self.saved);
    }
}
