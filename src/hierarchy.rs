//! Parent/child links and lazy world-matrix evaluation over a `hecs` world.
//!
//! [`SceneGraph`] owns every [`Transform`] as a component of a [`hecs::World`].
//! Links between transforms are plain [`Entity`] handles, so the graph never
//! owns a node through another node and despawning is the only way a
//! transform goes away.
//!
//! # Invalidation policy
//!
//! Mutating a transform marks only that transform dirty. Every read walks the
//! parent chain first, refreshing stale ancestors on the way down, and any
//! node that recomputes marks all of its descendants dirty. A child whose own
//! fields never changed therefore still sees a moved parent on its next read.
//!
//! ```
//! use vesper::{SceneGraph, Transform, Vec3};
//!
//! let mut graph = SceneGraph::new();
//! let parent = graph.spawn(Transform::new());
//! let child = graph.spawn(Transform::from_position(Vec3::X));
//! graph.add_child(parent, child);
//!
//! graph.transform_mut(parent).unwrap().move_absolute(Vec3::Y);
//! let world = graph.world_matrix(child).unwrap();
//! assert_eq!(world.w_axis.truncate(), Vec3::new(1.0, 1.0, 0.0));
//! ```

use glam::{Mat4, Vec3};
use hecs::{Entity, World};

use crate::transform::Transform;

/// Arena of transforms plus the hierarchy operations on them.
///
/// Other components (for example [`Renderable`](crate::Renderable)) can live
/// on the same entities; see [`SceneGraph::spawn_with`].
#[derive(Default)]
pub struct SceneGraph {
    world: World,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root transform. Any links the transform carries are discarded.
    pub fn spawn(&mut self, transform: Transform) -> Entity {
        self.world.spawn((Self::unlinked(transform),))
    }

    /// Adds a root transform together with one extra component.
    pub fn spawn_with<C: hecs::Component>(&mut self, transform: Transform, component: C) -> Entity {
        self.world.spawn((Self::unlinked(transform), component))
    }

    /// Removes an entity, detaching it from its parent and detaching its children.
    ///
    /// Children are detached the same way [`remove_child`](Self::remove_child)
    /// does it, so they survive as roots.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        let Some((parent, children)) = self
            .node(entity)
            .map(|t| (t.parent, t.children.clone()))
        else {
            return false;
        };

        for child in children {
            self.remove_child(entity, child);
        }
        if let Some(parent) = parent {
            self.remove_child(parent, entity);
        }
        self.world.despawn(entity).is_ok()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.world.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.world.len() == 0
    }

    /// Read access to a transform's local fields and link handles.
    pub fn transform(&self, entity: Entity) -> Option<hecs::Ref<'_, Transform>> {
        self.node(entity)
    }

    /// Mutable access for move/rotate/scale. Links are changed through the graph.
    pub fn transform_mut(&mut self, entity: Entity) -> Option<&mut Transform> {
        self.node_mut(entity)
    }

    /// World matrix of `entity`, recomputing stale ancestors first.
    pub fn world_matrix(&mut self, entity: Entity) -> Option<Mat4> {
        self.refresh(entity)?;
        self.node(entity).map(|t| t.world)
    }

    /// Inverse-transpose of [`world_matrix`](Self::world_matrix), for normals.
    pub fn world_inverse_transpose(&mut self, entity: Entity) -> Option<Mat4> {
        self.refresh(entity)?;
        self.node(entity).map(|t| t.world_inverse_transpose)
    }

    /// Attaches `child` under `parent`, compensating its local fields.
    ///
    /// Returns `false` and changes nothing when either entity is missing, when
    /// `child` is `parent`, when `child` is already attached to `parent`, or
    /// when `child` is an ancestor of `parent`. A child attached elsewhere is
    /// detached from its old parent first.
    pub fn add_child(&mut self, parent: Entity, child: Entity) -> bool {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return false;
        }
        if self.index_of_child(parent, child).is_some() || self.is_ancestor(child, parent) {
            return false;
        }
        if let Some(old_parent) = self.parent(child) {
            self.remove_child(old_parent, child);
        }

        if let Some(p) = self.node_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        self.compensate(child, parent, Rebase::Attach);
        self.mark_subtree_dirty(child);
        true
    }

    /// Detaches `child` from `parent`, undoing the attach compensation with the
    /// parent's current scale and position. Returns `false` if it was not a child.
    pub fn remove_child(&mut self, parent: Entity, child: Entity) -> bool {
        let Some(index) = self.index_of_child(parent, child) else {
            return false;
        };

        if let Some(p) = self.node_mut(parent) {
            p.children.remove(index);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = None;
        }
        self.compensate(child, parent, Rebase::Detach);
        self.mark_subtree_dirty(child);
        true
    }

    /// Attaches to `parent`, or detaches from the current parent when `None`.
    pub fn set_parent(&mut self, child: Entity, parent: Option<Entity>) -> bool {
        match parent {
            Some(parent) => self.add_child(parent, child),
            None => match self.parent(child) {
                Some(old_parent) => self.remove_child(old_parent, child),
                None => false,
            },
        }
    }

    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        self.node(entity)?.parent
    }

    /// Child at `index`, or `None` when out of range or `entity` is gone.
    pub fn child(&self, entity: Entity, index: usize) -> Option<Entity> {
        self.node(entity)?.children.get(index).copied()
    }

    pub fn child_count(&self, entity: Entity) -> usize {
        self.node(entity).map_or(0, |t| t.children.len())
    }

    pub fn index_of_child(&self, parent: Entity, child: Entity) -> Option<usize> {
        self.node(parent)?.children.iter().position(|&c| c == child)
    }

    /// Underlying world, for queries over extra components.
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    fn unlinked(mut transform: Transform) -> Transform {
        transform.parent = None;
        transform.children.clear();
        transform.mark_dirty();
        transform
    }

    fn node(&self, entity: Entity) -> Option<hecs::Ref<'_, Transform>> {
        self.world.get::<&Transform>(entity).ok()
    }

    fn node_mut(&mut self, entity: Entity) -> Option<&mut Transform> {
        self.world.query_one_mut::<&mut Transform>(entity).ok()
    }

    fn is_ancestor(&self, ancestor: Entity, entity: Entity) -> bool {
        let mut current = self.parent(entity);
        while let Some(e) = current {
            if e == ancestor {
                return true;
            }
            current = self.parent(e);
        }
        false
    }

    /// Brings `entity`'s cache up to date. Recursion depth equals hierarchy depth.
    fn refresh(&mut self, entity: Entity) -> Option<()> {
        let parent = self.node(entity)?.parent;
        let parent_world = match parent {
            Some(p) => {
                self.refresh(p);
                self.node(p).map(|t| t.world)
            }
            None => None,
        };

        let node = self.node_mut(entity)?;
        if !node.dirty {
            return Some(());
        }
        node.recompute(parent_world);
        self.mark_descendants_dirty(entity);
        Some(())
    }

    fn mark_subtree_dirty(&mut self, entity: Entity) {
        if let Some(t) = self.node_mut(entity) {
            t.mark_dirty();
        }
        self.mark_descendants_dirty(entity);
    }

    fn mark_descendants_dirty(&mut self, entity: Entity) {
        let mut stack = match self.node(entity) {
            Some(t) => t.children.clone(),
            None => return,
        };
        while let Some(e) = stack.pop() {
            if let Some(t) = self.node_mut(e) {
                t.mark_dirty();
                stack.extend_from_slice(&t.children);
            }
        }
    }

    fn compensate(&mut self, child: Entity, parent: Entity, rebase: Rebase) {
        let Some((parent_position, parent_scale)) =
            self.node(parent).map(|p| (p.position(), nonzero(p.scale())))
        else {
            return;
        };
        let Some(c) = self.node_mut(child) else {
            return;
        };
        match rebase {
            Rebase::Attach => {
                c.set_scale(c.scale() / parent_scale);
                c.move_relative(-parent_position);
            }
            Rebase::Detach => {
                c.set_scale(c.scale() * parent_scale);
                c.move_relative(parent_position);
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Rebase {
    Attach,
    Detach,
}

/// Zero scale components would make the attach division blow up; treat them as 1.
fn nonzero(v: Vec3) -> Vec3 {
    Vec3::select(v.cmpeq(Vec3::ZERO), Vec3::ONE, v)
}
