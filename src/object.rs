//! Game objects and the ownership tree that positions them.
//!
//! Every object lives in an [`ObjectGraph`] arena and is addressed by an
//! [`ObjectId`]. An object may have one owner; its world position is its
//! own position plus the accumulated positions (and child offsets) of its
//! owners. The owner does not own the child's memory, the graph does, so
//! the tree carries no lifetime or reference-cycle hazards.
//!
//! Per-type logic is attached as a [`Behavior`]. Updating or drawing an
//! object runs its behavior and then recurses into its enabled (update)
//! or visible (draw) children, in the order they were attached.

use std::any::Any;

use tracing::warn;

use crate::error::{EngineError, Result};
use crate::input::InputState;
use crate::messaging::{Message, MessageBus};
use crate::surface::Surface;
use crate::timer::TimerRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

// ── GameObject ────────────────────────────────────────────────────────────────

/// Position, flags and tree links shared by every object.
#[derive(Clone, Debug, PartialEq)]
pub struct GameObject {
    /// Sub-pixel position; `x`/`y` are these truncated toward zero.
    fx: f32,
    fy: f32,
    x: i32,
    y: i32,
    enabled: bool,
    visible: bool,
    owner: Option<ObjectId>,
    children: Vec<ObjectId>,
    child_offset_x: f32,
    child_offset_y: f32,
}

impl Default for GameObject {
    fn default() -> Self {
        GameObject {
            fx: 0.0,
            fy: 0.0,
            x: 0,
            y: 0,
            enabled: true,
            visible: true,
            owner: None,
            children: Vec::new(),
            child_offset_x: 0.0,
            child_offset_y: 0.0,
        }
    }
}

impl GameObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(x: f32, y: f32) -> Self {
        let mut object = Self::default();
        object.move_to(x, y);
        object
    }

    /// X relative to the owner.
    pub fn x(&self) -> i32 {
        self.x
    }

    /// Y relative to the owner.
    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn exact_position(&self) -> (f32, f32) {
        (self.fx, self.fy)
    }

    /// Move relative to the current position.
    pub fn move_by(&mut self, dx: f32, dy: f32) {
        self.fx += dx;
        self.fy += dy;
        self.x = self.fx as i32;
        self.y = self.fy as i32;
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.fx = x;
        self.fy = y;
        self.x = self.fx as i32;
        self.y = self.fy as i32;
    }

    /// Disabled objects are skipped by update but still drawn.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Hidden objects are skipped by draw but still updated.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn owner(&self) -> Option<ObjectId> {
        self.owner
    }

    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// Extra displacement applied to every child, e.g. a scroll position.
    pub fn child_offset(&self) -> (f32, f32) {
        (self.child_offset_x, self.child_offset_y)
    }

    pub fn set_child_offset(&mut self, x: f32, y: f32) {
        self.child_offset_x = x;
        self.child_offset_y = y;
    }
}

// ── Behavior ──────────────────────────────────────────────────────────────────

/// Upcast helper so behaviors can be downcast to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Per-type logic attached to a game object.
///
/// While a hook runs, the behavior is detached from its slot in the graph,
/// so `ctx.objects.behavior::<Self>(id)` returns `None` from inside it. The
/// object's [`GameObject`] data stays reachable through `ctx.objects`.
pub trait Behavior<M: Message>: AsAny {
    fn load_content(&mut self, _id: ObjectId, _ctx: &mut UpdateContext<'_, M>) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, _id: ObjectId, _ctx: &mut UpdateContext<'_, M>, _elapsed: f32) {}

    /// Render this object. Runs before the visible children are drawn.
    fn draw(&mut self, _id: ObjectId, _ctx: &mut DrawContext<'_, M>) {}

    /// Runs after the visible children have been drawn.
    fn end_draw(&mut self, _id: ObjectId, _ctx: &mut DrawContext<'_, M>) {}

    fn unload(&mut self, _id: ObjectId, _ctx: &mut UpdateContext<'_, M>) {}
}

/// Everything an object may touch while updating.
pub struct UpdateContext<'a, M: Message> {
    pub objects: &'a mut ObjectGraph<M>,
    pub messages: &'a mut MessageBus<M>,
    pub timers: &'a mut TimerRegistry,
    pub input: InputState,
}

/// Everything an object may touch while drawing.
pub struct DrawContext<'a, M: Message> {
    pub objects: &'a mut ObjectGraph<M>,
    pub surface: &'a mut dyn Surface,
}

// ── ObjectGraph ───────────────────────────────────────────────────────────────

struct Entry<M: Message> {
    object: GameObject,
    behavior: Option<Box<dyn Behavior<M>>>,
}

struct Slot<M: Message> {
    generation: u32,
    entry: Option<Entry<M>>,
}

pub struct ObjectGraph<M: Message> {
    slots: Vec<Slot<M>>,
    free: Vec<u32>,
    count: usize,
}

impl<M: Message> Default for ObjectGraph<M> {
    fn default() -> Self {
        ObjectGraph {
            slots: Vec::new(),
            free: Vec::new(),
            count: 0,
        }
    }
}

impl<M: Message> ObjectGraph<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Add an unowned object, optionally with a behavior.
    pub fn insert(&mut self, object: GameObject, behavior: Option<Box<dyn Behavior<M>>>) -> ObjectId {
        // Ownership links are only ever established through `set_owner`.
        let object = GameObject {
            owner: None,
            children: Vec::new(),
            ..object
        };
        let entry = Entry { object, behavior };
        self.count += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                ObjectId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                ObjectId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    /// Add an unowned object at the origin driven by `behavior`.
    pub fn add<B: Behavior<M>>(&mut self, behavior: B) -> ObjectId {
        self.insert(GameObject::new(), Some(Box::new(behavior)))
    }

    /// Add an object and attach it to `owner` in one go.
    pub fn spawn<B: Behavior<M>>(&mut self, owner: ObjectId, object: GameObject, behavior: B) -> Result<ObjectId> {
        let id = self.insert(object, Some(Box::new(behavior)));
        if let Err(err) = self.set_owner(id, Some(owner)) {
            self.destroy(id);
            return Err(err);
        }
        Ok(id)
    }

    fn entry(&self, id: ObjectId) -> Option<&Entry<M>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, id: ObjectId) -> Option<&mut Entry<M>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entry(id).is_some()
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.entry(id).map(|entry| &entry.object)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.entry_mut(id).map(|entry| &mut entry.object)
    }

    /// The object's behavior as a concrete type.
    pub fn behavior<T: Any>(&self, id: ObjectId) -> Option<&T> {
        let behavior: &dyn Behavior<M> = self.entry(id)?.behavior.as_deref()?;
        behavior.as_any().downcast_ref::<T>()
    }

    pub fn behavior_mut<T: Any>(&mut self, id: ObjectId) -> Option<&mut T> {
        let behavior: &mut dyn Behavior<M> = self.entry_mut(id)?.behavior.as_deref_mut()?;
        behavior.as_any_mut().downcast_mut::<T>()
    }

    /// Object data and its concrete behavior, borrowed together.
    pub fn split_mut<T: Any>(&mut self, id: ObjectId) -> Option<(&mut GameObject, &mut T)> {
        let entry = self.entry_mut(id)?;
        let behavior: &mut dyn Behavior<M> = entry.behavior.as_deref_mut()?;
        let behavior = behavior.as_any_mut().downcast_mut::<T>()?;
        Some((&mut entry.object, behavior))
    }

    pub(crate) fn take_behavior(&mut self, id: ObjectId) -> Option<Box<dyn Behavior<M>>> {
        self.entry_mut(id)?.behavior.take()
    }

    pub(crate) fn restore_behavior(&mut self, id: ObjectId, behavior: Box<dyn Behavior<M>>) {
        // The object may have destroyed itself; the behavior is dropped then.
        if let Some(entry) = self.entry_mut(id) {
            entry.behavior = Some(behavior);
        }
    }

    pub fn owner(&self, id: ObjectId) -> Option<ObjectId> {
        self.get(id).and_then(GameObject::owner)
    }

    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.get(id).map_or(&[], GameObject::children)
    }

    /// True if `ancestor` appears on the owner chain of `id` (or is `id`).
    pub fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.owner(node);
        }
        false
    }

    /// Re-parent `child`. `None` detaches it, making its world position
    /// equal to its local position.
    ///
    /// Refuses to make an object own itself or one of its own owners.
    pub fn set_owner(&mut self, child: ObjectId, owner: Option<ObjectId>) -> Result<()> {
        let current = match self.get(child) {
            Some(object) => object.owner,
            None => return Err(EngineError::StaleObject(child)),
        };
        if current == owner {
            return Ok(());
        }
        if let Some(owner) = owner {
            if !self.contains(owner) {
                return Err(EngineError::StaleObject(owner));
            }
            if self.is_ancestor(child, owner) {
                return Err(EngineError::OwnershipCycle { child, owner });
            }
        }

        if let Some(old) = current {
            if let Some(old_owner) = self.get_mut(old) {
                if let Some(pos) = old_owner.children.iter().rposition(|&c| c == child) {
                    old_owner.children.remove(pos);
                }
            }
        }
        if let Some(object) = self.get_mut(child) {
            object.owner = owner;
        }
        if let Some(new_owner) = owner.and_then(|o| self.get_mut(o)) {
            new_owner.children.push(child);
        }
        Ok(())
    }

    /// Position in world space: local position plus every owner's position
    /// and child offset up the chain.
    pub fn world_position(&self, id: ObjectId) -> Option<(i32, i32)> {
        let object = self.get(id)?;
        let mut x = object.x;
        let mut y = object.y;
        let mut current = object.owner;
        while let Some(owner_id) = current {
            let Some(owner) = self.get(owner_id) else {
                break;
            };
            x += owner.x + owner.child_offset_x as i32;
            y += owner.y + owner.child_offset_y as i32;
            current = owner.owner;
        }
        Some((x, y))
    }

    /// Remove an object and everything it owns. Returns false for a stale id.
    pub fn destroy(&mut self, id: ObjectId) -> bool {
        if !self.contains(id) {
            return false;
        }
        if let Err(err) = self.set_owner(id, None) {
            warn!(?id, %err, "failed to detach object before destroying it");
        }
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let Some(slot) = self.slots.get_mut(next.index as usize) else {
                continue;
            };
            if slot.generation != next.generation {
                continue;
            }
            if let Some(entry) = slot.entry.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.index);
                self.count -= 1;
                pending.extend(entry.object.children);
            }
        }
        true
    }
}

// ── Traversal ─────────────────────────────────────────────────────────────────

/// Update `id`'s behavior, then every enabled child, depth first.
pub fn update_tree<M: Message>(id: ObjectId, ctx: &mut UpdateContext<'_, M>, elapsed: f32) {
    if let Some(mut behavior) = ctx.objects.take_behavior(id) {
        behavior.update(id, ctx, elapsed);
        ctx.objects.restore_behavior(id, behavior);
    }
    if ctx.objects.children(id).is_empty() {
        return;
    }
    let children = ctx.objects.children(id).to_vec();
    for child in children {
        if ctx.objects.get(child).is_some_and(GameObject::is_enabled) {
            update_tree(child, ctx, elapsed);
        }
    }
}

/// Draw `id`'s behavior, then every visible child, then the behavior's
/// `end_draw`.
pub fn draw_tree<M: Message>(id: ObjectId, ctx: &mut DrawContext<'_, M>) {
    let mut behavior = ctx.objects.take_behavior(id);
    if let Some(behavior) = behavior.as_mut() {
        behavior.draw(id, ctx);
    }
    if !ctx.objects.children(id).is_empty() {
        let children = ctx.objects.children(id).to_vec();
        for child in children {
            if ctx.objects.get(child).is_some_and(GameObject::is_visible) {
                draw_tree(child, ctx);
            }
        }
    }
    if let Some(mut behavior) = behavior {
        behavior.end_draw(id, ctx);
        ctx.objects.restore_behavior(id, behavior);
    }
}
