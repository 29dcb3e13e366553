//! Game scenes: named object trees that are loaded, shown and unloaded as
//! a unit (title screen, gameplay, game over, ...).

use tracing::info;

use crate::error::Result;
use crate::messaging::Message;
use crate::object::{draw_tree, update_tree, DrawContext, GameObject, ObjectId, UpdateContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SceneId(usize);

impl SceneId {
    pub(crate) fn new(index: usize) -> Self {
        SceneId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// A scene is a root object whose behavior is the scene logic and whose
/// children are the objects in the scene.
///
/// The root's `load_content` populates the scene (typically with
/// `ctx.objects.spawn(root, ..)`); unloading destroys those objects again,
/// so every load starts from scratch.
#[derive(Clone, Debug)]
pub struct GameScene {
    name: String,
    root: ObjectId,
    loaded: bool,
}

impl GameScene {
    pub(crate) fn new(name: String, root: ObjectId) -> Self {
        GameScene {
            name,
            root,
            loaded: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Run the scene's `load_content`. Does nothing if already loaded.
    pub fn load<M: Message>(&mut self, ctx: &mut UpdateContext<'_, M>) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        if let Some(mut behavior) = ctx.objects.take_behavior(self.root) {
            let loaded = behavior.load_content(self.root, ctx);
            ctx.objects.restore_behavior(self.root, behavior);
            loaded?;
        }
        self.loaded = true;
        info!(scene = %self.name, objects = ctx.objects.children(self.root).len(), "scene loaded");
        Ok(())
    }

    /// Run the scene's `unload` and destroy every object it owns.
    pub fn unload<M: Message>(&mut self, ctx: &mut UpdateContext<'_, M>) {
        if !self.loaded {
            return;
        }
        if let Some(mut behavior) = ctx.objects.take_behavior(self.root) {
            behavior.unload(self.root, ctx);
            ctx.objects.restore_behavior(self.root, behavior);
        }
        let children = ctx.objects.children(self.root).to_vec();
        for child in children {
            ctx.objects.destroy(child);
        }
        self.loaded = false;
        info!(scene = %self.name, "scene unloaded");
    }

    pub fn update<M: Message>(&self, ctx: &mut UpdateContext<'_, M>, elapsed: f32) {
        if ctx.objects.get(self.root).is_some_and(GameObject::is_enabled) {
            update_tree(self.root, ctx, elapsed);
        }
    }

    pub fn draw<M: Message>(&self, ctx: &mut DrawContext<'_, M>) {
        if ctx.objects.get(self.root).is_some_and(GameObject::is_visible) {
            draw_tree(self.root, ctx);
        }
    }
}
