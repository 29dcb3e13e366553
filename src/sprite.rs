//! Sprites: a game object showing one of several animation sequences.

use std::cell::RefCell;
use std::rc::Rc;

use crate::animation::{AnimationSequence, StepOutcome};
use crate::error::{EngineError, Result};
use crate::geometry::Rect;
use crate::messaging::Message;
use crate::object::{Behavior, DrawContext, ObjectId, UpdateContext};
use crate::surface::{Bitmap, Surface};

type SpriteFrameListener = Box<dyn FnMut(usize, usize)>;
type SharedListeners = Rc<RefCell<Vec<SpriteFrameListener>>>;

/// Hook `listeners` onto `animation` so its steps reach the sprite's
/// new-frame listeners, however the step was triggered.
fn forward_new_frames(animation: &mut AnimationSequence, listeners: &SharedListeners) {
    let listeners = Rc::clone(listeners);
    animation.on_new_frame(move |previous, current| {
        for listener in listeners.borrow_mut().iter_mut() {
            listener(previous, current);
        }
    });
}

/// A set of animation sequences with one of them selected for display.
///
/// Which slot means what ("walking left", "exploding", ...) is a convention
/// between whoever builds the sprite and the code selecting animations.
/// Selecting another slot does not rewind it; call
/// [`reset_and_start_animation`](Sprite::reset_and_start_animation) for that.
pub struct Sprite {
    animations: Vec<AnimationSequence>,
    current: usize,
    new_frame_listeners: SharedListeners,
}

impl Sprite {
    /// Sprite with every sequence rewound and playing.
    pub fn new(animations: Vec<AnimationSequence>) -> Result<Self> {
        Self::with_running(true, animations)
    }

    pub fn with_running(running: bool, mut animations: Vec<AnimationSequence>) -> Result<Self> {
        if animations.is_empty() {
            return Err(EngineError::EmptyAnimationSet);
        }
        let listeners = SharedListeners::default();
        for animation in &mut animations {
            if running {
                animation.reset_and_start();
            }
            forward_new_frames(animation, &listeners);
        }
        Ok(Sprite {
            animations,
            current: 0,
            new_frame_listeners: listeners,
        })
    }

    /// Static sprite showing the whole of `texture`.
    pub fn from_bitmap(texture: Rc<Bitmap>) -> Result<Self> {
        let region = texture.bounds();
        Self::from_region(texture, region)
    }

    /// Static sprite showing `region` of `texture`.
    pub fn from_region(texture: Rc<Bitmap>, region: Rect) -> Result<Self> {
        let animation = AnimationSequence::new(texture, 0, vec![region])?;
        Self::with_running(false, vec![animation])
    }

    pub fn current_animation(&self) -> usize {
        self.current
    }

    /// Select the sequence to show. Panics if `index` is out of range.
    pub fn set_current_animation(&mut self, index: usize) {
        assert!(index < self.animations.len(), "animation {index} out of range");
        self.current = index;
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    pub fn animation(&self, index: usize) -> &AnimationSequence {
        &self.animations[index]
    }

    pub fn animation_mut(&mut self, index: usize) -> &mut AnimationSequence {
        &mut self.animations[index]
    }

    fn active(&self) -> &AnimationSequence {
        &self.animations[self.current]
    }

    fn active_mut(&mut self) -> &mut AnimationSequence {
        &mut self.animations[self.current]
    }

    pub fn current_frame(&self) -> usize {
        self.active().current_frame()
    }

    pub fn set_current_frame(&mut self, frame: usize) {
        self.active_mut().set_current_frame(frame);
    }

    pub fn is_animation_running(&self) -> bool {
        self.active().is_running()
    }

    pub fn start_animation(&mut self) {
        self.active_mut().start();
    }

    pub fn stop_animation(&mut self) {
        self.active_mut().stop();
    }

    pub fn reset_animation(&mut self) {
        self.active_mut().reset();
    }

    pub fn reset_and_start_animation(&mut self) {
        self.active_mut().reset_and_start();
    }

    pub fn stop_and_reset_animation(&mut self) {
        self.active_mut().stop_and_reset();
    }

    /// Called with (previous, new) whenever any of this sprite's sequences
    /// moves on a frame, including steps made through
    /// [`animation_mut`](Sprite::animation_mut).
    pub fn on_new_frame<F>(&mut self, listener: F)
    where
        F: FnMut(usize, usize) + 'static,
    {
        self.new_frame_listeners.borrow_mut().push(Box::new(listener));
    }

    pub fn step_animation(&mut self) -> StepOutcome {
        self.active_mut().step()
    }

    /// Advance the current sequence by `elapsed` seconds. Single-frame
    /// sequences are left alone.
    pub fn animate(&mut self, elapsed: f32) -> Option<StepOutcome> {
        if self.active().frame_count() <= 1 {
            return None;
        }
        self.active_mut().update(elapsed)
    }

    /// Draw the current frame with its top-left corner at (`x`, `y`).
    pub fn draw_at(&self, surface: &mut dyn Surface, x: i32, y: i32) {
        self.active().draw(surface, x, y);
    }

    /// Size of the current frame.
    pub fn frame_size(&self) -> (i32, i32) {
        let region = self.active().current_region();
        (region.width, region.height)
    }
}

/// Every sequence is cloned fresh; the clone starts playing from frame 0
/// with no listeners.
impl Clone for Sprite {
    fn clone(&self) -> Self {
        let listeners = SharedListeners::default();
        let animations = self
            .animations
            .iter()
            .map(|animation| {
                let mut animation = animation.clone();
                animation.reset_and_start();
                forward_new_frames(&mut animation, &listeners);
                animation
            })
            .collect();
        Sprite {
            animations,
            current: 0,
            new_frame_listeners: listeners,
        }
    }
}

impl<M: Message> Behavior<M> for Sprite {
    fn update(&mut self, _id: ObjectId, _ctx: &mut UpdateContext<'_, M>, elapsed: f32) {
        self.animate(elapsed);
    }

    fn draw(&mut self, id: ObjectId, ctx: &mut DrawContext<'_, M>) {
        if let Some((x, y)) = ctx.objects.world_position(id) {
            self.draw_at(ctx.surface, x, y);
        }
    }
}
