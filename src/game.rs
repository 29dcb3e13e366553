//! The game manager: owns every engine service and runs the frame loop.
//!
//! One frame is: measure elapsed time, run zero or more update steps
//! (poll input, tick timers, update enabled scenes), draw the visible
//! scenes once, and flush the surface once.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::config::{EngineConfig, FrameConfig};
use crate::error::{EngineError, Result};
use crate::input::{InputManager, InputState};
use crate::messaging::{Message, MessageBus};
use crate::object::{Behavior, DrawContext, GameObject, ObjectGraph, UpdateContext};
use crate::scene::{GameScene, SceneId};
use crate::surface::Surface;
use crate::timer::TimerRegistry;

// ── Scheduling ────────────────────────────────────────────────────────────────

/// Update steps to run for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramePlan {
    pub steps: u32,
    /// Simulated time covered by each step.
    pub step: Duration,
}

/// Turns wall-clock frame times into update steps.
///
/// With a fixed frame rate, elapsed time is accumulated and consumed in
/// whole update intervals; the leftover carries into the next frame. The
/// accumulator is capped, so after a stall the lost time is dropped rather
/// than replayed. Without a fixed rate every frame is one step of whatever
/// time actually passed.
#[derive(Clone, Debug)]
pub struct FrameScheduler {
    fixed: bool,
    max_catch_up_frames: u32,
    update_interval: Duration,
    max_update_time: Duration,
    remaining: Duration,
}

impl FrameScheduler {
    pub fn new(config: &FrameConfig) -> Self {
        FrameScheduler {
            fixed: config.fixed_frame_rate,
            max_catch_up_frames: config.max_catch_up_frames,
            update_interval: config.update_interval(),
            max_update_time: config.max_update_time(),
            remaining: Duration::ZERO,
        }
    }

    pub fn plan(&mut self, elapsed: Duration) -> FramePlan {
        if !self.fixed {
            return FramePlan {
                steps: 1,
                step: elapsed,
            };
        }
        let mut pending = (elapsed + self.remaining).min(self.max_update_time);
        let mut steps = 0;
        while pending >= self.update_interval {
            pending -= self.update_interval;
            steps += 1;
        }
        self.remaining = pending;
        FramePlan {
            steps,
            step: self.update_interval,
        }
    }

    /// Time carried over to the next frame.
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn max_update_time(&self) -> Duration {
        self.max_update_time
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
        self.remaining = Duration::ZERO;
    }

    pub fn set_target_frame_rate(&mut self, rate: u32) {
        let config = FrameConfig {
            target_frame_rate: rate,
            max_catch_up_frames: self.max_catch_up_frames,
            ..FrameConfig::default()
        };
        self.update_interval = config.update_interval();
        self.max_update_time = config.max_update_time();
        self.remaining = self.remaining.min(self.max_update_time);
        debug!(rate, interval = ?self.update_interval, "target frame rate changed");
    }
}

// ── GameManager ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    Running,
}

/// What a single [`GameManager::run_frame`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    /// Wall-clock time since the previous frame.
    pub elapsed: Duration,
    pub updates: u32,
}

pub struct GameManager<M: Message, S: Surface, C: Clock> {
    objects: ObjectGraph<M>,
    scenes: Vec<GameScene>,
    current_scene: Option<SceneId>,
    messages: MessageBus<M>,
    timers: TimerRegistry,
    input: InputManager,
    scheduler: FrameScheduler,
    surface: S,
    clock: C,
    state: ManagerState,
    enabled: bool,
    pace_frames: bool,
    last_tick: Duration,
    frames: u64,
}

impl<M: Message, S: Surface, C: Clock> GameManager<M, S, C> {
    pub fn new(surface: S, clock: C, config: &EngineConfig) -> Self {
        GameManager {
            objects: ObjectGraph::new(),
            scenes: Vec::new(),
            current_scene: None,
            messages: MessageBus::new(),
            timers: TimerRegistry::new(),
            input: InputManager::new(),
            scheduler: FrameScheduler::new(&config.frame),
            surface,
            clock,
            state: ManagerState::Uninitialized,
            enabled: true,
            pace_frames: config.frame.pace_frames,
            last_tick: Duration::ZERO,
            frames: 0,
        }
    }

    // ── Scenes ────────────────────────────────────────────────────────────────

    /// Register a scene driven by `behavior`. It stays disabled and hidden
    /// until shown.
    pub fn add_scene<B: Behavior<M>>(&mut self, name: impl Into<String>, behavior: B) -> SceneId {
        let mut root = GameObject::new();
        root.set_enabled(false);
        root.set_visible(false);
        let root = self.objects.insert(root, Some(Box::new(behavior)));
        let id = SceneId::new(self.scenes.len());
        let scene = GameScene::new(name.into(), root);
        debug!(scene = %scene.name(), ?id, "scene added");
        self.scenes.push(scene);
        id
    }

    /// Make `id` the active scene: the previous one is hidden, disabled and
    /// unloaded, then `id` is loaded, enabled and shown.
    pub fn show_scene(&mut self, id: SceneId) -> Result<()> {
        if id.index() >= self.scenes.len() {
            return Err(EngineError::UnknownScene(id));
        }
        let input = self.input.state();
        let mut ctx = UpdateContext {
            objects: &mut self.objects,
            messages: &mut self.messages,
            timers: &mut self.timers,
            input,
        };

        if let Some(previous) = self.current_scene.take() {
            let scene = &mut self.scenes[previous.index()];
            if let Some(root) = ctx.objects.get_mut(scene.root()) {
                root.set_enabled(false);
                root.set_visible(false);
            }
            scene.unload(&mut ctx);
        }

        let scene = &mut self.scenes[id.index()];
        scene.load(&mut ctx)?;
        if let Some(root) = ctx.objects.get_mut(scene.root()) {
            root.set_enabled(true);
            root.set_visible(true);
        }
        info!(scene = %scene.name(), "scene shown");
        self.current_scene = Some(id);
        Ok(())
    }

    pub fn scene(&self, id: SceneId) -> Option<&GameScene> {
        self.scenes.get(id.index())
    }

    pub fn current_scene(&self) -> Option<SceneId> {
        self.current_scene
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Start the clock with whatever scenes are already shown. Frames can
    /// be run from here on.
    pub fn initialize(&mut self) -> Result<()> {
        self.initialize_with(|_| Ok(()))
    }

    /// Load the game's content with `load_content` (typically adding scenes
    /// and showing the first one), then start the clock. If loading fails
    /// the manager stays uninitialized.
    pub fn initialize_with<F>(&mut self, load_content: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        if self.state == ManagerState::Running {
            return Err(EngineError::AlreadyInitialized);
        }
        load_content(self)?;
        self.last_tick = self.clock.now();
        self.state = ManagerState::Running;
        info!(
            scenes = self.scenes.len(),
            fixed = self.scheduler.is_fixed(),
            interval = ?self.scheduler.update_interval(),
            "game manager running"
        );
        Ok(())
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// A disabled manager keeps polling input and drawing but skips timers
    /// and scene updates.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Run one iteration of the frame loop.
    pub fn run_frame(&mut self) -> Result<FrameReport> {
        if self.state != ManagerState::Running {
            return Err(EngineError::NotInitialized);
        }
        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.last_tick);
        self.last_tick = now;

        let plan = self.scheduler.plan(elapsed);
        for _ in 0..plan.steps {
            self.update(plan.step);
        }
        trace!(frame = self.frames, updates = plan.steps, ?elapsed, "frame");

        self.draw();
        self.surface.flush()?;

        let report = FrameReport {
            frame: self.frames,
            elapsed,
            updates: plan.steps,
        };
        self.frames += 1;
        Ok(report)
    }

    /// Run frames until `done` returns true, initializing first if needed.
    /// With frame pacing on, each frame sleeps off whatever is left of its
    /// update interval.
    pub fn run_until<F>(&mut self, mut done: F) -> Result<()>
    where
        F: FnMut(&Self) -> bool,
    {
        if self.state == ManagerState::Uninitialized {
            self.initialize()?;
        }
        while !done(self) {
            let started = self.clock.now();
            self.run_frame()?;
            if self.pace_frames {
                let spent = self.clock.now().saturating_sub(started);
                let interval = self.scheduler.update_interval();
                match interval.checked_sub(spent) {
                    Some(rest) if !rest.is_zero() => self.clock.sleep(rest),
                    _ => warn!(?spent, ?interval, "frame overran its interval"),
                }
            }
        }
        info!(frames = self.frames, "frame loop finished");
        Ok(())
    }

    fn update(&mut self, step: Duration) {
        let elapsed = step.as_secs_f32();
        let input = self.input.poll(elapsed);
        if !self.enabled {
            return;
        }
        self.timers.advance(step);
        let mut ctx = UpdateContext {
            objects: &mut self.objects,
            messages: &mut self.messages,
            timers: &mut self.timers,
            input,
        };
        for scene in &self.scenes {
            scene.update(&mut ctx, elapsed);
        }
    }

    fn draw(&mut self) {
        let mut ctx = DrawContext {
            objects: &mut self.objects,
            surface: &mut self.surface,
        };
        for scene in &self.scenes {
            scene.draw(&mut ctx);
        }
    }

    // ── Services ──────────────────────────────────────────────────────────────

    /// Context for wiring things up outside the frame loop, e.g. creating
    /// timers or subscribing handlers before the first frame.
    pub fn update_context(&mut self) -> UpdateContext<'_, M> {
        UpdateContext {
            objects: &mut self.objects,
            messages: &mut self.messages,
            timers: &mut self.timers,
            input: self.input.state(),
        }
    }

    pub fn objects(&self) -> &ObjectGraph<M> {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectGraph<M> {
        &mut self.objects
    }

    pub fn messages_mut(&mut self) -> &mut MessageBus<M> {
        &mut self.messages
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut TimerRegistry {
        &mut self.timers
    }

    pub fn input(&self) -> InputState {
        self.input.state()
    }

    pub fn input_mut(&mut self) -> &mut InputManager {
        &mut self.input
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut FrameScheduler {
        &mut self.scheduler
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }
}
