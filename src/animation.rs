//! Time-driven frame stepping over regions of a shared sprite sheet.

use std::fmt;
use std::rc::Rc;

use crate::error::{EngineError, Result};
use crate::geometry::Rect;
use crate::surface::{Bitmap, Surface};

/// How many times a sequence plays before completing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Iterations {
    Infinite,
    /// Full passes. With auto-reverse each pass is there and back again.
    Count(u32),
}

/// What a single [`AnimationSequence::step`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub previous: usize,
    pub current: usize,
    /// The last iteration finished; the sequence is now stopped at frame 0.
    pub completed: bool,
}

type NewFrameListener = Box<dyn FnMut(usize, usize)>;
type CompletedListener = Box<dyn FnMut()>;

pub struct AnimationSequence {
    texture: Rc<Bitmap>,
    frames: Rc<[Rect]>,
    current_frame: usize,
    /// +1 while playing forward, -1 while playing back.
    frame_inc: isize,
    auto_reverse: bool,
    iterations: Iterations,
    /// Boundary crossings needed to complete; doubled by auto-reverse.
    target: Option<u32>,
    current_iteration: u32,
    frames_per_second: u32,
    period: f32,
    accumulated: f32,
    running: bool,
    new_frame_listeners: Vec<NewFrameListener>,
    completed_listeners: Vec<CompletedListener>,
}

impl AnimationSequence {
    /// Auto-reversing sequence that loops forever.
    pub fn new(texture: Rc<Bitmap>, frames_per_second: u32, frames: Vec<Rect>) -> Result<Self> {
        Self::with_options(texture, frames_per_second, true, Iterations::Infinite, frames)
    }

    pub fn with_options(
        texture: Rc<Bitmap>,
        frames_per_second: u32,
        auto_reverse: bool,
        iterations: Iterations,
        frames: Vec<Rect>,
    ) -> Result<Self> {
        if frames.is_empty() {
            return Err(EngineError::EmptyAnimationFrames);
        }
        Ok(Self::build(texture, frames.into(), frames_per_second, auto_reverse, iterations))
    }

    fn build(
        texture: Rc<Bitmap>,
        frames: Rc<[Rect]>,
        frames_per_second: u32,
        auto_reverse: bool,
        iterations: Iterations,
    ) -> Self {
        let target = match iterations {
            Iterations::Infinite => None,
            Iterations::Count(n) => Some(if auto_reverse { n.saturating_mul(2) } else { n }),
        };
        let period = if frames_per_second > 0 {
            1.0 / frames_per_second as f32
        } else {
            1.0
        };
        AnimationSequence {
            texture,
            frames,
            current_frame: 0,
            frame_inc: 1,
            auto_reverse,
            iterations,
            target,
            current_iteration: 0,
            frames_per_second,
            period,
            accumulated: 0.0,
            running: false,
            new_frame_listeners: Vec::new(),
            completed_listeners: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Jump to `frame`. Panics if it is out of range.
    pub fn set_current_frame(&mut self, frame: usize) {
        assert!(frame < self.frames.len(), "frame {frame} out of range");
        self.current_frame = frame;
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames_per_second(&self) -> u32 {
        self.frames_per_second
    }

    pub fn auto_reverse(&self) -> bool {
        self.auto_reverse
    }

    pub fn iterations(&self) -> Iterations {
        self.iterations
    }

    pub fn texture(&self) -> &Rc<Bitmap> {
        &self.texture
    }

    /// Sheet region of the frame currently showing.
    pub fn current_region(&self) -> Rect {
        self.frames[self.current_frame]
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Back to frame 0 and the first iteration. Playback direction is kept.
    pub fn reset(&mut self) {
        self.current_frame = 0;
        self.current_iteration = 0;
    }

    pub fn reset_and_start(&mut self) {
        self.reset();
        self.start();
    }

    pub fn stop_and_reset(&mut self) {
        self.running = false;
        self.reset();
    }

    pub fn on_new_frame<F>(&mut self, listener: F)
    where
        F: FnMut(usize, usize) + 'static,
    {
        self.new_frame_listeners.push(Box::new(listener));
    }

    /// Called when a finite sequence plays its last iteration.
    pub fn on_completed<F>(&mut self, listener: F)
    where
        F: FnMut() + 'static,
    {
        self.completed_listeners.push(Box::new(listener));
    }

    /// Advance one frame regardless of timing or running state.
    ///
    /// Stepping off either end either bounces (auto-reverse) without
    /// repeating the end frame, or wraps to frame 0. New-frame listeners
    /// always run before completion listeners.
    pub fn step(&mut self) -> StepOutcome {
        let previous = self.current_frame;
        let len = self.frames.len() as isize;
        let mut completed = false;

        let mut frame = self.current_frame as isize + self.frame_inc;
        if frame == -1 || frame == len {
            if self.auto_reverse {
                self.frame_inc = -self.frame_inc;
                frame += 2 * self.frame_inc;
            } else {
                frame = 0;
            }
            // A one-frame sequence bounces straight back out of range.
            frame = frame.clamp(0, len - 1);
            self.current_iteration = self.current_iteration.saturating_add(1);
            completed = self.target == Some(self.current_iteration);
        }
        self.current_frame = frame as usize;

        for listener in &mut self.new_frame_listeners {
            listener(previous, self.current_frame);
        }
        if completed {
            for listener in &mut self.completed_listeners {
                listener();
            }
            self.stop_and_reset();
        }

        StepOutcome {
            previous,
            current: self.current_frame,
            completed,
        }
    }

    /// Accumulate `elapsed` seconds and step at most once when a full frame
    /// period has built up. Returns the step taken, if any.
    pub fn update(&mut self, elapsed: f32) -> Option<StepOutcome> {
        if !self.running {
            return None;
        }
        self.accumulated += elapsed;
        if self.frames.len() == 1 {
            return None;
        }
        if self.accumulated >= self.period {
            self.accumulated -= self.period;
            return Some(self.step());
        }
        None
    }

    /// Blit the current frame with its top-left corner at (`x`, `y`).
    pub fn draw(&self, surface: &mut dyn Surface, x: i32, y: i32) {
        surface.draw_image(x, y, &self.texture, self.current_region());
    }
}

/// Clones share the sheet and region list, keep the playback settings,
/// and start stopped on frame 0 with no listeners.
impl Clone for AnimationSequence {
    fn clone(&self) -> Self {
        Self::build(
            Rc::clone(&self.texture),
            Rc::clone(&self.frames),
            self.frames_per_second,
            self.auto_reverse,
            self.iterations,
        )
    }
}

impl fmt::Debug for AnimationSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationSequence")
            .field("frames", &self.frames.len())
            .field("current_frame", &self.current_frame)
            .field("frame_inc", &self.frame_inc)
            .field("auto_reverse", &self.auto_reverse)
            .field("iterations", &self.iterations)
            .field("current_iteration", &self.current_iteration)
            .field("running", &self.running)
            .finish()
    }
}
