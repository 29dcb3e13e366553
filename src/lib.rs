//! A small 2-D game engine: scenes of nested game objects, sprite
//! animation, a scrolling tile viewer with incremental repaint, countdown
//! timers, a publish/subscribe message bus and a fixed-timestep game loop.

pub mod animation;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod game;
pub mod geometry;
pub mod input;
pub mod messaging;
pub mod object;
pub mod scene;
pub mod sprite;
pub mod surface;
pub mod tile_viewer;
pub mod timer;
