//! The rally demo: drive a car around a scrolling maze and collect every
//! flag before the fuel runs out.
//!
//! Everything the demo shows is generated here (tile sheet, font, maze),
//! so the binary has no asset files.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info};

use arcade_engine::animation::{AnimationSequence, Iterations};
use arcade_engine::config::{EngineConfig, TileConfig};
use arcade_engine::error::Result;
use arcade_engine::geometry::{tile_extractor, Rect};
use arcade_engine::input::Button;
use arcade_engine::messaging::Message;
use arcade_engine::object::{Behavior, DrawContext, GameObject, ObjectId, UpdateContext};
use arcade_engine::sprite::Sprite;
use arcade_engine::surface::{Bitmap, Color, Font, Surface};
use arcade_engine::tile_viewer::{TileId, TileMap, TileViewer};
use arcade_engine::timer::TimerId;

pub const ROAD: TileId = 0;
pub const WALL: TileId = 1;
pub const FLAG: TileId = 2;

/// The generated sheet has 8x8 tiles regardless of the configured size.
const TILE_SHIFT: u32 = 3;
const MAP_TILES_X: i32 = 48;
const MAP_TILES_Y: i32 = 40;
const FLAG_COUNT: u32 = 10;
const FLAG_VALUE: u32 = 100;
const START_FUEL: u32 = 90;
/// Pixels per second at full stick.
const CAR_SPEED: f32 = 40.0;
const CAR_START: (f32, f32) = (16.0, 16.0);
const HUD_HEIGHT: i32 = 16;

// ── Colour palette ────────────────────────────────────────────────────────────

const C_KEY: Color = Color::MAGENTA;
const C_ROAD: Color = Color::rgb(40, 40, 48);
const C_WALL: Color = Color::rgb(30, 60, 170);
const C_WALL_EDGE: Color = Color::rgb(90, 130, 230);
const C_HUD: Color = Color::rgb(16, 16, 16);
const C_HUD_DIM: Color = Color::rgb(70, 70, 70);
const C_CAR: Color = Color::rgb(220, 30, 30);
const C_TYRE: Color = Color::rgb(20, 20, 20);
const C_TYRE_LIT: Color = Color::rgb(110, 110, 110);

// ── Messages ──────────────────────────────────────────────────────────────────

pub enum RallyMessage {
    FlagCollected { tile_x: i32, tile_y: i32, count: u32 },
    OutOfFuel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RallyMessageKind {
    FlagCollected,
    OutOfFuel,
}

impl Message for RallyMessage {
    type Kind = RallyMessageKind;

    fn kind(&self) -> RallyMessageKind {
        match self {
            RallyMessage::FlagCollected { .. } => RallyMessageKind::FlagCollected,
            RallyMessage::OutOfFuel => RallyMessageKind::OutOfFuel,
        }
    }
}

// ── Round state ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundState {
    Driving,
    Won,
    OutOfFuel,
}

/// Scoreboard shared between the scene, its objects and message handlers.
#[derive(Debug)]
pub struct Round {
    flags: Cell<u32>,
    score: Cell<u32>,
    fuel: Cell<u32>,
    state: Cell<RoundState>,
    /// Where the last flag was picked up, until the scene shows it.
    popup_at: Cell<Option<(i32, i32)>>,
}

impl Round {
    fn new() -> Self {
        Round {
            flags: Cell::new(0),
            score: Cell::new(0),
            fuel: Cell::new(START_FUEL),
            state: Cell::new(RoundState::Driving),
            popup_at: Cell::new(None),
        }
    }

    fn restart(&self) {
        self.flags.set(0);
        self.fuel.set(START_FUEL);
        self.state.set(RoundState::Driving);
        self.popup_at.set(None);
    }

    pub fn state(&self) -> RoundState {
        self.state.get()
    }

    pub fn score(&self) -> u32 {
        self.score.get()
    }
}

// ── Assets ────────────────────────────────────────────────────────────────────

struct Assets {
    sheet: Rc<Bitmap>,
    tiles: Vec<Rect>,
    car: Vec<Rect>,
    sparkle: Vec<Rect>,
    font: Font,
}

fn draw_car(sheet: &mut Bitmap, x: i32, y: i32, tyre: Color) {
    sheet.fill_rect(Rect::new(x + 2, y + 1, 4, 6), C_CAR);
    sheet.fill_rect(Rect::new(x + 3, y + 2, 2, 2), Color::WHITE);
    for (tx, ty) in [(1, 1), (6, 1), (1, 5), (6, 5)] {
        sheet.fill_rect(Rect::new(x + tx, y + ty, 1, 2), tyre);
    }
}

/// 3x5 digit glyphs, one bit per pixel, top row in the high bits.
const DIGITS: [u16; 10] = [
    0b111_101_101_101_111,
    0b010_110_010_010_111,
    0b111_001_111_100_111,
    0b111_001_111_001_111,
    0b101_101_111_001_001,
    0b111_100_111_001_111,
    0b111_100_111_101_111,
    0b111_001_001_001_001,
    0b111_101_111_101_111,
    0b111_101_111_001_111,
];

fn digit_font() -> Font {
    let mut sheet = Bitmap::filled(40, 6, C_KEY).with_transparent(C_KEY);
    for (index, &bits) in DIGITS.iter().enumerate() {
        for row in 0..5 {
            for col in 0..3 {
                if bits >> (14 - (row * 3 + col)) & 1 == 1 {
                    sheet.set_pixel(index as i32 * 4 + col, row, Color::WHITE);
                }
            }
        }
    }
    Font::new(Rc::new(sheet), 4, 6, '0')
}

impl Assets {
    fn build() -> Self {
        let mut sheet = Bitmap::filled(32, 16, C_KEY).with_transparent(C_KEY);

        // Row 0: road, wall, flag.
        sheet.fill_rect(Rect::new(0, 0, 8, 8), C_ROAD);
        sheet.fill_rect(Rect::new(8, 0, 8, 8), C_WALL_EDGE);
        sheet.fill_rect(Rect::new(9, 1, 6, 6), C_WALL);
        sheet.fill_rect(Rect::new(16, 0, 8, 8), C_ROAD);
        sheet.fill_rect(Rect::new(18, 1, 1, 6), Color::WHITE);
        sheet.fill_rect(Rect::new(19, 1, 4, 3), Color::YELLOW);

        // Row 1: two car frames, two sparkle frames.
        draw_car(&mut sheet, 0, 8, C_TYRE);
        draw_car(&mut sheet, 8, 8, C_TYRE_LIT);
        sheet.fill_rect(Rect::new(19, 9, 2, 6), Color::YELLOW);
        sheet.fill_rect(Rect::new(17, 11, 6, 2), Color::YELLOW);
        sheet.fill_rect(Rect::new(27, 11, 2, 2), Color::WHITE);

        Assets {
            sheet: Rc::new(sheet),
            tiles: tile_extractor(0, 0, 8, 8, 3, 1, 0),
            car: tile_extractor(0, 8, 8, 8, 2, 1, 0),
            sparkle: tile_extractor(16, 8, 8, 8, 2, 1, 0),
            font: digit_font(),
        }
    }
}

// ── Maze ──────────────────────────────────────────────────────────────────────

/// Walled arena with a grid of city blocks, a few of them missing, and
/// flags scattered on the roads.
pub fn generate_maze(rng: &mut StdRng) -> Result<TileMap> {
    let mut map = TileMap::new(MAP_TILES_X, MAP_TILES_Y, ROAD)?;
    for x in 0..MAP_TILES_X {
        map.set(x, 0, WALL);
        map.set(x, MAP_TILES_Y - 1, WALL);
    }
    for y in 0..MAP_TILES_Y {
        map.set(0, y, WALL);
        map.set(MAP_TILES_X - 1, y, WALL);
    }

    for block_y in (3..MAP_TILES_Y - 3).step_by(4) {
        for block_x in (3..MAP_TILES_X - 3).step_by(4) {
            if !rng.gen_bool(0.8) {
                continue;
            }
            for y in block_y..block_y + 2 {
                for x in block_x..block_x + 2 {
                    map.set(x, y, WALL);
                }
            }
        }
    }

    let start = ((CAR_START.0 as i32) >> TILE_SHIFT, (CAR_START.1 as i32) >> TILE_SHIFT);
    let mut placed = 0;
    while placed < FLAG_COUNT {
        let x = rng.gen_range(1..MAP_TILES_X - 1);
        let y = rng.gen_range(1..MAP_TILES_Y - 1);
        if map.get(x, y) == ROAD && (x, y) != start {
            map.set(x, y, FLAG);
            placed += 1;
        }
    }
    Ok(map)
}

// ── Car ───────────────────────────────────────────────────────────────────────

/// The player's car. It drives on the map of the tile viewer that owns it.
pub struct Car {
    sprite: Sprite,
    round: Rc<Round>,
}

/// True if an 8x8 car at (`x`, `y`) would overlap a wall or leave the map.
fn blocked(viewer: &TileViewer, x: f32, y: f32) -> bool {
    if x < 0.0 || y < 0.0 {
        return true;
    }
    let (x0, y0) = (x as i32, y as i32);
    let (x1, y1) = (x0 + 7, y0 + 7);
    let limit_x = viewer.tile_to_pixel(viewer.tile_count_x());
    let limit_y = viewer.tile_to_pixel(viewer.tile_count_y());
    [(x0, y0), (x1, y0), (x0, y1), (x1, y1)]
        .into_iter()
        .any(|(px, py)| px >= limit_x || py >= limit_y || viewer.get_tile_value_at_pixel(px, py) == WALL)
}

impl Behavior<RallyMessage> for Car {
    fn update(&mut self, id: ObjectId, ctx: &mut UpdateContext<'_, RallyMessage>, elapsed: f32) {
        if self.round.state() != RoundState::Driving {
            return;
        }
        let dx = ctx.input.x * CAR_SPEED * elapsed;
        let dy = ctx.input.y * CAR_SPEED * elapsed;
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        let Some((x, y)) = ctx.objects.get(id).map(GameObject::exact_position) else {
            return;
        };
        let Some(viewer_id) = ctx.objects.owner(id) else {
            return;
        };
        let Some(viewer) = ctx.objects.behavior::<TileViewer>(viewer_id) else {
            return;
        };
        let nx = if dx != 0.0 && !blocked(viewer, x + dx, y) { x + dx } else { x };
        let ny = if dy != 0.0 && !blocked(viewer, nx, y + dy) { y + dy } else { y };
        if let Some(object) = ctx.objects.get_mut(id) {
            object.move_to(nx, ny);
        }
        self.sprite.animate(elapsed);

        let (cx, cy) = (nx as i32 + 4, ny as i32 + 4);
        let Some(viewer) = ctx.objects.behavior_mut::<TileViewer>(viewer_id) else {
            return;
        };
        if viewer.get_tile_value_at_pixel(cx, cy) == FLAG {
            viewer.set_tile_value_at_pixel(cx, cy, ROAD);
            let count = self.round.flags.get() + 1;
            self.round.flags.set(count);
            ctx.messages.publish(&RallyMessage::FlagCollected {
                tile_x: viewer.pixel_to_tile(cx),
                tile_y: viewer.pixel_to_tile(cy),
                count,
            });
        }
    }

    fn draw(&mut self, id: ObjectId, ctx: &mut DrawContext<'_, RallyMessage>) {
        if let Some((x, y)) = ctx.objects.world_position(id) {
            self.sprite.draw_at(ctx.surface, x, y);
        }
    }
}

// ── HUD ───────────────────────────────────────────────────────────────────────

pub struct Hud {
    round: Rc<Round>,
    font: Font,
    fuel_timer: TimerId,
    width: i32,
}

impl Behavior<RallyMessage> for Hud {
    fn update(&mut self, _id: ObjectId, ctx: &mut UpdateContext<'_, RallyMessage>, _elapsed: f32) {
        let ticks = ctx.timers.take_expirations(self.fuel_timer);
        if ticks == 0 || self.round.state() != RoundState::Driving {
            return;
        }
        let fuel = self.round.fuel.get().saturating_sub(ticks);
        self.round.fuel.set(fuel);
        if fuel == 0 {
            ctx.messages.publish(&RallyMessage::OutOfFuel);
        }
    }

    fn draw(&mut self, id: ObjectId, ctx: &mut DrawContext<'_, RallyMessage>) {
        let Some((x, y)) = ctx.objects.world_position(id) else {
            return;
        };
        let surface = &mut *ctx.surface;
        surface.fill_rect(Rect::new(x, y, self.width, HUD_HEIGHT), C_HUD);

        let fuel = self.round.fuel.get();
        let gauge = (self.width - 4) * fuel as i32 / START_FUEL as i32;
        let gauge_color = if fuel * 4 < START_FUEL { Color::RED } else { Color::GREEN };
        surface.fill_rect(Rect::new(x + 2, y + 2, self.width - 4, 4), C_HUD_DIM);
        surface.fill_rect(Rect::new(x + 2, y + 2, gauge, 4), gauge_color);

        let flags = self.round.flags.get();
        for i in 0..FLAG_COUNT {
            let color = if i < flags { Color::YELLOW } else { C_HUD_DIM };
            surface.fill_rect(Rect::new(x + 2 + i as i32 * 5, y + 9, 4, 4), color);
        }

        let score = self.round.score().to_string();
        let text_x = x + self.width - 2 - self.font.glyph_width * score.len() as i32;
        surface.draw_text(&score, &self.font, text_x, y + 8);

        let banner = match self.round.state() {
            RoundState::Driving => None,
            RoundState::Won => Some(Color::GREEN),
            RoundState::OutOfFuel => Some(Color::RED),
        };
        if let Some(color) = banner {
            surface.fill_rect(Rect::new(x + 56, y + 8, 8, 6), color);
        }
    }
}

// ── Scene ─────────────────────────────────────────────────────────────────────

/// The gameplay scene. Builds the maze, car and HUD on load and rebuilds
/// the maze when the player restarts with button one.
pub struct RallyScene {
    rng: StdRng,
    round: Rc<Round>,
    config: EngineConfig,
    subscribed: bool,
    fuel_timer: Option<TimerId>,
    popup_timer: Option<TimerId>,
    popup: Option<ObjectId>,
}

impl RallyScene {
    pub fn new(seed: u64, config: &EngineConfig) -> Self {
        RallyScene {
            rng: StdRng::seed_from_u64(seed),
            round: Rc::new(Round::new()),
            config: config.clone(),
            subscribed: false,
            fuel_timer: None,
            popup_timer: None,
            popup: None,
        }
    }

    pub fn round(&self) -> Rc<Round> {
        Rc::clone(&self.round)
    }

    fn subscribe(&mut self, ctx: &mut UpdateContext<'_, RallyMessage>) {
        if self.subscribed {
            return;
        }
        self.subscribed = true;

        let round = Rc::clone(&self.round);
        ctx.messages
            .subscribe(RallyMessageKind::FlagCollected, move |message, _| {
                if let RallyMessage::FlagCollected { tile_x, tile_y, count } = *message {
                    round.score.set(round.score.get() + FLAG_VALUE * count);
                    round.popup_at.set(Some((tile_x, tile_y)));
                    if count == FLAG_COUNT {
                        round.state.set(RoundState::Won);
                        info!(score = round.score.get(), "all flags collected");
                    }
                }
            });

        let round = Rc::clone(&self.round);
        ctx.messages.subscribe(RallyMessageKind::OutOfFuel, move |_, _| {
            round.state.set(RoundState::OutOfFuel);
            info!(score = round.score.get(), flags = round.flags.get(), "out of fuel");
        });
    }

    /// Build the maze, its viewer and everything on it under `root`.
    fn build_round(&mut self, root: ObjectId, ctx: &mut UpdateContext<'_, RallyMessage>) -> Result<()> {
        let assets = Assets::build();
        let map = generate_maze(&mut self.rng)?;

        let tiles = TileConfig {
            size_shift: TILE_SHIFT,
            ..self.config.tiles.clone()
        };
        let view_tiles_x = self.config.display.width as i32 >> TILE_SHIFT;
        let view_tiles_y = (self.config.display.height as i32 - HUD_HEIGHT) >> TILE_SHIFT;
        let mut viewer = TileViewer::new(
            Rc::clone(&assets.sheet),
            view_tiles_x,
            view_tiles_y,
            assets.tiles.clone(),
            map,
            &tiles,
        )?;

        let car = Car {
            sprite: Sprite::new(vec![AnimationSequence::new(
                Rc::clone(&assets.sheet),
                8,
                assets.car.clone(),
            )?])?,
            round: Rc::clone(&self.round),
        };
        let car_id = ctx.objects.insert(GameObject::at(CAR_START.0, CAR_START.1), Some(Box::new(car)));
        viewer.track_object(car_id, ctx.objects);

        let viewer_id = ctx
            .objects
            .spawn(root, GameObject::at(0.0, HUD_HEIGHT as f32), viewer)?;
        ctx.objects.set_owner(car_id, Some(viewer_id))?;

        let sparkle = AnimationSequence::with_options(
            Rc::clone(&assets.sheet),
            6,
            false,
            Iterations::Infinite,
            assets.sparkle.clone(),
        )?;
        let mut popup = GameObject::new();
        popup.set_visible(false);
        let popup_id = ctx.objects.insert(popup, Some(Box::new(Sprite::new(vec![sparkle])?)));
        ctx.objects.set_owner(popup_id, Some(viewer_id))?;

        let fuel_timer = match self.fuel_timer {
            Some(id) => id,
            None => {
                let id = ctx.timers.create(Duration::from_secs(1), true);
                self.fuel_timer = Some(id);
                id
            }
        };
        ctx.timers.start(fuel_timer);
        ctx.timers.take_expirations(fuel_timer);

        let hud = Hud {
            round: Rc::clone(&self.round),
            font: assets.font,
            fuel_timer,
            width: self.config.display.width as i32,
        };
        ctx.objects.spawn(root, GameObject::new(), hud)?;

        self.popup = Some(popup_id);
        debug!(objects = ctx.objects.len(), "round built");
        Ok(())
    }

    fn teardown_round(&mut self, ctx: &mut UpdateContext<'_, RallyMessage>, root: ObjectId) {
        let children = ctx.objects.children(root).to_vec();
        for child in children {
            ctx.objects.destroy(child);
        }
        self.popup = None;
    }
}

impl Behavior<RallyMessage> for RallyScene {
    fn load_content(&mut self, id: ObjectId, ctx: &mut UpdateContext<'_, RallyMessage>) -> Result<()> {
        self.subscribe(ctx);
        if self.popup_timer.is_none() {
            self.popup_timer = Some(ctx.timers.create(Duration::from_millis(1500), false));
        }
        self.round.restart();
        self.build_round(id, ctx)
    }

    fn update(&mut self, id: ObjectId, ctx: &mut UpdateContext<'_, RallyMessage>, _elapsed: f32) {
        if self.round.state() != RoundState::Driving && ctx.input.button(Button::One) {
            info!("restarting round");
            self.teardown_round(ctx, id);
            self.round.restart();
            if let Err(err) = self.build_round(id, ctx) {
                error!(%err, "failed to rebuild the round");
            }
            return;
        }

        let (Some(popup_id), Some(popup_timer)) = (self.popup, self.popup_timer) else {
            return;
        };
        if let Some((tile_x, tile_y)) = self.round.popup_at.take() {
            if let Some(popup) = ctx.objects.get_mut(popup_id) {
                popup.move_to((tile_x << TILE_SHIFT) as f32, (tile_y << TILE_SHIFT) as f32);
                popup.set_visible(true);
            }
            ctx.timers.start(popup_timer);
            ctx.timers.take_expirations(popup_timer);
        }
        if ctx.timers.take_expirations(popup_timer) > 0 {
            if let Some(popup) = ctx.objects.get_mut(popup_id) {
                popup.set_visible(false);
            }
        }
    }

    fn unload(&mut self, id: ObjectId, ctx: &mut UpdateContext<'_, RallyMessage>) {
        for timer in [self.fuel_timer.take(), self.popup_timer.take()].into_iter().flatten() {
            ctx.timers.remove(timer);
        }
        self.teardown_round(ctx, id);
    }
}
