//! Scrolling tile-map renderer.
//!
//! A [`TileViewer`] shows a viewport onto a tile grid that can be much
//! larger than the screen. The visible tiles are composed into an
//! off-screen layer which is kept between frames: when the camera moves a
//! little, the layer is shifted into a second buffer and only the newly
//! exposed strips are painted; when it jumps, everything is repainted.
//! Tiles changed through [`TileViewer::set_tile_value`] are queued and
//! painted individually on the next draw.
//!
//! The viewer is also the owner of everything that moves on the map. Its
//! child offset always equals the negated camera offset, so children keep
//! positions in map pixels and are drawn in the right place on screen.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::config::TileConfig;
use crate::error::{EngineError, Result};
use crate::geometry::Rect;
use crate::messaging::Message;
use crate::object::{Behavior, DrawContext, ObjectGraph, ObjectId, UpdateContext};
use crate::surface::{Bitmap, Color, Surface};

/// Index into the viewer's tile table.
pub type TileId = i16;

/// Grid value for cells that are never painted.
pub const NO_DRAW: TileId = -1;

// ── TileMap ───────────────────────────────────────────────────────────────────

/// Rectangular grid of tile ids, stored row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileMap {
    width: i32,
    height: i32,
    cells: Vec<TileId>,
}

impl TileMap {
    pub fn new(width: i32, height: i32, fill: TileId) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(EngineError::InvalidTileMap {
                reason: format!("{width}x{height} map has no cells"),
            });
        }
        Ok(TileMap {
            width,
            height,
            cells: vec![fill; (width * height) as usize],
        })
    }

    /// Build a map from rows of equal length.
    pub fn from_rows(rows: Vec<Vec<TileId>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if height == 0 || width == 0 {
            return Err(EngineError::InvalidTileMap {
                reason: "map has no cells".to_string(),
            });
        }
        if let Some(row) = rows.iter().position(|row| row.len() != width) {
            return Err(EngineError::InvalidTileMap {
                reason: format!("row {row} has {} cells, expected {width}", rows[row].len()),
            });
        }
        Ok(TileMap {
            width: width as i32,
            height: height as i32,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> usize {
        assert!(
            x >= 0 && x < self.width && y >= 0 && y < self.height,
            "tile ({x}, {y}) outside {}x{} map",
            self.width,
            self.height
        );
        (y * self.width + x) as usize
    }

    /// Panics if (`x`, `y`) is outside the map.
    pub fn get(&self, x: i32, y: i32) -> TileId {
        self.cells[self.index(x, y)]
    }

    pub fn set(&mut self, x: i32, y: i32, tile: TileId) {
        let index = self.index(x, y);
        self.cells[index] = tile;
    }

    pub fn cells(&self) -> &[TileId] {
        &self.cells
    }
}

// ── Repaint bookkeeping ───────────────────────────────────────────────────────

/// A changed tile waiting to be painted on the next draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileEntry {
    pub tile_x: i32,
    pub tile_y: i32,
    pub tile: TileId,
}

/// How the layer was brought up to date on the most recent draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepaintKind {
    /// Nothing has been drawn yet, or the camera did not move.
    None,
    Full,
    /// The layer was shifted by the camera delta and the exposed edges painted.
    Incremental { dx: i32, dy: i32 },
}

type ScrolledListener = Box<dyn FnMut(f32, f32)>;

// ── TileViewer ────────────────────────────────────────────────────────────────

pub struct TileViewer {
    tile_sheet: Rc<Bitmap>,
    tiles: Vec<Rect>,
    map: TileMap,

    shift: u32,
    view_tiles_x: i32,
    view_tiles_y: i32,
    view_width: i32,
    view_height: i32,
    x_limit: f32,
    y_limit: f32,

    offset_x: f32,
    offset_y: f32,
    prev_offset_x: i32,
    prev_offset_y: i32,

    /// Scroll velocity in pixels per second, consumed by the next update.
    scroll_x: f32,
    scroll_y: f32,
    tracked: Option<ObjectId>,

    full_refresh: bool,
    repaints: Vec<TileEntry>,
    repaint_capacity: usize,
    last_repaint: RepaintKind,
    background: Color,

    layer: Bitmap,
    back_buffer: Bitmap,

    scrolled_listeners: Vec<ScrolledListener>,
}

impl TileViewer {
    /// Viewer with a viewport of `view_tiles_x` by `view_tiles_y` tiles.
    ///
    /// `tiles` maps each tile id to its region on `tile_sheet`; every id in
    /// `map` must either index it or be [`NO_DRAW`].
    pub fn new(
        tile_sheet: Rc<Bitmap>,
        view_tiles_x: i32,
        view_tiles_y: i32,
        tiles: Vec<Rect>,
        map: TileMap,
        config: &TileConfig,
    ) -> Result<Self> {
        config.validate()?;
        if view_tiles_x <= 0 || view_tiles_y <= 0 {
            return Err(EngineError::InvalidTileMap {
                reason: format!("viewport of {view_tiles_x}x{view_tiles_y} tiles is empty"),
            });
        }
        if let Some(&bad) = map
            .cells()
            .iter()
            .find(|&&tile| tile != NO_DRAW && (tile < 0 || tile as usize >= tiles.len()))
        {
            return Err(EngineError::InvalidTileMap {
                reason: format!("tile id {bad} has no region ({} defined)", tiles.len()),
            });
        }

        let shift = config.size_shift;
        let view_width = view_tiles_x << shift;
        let view_height = view_tiles_y << shift;
        let x_limit = ((map.width() << shift) - view_width).max(0) as f32;
        let y_limit = ((map.height() << shift) - view_height).max(0) as f32;
        debug!(
            map_width = map.width(),
            map_height = map.height(),
            view_width,
            view_height,
            "tile viewer created"
        );

        Ok(TileViewer {
            tile_sheet,
            tiles,
            map,
            shift,
            view_tiles_x,
            view_tiles_y,
            view_width,
            view_height,
            x_limit,
            y_limit,
            offset_x: 0.0,
            offset_y: 0.0,
            prev_offset_x: 0,
            prev_offset_y: 0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            tracked: None,
            full_refresh: true,
            repaints: Vec::with_capacity(config.repaint_capacity),
            repaint_capacity: config.repaint_capacity,
            last_repaint: RepaintKind::None,
            background: Color::BLACK,
            layer: Bitmap::new(view_width, view_height),
            back_buffer: Bitmap::new(view_width, view_height),
            scrolled_listeners: Vec::new(),
        })
    }

    /// Colour painted under tiles, and where a cell is [`NO_DRAW`].
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    pub fn tile_count_x(&self) -> i32 {
        self.map.width()
    }

    pub fn tile_count_y(&self) -> i32 {
        self.map.height()
    }

    pub fn view_tiles(&self) -> (i32, i32) {
        (self.view_tiles_x, self.view_tiles_y)
    }

    pub fn view_width(&self) -> i32 {
        self.view_width
    }

    pub fn view_height(&self) -> i32 {
        self.view_height
    }

    pub fn tile_size(&self) -> i32 {
        1 << self.shift
    }

    /// Camera position in map pixels.
    pub fn offset(&self) -> (f32, f32) {
        (self.offset_x, self.offset_y)
    }

    /// Largest camera offset on each axis.
    pub fn offset_limits(&self) -> (f32, f32) {
        (self.x_limit, self.y_limit)
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    /// The composed viewport as of the last draw.
    pub fn layer(&self) -> &Bitmap {
        &self.layer
    }

    pub fn last_repaint(&self) -> RepaintKind {
        self.last_repaint
    }

    /// Tiles queued for repaint on the next draw.
    pub fn pending_repaints(&self) -> &[TileEntry] {
        &self.repaints
    }

    pub fn tracked(&self) -> Option<ObjectId> {
        self.tracked
    }

    pub fn on_view_scrolled<F>(&mut self, listener: F)
    where
        F: FnMut(f32, f32) + 'static,
    {
        self.scrolled_listeners.push(Box::new(listener));
    }

    pub fn pixel_to_tile(&self, pixel: i32) -> i32 {
        pixel >> self.shift
    }

    pub fn tile_to_pixel(&self, tile: i32) -> i32 {
        tile << self.shift
    }

    // ── Camera ────────────────────────────────────────────────────────────────

    /// Keep the camera centred on `target` (its position within the map)
    /// from now on, starting immediately.
    pub fn track_object<M: Message>(&mut self, target: ObjectId, objects: &ObjectGraph<M>) {
        self.tracked = Some(target);
        if let Some(object) = objects.get(target) {
            self.center_on_pixel(object.x(), object.y());
        }
    }

    pub fn stop_tracking(&mut self) {
        self.tracked = None;
    }

    /// Scroll at (`vx`, `vy`) pixels per second for the next update only.
    pub fn scroll_by(&mut self, vx: f32, vy: f32) {
        self.scroll_x = vx;
        self.scroll_y = vy;
    }

    fn centered_offset(&self, x: i32, y: i32) -> (f32, f32) {
        let half_x = (self.view_tiles_x >> 1) << self.shift;
        let half_y = (self.view_tiles_y >> 1) << self.shift;
        (
            ((x - half_x) as f32).clamp(0.0, self.x_limit),
            ((y - half_y) as f32).clamp(0.0, self.y_limit),
        )
    }

    /// Jump the camera so map pixel (`x`, `y`) sits mid-viewport, as far
    /// as the map edges allow. Forces a full repaint.
    pub fn center_on_pixel(&mut self, x: i32, y: i32) {
        let (ox, oy) = self.centered_offset(x, y);
        self.offset_x = ox;
        self.offset_y = oy;
        self.full_refresh = true;
        debug!(x, y, offset_x = ox, offset_y = oy, "camera centred");
    }

    pub fn center_on_tile(&mut self, tile_x: i32, tile_y: i32) {
        self.center_on_pixel(tile_x << self.shift, tile_y << self.shift);
    }

    /// Move the camera by (`dx`, `dy`), clamped to the map. Returns the
    /// distance actually moved.
    fn scroll_clamped(&mut self, dx: f32, dy: f32) -> (f32, f32) {
        let before = (self.offset_x, self.offset_y);
        if dx != 0.0 {
            self.offset_x = (self.offset_x + dx).clamp(0.0, self.x_limit);
        }
        if dy != 0.0 {
            self.offset_y = (self.offset_y + dy).clamp(0.0, self.y_limit);
        }
        (self.offset_x - before.0, self.offset_y - before.1)
    }

    // ── Tiles ─────────────────────────────────────────────────────────────────

    pub fn get_tile_value(&self, tile_x: i32, tile_y: i32) -> TileId {
        self.map.get(tile_x, tile_y)
    }

    pub fn get_tile_value_at_pixel(&self, x: i32, y: i32) -> TileId {
        self.map.get(x >> self.shift, y >> self.shift)
    }

    /// Change a cell and queue it for repaint. The map always changes; the
    /// repaint is dropped if the queue is already full, leaving the old
    /// pixels on screen until that part of the map is repainted anyway.
    pub fn set_tile_value(&mut self, tile_x: i32, tile_y: i32, tile: TileId) {
        self.map.set(tile_x, tile_y, tile);
        if self.repaints.len() < self.repaint_capacity {
            self.repaints.push(TileEntry { tile_x, tile_y, tile });
        } else {
            warn!(tile_x, tile_y, tile, capacity = self.repaint_capacity, "repaint queue full, dropping tile");
        }
    }

    pub fn set_tile_value_at_pixel(&mut self, x: i32, y: i32, tile: TileId) {
        self.set_tile_value(x >> self.shift, y >> self.shift, tile);
    }

    // ── Composition ───────────────────────────────────────────────────────────

    /// Paint every tile overlapping layer pixels `[x0, x1) x [y0, y1)` for
    /// camera offset (`ox`, `oy`). Nothing outside that region is touched.
    fn paint_region(&mut self, ox: i32, oy: i32, x0: i32, y0: i32, x1: i32, y1: i32) {
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let region = Rect::new(x0, y0, x1 - x0, y1 - y0);
        self.layer.set_clip(region);
        self.layer.fill_rect(region, self.background);

        let first_x = ((ox + x0) >> self.shift).max(0);
        let last_x = ((ox + x1 - 1) >> self.shift).min(self.map.width() - 1);
        let first_y = ((oy + y0) >> self.shift).max(0);
        let last_y = ((oy + y1 - 1) >> self.shift).min(self.map.height() - 1);
        for tile_y in first_y..=last_y {
            let y = (tile_y << self.shift) - oy;
            for tile_x in first_x..=last_x {
                let tile = self.map.get(tile_x, tile_y);
                if tile == NO_DRAW {
                    continue;
                }
                let x = (tile_x << self.shift) - ox;
                self.layer
                    .draw_image(x, y, &self.tile_sheet, self.tiles[tile as usize]);
            }
        }
        self.layer.clear_clip();
    }

    /// Bring the layer up to date with the camera and the repaint queue.
    pub fn compose(&mut self) -> RepaintKind {
        let ox = self.offset_x as i32;
        let oy = self.offset_y as i32;
        let dx = ox - self.prev_offset_x;
        let dy = oy - self.prev_offset_y;
        let adx = dx.abs();
        let ady = dy.abs();

        let scroll_max = 2 * self.tile_size() - 1;
        if adx > scroll_max || ady > scroll_max || adx >= self.view_width || ady >= self.view_height {
            self.full_refresh = true;
        }

        let kind = if self.full_refresh {
            debug!(ox, oy, "full tile repaint");
            self.paint_region(ox, oy, 0, 0, self.view_width, self.view_height);
            self.full_refresh = false;
            RepaintKind::Full
        } else if dx != 0 || dy != 0 {
            trace!(dx, dy, "incremental tile repaint");
            self.back_buffer.draw_image(
                if dx < 0 { adx } else { 0 },
                if dy < 0 { ady } else { 0 },
                &self.layer,
                Rect::new(
                    if dx > 0 { adx } else { 0 },
                    if dy > 0 { ady } else { 0 },
                    self.view_width - adx,
                    self.view_height - ady,
                ),
            );
            std::mem::swap(&mut self.layer, &mut self.back_buffer);

            let (w, h) = (self.view_width, self.view_height);
            if dx > 0 {
                self.paint_region(ox, oy, w - adx, 0, w, h);
            } else if dx < 0 {
                self.paint_region(ox, oy, 0, 0, adx, h);
            }
            if dy > 0 {
                self.paint_region(ox, oy, 0, h - ady, w, h);
            } else if dy < 0 {
                self.paint_region(ox, oy, 0, 0, w, ady);
            }
            RepaintKind::Incremental { dx, dy }
        } else {
            RepaintKind::None
        };

        let repaints = std::mem::take(&mut self.repaints);
        let size = self.tile_size();
        for entry in &repaints {
            let x = (entry.tile_x << self.shift) - ox;
            let y = (entry.tile_y << self.shift) - oy;
            self.layer.fill_rect(Rect::new(x, y, size, size), self.background);
            if entry.tile != NO_DRAW {
                self.layer
                    .draw_image(x, y, &self.tile_sheet, self.tiles[entry.tile as usize]);
            }
        }
        // Hand the allocation back so the queue never reallocates.
        self.repaints = repaints;
        self.repaints.clear();

        self.prev_offset_x = ox;
        self.prev_offset_y = oy;
        self.last_repaint = kind;
        kind
    }
}

impl<M: Message> Behavior<M> for TileViewer {
    fn update(&mut self, id: ObjectId, ctx: &mut UpdateContext<'_, M>, elapsed: f32) {
        let (want_x, want_y) = match self.tracked {
            Some(target) => match ctx.objects.get(target) {
                Some(object) => {
                    let (tx, ty) = self.centered_offset(object.x(), object.y());
                    (tx - self.offset_x, ty - self.offset_y)
                }
                None => {
                    warn!(?target, "tracked object is gone, camera stops tracking");
                    self.tracked = None;
                    (0.0, 0.0)
                }
            },
            None => {
                let step = (self.scroll_x * elapsed, self.scroll_y * elapsed);
                self.scroll_x = 0.0;
                self.scroll_y = 0.0;
                step
            }
        };

        let (dx, dy) = self.scroll_clamped(want_x, want_y);
        if let Some(object) = ctx.objects.get_mut(id) {
            object.set_child_offset(-self.offset_x, -self.offset_y);
        }
        if dx != 0.0 || dy != 0.0 {
            for listener in &mut self.scrolled_listeners {
                listener(dx, dy);
            }
        }
    }

    fn draw(&mut self, id: ObjectId, ctx: &mut DrawContext<'_, M>) {
        self.compose();
        let ox = self.offset_x as i32;
        let oy = self.offset_y as i32;
        if let Some(object) = ctx.objects.get_mut(id) {
            object.set_child_offset(-ox as f32, -oy as f32);
        }

        let Some((x, y)) = ctx.objects.world_position(id) else {
            return;
        };
        let view = Rect::new(0, 0, self.view_width, self.view_height);
        ctx.surface.draw_image(x, y, &self.layer, view);
        ctx.surface
            .set_clip(Rect::new(x, y, self.view_width, self.view_height));
    }

    fn end_draw(&mut self, _id: ObjectId, ctx: &mut DrawContext<'_, M>) {
        ctx.surface.clear_clip();
    }
}

impl fmt::Debug for TileViewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileViewer")
            .field("map", &(self.map.width(), self.map.height()))
            .field("view", &(self.view_width, self.view_height))
            .field("offset", &(self.offset_x, self.offset_y))
            .field("tracked", &self.tracked)
            .field("pending_repaints", &self.repaints.len())
            .finish()
    }
}
