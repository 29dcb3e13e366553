//! Drawing surfaces: the contract the engine renders through, and an
//! in-memory bitmap that implements it.

use std::rc::Rc;

use crate::error::Result;
use crate::geometry::Rect;

// ── Colour ────────────────────────────────────────────────────────────────────

/// Packed 24-bit RGB colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 200, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Color {
        Color(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn b(self) -> u8 {
        self.0 as u8
    }
}

// ── Surface contract ──────────────────────────────────────────────────────────

/// Anything the engine can render onto.
///
/// Coordinates outside the surface (or outside the active clip rectangle)
/// are silently discarded.
pub trait Surface {
    fn width(&self) -> i32;
    fn height(&self) -> i32;

    /// Copy `src_rect` of `src` so its top-left corner lands on `(x, y)`.
    /// Pixels matching the source's transparent key are skipped.
    fn draw_image(&mut self, x: i32, y: i32, src: &Bitmap, src_rect: Rect);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn draw_text(&mut self, text: &str, font: &Font, x: i32, y: i32) {
        let mut cx = x;
        let mut cy = y;
        for ch in text.chars() {
            if ch == '\n' {
                cx = x;
                cy += font.glyph_height;
                continue;
            }
            if let Some(glyph) = font.glyph(ch) {
                self.draw_image(cx, cy, &font.sheet, glyph);
            }
            cx += font.glyph_width;
        }
    }

    fn set_clip(&mut self, rect: Rect);
    fn clear_clip(&mut self);

    /// Present everything drawn since the previous flush.
    fn flush(&mut self) -> Result<()>;
}

// ── Bitmap ────────────────────────────────────────────────────────────────────

/// Row-major in-memory image. Doubles as an off-screen surface.
#[derive(Clone, Debug, PartialEq)]
pub struct Bitmap {
    width: i32,
    height: i32,
    pixels: Vec<Color>,
    transparent: Option<Color>,
    clip: Rect,
}

impl Bitmap {
    pub fn new(width: i32, height: i32) -> Self {
        Self::filled(width, height, Color::BLACK)
    }

    pub fn filled(width: i32, height: i32, color: Color) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Bitmap {
            width,
            height,
            pixels: vec![color; (width * height) as usize],
            transparent: None,
            clip: Rect::new(0, 0, width, height),
        }
    }

    /// Mark `color` as see-through when this bitmap is used as a blit source.
    pub fn with_transparent(mut self, color: Color) -> Self {
        self.transparent = Some(color);
        self
    }

    pub fn transparent(&self) -> Option<Color> {
        self.transparent
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn clip(&self) -> Rect {
        self.clip
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        if self.bounds().contains(x, y) {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    /// Write one pixel, ignoring the clip rectangle.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if self.bounds().contains(x, y) {
            self.pixels[(y * self.width + x) as usize] = color;
        }
    }

    pub fn clear(&mut self, color: Color) {
        self.pixels.fill(color);
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }
}

impl Surface for Bitmap {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn draw_image(&mut self, x: i32, y: i32, src: &Bitmap, src_rect: Rect) {
        // Clip the source region to the source image first, shifting the
        // destination by however much was trimmed off the top-left.
        let Some(source) = src_rect.intersect(&src.bounds()) else {
            return;
        };
        let dx = x + (source.x - src_rect.x);
        let dy = y + (source.y - src_rect.y);

        let dest = Rect::new(dx, dy, source.width, source.height);
        let Some(visible) = dest.intersect(&self.clip) else {
            return;
        };

        let sx0 = source.x + (visible.x - dx);
        let sy0 = source.y + (visible.y - dy);
        for row in 0..visible.height {
            let src_row = ((sy0 + row) * src.width) as usize;
            let dst_row = ((visible.y + row) * self.width) as usize;
            for col in 0..visible.width {
                let color = src.pixels[src_row + (sx0 + col) as usize];
                if Some(color) == src.transparent {
                    continue;
                }
                self.pixels[dst_row + (visible.x + col) as usize] = color;
            }
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(visible) = rect.intersect(&self.clip) else {
            return;
        };
        for y in visible.y..visible.bottom() {
            let start = (y * self.width + visible.x) as usize;
            self.pixels[start..start + visible.width as usize].fill(color);
        }
    }

    fn set_clip(&mut self, rect: Rect) {
        self.clip = rect
            .intersect(&self.bounds())
            .unwrap_or(Rect::new(0, 0, 0, 0));
    }

    fn clear_clip(&mut self) {
        self.clip = self.bounds();
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

// ── Font ──────────────────────────────────────────────────────────────────────

/// Monospaced bitmap font: glyphs laid out left to right, top to bottom on
/// a sheet, starting at `first_char`.
#[derive(Clone, Debug)]
pub struct Font {
    pub sheet: Rc<Bitmap>,
    pub glyph_width: i32,
    pub glyph_height: i32,
    pub first_char: char,
    pub glyphs_per_row: i32,
}

impl Font {
    pub fn new(sheet: Rc<Bitmap>, glyph_width: i32, glyph_height: i32, first_char: char) -> Self {
        let glyphs_per_row = (sheet.width / glyph_width.max(1)).max(1);
        Font {
            sheet,
            glyph_width,
            glyph_height,
            first_char,
            glyphs_per_row,
        }
    }

    /// Region of the sheet holding `ch`, if the sheet has one.
    pub fn glyph(&self, ch: char) -> Option<Rect> {
        let index = (ch as u32).checked_sub(self.first_char as u32)? as i32;
        let col = index % self.glyphs_per_row;
        let row = index / self.glyphs_per_row;
        let rect = Rect::new(
            col * self.glyph_width,
            row * self.glyph_height,
            self.glyph_width,
            self.glyph_height,
        );
        if rect.bottom() > self.sheet.height {
            return None;
        }
        Some(rect)
    }
}
