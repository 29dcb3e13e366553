//! Terminal backend for the drawing surface.
//!
//! The engine draws into an in-memory framebuffer; `flush` translates it
//! into terminal commands. Every character cell shows two vertically
//! stacked pixels using the upper-half-block glyph (foreground = top
//! pixel, background = bottom pixel), and only cells that changed since
//! the previous flush are re-sent.

use std::io::Write;

use crossterm::{
    cursor,
    style::{self, Print},
    QueueableCommand,
};
use tracing::trace;

use crate::error::Result;
use crate::geometry::Rect;
use crate::surface::{Bitmap, Color, Surface};

const HALF_BLOCK: char = '▀';

fn term_color(color: Color) -> style::Color {
    style::Color::Rgb {
        r: color.r(),
        g: color.g(),
        b: color.b(),
    }
}

pub struct TerminalSurface<W: Write> {
    out: W,
    frame: Bitmap,
    /// (top, bottom) pixel colours last sent for each cell.
    shown: Vec<Option<(Color, Color)>>,
    columns: u16,
    rows: u16,
    origin: (u16, u16),
}

impl<W: Write> TerminalSurface<W> {
    /// A `width` x `height` pixel surface drawn at the top-left of the
    /// terminal, taking `width` columns and `height / 2` rows (rounded up).
    pub fn new(out: W, width: u32, height: u32) -> Self {
        let columns = width.min(u16::MAX as u32) as u16;
        let rows = height.div_ceil(2).min(u16::MAX as u32) as u16;
        TerminalSurface {
            out,
            frame: Bitmap::new(columns as i32, height as i32),
            shown: vec![None; columns as usize * rows as usize],
            columns,
            rows,
            origin: (0, 0),
        }
    }

    /// Offset the picture by (`column`, `row`) terminal cells.
    pub fn with_origin(mut self, column: u16, row: u16) -> Self {
        self.origin = (column, row);
        self
    }

    /// Terminal size used, in (columns, rows).
    pub fn cell_size(&self) -> (u16, u16) {
        (self.columns, self.rows)
    }

    pub fn frame(&self) -> &Bitmap {
        &self.frame
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// Re-send every cell on the next flush, e.g. after the terminal was
    /// cleared behind our back.
    pub fn force_redraw(&mut self) {
        self.shown.fill(None);
    }

    fn cell(&self, column: u16, row: u16) -> (Color, Color) {
        let x = column as i32;
        let y = row as i32 * 2;
        let top = self.frame.pixel(x, y).unwrap_or(Color::BLACK);
        let bottom = self.frame.pixel(x, y + 1).unwrap_or(Color::BLACK);
        (top, bottom)
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn width(&self) -> i32 {
        self.frame.width()
    }

    fn height(&self) -> i32 {
        self.frame.height()
    }

    fn draw_image(&mut self, x: i32, y: i32, src: &Bitmap, src_rect: Rect) {
        self.frame.draw_image(x, y, src, src_rect);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.frame.fill_rect(rect, color);
    }

    fn set_clip(&mut self, rect: Rect) {
        self.frame.set_clip(rect);
    }

    fn clear_clip(&mut self) {
        self.frame.clear_clip();
    }

    fn flush(&mut self) -> Result<()> {
        let mut changed = 0usize;
        let mut cursor_at: Option<(u16, u16)> = None;
        let mut colors: Option<(Color, Color)> = None;

        for row in 0..self.rows {
            for column in 0..self.columns {
                let cell = self.cell(column, row);
                let index = row as usize * self.columns as usize + column as usize;
                if self.shown[index] == Some(cell) {
                    continue;
                }
                self.shown[index] = Some(cell);
                changed += 1;

                let target = (self.origin.0 + column, self.origin.1 + row);
                if cursor_at != Some(target) {
                    self.out.queue(cursor::MoveTo(target.0, target.1))?;
                }
                if colors != Some(cell) {
                    self.out.queue(style::SetForegroundColor(term_color(cell.0)))?;
                    self.out.queue(style::SetBackgroundColor(term_color(cell.1)))?;
                    colors = Some(cell);
                }
                self.out.queue(Print(HALF_BLOCK))?;
                cursor_at = Some((target.0 + 1, target.1));
            }
        }

        if changed > 0 {
            self.out.queue(style::ResetColor)?;
        }
        self.out.flush()?;
        trace!(changed, "terminal flushed");
        Ok(())
    }
}
