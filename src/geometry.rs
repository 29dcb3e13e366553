//! Integer rectangles and sprite-sheet slicing.

/// Location and size of a rectangular pixel region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Smallest rectangle covering both `a` and `b`.
    pub fn union(a: Rect, b: Rect) -> Rect {
        let x1 = a.x.min(b.x);
        let y1 = a.y.min(b.y);
        let x2 = a.right().max(b.right());
        let y2 = a.bottom().max(b.bottom());
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Overlapping region, or `None` when the rectangles are disjoint.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 > x1 && y2 > y1 {
            Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }
}

/// Slice a grid of equally sized images out of a sprite sheet.
///
/// Regions are returned row by row. `border` pixels separate neighbouring
/// images and also precede the first one on each axis.
pub fn tile_extractor(
    start_x: i32,
    start_y: i32,
    sprite_width: i32,
    sprite_height: i32,
    count_x: i32,
    count_y: i32,
    border: i32,
) -> Vec<Rect> {
    let mut rects = Vec::with_capacity((count_x.max(0) * count_y.max(0)) as usize);
    for y in 0..count_y {
        for x in 0..count_x {
            rects.push(Rect::new(
                start_x + x * sprite_width + border + border * x,
                start_y + y * sprite_height + border + border * y,
                sprite_width,
                sprite_height,
            ));
        }
    }
    rects
}
