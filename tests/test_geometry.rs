use arcade_engine::geometry::*;

// ── Rect ──────────────────────────────────────────────────────────────────────

#[test]
fn rect_edges() {
    let r = Rect::new(2, 3, 10, 5);
    assert_eq!(r.right(), 12);
    assert_eq!(r.bottom(), 8);
    assert!(!r.is_empty());
    assert!(Rect::new(0, 0, 0, 4).is_empty());
}

#[test]
fn rect_contains_is_half_open() {
    let r = Rect::new(0, 0, 4, 4);
    assert!(r.contains(0, 0));
    assert!(r.contains(3, 3));
    assert!(!r.contains(4, 0));
    assert!(!r.contains(0, 4));
    assert!(!r.contains(-1, 2));
}

#[test]
fn union_covers_both() {
    let u = Rect::union(Rect::new(0, 0, 2, 2), Rect::new(5, 6, 1, 1));
    assert_eq!(u, Rect::new(0, 0, 6, 7));
}

#[test]
fn intersect_overlap() {
    let a = Rect::new(0, 0, 10, 10);
    let b = Rect::new(5, -2, 10, 4);
    assert_eq!(a.intersect(&b), Some(Rect::new(5, 0, 5, 2)));
}

#[test]
fn intersect_disjoint_or_touching_is_none() {
    let a = Rect::new(0, 0, 4, 4);
    assert_eq!(a.intersect(&Rect::new(4, 0, 4, 4)), None);
    assert_eq!(a.intersect(&Rect::new(10, 10, 1, 1)), None);
}

// ── tile_extractor ────────────────────────────────────────────────────────────

#[test]
fn tile_extractor_row_major_without_border() {
    let rects = tile_extractor(0, 0, 8, 8, 3, 2, 0);
    assert_eq!(rects.len(), 6);
    assert_eq!(rects[0], Rect::new(0, 0, 8, 8));
    assert_eq!(rects[2], Rect::new(16, 0, 8, 8));
    assert_eq!(rects[3], Rect::new(0, 8, 8, 8));
    assert_eq!(rects[5], Rect::new(16, 8, 8, 8));
}

#[test]
fn tile_extractor_with_border_and_origin() {
    let rects = tile_extractor(10, 20, 16, 16, 2, 2, 1);
    assert_eq!(rects[0], Rect::new(11, 21, 16, 16));
    assert_eq!(rects[1], Rect::new(10 + 16 + 1 + 1, 21, 16, 16));
    assert_eq!(rects[2], Rect::new(11, 20 + 16 + 1 + 1, 16, 16));
}

#[test]
fn tile_extractor_empty_grid() {
    assert!(tile_extractor(0, 0, 8, 8, 0, 4, 0).is_empty());
}
