use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use arcade_engine::config::TileConfig;
use arcade_engine::error::EngineError;
use arcade_engine::geometry::{tile_extractor, Rect};
use arcade_engine::input::InputState;
use arcade_engine::messaging::MessageBus;
use arcade_engine::object::*;
use arcade_engine::surface::{Bitmap, Color, Surface};
use arcade_engine::tile_viewer::*;
use arcade_engine::timer::TimerRegistry;

const TILE_COUNT: i32 = 4;

/// 4x4 pixel tiles (shift 2), queue of 10.
fn config() -> TileConfig {
    TileConfig {
        size_shift: 2,
        repaint_capacity: 10,
    }
}

/// Every pixel of every tile is unique, so any misplaced blit shows up.
fn sheet() -> Rc<Bitmap> {
    let mut bmp = Bitmap::new(TILE_COUNT * 4, 4);
    for tile in 0..TILE_COUNT {
        for y in 0..4 {
            for x in 0..4 {
                bmp.set_pixel(tile * 4 + x, y, Color::rgb(tile as u8 + 1, x as u8 + 10, y as u8 + 20));
            }
        }
    }
    Rc::new(bmp)
}

fn tiles() -> Vec<Rect> {
    tile_extractor(0, 0, 4, 4, TILE_COUNT, 1, 0)
}

fn random_map(rng: &mut StdRng, width: i32, height: i32) -> TileMap {
    let mut map = TileMap::new(width, height, 0).unwrap();
    for y in 0..height {
        for x in 0..width {
            let tile = rng.gen_range(-1..TILE_COUNT) as TileId;
            map.set(x, y, tile);
        }
    }
    map
}

/// A 6x5-tile viewport onto a 20x15 map: 24x20 pixels over 80x60.
fn viewer(map: TileMap) -> TileViewer {
    TileViewer::new(sheet(), 6, 5, tiles(), map, &config())
        .unwrap()
        .with_background(Color::rgb(9, 9, 9))
}

fn tick(graph: &mut ObjectGraph<()>, id: ObjectId, elapsed: f32) {
    let mut messages = MessageBus::new();
    let mut timers = TimerRegistry::new();
    let mut ctx = UpdateContext {
        objects: graph,
        messages: &mut messages,
        timers: &mut timers,
        input: InputState::default(),
    };
    update_tree(id, &mut ctx, elapsed);
}

fn view(graph: &mut ObjectGraph<()>, id: ObjectId) -> &mut TileViewer {
    graph.behavior_mut::<TileViewer>(id).unwrap()
}

// ── TileMap ───────────────────────────────────────────────────────────────────

#[test]
fn tile_map_from_rows() {
    let map = TileMap::from_rows(vec![vec![0, 1, 2], vec![3, -1, 0]]).unwrap();
    assert_eq!((map.width(), map.height()), (3, 2));
    assert_eq!(map.get(1, 1), NO_DRAW);
    assert_eq!(map.get(2, 0), 2);
}

#[test]
fn tile_map_rejects_ragged_and_empty() {
    assert!(matches!(
        TileMap::from_rows(vec![vec![0, 1], vec![0]]),
        Err(EngineError::InvalidTileMap { .. })
    ));
    assert!(TileMap::from_rows(Vec::new()).is_err());
    assert!(TileMap::new(0, 4, 0).is_err());
}

#[test]
#[should_panic]
fn tile_map_get_out_of_range_panics() {
    TileMap::new(2, 2, 0).unwrap().get(2, 0);
}

// ── Construction ──────────────────────────────────────────────────────────────

#[test]
fn viewer_dimensions_and_limits() {
    let v = viewer(TileMap::new(20, 15, 0).unwrap());
    assert_eq!(v.tile_size(), 4);
    assert_eq!((v.view_width(), v.view_height()), (24, 20));
    assert_eq!((v.tile_count_x(), v.tile_count_y()), (20, 15));
    assert_eq!(v.offset_limits(), (56.0, 40.0));
    assert_eq!(v.pixel_to_tile(13), 3);
    assert_eq!(v.tile_to_pixel(3), 12);
}

#[test]
fn map_smaller_than_viewport_has_zero_limits() {
    let v = viewer(TileMap::new(3, 2, 0).unwrap());
    assert_eq!(v.offset_limits(), (0.0, 0.0));
}

#[test]
fn unknown_tile_id_is_rejected() {
    let map = TileMap::new(4, 4, TILE_COUNT as TileId).unwrap();
    let err = TileViewer::new(sheet(), 2, 2, tiles(), map, &config()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTileMap { .. }));
}

#[test]
fn bad_tile_shift_is_rejected() {
    let bad = TileConfig {
        size_shift: 0,
        repaint_capacity: 10,
    };
    let err = TileViewer::new(sheet(), 2, 2, tiles(), TileMap::new(4, 4, 0).unwrap(), &bad).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTileSize(0)));
}

#[test]
fn empty_viewport_is_rejected() {
    let map = TileMap::new(4, 4, 0).unwrap();
    assert!(TileViewer::new(sheet(), 0, 2, tiles(), map, &config()).is_err());
}

// ── Tile values and the repaint queue ─────────────────────────────────────────

#[test]
fn set_tile_value_at_pixel_addresses_containing_tile() {
    let mut v = viewer(TileMap::new(20, 15, 0).unwrap());
    v.set_tile_value_at_pixel(13, 9, 2);
    assert_eq!(v.get_tile_value(3, 2), 2);
    assert_eq!(v.get_tile_value_at_pixel(12, 8), 2);
    assert_eq!(v.pending_repaints(), &[TileEntry { tile_x: 3, tile_y: 2, tile: 2 }]);
}

#[test]
fn repaint_queue_drops_overflow_but_map_keeps_every_change() {
    let mut v = viewer(TileMap::new(20, 15, 0).unwrap());
    for i in 0..12 {
        v.set_tile_value(i, 0, 3);
    }
    assert_eq!(v.pending_repaints().len(), 10);
    assert!((0..12).all(|i| v.get_tile_value(i, 0) == 3));

    v.compose();
    assert!(v.pending_repaints().is_empty());
}

#[test]
fn queued_tile_is_painted_on_next_compose() {
    let mut v = viewer(TileMap::new(20, 15, 0).unwrap());
    assert_eq!(v.compose(), RepaintKind::Full);
    assert_eq!(v.compose(), RepaintKind::None);

    v.set_tile_value(1, 1, 2);
    v.compose();
    assert_eq!(v.layer().pixel(4, 4), Some(Color::rgb(3, 10, 20)));
    v.set_tile_value(1, 1, NO_DRAW);
    v.compose();
    assert_eq!(v.layer().pixel(4, 4), Some(Color::rgb(9, 9, 9)));
}

// ── Camera ────────────────────────────────────────────────────────────────────

#[test]
fn center_on_pixel_clamps_to_map() {
    let mut v = viewer(TileMap::new(20, 15, 0).unwrap());
    v.center_on_pixel(40, 30);
    // Half the viewport is 3x2 tiles, i.e. 12x8 pixels.
    assert_eq!(v.offset(), (28.0, 22.0));
    v.center_on_pixel(0, 0);
    assert_eq!(v.offset(), (0.0, 0.0));
    v.center_on_pixel(1000, 1000);
    assert_eq!(v.offset(), (56.0, 40.0));
    v.center_on_tile(10, 7);
    assert_eq!(v.offset(), (28.0, 20.0));
}

#[test]
fn camera_never_leaves_map() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut v = viewer(TileMap::new(20, 15, 0).unwrap());
    let (lx, ly) = v.offset_limits();
    for _ in 0..200 {
        v.center_on_pixel(rng.gen_range(-100..200), rng.gen_range(-100..200));
        let (ox, oy) = v.offset();
        assert!((0.0..=lx).contains(&ox) && (0.0..=ly).contains(&oy));
    }
}

#[test]
fn scroll_by_applies_for_one_update() {
    let mut graph = ObjectGraph::<()>::new();
    let id = graph.add(viewer(TileMap::new(20, 15, 0).unwrap()));
    view(&mut graph, id).scroll_by(10.0, 20.0);
    tick(&mut graph, id, 0.5);
    assert_eq!(view(&mut graph, id).offset(), (5.0, 10.0));
    assert_eq!(graph.get(id).unwrap().child_offset(), (-5.0, -10.0));

    tick(&mut graph, id, 0.5);
    assert_eq!(view(&mut graph, id).offset(), (5.0, 10.0));

    view(&mut graph, id).scroll_by(-100.0, 0.0);
    tick(&mut graph, id, 1.0);
    assert_eq!(view(&mut graph, id).offset(), (0.0, 10.0));
}

#[test]
fn scrolled_listener_reports_clamped_delta() {
    let mut graph = ObjectGraph::<()>::new();
    let mut v = viewer(TileMap::new(20, 15, 0).unwrap());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    v.on_view_scrolled(move |dx, dy| s.borrow_mut().push((dx, dy)));
    let id = graph.add(v);

    view(&mut graph, id).scroll_by(-3.0, 6.0);
    tick(&mut graph, id, 1.0);
    tick(&mut graph, id, 1.0);
    assert_eq!(*seen.borrow(), vec![(0.0, 6.0)]);
}

#[test]
fn tracking_keeps_target_centred() {
    let mut graph = ObjectGraph::<()>::new();
    let car = graph.insert(GameObject::at(40.0, 30.0), None);
    let mut v = viewer(TileMap::new(20, 15, 0).unwrap());
    v.track_object(car, &graph);
    assert_eq!(v.offset(), (28.0, 22.0));
    let id = graph.add(v);
    graph.set_owner(car, Some(id)).unwrap();

    graph.get_mut(car).unwrap().move_by(3.0, -5.0);
    tick(&mut graph, id, 0.1);
    assert_eq!(view(&mut graph, id).offset(), (31.0, 17.0));
    // The car sits mid-viewport on screen.
    assert_eq!(graph.world_position(car), Some((12, 8)));

    graph.get_mut(car).unwrap().move_to(79.0, 59.0);
    tick(&mut graph, id, 0.1);
    assert_eq!(view(&mut graph, id).offset(), (56.0, 40.0));
}

#[test]
fn tracking_stops_when_target_destroyed() {
    let mut graph = ObjectGraph::<()>::new();
    let car = graph.insert(GameObject::at(40.0, 30.0), None);
    let mut v = viewer(TileMap::new(20, 15, 0).unwrap());
    v.track_object(car, &graph);
    let id = graph.add(v);
    graph.destroy(car);
    tick(&mut graph, id, 0.1);
    assert_eq!(view(&mut graph, id).tracked(), None);
    assert_eq!(view(&mut graph, id).offset(), (28.0, 22.0));
}

// ── Composition ───────────────────────────────────────────────────────────────

#[test]
fn first_compose_is_full_and_matches_map() {
    let mut rng = StdRng::seed_from_u64(1);
    let map = random_map(&mut rng, 20, 15);
    let mut v = viewer(map.clone());
    assert_eq!(v.compose(), RepaintKind::Full);
    for ty in 0..5 {
        for tx in 0..6 {
            let expected = match map.get(tx, ty) {
                NO_DRAW => Color::rgb(9, 9, 9),
                tile => Color::rgb(tile as u8 + 1, 10, 20),
            };
            assert_eq!(v.layer().pixel(tx * 4, ty * 4), Some(expected));
        }
    }
}

#[test]
fn small_moves_repaint_incrementally_large_moves_fully() {
    let mut graph = ObjectGraph::<()>::new();
    let id = graph.add(viewer(TileMap::new(20, 15, 0).unwrap()));
    view(&mut graph, id).compose();

    view(&mut graph, id).scroll_by(7.0, 0.0);
    tick(&mut graph, id, 1.0);
    assert_eq!(view(&mut graph, id).compose(), RepaintKind::Incremental { dx: 7, dy: 0 });

    view(&mut graph, id).scroll_by(-2.0, 3.0);
    tick(&mut graph, id, 1.0);
    assert_eq!(view(&mut graph, id).compose(), RepaintKind::Incremental { dx: -2, dy: 3 });

    view(&mut graph, id).scroll_by(8.0, 0.0);
    tick(&mut graph, id, 1.0);
    assert_eq!(view(&mut graph, id).compose(), RepaintKind::Full);

    view(&mut graph, id).center_on_pixel(30, 30);
    assert_eq!(view(&mut graph, id).compose(), RepaintKind::Full);
    assert_eq!(view(&mut graph, id).last_repaint(), RepaintKind::Full);
}

#[test]
fn incremental_layer_matches_full_repaint() {
    let mut rng = StdRng::seed_from_u64(42);
    let map = random_map(&mut rng, 20, 15);

    let mut graph = ObjectGraph::<()>::new();
    let id = graph.add(viewer(map));
    view(&mut graph, id).compose();

    for step in 0..60 {
        let vx = rng.gen_range(-7..=7) as f32;
        let vy = rng.gen_range(-7..=7) as f32;
        view(&mut graph, id).scroll_by(vx, vy);
        tick(&mut graph, id, 1.0);
        if step % 5 == 0 {
            let (tx, ty) = (rng.gen_range(0..20), rng.gen_range(0..15));
            let tile = rng.gen_range(-1..TILE_COUNT) as TileId;
            view(&mut graph, id).set_tile_value(tx, ty, tile);
        }
        let kind = view(&mut graph, id).compose();
        assert!(!matches!(kind, RepaintKind::Full), "step {step}");
    }

    let scrolled = view(&mut graph, id);
    let (ox, oy) = scrolled.offset();
    let mut fresh = viewer(scrolled.map().clone());
    fresh.center_on_pixel(ox as i32 + 12, oy as i32 + 8);
    assert_eq!(fresh.offset(), (ox, oy));
    fresh.compose();

    let scrolled = view(&mut graph, id);
    assert_eq!(scrolled.layer().pixels(), fresh.layer().pixels());
}

#[test]
fn draw_blits_layer_and_offsets_children() {
    let mut graph = ObjectGraph::<()>::new();
    let map = TileMap::new(20, 15, 1).unwrap();
    let root = graph.insert(GameObject::at(2.0, 3.0), None);
    let id = graph.spawn(root, GameObject::at(10.0, 0.0), viewer(map)).unwrap();
    let child = graph.insert(GameObject::at(20.0, 20.0), None);
    graph.set_owner(child, Some(id)).unwrap();
    view(&mut graph, id).center_on_pixel(24, 18);
    assert_eq!(view(&mut graph, id).offset(), (12.0, 10.0));

    let mut surface = Bitmap::new(64, 64);
    let mut ctx = DrawContext {
        objects: &mut graph,
        surface: &mut surface,
    };
    draw_tree(root, &mut ctx);

    // Viewport lands at (12, 3); its first pixel is map pixel (12, 10).
    assert_eq!(surface.pixel(12, 3), Some(Color::rgb(2, 10, 22)));
    assert_eq!(surface.pixel(11, 3), Some(Color::BLACK));
    assert_eq!(surface.pixel(12 + 24, 3), Some(Color::BLACK));
    assert_eq!(graph.world_position(child), Some((12 + 20 - 12, 3 + 20 - 10)));
    // end_draw released the viewport clip.
    assert_eq!(surface.clip(), surface.bounds());
    assert_eq!(surface.width(), 64);
}
