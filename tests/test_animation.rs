use std::cell::RefCell;
use std::rc::Rc;

use arcade_engine::animation::*;
use arcade_engine::error::EngineError;
use arcade_engine::geometry::{tile_extractor, Rect};
use arcade_engine::surface::{Bitmap, Color, Surface};

/// A strip of `n` 2x2 frames, frame i filled with colour i + 1.
fn strip(n: i32) -> (Rc<Bitmap>, Vec<Rect>) {
    let mut sheet = Bitmap::new(n * 2, 2);
    for i in 0..n {
        sheet.fill_rect(Rect::new(i * 2, 0, 2, 2), Color(i as u32 + 1));
    }
    (Rc::new(sheet), tile_extractor(0, 0, 2, 2, n, 1, 0))
}

fn sequence(n: i32, fps: u32, auto_reverse: bool, iterations: Iterations) -> AnimationSequence {
    let (sheet, frames) = strip(n);
    AnimationSequence::with_options(sheet, fps, auto_reverse, iterations, frames).unwrap()
}

fn frames_visited(seq: &mut AnimationSequence, steps: usize) -> Vec<usize> {
    (0..steps).map(|_| seq.step().current).collect()
}

// ── Construction ──────────────────────────────────────────────────────────────

#[test]
fn empty_frames_are_rejected() {
    let (sheet, _) = strip(1);
    let err = AnimationSequence::new(sheet, 10, Vec::new()).unwrap_err();
    assert!(matches!(err, EngineError::EmptyAnimationFrames));
}

#[test]
fn defaults_to_infinite_auto_reverse_stopped() {
    let (sheet, frames) = strip(3);
    let seq = AnimationSequence::new(sheet, 12, frames).unwrap();
    assert!(seq.auto_reverse());
    assert_eq!(seq.iterations(), Iterations::Infinite);
    assert_eq!(seq.frames_per_second(), 12);
    assert_eq!(seq.frame_count(), 3);
    assert_eq!(seq.current_frame(), 0);
    assert!(!seq.is_running());
}

// ── Stepping ──────────────────────────────────────────────────────────────────

#[test]
fn forward_sequence_wraps_to_first_frame() {
    let mut seq = sequence(4, 10, false, Iterations::Infinite);
    assert_eq!(frames_visited(&mut seq, 6), vec![1, 2, 3, 0, 1, 2]);
}

#[test]
fn single_iteration_completes_once_after_n_steps() {
    let mut seq = sequence(4, 10, false, Iterations::Count(1));
    seq.start();
    let completions = Rc::new(RefCell::new(0));
    let c = Rc::clone(&completions);
    seq.on_completed(move || *c.borrow_mut() += 1);

    for _ in 0..3 {
        assert!(!seq.step().completed);
    }
    let last = seq.step();
    assert!(last.completed);
    assert_eq!(last.current, 0);
    assert_eq!(*completions.borrow(), 1);
    assert!(!seq.is_running());
}

#[test]
fn auto_reverse_bounces_without_repeating_ends() {
    let mut seq = sequence(4, 10, true, Iterations::Infinite);
    assert_eq!(
        frames_visited(&mut seq, 12),
        vec![1, 2, 3, 2, 1, 0, 1, 2, 3, 2, 1, 0]
    );
}

#[test]
fn auto_reverse_round_trip_takes_twice_len_minus_one_steps() {
    for n in 2..=6 {
        let mut seq = sequence(n, 10, true, Iterations::Infinite);
        let round_trip = 2 * (n as usize - 1);
        let visited = frames_visited(&mut seq, round_trip);
        assert_eq!(visited.last(), Some(&0), "n = {n}");
        assert!(visited[..round_trip - 1].iter().all(|&f| f != 0), "n = {n}");
    }
}

#[test]
fn auto_reverse_count_covers_there_and_back() {
    let mut seq = sequence(3, 10, true, Iterations::Count(1));
    seq.start();
    // 1, 2, 1, 0 then the bounce off frame 0 completes.
    for _ in 0..4 {
        assert!(!seq.step().completed);
    }
    assert!(seq.step().completed);
    assert_eq!(seq.current_frame(), 0);
}

#[test]
fn new_frame_listeners_run_before_completion() {
    let mut seq = sequence(2, 10, false, Iterations::Count(1));
    let log = Rc::new(RefCell::new(Vec::new()));
    let (a, b) = (Rc::clone(&log), Rc::clone(&log));
    seq.on_new_frame(move |prev, cur| a.borrow_mut().push(format!("frame {prev}->{cur}")));
    seq.on_completed(move || b.borrow_mut().push("done".to_string()));

    seq.step();
    seq.step();
    assert_eq!(*log.borrow(), vec!["frame 0->1", "frame 1->0", "done"]);
}

#[test]
fn single_frame_sequence_stays_put() {
    let mut seq = sequence(1, 10, true, Iterations::Infinite);
    assert_eq!(frames_visited(&mut seq, 3), vec![0, 0, 0]);
    let mut seq = sequence(1, 10, false, Iterations::Infinite);
    assert_eq!(frames_visited(&mut seq, 3), vec![0, 0, 0]);
}

#[test]
fn reset_returns_to_first_frame_and_iteration() {
    let mut seq = sequence(3, 10, false, Iterations::Count(1));
    seq.step();
    seq.step();
    seq.reset();
    assert_eq!(seq.current_frame(), 0);
    // A full pass is needed again before completing.
    assert!(!seq.step().completed);
    assert!(!seq.step().completed);
    assert!(seq.step().completed);
}

#[test]
#[should_panic]
fn set_current_frame_out_of_range_panics() {
    let mut seq = sequence(2, 10, false, Iterations::Infinite);
    seq.set_current_frame(2);
}

// ── Timing ────────────────────────────────────────────────────────────────────

#[test]
fn update_does_nothing_while_stopped() {
    let mut seq = sequence(3, 4, false, Iterations::Infinite);
    assert_eq!(seq.update(10.0), None);
    assert_eq!(seq.current_frame(), 0);
}

#[test]
fn update_steps_once_per_elapsed_period() {
    let mut seq = sequence(3, 4, false, Iterations::Infinite);
    seq.start();
    assert_eq!(seq.update(0.125), None);
    let step = seq.update(0.125).unwrap();
    assert_eq!((step.previous, step.current), (0, 1));
    assert_eq!(seq.update(0.125), None);
}

#[test]
fn update_steps_at_most_once_per_call() {
    let mut seq = sequence(4, 4, false, Iterations::Infinite);
    seq.start();
    assert!(seq.update(1.0).is_some());
    assert_eq!(seq.current_frame(), 1);
    // The surplus carries over to later calls.
    assert!(seq.update(0.0).is_some());
    assert_eq!(seq.current_frame(), 2);
}

#[test]
fn single_frame_update_never_steps() {
    let mut seq = sequence(1, 4, false, Iterations::Count(1));
    seq.start();
    assert_eq!(seq.update(5.0), None);
    assert!(seq.is_running());
}

#[test]
fn zero_fps_steps_once_a_second() {
    let mut seq = sequence(3, 0, false, Iterations::Infinite);
    seq.start();
    assert_eq!(seq.update(0.5), None);
    assert!(seq.update(0.5).is_some());
}

// ── Cloning and drawing ───────────────────────────────────────────────────────

#[test]
fn clone_shares_sheet_but_not_state() {
    let mut seq = sequence(3, 10, false, Iterations::Count(2));
    let hits = Rc::new(RefCell::new(0));
    let h = Rc::clone(&hits);
    seq.on_new_frame(move |_, _| *h.borrow_mut() += 1);
    seq.start();
    seq.step();

    let mut copy = seq.clone();
    assert!(Rc::ptr_eq(seq.texture(), copy.texture()));
    assert_eq!(copy.current_frame(), 0);
    assert!(!copy.is_running());
    assert_eq!(copy.iterations(), Iterations::Count(2));
    copy.step();
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn draw_blits_current_frame() {
    let mut seq = sequence(3, 10, false, Iterations::Infinite);
    let mut target = Bitmap::new(4, 4);
    seq.draw(&mut target, 1, 1);
    assert_eq!(target.pixel(1, 1), Some(Color(1)));
    seq.step();
    seq.draw(&mut target, 1, 1);
    assert_eq!(target.pixel(2, 2), Some(Color(2)));
    assert_eq!(target.pixel(3, 3), Some(Color::BLACK));
    assert_eq!(seq.current_region(), Rect::new(2, 0, 2, 2));
    assert_eq!(target.width(), 4);
}
