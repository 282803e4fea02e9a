use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::mapper::Size;

#[derive(Default)]
struct CountingCapture {
    attached: AtomicUsize,
    detached: AtomicUsize,
}

impl CountingCapture {
    fn counts(&self) -> (usize, usize) {
        (
            self.attached.load(Ordering::SeqCst),
            self.detached.load(Ordering::SeqCst),
        )
    }
}

impl PointerCapture for CountingCapture {
    fn attach(&self) {
        self.attached.fetch_add(1, Ordering::SeqCst);
    }

    fn detach(&self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }
}

fn zone(id: i64, x0: i32, y0: i32, x1: i32, y1: i32) -> Zone {
    Zone {
        id: ZoneId(id),
        environment_id: EnvironmentId(1),
        name: format!("Zone {id}"),
        rect: ZoneRect::from_corners(x0, y0, x1, y1),
        color: "#ff0000".into(),
        created_at: None,
        created_by: "admin".into(),
        active: true,
    }
}

/// 1920x1080 image shown at half size.
fn half_scale_editor(zones: Vec<Zone>) -> ZoneEditor {
    let mapper = CoordinateMapper::new(Size::new(1920.0, 1080.0), Size::new(960.0, 540.0));
    let mut editor = ZoneEditor::new(EnvironmentId(1), mapper);
    editor.load_zones(zones);
    editor
}

fn identity_editor(zones: Vec<Zone>) -> ZoneEditor {
    let mut editor = ZoneEditor::new(
        EnvironmentId(1),
        CoordinateMapper::identity(Size::new(1920.0, 1080.0)),
    );
    editor.load_zones(zones);
    editor
}

#[test]
fn dragging_a_zone_moves_it_by_the_scaled_delta() {
    let mut editor = half_scale_editor(vec![zone(7, 100, 100, 200, 200)]);

    let outcome = editor.press(Point::new(75.0, 75.0)).expect("press");
    assert_eq!(outcome, PressOutcome::Move { zone_id: ZoneId(7) });
    assert_eq!(editor.selected_zone_id(), Some(ZoneId(7)));

    let moved = editor.on_pointer_move(Point::new(85.0, 80.0)).expect("moved");
    assert_eq!(moved.rect, ZoneRect::from_corners(120, 110, 220, 210));
    editor.on_pointer_release();

    assert!(editor.active_gesture().is_none());
    assert!(editor.is_dirty());
}

#[test]
fn many_small_moves_do_not_drift() {
    let mut editor = half_scale_editor(vec![zone(1, 300, 300, 420, 380)]);
    editor.on_zone_press(ZoneId(1), Point::new(160.0, 160.0)).expect("press");

    let mut x = 160.0;
    for _ in 0..37 {
        x += 0.3;
        editor.on_pointer_move(Point::new(x, 160.0));
    }
    editor.on_pointer_release();

    let expected_dx = ((x - 160.0) * 2.0_f64).round() as i32;
    let rect = editor.zone(ZoneId(1)).expect("zone").rect;
    assert_eq!(rect, ZoneRect::from_corners(300, 300, 420, 380).with_move(expected_dx, 0));
}

#[test]
fn corner_handle_resizes_selected_zone() {
    let mut editor = half_scale_editor(vec![zone(3, 100, 100, 200, 200)]);
    editor.on_zone_press(ZoneId(3), Point::new(75.0, 75.0)).expect("select");
    editor.on_pointer_release();

    let outcome = editor.press(Point::new(101.0, 99.0)).expect("press");
    assert_eq!(
        outcome,
        PressOutcome::Resize {
            zone_id: ZoneId(3),
            handle: ResizeHandle::Se
        }
    );

    let resized = editor.on_pointer_move(Point::new(111.0, 104.0)).expect("resized");
    assert_eq!(resized.rect, ZoneRect::from_corners(100, 100, 220, 210));
}

#[test]
fn resize_stops_at_minimum_size() {
    let mut editor = identity_editor(vec![zone(3, 100, 100, 200, 200)]);
    editor.on_zone_press(ZoneId(3), Point::new(150.0, 150.0)).expect("select");
    editor
        .on_handle_press(ZoneId(3), ResizeHandle::W, Point::new(100.0, 150.0))
        .expect("handle");

    let resized = editor.on_pointer_move(Point::new(400.0, 150.0)).expect("resized");
    assert_eq!(resized.rect.x0(), 200 - MIN_ZONE_SIZE);
    assert_eq!(resized.rect.x1(), 200);
}

#[test]
fn handles_of_unselected_zones_are_inactive() {
    let mut editor = identity_editor(vec![zone(1, 0, 0, 50, 50), zone(2, 100, 100, 200, 200)]);
    editor.on_zone_press(ZoneId(1), Point::new(10.0, 10.0)).expect("select");
    editor.on_pointer_release();

    let err = editor
        .on_handle_press(ZoneId(2), ResizeHandle::Ne, Point::new(200.0, 100.0))
        .expect_err("unselected");
    assert_eq!(err, EditorError::HandleOnUnselectedZone { zone_id: ZoneId(2) });
    assert!(editor.active_gesture().is_none());
}

#[test]
fn corner_wins_a_tie_with_an_edge_handle() {
    let mut editor = identity_editor(vec![zone(1, 0, 0, 20, 20)]);
    editor.on_zone_press(ZoneId(1), Point::new(10.0, 10.0)).expect("select");
    editor.on_pointer_release();

    assert_eq!(editor.handle_at(Point::new(5.0, 0.0)), Some(ResizeHandle::Nw));
    assert_eq!(editor.handle_at(Point::new(10.0, 1.0)), Some(ResizeHandle::N));
    assert_eq!(editor.handle_at(Point::new(40.0, 40.0)), None);
}

#[test]
fn topmost_zone_receives_the_press() {
    let mut editor = identity_editor(vec![zone(1, 0, 0, 100, 100), zone(2, 50, 50, 150, 150)]);
    let outcome = editor.press(Point::new(75.0, 75.0)).expect("press");
    assert_eq!(outcome, PressOutcome::Move { zone_id: ZoneId(2) });
}

#[test]
fn pressing_empty_canvas_deselects() {
    let mut editor = identity_editor(vec![zone(1, 0, 0, 100, 100)]);
    editor.on_zone_press(ZoneId(1), Point::new(50.0, 50.0)).expect("select");
    editor.on_pointer_release();
    let events = editor.subscribe();

    let outcome = editor.press(Point::new(900.0, 900.0)).expect("press");
    assert_eq!(outcome, PressOutcome::Deselected);
    assert_eq!(editor.selected_zone_id(), None);
    assert_eq!(events.try_recv(), Ok(EditorEvent::SelectionChanged(None)));
}

#[test]
fn moves_stay_inside_the_image() {
    let mut editor = half_scale_editor(vec![zone(1, 1800, 900, 1900, 1000)]);
    editor.on_zone_press(ZoneId(1), Point::new(925.0, 475.0)).expect("press");

    let moved = editor.on_pointer_move(Point::new(1025.0, 575.0)).expect("moved");
    assert_eq!(moved.rect, ZoneRect::from_corners(1820, 980, 1920, 1080));

    let moved = editor.on_pointer_move(Point::new(0.0, 0.0)).expect("moved");
    assert_eq!(moved.rect.x0(), 0);
    assert_eq!(moved.rect.y0(), 0);
    assert_eq!(moved.rect.width(), 100);
}

#[test]
fn resize_stops_at_the_image_edge() {
    let mut editor = identity_editor(vec![zone(1, 1800, 100, 1900, 200)]);
    editor.on_zone_press(ZoneId(1), Point::new(1850.0, 150.0)).expect("select");
    editor
        .on_handle_press(ZoneId(1), ResizeHandle::E, Point::new(1900.0, 150.0))
        .expect("handle");

    let resized = editor.on_pointer_move(Point::new(2500.0, 150.0)).expect("resized");
    assert_eq!(resized.rect.x1(), 1920);
    assert_eq!(resized.rect.x0(), 1800);
}

#[test]
fn pointer_listeners_are_released_on_every_exit() {
    let capture = Arc::new(CountingCapture::default());
    let mut editor = ZoneEditor::with_capture(
        EnvironmentId(1),
        CoordinateMapper::identity(Size::new(640.0, 480.0)),
        capture.clone(),
    );
    editor.load_zones(vec![zone(1, 0, 0, 100, 100)]);

    editor.on_zone_press(ZoneId(1), Point::new(10.0, 10.0)).expect("press");
    assert_eq!(capture.counts(), (1, 0));
    editor.on_pointer_release();
    assert_eq!(capture.counts(), (1, 1));

    // A second press without a release replaces the registration.
    editor.on_zone_press(ZoneId(1), Point::new(10.0, 10.0)).expect("press");
    editor
        .on_handle_press(ZoneId(1), ResizeHandle::Se, Point::new(100.0, 100.0))
        .expect("handle");
    assert_eq!(capture.counts(), (3, 2));

    editor.cancel_gesture();
    assert_eq!(capture.counts(), (3, 3));

    editor.on_zone_press(ZoneId(1), Point::new(10.0, 10.0)).expect("press");
    drop(editor);
    assert_eq!(capture.counts(), (4, 4));
}

#[test]
fn cancel_restores_the_start_rectangle() {
    let mut editor = identity_editor(vec![zone(1, 10, 10, 110, 110)]);
    editor.on_zone_press(ZoneId(1), Point::new(50.0, 50.0)).expect("press");
    editor.on_pointer_move(Point::new(90.0, 70.0)).expect("moved");

    editor.cancel_gesture();
    assert_eq!(
        editor.zone(ZoneId(1)).expect("zone").rect,
        ZoneRect::from_corners(10, 10, 110, 110)
    );
}

#[test]
fn added_zones_get_provisional_ids_and_palette_colours() {
    let mut editor = half_scale_editor(vec![zone(-3, 0, 0, 50, 50)]);
    editor.set_created_by("operator");

    let first = editor.add_zone("Bin", Point::new(100.0, 100.0));
    let second = editor.add_zone("Press", Point::new(0.0, 0.0));

    assert_eq!(first.id, ZoneId(-4));
    assert_eq!(second.id, ZoneId(-5));
    assert_eq!(first.rect, ZoneRect::from_corners(200, 200, 300, 300));
    assert_eq!(first.color, palette::color_for(1));
    assert_eq!(second.color, palette::color_for(2));
    assert_eq!(first.created_by, "operator");
    assert!(first.created_at.is_some());
    assert_eq!(editor.selected_zone_id(), Some(second.id));
}

#[test]
fn deleting_the_selected_zone_clears_selection() {
    let mut editor = identity_editor(vec![zone(1, 0, 0, 100, 100), zone(2, 200, 200, 300, 300)]);
    editor.on_zone_press(ZoneId(2), Point::new(250.0, 250.0)).expect("press");
    let events = editor.subscribe();

    let removed = editor.delete_selected().expect("removed");
    assert_eq!(removed.id, ZoneId(2));
    assert_eq!(editor.selected_zone_id(), None);
    assert_eq!(editor.zones().len(), 1);
    assert_eq!(events.try_recv(), Ok(EditorEvent::SelectionChanged(None)));
    assert_eq!(events.try_recv(), Ok(EditorEvent::ZoneRemoved(ZoneId(2))));

    assert_eq!(
        editor.delete_zone(ZoneId(9)),
        Err(EditorError::UnknownZone(ZoneId(9)))
    );
}

#[test]
fn rename_and_save_cycle_clears_dirty_flag() {
    let mut editor = identity_editor(vec![zone(1, 0, 0, 100, 100)]);
    assert!(!editor.is_dirty());

    editor.rename_zone(ZoneId(1), "Fixture").expect("rename");
    assert!(editor.is_dirty());
    assert_eq!(editor.zone(ZoneId(1)).expect("zone").name, "Fixture");

    let saved = editor.zones().to_vec();
    editor.mark_saved(saved);
    assert!(!editor.is_dirty());
}

#[test]
fn inactive_zones_are_not_loaded() {
    let mut hidden = zone(2, 0, 0, 50, 50);
    hidden.active = false;
    let editor = identity_editor(vec![zone(1, 0, 0, 100, 100), hidden]);
    assert_eq!(editor.zones().len(), 1);
}

#[test]
fn closed_subscribers_are_dropped() {
    let mut editor = identity_editor(vec![zone(1, 0, 0, 100, 100)]);
    let kept = editor.subscribe();
    drop(editor.subscribe());

    editor.on_zone_press(ZoneId(1), Point::new(10.0, 10.0)).expect("press");
    editor.on_pointer_move(Point::new(20.0, 10.0)).expect("moved");

    assert_eq!(
        kept.try_recv(),
        Ok(EditorEvent::SelectionChanged(Some(ZoneId(1))))
    );
    assert!(matches!(kept.try_recv(), Ok(EditorEvent::ZoneUpdated(_))));
    assert_eq!(editor.subscribers.len(), 1);
}
