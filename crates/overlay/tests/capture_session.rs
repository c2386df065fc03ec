//! End-to-end capture sessions against the in-memory display service.

use crossbeam_channel::Receiver;
use desktop::memory::pattern_pixel;
use desktop::{DisplayInfo, MemoryDisplayService, Point, Rect};
use overlay::{
    outcome_channel, CancelReason, CaptureOutcome, CaptureSession, Key, OverlayEvent,
    OverlayOptions, Phase, PointerButton, Reaction,
};

fn start(service: &MemoryDisplayService) -> (CaptureSession, Receiver<CaptureOutcome>) {
    let (tx, rx) = outcome_channel();
    let session = CaptureSession::new(service, OverlayOptions::default(), tx);
    (session, rx)
}

fn drag(session: &mut CaptureSession, from: (i32, i32), to: (i32, i32)) -> Reaction {
    session.handle(OverlayEvent::PointerDown {
        position: Point::new(from.0, from.1),
        button: PointerButton::Primary,
    });
    session.handle(OverlayEvent::PointerMove {
        position: Point::new(to.0, to.1),
    });
    session.handle(OverlayEvent::PointerUp {
        position: Point::new(to.0, to.1),
        button: PointerButton::Primary,
    })
}

fn outcomes(rx: &Receiver<CaptureOutcome>) -> Vec<CaptureOutcome> {
    rx.try_iter().collect()
}

#[test]
fn drag_at_ratio_one() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0);
    let (mut session, rx) = start(&service);

    assert_eq!(drag(&mut session, (100, 100), (400, 300)), Reaction::Finished);
    assert_eq!(session.phase(), Phase::Completed);

    let mut results = outcomes(&rx);
    assert_eq!(results.len(), 1);
    match results.remove(0) {
        CaptureOutcome::Captured(region) => {
            assert_eq!(region.image.dimensions(), (300, 200));
            assert_eq!(region.logical, Rect::new(100, 100, 300, 200));
            assert_eq!(*region.image.get_pixel(0, 0), pattern_pixel(100, 100));
        }
        other => panic!("expected a capture, got {:?}", other),
    }
}

#[test]
fn drag_at_ratio_two() {
    let service = MemoryDisplayService::single(1920, 1080, 2.0);
    let (mut session, rx) = start(&service);

    drag(&mut session, (100, 100), (400, 300));

    let region = match rx.try_recv().unwrap() {
        CaptureOutcome::Captured(region) => region,
        other => panic!("expected a capture, got {:?}", other),
    };
    assert_eq!(region.image.dimensions(), (600, 400));
    assert_eq!(region.physical, Rect::new(200, 200, 600, 400));
    assert_eq!(*region.image.get_pixel(0, 0), pattern_pixel(200, 200));
}

#[test]
fn reverse_drag_captures_same_region() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0);
    let (mut session, rx) = start(&service);

    drag(&mut session, (400, 300), (100, 100));

    let image = rx.try_recv().unwrap().into_image().unwrap();
    assert_eq!(image.dimensions(), (300, 200));
}

#[test]
fn fractional_ratio_sizes_follow_rounding() {
    let service = MemoryDisplayService::single(1000, 800, 1.25);
    let (mut session, rx) = start(&service);

    drag(&mut session, (3, 7), (110, 58));

    let image = rx.try_recv().unwrap().into_image().unwrap();
    let expected_w = (107.0f64 * 1.25).round() as u32;
    let expected_h = (51.0f64 * 1.25).round() as u32;
    assert_eq!(image.dimensions(), (expected_w, expected_h));
}

#[test]
fn desktop_with_negative_origin() {
    let displays = vec![
        DisplayInfo::new("left", Rect::new(-1280, 0, 1280, 1024), 1.0, false),
        DisplayInfo::new("main", Rect::new(0, 0, 1920, 1080), 1.0, true),
    ];
    let service = MemoryDisplayService::with_pattern(displays);
    let (mut session, rx) = start(&service);
    assert_eq!(session.geometry().bounds(), Rect::new(-1280, 0, 3200, 1080));

    // Surface-relative (1200, 10) is desktop (-80, 10): straddles both monitors
    drag(&mut session, (1200, 10), (1400, 110));

    match rx.try_recv().unwrap() {
        CaptureOutcome::Captured(region) => {
            assert_eq!(region.logical, Rect::new(-80, 10, 200, 100));
            assert_eq!(region.image.dimensions(), (200, 100));
            assert_eq!(*region.image.get_pixel(0, 0), pattern_pixel(1200, 10));
        }
        other => panic!("expected a capture, got {:?}", other),
    }
}

#[test]
fn click_without_drag_cancels() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0);
    let (mut session, rx) = start(&service);

    session.handle(OverlayEvent::PointerDown {
        position: Point::new(500, 500),
        button: PointerButton::Primary,
    });
    let reaction = session.handle(OverlayEvent::PointerUp {
        position: Point::new(500, 500),
        button: PointerButton::Primary,
    });

    assert_eq!(reaction, Reaction::Finished);
    let results = outcomes(&rx);
    assert_eq!(results.len(), 1);
    assert!(matches!(
        results[0],
        CaptureOutcome::Cancelled(CancelReason::DegenerateSelection)
    ));
}

#[test]
fn zero_height_drag_cancels() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0);
    let (mut session, rx) = start(&service);

    drag(&mut session, (100, 100), (400, 100));

    assert!(matches!(
        rx.try_recv().unwrap(),
        CaptureOutcome::Cancelled(CancelReason::DegenerateSelection)
    ));
}

#[test]
fn small_drag_below_threshold_cancels() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0);
    let (mut session, rx) = start(&service);

    drag(&mut session, (100, 100), (102, 103));

    assert!(matches!(
        rx.try_recv().unwrap(),
        CaptureOutcome::Cancelled(CancelReason::DegenerateSelection)
    ));
}

#[test]
fn threshold_zero_accepts_tiny_drag() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0);
    let (tx, rx) = outcome_channel();
    let options = OverlayOptions {
        drag_threshold: 0,
        ..OverlayOptions::default()
    };
    let mut session = CaptureSession::new(&service, options, tx);

    drag(&mut session, (100, 100), (102, 103));

    assert_eq!(rx.try_recv().unwrap().into_image().unwrap().dimensions(), (2, 3));
}

#[test]
fn capture_failure_cancels_without_interaction() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0).failing();
    let (mut session, rx) = start(&service);

    // Nothing is emitted during construction
    assert!(!session.has_snapshot());
    assert!(!session.is_interactive());
    assert!(rx.try_recv().is_err());

    // Input before the deferred cancellation is ignored
    let ignored = session.handle(OverlayEvent::PointerDown {
        position: Point::new(10, 10),
        button: PointerButton::Primary,
    });
    assert_eq!(ignored, Reaction::Ignored);
    assert_eq!(session.phase(), Phase::Idle);

    assert_eq!(session.dispatch_deferred(), Reaction::Finished);
    assert_eq!(session.dispatch_deferred(), Reaction::Ignored);
    assert_eq!(session.handle(OverlayEvent::KeyDown(Key::Escape)), Reaction::Ignored);

    let results = outcomes(&rx);
    assert_eq!(results.len(), 1);
    assert!(matches!(
        results[0],
        CaptureOutcome::Cancelled(CancelReason::CaptureUnavailable)
    ));
}

#[test]
fn empty_capture_is_unavailable() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0).empty();
    let (mut session, rx) = start(&service);

    assert!(!session.has_snapshot());
    session.dispatch_deferred();

    assert!(matches!(
        rx.try_recv().unwrap(),
        CaptureOutcome::Cancelled(CancelReason::CaptureUnavailable)
    ));
}

#[test]
fn missing_primary_display_is_unavailable() {
    let displays = vec![DisplayInfo::new("only", Rect::new(0, 0, 800, 600), 1.0, false)];
    let service = MemoryDisplayService::with_pattern(displays);
    let (mut session, rx) = start(&service);

    assert!(!session.has_snapshot());
    session.dispatch_deferred();

    assert!(matches!(
        rx.try_recv().unwrap(),
        CaptureOutcome::Cancelled(CancelReason::CaptureUnavailable)
    ));
}

#[test]
fn escape_during_drag_wins() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0);
    let (mut session, rx) = start(&service);

    session.handle(OverlayEvent::PointerDown {
        position: Point::new(100, 100),
        button: PointerButton::Primary,
    });
    session.handle(OverlayEvent::PointerMove {
        position: Point::new(400, 300),
    });
    assert_eq!(session.phase(), Phase::Dragging);

    assert_eq!(session.handle(OverlayEvent::KeyDown(Key::Escape)), Reaction::Finished);
    assert_eq!(
        session.handle(OverlayEvent::PointerUp {
            position: Point::new(400, 300),
            button: PointerButton::Primary,
        }),
        Reaction::Ignored
    );

    let results = outcomes(&rx);
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], CaptureOutcome::Cancelled(CancelReason::Escape)));
}

#[test]
fn escape_after_completion_is_noop() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0);
    let (mut session, rx) = start(&service);

    drag(&mut session, (100, 100), (400, 300));
    assert_eq!(session.handle(OverlayEvent::KeyDown(Key::Escape)), Reaction::Ignored);
    assert_eq!(session.handle(OverlayEvent::KeyDown(Key::Escape)), Reaction::Ignored);
    assert_eq!(session.handle(OverlayEvent::Closed), Reaction::Ignored);

    let results = outcomes(&rx);
    assert_eq!(results.len(), 1);
    assert!(results[0].is_captured());
    assert_eq!(session.phase(), Phase::Completed);
}

#[test]
fn snapshot_lost_mid_drag_cancels() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0);
    let (mut session, rx) = start(&service);

    session.handle(OverlayEvent::PointerDown {
        position: Point::new(100, 100),
        button: PointerButton::Primary,
    });
    session.handle(OverlayEvent::PointerMove {
        position: Point::new(400, 300),
    });
    assert_eq!(session.invalidate_snapshot(), Reaction::Redraw);
    session.handle(OverlayEvent::PointerUp {
        position: Point::new(400, 300),
        button: PointerButton::Primary,
    });

    assert!(matches!(
        rx.try_recv().unwrap(),
        CaptureOutcome::Cancelled(CancelReason::SnapshotLost)
    ));
}

#[test]
fn closed_surface_cancels() {
    let service = MemoryDisplayService::single(1920, 1080, 1.0);
    let (mut session, rx) = start(&service);

    assert_eq!(session.handle(OverlayEvent::Closed), Reaction::Finished);
    assert!(matches!(
        rx.try_recv().unwrap(),
        CaptureOutcome::Cancelled(CancelReason::SurfaceClosed)
    ));
}

#[test]
fn snapshot_released_after_finish() {
    let service = MemoryDisplayService::single(640, 480, 1.0);
    let (mut session, _rx) = start(&service);
    assert!(session.has_snapshot());

    session.handle(OverlayEvent::KeyDown(Key::Escape));

    assert!(!session.has_snapshot());
    assert!(!session.is_interactive());
}

#[test]
fn one_outcome_across_many_sizes() {
    for (w, h) in [(1, 1), (5, 9), (640, 1), (1919, 1079)] {
        let service = MemoryDisplayService::single(1920, 1080, 1.5);
        let (tx, rx) = outcome_channel();
        let options = OverlayOptions {
            drag_threshold: 0,
            ..OverlayOptions::default()
        };
        let mut session = CaptureSession::new(&service, options, tx);

        drag(&mut session, (0, 0), (w, h));
        session.handle(OverlayEvent::KeyDown(Key::Escape));

        let results = outcomes(&rx);
        assert_eq!(results.len(), 1);
        let image = results.into_iter().next().unwrap().into_image().unwrap();
        let expected = (
            (w as f64 * 1.5).round() as u32,
            (h as f64 * 1.5).round() as u32,
        );
        assert_eq!(image.dimensions(), expected);
    }
}
