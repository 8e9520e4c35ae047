//! End-to-end flows through the public engine API: direct bookings, queue
//! promotion on cancellation, and the reconciliation pass — all observed
//! through the live channel and the typed query views.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use hotdesk::clock::Clock;
use hotdesk::engine::{BookingRequest, Engine, QueueOutcome, TimelineWindow};
use hotdesk::messenger::LogMessenger;
use hotdesk::model::{Actor, EventKind, TimeSpan};
use hotdesk::notify::NotifyHub;

fn dt(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 5, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn engine() -> Arc<Engine> {
    let notify = Arc::new(NotifyHub::new());
    Arc::new(Engine::new(notify, Arc::new(LogMessenger), Clock::utc()))
}

fn booking_request(location_id: Ulid, seat: &str, start: NaiveDateTime, hours: u32) -> BookingRequest {
    BookingRequest {
        location_id,
        seat_name: seat.into(),
        time_start: start,
        hours,
        people_amount: 1,
        features: vec![],
        comment: None,
    }
}

#[tokio::test]
async fn booking_cancel_and_queue_promotion_flow() {
    let engine = engine();
    let admin = Ulid::new();
    let location = engine.create_location(admin, "hub", "main st", 8, 20).unwrap();
    engine.add_seat(location.id, "w-1", vec![], 1).await.unwrap();

    let mut live = engine.notify.subscribe(location.id, 99);

    // User 1 takes the seat for the afternoon.
    let booking = engine
        .create_booking(1, booking_request(location.id, "w-1", dt(1, 12), 6))
        .await
        .unwrap();

    // User 2 wants three hours from noon — seat is busy, so they wait.
    let outcome = engine
        .join_queue(2, location.id, Some(dt(1, 12)), 3, None)
        .await
        .unwrap();
    assert!(matches!(outcome, QueueOutcome::Queued(_)));
    assert_eq!(engine.user_queue_entries(2).await.len(), 1);

    // The cancellation frees the seat and promotes user 2 in the same call.
    engine.cancel_booking(booking.id, Actor::User(1)).await.unwrap();

    assert!(engine.user_queue_entries(2).await.is_empty());
    let views = engine.user_bookings(2).await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].span, TimeSpan::new(dt(1, 12), dt(1, 15)));
    assert_eq!(views[0].seat_name, "w-1");

    // Everything was pushed to the live channel, in order.
    let kinds: Vec<EventKind> = std::iter::from_fn(|| live.try_recv().ok())
        .map(|e| e.event)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::BookingCreated,
            EventKind::BookingCanceled,
            EventKind::BookingCreated,
        ]
    );

    // The occupancy bitmap reflects the promoted booking.
    let timelines = engine
        .occupancy(location.id, Some("w-1"), dt(1, 0).date(), TimelineWindow::OneDay, None)
        .await
        .unwrap();
    let slots = &timelines[0].slots;
    assert_eq!(&slots[12..15], &[1, 1, 1]);
    assert_eq!(slots[15], 0);
}

#[tokio::test]
async fn reconciliation_emits_each_lifecycle_event_once() {
    let engine = engine();
    let admin = Ulid::new();
    let location = engine.create_location(admin, "hub", "main st", 0, 24).unwrap();
    engine.add_seat(location.id, "w-1", vec![], 1).await.unwrap();

    engine
        .create_booking(1, booking_request(location.id, "w-1", dt(1, 10), 2))
        .await
        .unwrap();

    let mut live = engine.notify.subscribe(location.id, 99);

    // 09:00 — the booking starts within 3h and ends within 3h10m.
    assert!(engine.try_reconcile(dt(1, 9)).await);
    assert!(engine.try_reconcile(dt(1, 9)).await);

    let kinds: Vec<EventKind> = std::iter::from_fn(|| live.try_recv().ok())
        .map(|e| e.event)
        .collect();
    // One canceled (end-of-life visibility) and one started event — the
    // second pass re-emitted nothing.
    assert_eq!(
        kinds,
        vec![EventKind::BookingCanceled, EventKind::BookingStarted]
    );
}

#[tokio::test]
async fn queue_join_books_straight_away_on_a_free_seat() {
    let engine = engine();
    let admin = Ulid::new();
    let location = engine.create_location(admin, "hub", "main st", 0, 24).unwrap();
    engine.add_seat(location.id, "w-1", vec![], 1).await.unwrap();

    let outcome = engine
        .join_queue(5, location.id, Some(dt(3, 9)), 4, Some("quiet corner".into()))
        .await
        .unwrap();

    let reservation = match outcome {
        QueueOutcome::Booked(r) => r,
        QueueOutcome::Queued(_) => panic!("the seat was free"),
    };
    assert_eq!(reservation.span, TimeSpan::new(dt(3, 9), dt(3, 13)));
    assert_eq!(reservation.comment.as_deref(), Some("quiet corner"));
    assert!(engine.user_queue_entries(5).await.is_empty());
}
