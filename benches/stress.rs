//! Allocation throughput and conflict behavior under load, against the
//! in-process engine. Run with `cargo bench`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use ulid::Ulid;

use hotdesk::clock::Clock;
use hotdesk::engine::{BookingRequest, Engine, EngineError};
use hotdesk::messenger::LogMessenger;
use hotdesk::notify::NotifyHub;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

const SEATS: usize = 10;

async fn setup() -> (Arc<Engine>, Ulid) {
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(notify, Arc::new(LogMessenger), Clock::utc()));
    let location = engine
        .create_location(Ulid::new(), "bench-hub", "nowhere", 0, 24)
        .unwrap();
    for i in 0..SEATS {
        engine
            .add_seat(location.id, &format!("w-{i}"), vec![], 1)
            .await
            .unwrap();
    }
    println!("  created {SEATS} seats");
    (engine, location.id)
}

fn request(location_id: Ulid, seat: usize, slot: usize) -> BookingRequest {
    let base = NaiveDate::from_ymd_opt(2030, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    BookingRequest {
        location_id,
        seat_name: format!("w-{seat}"),
        time_start: base + chrono::Duration::hours(slot as i64),
        hours: 1,
        people_amount: 1,
        features: vec![],
        comment: None,
    }
}

async fn phase1_sequential(engine: &Arc<Engine>, location_id: Ulid) {
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        engine
            .create_booking(i as i64, request(location_id, i % SEATS, i / SEATS))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    println!(
        "  throughput: {:.0} bookings/s",
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("sequential create", &mut latencies);
}

async fn phase2_concurrent(engine: &Arc<Engine>, location_id: Ulid) {
    let tasks = 8;
    let per_task = 250;
    let start = Instant::now();

    let mut handles = Vec::new();
    for task in 0..tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(per_task);
            for i in 0..per_task {
                // Disjoint slot ranges per task, far from phase 1.
                let slot = 10_000 + task * per_task + i;
                let user = 100_000 + (task * per_task + i) as i64;
                let t = Instant::now();
                engine
                    .create_booking(user, request(location_id, i % SEATS, slot))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let elapsed = start.elapsed();
    println!(
        "  throughput: {:.0} bookings/s across {tasks} tasks",
        (tasks * per_task) as f64 / elapsed.as_secs_f64()
    );
    print_latency("concurrent create", &mut all);
}

async fn phase3_conflict_storm(engine: &Arc<Engine>, location_id: Ulid) {
    // Everyone fights for the same seat and hour: exactly one wins.
    let contenders = 64;
    let mut handles = Vec::new();
    for user in 0..contenders {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_booking(1_000_000 + user, request(location_id, 0, 20_000))
                .await
        }));
    }

    let mut wins = 0;
    let mut overlaps = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(EngineError::Overlap(_)) => overlaps += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    println!("  conflict storm: {wins} won, {overlaps} rejected (expected 1 winner)");
    assert_eq!(wins, 1);
}

#[tokio::main]
async fn main() {
    println!("hotdesk stress bench");

    println!("phase 0: setup");
    let (engine, location_id) = setup().await;

    println!("phase 1: sequential creates");
    phase1_sequential(&engine, location_id).await;

    println!("phase 2: concurrent creates");
    phase2_concurrent(&engine, location_id).await;

    println!("phase 3: conflict storm");
    phase3_conflict_storm(&engine, location_id).await;
}
