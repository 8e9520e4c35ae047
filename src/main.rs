use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use hotdesk::clock::Clock;
use hotdesk::engine::Engine;
use hotdesk::messenger::LogMessenger;
use hotdesk::notify::NotifyHub;
use hotdesk::reconciler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("HOTDESK_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    hotdesk::observability::init(metrics_port);

    // Offset east of UTC in whole hours; the engine compares wall-clock
    // hours in this zone everywhere.
    let utc_offset_hours: i32 = std::env::var("HOTDESK_UTC_OFFSET")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let clock = Clock::fixed_offset(utc_offset_hours * 3600)
        .ok_or("HOTDESK_UTC_OFFSET out of range")?;

    let reconcile_secs: u64 = std::env::var("HOTDESK_RECONCILE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(reconciler::DEFAULT_INTERVAL.as_secs());

    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(notify, Arc::new(LogMessenger), clock));

    info!("hotdesk engine up");
    info!("  utc_offset: {utc_offset_hours}h");
    info!("  reconcile_interval: {reconcile_secs}s");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!(
            "http://0.0.0.0:{p}/metrics"
        ))
    );

    let reconciler_engine = engine.clone();
    tokio::spawn(async move {
        reconciler::run_reconciler(reconciler_engine, Duration::from_secs(reconcile_secs)).await;
    });

    // Park until SIGTERM/ctrl-c; request surfaces attach to the shared
    // engine from their own tasks.
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    info!("shutdown signal received, hotdesk stopped");
    Ok(())
}
