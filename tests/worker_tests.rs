// Scheduler: busy flags, guarded jobs, spawn/tick/shutdown

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{INVERTER, MockClient, PARAMS_ANSWER, SOCKET_A, SOCKET_B, Script};
use homehub::config::AppConfig;
use homehub::hub::{DeviceGroup, HubServices};
use homehub::worker::{BusyFlag, SchedulerStats, WorkerConfig, run_guarded, spawn};
use tokio::sync::oneshot;

#[test]
fn busy_flag_allows_one_holder() {
    let flag = BusyFlag::default();
    let guard = flag.try_start().expect("first start");
    assert!(flag.is_busy());
    assert!(flag.try_start().is_none());
    drop(guard);
    assert!(!flag.is_busy());
    assert!(flag.try_start().is_some());
}

#[tokio::test(start_paused = true)]
async fn run_guarded_skips_while_previous_run_in_flight() {
    let flag = BusyFlag::default();
    let stats = Arc::new(SchedulerStats::default());

    let first = run_guarded("slow", &flag, &stats, async {
        tokio::time::sleep(Duration::from_secs(5)).await;
    })
    .expect("first run starts");
    assert!(run_guarded("slow", &flag, &stats, async {}).is_none());
    assert_eq!(stats.jobs_started.load(Ordering::Relaxed), 1);
    assert_eq!(stats.jobs_skipped.load(Ordering::Relaxed), 1);

    first.await.unwrap();
    assert!(!flag.is_busy());
    let again = run_guarded("slow", &flag, &stats, async {}).expect("flag released");
    again.await.unwrap();
    assert_eq!(stats.jobs_started.load(Ordering::Relaxed), 2);
}

#[tokio::test(start_paused = true)]
async fn panicking_job_releases_its_flag() {
    let flag = BusyFlag::default();
    let stats = Arc::new(SchedulerStats::default());
    let handle = run_guarded("boom", &flag, &stats, async { panic!("job failed") }).unwrap();
    assert!(handle.await.is_err());
    assert!(!flag.is_busy());
}

#[tokio::test(start_paused = true)]
async fn worker_publishes_polls_and_stops_on_shutdown() {
    let client = Arc::new(
        MockClient::new()
            .with(SOCKET_A, "/", Script::text("on"))
            .with(SOCKET_B, "/status", Script::text("off"))
            .with(INVERTER, "/params", Script::text(PARAMS_ANSWER)),
    );
    let config = AppConfig::load_from_str(&common::test_config("/nonexistent/guide.xml")).unwrap();
    let services = Arc::new(HubServices::new(&config, client.clone()));
    let mut sockets = services.subscribe(DeviceGroup::Sockets);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = spawn(
        services.clone(),
        WorkerConfig {
            interval_secs: config.polling.interval_secs,
            history_every_ticks: config.polling.history_every_ticks,
            stats_log_interval_secs: config.polling.stats_log_interval_secs,
            prewarm_schedule: None,
        },
        shutdown_rx,
    );

    tokio::time::timeout(Duration::from_secs(5), sockets.changed())
        .await
        .expect("first poll published")
        .unwrap();
    let latest = services.latest(DeviceGroup::Sockets);
    assert_eq!(latest.failures(), 0);
    assert_eq!(latest.len(), 2);

    // Let a few more ticks run: params stay inside their window.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(client.count(SOCKET_A, "/") >= 2);
    assert_eq!(client.count(INVERTER, "/params"), 1);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker stops")
        .unwrap();
}
