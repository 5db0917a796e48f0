// Polling scheduler: one interval loop drives every refresh. Each job runs in its own task
// behind a busy flag, so a slow upstream never blocks the loop and a tick that finds the
// previous run of the same job still in flight is skipped.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{Duration as ChronoDuration, Local, Timelike};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, interval};
use tracing::{Instrument, debug, info, warn};

use crate::guide_cache::slot_key;
use crate::hub::{DeviceGroup, HubServices};

/// Scheduler timing.
pub struct WorkerConfig {
    pub interval_secs: u64,
    /// Day/month history runs on every N-th tick (and on the first one).
    pub history_every_ticks: u64,
    pub stats_log_interval_secs: u64,
    /// Cron expression (local time) for guide prewarm; `None` disables it.
    pub prewarm_schedule: Option<String>,
}

/// Set while a job runs; cleared on drop of the guard.
#[derive(Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

pub struct BusyGuard(Arc<AtomicBool>);

impl BusyFlag {
    pub fn try_start(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(self.0.clone()))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
pub struct SchedulerStats {
    pub jobs_started: AtomicU64,
    pub jobs_skipped: AtomicU64,
    /// Failed device slots summed over all socket and light polls.
    pub device_failures: AtomicU64,
}

/// Runs `job` in its own task unless the previous run behind `flag` is still in flight.
pub fn run_guarded<F>(
    name: &'static str,
    flag: &BusyFlag,
    stats: &Arc<SchedulerStats>,
    job: F,
) -> Option<tokio::task::JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let Some(guard) = flag.try_start() else {
        stats.jobs_skipped.fetch_add(1, Ordering::Relaxed);
        debug!(job = name, "previous run still in flight; tick skipped");
        return None;
    };
    stats.jobs_started.fetch_add(1, Ordering::Relaxed);
    Some(tokio::spawn(async move {
        let _guard = guard;
        job.await;
    }))
}

#[derive(Default)]
struct Flags {
    sockets: BusyFlag,
    lights: BusyFlag,
    inverter: BusyFlag,
    days: BusyFlag,
    months: BusyFlag,
    guide: BusyFlag,
}

pub fn spawn(
    services: Arc<HubServices>,
    config: WorkerConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let WorkerConfig {
        interval_secs,
        history_every_ticks,
        stats_log_interval_secs,
        prewarm_schedule,
    } = config;

    let worker_span = tracing::span!(tracing::Level::DEBUG, "worker", interval_secs);
    let history_every_ticks = history_every_ticks.max(1);

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let (prewarm_tx, mut prewarm_rx) = mpsc::channel::<()>(1);
        if let Some(schedule) = prewarm_schedule {
            tokio::spawn(prewarm_scheduler(schedule, prewarm_tx));
        }

        let flags = Flags::default();
        let stats = Arc::new(SchedulerStats::default());
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    for (group, flag) in [
                        (DeviceGroup::Sockets, &flags.sockets),
                        (DeviceGroup::Lights, &flags.lights),
                    ] {
                        let s = services.clone();
                        let st = stats.clone();
                        run_guarded(group.as_str(), flag, &stats, async move {
                            let result = s.refresh_group(group).await;
                            st.device_failures
                                .fetch_add(result.failures() as u64, Ordering::Relaxed);
                        });
                    }

                    let s = services.clone();
                    run_guarded("inverter", &flags.inverter, &stats, async move {
                        refresh_inverter(&s).await;
                    });

                    if ticks % history_every_ticks == 0 {
                        let s = services.clone();
                        run_guarded("history_days", &flags.days, &stats, async move {
                            s.day_history.refresh(Local::now().date_naive()).await;
                        });
                        let s = services.clone();
                        run_guarded("history_months", &flags.months, &stats, async move {
                            s.month_history.refresh(Local::now().date_naive()).await;
                        });
                    }
                    ticks = ticks.wrapping_add(1);
                }
                Some(()) = prewarm_rx.recv() => {
                    let s = services.clone();
                    run_guarded("guide_prewarm", &flags.guide, &stats, async move {
                        prewarm_guide(&s).await;
                    });
                }
                _ = stats_log_tick.tick() => {
                    info!(
                        ticks,
                        jobs_started = stats.jobs_started.load(Ordering::Relaxed),
                        jobs_skipped = stats.jobs_skipped.load(Ordering::Relaxed),
                        device_failures = stats.device_failures.load(Ordering::Relaxed),
                        "scheduler stats"
                    );
                }
                _ = &mut shutdown_rx => {
                    debug!("Worker shutting down");
                    break;
                }
            }
        }
    }
    .instrument(worker_span))
}

/// Warms the inverter caches so dashboard reads never wait on a cold fetch.
async fn refresh_inverter(services: &HubServices) {
    let inverter = &services.inverter;
    if let Err(e) = inverter.params().await {
        warn!(error = %e, operation = "inverter_params", "inverter params refresh failed");
    }
    if let Err(e) = inverter.stats(Local::now().date_naive()).await {
        warn!(error = %e, operation = "inverter_stats", "inverter stats refresh failed");
    }
    if let Err(e) = inverter.work_mode().await {
        warn!(error = %e, operation = "inverter_work_mode", "inverter work mode refresh failed");
    }
}

/// Looks up the current hour slot and, unless it is the last hour of the day, the next one.
pub async fn prewarm_guide(services: &HubServices) {
    let now = Local::now().naive_local();
    let mut slots = vec![slot_key(now)];
    if now.hour() != 23 {
        slots.push(slot_key(now + ChronoDuration::hours(1)));
    }
    for slot in slots {
        match services.guide.lookup(&slot).await {
            Ok(entries) => debug!(slot = %slot, entries = entries.len(), "guide slot warmed"),
            Err(e) => warn!(slot = %slot, error = %e, operation = "guide_prewarm", "guide prewarm failed"),
        }
    }
}

/// Sends a message on `tx` at each prewarm time. Uses local time for cron.
async fn prewarm_scheduler(schedule: String, tx: mpsc::Sender<()>) {
    let Ok(schedule) = cron::Schedule::from_str(&schedule) else {
        warn!(cron = %schedule, "invalid guide prewarm schedule; prewarm will not run");
        return;
    };
    loop {
        let now = Local::now();
        let Some(next) = schedule.after(&now).next() else {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            continue;
        };
        let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
        tokio::time::sleep(delay).await;
        if tx.send(()).await.is_err() {
            break;
        }
    }
}
