//! Calendar scheduler for the batch jobs
//!
//! Two background tasks: the daily accrual fires every day at a configured
//! UTC time, the monthly credit fires on a configured day of the month
//! (clamped to the last day of short months). All times are UTC; there is
//! no DST ambiguity. Missed fire times are not replayed after a restart.
//!
//! Run exactly one scheduler instance per deployment. The jobs go through
//! the same actor mailbox as interactive operations, so a second instance
//! would not corrupt state, but the accrual would run once per instance.

use crate::{config::SchedulerConfig, ledger::Ledger};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Days in the given month, accounting for leap years
fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
                29
            } else {
                28
            }
        }
    }
}

/// Fire time on a given date. Out-of-range hour/minute are clamped.
fn fire_time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0)
        .unwrap_or(NaiveTime::MIN)
}

/// Next strictly-after-`after` daily fire at `hour:minute` UTC
pub fn next_daily(after: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let candidate = Utc.from_utc_datetime(&after.date_naive().and_time(fire_time(hour, minute)));
    if candidate > after {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

/// Next strictly-after-`after` monthly fire on `day` at `hour:minute` UTC.
/// `day` is clamped to the last day of each month, so 31 fires on Feb 28/29,
/// Apr 30, and so on.
pub fn next_monthly(after: DateTime<Utc>, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    let day = day.max(1);
    let time = fire_time(hour, minute);

    let in_month = |year: i32, month: u32| -> Option<DateTime<Utc>> {
        let clamped = day.min(days_in_month(year, month));
        NaiveDate::from_ymd_opt(year, month, clamped)
            .map(|d| Utc.from_utc_datetime(&d.and_time(time)))
    };

    let (mut year, mut month) = (after.year(), after.month());
    if let Some(candidate) = in_month(year, month) {
        if candidate > after {
            return candidate;
        }
    }
    if month == 12 {
        year += 1;
        month = 1;
    } else {
        month += 1;
    }
    // Every month has a clamped day, so this always resolves
    in_month(year, month).unwrap_or(after + Duration::days(30))
}

/// Background scheduler driving the daily accrual and the monthly credit
pub struct Scheduler {
    /// Shutdown signal
    shutdown: watch::Sender<bool>,

    /// Background task handles
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Start the scheduler tasks
    pub fn start(ledger: Arc<Ledger>, config: SchedulerConfig) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        if config.run_on_startup {
            tasks.push(tokio::spawn(startup_pass(ledger.clone(), config.clone())));
        }

        tasks.push(tokio::spawn(daily_loop(
            ledger.clone(),
            config.clone(),
            shutdown_rx.clone(),
        )));
        tasks.push(tokio::spawn(monthly_loop(ledger, config, shutdown_rx)));

        Self { shutdown, tasks }
    }

    /// Signal shutdown and wait for the tasks to stop
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!("Scheduler stopped");
    }
}

/// One accrual and one credit pass right after startup (demo bootstrap)
async fn startup_pass(ledger: Arc<Ledger>, config: SchedulerConfig) {
    tracing::info!("Running batch jobs on startup");
    if let Err(e) = ledger.run_daily_accrual(Utc::now()).await {
        tracing::error!(error = %e, "Startup accrual failed");
    }
    if let Err(e) = ledger.run_monthly_credit(Utc::now(), config.lookback_days).await {
        tracing::error!(error = %e, "Startup credit failed");
    }
}

async fn daily_loop(
    ledger: Arc<Ledger>,
    config: SchedulerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now();
        let next = next_daily(now, config.accrual_hour, config.accrual_minute);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!(next = %next, "Daily accrual scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                if let Err(e) = ledger.run_daily_accrual(Utc::now()).await {
                    tracing::error!(error = %e, "Daily accrual run failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn monthly_loop(
    ledger: Arc<Ledger>,
    config: SchedulerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now();
        let next = next_monthly(
            now,
            config.credit_day_of_month,
            config.credit_hour,
            config.credit_minute,
        );
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!(next = %next, "Monthly credit scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                if let Err(e) = ledger.run_monthly_credit(Utc::now(), config.lookback_days).await {
                    tracing::error!(error = %e, "Monthly credit run failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
