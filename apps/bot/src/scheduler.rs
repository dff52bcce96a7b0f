//! Daily trigger for the reminder scan.
//!
//! One fixed cron time in the configured zone. The loop awaits each scan
//! inline, so firings never overlap. A persisted watermark (last completed
//! scan date) stops a restart from scanning the same day twice and lets a
//! restart after the trigger time catch up on a missed day.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tracing::{debug, error, info, warn};

use crate::reminders::ScanEngine;
use crate::store::RecordStore;

/// Upper bound on a single sleep, so wall-clock jumps (suspend, NTP) are noticed.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct DailyTrigger {
    schedule: Schedule,
    timezone: Tz,
    at: NaiveTime,
}

impl DailyTrigger {
    pub fn new(hour: u32, minute: u32, timezone: Tz) -> anyhow::Result<Self> {
        let at = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow::anyhow!("invalid trigger time {hour}:{minute}"))?;
        let schedule = Schedule::from_str(&format!("0 {minute} {hour} * * *"))?;
        Ok(Self {
            schedule,
            timezone,
            at,
        })
    }

    /// The first trigger instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&now.with_timezone(&self.timezone))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }

    /// The calendar date at `now` in the configured zone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// Whether today's trigger time has already passed at `now`.
    pub fn passed_today(&self, now: DateTime<Utc>) -> bool {
        now.with_timezone(&self.timezone).time() >= self.at
    }
}

/// A scan is due unless one already completed for `today` (or later).
pub fn scan_due(last_scan: Option<NaiveDate>, today: NaiveDate) -> bool {
    last_scan.map_or(true, |last| last < today)
}

/// Fire once today's trigger time has passed and today's scan has not run.
///
/// Decided from the wall clock on every wake rather than from cron
/// instants, so a trigger time inside a DST spring-forward gap still fires
/// (at the first wake after the gap) and a restart catches up.
pub fn should_fire(passed_today: bool, last_scan: Option<NaiveDate>, today: NaiveDate) -> bool {
    passed_today && scan_due(last_scan, today)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Armed,
    Firing,
}

pub struct Scheduler {
    trigger: DailyTrigger,
    engine: ScanEngine,
    store: Arc<dyn RecordStore>,
    state: TriggerState,
    /// Last day this process finished (or found finished) a scan; spares a
    /// watermark read on every wake.
    settled: Option<NaiveDate>,
}

impl Scheduler {
    pub fn new(trigger: DailyTrigger, engine: ScanEngine, store: Arc<dyn RecordStore>) -> Self {
        Self {
            trigger,
            engine,
            store,
            state: TriggerState::Armed,
            settled: None,
        }
    }

    /// Runs forever, waking at the next trigger instant or after
    /// `POLL_INTERVAL`, whichever is sooner.
    pub async fn run(mut self) {
        loop {
            if self.tick(Utc::now()).await {
                debug!("Scheduler back to {:?}", self.state());
            }

            let now = Utc::now();
            let wait = self
                .trigger
                .next_after(now)
                .and_then(|at| (at - now).to_std().ok())
                .map_or(POLL_INTERVAL, |d| d.min(POLL_INTERVAL));
            tokio::time::sleep(wait).await;
        }
    }

    /// One wake of the loop at `now`. Returns whether a scan completed.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let today = self.trigger.local_date(now);
        let passed = self.trigger.passed_today(now);
        if !should_fire(passed, self.settled, today) {
            return false;
        }

        let last_scan = match self.store.last_scan_date().await {
            Ok(last) => last,
            Err(e) => {
                warn!("Could not read scan watermark, scanning anyway: {e}");
                None
            }
        };
        if !should_fire(passed, last_scan, today) {
            info!("Scan for {today} already completed, skipping");
            self.settled = Some(today);
            return false;
        }

        let completed = self.fire(today).await;
        if completed {
            self.settled = Some(today);
        }
        completed
    }

    /// Runs the scan for `today` and advances the watermark.
    /// Returns whether the scan completed; an aborted scan is retried on the
    /// next wake.
    async fn fire(&mut self, today: NaiveDate) -> bool {
        self.state = TriggerState::Firing;
        let completed = match self.engine.run_scan(today).await {
            Ok(_) => {
                if let Err(e) = self.store.mark_scanned(today).await {
                    error!("Failed to record scan watermark for {today}: {e}");
                }
                true
            }
            Err(e) => {
                error!("Reminder scan for {today} aborted: {e}");
                false
            }
        };
        self.state = TriggerState::Armed;
        completed
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }
}
