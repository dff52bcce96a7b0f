//! Reminder Scan Engine: one pass over every owner's records, producing at
//! most one batched message per owner.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::dates::{lookahead_day, occurrence_for, EventKind};
use crate::errors::StoreError;
use crate::models::record::Record;
use crate::notifier::{DeliveryError, Notifier};
use crate::reminders::format::format_line;
use crate::store::RecordStore;

/// Sends in flight at once; keeps the daily burst under Telegram's per-bot
/// rate limit.
pub const MAX_CONCURRENT_DELIVERIES: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct ReminderSettings {
    pub lead_days: u32,
    pub show_zero_anniversary: bool,
}

/// Outcome of one scan, for logging and the scheduler's watermark decision.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub owners_scanned: usize,
    pub owners_failed: usize,
    pub lines: usize,
    pub messages_delivered: usize,
    pub deliveries_failed: usize,
}

pub struct ScanEngine {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    settings: ReminderSettings,
    delivery_timeout: Duration,
}

impl ScanEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        settings: ReminderSettings,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            settings,
            delivery_timeout,
        }
    }

    /// Scans every owner as of `today` (a date in the configured zone).
    ///
    /// Fails only if the owner list itself cannot be read. A store error for
    /// one owner skips that owner; a delivery error is logged and counted.
    pub async fn run_scan(&self, today: NaiveDate) -> Result<ScanReport, StoreError> {
        let lead_days = self.settings.lead_days;
        match lookahead_day(today, lead_days) {
            Some(target) => info!(
                "Checking reminders for {today} (anniversaries on {})",
                target.format("%d.%m")
            ),
            None => warn!("Lookahead from {today} by {lead_days} days is out of range"),
        }

        let owners = self.store.list_owners().await?;
        let mut report = ScanReport::default();
        let mut deliveries = JoinSet::new();
        let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_DELIVERIES));

        for owner in owners {
            let records = match self.store.list_records(owner).await {
                Ok(records) => records,
                Err(e) => {
                    warn!("Skipping owner {owner}: {e}");
                    report.owners_failed += 1;
                    continue;
                }
            };
            report.owners_scanned += 1;

            let lines = compose_lines(&records, today, &self.settings);
            if lines.is_empty() {
                continue;
            }
            report.lines += lines.len();

            let notifier = Arc::clone(&self.notifier);
            let permits = Arc::clone(&permits);
            let deadline = self.delivery_timeout;
            deliveries.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                let text = lines.join("\n");
                let outcome =
                    match tokio::time::timeout(deadline, notifier.deliver(owner, &text)).await {
                        Ok(result) => result,
                        Err(_) => Err(DeliveryError::Timeout),
                    };
                (owner, outcome)
            });
        }

        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.messages_delivered += 1,
                Ok((owner, Err(e))) => {
                    error!("Failed to deliver reminders to owner {owner}: {e}");
                    report.deliveries_failed += 1;
                }
                Err(e) => {
                    error!("Delivery task panicked: {e}");
                    report.deliveries_failed += 1;
                }
            }
        }

        info!(
            "Scan for {today} done: {} owners, {} lines, {} delivered, {} delivery failures, {} owners skipped",
            report.owners_scanned,
            report.lines,
            report.messages_delivered,
            report.deliveries_failed,
            report.owners_failed
        );
        Ok(report)
    }
}

/// Reminder lines for one owner's records, birth before death per record.
pub fn compose_lines(
    records: &[Record],
    today: NaiveDate,
    settings: &ReminderSettings,
) -> Vec<String> {
    records
        .iter()
        .flat_map(|record| {
            [EventKind::Birth, EventKind::Death]
                .into_iter()
                .filter_map(move |kind| occurrence_for(record, kind, today, settings.lead_days))
                .map(move |occ| format_line(record, &occ, settings))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    use crate::models::record::{NewRecord, OwnerKey};
    use crate::store::memory::MemoryRecordStore;

    type Delivered = (OwnerKey, String);

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Delivered>>,
        failing_owner: Option<OwnerKey>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, owner: OwnerKey, text: &str) -> Result<(), DeliveryError> {
            if self.failing_owner == Some(owner) {
                return Err(DeliveryError::Api {
                    status: 403,
                    description: "Forbidden: bot was blocked by the user".to_string(),
                });
            }
            self.sent.lock().await.push((owner, text.to_string()));
            Ok(())
        }
    }

    struct SlowNotifier;

    #[async_trait]
    impl Notifier for SlowNotifier {
        async fn deliver(&self, _owner: OwnerKey, _text: &str) -> Result<(), DeliveryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct PeakNotifier {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for PeakNotifier {
        async fn deliver(&self, _owner: OwnerKey, _text: &str) -> Result<(), DeliveryError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    const SETTINGS: ReminderSettings = ReminderSettings {
        lead_days: 3,
        show_zero_anniversary: true,
    };

    async fn add(
        store: &MemoryRecordStore,
        owner: OwnerKey,
        name: &str,
        birth: Option<NaiveDate>,
        death: Option<NaiveDate>,
    ) {
        store
            .add_record(
                owner,
                NewRecord {
                    full_name: name.to_string(),
                    birth,
                    death,
                },
            )
            .await
            .unwrap();
    }

    fn engine(store: Arc<MemoryRecordStore>, notifier: Arc<dyn Notifier>) -> ScanEngine {
        ScanEngine::new(store, notifier, SETTINGS, Duration::from_secs(5))
    }

    async fn sorted(notifier: &RecordingNotifier) -> Vec<Delivered> {
        let mut sent = notifier.sent.lock().await.clone();
        sent.sort();
        sent
    }

    #[tokio::test]
    async fn test_end_to_end_birth_reminder() {
        let store = Arc::new(MemoryRecordStore::default());
        add(&store, 100, "A", Some(ymd(1990, 1, 4)), None).await;
        let notifier = Arc::new(RecordingNotifier::default());

        let report = engine(store, notifier.clone()).run_scan(ymd(2024, 1, 1)).await.unwrap();

        let sent = sorted(&notifier).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 100);
        assert!(sent[0].1.contains("дата рождения"));
        assert!(sent[0].1.contains("<b>A</b>"));
        assert!(sent[0].1.contains("(дата: 04.01)"));
        assert!(sent[0].1.contains("34-я годовщина"));
        assert_eq!(report.lines, 1);
        assert_eq!(report.messages_delivered, 1);
    }

    #[tokio::test]
    async fn test_birth_and_death_same_day_yield_two_lines() {
        let store = Arc::new(MemoryRecordStore::default());
        add(&store, 1, "Twice", Some(ymd(1930, 1, 4)), Some(ymd(2000, 1, 4))).await;
        let notifier = Arc::new(RecordingNotifier::default());

        engine(store, notifier.clone()).run_scan(ymd(2024, 1, 1)).await.unwrap();

        let sent = sorted(&notifier).await;
        assert_eq!(sent.len(), 1);
        let lines: Vec<_> = sent[0].1.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("дата рождения"));
        assert!(lines[1].contains("дата смерти"));
    }

    #[tokio::test]
    async fn test_lines_for_one_owner_are_batched() {
        let store = Arc::new(MemoryRecordStore::default());
        add(&store, 1, "A", Some(ymd(1950, 1, 4)), None).await;
        add(&store, 1, "B", None, Some(ymd(1999, 1, 4))).await;
        add(&store, 1, "C", Some(ymd(1950, 6, 1)), None).await;
        let notifier = Arc::new(RecordingNotifier::default());

        engine(store, notifier.clone()).run_scan(ymd(2024, 1, 1)).await.unwrap();

        let sent = sorted(&notifier).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.lines().count(), 2);
        assert!(!sent[0].1.contains("<b>C</b>"));
    }

    #[tokio::test]
    async fn test_owner_without_matches_gets_no_delivery() {
        let store = Arc::new(MemoryRecordStore::default());
        add(&store, 1, "A", Some(ymd(1990, 1, 4)), None).await;
        add(&store, 2, "B", Some(ymd(1990, 1, 5)), None).await;
        add(&store, 3, "C", None, None).await;
        let notifier = Arc::new(RecordingNotifier::default());

        let report = engine(store, notifier.clone()).run_scan(ymd(2024, 1, 1)).await.unwrap();

        let owners: Vec<_> = sorted(&notifier).await.into_iter().map(|(o, _)| o).collect();
        assert_eq!(owners, vec![1]);
        assert_eq!(report.owners_scanned, 3);
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_abort_scan() {
        let store = Arc::new(MemoryRecordStore::default());
        for owner in 1..=3 {
            add(&store, owner, "A", Some(ymd(1990, 1, 4)), None).await;
        }
        let notifier = Arc::new(RecordingNotifier {
            failing_owner: Some(2),
            ..Default::default()
        });

        let report = engine(store, notifier.clone()).run_scan(ymd(2024, 1, 1)).await.unwrap();

        let owners: Vec<_> = sorted(&notifier).await.into_iter().map(|(o, _)| o).collect();
        assert_eq!(owners, vec![1, 3]);
        assert_eq!(report.messages_delivered, 2);
        assert_eq!(report.deliveries_failed, 1);
    }

    #[tokio::test]
    async fn test_store_failure_skips_only_that_owner() {
        let store = Arc::new(MemoryRecordStore::default());
        add(&store, 1, "A", Some(ymd(1990, 1, 4)), None).await;
        add(&store, 2, "B", Some(ymd(1990, 1, 4)), None).await;
        store.fail_listing_for(1).await;
        let notifier = Arc::new(RecordingNotifier::default());

        let report = engine(store, notifier.clone()).run_scan(ymd(2024, 1, 1)).await.unwrap();

        let owners: Vec<_> = sorted(&notifier).await.into_iter().map(|(o, _)| o).collect();
        assert_eq!(owners, vec![2]);
        assert_eq!(report.owners_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_deliveries_are_capped() {
        let store = Arc::new(MemoryRecordStore::default());
        for owner in 1..=40 {
            add(&store, owner, "A", Some(ymd(1990, 1, 4)), None).await;
        }
        let notifier = Arc::new(PeakNotifier::default());

        let report = engine(store, notifier.clone()).run_scan(ymd(2024, 1, 1)).await.unwrap();

        assert_eq!(report.messages_delivered, 40);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 40);
        let peak = notifier.peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= MAX_CONCURRENT_DELIVERIES, "peak was {peak}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delivery_times_out() {
        let store = Arc::new(MemoryRecordStore::default());
        add(&store, 1, "A", Some(ymd(1990, 1, 4)), None).await;

        let report = engine(store, Arc::new(SlowNotifier)).run_scan(ymd(2024, 1, 1)).await.unwrap();

        assert_eq!(report.deliveries_failed, 1);
        assert_eq!(report.messages_delivered, 0);
    }

    #[test]
    fn test_compose_lines_handles_leap_day_in_common_year() {
        let record = Record {
            id: 1,
            owner: 1,
            full_name: "Leap".to_string(),
            birth: Some(ymd(2000, 2, 29)),
            death: None,
            created_at: chrono::Utc::now(),
        };
        let lines = compose_lines(&[record], ymd(2021, 2, 25), &SETTINGS);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("(дата: 28.02) — 21-я годовщина"));
    }
}
