//! Background compliance monitor.
//!
//! A long-lived loop: evaluate, maybe escalate, sleep. Errors (including a
//! panicking cycle) switch the next sleep to the shorter backoff interval
//! and never end the loop. Cancellation is observed only while sleeping, so
//! an evaluation in flight always runs to completion first.
//!
//! ```text
//! Idle -> Evaluating -> Sleeping | ErrorBackoff -> Evaluating -> ...
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::compliance::{self, ComplianceReport};
use crate::error::Result;
use crate::notify::{EscalationComposer, NotificationPayload, Notifier};
use crate::schedule::ScheduleStore;
use crate::storage::Config;
use crate::study::StudyLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    Idle,
    Evaluating,
    Sleeping,
    ErrorBackoff,
    Stopped,
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// No test with subjects inside the window.
    NothingDue,
    /// Everything due was studied today.
    Clear,
    Escalated {
        payload: NotificationPayload,
        /// Delivery id, or `None` if notifications are disabled.
        delivery_id: Option<u32>,
        report: ComplianceReport,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    NothingDue,
    Clear,
    Escalated,
}

impl CycleOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            CycleOutcome::NothingDue => OutcomeKind::NothingDue,
            CycleOutcome::Clear => OutcomeKind::Clear,
            CycleOutcome::Escalated { .. } => OutcomeKind::Escalated,
        }
    }
}

/// Snapshot published after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorState {
    pub phase: MonitorPhase,
    pub cycles: u64,
    pub escalations: u64,
    pub errors: u64,
    pub last_outcome: Option<OutcomeKind>,
    pub last_error: Option<String>,
    /// Length of the current or most recent sleep.
    pub sleep_for: Option<Duration>,
    pub next_wake: Option<DateTime<Local>>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            phase: MonitorPhase::Idle,
            cycles: 0,
            escalations: 0,
            errors: 0,
            last_outcome: None,
            last_error: None,
            sleep_for: None,
            next_wake: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub check_interval: Duration,
    pub error_backoff: Duration,
    pub window_days: i64,
    pub retention_days: i64,
    pub sweep_on_cycle: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            check_interval: config.monitor.check_interval(),
            error_backoff: config.monitor.error_backoff(),
            window_days: config.monitor.window_days,
            retention_days: config.retention.study_record_days,
            sweep_on_cycle: config.retention.sweep_on_cycle,
        }
    }
}

pub struct BackgroundMonitor {
    schedule: ScheduleStore,
    ledger: StudyLedger,
    composer: EscalationComposer,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    settings: MonitorSettings,
    state: watch::Sender<MonitorState>,
}

impl BackgroundMonitor {
    pub fn new(
        schedule: ScheduleStore,
        ledger: StudyLedger,
        composer: EscalationComposer,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        settings: MonitorSettings,
    ) -> Self {
        let (state, _) = watch::channel(MonitorState::default());
        Self {
            schedule,
            ledger,
            composer,
            notifier,
            clock,
            settings,
            state,
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> MonitorState {
        self.state.borrow().clone()
    }

    /// One evaluation: optional retention sweep, compliance check, and at
    /// most one threat notification.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        if self.settings.sweep_on_cycle {
            self.ledger.purge_older_than(self.settings.retention_days)?;
        }

        let entries = self.schedule.list()?;
        let records = self.ledger.records()?;
        let report = compliance::evaluate(
            self.clock.today(),
            &entries,
            &records,
            self.settings.window_days,
        );

        if report.global_clear {
            tracing::debug!(due = report.due_this_week.len(), "all due subjects studied today");
            return Ok(CycleOutcome::Clear);
        }
        if !report.needs_escalation() {
            tracing::debug!("no tests within the window");
            return Ok(CycleOutcome::NothingDue);
        }

        tracing::info!(outstanding = %report.summary(), "tests still need study, escalating");
        let payload = self.composer.compose_threat(&report.outstanding).await;
        let delivery_id = self.notifier.deliver(&payload)?;
        Ok(CycleOutcome::Escalated {
            payload,
            delivery_id,
            report,
        })
    }

    fn publish(&self, f: impl FnOnce(&mut MonitorState)) {
        self.state.send_modify(f);
    }

    /// Loop until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(
            check_interval_secs = self.settings.check_interval.as_secs(),
            error_backoff_secs = self.settings.error_backoff.as_secs(),
            "compliance monitor started"
        );

        while !shutdown.is_cancelled() {
            self.publish(|s| s.phase = MonitorPhase::Evaluating);

            // A separate task so that a panicking cycle is reported as an error.
            let this = Arc::clone(&self);
            let result = match tokio::spawn(async move { this.run_cycle().await }).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(join_err) => Err(format!("monitor cycle aborted: {join_err}")),
            };

            let (phase, delay) = match result {
                Ok(outcome) => {
                    let kind = outcome.kind();
                    self.publish(|s| {
                        s.cycles += 1;
                        s.last_outcome = Some(kind);
                        if kind == OutcomeKind::Escalated {
                            s.escalations += 1;
                        }
                    });
                    (MonitorPhase::Sleeping, self.settings.check_interval)
                }
                Err(message) => {
                    tracing::error!(error = %message, "monitor cycle failed, backing off");
                    self.publish(|s| {
                        s.cycles += 1;
                        s.errors += 1;
                        s.last_error = Some(message);
                    });
                    (MonitorPhase::ErrorBackoff, self.settings.error_backoff)
                }
            };

            let next_wake = wake_at(self.clock.now(), delay);
            self.publish(|s| {
                s.phase = phase;
                s.sleep_for = Some(delay);
                s.next_wake = next_wake;
            });

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.publish(|s| {
            s.phase = MonitorPhase::Stopped;
            s.next_wake = None;
        });
        tracing::info!("compliance monitor stopped");
    }

    /// Run on the current tokio runtime.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

/// `None` when `now + delay` is not a representable time.
fn wake_at(now: DateTime<Local>, delay: Duration) -> Option<DateTime<Local>> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
}

impl std::fmt::Debug for BackgroundMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundMonitor")
            .field("settings", &self.settings)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::StorageError;
    use crate::generation::OfflineGenerator;
    use crate::notify::{FixedSampler, PayloadKind, RecordingSink};
    use crate::schedule::{format_test_date, ScheduleEntry, StudyItem};
    use crate::storage::{KvStore, MemoryKvStore};
    use chrono::NaiveDate;

    #[test]
    fn wake_time_saturates_instead_of_overflowing() {
        let now = FixedClock::at_noon(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()).now();
        assert_eq!(
            wake_at(now, Duration::from_secs(30 * 60)),
            Some(now + chrono::Duration::minutes(30))
        );
        let huge = Duration::from_secs(i64::MAX as u64 / 1000 - 1);
        assert_eq!(wake_at(now, huge), None);
        assert_eq!(wake_at(now, Duration::MAX), None);
    }

    struct BrokenStore;

    impl KvStore for BrokenStore {
        fn get_string(&self, _: &str, _: &str) -> std::result::Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disk on fire".into()))
        }
        fn set_string(&self, _: &str, _: &str, _: &str) -> std::result::Result<(), StorageError> {
            Err(StorageError::Unavailable("disk on fire".into()))
        }
        fn remove(&self, _: &str, _: &str) -> std::result::Result<(), StorageError> {
            Err(StorageError::Unavailable("disk on fire".into()))
        }
        fn clear_partition(&self, _: &str) -> std::result::Result<(), StorageError> {
            Err(StorageError::Unavailable("disk on fire".into()))
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    struct Harness {
        monitor: Arc<BackgroundMonitor>,
        schedule: ScheduleStore,
        ledger: StudyLedger,
        sink: Arc<RecordingSink>,
    }

    fn harness(kv: Arc<dyn KvStore>) -> Harness {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_noon(today()));
        let schedule = ScheduleStore::new(kv.clone(), clock.clone());
        let ledger = StudyLedger::new(kv, clock.clone());
        let sampler = Arc::new(FixedSampler::new(0));
        let composer = EscalationComposer::new(
            Arc::new(OfflineGenerator),
            sampler.clone(),
            Duration::from_secs(5),
        );
        let sink = Arc::new(RecordingSink::new());
        let notifier = Notifier::new(sink.clone(), sampler);
        let monitor = Arc::new(BackgroundMonitor::new(
            schedule.clone(),
            ledger.clone(),
            composer,
            notifier,
            clock,
            MonitorSettings::default(),
        ));
        Harness {
            monitor,
            schedule,
            ledger,
            sink,
        }
    }

    #[tokio::test]
    async fn cycle_outcomes_follow_compliance() {
        let h = harness(Arc::new(MemoryKvStore::new()));
        assert_eq!(h.monitor.run_cycle().await.unwrap(), CycleOutcome::NothingDue);

        let date = format_test_date(today() + chrono::Duration::days(2));
        h.schedule
            .upsert(&ScheduleEntry::new(date.clone(), ["Math"]))
            .unwrap();
        let outcome = h.monitor.run_cycle().await.unwrap();
        assert_eq!(outcome.kind(), OutcomeKind::Escalated);
        assert_eq!(h.sink.count_of(PayloadKind::Threat), 1);

        h.ledger.record_today(&StudyItem::new(date, "Math", 1)).unwrap();
        assert_eq!(h.monitor.run_cycle().await.unwrap(), CycleOutcome::Clear);
        assert_eq!(h.sink.count_of(PayloadKind::Threat), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_escalates_every_interval_until_cancelled() {
        let h = harness(Arc::new(MemoryKvStore::new()));
        let date = format_test_date(today() + chrono::Duration::days(1));
        h.schedule.upsert(&ScheduleEntry::new(date, ["Math"])).unwrap();

        let shutdown = CancellationToken::new();
        let mut rx = h.monitor.subscribe();
        let handle = Arc::clone(&h.monitor).spawn(shutdown.clone());

        rx.wait_for(|s| s.cycles >= 3 && s.phase == MonitorPhase::Sleeping)
            .await
            .unwrap();
        shutdown.cancel();
        handle.await.unwrap();

        let state = h.monitor.state();
        assert_eq!(state.phase, MonitorPhase::Stopped);
        assert_eq!(state.errors, 0);
        assert_eq!(state.escalations, state.cycles);
        assert_eq!(h.sink.count_of(PayloadKind::Threat) as u64, state.cycles);
        assert_eq!(state.sleep_for, Some(Duration::from_secs(30 * 60)));
    }

    #[tokio::test(start_paused = true)]
    async fn storage_failure_backs_off_and_keeps_running() {
        let h = harness(Arc::new(BrokenStore));
        let shutdown = CancellationToken::new();
        let mut rx = h.monitor.subscribe();
        let handle = Arc::clone(&h.monitor).spawn(shutdown.clone());

        rx.wait_for(|s| s.errors >= 2 && s.phase == MonitorPhase::ErrorBackoff)
            .await
            .unwrap();
        let state = h.monitor.state();
        assert_eq!(state.sleep_for, Some(Duration::from_secs(10 * 60)));
        assert!(state.last_error.unwrap().contains("disk on fire"));

        shutdown.cancel();
        handle.await.unwrap();
        assert!(h.sink.delivered().is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let h = harness(Arc::new(MemoryKvStore::new()));
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        Arc::clone(&h.monitor).run(shutdown).await;
        let state = h.monitor.state();
        assert_eq!(state.cycles, 0);
        assert_eq!(state.phase, MonitorPhase::Stopped);
    }
}
