//! Application facade.
//!
//! Wires the stores, generator, composer and notifier together from one
//! [`Config`]. Front-ends issue commands here and render the snapshots that
//! come back; they never hold authoritative state of their own.

use std::sync::Arc;

use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::compliance::{self, ComplianceReport};
use crate::countdown::{self, Countdown};
use crate::error::Result;
use crate::generation::{GeminiGenerator, OfflineGenerator, TextGenerator};
use crate::monitor::{BackgroundMonitor, MonitorSettings};
use crate::notify::{
    EscalationComposer, HistorySink, NotificationHistory, NotificationPayload, NotificationSink,
    Notifier, RandomSampler, Sampler,
};
use crate::quiz::QuizWorkflow;
use crate::schedule::{self, ScheduleStore, ScheduleView, StudyItem};
use crate::storage::{ApiKeyStore, Config, KvStore, SqliteKvStore};
use crate::study::{self, StudyLedger};

/// A study candidate and whether it already counts for today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyCandidate {
    #[serde(flatten)]
    pub item: StudyItem,
    pub studied_today: bool,
}

/// Everything a status screen shows.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub compliance: ComplianceReport,
    pub countdown: Countdown,
    pub countdown_text: String,
    pub api_key_configured: bool,
}

pub struct PanicTutor {
    config: Config,
    clock: Arc<dyn Clock>,
    schedule: ScheduleStore,
    ledger: StudyLedger,
    keys: ApiKeyStore,
    history: NotificationHistory,
    composer: EscalationComposer,
    notifier: Notifier,
}

impl PanicTutor {
    /// Assemble from explicit collaborators. Every delivery through `sink`
    /// is also appended to the notification history.
    pub fn new(
        config: Config,
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn TextGenerator>,
        sink: Arc<dyn NotificationSink>,
        sampler: Arc<dyn Sampler>,
    ) -> Self {
        let schedule = ScheduleStore::new(kv.clone(), clock.clone())
            .with_lock_window(config.schedule.lock_window_days);
        let ledger = StudyLedger::new(kv.clone(), clock.clone());
        let keys = ApiKeyStore::new(kv.clone(), config.generation.credential_backend);
        let history = NotificationHistory::new(kv, config.notifications.history_limit);
        let recorded: Arc<dyn NotificationSink> =
            Arc::new(HistorySink::new(sink, history.clone(), clock.clone()));
        let composer = EscalationComposer::new(generator, sampler.clone(), config.generation.timeout());
        let notifier = Notifier::new(recorded, sampler).with_config(&config.notifications);

        Self {
            config,
            clock,
            schedule,
            ledger,
            keys,
            history,
            composer,
            notifier,
        }
    }

    /// Open the on-disk database and the configured generator.
    pub fn open(config: Config, sink: Arc<dyn NotificationSink>) -> Result<Self> {
        let kv: Arc<dyn KvStore> = Arc::new(SqliteKvStore::open()?);
        let keys = ApiKeyStore::new(kv.clone(), config.generation.credential_backend);
        let generator: Arc<dyn TextGenerator> = match GeminiGenerator::new(&config.generation, keys) {
            Ok(g) => Arc::new(g),
            Err(e) => {
                tracing::warn!(error = %e, "text generator unavailable, using fallback content only");
                Arc::new(OfflineGenerator)
            }
        };
        Ok(Self::new(
            config,
            kv,
            Arc::new(SystemClock),
            generator,
            sink,
            Arc::new(RandomSampler),
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn schedule(&self) -> &ScheduleStore {
        &self.schedule
    }

    pub fn ledger(&self) -> &StudyLedger {
        &self.ledger
    }

    pub fn keys(&self) -> &ApiKeyStore {
        &self.keys
    }

    pub fn history(&self) -> &NotificationHistory {
        &self.history
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn compliance_report(&self) -> Result<ComplianceReport> {
        let entries = self.schedule.list()?;
        let records = self.ledger.records()?;
        Ok(compliance::evaluate(
            self.clock.today(),
            &entries,
            &records,
            self.config.monitor.window_days,
        ))
    }

    pub fn schedule_view(&self) -> Result<ScheduleView> {
        Ok(schedule::partition_by_past(
            self.schedule.list()?,
            self.clock.today(),
        ))
    }

    /// Items the user may mark as studied, flagged with today's status.
    pub fn study_candidates(&self) -> Result<Vec<StudyCandidate>> {
        let today = self.clock.today();
        let entries = self.schedule.list()?;
        let records = self.ledger.records()?;
        Ok(schedule::study_candidates(&entries, today)
            .into_iter()
            .map(|item| StudyCandidate {
                studied_today: study::satisfied_on(
                    &records,
                    &item.date,
                    &item.subject,
                    item.period,
                    today,
                ),
                item,
            })
            .collect())
    }

    pub fn countdown(&self) -> Result<Countdown> {
        let entries = self.schedule.list()?;
        Ok(countdown::countdown(
            &entries,
            &self.config.timetable.starts(),
            self.clock.now(),
        ))
    }

    pub fn status(&self) -> Result<StatusReport> {
        let countdown = self.countdown()?;
        Ok(StatusReport {
            compliance: self.compliance_report()?,
            countdown_text: countdown.to_string(),
            countdown,
            api_key_configured: self.keys.is_configured(),
        })
    }

    /// Begin a quiz over `items`, in the given order.
    pub fn start_quiz(&self, items: Vec<StudyItem>) -> QuizWorkflow {
        QuizWorkflow::new(items, self.composer.clone(), self.ledger.clone())
    }

    /// Compose and deliver one reminder immediately.
    pub async fn send_reminder_now(&self) -> Result<NotificationPayload> {
        let payload = self.composer.compose_reminder().await;
        self.notifier.deliver(&payload)?;
        Ok(payload)
    }

    /// Remove every schedule entry and study record. The API key and
    /// notification history are kept.
    pub fn reset_all_data(&self) -> Result<()> {
        self.schedule.clear_all()?;
        self.ledger.clear_all()?;
        tracing::info!("schedules and study records cleared");
        Ok(())
    }

    /// A monitor sharing this instance's stores and notifier.
    pub fn monitor(&self) -> Arc<BackgroundMonitor> {
        Arc::new(BackgroundMonitor::new(
            self.schedule.clone(),
            self.ledger.clone(),
            self.composer.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            MonitorSettings::from_config(&self.config),
        ))
    }
}

impl std::fmt::Debug for PanicTutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanicTutor")
            .field("schedule", &self.schedule)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::notify::{FixedSampler, PayloadKind, RecordingSink};
    use crate::schedule::ScheduleEntry;
    use crate::storage::MemoryKvStore;
    use chrono::NaiveDate;

    fn app() -> (PanicTutor, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let app = PanicTutor::new(
            Config::default(),
            Arc::new(MemoryKvStore::new()),
            Arc::new(FixedClock::at_noon(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap())),
            Arc::new(OfflineGenerator),
            sink.clone(),
            Arc::new(FixedSampler::new(0)),
        );
        (app, sink)
    }

    #[tokio::test]
    async fn reminder_is_delivered_and_recorded() {
        let (app, sink) = app();
        let payload = app.send_reminder_now().await.unwrap();
        assert_eq!(payload.kind, PayloadKind::Reminder);
        assert_eq!(sink.delivered().len(), 1);
        assert_eq!(app.history().list().unwrap()[0].payload, payload);
    }

    #[test]
    fn reset_keeps_api_key() {
        let (app, _) = app();
        app.keys().set("secret").unwrap();
        app.schedule()
            .upsert(&ScheduleEntry::new("2026/10/20", ["Math"]))
            .unwrap();
        app.ledger()
            .record_today(&StudyItem::new("2026/10/20", "Math", 1))
            .unwrap();

        app.reset_all_data().unwrap();
        assert!(app.schedule().list().unwrap().is_empty());
        assert!(app.ledger().records().unwrap().is_empty());
        assert!(app.keys().is_configured());
    }

    #[test]
    fn candidates_show_todays_progress() {
        let (app, _) = app();
        app.schedule()
            .upsert(&ScheduleEntry::new("2026/10/20", ["Math", "Art"]))
            .unwrap();
        app.ledger()
            .record_today(&StudyItem::new("2026/10/20", "Art", 2))
            .unwrap();

        let candidates = app.study_candidates().unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(!candidates[0].studied_today);
        assert!(candidates[1].studied_today);
    }

    #[test]
    fn status_combines_views() {
        let (app, _) = app();
        app.schedule()
            .upsert(&ScheduleEntry::new("2026/10/17", ["Math"]))
            .unwrap();
        let status = app.status().unwrap();
        assert_eq!(status.compliance.outstanding.len(), 1);
        assert!(matches!(status.countdown, Countdown::Precise { hours: 21, .. }));
        assert!(!status.api_key_configured);
    }
}
