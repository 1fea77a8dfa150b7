//! Notification payloads, delivery sinks and the escalation composer.
//!
//! ## Payload kinds
//!
//! - **Reminder**: one gentle-but-urgent nudge, sent on request
//! - **Threat**: one menacing message per monitor cycle while tests are outstanding
//! - **Insult**: ten messages per wrong quiz answer, delivered back-to-back
//!
//! Composition never fails; delivery goes through a [`NotificationSink`].

mod composer;
mod history;
mod sampler;

pub use composer::{EscalationComposer, INSULTS_PER_WRONG_ANSWER};
pub use history::{HistoryEntry, HistorySink, NotificationHistory, HISTORY_PARTITION};
pub use sampler::{FixedSampler, RandomSampler, Sampler};

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::NotifyError;
use crate::storage::NotificationsConfig;

/// Vibration pattern (ms on/off) used for threats.
pub const THREAT_VIBRATION: [u64; 4] = [0, 1000, 500, 1000];
/// Red, as ARGB.
pub const THREAT_LIGHT_ARGB: u32 = 0xFFFF_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Reminder,
    Threat,
    Insult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Default,
    High,
}

/// What the delivery collaborator shows to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub kind: PayloadKind,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibration: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_argb: Option<u32>,
}

impl NotificationPayload {
    pub fn reminder(body: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Reminder,
            title: "📚 Study reminder".into(),
            body: body.into(),
            priority: Priority::Default,
            vibration: None,
            light_argb: None,
        }
    }

    pub fn threat(body: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Threat,
            title: "🚨 Runaway detected 🚨".into(),
            body: body.into(),
            priority: Priority::High,
            vibration: Some(THREAT_VIBRATION.to_vec()),
            light_argb: Some(THREAT_LIGHT_ARGB),
        }
    }

    /// `index` is 1-based.
    pub fn insult(subject: &str, index: usize, total: usize, body: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Insult,
            title: format!("💀 {subject} - wrong answer {index}/{total}"),
            body: body.into(),
            priority: Priority::Default,
            vibration: None,
            light_argb: None,
        }
    }
}

/// Displays a notification. No delivery confirmation is expected.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, id: u32, payload: &NotificationPayload) -> Result<(), NotifyError>;
}

/// Logs payloads and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn deliver(&self, id: u32, payload: &NotificationPayload) -> Result<(), NotifyError> {
        tracing::info!(
            id,
            kind = ?payload.kind,
            title = %payload.title,
            body = %payload.body,
            "notification"
        );
        Ok(())
    }
}

/// Keeps every delivered payload in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(u32, NotificationPayload)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<(u32, NotificationPayload)> {
        match self.delivered.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn payloads(&self) -> Vec<NotificationPayload> {
        self.delivered().into_iter().map(|(_, p)| p).collect()
    }

    pub fn count_of(&self, kind: PayloadKind) -> usize {
        self.payloads().iter().filter(|p| p.kind == kind).count()
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.delivered.lock() {
            guard.clear();
        }
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, id: u32, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let mut guard = self.delivered.lock().map_err(|_| NotifyError::DeliveryFailed {
            id,
            message: "recording sink poisoned".into(),
        })?;
        guard.push((id, payload.clone()));
        Ok(())
    }
}

/// Delivers composed payloads back-to-back with random ids.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    sampler: Arc<dyn Sampler>,
    enabled: bool,
    vibration: bool,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            sink,
            sampler,
            enabled: true,
            vibration: true,
        }
    }

    pub fn with_config(mut self, config: &NotificationsConfig) -> Self {
        self.enabled = config.enabled;
        self.vibration = config.vibration;
        self
    }

    /// Deliver every payload in order with no delay between them. Returns the
    /// delivery ids used. A failing delivery does not stop the rest of the
    /// batch; the first failure is returned once every payload was tried.
    pub fn deliver_all(&self, payloads: &[NotificationPayload]) -> Result<Vec<u32>, NotifyError> {
        if !self.enabled {
            tracing::debug!(count = payloads.len(), "notifications disabled, dropping payloads");
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(payloads.len());
        let mut first_error = None;
        for payload in payloads {
            let id = self.sampler.notification_id();
            let delivered = if self.vibration || payload.vibration.is_none() {
                self.sink.deliver(id, payload)
            } else {
                let mut quiet = payload.clone();
                quiet.vibration = None;
                self.sink.deliver(id, &quiet)
            };
            match delivered {
                Ok(()) => ids.push(id),
                Err(e) => {
                    tracing::warn!(id, error = %e, "notification delivery failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        tracing::debug!(count = ids.len(), failed = first_error.is_some(), "notifications delivered");
        match first_error {
            Some(e) => Err(e),
            None => Ok(ids),
        }
    }

    pub fn deliver(&self, payload: &NotificationPayload) -> Result<Option<u32>, NotifyError> {
        Ok(self.deliver_all(std::slice::from_ref(payload))?.into_iter().next())
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("enabled", &self.enabled)
            .field("vibration", &self.vibration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn deliver(&self, id: u32, _payload: &NotificationPayload) -> Result<(), NotifyError> {
            Err(NotifyError::DeliveryFailed {
                id,
                message: "no permission".into(),
            })
        }
    }

    #[test]
    fn threat_payload_carries_hints() {
        let p = NotificationPayload::threat("run");
        assert_eq!(p.priority, Priority::High);
        assert_eq!(p.vibration.as_deref(), Some(&THREAT_VIBRATION[..]));
        assert_eq!(p.light_argb, Some(0xFFFF0000));
        assert_eq!(
            NotificationPayload::insult("Math", 3, 10, "x").title,
            "💀 Math - wrong answer 3/10"
        );
    }

    #[test]
    fn delivers_in_order_with_ids_in_range() {
        let sink = Arc::new(RecordingSink::new());
        let notifier = Notifier::new(sink.clone(), Arc::new(RandomSampler));
        let payloads: Vec<_> = (1..=3)
            .map(|i| NotificationPayload::insult("Math", i, 3, format!("{i}")))
            .collect();

        let ids = notifier.deliver_all(&payloads).unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| (1000..=9999).contains(id)));
        assert_eq!(sink.payloads(), payloads);
    }

    #[test]
    fn disabled_notifier_drops_everything() {
        let sink = Arc::new(RecordingSink::new());
        let config = NotificationsConfig {
            enabled: false,
            ..NotificationsConfig::default()
        };
        let notifier = Notifier::new(sink.clone(), Arc::new(RandomSampler)).with_config(&config);
        assert_eq!(notifier.deliver(&NotificationPayload::reminder("hi")).unwrap(), None);
        assert!(sink.delivered().is_empty());
    }

    #[test]
    fn vibration_can_be_suppressed() {
        let sink = Arc::new(RecordingSink::new());
        let config = NotificationsConfig {
            vibration: false,
            ..NotificationsConfig::default()
        };
        let notifier = Notifier::new(sink.clone(), Arc::new(RandomSampler)).with_config(&config);
        notifier.deliver(&NotificationPayload::threat("x")).unwrap();
        assert!(sink.payloads()[0].vibration.is_none());
        assert!(sink.payloads()[0].light_argb.is_some());
    }

    #[test]
    fn sink_failure_is_reported() {
        let notifier = Notifier::new(Arc::new(FailingSink), Arc::new(FixedSampler::new(0)));
        let err = notifier
            .deliver(&NotificationPayload::reminder("hi"))
            .unwrap_err();
        assert!(matches!(err, NotifyError::DeliveryFailed { id: 1000, .. }));
    }

    /// Fails every payload whose body matches, records the rest.
    struct FailOnBody {
        body: &'static str,
        inner: RecordingSink,
    }

    impl NotificationSink for FailOnBody {
        fn deliver(&self, id: u32, payload: &NotificationPayload) -> Result<(), NotifyError> {
            if payload.body == self.body {
                return Err(NotifyError::DeliveryFailed {
                    id,
                    message: "dismissed".into(),
                });
            }
            self.inner.deliver(id, payload)
        }
    }

    #[test]
    fn one_failure_does_not_drop_the_rest_of_the_batch() {
        let sink = Arc::new(FailOnBody {
            body: "2",
            inner: RecordingSink::new(),
        });
        let notifier = Notifier::new(sink.clone(), Arc::new(FixedSampler::new(0)));
        let payloads: Vec<_> = (1..=4)
            .map(|i| NotificationPayload::insult("Math", i, 4, format!("{i}")))
            .collect();

        let err = notifier.deliver_all(&payloads).unwrap_err();
        assert!(matches!(err, NotifyError::DeliveryFailed { .. }));
        let bodies: Vec<_> = sink.inner.payloads().into_iter().map(|p| p.body).collect();
        assert_eq!(bodies, vec!["1", "3", "4"]);
    }
}
