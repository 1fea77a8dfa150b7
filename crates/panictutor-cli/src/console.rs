//! Terminal notification sink.

use std::io::Write;

use panictutor_core::notify::Priority;
use panictutor_core::{NotificationPayload, NotificationSink, NotifyError};

/// Writes notifications to stderr, ringing the bell for high priority ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn deliver(&self, id: u32, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let bell = if payload.priority == Priority::High { "\x07" } else { "" };
        let mut err = std::io::stderr().lock();
        writeln!(err, "{bell}[#{id}] {}\n    {}", payload.title, payload.body).map_err(|e| {
            NotifyError::DeliveryFailed {
                id,
                message: e.to_string(),
            }
        })?;
        tracing::debug!(id, kind = ?payload.kind, "notification shown");
        Ok(())
    }
}
