//! Compliance evaluation over schedule and ledger snapshots.
//!
//! Pure: callers pass in `today`, the entries and the records. Entries whose
//! date does not parse are dropped from the window without error.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::schedule::ScheduleEntry;
use crate::study::{all_satisfied_on, StudyRecord};

/// A test inside the window that still needs study today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutstandingTest {
    pub date: String,
    pub subjects: Vec<String>,
}

impl OutstandingTest {
    /// `date: subject, subject` rendering used in notifications.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.date, self.subjects.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    pub today: NaiveDate,
    /// Dates of entries inside the window with at least one subject.
    pub due_this_week: Vec<String>,
    /// True only when something is due and all of it was studied today.
    pub global_clear: bool,
    pub outstanding: Vec<OutstandingTest>,
}

impl ComplianceReport {
    /// Nothing scheduled inside the window.
    pub fn nothing_due(&self) -> bool {
        self.due_this_week.is_empty()
    }

    /// Whether the caller should escalate.
    pub fn needs_escalation(&self) -> bool {
        !self.global_clear && !self.outstanding.is_empty()
    }

    /// Outstanding tests joined as `date: subjects; date: subjects`.
    pub fn summary(&self) -> String {
        self.outstanding
            .iter()
            .map(OutstandingTest::summary)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Distinct outstanding subjects in first-seen order.
    pub fn subjects(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for subject in self.outstanding.iter().flat_map(|t| t.subjects.iter()) {
            if !out.contains(subject) {
                out.push(subject.clone());
            }
        }
        out
    }
}

/// Evaluate compliance for `today`.
///
/// The window is `[today, today + window_days]`, inclusive on both ends and
/// measured in calendar days.
pub fn evaluate(
    today: NaiveDate,
    entries: &[ScheduleEntry],
    records: &[StudyRecord],
    window_days: i64,
) -> ComplianceReport {
    let window_end = today + Duration::days(window_days);

    let due: Vec<&ScheduleEntry> = entries
        .iter()
        .filter(|entry| match entry.parsed_date() {
            Ok(date) => date >= today && date <= window_end,
            Err(e) => {
                tracing::debug!(error = %e, "excluding entry from compliance window");
                false
            }
        })
        .filter(|entry| entry.has_subjects())
        .collect();

    let outstanding: Vec<OutstandingTest> = due
        .iter()
        .filter(|entry| !all_satisfied_on(records, entry, today))
        .map(|entry| OutstandingTest {
            date: entry.date.clone(),
            subjects: entry.subjects(),
        })
        .collect();

    ComplianceReport {
        today,
        global_clear: !due.is_empty() && outstanding.is_empty(),
        due_this_week: due.iter().map(|e| e.date.clone()).collect(),
        outstanding,
    }
}
