//! Study ledger: day-scoped evidence that a subject was studied.
//!
//! Records live as one JSON array under `study_records/study_records`.
//! A tuple is satisfied only by a record whose study day is the day being
//! checked; yesterday's work does not count today.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{Result, StorageError};
use crate::schedule::{ScheduleEntry, StudyItem};
use crate::storage::KvStore;

pub const STUDY_PARTITION: &str = "study_records";
pub const STUDY_RECORDS_KEY: &str = "study_records";

/// Evidence that `(test_date, subject, period)` was studied on `study_day`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub test_date: String,
    pub subject: String,
    /// 1-based period number.
    pub period: u8,
    pub study_day: NaiveDate,
    pub timestamp: DateTime<Utc>,
}

impl StudyRecord {
    pub fn new(item: &StudyItem, study_day: NaiveDate, timestamp: DateTime<Utc>) -> Self {
        Self {
            test_date: item.date.clone(),
            subject: item.subject.clone(),
            period: item.period,
            study_day,
            timestamp,
        }
    }

    fn same_key(&self, other: &StudyRecord) -> bool {
        self.study_day == other.study_day && self.matches(&other.test_date, &other.subject, other.period)
    }

    fn matches(&self, test_date: &str, subject: &str, period: u8) -> bool {
        self.test_date == test_date && self.subject == subject && self.period == period
    }
}

/// Whether `records` contain a study of the tuple on `day`.
pub fn satisfied_on(
    records: &[StudyRecord],
    test_date: &str,
    subject: &str,
    period: u8,
    day: NaiveDate,
) -> bool {
    records
        .iter()
        .any(|r| r.study_day == day && r.matches(test_date, subject, period))
}

/// Whether every non-blank slot of `entry` was studied on `day`.
///
/// An entry with no subjects is never satisfied.
pub fn all_satisfied_on(records: &[StudyRecord], entry: &ScheduleEntry, day: NaiveDate) -> bool {
    let mut occupied = entry.occupied().peekable();
    if occupied.peek().is_none() {
        return false;
    }
    occupied.all(|(period, slot)| satisfied_on(records, &entry.date, &slot.subject, period, day))
}

/// Persistent ledger over a [`KvStore`].
///
/// Clones share one write guard, so read-modify-write cycles from the
/// monitor and a running quiz never interleave.
#[derive(Clone)]
pub struct StudyLedger {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    writes: Arc<Mutex<()>>,
}

impl StudyLedger {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            clock,
            writes: Arc::new(Mutex::new(())),
        }
    }

    fn write_guard(&self) -> std::result::Result<MutexGuard<'_, ()>, StorageError> {
        self.writes.lock().map_err(|_| StorageError::Poisoned)
    }

    /// All records in storage order.
    pub fn records(&self) -> Result<Vec<StudyRecord>> {
        Ok(self.load()?)
    }

    fn load(&self) -> std::result::Result<Vec<StudyRecord>, StorageError> {
        match self.kv.get_string(STUDY_PARTITION, STUDY_RECORDS_KEY)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
                partition: STUDY_PARTITION.into(),
                key: STUDY_RECORDS_KEY.into(),
                message: e.to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }

    fn store(&self, records: &[StudyRecord]) -> std::result::Result<(), StorageError> {
        let raw = serde_json::to_string(records).map_err(|e| StorageError::Corrupt {
            partition: STUDY_PARTITION.into(),
            key: STUDY_RECORDS_KEY.into(),
            message: e.to_string(),
        })?;
        self.kv.set_string(STUDY_PARTITION, STUDY_RECORDS_KEY, &raw)
    }

    /// Insert `record`, replacing any record with the same tuple and study
    /// day. The stored timestamp is the later of the two.
    pub fn record(&self, mut record: StudyRecord) -> Result<()> {
        let _guard = self.write_guard()?;
        let mut records = self.load()?;
        match records.iter_mut().find(|r| r.same_key(&record)) {
            Some(existing) => {
                record.timestamp = record.timestamp.max(existing.timestamp);
                *existing = record;
            }
            None => records.push(record),
        }
        self.store(&records)?;
        Ok(())
    }

    /// Record `item` as studied now.
    pub fn record_today(&self, item: &StudyItem) -> Result<StudyRecord> {
        let now = self.clock.now();
        let record = StudyRecord::new(item, now.date_naive(), now.with_timezone(&Utc));
        self.record(record.clone())?;
        tracing::debug!(date = %item.date, subject = %item.subject, period = item.period, "study recorded");
        Ok(record)
    }

    pub fn query_by_test_date(&self, test_date: &str) -> Result<Vec<StudyRecord>> {
        let test_date = test_date.trim();
        Ok(self
            .load()?
            .into_iter()
            .filter(|r| r.test_date == test_date)
            .collect())
    }

    /// All records, newest first.
    pub fn history(&self) -> Result<Vec<StudyRecord>> {
        let mut records = self.load()?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    pub fn is_satisfied_today(&self, test_date: &str, subject: &str, period: u8) -> Result<bool> {
        let records = self.load()?;
        Ok(satisfied_on(
            &records,
            test_date,
            subject,
            period,
            self.clock.today(),
        ))
    }

    pub fn all_satisfied_today(&self, entry: &ScheduleEntry) -> Result<bool> {
        let records = self.load()?;
        Ok(all_satisfied_on(&records, entry, self.clock.today()))
    }

    /// Drop records whose timestamp is more than `days` days old. Returns the
    /// number removed.
    pub fn purge_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = self.clock.now().with_timezone(&Utc) - Duration::days(days);
        let _guard = self.write_guard()?;
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.timestamp > cutoff);
        let removed = before - records.len();
        if removed > 0 {
            self.store(&records)?;
            tracing::info!(removed, days, "purged old study records");
        }
        Ok(removed)
    }

    pub fn clear_all(&self) -> Result<()> {
        let _guard = self.write_guard()?;
        self.kv.remove(STUDY_PARTITION, STUDY_RECORDS_KEY)?;
        Ok(())
    }
}

impl std::fmt::Debug for StudyLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudyLedger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::MemoryKvStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn ledger() -> (StudyLedger, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::at_noon(today()));
        let ledger = StudyLedger::new(Arc::new(MemoryKvStore::new()), clock.clone());
        (ledger, clock)
    }

    #[test]
    fn satisfied_only_on_the_study_day() {
        let (ledger, clock) = ledger();
        ledger
            .record_today(&StudyItem::new("2026/10/20", "Math", 1))
            .unwrap();
        assert!(ledger.is_satisfied_today("2026/10/20", "Math", 1).unwrap());
        assert!(!ledger.is_satisfied_today("2026/10/20", "Math", 2).unwrap());

        clock.advance(Duration::days(1));
        assert!(!ledger.is_satisfied_today("2026/10/20", "Math", 1).unwrap());
    }

    #[test]
    fn same_day_record_overwrites_and_keeps_latest_timestamp() {
        let (ledger, _) = ledger();
        let item = StudyItem::new("2026/10/20", "Math", 1);
        let early = Utc::now() - Duration::hours(2);
        let late = Utc::now();

        ledger.record(StudyRecord::new(&item, today(), late)).unwrap();
        ledger.record(StudyRecord::new(&item, today(), early)).unwrap();

        let records = ledger.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, late);
    }

    #[test]
    fn different_days_are_independent_records() {
        let (ledger, clock) = ledger();
        let item = StudyItem::new("2026/10/20", "Math", 1);
        ledger.record_today(&item).unwrap();
        clock.advance(Duration::days(1));
        ledger.record_today(&item).unwrap();

        assert_eq!(ledger.query_by_test_date("2026/10/20").unwrap().len(), 2);
        let history = ledger.history().unwrap();
        assert!(history[0].timestamp > history[1].timestamp);
    }

    #[test]
    fn entry_without_subjects_is_never_satisfied() {
        let (ledger, _) = ledger();
        let blank = ScheduleEntry::new("2026/10/20", ["", " ", "", "", "", ""]);
        assert!(!ledger.all_satisfied_today(&blank).unwrap());
    }

    #[test]
    fn all_satisfied_requires_every_subject() {
        let (ledger, _) = ledger();
        let entry = ScheduleEntry::new("2026/10/20", ["Math", "", "English"]);
        ledger
            .record_today(&StudyItem::new("2026/10/20", "Math", 1))
            .unwrap();
        assert!(!ledger.all_satisfied_today(&entry).unwrap());

        ledger
            .record_today(&StudyItem::new("2026/10/20", "English", 3))
            .unwrap();
        assert!(ledger.all_satisfied_today(&entry).unwrap());
    }

    #[test]
    fn purge_drops_only_old_records() {
        let (ledger, clock) = ledger();
        ledger
            .record_today(&StudyItem::new("2026/10/20", "Math", 1))
            .unwrap();
        clock.advance(Duration::days(8));
        ledger
            .record_today(&StudyItem::new("2026/10/30", "Art", 2))
            .unwrap();

        assert_eq!(ledger.purge_older_than(7).unwrap(), 1);
        let left = ledger.records().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].subject, "Art");

        ledger.clear_all().unwrap();
        assert!(ledger.records().unwrap().is_empty());
    }
}
