//! Test schedule: dates, six period slots, subjects and grades.
//!
//! Entries are stored slot by slot in the `schedule` partition of a
//! [`KvStore`], with the set of known dates under `schedule_dates`.
//! Nothing here caches; every call reads through to the store.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{CoreError, Result, ScheduleDateError, StorageError, ValidationError};
use crate::storage::KvStore;

/// Number of period slots per test day.
pub const PERIOD_COUNT: usize = 6;

pub const SCHEDULE_PARTITION: &str = "schedule";
pub const SCHEDULE_DATES_KEY: &str = "schedule_dates";

const DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

/// Parse a stored test date. Accepts `YYYY/MM/DD` and `YYYY-MM-DD`.
pub fn parse_test_date(raw: &str) -> std::result::Result<NaiveDate, ScheduleDateError> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| ScheduleDateError(raw.to_string()))
}

/// Canonical `YYYY/MM/DD` rendering used as the entry key.
pub fn format_test_date(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

/// Letter grade recorded for a period after the test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Grade {
    S,
    A,
    B,
    C,
    F,
    Q,
    #[default]
    None,
}

impl Grade {
    pub const ALL: [Grade; 7] = [
        Grade::S,
        Grade::A,
        Grade::B,
        Grade::C,
        Grade::F,
        Grade::Q,
        Grade::None,
    ];

    /// Stable storage code.
    pub fn code(self) -> &'static str {
        match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::F => "F",
            Grade::Q => "Q",
            Grade::None => "NONE",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Grade::None => "not entered",
            other => other.code(),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Grade::S => "excellent",
            Grade::A => "very good",
            Grade::B => "good",
            Grade::C => "pass",
            Grade::F => "fail",
            Grade::Q => "disqualified",
            Grade::None => "not entered",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Grade {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Grade::ALL
            .into_iter()
            .find(|g| g.code() == upper)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "grade".into(),
                message: format!("'{s}' is not one of S, A, B, C, F, Q, NONE"),
            })
    }
}

/// One period of a test day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSlot {
    pub subject: String,
    pub grade: Grade,
}

impl PeriodSlot {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            grade: Grade::None,
        }
    }

    /// A blank slot means "no test this period".
    pub fn is_blank(&self) -> bool {
        self.subject.trim().is_empty()
    }
}

/// A test date and its six period slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub date: String,
    pub periods: [PeriodSlot; PERIOD_COUNT],
}

impl ScheduleEntry {
    /// Build an entry from up to six subjects. Missing periods are blank,
    /// extra subjects are ignored.
    pub fn new<I, S>(date: impl Into<String>, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut periods: [PeriodSlot; PERIOD_COUNT] = Default::default();
        for (slot, subject) in periods.iter_mut().zip(subjects) {
            *slot = PeriodSlot::new(subject);
        }
        Self {
            date: date.into(),
            periods,
        }
        .normalized()
    }

    /// Trim subjects and force blank slots back to [`Grade::None`].
    pub fn normalized(mut self) -> Self {
        self.date = self.date.trim().to_string();
        for slot in &mut self.periods {
            slot.subject = slot.subject.trim().to_string();
            if slot.is_blank() {
                slot.grade = Grade::None;
            }
        }
        self
    }

    pub fn parsed_date(&self) -> std::result::Result<NaiveDate, ScheduleDateError> {
        parse_test_date(&self.date)
    }

    /// Non-blank slots as `(1-based period, slot)`.
    pub fn occupied(&self) -> impl Iterator<Item = (u8, &PeriodSlot)> {
        self.periods
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_blank())
            .map(|(i, slot)| (i as u8 + 1, slot))
    }

    pub fn subjects(&self) -> Vec<String> {
        self.occupied().map(|(_, s)| s.subject.clone()).collect()
    }

    pub fn has_subjects(&self) -> bool {
        self.occupied().next().is_some()
    }
}

/// One (date, subject, period) tuple a user can claim to have studied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudyItem {
    pub date: String,
    pub subject: String,
    /// 1-based period number.
    pub period: u8,
}

impl StudyItem {
    pub fn new(date: impl Into<String>, subject: impl Into<String>, period: u8) -> Self {
        Self {
            date: date.into(),
            subject: subject.into(),
            period,
        }
    }
}

fn compare_dates(a: &str, b: &str) -> Ordering {
    match (parse_test_date(a), parse_test_date(b)) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Sort entries by date ascending; unparseable dates go last.
pub fn sort_by_date(entries: &mut [ScheduleEntry]) {
    entries.sort_by(|a, b| compare_dates(&a.date, &b.date));
}

/// Entries split around `today`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleView {
    /// Today or later, soonest first.
    pub upcoming: Vec<ScheduleEntry>,
    /// Before today, most recent first.
    pub past: Vec<ScheduleEntry>,
}

/// Split `entries` into upcoming and past. Unparseable dates count as upcoming
/// so they stay visible for correction.
pub fn partition_by_past(entries: Vec<ScheduleEntry>, today: NaiveDate) -> ScheduleView {
    let (mut past, mut upcoming): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| matches!(e.parsed_date(), Ok(d) if d < today));
    sort_by_date(&mut upcoming);
    sort_by_date(&mut past);
    past.reverse();
    ScheduleView { upcoming, past }
}

/// Every non-blank tuple of entries dated today or later, by date then period.
pub fn study_candidates(entries: &[ScheduleEntry], today: NaiveDate) -> Vec<StudyItem> {
    let mut current: Vec<&ScheduleEntry> = entries
        .iter()
        .filter(|e| matches!(e.parsed_date(), Ok(d) if d >= today))
        .collect();
    current.sort_by(|a, b| compare_dates(&a.date, &b.date));

    current
        .into_iter()
        .flat_map(|e| {
            e.occupied()
                .map(|(period, slot)| StudyItem::new(e.date.clone(), slot.subject.clone(), period))
        })
        .collect()
}

fn subject_key(date: &str, index: usize) -> String {
    format!("schedule_{date}_subject_{index}")
}

fn grade_key(date: &str, index: usize) -> String {
    format!("schedule_{date}_grade_{index}")
}

/// Storage key for a test date: parseable dates always use the slash form.
fn canonical_date(raw: &str) -> String {
    parse_test_date(raw)
        .map(format_test_date)
        .unwrap_or_else(|_| raw.trim().to_string())
}

/// Persistent store of schedule entries. Clones share one write guard.
#[derive(Clone)]
pub struct ScheduleStore {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    lock_window_days: i64,
    writes: Arc<Mutex<()>>,
}

impl ScheduleStore {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            clock,
            lock_window_days: 7,
            writes: Arc::new(Mutex::new(())),
        }
    }

    fn write_guard(&self) -> std::result::Result<MutexGuard<'_, ()>, StorageError> {
        self.writes.lock().map_err(|_| StorageError::Poisoned)
    }

    pub fn with_lock_window(mut self, days: i64) -> Self {
        self.lock_window_days = days;
        self
    }

    /// Create or replace the entry for `entry.date`.
    pub fn upsert(&self, entry: &ScheduleEntry) -> Result<()> {
        let _guard = self.write_guard()?;
        self.write_entry(entry)
    }

    fn write_entry(&self, entry: &ScheduleEntry) -> Result<()> {
        let mut entry = entry.clone().normalized();
        entry.date = canonical_date(&entry.date);
        if entry.date.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "date".into(),
                message: "test date must not be empty".into(),
            }
            .into());
        }

        for (i, slot) in entry.periods.iter().enumerate() {
            self.kv
                .set_string(SCHEDULE_PARTITION, &subject_key(&entry.date, i), &slot.subject)?;
            self.kv
                .set_string(SCHEDULE_PARTITION, &grade_key(&entry.date, i), slot.grade.code())?;
        }

        let mut dates = self.kv.get_string_set(SCHEDULE_PARTITION, SCHEDULE_DATES_KEY)?;
        if dates.insert(entry.date.clone()) {
            self.kv
                .set_string_set(SCHEDULE_PARTITION, SCHEDULE_DATES_KEY, &dates)?;
        }

        tracing::debug!(date = %entry.date, subjects = entry.subjects().len(), "schedule entry saved");
        Ok(())
    }

    /// Read one entry, or `None` if the date is unknown.
    pub fn get(&self, date: &str) -> Result<Option<ScheduleEntry>> {
        let date = canonical_date(date);
        let dates = self.kv.get_string_set(SCHEDULE_PARTITION, SCHEDULE_DATES_KEY)?;
        if !dates.contains(&date) {
            return Ok(None);
        }
        Ok(Some(self.read_entry(&date)?))
    }

    /// All entries, date ascending.
    pub fn list(&self) -> Result<Vec<ScheduleEntry>> {
        let dates = self.kv.get_string_set(SCHEDULE_PARTITION, SCHEDULE_DATES_KEY)?;
        let mut entries = dates
            .iter()
            .map(|date| self.read_entry(date))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        sort_by_date(&mut entries);
        Ok(entries)
    }

    fn read_entry(&self, date: &str) -> std::result::Result<ScheduleEntry, StorageError> {
        let mut periods: [PeriodSlot; PERIOD_COUNT] = Default::default();
        for (i, slot) in periods.iter_mut().enumerate() {
            let subject = self
                .kv
                .get_string(SCHEDULE_PARTITION, &subject_key(date, i))?
                .unwrap_or_default();
            let grade = self
                .kv
                .get_string(SCHEDULE_PARTITION, &grade_key(date, i))?
                .and_then(|g| g.parse::<Grade>().ok())
                .unwrap_or_default();
            *slot = PeriodSlot { subject, grade };
        }
        Ok(ScheduleEntry {
            date: date.to_string(),
            periods,
        }
        .normalized())
    }

    /// Days from today to the entry's date, if it parses.
    pub fn days_until(&self, entry: &ScheduleEntry) -> Option<i64> {
        entry
            .parsed_date()
            .ok()
            .map(|d| (d - self.clock.today()).num_days())
    }

    /// Whether deleting `entry` without force would be refused.
    pub fn is_locked(&self, entry: &ScheduleEntry) -> bool {
        entry.has_subjects()
            && matches!(self.days_until(entry), Some(days) if (0..self.lock_window_days).contains(&days))
    }

    /// Delete the entry for `date`.
    ///
    /// # Errors
    ///
    /// [`CoreError::LockedPeriod`] when the test is inside the lock window and
    /// still has subjects, unless `force` is set.
    pub fn delete(&self, date: &str, force: bool) -> Result<()> {
        let _guard = self.write_guard()?;
        let Some(entry) = self.get(date)? else {
            return Err(ValidationError::UnknownDate(canonical_date(date)).into());
        };

        if !force && self.is_locked(&entry) {
            return Err(CoreError::LockedPeriod {
                date: entry.date.clone(),
                days_until: self.days_until(&entry).unwrap_or_default(),
            });
        }

        for i in 0..PERIOD_COUNT {
            self.kv.remove(SCHEDULE_PARTITION, &subject_key(&entry.date, i))?;
            self.kv.remove(SCHEDULE_PARTITION, &grade_key(&entry.date, i))?;
        }
        let mut dates = self.kv.get_string_set(SCHEDULE_PARTITION, SCHEDULE_DATES_KEY)?;
        dates.remove(&entry.date);
        self.kv
            .set_string_set(SCHEDULE_PARTITION, SCHEDULE_DATES_KEY, &dates)?;

        tracing::info!(date = %entry.date, force, "schedule entry deleted");
        Ok(())
    }

    /// Record the grade for a 1-based `period`.
    pub fn set_grade(&self, date: &str, period: u8, grade: Grade) -> Result<ScheduleEntry> {
        if !(1..=PERIOD_COUNT as u8).contains(&period) {
            return Err(ValidationError::PeriodOutOfRange(period).into());
        }
        let _guard = self.write_guard()?;
        let Some(mut entry) = self.get(date)? else {
            return Err(ValidationError::UnknownDate(canonical_date(date)).into());
        };

        let slot = &mut entry.periods[usize::from(period - 1)];
        if slot.is_blank() && grade != Grade::None {
            return Err(ValidationError::GradeOnBlankSlot {
                date: entry.date.clone(),
                period,
            }
            .into());
        }
        slot.grade = grade;
        self.write_entry(&entry)?;
        Ok(entry)
    }

    /// Drop every entry.
    pub fn clear_all(&self) -> Result<()> {
        let _guard = self.write_guard()?;
        self.kv.clear_partition(SCHEDULE_PARTITION)?;
        Ok(())
    }
}

impl fmt::Debug for ScheduleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleStore")
            .field("lock_window_days", &self.lock_window_days)
            .finish_non_exhaustive()
    }
}
