//! # PanicTutor Core Library
//!
//! Core logic for an exam-preparation nagger: it stores upcoming tests,
//! tracks what was studied today, and escalates with increasingly unpleasant
//! notifications until every subject due this week has been revisited.
//! Marking a subject as studied is gated behind a short generated quiz.
//!
//! ## Architecture
//!
//! - **Storage**: a partitioned key-value substrate ([`KvStore`]) backed by
//!   SQLite, plus TOML configuration
//! - **Schedule / Study**: test entries and the day-scoped study ledger
//! - **Compliance**: a pure evaluator over schedule and ledger snapshots
//! - **Monitor**: a cancellable background loop that escalates on its own
//! - **Quiz**: the sequential question/answer/grade workflow
//! - **Notify**: payload composition with fallback pools, and delivery sinks
//!
//! ## Key Components
//!
//! - [`PanicTutor`]: facade wiring everything from a [`Config`]
//! - [`ScheduleStore`] and [`StudyLedger`]: persistence
//! - [`BackgroundMonitor`]: periodic compliance checks
//! - [`QuizWorkflow`]: quiz-gated completion
//! - [`TextGenerator`]: the text generation seam

pub mod app;
pub mod clock;
pub mod compliance;
pub mod countdown;
pub mod error;
pub mod generation;
pub mod monitor;
pub mod notify;
pub mod quiz;
pub mod schedule;
pub mod storage;
pub mod study;

pub use app::{PanicTutor, StatusReport, StudyCandidate};
pub use clock::{Clock, FixedClock, SystemClock};
pub use compliance::{ComplianceReport, OutstandingTest};
pub use countdown::Countdown;
pub use error::{
    ConfigError, CoreError, GenerationError, NotifyError, QuizError, ScheduleDateError,
    StorageError, ValidationError,
};
pub use generation::{GeminiGenerator, GenerationRequest, OfflineGenerator, ResponseShape, TextGenerator};
pub use monitor::{BackgroundMonitor, CycleOutcome, MonitorPhase, MonitorSettings, MonitorState};
pub use notify::{
    EscalationComposer, NotificationPayload, NotificationSink, Notifier, PayloadKind,
    RecordingSink, TracingSink,
};
pub use quiz::{
    PendingQuestion, QuizOutcome, QuizQuestion, QuizResponse, QuizState, QuizSummary, QuizWorkflow,
    WrongAnswer,
};
pub use schedule::{Grade, PeriodSlot, ScheduleEntry, ScheduleStore, StudyItem};
pub use storage::{ApiKeyStore, Config, KvStore, MemoryKvStore, SqliteKvStore};
pub use study::{StudyLedger, StudyRecord};
