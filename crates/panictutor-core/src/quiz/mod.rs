//! Quiz-gated study completion.
//!
//! For each item the user claims to have studied, in order: fetch one
//! question, wait for an answer, grade it, and only record the study on a
//! pass. Wrong answers are collected and turned into insult notifications
//! when the quiz finishes.
//!
//! ```text
//! Start -> NextItem -> AwaitQuestion -> AwaitAnswer -> Grade -> NextItem ... -> Finished
//! ```

mod grading;

pub use grading::{grade_answer, pass_threshold, tokenize};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, QuizError, Result};
use crate::notify::{EscalationComposer, Notifier};
use crate::schedule::StudyItem;
use crate::study::StudyLedger;

/// A question and the answer it is graded against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub prompt: String,
    pub expected_answer: String,
}

impl QuizQuestion {
    /// `None` when either part is blank.
    pub fn new(prompt: impl Into<String>, expected_answer: impl Into<String>) -> Option<Self> {
        let prompt = prompt.into().trim().to_string();
        let expected_answer = expected_answer.into().trim().to_string();
        if prompt.is_empty() || expected_answer.is_empty() {
            return None;
        }
        Some(Self {
            prompt,
            expected_answer,
        })
    }

    /// Generic question used when generation is unavailable.
    pub fn fallback(subject: &str) -> Self {
        Self {
            prompt: format!("Explain one important point about {subject}."),
            expected_answer: "Accurately explain a fundamental concept or principle.".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizState {
    Start,
    NextItem,
    AwaitQuestion,
    AwaitAnswer,
    Grade,
    Finished,
}

/// What the user did with a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizResponse {
    Answer(String),
    /// Counts as a pass.
    Skip,
}

/// A failed item, kept for escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrongAnswer {
    pub item: StudyItem,
    pub question: QuizQuestion,
    pub answer: String,
}

/// The question currently waiting for an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingQuestion {
    pub item: StudyItem,
    pub question: QuizQuestion,
    /// 1-based position in the quiz.
    pub position: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizOutcome {
    pub item: StudyItem,
    pub question: QuizQuestion,
    pub answer: Option<String>,
    pub skipped: bool,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizSummary {
    /// Every item in the order it was quizzed, pass or fail.
    pub attempted: Vec<StudyItem>,
    pub outcomes: Vec<QuizOutcome>,
    pub wrong_answers: Vec<WrongAnswer>,
    pub notifications_sent: usize,
}

impl QuizSummary {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }
}

/// One quiz run over a fixed list of items. Strictly sequential: the next
/// question is only fetched after the previous answer is graded.
#[derive(Debug)]
pub struct QuizWorkflow {
    items: Vec<StudyItem>,
    index: usize,
    state: QuizState,
    current: Option<QuizQuestion>,
    composer: EscalationComposer,
    ledger: StudyLedger,
    outcomes: Vec<QuizOutcome>,
    wrong_answers: Vec<WrongAnswer>,
}

impl QuizWorkflow {
    pub fn new(items: Vec<StudyItem>, composer: EscalationComposer, ledger: StudyLedger) -> Self {
        Self {
            items,
            index: 0,
            state: QuizState::Start,
            current: None,
            composer,
            ledger,
            outcomes: Vec::new(),
            wrong_answers: Vec::new(),
        }
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    pub fn remaining(&self) -> usize {
        self.items.len().saturating_sub(self.index)
    }

    pub fn wrong_answers(&self) -> &[WrongAnswer] {
        &self.wrong_answers
    }

    fn expect_state(&self, expected: &[QuizState]) -> std::result::Result<(), QuizError> {
        if self.state == QuizState::Finished {
            return Err(QuizError::Finished);
        }
        if expected.contains(&self.state) {
            Ok(())
        } else {
            Err(QuizError::OutOfOrder {
                expected: expected[0],
                actual: self.state,
            })
        }
    }

    /// Fetch the question for the next item. `None` once every item has
    /// been answered; call [`finish`](Self::finish) then.
    pub async fn next_question(&mut self) -> Result<Option<PendingQuestion>> {
        self.expect_state(&[QuizState::NextItem, QuizState::Start])?;
        self.state = QuizState::NextItem;

        let Some(item) = self.items.get(self.index).cloned() else {
            return Ok(None);
        };

        self.state = QuizState::AwaitQuestion;
        let question = self.composer.compose_quiz_question(&item.subject).await;
        self.current = Some(question.clone());
        self.state = QuizState::AwaitAnswer;

        Ok(Some(PendingQuestion {
            item,
            question,
            position: self.index + 1,
            total: self.items.len(),
        }))
    }

    /// Grade the response to the pending question. A pass is written to the
    /// ledger immediately; a storage failure leaves the question pending.
    pub fn answer(&mut self, response: QuizResponse) -> Result<QuizOutcome> {
        self.expect_state(&[QuizState::AwaitAnswer])?;
        let (Some(item), Some(question)) = (self.items.get(self.index).cloned(), self.current.clone())
        else {
            return Err(QuizError::OutOfOrder {
                expected: QuizState::AwaitAnswer,
                actual: self.state,
            }
            .into());
        };

        self.state = QuizState::Grade;
        let (answer, skipped, passed) = match response {
            QuizResponse::Skip => (None, true, true),
            QuizResponse::Answer(text) => {
                let text = text.trim().to_string();
                let passed = grade_answer(&text, &question.expected_answer);
                (Some(text), false, passed)
            }
        };
        tracing::info!(subject = %item.subject, date = %item.date, passed, skipped, "quiz graded");

        if passed {
            if let Err(e) = self.ledger.record_today(&item) {
                self.state = QuizState::AwaitAnswer;
                return Err(e);
            }
        } else {
            self.wrong_answers.push(WrongAnswer {
                item: item.clone(),
                question: question.clone(),
                answer: answer.clone().unwrap_or_default(),
            });
        }

        let outcome = QuizOutcome {
            item,
            question,
            answer,
            skipped,
            passed,
        };
        self.outcomes.push(outcome.clone());
        self.current = None;
        self.index += 1;
        self.state = QuizState::NextItem;
        Ok(outcome)
    }

    /// Send insults for every wrong answer and close the quiz.
    ///
    /// Delivery failures are logged; the summary is returned regardless.
    pub async fn finish(&mut self, notifier: &Notifier) -> Result<QuizSummary> {
        self.expect_state(&[QuizState::NextItem, QuizState::Start])?;
        if self.remaining() > 0 {
            return Err(CoreError::Quiz(QuizError::Unanswered {
                remaining: self.remaining(),
            }));
        }

        let mut notifications_sent = 0;
        if !self.wrong_answers.is_empty() {
            let payloads = self.composer.compose_insult_batch(&self.wrong_answers).await;
            match notifier.deliver_all(&payloads) {
                Ok(ids) => notifications_sent = ids.len(),
                Err(e) => tracing::error!(error = %e, "failed to deliver quiz insults"),
            }
        }
        self.state = QuizState::Finished;

        Ok(QuizSummary {
            attempted: self.items.clone(),
            outcomes: self.outcomes.clone(),
            wrong_answers: self.wrong_answers.clone(),
            notifications_sent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::generation::OfflineGenerator;
    use crate::notify::{FixedSampler, RecordingSink};
    use crate::storage::MemoryKvStore;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup(items: Vec<StudyItem>) -> (QuizWorkflow, StudyLedger, Notifier, Arc<RecordingSink>) {
        let clock = Arc::new(FixedClock::at_noon(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()));
        let ledger = StudyLedger::new(Arc::new(MemoryKvStore::new()), clock);
        let sampler = Arc::new(FixedSampler::new(0));
        let composer = EscalationComposer::new(
            Arc::new(OfflineGenerator),
            sampler.clone(),
            Duration::from_secs(5),
        );
        let sink = Arc::new(RecordingSink::new());
        let notifier = Notifier::new(sink.clone(), sampler);
        (
            QuizWorkflow::new(items, composer, ledger.clone()),
            ledger,
            notifier,
            sink,
        )
    }

    #[tokio::test]
    async fn mixed_run_records_passes_and_insults_failures() {
        let items = vec![
            StudyItem::new("2026/10/20", "Math", 1),
            StudyItem::new("2026/10/20", "English", 2),
            StudyItem::new("2026/10/21", "Art", 1),
        ];
        let (mut quiz, ledger, notifier, sink) = setup(items.clone());

        let q = quiz.next_question().await.unwrap().unwrap();
        assert_eq!(q.position, 1);
        assert_eq!(q.question, QuizQuestion::fallback("Math"));
        assert!(quiz.answer(QuizResponse::Answer("explain the concept".into())).unwrap().passed);

        quiz.next_question().await.unwrap().unwrap();
        let out = quiz.answer(QuizResponse::Answer("no idea".into())).unwrap();
        assert!(!out.passed);

        quiz.next_question().await.unwrap().unwrap();
        assert!(quiz.answer(QuizResponse::Skip).unwrap().passed);

        assert!(quiz.next_question().await.unwrap().is_none());
        let summary = quiz.finish(&notifier).await.unwrap();

        assert_eq!(summary.attempted, items);
        assert_eq!(summary.passed(), 2);
        assert_eq!(summary.wrong_answers.len(), 1);
        assert_eq!(summary.wrong_answers[0].item.subject, "English");
        assert_eq!(summary.notifications_sent, 10);
        assert_eq!(sink.delivered().len(), 10);

        assert!(ledger.is_satisfied_today("2026/10/20", "Math", 1).unwrap());
        assert!(!ledger.is_satisfied_today("2026/10/20", "English", 2).unwrap());
        assert!(ledger.is_satisfied_today("2026/10/21", "Art", 1).unwrap());
        assert_eq!(quiz.state(), QuizState::Finished);
    }

    #[tokio::test]
    async fn empty_answer_fails_and_is_collected() {
        let (mut quiz, ledger, notifier, _) = setup(vec![StudyItem::new("2026/10/20", "Math", 1)]);
        quiz.next_question().await.unwrap();
        assert!(!quiz.answer(QuizResponse::Answer("   ".into())).unwrap().passed);
        assert_eq!(quiz.wrong_answers()[0].answer, "");
        quiz.finish(&notifier).await.unwrap();
        assert!(ledger.records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_order_calls_are_rejected() {
        let (mut quiz, _, notifier, _) = setup(vec![StudyItem::new("2026/10/20", "Math", 1)]);

        assert!(matches!(
            quiz.answer(QuizResponse::Skip),
            Err(CoreError::Quiz(QuizError::OutOfOrder {
                actual: QuizState::Start,
                ..
            }))
        ));

        quiz.next_question().await.unwrap();
        assert!(matches!(
            quiz.next_question().await,
            Err(CoreError::Quiz(QuizError::OutOfOrder {
                actual: QuizState::AwaitAnswer,
                ..
            }))
        ));
        assert!(quiz.finish(&notifier).await.is_err());

        quiz.answer(QuizResponse::Skip).unwrap();
        quiz.finish(&notifier).await.unwrap();
        assert!(matches!(
            quiz.next_question().await,
            Err(CoreError::Quiz(QuizError::Finished))
        ));
    }

    #[tokio::test]
    async fn finish_before_all_items_is_rejected() {
        let (mut quiz, _, notifier, _) = setup(vec![
            StudyItem::new("2026/10/20", "Math", 1),
            StudyItem::new("2026/10/20", "Art", 2),
        ]);
        quiz.next_question().await.unwrap();
        quiz.answer(QuizResponse::Skip).unwrap();
        assert!(matches!(
            quiz.finish(&notifier).await,
            Err(CoreError::Quiz(QuizError::Unanswered { remaining: 1 }))
        ));
    }

    #[tokio::test]
    async fn empty_quiz_finishes_immediately() {
        let (mut quiz, _, notifier, sink) = setup(Vec::new());
        let summary = quiz.finish(&notifier).await.unwrap();
        assert!(summary.attempted.is_empty());
        assert!(sink.delivered().is_empty());
    }
}
