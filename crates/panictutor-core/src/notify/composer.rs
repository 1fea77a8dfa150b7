use std::sync::Arc;
use std::time::Duration;

use super::{NotificationPayload, Sampler};
use crate::compliance::OutstandingTest;
use crate::error::GenerationError;
use crate::generation::{parse, prompts, GenerationRequest, ResponseShape, TextGenerator};
use crate::quiz::{QuizQuestion, WrongAnswer};

/// Payloads produced for each wrong quiz answer.
pub const INSULTS_PER_WRONG_ANSWER: usize = 10;

const REMINDER_FALLBACKS: [&str; 7] = [
    "The deadline is closing in! Start studying right now!",
    "You can't look away forever... are you ready for the test?",
    "How is your studying going? Keep pushing!",
    "Every second is ticking away. Are you prepared?",
    "Is this really okay? Start now and you can still make it!",
    "The test is almost here... don't forget to prepare!",
    "Skip studying and you will regret it...",
];

const INSULT_FALLBACKS: [&str; INSULTS_PER_WRONG_ANSWER] = [
    "You said you studied. The answer says otherwise.",
    "Wrong. Did you even open the textbook?",
    "That answer was a work of fiction.",
    "Confidence: high. Accuracy: zero.",
    "Your notes are crying somewhere.",
    "Close the app and go study. For real this time.",
    "The test won't grade on effort you didn't make.",
    "Even a coin flip would have done better.",
    "Studying means reading the material, not staring at it.",
    "Try again after you actually learn it.",
];

fn threat_fallbacks(subjects: &str) -> [String; 6] {
    [
        format!("💀 Hiding is useless... you can't escape the {subjects} test 💀"),
        format!("🔥 Closed the app to run away? The dread of {subjects} is right behind you 🔥"),
        format!("👻 From the darkness, the {subjects} test is watching you... 👻"),
        format!("⚡ You cannot escape fate... judgement day for {subjects} has come ⚡"),
        format!("🌪️ A storm of {subjects} questions is coming for you... are you ready? 🌪️"),
        format!("💥 Time is running out... pay the price for neglecting {subjects} 💥"),
    ]
}

/// Turns compliance and quiz results into notification payloads.
///
/// Every method returns the promised number of payloads. Generator failures,
/// timeouts and unusable output all fall back to fixed pools.
#[derive(Clone)]
pub struct EscalationComposer {
    generator: Arc<dyn TextGenerator>,
    sampler: Arc<dyn Sampler>,
    timeout: Duration,
}

impl EscalationComposer {
    pub fn new(generator: Arc<dyn TextGenerator>, sampler: Arc<dyn Sampler>, timeout: Duration) -> Self {
        Self {
            generator,
            sampler,
            timeout,
        }
    }

    pub fn sampler(&self) -> &Arc<dyn Sampler> {
        &self.sampler
    }

    /// Call the generator with a hard deadline. Any failure becomes `None`.
    pub(crate) async fn generate(&self, purpose: &'static str, request: GenerationRequest) -> Option<String> {
        let result = match tokio::time::timeout(self.timeout, self.generator.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        };
        match result {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                tracing::warn!(purpose, error = %GenerationError::Empty, "using fallback content");
                None
            }
            Err(e) => {
                tracing::warn!(purpose, error = %e, "using fallback content");
                None
            }
        }
    }

    fn pick<'a>(&self, pool: &'a [String]) -> &'a str {
        &pool[self.sampler.pick(pool.len())]
    }

    pub async fn compose_reminder(&self) -> NotificationPayload {
        let request = GenerationRequest::new(prompts::reminder(), ResponseShape::ShortMessage);
        let body = match self.generate("reminder", request).await {
            Some(text) => text,
            None => REMINDER_FALLBACKS[self.sampler.pick(REMINDER_FALLBACKS.len())].to_string(),
        };
        NotificationPayload::reminder(body)
    }

    /// One threat summarizing every outstanding test.
    pub async fn compose_threat(&self, outstanding: &[OutstandingTest]) -> NotificationPayload {
        let summary = outstanding
            .iter()
            .map(OutstandingTest::summary)
            .collect::<Vec<_>>()
            .join("; ");
        let request = GenerationRequest::new(prompts::threat(&summary), ResponseShape::ShortMessage);

        let body = match self.generate("threat", request).await {
            Some(text) => text,
            None => {
                let mut subjects: Vec<&str> = Vec::new();
                for s in outstanding.iter().flat_map(|t| t.subjects.iter()) {
                    if !subjects.contains(&s.as_str()) {
                        subjects.push(s);
                    }
                }
                self.pick(&threat_fallbacks(&subjects.join(", "))).to_string()
            }
        };
        NotificationPayload::threat(body)
    }

    /// A question for `subject`, or the generic fallback question.
    pub async fn compose_quiz_question(&self, subject: &str) -> QuizQuestion {
        let request = GenerationRequest::new(prompts::quiz(subject), ResponseShape::QuestionAnswer);
        let Some(text) = self.generate("quiz", request).await else {
            return QuizQuestion::fallback(subject);
        };
        match parse::parse_quiz_question(&text) {
            Some(question) => question,
            None => {
                tracing::warn!(subject, "unusable quiz question, using fallback");
                QuizQuestion::fallback(subject)
            }
        }
    }

    /// Exactly ten payloads per wrong answer, in input order.
    pub async fn compose_insult_batch(&self, wrong: &[WrongAnswer]) -> Vec<NotificationPayload> {
        let mut payloads = Vec::with_capacity(wrong.len() * INSULTS_PER_WRONG_ANSWER);
        for w in wrong {
            let prompt = prompts::insults(
                &w.item.subject,
                &w.question.prompt,
                &w.answer,
                &w.question.expected_answer,
                INSULTS_PER_WRONG_ANSWER,
            );
            let request = GenerationRequest::new(prompt, ResponseShape::Lines(INSULTS_PER_WRONG_ANSWER));
            let generated = match self.generate("insults", request).await {
                Some(text) => parse::split_lines(&text),
                None => Vec::new(),
            };
            if !generated.is_empty() && generated.len() < INSULTS_PER_WRONG_ANSWER {
                tracing::debug!(got = generated.len(), "padding short insult batch with fallbacks");
            }

            for (i, fallback) in INSULT_FALLBACKS.iter().enumerate() {
                let body = generated.get(i).cloned().unwrap_or_else(|| fallback.to_string());
                payloads.push(NotificationPayload::insult(
                    &w.item.subject,
                    i + 1,
                    INSULTS_PER_WRONG_ANSWER,
                    body,
                ));
            }
        }
        payloads
    }
}

impl std::fmt::Debug for EscalationComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationComposer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
