//! Best-effort parsing of generator output.

use serde::Deserialize;

use crate::quiz::QuizQuestion;

#[derive(Deserialize)]
struct RawQuestion {
    question: String,
    #[serde(alias = "correct_answer", alias = "correctAnswer", alias = "expected_answer")]
    answer: String,
}

/// Remove a surrounding Markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse a question/answer pair from JSON or from `Question:` / `Answer:` lines.
///
/// Returns `None` when either part is missing or blank.
pub fn parse_quiz_question(text: &str) -> Option<QuizQuestion> {
    let body = strip_code_fence(text);

    if let Ok(raw) = serde_json::from_str::<RawQuestion>(body) {
        return QuizQuestion::new(raw.question, raw.answer);
    }

    let mut question = None;
    let mut answer = None;
    for line in body.lines() {
        let line = line.trim();
        if let Some(q) = strip_label(line, &["question:", "q:"]) {
            question = Some(q.to_string());
        } else if let Some(a) = strip_label(line, &["answer:", "a:"]) {
            answer = Some(a.to_string());
        }
    }
    QuizQuestion::new(question?, answer?)
}

fn strip_label<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    let lower = line.to_ascii_lowercase();
    labels
        .iter()
        .find(|label| lower.starts_with(*label))
        .map(|label| line[label.len()..].trim())
}

/// Split a batch response into lines, dropping blanks and list markers
/// such as `1.`, `2)`, `-`, `*` or `•`.
pub fn split_lines(text: &str) -> Vec<String> {
    strip_code_fence(text)
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim();
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim();
        }
    }
    line
}
