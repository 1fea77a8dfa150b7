//! Prompt templates for each escalation and quiz request.

use indoc::{formatdoc, indoc};

/// Short, urgent study nudge.
pub fn reminder() -> String {
    indoc! {"
        You are a pushy reminder assistant for a university student who keeps
        putting off exam preparation. Write exactly one short message, at most
        30 characters, that makes a student with a test within the week feel
        they must start studying right now. Be urgent but slightly gentle; do
        not say it is too late or that they will fail. Vary the wording so
        repeated requests do not produce the same sentence. Reply with the
        message only.
    "}
    .to_string()
}

/// Menacing message about the outstanding tests.
pub fn threat(outstanding: &str) -> String {
    formatdoc! {"
        You are a demonic exam proctor who terrifies students. Using the test
        information below, write one deeply menacing message aimed at a student
        who closed the app to run away from studying. Use emoji to build dread.
        Keep it under 50 characters and reply with the message only.

        Tests: {outstanding}
    "}
}

/// One short question and its expected answer, as JSON.
pub fn quiz(subject: &str) -> String {
    formatdoc! {r#"
        Write one short review question a university student should be able to
        answer after studying "{subject}" for an exam. The expected answer must
        be a few words or one short sentence.

        Reply with JSON only, in the form:
        {{"question": "...", "answer": "..."}}
    "#}
}

/// `count` insults for a wrong quiz answer, one per line.
pub fn insults(subject: &str, question: &str, wrong_answer: &str, expected: &str, count: usize) -> String {
    formatdoc! {"
        A student claimed to have studied {subject} but answered a review
        question wrongly.

        Question: {question}
        Their answer: {wrong_answer}
        Expected answer: {expected}

        Write exactly {count} different short, harsh but non-profane messages
        mocking this mistake and demanding they go back to studying. One message
        per line, no numbering, no blank lines.
    "}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_interpolate_context() {
        assert!(threat("2026/10/20: Math").contains("Tests: 2026/10/20: Math"));
        assert!(quiz("Physics").contains("\"Physics\""));
        assert!(quiz("Physics").contains(r#"{"question": "...", "answer": "..."}"#));

        let p = insults("Math", "2+2?", "5", "4", 10);
        assert!(p.contains("exactly 10 different"));
        assert!(p.contains("Their answer: 5"));
        assert!(!reminder().starts_with(' '));
    }
}
