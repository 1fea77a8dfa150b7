//! Lenient word-overlap grading.
//!
//! An answer passes when at least 30% of the expected answer's words (and at
//! least one) appear in it, where "appear" means substring containment in
//! either direction against any answer word.

const SEPARATORS: &[char] = &['、', '。', ',', '.', '，', '!', '?', '！', '？', ';', ':'];

/// Split on whitespace and sentence punctuation, lowercased, empties dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Minimum matching words for `expected_words`: `ceil(0.3 * n)`, at least 1.
pub fn pass_threshold(expected_words: usize) -> usize {
    ((expected_words * 3).div_ceil(10)).max(1)
}

/// Grade `answer` against `expected`. An empty answer always fails.
pub fn grade_answer(answer: &str, expected: &str) -> bool {
    let answer_words = tokenize(answer);
    if answer_words.is_empty() {
        return false;
    }
    let expected_words = tokenize(expected);

    let matches = expected_words
        .iter()
        .filter(|e| {
            answer_words
                .iter()
                .any(|a| a.contains(e.as_str()) || e.contains(a.as_str()))
        })
        .count();

    matches >= pass_threshold(expected_words.len())
}
