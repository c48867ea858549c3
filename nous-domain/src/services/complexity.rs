use crate::entities::Complexity;

/// Phrases that mark a prompt as needing a strong model
pub const COMPLEX_KEYWORDS: &[&str] = &[
    "analyze",
    "analyse",
    "compare",
    "explain why",
    "step by step",
    "strategy",
    "plan",
    "code",
    "debug",
    "evaluate",
    "research",
    "in detail",
    "detailed",
];

/// Prompts longer than this are complex regardless of wording
pub const COMPLEX_WORD_COUNT: usize = 120;

/// Prompts up to this many words are simple unless a keyword says otherwise
pub const SIMPLE_WORD_COUNT: usize = 8;

/// Lowercase words of a prompt with punctuation stripped
pub(crate) fn normalized_words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Whether `phrase` occurs in `words` on word boundaries
pub(crate) fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || needle.len() > words.len() {
        return false;
    }
    words
        .windows(needle.len())
        .any(|window| window.iter().zip(&needle).all(|(w, n)| w == n))
}

/// Guess the complexity of a prompt from its wording and length
pub fn classify_complexity(prompt: &str) -> Complexity {
    let words = normalized_words(prompt);

    if words.len() > COMPLEX_WORD_COUNT || COMPLEX_KEYWORDS.iter().any(|k| contains_phrase(&words, k)) {
        Complexity::Complex
    } else if words.len() <= SIMPLE_WORD_COUNT {
        Complexity::Simple
    } else {
        Complexity::Moderate
    }
}
