//! Canned answers for small talk
//!
//! When no provider can answer, short simple prompts that match a keyword
//! list get a fixed reply. Anything else gets [`fallback_response`].

use super::complexity::{contains_phrase, normalized_words};
use crate::entities::Complexity;

/// Longest prompt, in words, a template may answer
pub const MAX_TEMPLATE_WORDS: usize = 12;

/// A keyword category and its reply
#[derive(Debug, Clone, Copy)]
pub struct TemplateCategory {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub response: &'static str,
}

/// Categories in match order; the first match wins
pub const TEMPLATE_CATEGORIES: &[TemplateCategory] = &[
    TemplateCategory {
        name: "thanks",
        keywords: &["thanks", "thank you", "thx", "cheers", "appreciate it"],
        response: "You're welcome! Let me know if there's anything else I can do.",
    },
    TemplateCategory {
        name: "farewell",
        keywords: &["bye", "goodbye", "see you", "good night", "farewell", "later"],
        response: "Goodbye! Come back any time you need a hand.",
    },
    TemplateCategory {
        name: "wellbeing",
        keywords: &["how are you", "how's it going", "how are things", "how do you do"],
        response: "I'm doing well, thanks for asking! How can I help you today?",
    },
    TemplateCategory {
        name: "identity",
        keywords: &["who are you", "your name", "what are you", "are you a bot"],
        response: "I'm NOUS, your personal assistant. I can answer questions and help you get things done.",
    },
    TemplateCategory {
        name: "help",
        keywords: &["help", "what can you do", "how does this work", "assist"],
        response: "I can answer questions, give recommendations and help you plan. Just tell me what you need.",
    },
    TemplateCategory {
        name: "greeting",
        keywords: &["hello", "hi", "hey", "hiya", "greetings", "good morning", "good afternoon", "good evening"],
        response: "Hello! I'm NOUS. What can I do for you?",
    },
];

const FALLBACK_RESPONSE: &str =
    "I'm sorry, I can't answer that right now. Please try again in a little while.";

/// Generic reply used when nothing else can answer
pub fn fallback_response() -> &'static str {
    FALLBACK_RESPONSE
}

/// A template that matched a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateMatch {
    pub category: &'static str,
    pub text: &'static str,
}

/// Keyword-driven template responder
#[derive(Debug, Clone)]
pub struct TemplateResponder {
    categories: &'static [TemplateCategory],
}

impl Default for TemplateResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateResponder {
    pub fn new() -> Self {
        Self {
            categories: TEMPLATE_CATEGORIES,
        }
    }

    /// Match a prompt against the keyword lists
    ///
    /// Only `Simple` prompts of at most [`MAX_TEMPLATE_WORDS`] words are
    /// considered.
    pub fn respond(&self, prompt: &str, complexity: Complexity) -> Option<TemplateMatch> {
        if complexity != Complexity::Simple {
            return None;
        }

        let words = normalized_words(prompt);
        if words.is_empty() || words.len() > MAX_TEMPLATE_WORDS {
            return None;
        }

        self.categories
            .iter()
            .find(|category| category.keywords.iter().any(|k| contains_phrase(&words, k)))
            .map(|category| TemplateMatch {
                category: category.name,
                text: category.response,
            })
    }
}
