//! Shape checks for chat content
//!
//! Only plain ASCII text gets through: letters, digits, whitespace and the
//! punctuation `.,!?'"()-:;`. Content is never rewritten here.

use std::fmt;

use crate::constants::DEFAULT_MAX_MESSAGE_CHARS;

/// Verdict on a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Ok,
    /// Nothing to broadcast
    Empty,
    TooLong { chars: usize, max: usize },
    /// First character outside the allow-list
    IllegalCharacters(char),
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ValidationResult::Ok)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Empty => write!(f, "empty message"),
            Self::TooLong { chars, max } => {
                write!(f, "message too long ({} characters, limit {})", chars, max)
            }
            Self::IllegalCharacters(c) => write!(f, "illegal character {:?}", c),
        }
    }
}

const ALLOWED_PUNCTUATION: &[char] = &['.', ',', '!', '?', '\'', '"', '(', ')', '-', ':', ';'];

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric()
        // ASCII whitespace, vertical tab excluded
        || matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c')
        || ALLOWED_PUNCTUATION.contains(&c)
}

#[derive(Debug, Clone, Copy)]
pub struct MessageValidator {
    max_chars: usize,
}

impl MessageValidator {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn validate(&self, content: &str) -> ValidationResult {
        if content.is_empty() {
            return ValidationResult::Empty;
        }

        let chars = content.chars().count();
        if chars > self.max_chars {
            return ValidationResult::TooLong {
                chars,
                max: self.max_chars,
            };
        }

        match content.chars().find(|c| !is_allowed(*c)) {
            Some(c) => ValidationResult::IllegalCharacters(c),
            None => ValidationResult::Ok,
        }
    }
}

impl Default for MessageValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_CHARS)
    }
}
