//! `apoyo-types` – shared data model for the Apoyo knowledge base.
//!
//! # Modules
//!
//! - [`questions`] – [`QuestionTable`][questions::QuestionTable] and
//!   [`derive_key`][questions::derive_key]: turns the user's four answers
//!   into the binary key that addresses a knowledge entry.

pub mod questions;

pub use questions::{AnswerOption, Answers, Question, QuestionTable, derive_key};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single short/detailed response pair stored under one key.
///
/// Both answers empty means the key is reserved but nobody has written a
/// response for it yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Binary key, e.g. `"00010110"`.
    pub key: String,
    /// One-line answer shown first.
    pub short_answer: String,
    /// Longer answer shown on request.
    pub detailed_answer: String,
}

impl KnowledgeRecord {
    pub fn new(
        key: impl Into<String>,
        short_answer: impl Into<String>,
        detailed_answer: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            short_answer: short_answer.into(),
            detailed_answer: detailed_answer.into(),
        }
    }

    /// A record that reserves `key` without any content.
    pub fn reserved(key: impl Into<String>) -> Self {
        Self::new(key, "", "")
    }

    /// `true` when either answer has content.
    pub fn is_answered(&self) -> bool {
        !self.short_answer.is_empty() || !self.detailed_answer.is_empty()
    }

    /// `true` when there is a detailed answer worth offering.
    pub fn has_details(&self) -> bool {
        !self.detailed_answer.is_empty()
    }
}

/// Domain errors raised while deriving keys or validating question tables.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApoyoError {
    #[error("No answer given for question '{question}'")]
    MissingAnswer { question: String },

    #[error("'{answer}' is not an option of question '{question}'")]
    UnknownAnswer { question: String, answer: String },

    #[error("Invalid question table: {0}")]
    InvalidTable(String),

    #[error("Invalid key '{key}': expected {expected_len} binary digits")]
    InvalidKey { key: String, expected_len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_record_is_not_answered() {
        let rec = KnowledgeRecord::reserved("00000000");
        assert!(!rec.is_answered());
        assert!(!rec.has_details());
        assert_eq!(rec.key, "00000000");
    }

    #[test]
    fn record_with_only_details_counts_as_answered() {
        let rec = KnowledgeRecord::new("01010101", "", "Something longer");
        assert!(rec.is_answered());
        assert!(rec.has_details());
    }

    #[test]
    fn apoyo_error_display() {
        let err = ApoyoError::UnknownAnswer {
            question: "estado".to_string(),
            answer: "eufórico".to_string(),
        };
        assert!(err.to_string().contains("eufórico"));
        assert!(err.to_string().contains("estado"));

        let err2 = ApoyoError::InvalidKey {
            key: "0101".to_string(),
            expected_len: 8,
        };
        assert!(err2.to_string().contains("8 binary digits"));
    }
}
