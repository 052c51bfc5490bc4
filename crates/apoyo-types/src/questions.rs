//! Question table and key derivation.
//!
//! Every answer option carries a short binary code.  A key is the
//! concatenation of the codes selected for each question, in table order:
//!
//! | question        | options (code)                                           |
//! |-----------------|----------------------------------------------------------|
//! | `estado`        | triste (00), ansioso/a (01), aburrido/a (10), normal (11) |
//! | `amigos`        | muy bien (00), regular (01), no tengo amigos (10), mal (11) |
//! | `familia`       | estable y de apoyo (00), a veces discutimos mucho (01), es conflictiva … (10) |
//! | `apoyo_externo` | sí, recibo ayuda profesional (00), … no lo necesito (11)  |
//!
//! # Example
//!
//! ```rust
//! use apoyo_types::{Answers, QuestionTable, derive_key};
//!
//! let table = QuestionTable::builtin();
//! let answers = Answers::new()
//!     .with("estado", "normal")
//!     .with("amigos", "regular")
//!     .with("familia", "estable y de apoyo")
//!     .with("apoyo_externo", "no lo necesito");
//!
//! assert_eq!(derive_key(&answers, &table).unwrap(), "11010011");
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ApoyoError;

// ─────────────────────────────────────────────────────────────────────────────
// Question
// ─────────────────────────────────────────────────────────────────────────────

/// One selectable answer and the binary code it contributes to the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub label: String,
    pub code: String,
}

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier used in [`Answers`] (e.g. `"estado"`).
    pub id: String,
    /// Text shown to the user.
    pub prompt: String,
    pub options: Vec<AnswerOption>,
}

impl Question {
    /// Return the code of the option labelled `label`.
    pub fn code_for(&self, label: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.label == label)
            .map(|o| o.code.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// QuestionTable
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered, validated set of questions.
///
/// Deserializes from a plain list of [`Question`]s and runs the same
/// validation as [`QuestionTable::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Question>", into = "Vec<Question>")]
pub struct QuestionTable {
    questions: Vec<Question>,
    code_width: usize,
}

impl QuestionTable {
    /// Validate `questions` and build a table.
    ///
    /// Every code must consist of `0`/`1` digits and share one width; labels
    /// and codes must be unique within a question; question ids must be
    /// unique.
    pub fn new(questions: Vec<Question>) -> Result<Self, ApoyoError> {
        let first = questions
            .first()
            .ok_or_else(|| ApoyoError::InvalidTable("no questions".to_string()))?;
        let code_width = first
            .options
            .first()
            .map(|o| o.code.len())
            .ok_or_else(|| ApoyoError::InvalidTable(format!("question '{}' has no options", first.id)))?;
        if code_width == 0 {
            return Err(ApoyoError::InvalidTable("empty option code".to_string()));
        }

        let mut ids = HashSet::new();
        for q in &questions {
            if !ids.insert(q.id.as_str()) {
                return Err(ApoyoError::InvalidTable(format!("duplicate question '{}'", q.id)));
            }
            if q.options.is_empty() {
                return Err(ApoyoError::InvalidTable(format!("question '{}' has no options", q.id)));
            }
            let mut labels = HashSet::new();
            let mut codes = HashSet::new();
            for opt in &q.options {
                if opt.code.len() != code_width || !is_binary(&opt.code) {
                    return Err(ApoyoError::InvalidTable(format!(
                        "option '{}' of '{}' has code '{}', expected {} binary digits",
                        opt.label, q.id, opt.code, code_width
                    )));
                }
                if !labels.insert(opt.label.as_str()) {
                    return Err(ApoyoError::InvalidTable(format!(
                        "duplicate option '{}' in '{}'",
                        opt.label, q.id
                    )));
                }
                if !codes.insert(opt.code.as_str()) {
                    return Err(ApoyoError::InvalidTable(format!(
                        "duplicate code '{}' in '{}'",
                        opt.code, q.id
                    )));
                }
            }
        }

        Ok(Self { questions, code_width })
    }

    /// The four-question emotional-support table.
    pub fn builtin() -> Self {
        let q = |id: &str, prompt: &str, options: &[(&str, &str)]| Question {
            id: id.to_string(),
            prompt: prompt.to_string(),
            options: options
                .iter()
                .map(|(label, code)| AnswerOption {
                    label: label.to_string(),
                    code: code.to_string(),
                })
                .collect(),
        };
        Self {
            questions: vec![
                q(
                    "estado",
                    "¿Cómo te sientes la mayor parte del tiempo?",
                    &[("triste", "00"), ("ansioso/a", "01"), ("aburrido/a", "10"), ("normal", "11")],
                ),
                q(
                    "amigos",
                    "¿Cómo te llevas con tus amigos?",
                    &[("muy bien", "00"), ("regular", "01"), ("no tengo amigos", "10"), ("mal", "11")],
                ),
                q(
                    "familia",
                    "¿Cómo es tu relación con tu familia?",
                    &[
                        ("estable y de apoyo", "00"),
                        ("a veces discutimos mucho", "01"),
                        ("es conflictiva y no tengo mucho contacto con ellos", "10"),
                    ],
                ),
                q(
                    "apoyo_externo",
                    "¿Has buscado apoyo externo?",
                    &[
                        ("sí, recibo ayuda profesional", "00"),
                        ("no, pero lo estoy considerando", "01"),
                        ("no, no sé por dónde empezar", "10"),
                        ("no lo necesito", "11"),
                    ],
                ),
            ],
            code_width: 2,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Length of every key derived from this table.
    pub fn key_len(&self) -> usize {
        self.questions.len() * self.code_width
    }

    /// Check that `key` has the shape of a key derived from this table.
    pub fn validate_key(&self, key: &str) -> Result<(), ApoyoError> {
        if key.len() == self.key_len() && is_binary(key) {
            Ok(())
        } else {
            Err(ApoyoError::InvalidKey {
                key: key.to_string(),
                expected_len: self.key_len(),
            })
        }
    }

    /// Every key reachable through some combination of answers, in table
    /// order.
    pub fn combinations(&self) -> Vec<String> {
        self.questions.iter().fold(vec![String::new()], |prefixes, q| {
            prefixes
                .iter()
                .flat_map(|p| q.options.iter().map(move |o| format!("{p}{}", o.code)))
                .collect()
        })
    }
}

impl TryFrom<Vec<Question>> for QuestionTable {
    type Error = ApoyoError;

    fn try_from(questions: Vec<Question>) -> Result<Self, Self::Error> {
        Self::new(questions)
    }
}

impl From<QuestionTable> for Vec<Question> {
    fn from(table: QuestionTable) -> Self {
        table.questions
    }
}

impl Default for QuestionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn is_binary(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b == b'0' || b == b'1')
}

// ─────────────────────────────────────────────────────────────────────────────
// Answers
// ─────────────────────────────────────────────────────────────────────────────

/// The option label the user picked for each question id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers(HashMap<String, String>);

impl Answers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Answers::set`].
    pub fn with(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.set(question, answer);
        self
    }

    pub fn set(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.0.insert(question.into(), answer.into());
    }

    pub fn get(&self, question: &str) -> Option<&str> {
        self.0.get(question).map(String::as_str)
    }
}

impl<Q: Into<String>, A: Into<String>> FromIterator<(Q, A)> for Answers {
    fn from_iter<I: IntoIterator<Item = (Q, A)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(q, a)| (q.into(), a.into())).collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Key derivation
// ─────────────────────────────────────────────────────────────────────────────

/// Concatenate, in table order, the code of each selected answer.
///
/// Fails when a question has no answer or an answer is not one of its
/// question's options.  Answers to questions the table lacks are ignored.
pub fn derive_key(answers: &Answers, table: &QuestionTable) -> Result<String, ApoyoError> {
    let mut key = String::with_capacity(table.key_len());
    for q in table.questions() {
        let answer = answers.get(&q.id).ok_or_else(|| ApoyoError::MissingAnswer {
            question: q.id.clone(),
        })?;
        let code = q.code_for(answer).ok_or_else(|| ApoyoError::UnknownAnswer {
            question: q.id.clone(),
            answer: answer.to_string(),
        })?;
        key.push_str(code);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_first_answers() -> Answers {
        Answers::new()
            .with("estado", "triste")
            .with("amigos", "muy bien")
            .with("familia", "estable y de apoyo")
            .with("apoyo_externo", "sí, recibo ayuda profesional")
    }

    #[test]
    fn first_options_derive_all_zero_key() {
        let table = QuestionTable::builtin();
        assert_eq!(derive_key(&all_first_answers(), &table).unwrap(), "00000000");
    }

    #[test]
    fn derive_key_follows_table_order() {
        let table = QuestionTable::builtin();
        let answers = Answers::new()
            .with("apoyo_externo", "no, no sé por dónde empezar")
            .with("familia", "es conflictiva y no tengo mucho contacto con ellos")
            .with("amigos", "mal")
            .with("estado", "ansioso/a");
        assert_eq!(derive_key(&answers, &table).unwrap(), "01111010");
    }

    #[test]
    fn derive_key_is_deterministic() {
        let table = QuestionTable::builtin();
        let a = derive_key(&all_first_answers(), &table).unwrap();
        let b = derive_key(&all_first_answers(), &table).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn derive_key_rejects_unknown_answer() {
        let table = QuestionTable::builtin();
        let mut answers = all_first_answers();
        answers.set("familia", "no sé");
        let err = derive_key(&answers, &table).unwrap_err();
        assert_eq!(
            err,
            ApoyoError::UnknownAnswer {
                question: "familia".to_string(),
                answer: "no sé".to_string(),
            }
        );
    }

    #[test]
    fn derive_key_rejects_missing_answer() {
        let table = QuestionTable::builtin();
        let answers: Answers = [("estado", "normal"), ("amigos", "mal")].into_iter().collect();
        let err = derive_key(&answers, &table).unwrap_err();
        assert!(matches!(err, ApoyoError::MissingAnswer { question } if question == "familia"));
    }

    #[test]
    fn derive_key_ignores_answers_outside_the_table() {
        let table = QuestionTable::builtin();
        let answers = all_first_answers().with("trabajo", "bien");
        assert_eq!(derive_key(&answers, &table).unwrap(), derive_key(&all_first_answers(), &table).unwrap());
    }

    #[test]
    fn builtin_table_passes_validation() {
        let builtin = QuestionTable::builtin();
        let rebuilt = QuestionTable::new(builtin.questions().to_vec()).unwrap();
        assert_eq!(rebuilt, builtin);
        assert_eq!(builtin.key_len(), 8);
    }

    #[test]
    fn combinations_cover_every_option_product() {
        let table = QuestionTable::builtin();
        let keys = table.combinations();
        assert_eq!(keys.len(), 4 * 4 * 3 * 4);
        assert_eq!(keys.first().map(String::as_str), Some("00000000"));
        assert!(keys.iter().all(|k| table.validate_key(k).is_ok()));
        // familia never produces "11".
        assert!(!keys.iter().any(|k| &k[4..6] == "11"));
    }

    #[test]
    fn validate_key_checks_length_and_digits() {
        let table = QuestionTable::builtin();
        assert!(table.validate_key("01100111").is_ok());
        assert!(table.validate_key("0110011").is_err());
        assert!(table.validate_key("0110011x").is_err());
    }

    #[test]
    fn table_rejects_mixed_code_widths() {
        let questions = vec![Question {
            id: "q".to_string(),
            prompt: "?".to_string(),
            options: vec![
                AnswerOption { label: "a".to_string(), code: "0".to_string() },
                AnswerOption { label: "b".to_string(), code: "10".to_string() },
            ],
        }];
        assert!(matches!(QuestionTable::new(questions), Err(ApoyoError::InvalidTable(_))));
    }

    #[test]
    fn table_rejects_duplicate_codes_and_empty_input() {
        assert!(QuestionTable::new(Vec::new()).is_err());
        let questions = vec![Question {
            id: "q".to_string(),
            prompt: "?".to_string(),
            options: vec![
                AnswerOption { label: "a".to_string(), code: "1".to_string() },
                AnswerOption { label: "b".to_string(), code: "1".to_string() },
            ],
        }];
        assert!(QuestionTable::new(questions).is_err());
    }

    #[test]
    fn table_deserialization_runs_validation() {
        let good = r#"[{"id":"q","prompt":"?","options":[{"label":"si","code":"1"},{"label":"no","code":"0"}]}]"#;
        let table: QuestionTable = serde_json::from_str(good).unwrap();
        assert_eq!(table.key_len(), 1);

        let bad = r#"[{"id":"q","prompt":"?","options":[{"label":"si","code":"2"}]}]"#;
        assert!(serde_json::from_str::<QuestionTable>(bad).is_err());
    }
}
