//! Consult and contribute flows on top of the store and image library.
//!
//! [`Advisor::consult`] turns a set of answers into either an answered
//! entry or the "insufficient knowledge" outcome.  [`Advisor::contribute`]
//! fills an unanswered key: a duplicate is refused, both answers are
//! required, and an image that fails to copy aborts the save.

use std::path::{Path, PathBuf};

use apoyo_types::{Answers, ApoyoError, KnowledgeRecord, QuestionTable, derive_key};
use thiserror::Error;
use tracing::{info, warn};

use crate::images::{ImageError, ImageLibrary};
use crate::store::{self, KnowledgeStore, StoreError, UpsertOutcome};

/// User-facing messages.  These are shown and spoken as-is.
pub mod messages {
    pub const INSUFFICIENT_KNOWLEDGE: &str =
        "No cuento con el conocimiento suficiente como para ayudarte con esa respuesta.";
    pub const DUPLICATE: &str = "Ya se cuenta con conocimiento para esta combinación de respuestas.";
    pub const MISSING_FIELDS: &str = "Por favor, completa ambos campos.";
    pub const SAVED: &str = "Conocimiento agregado correctamente.";
}

#[derive(Error, Debug)]
pub enum AdviceError {
    #[error(transparent)]
    Domain(#[from] ApoyoError),
    #[error("Key {0} already has knowledge")]
    Duplicate(String),
    #[error("Both the short and the detailed answer are required")]
    MissingField,
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AdviceError {
    /// Text to show and narrate for this error.
    pub fn user_message(&self) -> String {
        match self {
            AdviceError::Duplicate(_) => messages::DUPLICATE.to_string(),
            AdviceError::MissingField => messages::MISSING_FIELDS.to_string(),
            AdviceError::Image(e) => format!("Error al copiar la imagen: {e}"),
            AdviceError::Domain(e) => format!("Respuesta no válida: {e}"),
            AdviceError::Store(e) => format!("Error al guardar el conocimiento: {e}"),
        }
    }
}

/// Result of looking up a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consultation {
    /// The key has a short answer to show.
    Answered {
        key: String,
        record: KnowledgeRecord,
        image: Option<PathBuf>,
    },
    /// No record, or a record without a short answer.
    Unknown { key: String },
}

impl Consultation {
    pub fn key(&self) -> &str {
        match self {
            Consultation::Answered { key, .. } | Consultation::Unknown { key } => key,
        }
    }
}

/// A saved contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub key: String,
    pub outcome: UpsertOutcome,
    pub image: Option<PathBuf>,
}

pub struct Advisor {
    store: KnowledgeStore,
    images: ImageLibrary,
    table: QuestionTable,
}

impl Advisor {
    pub fn new(store: KnowledgeStore, images: ImageLibrary, table: QuestionTable) -> Self {
        Self { store, images, table }
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut KnowledgeStore {
        &mut self.store
    }

    pub fn images(&self) -> &ImageLibrary {
        &self.images
    }

    pub fn table(&self) -> &QuestionTable {
        &self.table
    }

    pub fn key_for(&self, answers: &Answers) -> Result<String, ApoyoError> {
        derive_key(answers, &self.table)
    }

    pub fn consult(&self, answers: &Answers) -> Result<Consultation, ApoyoError> {
        let key = self.key_for(answers)?;
        Ok(self.consult_key(&key))
    }

    /// Look up an already derived key.
    pub fn consult_key(&self, key: &str) -> Consultation {
        match self.store.lookup(key) {
            Some(record) if !record.short_answer.is_empty() => Consultation::Answered {
                key: key.to_string(),
                record: record.clone(),
                image: self.images.find(key),
            },
            _ => Consultation::Unknown { key: key.to_string() },
        }
    }

    /// Save a new entry for the key derived from `answers`.
    ///
    /// When `image` is given it is copied first; if the copy fails nothing
    /// is written to the knowledge file.  The copy only replaces the key's
    /// image once the text has been saved.
    pub fn contribute(
        &mut self,
        answers: &Answers,
        short: &str,
        detailed: &str,
        image: Option<&Path>,
    ) -> Result<Contribution, AdviceError> {
        let key = self.key_for(answers)?;

        if self.store.lookup(&key).is_some_and(KnowledgeRecord::is_answered) {
            warn!(key = %key, "Refusing to overwrite existing knowledge");
            return Err(AdviceError::Duplicate(key));
        }

        let short = store::clean_field(short)?;
        let detailed = store::clean_field(detailed)?;
        if short.is_empty() || detailed.is_empty() {
            return Err(AdviceError::MissingField);
        }

        let staged = match image {
            Some(src) => Some(self.images.stage(&key, src)?),
            None => None,
        };

        let outcome = match self.store.upsert(&key, short, detailed) {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(staged) = staged {
                    self.images.discard(staged);
                }
                return Err(e.into());
            }
        };
        let image = match staged {
            Some(staged) => Some(self.images.commit(staged)?),
            None => None,
        };
        info!(key = %key, ?outcome, has_image = image.is_some(), "Knowledge contributed");
        Ok(Contribution { key, outcome, image })
    }
}
