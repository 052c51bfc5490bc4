//! `apoyo-knowledge` – the key-addressed knowledge base.
//!
//! # Modules
//!
//! - [`store`] – [`KnowledgeStore`][store::KnowledgeStore]: the flat text
//!   file of `key: short || detailed` lines, loaded into memory and updated
//!   one line at a time.
//! - [`images`] – [`ImageLibrary`][images::ImageLibrary]: optional
//!   `<key>.png` image per entry.
//! - [`advisor`] – [`Advisor`][advisor::Advisor]: derives keys from answers,
//!   consults the store, and validates new contributions.

pub mod advisor;
pub mod images;
pub mod store;

pub use advisor::{AdviceError, Advisor, Consultation, Contribution};
pub use images::{ImageError, ImageLibrary, StagedImage};
pub use store::{Coverage, KnowledgeStore, StoreError, UpsertOutcome};
