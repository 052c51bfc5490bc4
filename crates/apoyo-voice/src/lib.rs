//! `apoyo-voice` – spoken output for Apoyo.
//!
//! # Modules
//!
//! - [`backend`] – the [`SpeechBackend`] trait plus a backend that shells out
//!   to a system TTS program and a silent one.
//! - [`narrator`] – [`Narrator`]: a queue of texts spoken one after another
//!   by a dedicated worker thread, so callers never wait on speech.

pub mod backend;
pub mod narrator;

pub use backend::{CommandSpeech, SilentSpeech, SpeechBackend};
pub use narrator::Narrator;

use thiserror::Error;

pub type VoiceResult<T> = Result<T, VoiceError>;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Failed to run speech program '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Failed to start narration worker: {0}")]
    Worker(std::io::Error),
}
