//! Speech backends.

use std::process::{Command, Stdio};

use tracing::debug;

use crate::{VoiceError, VoiceResult};

/// Something that can say a piece of text out loud.
///
/// `speak` blocks until the text has been spoken; the [`Narrator`] worker
/// calls it off the caller's thread.
///
/// [`Narrator`]: crate::Narrator
pub trait SpeechBackend: Send + Sync {
    fn speak(&self, text: &str) -> VoiceResult<()>;
}

/// Runs an external TTS program (`espeak-ng`, `say`, …) with the text as its
/// last argument.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SpeechBackend for CommandSpeech {
    fn speak(&self, text: &str) -> VoiceResult<()> {
        debug!(program = %self.program, chars = text.chars().count(), "Speaking");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| VoiceError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(VoiceError::Tts(format!("{} exited with {}", self.program, status)))
        }
    }
}

/// Backend used when narration is turned off.
#[derive(Debug, Default)]
pub struct SilentSpeech;

impl SpeechBackend for SilentSpeech {
    fn speak(&self, _text: &str) -> VoiceResult<()> {
        Ok(())
    }
}
