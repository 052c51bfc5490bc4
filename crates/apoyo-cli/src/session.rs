//! Runtime wiring: config → advisor + narrator.

use std::sync::Arc;

use apoyo_knowledge::{Advisor, ImageLibrary, KnowledgeStore};
use apoyo_voice::{CommandSpeech, Narrator, SilentSpeech, SpeechBackend};

use crate::config::Config;

pub struct Session {
    pub advisor: Advisor,
    pub narrator: Narrator,
}

impl Session {
    /// Open the knowledge file and start narration as configured.
    pub fn from_config(cfg: &Config) -> Result<Self, String> {
        let store = KnowledgeStore::open(&cfg.knowledge_file).map_err(|e| e.to_string())?;
        let images = ImageLibrary::new(&cfg.image_dir);
        let advisor = Advisor::new(store, images, cfg.question_table());

        let backend: Arc<dyn SpeechBackend> = if cfg.narration {
            Arc::new(CommandSpeech::new(&cfg.speech_command, cfg.speech_args.clone()))
        } else {
            Arc::new(SilentSpeech)
        };
        let narrator = Narrator::spawn(backend).map_err(|e| e.to_string())?;

        Ok(Self { advisor, narrator })
    }

    /// Queue `text` for speech.  Printing it is the caller's job.
    pub fn say(&self, text: impl Into<String>) {
        self.narrator.say(text);
    }

    /// Wait for pending narration, then stop.
    pub fn shutdown(self) {
        self.narrator.shutdown();
    }
}
