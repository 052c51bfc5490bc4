//! [`Narrator`] – background speech queue.
//!
//! Texts handed to [`Narrator::say`] go onto an unbounded
//! [`tokio::sync::mpsc`] queue.  A single named worker thread drains it and
//! speaks each text through the configured [`SpeechBackend`], in the order
//! they were queued.  A failing backend is logged and the worker moves on to
//! the next text.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use apoyo_voice::{Narrator, SilentSpeech};
//!
//! let narrator = Narrator::spawn(Arc::new(SilentSpeech)).unwrap();
//! narrator.say("Conocimiento agregado correctamente.");
//! narrator.shutdown();
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{SpeechBackend, VoiceError, VoiceResult};

pub struct Narrator {
    tx: Option<mpsc::UnboundedSender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl Narrator {
    /// Start the worker thread.
    pub fn spawn(backend: Arc<dyn SpeechBackend>) -> VoiceResult<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let worker = thread::Builder::new()
            .name("apoyo-narrator".to_string())
            .spawn(move || {
                while let Some(text) = rx.blocking_recv() {
                    if let Err(e) = backend.speak(&text) {
                        warn!(error = %e, "Narration failed");
                    }
                }
                debug!("Narration worker stopped");
            })
            .map_err(VoiceError::Worker)?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Queue `text` and return immediately.  Blank text is ignored.
    pub fn say(&self, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        if let Some(tx) = &self.tx
            && tx.send(text).is_err()
        {
            warn!("Narration worker is gone; dropping text");
        }
    }

    /// Close the queue and wait until everything queued has been spoken.
    pub fn shutdown(mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("Narration worker panicked");
        }
    }
}

impl Drop for Narrator {
    /// Closes the queue without waiting for the worker.
    fn drop(&mut self) {
        self.tx.take();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        spoken: Mutex<Vec<String>>,
    }

    impl SpeechBackend for Recorder {
        fn speak(&self, text: &str) -> VoiceResult<()> {
            if text == "boom" {
                return Err(VoiceError::Tts("synthetic failure".to_string()));
            }
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn speaks_queued_texts_in_order() {
        let recorder = Arc::new(Recorder::default());
        let narrator = Narrator::spawn(recorder.clone()).unwrap();
        narrator.say("uno");
        narrator.say("dos");
        narrator.say("tres");
        narrator.shutdown();
        assert_eq!(*recorder.spoken.lock().unwrap(), vec!["uno", "dos", "tres"]);
    }

    #[test]
    fn backend_failure_does_not_stop_worker() {
        let recorder = Arc::new(Recorder::default());
        let narrator = Narrator::spawn(recorder.clone()).unwrap();
        narrator.say("antes");
        narrator.say("boom");
        narrator.say("después");
        narrator.shutdown();
        assert_eq!(*recorder.spoken.lock().unwrap(), vec!["antes", "después"]);
    }

    #[test]
    fn blank_text_is_not_queued() {
        let recorder = Arc::new(Recorder::default());
        let narrator = Narrator::spawn(recorder.clone()).unwrap();
        narrator.say("   ");
        narrator.say(String::new());
        narrator.shutdown();
        assert!(recorder.spoken.lock().unwrap().is_empty());
    }

    #[test]
    fn drop_without_shutdown_does_not_block() {
        let narrator = Narrator::spawn(Arc::new(crate::SilentSpeech)).unwrap();
        narrator.say("hola");
        drop(narrator);
    }
}
