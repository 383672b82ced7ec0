use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use scan_core::prediction::WordModel;
use scan_core::settings::{ConfigError, Settings};
use scan_session::SpellerSession;

use crate::async_worker::SharedModel;
use crate::collaborators::{Speaker, TextStore};
use crate::events::OutputEvent;
use crate::runtime::EngineSession;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session closed")]
    Closed,
}

/// Shared resources for speller sessions: the prediction model and the
/// speech and storage collaborators.
pub struct ScanEngine {
    model: SharedModel,
    speaker: Arc<dyn Speaker>,
    store: Arc<dyn TextStore>,
}

impl ScanEngine {
    pub fn new(
        model: Box<dyn WordModel>,
        speaker: Arc<dyn Speaker>,
        store: Arc<dyn TextStore>,
    ) -> Self {
        Self {
            model: Arc::new(Mutex::new(model)),
            speaker,
            store,
        }
    }

    /// Start a session on its own thread. Returns the session handle and
    /// the receiver for its output events.
    pub fn open_session(
        &self,
        settings: &Settings,
    ) -> Result<(EngineSession, Receiver<OutputEvent>), EngineError> {
        let session = SpellerSession::new(settings)?;
        EngineSession::spawn(
            session,
            Arc::clone(&self.model),
            Arc::clone(&self.speaker),
            Arc::clone(&self.store),
        )
    }
}
