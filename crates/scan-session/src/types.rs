use scan_core::prediction::PredictionCandidate;
use scan_core::switch::Activate;
use scan_core::tree::{LeafAction, NodeId, ScanPath};
use scan_core::Timestamp;

/// Inputs the scanner accepts besides clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanInput {
    Activate(Activate),
    Resume,
}

/// What the scanner tells the renderer, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Highlight {
        node: NodeId,
        label: String,
        path: ScanPath,
        at: Timestamp,
    },
    Select {
        node: NodeId,
        label: String,
        action: LeafAction,
        at: Timestamp,
    },
    Paused {
        at: Timestamp,
    },
    Resumed {
        at: Timestamp,
    },
}

/// Scanner state. Selection is transient: a selected leaf is reported and
/// scanning continues within the same input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Paused,
}

/// Ask the prediction worker for candidates for `context`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub context: String,
    pub generation: u64,
}

/// Completed prediction, tagged with the generation it was requested for.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionBatch {
    pub generation: u64,
    pub candidates: Vec<PredictionCandidate>,
    /// `false` when the model failed.
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSnapshot {
    pub text: String,
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionsUpdate {
    pub words: Vec<String>,
    pub available: bool,
}

/// Work for collaborators outside the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Read the text aloud; fire-and-forget.
    Speak(String),
    /// Persist the whole document.
    Save(String),
    /// Fetch the latest saved text and hand it back via `replace_text`.
    Load,
}

/// Everything one input produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionResponse {
    pub events: Vec<ScanEvent>,
    /// New text when it changed.
    pub text: Option<TextSnapshot>,
    /// New suggestions when they changed.
    pub predictions: Option<PredictionsUpdate>,
    /// Name of the keyboard now shown, when it changed.
    pub keyboard: Option<String>,
    pub prediction_request: Option<PredictionRequest>,
    pub effects: Vec<SessionEffect>,
}

impl SessionResponse {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.text.is_none()
            && self.predictions.is_none()
            && self.keyboard.is_none()
            && self.prediction_request.is_none()
            && self.effects.is_empty()
    }
}
