use scan_core::tree::{NodeId, ScanPath};
use scan_session::{ScanEvent, SessionResponse};

/// Events delivered to the renderer, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Highlight {
        node: NodeId,
        label: String,
        path: ScanPath,
        /// Milliseconds since the session started.
        at: u64,
    },
    Select {
        node: NodeId,
        label: String,
        at: u64,
    },
    Paused,
    Resumed,
    /// Another keyboard is shown; node ids stay positional.
    KeyboardChanged {
        name: String,
    },
    TextChanged {
        text: String,
        cursor: usize,
    },
    PredictionsChanged {
        words: Vec<String>,
        /// `false` when the model failed; the suggestions are then empty.
        available: bool,
    },
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

pub(crate) fn convert_to_events(resp: SessionResponse) -> Vec<OutputEvent> {
    let mut events = Vec::with_capacity(resp.events.len() + 2);

    // 1. Scan events
    for e in resp.events {
        events.push(match e {
            ScanEvent::Highlight {
                node,
                label,
                path,
                at,
            } => OutputEvent::Highlight {
                node,
                label,
                path,
                at,
            },
            ScanEvent::Select {
                node, label, at, ..
            } => OutputEvent::Select { node, label, at },
            ScanEvent::Paused { .. } => OutputEvent::Paused,
            ScanEvent::Resumed { .. } => OutputEvent::Resumed,
        });
    }

    // 2. Keyboard
    if let Some(name) = resp.keyboard {
        events.push(OutputEvent::KeyboardChanged { name });
    }

    // 3. Text
    if let Some(t) = resp.text {
        events.push(OutputEvent::TextChanged {
            text: t.text,
            cursor: t.cursor,
        });
    }

    // 4. Predictions
    if let Some(p) = resp.predictions {
        events.push(OutputEvent::PredictionsChanged {
            words: p.words,
            available: p.available,
        });
    }

    events
}
