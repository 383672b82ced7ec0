//! Speller session: the scanner, the switch adapter, the text buffer and
//! the current predictions behind one deterministic input API.

use scan_core::prediction::PredictionCandidate;
use scan_core::settings::{ConfigError, PredictionSettings, ScanConfig, Settings};
use scan_core::switch::SwitchAdapter;
use scan_core::text_buffer::TextBuffer;
use scan_core::tree::{KeyboardSet, LeafAction, ScanNode, ScanTree};
use scan_core::Timestamp;
use tracing::{debug, debug_span, warn};

use crate::scanner::Scanner;
use crate::types::{
    PredictionBatch, PredictionRequest, PredictionsUpdate, ScanEvent, ScanInput, ScanState,
    SessionEffect, SessionResponse, TextSnapshot,
};

pub struct SpellerSession {
    scanner: Scanner,
    switch: SwitchAdapter,
    buffer: TextBuffer,
    keyboards: KeyboardSet,
    /// Name of the keyboard on screen.
    keyboard: String,
    /// Its rows and the action column, reused on every rebuild.
    layout: Vec<ScanNode>,
    predictions: Vec<PredictionCandidate>,
    predictions_available: bool,
    prediction_settings: PredictionSettings,
    /// Bumped on every text change; older prediction batches are stale.
    generation: u64,
    closed: bool,
}

impl SpellerSession {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let keyboards = KeyboardSet::from_settings(settings)?;
        let keyboard = keyboards.initial().to_string();
        let layout = keyboards
            .initial_layout()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "keyboard".to_string(),
                reason: format!("no layout for keyboard {keyboard}"),
            })?
            .nodes();
        let tree = ScanTree::build(&layout, &[]).map_err(|e| ConfigError::InvalidValue {
            field: "keyboard".to_string(),
            reason: e.to_string(),
        })?;
        let scanner = Scanner::new(tree, settings.scan.clone())?;
        Ok(Self {
            scanner,
            switch: SwitchAdapter::new(&settings.scan),
            buffer: TextBuffer::new(),
            keyboards,
            keyboard,
            layout,
            predictions: Vec::new(),
            predictions_available: true,
            prediction_settings: settings.prediction.clone(),
            generation: 0,
            closed: false,
        })
    }

    pub fn text(&self) -> String {
        self.buffer.text()
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    /// Name of the keyboard currently shown.
    pub fn keyboard(&self) -> &str {
        &self.keyboard
    }

    pub fn predictions(&self) -> &[PredictionCandidate] {
        &self.predictions
    }

    pub fn prediction_settings(&self) -> &PredictionSettings {
        &self.prediction_settings
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> ScanState {
        self.scanner.state()
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        if self.closed {
            return None;
        }
        self.scanner.next_deadline()
    }

    /// Start scanning and ask for the first suggestions.
    pub fn start(&mut self, now: Timestamp) -> SessionResponse {
        let mut resp = SessionResponse::default();
        if self.closed {
            return resp;
        }
        resp.events = self.scanner.start(now);
        resp.prediction_request = Some(self.next_request());
        resp
    }

    /// Feed one raw switch edge.
    pub fn raw_edge(&mut self, pressed: bool, now: Timestamp) -> SessionResponse {
        if self.closed {
            return SessionResponse::default();
        }
        match self.switch.on_raw_edge(pressed, now) {
            Some(activate) => self.handle(ScanInput::Activate(activate), activate.at),
            None => SessionResponse::default(),
        }
    }

    pub fn resume(&mut self, now: Timestamp) -> SessionResponse {
        self.handle(ScanInput::Resume, now)
    }

    pub fn handle(&mut self, input: ScanInput, now: Timestamp) -> SessionResponse {
        let mut resp = SessionResponse::default();
        if self.closed {
            return resp;
        }
        let _span = debug_span!("session_input", ?input).entered();
        let events = self.scanner.handle(input, now);
        let selected: Vec<LeafAction> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Select { action, .. } => Some(action.clone()),
                _ => None,
            })
            .collect();
        resp.events = events;
        for action in &selected {
            self.apply_select(action, now, &mut resp);
        }
        resp
    }

    /// Deliver a due clock tick, if any.
    pub fn poll(&mut self, now: Timestamp) -> SessionResponse {
        let mut resp = SessionResponse::default();
        if self.closed {
            return resp;
        }
        resp.events = self.scanner.poll(now);
        resp
    }

    /// Install a prediction result. Returns `None` for a stale batch.
    pub fn receive_predictions(
        &mut self,
        batch: PredictionBatch,
        now: Timestamp,
    ) -> Option<SessionResponse> {
        if self.closed || batch.generation != self.generation {
            debug!(
                batch = batch.generation,
                current = self.generation,
                "stale predictions dropped"
            );
            return None;
        }
        let mut candidates = batch.candidates;
        candidates.truncate(self.prediction_settings.max_candidates);
        let tree = match ScanTree::build(&self.layout, &candidates) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(error = %e, "prediction tree rejected");
                return None;
            }
        };
        self.predictions = candidates;
        self.predictions_available = batch.available;

        let mut resp = SessionResponse::default();
        resp.events = self.scanner.replace_tree(tree, now);
        resp.predictions = Some(PredictionsUpdate {
            words: self.predictions.iter().map(|c| c.word.clone()).collect(),
            available: self.predictions_available,
        });
        Some(resp)
    }

    /// Validate and stage a scan configuration. Timing applies from the
    /// next tick or activation; the switch adapter adopts it at once.
    pub fn update_config(&mut self, config: ScanConfig) -> Result<(), ConfigError> {
        self.scanner.update_config(config.clone())?;
        self.switch.update_config(&config);
        Ok(())
    }

    /// Replace the whole text (e.g. with a loaded document), cursor at end.
    pub fn replace_text(&mut self, text: &str) -> SessionResponse {
        let mut resp = SessionResponse::default();
        if self.closed {
            return resp;
        }
        self.buffer.replace_all(text);
        self.text_changed(&mut resp);
        resp
    }

    /// Stop scanning and invalidate outstanding prediction requests.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.generation += 1;
        self.scanner.stop();
        debug!("session closed");
    }

    fn apply_select(&mut self, action: &LeafAction, now: Timestamp, resp: &mut SessionResponse) {
        match action {
            LeafAction::InsertText(text) => {
                self.buffer.insert(text);
                self.text_changed(resp);
            }
            LeafAction::InsertPrediction { slot } => {
                let Some(candidate) = self.predictions.get(*slot) else {
                    warn!(slot, "prediction slot out of range");
                    return;
                };
                let word = candidate.word.clone();
                self.buffer.replace_fragment(&word);
                self.buffer.insert(" ");
                self.text_changed(resp);
            }
            LeafAction::Delete => {
                if self.buffer.delete_before_cursor() {
                    self.text_changed(resp);
                }
            }
            // The prediction context is the text left of the cursor, so a
            // cursor move refreshes suggestions like an edit does.
            LeafAction::CursorLeft => {
                if self.buffer.move_left() {
                    self.text_changed(resp);
                }
            }
            LeafAction::CursorRight => {
                if self.buffer.move_right() {
                    self.text_changed(resp);
                }
            }
            LeafAction::SwitchKeyboard(name) => self.switch_keyboard(name, now, resp),
            LeafAction::Speak => {
                let text = self.buffer.text();
                if !text.is_empty() {
                    resp.effects.push(SessionEffect::Speak(text));
                }
            }
            LeafAction::Save => {
                let document = self.buffer.document();
                if document.is_empty() {
                    debug!("nothing to save");
                } else {
                    resp.effects.push(SessionEffect::Save(document));
                }
            }
            LeafAction::Load => resp.effects.push(SessionEffect::Load),
            LeafAction::Clear => {
                self.buffer.clear();
                self.text_changed(resp);
            }
        }
    }

    fn switch_keyboard(&mut self, name: &str, now: Timestamp, resp: &mut SessionResponse) {
        if name == self.keyboard {
            return;
        }
        let Some(layout) = self.keyboards.get(name) else {
            warn!(keyboard = name, "switch to unknown keyboard ignored");
            return;
        };
        let nodes = layout.nodes();
        let tree = match ScanTree::build(&nodes, &self.predictions) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(error = %e, keyboard = name, "keyboard tree rejected");
                return;
            }
        };
        debug!(from = %self.keyboard, to = name, "keyboard switched");
        self.layout = nodes;
        self.keyboard = name.to_string();

        // Keyboard ids are positional, so the cursor usually survives; the
        // renderer still needs the new label under it.
        let events = self.scanner.replace_tree(tree, now);
        if events.is_empty() {
            resp.events.extend(self.scanner.highlight_current(now));
        } else {
            resp.events.extend(events);
        }
        resp.keyboard = Some(self.keyboard.clone());
    }

    fn text_changed(&mut self, resp: &mut SessionResponse) {
        resp.text = Some(TextSnapshot {
            text: self.buffer.text(),
            cursor: self.buffer.cursor(),
        });
        resp.prediction_request = Some(self.next_request());
    }

    fn next_request(&mut self) -> PredictionRequest {
        self.generation += 1;
        PredictionRequest {
            context: self.buffer.context(),
            generation: self.generation,
        }
    }
}
