//! The scanning state machine.

use scan_core::clock::ScanClock;
use scan_core::settings::{ActivationMode, ConfigError, ReturnLevel, ScanConfig};
use scan_core::switch::Activate;
use scan_core::tree::{ScanNode, ScanPath, ScanTree};
use scan_core::Timestamp;
use tracing::{debug, debug_span, warn};

use crate::types::{ScanEvent, ScanInput, ScanState};

/// Walks a [`ScanTree`], highlighting one node at a time.
///
/// Ticks come from the owned [`ScanClock`] via [`Scanner::poll`]; switch
/// activations and resume requests via [`Scanner::handle`]. Each call
/// returns the events it produced, in order.
pub struct Scanner {
    tree: ScanTree,
    state: ScanState,
    cursor: ScanPath,
    /// Full wraps of the current group without an activation.
    passes: u32,
    clock: ScanClock,
    config: ScanConfig,
    /// Applied at the next tick or activation.
    staged: Option<ScanConfig>,
    /// Step mode: a further activation up to this time selects.
    confirm_until: Option<Timestamp>,
}

impl Scanner {
    pub fn new(tree: ScanTree, config: ScanConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tree,
            state: ScanState::Idle,
            cursor: ScanPath::first(),
            passes: 0,
            clock: ScanClock::new(config.dwell_ms),
            config,
            staged: None,
            confirm_until: None,
        })
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn cursor(&self) -> &ScanPath {
        &self.cursor
    }

    pub fn tree(&self) -> &ScanTree {
        &self.tree
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// The highlighted node.
    pub fn current(&self) -> Option<&ScanNode> {
        self.tree.resolve(&self.cursor)
    }

    /// When the next tick is due; `None` unless scanning.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        match self.state {
            ScanState::Scanning => self.clock.next_deadline(),
            ScanState::Idle | ScanState::Paused => None,
        }
    }

    /// Begin scanning at the root's first child. No-op unless idle.
    pub fn start(&mut self, now: Timestamp) -> Vec<ScanEvent> {
        if self.state != ScanState::Idle {
            return Vec::new();
        }
        self.apply_staged();
        self.cursor = ScanPath::first();
        self.passes = 0;
        self.confirm_until = None;
        self.state = ScanState::Scanning;
        self.clock.start(now);
        debug!(at = now, "scan started");
        let mut events = Vec::new();
        self.push_highlight(&mut events, now);
        events
    }

    pub fn stop(&mut self) {
        self.state = ScanState::Idle;
        self.clock.stop();
        self.confirm_until = None;
    }

    /// Validate and stage a new configuration.
    pub fn update_config(&mut self, config: ScanConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.staged = Some(config);
        Ok(())
    }

    /// Deliver a due tick, if any.
    pub fn poll(&mut self, now: Timestamp) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        if self.state != ScanState::Scanning {
            return events;
        }
        let Some(tick) = self.clock.poll(now) else {
            return events;
        };
        if self.apply_staged() {
            // Re-anchor so the new dwell counts from this tick.
            self.clock.start(tick.scheduled);
        }
        let _span = debug_span!("tick", at = tick.scheduled).entered();
        self.confirm_until = None;
        self.advance(&mut events, tick.scheduled, true);
        events
    }

    pub fn handle(&mut self, input: ScanInput, now: Timestamp) -> Vec<ScanEvent> {
        let _span = debug_span!("scan_input", ?input, state = ?self.state).entered();
        let mut events = Vec::new();
        match input {
            ScanInput::Activate(activate) => {
                self.apply_staged();
                self.on_activate(&mut events, activate);
            }
            ScanInput::Resume => {
                if self.state == ScanState::Paused {
                    self.state = ScanState::Scanning;
                    self.passes = 0;
                    self.clock.start(now);
                    debug!(at = now, cursor = %self.cursor, "resumed");
                    events.push(ScanEvent::Resumed { at: now });
                    self.push_highlight(&mut events, now);
                }
            }
        }
        events
    }

    /// Swap in a rebuilt tree, keeping the highlighted node if it still
    /// exists.
    pub fn replace_tree(&mut self, tree: ScanTree, now: Timestamp) -> Vec<ScanEvent> {
        let chain = self.tree.id_chain(&self.cursor);
        self.tree = tree;
        let mut events = Vec::new();
        if let Some(path) = chain.as_deref().and_then(|c| self.tree.locate(c)) {
            self.cursor = path;
            return events;
        }
        if self.state != ScanState::Idle {
            warn!(
                cursor = %self.cursor,
                "tree inconsistency: highlighted node gone after rebuild, back to root"
            );
        }
        self.cursor = ScanPath::first();
        self.passes = 0;
        self.confirm_until = None;
        if self.state == ScanState::Scanning {
            self.clock.reset(now);
            self.push_highlight(&mut events, now);
        }
        events
    }

    /// Highlight for the current cursor, for a renderer whose tree changed
    /// under an unchanged cursor. Empty unless scanning.
    pub fn highlight_current(&self, at: Timestamp) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        if self.state == ScanState::Scanning {
            self.push_highlight(&mut events, at);
        }
        events
    }

    fn apply_staged(&mut self) -> bool {
        let Some(config) = self.staged.take() else {
            return false;
        };
        debug!(?config, "scan config applied");
        self.clock.set_interval(config.dwell_ms);
        if config.activation_mode != ActivationMode::Step {
            self.confirm_until = None;
        }
        self.config = config;
        true
    }

    fn on_activate(&mut self, events: &mut Vec<ScanEvent>, activate: Activate) {
        if self.state != ScanState::Scanning {
            debug!(state = ?self.state, "activation ignored");
            return;
        }
        let at = activate.at;
        self.passes = 0;
        match self.config.activation_mode {
            ActivationMode::SelectOnRelease => self.select(events, at),
            ActivationMode::Step => {
                if self.confirm_until.is_some_and(|until| at <= until) {
                    self.confirm_until = None;
                    self.select(events, at);
                } else {
                    self.advance(events, at, false);
                    self.clock.reset(at);
                    self.confirm_until = Some(at + self.config.confirm_window_ms);
                }
            }
        }
    }

    /// Move to the next sibling. Timed advances count full passes and
    /// give up on the group once `repeat_scan_count` is reached.
    fn advance(&mut self, events: &mut Vec<ScanEvent>, at: Timestamp, timed: bool) {
        let Some(len) = self.tree.group_len(&self.cursor) else {
            return;
        };
        let wrapped = if len <= 1 {
            // Nothing to move to; still a full pass over the group.
            true
        } else {
            let next = (self.cursor.last() + 1) % len;
            self.cursor.set_last(next);
            next == 0
        };
        if timed && wrapped {
            self.passes += 1;
            if self.passes >= self.config.repeat_scan_count {
                self.exhausted(events, at);
                return;
            }
        }
        if len > 1 {
            self.push_highlight(events, at);
        }
    }

    fn exhausted(&mut self, events: &mut Vec<ScanEvent>, at: Timestamp) {
        self.passes = 0;
        if self.cursor.pop() {
            // Scanning restarts over the parent's children from the first.
            self.cursor.set_last(0);
            debug!(cursor = %self.cursor, "group exhausted, back to parent");
            self.push_highlight(events, at);
        } else {
            debug!(at, "root exhausted, pausing");
            self.state = ScanState::Paused;
            self.clock.stop();
            events.push(ScanEvent::Paused { at });
        }
    }

    fn select(&mut self, events: &mut Vec<ScanEvent>, at: Timestamp) {
        let Some(node) = self.tree.resolve(&self.cursor) else {
            return;
        };
        match node {
            ScanNode::Group { .. } => {
                self.cursor.push(0);
                debug!(cursor = %self.cursor, "descend");
            }
            ScanNode::Leaf { id, label, action } => {
                debug!(node = %id, "select");
                events.push(ScanEvent::Select {
                    node: id.clone(),
                    label: label.clone(),
                    action: action.clone(),
                    at,
                });
                match self.config.return_level {
                    ReturnLevel::Root => self.cursor = ScanPath::first(),
                    ReturnLevel::Group => self.cursor.set_last(0),
                }
            }
        }
        self.passes = 0;
        self.clock.reset(at);
        self.push_highlight(events, at);
    }

    fn push_highlight(&self, events: &mut Vec<ScanEvent>, at: Timestamp) {
        if let Some(node) = self.tree.resolve(&self.cursor) {
            events.push(ScanEvent::Highlight {
                node: node.id().clone(),
                label: node.label().to_string(),
                path: self.cursor.clone(),
                at,
            });
        }
    }
}
