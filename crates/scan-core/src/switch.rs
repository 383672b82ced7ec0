//! Switch input adapter: raw press/release edges in, clean activations out.
//!
//! Hardware switches bounce and drop edges. The adapter suppresses any edge
//! closer than `debounce_ms` to the last accepted edge, drops edges that
//! arrive out of order, and re-synchronizes when a release went missing.

use tracing::trace;

use crate::settings::{ActivationMode, ScanConfig};
use crate::Timestamp;

/// One logical switch activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activate {
    pub at: Timestamp,
    /// The press was held longer than one dwell period.
    pub held: bool,
}

#[derive(Debug, Clone)]
pub struct SwitchAdapter {
    debounce_ms: u64,
    dwell_ms: u64,
    mode: ActivationMode,
    last_edge: Option<Timestamp>,
    pressed_at: Option<Timestamp>,
}

impl SwitchAdapter {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            debounce_ms: config.debounce_ms,
            dwell_ms: config.dwell_ms,
            mode: config.activation_mode,
            last_edge: None,
            pressed_at: None,
        }
    }

    /// Adopt new timing. Press tracking survives so a press that straddles
    /// the update still yields its activation.
    pub fn update_config(&mut self, config: &ScanConfig) {
        self.debounce_ms = config.debounce_ms;
        self.dwell_ms = config.dwell_ms;
        self.mode = config.activation_mode;
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed_at.is_some()
    }

    /// Feed one raw edge. Returns at most one activation per physical press.
    pub fn on_raw_edge(&mut self, pressed: bool, at: Timestamp) -> Option<Activate> {
        if let Some(last) = self.last_edge {
            if at < last {
                trace!(at, last, "switch: out-of-order edge dropped");
                return None;
            }
            if at - last < self.debounce_ms {
                trace!(at, last, pressed, "switch: bounce suppressed");
                return None;
            }
        }

        if pressed {
            if let Some(start) = self.pressed_at {
                trace!(at, start, "switch: press while pressed, resync");
            }
            self.last_edge = Some(at);
            self.pressed_at = Some(at);
            match self.mode {
                ActivationMode::Step => Some(Activate { at, held: false }),
                ActivationMode::SelectOnRelease => None,
            }
        } else {
            let Some(start) = self.pressed_at.take() else {
                trace!(at, "switch: release without press dropped");
                return None;
            };
            self.last_edge = Some(at);
            match self.mode {
                ActivationMode::Step => None,
                ActivationMode::SelectOnRelease => Some(Activate {
                    at,
                    held: at - start > self.dwell_ms,
                }),
            }
        }
    }
}
