//! Scanning state machine and speller session.
//!
//! Everything here is deterministic: callers pass timestamps in and get
//! events back. The threaded runtime that drives a session from a queue
//! lives in the `scan_engine` crate.

mod scanner;
mod session;
mod types;

#[cfg(test)]
mod tests;

pub use scanner::Scanner;
pub use session::SpellerSession;
pub use types::{
    PredictionBatch, PredictionRequest, PredictionsUpdate, ScanEvent, ScanInput, ScanState,
    SessionEffect, SessionResponse, TextSnapshot,
};
