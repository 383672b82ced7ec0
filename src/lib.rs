//! Single-switch scanning speller.
//!
//! [`ScanEngine`] owns the prediction model and the speech/storage
//! collaborators. Each [`EngineSession`] runs on its own thread, fed by a
//! [`SwitchHandle`], and reports [`OutputEvent`]s through a channel.
//! The deterministic scanning logic lives in `scan_session`; this crate
//! adds real time and background prediction.

mod async_worker;
mod collaborators;
mod engine;
mod events;
mod runtime;
pub mod trace_init;

pub use async_worker::SharedModel;
pub use collaborators::{FileTextStore, LogSpeaker, Speaker, TextStore};
pub use engine::{EngineError, ScanEngine};
pub use events::OutputEvent;
pub use runtime::{EngineSession, SwitchHandle};

pub use scan_core;
pub use scan_session;
