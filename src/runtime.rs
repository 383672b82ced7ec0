//! Session runtime: one thread per session serializing switch edges, clock
//! ticks and prediction results through a single queue.

use std::ops::ControlFlow;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use scan_core::settings::ScanConfig;
use scan_session::{PredictionBatch, SessionEffect, SessionResponse, SpellerSession};
use tracing::{debug, debug_span, warn};

use crate::async_worker::{PredictionWorker, SharedModel, SpeechWorker};
use crate::collaborators::{Speaker, TextStore};
use crate::engine::EngineError;
use crate::events::{convert_to_events, OutputEvent};

pub(crate) enum QueueItem {
    Edge { pressed: bool, at: Instant },
    Resume,
    Predictions(PredictionBatch),
    Reconfigure(ScanConfig),
    Close,
}

/// Feeds raw switch edges into a session. Cheap to clone; safe to use from
/// an input thread.
#[derive(Clone)]
pub struct SwitchHandle {
    tx: Sender<QueueItem>,
}

impl SwitchHandle {
    pub fn edge(&self, pressed: bool, at: Instant) -> Result<(), EngineError> {
        self.tx
            .send(QueueItem::Edge { pressed, at })
            .map_err(|_| EngineError::Closed)
    }

    pub fn press(&self) -> Result<(), EngineError> {
        self.edge(true, Instant::now())
    }

    pub fn release(&self) -> Result<(), EngineError> {
        self.edge(false, Instant::now())
    }
}

/// Handle to a running session. Dropping it closes the session.
pub struct EngineSession {
    tx: Sender<QueueItem>,
    thread: Option<JoinHandle<()>>,
}

impl EngineSession {
    pub(crate) fn spawn(
        session: SpellerSession,
        model: SharedModel,
        speaker: Arc<dyn Speaker>,
        store: Arc<dyn TextStore>,
    ) -> Result<(Self, Receiver<OutputEvent>), EngineError> {
        let (tx, rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let worker = PredictionWorker::new(model, session.prediction_settings().clone(), tx.clone())?;
        let speech = SpeechWorker::new(speaker)?;
        let session_loop = SessionLoop {
            session,
            worker,
            speech,
            store,
            events: event_tx,
            epoch: Instant::now(),
        };
        let thread = thread::Builder::new()
            .name("scan-session".into())
            .spawn(move || session_loop.run(rx))?;
        Ok((
            Self {
                tx,
                thread: Some(thread),
            },
            event_rx,
        ))
    }

    pub fn switch(&self) -> SwitchHandle {
        SwitchHandle {
            tx: self.tx.clone(),
        }
    }

    /// Leave the paused state.
    pub fn resume(&self) -> Result<(), EngineError> {
        self.send(QueueItem::Resume)
    }

    /// Validate `config` and hand it to the session; it takes effect at the
    /// next tick or activation.
    pub fn update_config(&self, config: ScanConfig) -> Result<(), EngineError> {
        config.validate()?;
        self.send(QueueItem::Reconfigure(config))
    }

    /// Stop scanning, drop pending predictions and wait for the session
    /// thread to finish.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn send(&self, item: QueueItem) -> Result<(), EngineError> {
        self.tx.send(item).map_err(|_| EngineError::Closed)
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.tx.send(QueueItem::Close);
        if thread.join().is_err() {
            warn!("session thread panicked");
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct SessionLoop {
    session: SpellerSession,
    worker: PredictionWorker,
    speech: SpeechWorker,
    store: Arc<dyn TextStore>,
    events: Sender<OutputEvent>,
    epoch: Instant,
}

impl SessionLoop {
    fn now(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn ms(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.epoch).as_millis() as u64
    }

    fn run(mut self, rx: Receiver<QueueItem>) {
        let resp = self.session.start(self.now());
        self.dispatch(resp);

        loop {
            let item = match self.session.next_deadline() {
                Some(deadline) => {
                    let wait = deadline.saturating_sub(self.now());
                    match rx.recv_timeout(Duration::from_millis(wait)) {
                        Ok(item) => Some(item),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match rx.recv() {
                    Ok(item) => Some(item),
                    Err(_) => break,
                },
            };

            if self.step(item).is_break() {
                break;
            }
        }

        self.worker.invalidate();
        self.session.close();
        debug!("session loop finished");
    }

    /// Handle one wakeup: a tick that fell due before `item` is delivered
    /// first, then the item itself. `None` means the deadline passed.
    fn step(&mut self, item: Option<QueueItem>) -> ControlFlow<()> {
        let due = match &item {
            Some(QueueItem::Edge { at, .. }) => self.ms(*at),
            _ => self.now(),
        };
        let tick = self.session.poll(due);
        self.dispatch(tick);

        let Some(item) = item else {
            return ControlFlow::Continue(());
        };
        let resp = match item {
            QueueItem::Edge { pressed, at } => {
                let at = self.ms(at);
                let _span = debug_span!("edge", pressed, at).entered();
                self.session.raw_edge(pressed, at)
            }
            QueueItem::Resume => self.session.resume(self.now()),
            QueueItem::Predictions(batch) => {
                match self.session.receive_predictions(batch, self.now()) {
                    Some(resp) => resp,
                    None => return ControlFlow::Continue(()),
                }
            }
            QueueItem::Reconfigure(config) => {
                if let Err(e) = self.session.update_config(config) {
                    warn!(error = %e, "config update rejected");
                }
                return ControlFlow::Continue(());
            }
            QueueItem::Close => return ControlFlow::Break(()),
        };
        self.dispatch(resp);
        ControlFlow::Continue(())
    }

    fn dispatch(&mut self, mut resp: SessionResponse) {
        if let Some(req) = resp.prediction_request.take() {
            self.worker.submit(req);
        }
        let effects = std::mem::take(&mut resp.effects);
        for event in convert_to_events(resp) {
            // The renderer may be gone; scanning carries on regardless.
            let _ = self.events.send(event);
        }
        for effect in effects {
            self.apply_effect(effect);
        }
    }

    fn apply_effect(&mut self, effect: SessionEffect) {
        match effect {
            SessionEffect::Speak(text) => self.speech.speak(text),
            SessionEffect::Save(text) => {
                if let Err(e) = self.store.save(&text) {
                    warn!(error = %e, "save failed");
                }
            }
            SessionEffect::Load => match self.store.load() {
                Ok(Some(text)) => {
                    let resp = self.session.replace_text(&text);
                    self.dispatch(resp);
                }
                Ok(None) => debug!("nothing saved yet"),
                Err(e) => warn!(error = %e, "load failed"),
            },
        }
    }
}
