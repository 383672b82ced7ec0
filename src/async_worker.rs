use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use scan_core::prediction::{predict, WordModel};
use scan_core::settings::PredictionSettings;
use scan_session::{PredictionBatch, PredictionRequest};
use tracing::{debug, warn};

use crate::collaborators::Speaker;
use crate::runtime::QueueItem;

/// Shared, lockable prediction model.
pub type SharedModel = Arc<Mutex<Box<dyn WordModel>>>;

// ---------------------------------------------------------------------------
// Work type
// ---------------------------------------------------------------------------

struct PredictionWork {
    context: String,
    generation: u64,
}

// ---------------------------------------------------------------------------
// PredictionWorker
// ---------------------------------------------------------------------------

/// Background prediction thread for one session.
///
/// Only the most recent request matters: queued requests are drained to the
/// latest, and a result is dropped if a newer request (or an invalidation)
/// arrived while it was being computed. Results are posted onto the
/// session's queue so they are serialized with switch input and ticks.
pub(crate) struct PredictionWorker {
    tx: mpsc::Sender<PredictionWork>,
    generation: Arc<AtomicU64>,
}

impl PredictionWorker {
    pub fn new(
        model: SharedModel,
        settings: PredictionSettings,
        deliver: mpsc::Sender<QueueItem>,
    ) -> std::io::Result<Self> {
        let generation = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::channel::<PredictionWork>();
        {
            let gen = Arc::clone(&generation);
            thread::Builder::new()
                .name("scan-predictions".into())
                .spawn(move || prediction_worker(rx, deliver, gen, model, settings))?;
        }
        Ok(Self { tx, generation })
    }

    pub fn submit(&self, request: PredictionRequest) {
        self.generation.store(request.generation, Ordering::SeqCst);
        let _ = self.tx.send(PredictionWork {
            context: request.context,
            generation: request.generation,
        });
    }

    /// Make any in-flight request stale.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// SpeechWorker
// ---------------------------------------------------------------------------

/// Speech thread for one session. Utterances are spoken in order; a slow
/// synthesizer never holds up ticks or switch input.
pub(crate) struct SpeechWorker {
    tx: mpsc::Sender<String>,
}

impl SpeechWorker {
    pub fn new(speaker: Arc<dyn Speaker>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<String>();
        thread::Builder::new()
            .name("scan-speech".into())
            .spawn(move || {
                while let Ok(text) = rx.recv() {
                    speaker.speak(&text);
                }
                debug!("speech worker finished");
            })?;
        Ok(Self { tx })
    }

    pub fn speak(&self, text: String) {
        if self.tx.send(text).is_err() {
            warn!("speech thread gone, utterance dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Worker thread
// ---------------------------------------------------------------------------

fn prediction_worker(
    rx: mpsc::Receiver<PredictionWork>,
    deliver: mpsc::Sender<QueueItem>,
    gen: Arc<AtomicU64>,
    model: SharedModel,
    settings: PredictionSettings,
) {
    let debounce = Duration::from_millis(settings.refresh_debounce_ms);
    while let Ok(work) = rx.recv() {
        // Drain: if multiple work items queued, skip to latest
        let mut latest = work;
        while let Ok(newer) = rx.try_recv() {
            latest = newer;
        }

        // Debounce: let a burst of edits settle, then take the newest
        if !debounce.is_zero() {
            thread::sleep(debounce);
            while let Ok(newer) = rx.try_recv() {
                latest = newer;
            }
        }

        if latest.generation != gen.load(Ordering::SeqCst) {
            continue;
        }

        let predictions = match model.lock() {
            Ok(mut m) => predict(&mut **m, &latest.context, &settings),
            Err(_) => {
                warn!("prediction model lock poisoned");
                continue;
            }
        };
        let available = predictions.available();
        let candidates = predictions.collect();

        // Check staleness after work
        if latest.generation != gen.load(Ordering::SeqCst) {
            debug!(generation = latest.generation, "prediction finished stale");
            continue;
        }

        let batch = PredictionBatch {
            generation: latest.generation,
            candidates,
            available,
        };
        if deliver.send(QueueItem::Predictions(batch)).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_core::prediction::{PredictionCandidate, PredictionError};

    struct Echo;

    impl WordModel for Echo {
        fn predict_words(
            &mut self,
            context: &str,
            _limit: usize,
        ) -> Result<Vec<PredictionCandidate>, PredictionError> {
            Ok(vec![PredictionCandidate::new(context.trim(), 0.5)])
        }
    }

    fn worker(debounce_ms: u64) -> (PredictionWorker, mpsc::Receiver<QueueItem>) {
        let (tx, rx) = mpsc::channel();
        let settings = PredictionSettings {
            refresh_debounce_ms: debounce_ms,
            ..PredictionSettings::default()
        };
        let boxed: Box<dyn WordModel> = Box::new(Echo);
        let model: SharedModel = Arc::new(Mutex::new(boxed));
        (PredictionWorker::new(model, settings, tx).unwrap(), rx)
    }

    fn request(context: &str, generation: u64) -> PredictionRequest {
        PredictionRequest {
            context: context.to_string(),
            generation,
        }
    }

    fn recv_batch(rx: &mpsc::Receiver<QueueItem>) -> Option<PredictionBatch> {
        match rx.recv_timeout(Duration::from_secs(2)) {
            Ok(QueueItem::Predictions(batch)) => Some(batch),
            _ => None,
        }
    }

    #[test]
    fn delivers_tagged_batch() {
        let (w, rx) = worker(0);
        w.submit(request("hello", 3));
        let batch = recv_batch(&rx).unwrap();
        assert_eq!(batch.generation, 3);
        assert!(batch.available);
        assert_eq!(batch.candidates[0].word, "hello");
    }

    #[test]
    fn burst_collapses_to_latest() {
        let (w, rx) = worker(100);
        for (i, ctx) in ["a", "ab", "abc"].iter().enumerate() {
            w.submit(request(ctx, i as u64 + 1));
        }
        let batch = recv_batch(&rx).unwrap();
        assert_eq!(batch.generation, 3);
        assert_eq!(batch.candidates[0].word, "abc");
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    struct SlowRecorder(Mutex<Vec<String>>);

    impl Speaker for SlowRecorder {
        fn speak(&self, text: &str) {
            thread::sleep(Duration::from_millis(300));
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    #[test]
    fn speech_is_queued_in_order_without_blocking() {
        let speaker = Arc::new(SlowRecorder(Mutex::new(Vec::new())));
        let speech = SpeechWorker::new(speaker.clone()).unwrap();
        let started = std::time::Instant::now();
        speech.speak("one".to_string());
        speech.speak("two".to_string());
        assert!(started.elapsed() < Duration::from_millis(200));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while speaker.0.lock().unwrap().len() < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(*speaker.0.lock().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn invalidated_request_is_dropped() {
        let (w, rx) = worker(100);
        w.submit(request("x", 1));
        w.invalidate();
        assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    }
}
