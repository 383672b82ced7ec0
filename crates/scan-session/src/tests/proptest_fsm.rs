//! Property-based tests for the speller session state machine.
//!
//! Generates random sequences of switch edges, clock advances, resumes and
//! prediction deliveries, and checks structural invariants after each step.

use proptest::prelude::*;

use scan_core::prediction::PredictionCandidate;
use scan_core::settings::{ActivationMode, ScanConfig, Settings};

use crate::types::{PredictionBatch, ScanEvent, ScanState};
use crate::SpellerSession;

// ---------------------------------------------------------------------------
// Action enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Action {
    /// Raw edge after `delay` ms.
    Edge { pressed: bool, delay: u64 },
    /// Let time pass, polling the clock once at the end.
    Wait(u64),
    Resume,
    /// Deliver predictions for the latest request.
    Predictions(Vec<String>),
    /// Deliver predictions for an older request.
    StalePredictions,
}

fn arb_word() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["the", "they", "then", "like", "love", "a", "I"])
        .prop_map(str::to_string)
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        20 => (any::<bool>(), 0u64..400).prop_map(|(pressed, delay)| Action::Edge { pressed, delay }),
        20 => (0u64..3000).prop_map(Action::Wait),
        3 => Just(Action::Resume),
        6 => prop::collection::vec(arb_word(), 0..7).prop_map(Action::Predictions),
        2 => Just(Action::StalePredictions),
    ]
}

fn arb_config() -> impl Strategy<Value = ScanConfig> {
    (
        prop_oneof![Just(ActivationMode::Step), Just(ActivationMode::SelectOnRelease)],
        1u32..4,
        prop_oneof![Just(300u64), Just(1000)],
    )
        .prop_map(|(activation_mode, repeat_scan_count, dwell_ms)| ScanConfig {
            dwell_ms,
            activation_mode,
            repeat_scan_count,
            debounce_ms: 50,
            ..ScanConfig::default()
        })
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

struct Harness {
    session: SpellerSession,
    now: u64,
    latest_generation: u64,
    events: Vec<ScanEvent>,
}

impl Harness {
    fn new(config: ScanConfig) -> Self {
        let settings = Settings {
            scan: config,
            ..Settings::default()
        };
        let mut session = SpellerSession::new(&settings).unwrap();
        let resp = session.start(0);
        let latest_generation = resp.prediction_request.map_or(0, |r| r.generation);
        Self {
            session,
            now: 0,
            latest_generation,
            events: resp.events,
        }
    }

    fn run(&mut self, action: &Action) {
        let resp = match action {
            Action::Edge { pressed, delay } => {
                self.now += delay;
                let mut resp = self.session.poll(self.now);
                let edge = self.session.raw_edge(*pressed, self.now);
                resp.events.extend(edge.events);
                resp.prediction_request = edge.prediction_request;
                resp
            }
            Action::Wait(ms) => {
                self.now += ms;
                self.session.poll(self.now)
            }
            Action::Resume => self.session.resume(self.now),
            Action::Predictions(words) => {
                let batch = PredictionBatch {
                    generation: self.latest_generation,
                    candidates: words
                        .iter()
                        .map(|w| PredictionCandidate::new(w.clone(), 0.5))
                        .collect(),
                    available: true,
                };
                self.session
                    .receive_predictions(batch, self.now)
                    .unwrap_or_default()
            }
            Action::StalePredictions => {
                let batch = PredictionBatch {
                    generation: self.latest_generation.saturating_sub(1),
                    candidates: vec![PredictionCandidate::new("stale", 1.0)],
                    available: true,
                };
                let resp = self.session.receive_predictions(batch, self.now);
                assert!(resp.is_none(), "stale batch accepted");
                Default::default()
            }
        };
        if let Some(req) = &resp.prediction_request {
            assert!(req.generation > self.latest_generation);
            self.latest_generation = req.generation;
        }
        self.events = resp.events;
    }

    fn check_invariants(&self) {
        let scanner = self.session.scanner();
        match scanner.state() {
            ScanState::Scanning => {
                assert!(scanner.current().is_some(), "cursor must resolve");
                let deadline = scanner.next_deadline().expect("clock armed while scanning");
                assert!(deadline > self.now, "deadline {deadline} not after {}", self.now);
            }
            ScanState::Paused => {
                assert!(scanner.current().is_some(), "cursor must resolve");
                assert_eq!(scanner.next_deadline(), None);
            }
            ScanState::Idle => panic!("session left scanning without close"),
        }

        let selects = self
            .events
            .iter()
            .filter(|e| matches!(e, ScanEvent::Select { .. }))
            .count();
        assert!(selects <= 1, "one selection per input at most");

        if let Some(ScanEvent::Paused { .. }) = self.events.last() {
            assert_eq!(scanner.state(), ScanState::Paused);
        }

        assert!(self.session.predictions().len() <= 5);
        assert!(self.session.buffer().cursor() <= self.session.buffer().len());
        assert!(self.session.generation() >= self.latest_generation);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn session_invariants_hold(
        config in arb_config(),
        actions in prop::collection::vec(arb_action(), 1..80),
    ) {
        let mut h = Harness::new(config);
        h.check_invariants();
        for action in &actions {
            h.run(action);
            h.check_invariants();
        }
    }

    #[test]
    fn highlight_always_names_resolvable_node(
        actions in prop::collection::vec(arb_action(), 1..60),
    ) {
        let mut h = Harness::new(ScanConfig::default());
        for action in &actions {
            h.run(action);
            // Events of one input all refer to the tree current after it.
            let last = h
                .events
                .iter()
                .rev()
                .find(|e| matches!(e, ScanEvent::Highlight { .. }));
            if let Some(ScanEvent::Highlight { path, node, .. }) = last {
                let resolved = h.session.scanner().tree().resolve(path).map(|n| n.id().clone());
                prop_assert_eq!(resolved.as_ref(), Some(node));
            }
        }
    }
}
