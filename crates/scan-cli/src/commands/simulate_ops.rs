//! Replay a timestamped switch script through a session.
//!
//! Script lines are `<ms> <step>` where step is `press`, `release`, `resume`
//! or `wait`. Blank lines and `#` comments are skipped. Ticks that fall due
//! between steps are delivered first, and predictions are computed inline so
//! a run is fully reproducible.

use std::fs;
use std::path::Path;
use std::process;

use serde::Serialize;

use scan_core::prediction::{predict, LexiconPredictor, WordModel};
use scan_core::settings::{ConfigError, Settings};
use scan_core::Timestamp;
use scan_engine::trace_init::init_tracing;
use scan_session::{PredictionBatch, ScanEvent, SessionEffect, SessionResponse, SpellerSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Press,
    Release,
    Resume,
    /// Only let time pass.
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub at: Timestamp,
    pub kind: StepKind,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("line {line}: expected `<ms> <press|release|resume|wait>`")]
    Malformed { line: usize },
    #[error("line {line}: invalid timestamp {value:?}")]
    BadTimestamp { line: usize, value: String },
    #[error("line {line}: unknown step {value:?}")]
    UnknownStep { line: usize, value: String },
    #[error("line {line}: timestamp {at} is earlier than the previous step")]
    OutOfOrder { line: usize, at: Timestamp },
}

pub fn parse_script(text: &str) -> Result<Vec<Step>, ScriptError> {
    let mut steps: Vec<Step> = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let mut parts = content.split_whitespace();
        let (Some(ts), Some(word), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ScriptError::Malformed { line });
        };
        let at: Timestamp = ts.parse().map_err(|_| ScriptError::BadTimestamp {
            line,
            value: ts.to_string(),
        })?;
        let kind = match word {
            "press" => StepKind::Press,
            "release" => StepKind::Release,
            "resume" => StepKind::Resume,
            "wait" => StepKind::Wait,
            other => {
                return Err(ScriptError::UnknownStep {
                    line,
                    value: other.to_string(),
                })
            }
        };
        if steps.last().is_some_and(|prev| at < prev.at) {
            return Err(ScriptError::OutOfOrder { line, at });
        }
        steps.push(Step { at, kind });
    }
    Ok(steps)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One line of simulation output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Record {
    Highlight {
        at: Timestamp,
        node: String,
        label: String,
        path: String,
    },
    Select {
        at: Timestamp,
        node: String,
        label: String,
    },
    Paused {
        at: Timestamp,
    },
    Resumed {
        at: Timestamp,
    },
    Keyboard {
        at: Timestamp,
        name: String,
    },
    Text {
        at: Timestamp,
        text: String,
        cursor: usize,
    },
    Predictions {
        at: Timestamp,
        words: Vec<String>,
        available: bool,
    },
    Speak {
        at: Timestamp,
        text: String,
    },
    Save {
        at: Timestamp,
        text: String,
    },
    Load {
        at: Timestamp,
        found: bool,
    },
}

impl From<ScanEvent> for Record {
    fn from(e: ScanEvent) -> Self {
        match e {
            ScanEvent::Highlight {
                node,
                label,
                path,
                at,
            } => Record::Highlight {
                at,
                node: node.to_string(),
                label,
                path: path.to_string(),
            },
            ScanEvent::Select {
                node, label, at, ..
            } => Record::Select {
                at,
                node: node.to_string(),
                label,
            },
            ScanEvent::Paused { at } => Record::Paused { at },
            ScanEvent::Resumed { at } => Record::Resumed { at },
        }
    }
}

impl Record {
    pub fn render(&self) -> String {
        match self {
            Record::Highlight {
                at,
                node,
                label,
                path,
            } => format!("{at:>7}  highlight    {node:<14} {label:?} {path}"),
            Record::Select { at, node, label } => {
                format!("{at:>7}  select       {node:<14} {label:?}")
            }
            Record::Paused { at } => format!("{at:>7}  paused"),
            Record::Resumed { at } => format!("{at:>7}  resumed"),
            Record::Keyboard { at, name } => format!("{at:>7}  keyboard     {name}"),
            Record::Text { at, text, cursor } => {
                format!("{at:>7}  text         {text:?} cursor={cursor}")
            }
            Record::Predictions {
                at,
                words,
                available,
            } => {
                if *available {
                    format!("{at:>7}  predictions  [{}]", words.join(", "))
                } else {
                    format!("{at:>7}  predictions  unavailable")
                }
            }
            Record::Speak { at, text } => format!("{at:>7}  speak        {text:?}"),
            Record::Save { at, text } => format!("{at:>7}  save         {} chars", text.chars().count()),
            Record::Load { at, found } => format!("{at:>7}  load         found={found}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct Simulator {
    session: SpellerSession,
    model: Box<dyn WordModel>,
    /// In-memory stand-in for the text store.
    saved: Option<String>,
    records: Vec<Record>,
}

impl Simulator {
    pub fn new(settings: &Settings, model: Box<dyn WordModel>) -> Result<Self, ConfigError> {
        Ok(Self {
            session: SpellerSession::new(settings)?,
            model,
            saved: None,
            records: Vec::new(),
        })
    }

    pub fn session(&self) -> &SpellerSession {
        &self.session
    }

    pub fn run(&mut self, steps: &[Step]) -> &[Record] {
        let resp = self.session.start(0);
        self.absorb(resp, 0);
        for step in steps {
            self.advance_to(step.at);
            let resp = match step.kind {
                StepKind::Press => self.session.raw_edge(true, step.at),
                StepKind::Release => self.session.raw_edge(false, step.at),
                StepKind::Resume => self.session.resume(step.at),
                StepKind::Wait => continue,
            };
            self.absorb(resp, step.at);
        }
        &self.records
    }

    fn advance_to(&mut self, at: Timestamp) {
        while let Some(due) = self.session.next_deadline() {
            if due > at {
                break;
            }
            let resp = self.session.poll(due);
            self.absorb(resp, due);
        }
    }

    fn absorb(&mut self, resp: SessionResponse, now: Timestamp) {
        let SessionResponse {
            events,
            text,
            predictions,
            keyboard,
            prediction_request,
            effects,
        } = resp;

        self.records.extend(events.into_iter().map(Record::from));
        if let Some(name) = keyboard {
            self.records.push(Record::Keyboard { at: now, name });
        }
        if let Some(t) = text {
            self.records.push(Record::Text {
                at: now,
                text: t.text,
                cursor: t.cursor,
            });
        }
        if let Some(p) = predictions {
            self.records.push(Record::Predictions {
                at: now,
                words: p.words,
                available: p.available,
            });
        }

        for effect in effects {
            match effect {
                SessionEffect::Speak(text) => self.records.push(Record::Speak { at: now, text }),
                SessionEffect::Save(text) => {
                    self.saved = Some(text.clone());
                    self.records.push(Record::Save { at: now, text });
                }
                SessionEffect::Load => {
                    self.records.push(Record::Load {
                        at: now,
                        found: self.saved.is_some(),
                    });
                    if let Some(text) = self.saved.clone() {
                        let resp = self.session.replace_text(&text);
                        self.absorb(resp, now);
                    }
                }
            }
        }

        if let Some(req) = prediction_request {
            let predictions = predict(
                self.model.as_mut(),
                &req.context,
                self.session.prediction_settings(),
            );
            let available = predictions.available();
            let batch = PredictionBatch {
                generation: req.generation,
                candidates: predictions.collect(),
                available,
            };
            // A request superseded by a load above is stale and dropped here.
            if let Some(resp) = self.session.receive_predictions(batch, now) {
                self.absorb(resp, now);
            }
        }
    }
}

pub fn simulate(
    script: &str,
    settings: Option<&str>,
    corpus: Option<&str>,
    json: bool,
    trace_dir: Option<&str>,
) {
    // Held until the run ends so the trace is flushed.
    let _trace = trace_dir.map(|dir| {
        die!(
            init_tracing(Path::new(dir)),
            "Error opening trace dir {dir}: {}"
        )
    });
    let text = die!(fs::read_to_string(script), "Error reading {script}: {}");
    let steps = die!(parse_script(&text), "Error in {script}: {}");
    let settings = super::load_settings(settings);
    let model: Box<dyn WordModel> = match corpus {
        Some(path) => Box::new(die!(
            LexiconPredictor::from_file(Path::new(path)),
            "Error loading corpus {path}: {}"
        )),
        None => Box::new(LexiconPredictor::from_corpus("")),
    };
    let mut sim = die!(Simulator::new(&settings, model), "Error: {}");
    for record in sim.run(&steps) {
        if json {
            println!("{}", die!(serde_json::to_string(record), "Error: {}"));
        } else {
            println!("{}", record.render());
        }
    }
    eprintln!("Final text: {:?}", sim.session().text());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let steps = parse_script("# tap the first row\n100 press\n150 release  # let go\n\n2000 wait\n").unwrap();
        assert_eq!(
            steps,
            vec![
                Step {
                    at: 100,
                    kind: StepKind::Press
                },
                Step {
                    at: 150,
                    kind: StepKind::Release
                },
                Step {
                    at: 2000,
                    kind: StepKind::Wait
                },
            ]
        );
    }

    #[test]
    fn test_parse_script_errors() {
        assert_eq!(
            parse_script("100"),
            Err(ScriptError::Malformed { line: 1 })
        );
        assert_eq!(
            parse_script("x press"),
            Err(ScriptError::BadTimestamp {
                line: 1,
                value: "x".to_string()
            })
        );
        assert_eq!(
            parse_script("10 press\n20 hold"),
            Err(ScriptError::UnknownStep {
                line: 2,
                value: "hold".to_string()
            })
        );
        assert_eq!(
            parse_script("50 press\n40 release"),
            Err(ScriptError::OutOfOrder { line: 2, at: 40 })
        );
    }

    fn run(script: &str, corpus: &str) -> (Vec<Record>, String) {
        let model = Box::new(LexiconPredictor::from_corpus(corpus));
        let mut sim = Simulator::new(&Settings::default(), model).unwrap();
        let steps = parse_script(script).unwrap();
        let records = sim.run(&steps).to_vec();
        (records, sim.session().text())
    }

    #[test]
    fn test_simulate_types_a_letter() {
        let (records, text) = run(
            "100 press\n150 release\n300 press\n350 release\n",
            "hello world apple and",
        );
        assert_eq!(text, "a");
        assert!(records.contains(&Record::Text {
            at: 350,
            text: "a".to_string(),
            cursor: 1
        }));
        assert!(records.iter().any(|r| matches!(
            r,
            Record::Predictions { words, available: true, .. } if words.contains(&"apple".to_string())
        )));
    }

    #[test]
    fn test_simulate_without_corpus_reports_unavailable() {
        let (records, _) = run("", "");
        assert!(matches!(records[0], Record::Highlight { at: 0, .. }));
        assert!(records
            .iter()
            .any(|r| matches!(r, Record::Predictions { available: false, .. })));
    }

    #[test]
    fn test_simulate_idle_pauses_after_repeats() {
        let (records, _) = run("60000 wait\n", "");
        let paused: Vec<_> = records
            .iter()
            .filter(|r| matches!(r, Record::Paused { .. }))
            .collect();
        assert_eq!(paused.len(), 1);
        assert!(matches!(records.last(), Some(Record::Paused { .. })));
    }

    #[test]
    fn test_record_json() {
        let r = Record::Select {
            at: 5,
            node: "key:0:0".to_string(),
            label: "a".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&r).unwrap(),
            r#"{"event":"select","at":5,"node":"key:0:0","label":"a"}"#
        );
    }
}
