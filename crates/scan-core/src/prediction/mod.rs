//! Word prediction.
//!
//! A [`WordModel`] turns the text left of the cursor into scored next-word
//! candidates. [`predict`] wraps any model with the session's policy:
//! clip the context, rank, cap the count, and turn failures into an empty
//! result so scanning never stalls on the model.

mod beam;
mod lexicon;
#[cfg(feature = "neural")]
mod lstm;

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::settings::PredictionSettings;

pub use beam::{BeamSearchPredictor, PieceTokenizer, TokenModel, Tokenizer, WORD_START};
pub use lexicon::LexiconPredictor;
#[cfg(feature = "neural")]
pub use lstm::LstmTokenModel;

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionCandidate {
    pub word: String,
    /// Probability-like score in `[0, 1]`.
    pub score: f32,
}

impl PredictionCandidate {
    pub fn new(word: impl Into<String>, score: f32) -> Self {
        Self {
            word: word.into(),
            score,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("prediction model unavailable: {0}")]
    Unavailable(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A next-word model.
pub trait WordModel: Send {
    /// Up to `limit` candidates for the word at the end of `context`.
    ///
    /// When `context` ends inside a word the candidates complete that
    /// fragment; otherwise they propose the following word.
    fn predict_words(
        &mut self,
        context: &str,
        limit: usize,
    ) -> Result<Vec<PredictionCandidate>, PredictionError>;
}

impl<T: WordModel + ?Sized> WordModel for Box<T> {
    fn predict_words(
        &mut self,
        context: &str,
        limit: usize,
    ) -> Result<Vec<PredictionCandidate>, PredictionError> {
        (**self).predict_words(context, limit)
    }
}

/// Result of one prediction request: a finite, single-pass sequence.
#[derive(Debug)]
pub struct Predictions {
    inner: std::vec::IntoIter<PredictionCandidate>,
    available: bool,
}

impl Predictions {
    fn new(candidates: Vec<PredictionCandidate>) -> Self {
        Self {
            inner: candidates.into_iter(),
            available: true,
        }
    }

    fn unavailable() -> Self {
        Self {
            inner: Vec::new().into_iter(),
            available: false,
        }
    }

    /// `false` when the model failed and the sequence is empty because of it.
    pub fn available(&self) -> bool {
        self.available
    }
}

impl Iterator for Predictions {
    type Item = PredictionCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Query `model` for `context` under the session's prediction settings.
pub fn predict(
    model: &mut dyn WordModel,
    context: &str,
    settings: &PredictionSettings,
) -> Predictions {
    let context = clip_context(context, settings.max_context_chars);
    match model.predict_words(context, settings.max_candidates) {
        Ok(candidates) => {
            let ranked = rank(candidates, settings.max_candidates);
            debug!(count = ranked.len(), "predictions ready");
            Predictions::new(ranked)
        }
        Err(e) => {
            warn!(error = %e, "prediction unavailable");
            Predictions::unavailable()
        }
    }
}

/// The last `max_chars` characters of `context`.
pub fn clip_context(context: &str, max_chars: usize) -> &str {
    let count = context.chars().count();
    if count <= max_chars {
        return context;
    }
    match context.char_indices().nth(count - max_chars) {
        Some((i, _)) => &context[i..],
        None => "",
    }
}

/// Normalize model output: drop empty words and NaN scores, clamp to
/// `[0, 1]`, order by descending score then word, keep the best score per
/// word, cap at `max`.
pub fn rank(mut candidates: Vec<PredictionCandidate>, max: usize) -> Vec<PredictionCandidate> {
    candidates.retain(|c| !c.word.is_empty() && !c.score.is_nan());
    for c in &mut candidates {
        c.score = c.score.clamp(0.0, 1.0);
    }
    candidates.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.word.cmp(&b.word),
        other => other,
    });
    let mut out: Vec<PredictionCandidate> = Vec::with_capacity(max.min(candidates.len()));
    for c in candidates {
        if out.len() >= max {
            break;
        }
        if out.iter().any(|o| o.word == c.word) {
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<PredictionCandidate>);

    impl WordModel for Fixed {
        fn predict_words(
            &mut self,
            _context: &str,
            _limit: usize,
        ) -> Result<Vec<PredictionCandidate>, PredictionError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl WordModel for Failing {
        fn predict_words(
            &mut self,
            _context: &str,
            _limit: usize,
        ) -> Result<Vec<PredictionCandidate>, PredictionError> {
            Err(PredictionError::Inference("boom".to_string()))
        }
    }

    /// Records the context it was asked about.
    struct Echo(String);

    impl WordModel for Echo {
        fn predict_words(
            &mut self,
            context: &str,
            _limit: usize,
        ) -> Result<Vec<PredictionCandidate>, PredictionError> {
            self.0 = context.to_string();
            Ok(Vec::new())
        }
    }

    #[test]
    fn rank_orders_by_score_then_word() {
        let ranked = rank(
            vec![
                PredictionCandidate::new("beta", 0.5),
                PredictionCandidate::new("alpha", 0.5),
                PredictionCandidate::new("gamma", 0.9),
            ],
            5,
        );
        let words: Vec<&str> = ranked.iter().map(|c| c.word.as_str()).collect();
        assert_eq!(words, vec!["gamma", "alpha", "beta"]);
    }

    #[test]
    fn rank_clamps_dedups_and_caps() {
        let ranked = rank(
            vec![
                PredictionCandidate::new("a", 1.7),
                PredictionCandidate::new("b", -0.2),
                PredictionCandidate::new("a", 0.3),
                PredictionCandidate::new("", 0.9),
                PredictionCandidate::new("c", f32::NAN),
                PredictionCandidate::new("d", 0.1),
            ],
            2,
        );
        assert_eq!(
            ranked,
            vec![
                PredictionCandidate::new("a", 1.0),
                PredictionCandidate::new("d", 0.1)
            ]
        );
    }

    #[test]
    fn predict_caps_at_max_candidates() {
        let settings = PredictionSettings {
            max_candidates: 2,
            ..PredictionSettings::default()
        };
        let mut model = Fixed(vec![
            PredictionCandidate::new("x", 0.1),
            PredictionCandidate::new("y", 0.2),
            PredictionCandidate::new("z", 0.3),
        ]);
        let p = predict(&mut model, "ctx", &settings);
        assert!(p.available());
        let words: Vec<String> = p.map(|c| c.word).collect();
        assert_eq!(words, vec!["z", "y"]);
    }

    #[test]
    fn model_failure_is_empty_and_unavailable() {
        let mut p = predict(&mut Failing, "ctx", &PredictionSettings::default());
        assert!(!p.available());
        assert!(p.next().is_none());
    }

    #[test]
    fn context_clipped_to_window() {
        let settings = PredictionSettings {
            max_context_chars: 4,
            ..PredictionSettings::default()
        };
        let mut model = Echo(String::new());
        let _ = predict(&mut model, "zażółć", &settings);
        assert_eq!(model.0, "żółć");
    }

    #[test]
    fn empty_context_is_valid() {
        let mut model = Echo("unset".to_string());
        let p = predict(&mut model, "", &PredictionSettings::default());
        assert!(p.available());
        assert_eq!(model.0, "");
    }

    #[test]
    fn clip_context_short_input_unchanged() {
        assert_eq!(clip_context("abc", 10), "abc");
        assert_eq!(clip_context("abc", 0), "");
    }
}
