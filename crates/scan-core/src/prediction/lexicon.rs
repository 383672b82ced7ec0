use std::collections::HashMap;
use std::path::Path;

use super::{PredictionCandidate, PredictionError, WordModel};
use crate::text_buffer::is_word_char;

/// Weight of one bigram observation relative to one unigram observation
/// when completing a fragment.
const BIGRAM_WEIGHT: u64 = 10;

/// Frequency lexicon built from a plain-text corpus.
///
/// Completes the fragment at the end of the context, or proposes the words
/// that most often follow the previous word. Deterministic: equal weights
/// are ordered by word.
#[derive(Debug, Clone, Default)]
pub struct LexiconPredictor {
    unigrams: HashMap<String, u64>,
    bigrams: HashMap<String, HashMap<String, u64>>,
}

impl LexiconPredictor {
    pub fn from_corpus(text: &str) -> Self {
        let mut lex = Self::default();
        let mut prev: Option<String> = None;
        for word in words(text) {
            let word = word.to_lowercase();
            *lex.unigrams.entry(word.clone()).or_insert(0) += 1;
            if let Some(p) = prev.take() {
                *lex.bigrams
                    .entry(p)
                    .or_default()
                    .entry(word.clone())
                    .or_insert(0) += 1;
            }
            prev = Some(word);
        }
        lex
    }

    pub fn from_file(path: &Path) -> Result<Self, PredictionError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_corpus(&text))
    }

    pub fn is_empty(&self) -> bool {
        self.unigrams.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.unigrams.len()
    }

    fn follower_count(&self, prev: Option<&str>, word: &str) -> u64 {
        prev.and_then(|p| self.bigrams.get(p))
            .and_then(|f| f.get(word))
            .copied()
            .unwrap_or(0)
    }
}

impl WordModel for LexiconPredictor {
    fn predict_words(
        &mut self,
        context: &str,
        limit: usize,
    ) -> Result<Vec<PredictionCandidate>, PredictionError> {
        if self.is_empty() {
            return Err(PredictionError::Unavailable("empty lexicon".to_string()));
        }
        let (before, fragment) = split_fragment(context);
        let prev = words(before).last().map(str::to_lowercase);
        let prev = prev.as_deref();

        let pool: Vec<(&str, u64)> = if fragment.is_empty() {
            match prev.and_then(|p| self.bigrams.get(p)) {
                Some(followers) => followers.iter().map(|(w, &n)| (w.as_str(), n)).collect(),
                None => self.unigrams.iter().map(|(w, &n)| (w.as_str(), n)).collect(),
            }
        } else {
            let needle = fragment.to_lowercase();
            self.unigrams
                .iter()
                .filter(|(w, _)| w.starts_with(&needle))
                .map(|(w, &n)| (w.as_str(), n + BIGRAM_WEIGHT * self.follower_count(prev, w)))
                .collect()
        };

        let total: u64 = pool.iter().map(|(_, n)| n).sum();
        if total == 0 {
            return Ok(Vec::new());
        }
        let mut pool = pool;
        pool.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let capitalize = fragment.chars().next().is_some_and(char::is_uppercase);
        Ok(pool
            .into_iter()
            .take(limit)
            .map(|(w, n)| PredictionCandidate {
                word: if capitalize { capitalized(w) } else { w.to_string() },
                score: n as f32 / total as f32,
            })
            .collect())
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !is_word_char(c)).filter(|w| !w.is_empty())
}

/// Split `context` into the text before the trailing word fragment and the
/// fragment itself.
fn split_fragment(context: &str) -> (&str, &str) {
    let start = context
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word_char(*c))
        .last()
        .map_or(context.len(), |(i, _)| i);
    context.split_at(start)
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
