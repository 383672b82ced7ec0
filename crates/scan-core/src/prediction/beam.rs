//! Beam search for whole next words over a next-token model.
//!
//! Word pieces that start with [`WORD_START`] open a new word. A partial
//! word is complete when the model's next token opens another word; its
//! score is the probability of its own pieces times the probability mass of
//! all word-opening tokens after it. The same word reached through different
//! segmentations accumulates probability.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::trace;

use super::{PredictionCandidate, PredictionError, WordModel};
use crate::settings::PredictionSettings;
use crate::text_buffer::is_word_char;

/// Word-boundary marker carried by word pieces.
pub const WORD_START: char = '▁';

/// Cached distributions are dropped wholesale past this many entries.
const CACHE_LIMIT: usize = 4096;

/// Next-token probability model.
pub trait TokenModel: Send {
    fn vocab_size(&self) -> usize;

    /// Probability of every vocabulary token following `tokens`.
    fn next_token_probs(&mut self, tokens: &[u32]) -> Result<Vec<f32>, PredictionError>;
}

pub trait Tokenizer: Send {
    fn encode(&self, text: &str) -> Vec<u32>;
    fn piece(&self, id: u32) -> Option<&str>;
}

/// Greedy longest-match tokenizer over a word-piece vocabulary.
///
/// Spaces are written as [`WORD_START`] and the text is given a leading
/// marker, so `"I like"` encodes as `▁I ▁like` when those pieces exist.
/// Characters no piece covers map to `<unk>` when the vocabulary has one
/// and are skipped otherwise.
#[derive(Debug, Clone)]
pub struct PieceTokenizer {
    pieces: Vec<String>,
    ids: HashMap<String, u32>,
    max_piece_chars: usize,
    unk: Option<u32>,
}

impl PieceTokenizer {
    pub fn new(pieces: Vec<String>) -> Self {
        let ids: HashMap<String, u32> = pieces
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i as u32))
            .collect();
        let max_piece_chars = pieces.iter().map(|p| p.chars().count()).max().unwrap_or(1);
        let unk = ids.get("<unk>").copied();
        Self {
            pieces,
            ids,
            max_piece_chars,
            unk,
        }
    }

    /// Parse a vocabulary file: one piece per line, optionally followed by a
    /// tab and a score (the SentencePiece `.vocab` format).
    pub fn from_vocab(text: &str) -> Self {
        let pieces = text
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.split('\t').next().unwrap_or(l).to_string())
            .collect();
        Self::new(pieces)
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

impl Tokenizer for PieceTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut chars: Vec<char> = Vec::with_capacity(text.len() + 1);
        chars.push(WORD_START);
        chars.extend(text.chars().map(|c| if c == ' ' { WORD_START } else { c }));

        let mut out = Vec::new();
        let mut pos = 0;
        while pos < chars.len() {
            let longest = (1..=self.max_piece_chars.min(chars.len() - pos))
                .rev()
                .find_map(|n| {
                    let piece: String = chars[pos..pos + n].iter().collect();
                    self.ids.get(&piece).map(|&id| (id, n))
                });
            match longest {
                Some((id, n)) => {
                    out.push(id);
                    pos += n;
                }
                None => {
                    if let Some(unk) = self.unk {
                        out.push(unk);
                    }
                    pos += 1;
                }
            }
        }
        out
    }

    fn piece(&self, id: u32) -> Option<&str> {
        self.pieces.get(id as usize).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct Partial {
    log_prob: f64,
    tokens: Vec<u32>,
    text: String,
}

impl PartialEq for Partial {
    fn eq(&self, other: &Self) -> bool {
        self.log_prob.total_cmp(&other.log_prob) == Ordering::Equal
    }
}

impl Eq for Partial {}

impl PartialOrd for Partial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Partial {
    fn cmp(&self, other: &Self) -> Ordering {
        self.log_prob.total_cmp(&other.log_prob)
    }
}

/// Distribution summary kept per token prefix.
#[derive(Debug, Clone)]
struct Expansion {
    /// Most likely next tokens, best first.
    top: Vec<(u32, f32)>,
    /// Total probability of tokens that open a new word.
    boundary_mass: f32,
}

/// [`WordModel`] running best-first beam search over a [`TokenModel`].
pub struct BeamSearchPredictor<M, T> {
    model: M,
    tokenizer: T,
    beam_width: usize,
    max_word_length: usize,
    cache: HashMap<Vec<u32>, Expansion>,
    inferences: u64,
}

impl<M: TokenModel, T: Tokenizer> BeamSearchPredictor<M, T> {
    pub fn new(model: M, tokenizer: T, settings: &PredictionSettings) -> Self {
        Self {
            model,
            tokenizer,
            beam_width: settings.beam_width.max(1),
            max_word_length: settings.max_word_length.max(1),
            cache: HashMap::new(),
            inferences: 0,
        }
    }

    /// Model calls made so far; cached prefixes do not count.
    pub fn inference_count(&self) -> u64 {
        self.inferences
    }

    fn starts_word(&self, id: u32) -> bool {
        self.tokenizer
            .piece(id)
            .is_some_and(|p| p.starts_with(WORD_START) || p.starts_with(' '))
    }

    fn expand(&mut self, tokens: Vec<u32>) -> Result<Expansion, PredictionError> {
        if let Some(e) = self.cache.get(&tokens) {
            return Ok(e.clone());
        }
        let probs = self.model.next_token_probs(&tokens)?;
        self.inferences += 1;

        let boundary_mass = probs
            .iter()
            .enumerate()
            .filter(|&(id, _)| self.starts_word(id as u32))
            .map(|(_, &p)| p)
            .sum();
        let mut top: Vec<(u32, f32)> = probs
            .iter()
            .enumerate()
            .filter(|(_, p)| **p > 0.0)
            .map(|(id, &p)| (id as u32, p))
            .collect();
        top.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        top.truncate(self.beam_width);

        let e = Expansion { top, boundary_mass };
        if self.cache.len() >= CACHE_LIMIT {
            self.cache.clear();
        }
        self.cache.insert(tokens, e.clone());
        Ok(e)
    }

    fn search(
        &mut self,
        context: &str,
        limit: usize,
    ) -> Result<Vec<PredictionCandidate>, PredictionError> {
        let fragment_start = context
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_word_char(*c))
            .last()
            .map_or(context.len(), |(i, _)| i);
        let (before, fragment) = context.split_at(fragment_start);
        let fragment = fragment.to_lowercase();
        let context_tokens = self.tokenizer.encode(before.trim_end());

        let max_expansions = self.beam_width * self.max_word_length * 4;
        let mut beam = BinaryHeap::new();
        beam.push(Partial {
            log_prob: 0.0,
            tokens: Vec::new(),
            text: String::new(),
        });
        let mut completed: HashMap<String, f64> = HashMap::new();
        let mut expansions = 0;

        while let Some(current) = beam.pop() {
            if completed.len() >= limit || expansions >= max_expansions {
                break;
            }
            if current.tokens.len() >= self.max_word_length {
                continue;
            }
            let mut prefix = context_tokens.clone();
            prefix.extend_from_slice(&current.tokens);
            let expansion = self.expand(prefix)?;
            expansions += 1;

            if !current.tokens.is_empty()
                && !current.text.is_empty()
                && current.text.to_lowercase().starts_with(&fragment)
            {
                let p = current.log_prob.exp() * f64::from(expansion.boundary_mass);
                if p > 0.0 {
                    *completed.entry(current.text.clone()).or_insert(0.0) += p;
                }
            }

            for &(id, p) in &expansion.top {
                let opens = self.starts_word(id);
                // The first piece must open the word; later ones must not.
                if opens != current.tokens.is_empty() {
                    continue;
                }
                let Some(piece) = self.tokenizer.piece(id) else {
                    continue;
                };
                let mut text = current.text.clone();
                text.push_str(piece.trim_start_matches([WORD_START, ' ']));
                let lower = text.to_lowercase();
                if !(lower.starts_with(&fragment) || fragment.starts_with(&lower)) {
                    continue;
                }
                let mut tokens = current.tokens.clone();
                tokens.push(id);
                beam.push(Partial {
                    log_prob: current.log_prob + f64::from(p).ln(),
                    tokens,
                    text,
                });
            }

            if beam.len() > self.beam_width {
                let mut kept = beam.into_sorted_vec();
                kept.reverse();
                kept.truncate(self.beam_width);
                beam = kept.into_iter().collect();
            }
        }
        trace!(
            expansions,
            inferences = self.inferences,
            completed = completed.len(),
            "beam search done"
        );

        let mut words: Vec<PredictionCandidate> = completed
            .into_iter()
            .map(|(word, p)| PredictionCandidate {
                word,
                score: p.min(1.0) as f32,
            })
            .collect();
        words.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.word.cmp(&b.word)));
        words.truncate(limit);
        Ok(words)
    }
}

impl<M: TokenModel, T: Tokenizer> WordModel for BeamSearchPredictor<M, T> {
    fn predict_words(
        &mut self,
        context: &str,
        limit: usize,
    ) -> Result<Vec<PredictionCandidate>, PredictionError> {
        if self.model.vocab_size() == 0 {
            return Err(PredictionError::Unavailable("empty vocabulary".to_string()));
        }
        self.search(context, limit)
    }
}
