// ---------------------------------------------------------------------------
// Ranking — the single cosine-similarity top-k primitive
// ---------------------------------------------------------------------------
//
// Both the item store and the venue catalog rank through `rank`. Callers
// differ only in the candidate set they hand over and whether a keyword
// boost is applied.
// ---------------------------------------------------------------------------

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::cosine::{cosine_with_magnitude, magnitude};
use crate::types::TasteVector;

/// Per-word boost for a free-text match.
const BOOST_PER_WORD: f64 = 0.05;
/// Upper bound on the total keyword boost.
const MAX_BOOST: f64 = 0.15;
/// Shorter query words are ignored.
const MIN_WORD_CHARS: usize = 3;

/// Anything that carries a taste vector and can be ranked.
pub trait Rankable {
	fn vector(&self) -> &TasteVector;

	fn magnitude(&self) -> f64 {
		magnitude(self.vector())
	}
}

/// A ranked candidate. `score` is capped at 1.0 but not rounded.
#[derive(Debug)]
pub struct Ranked<'a, T> {
	pub entry: &'a T,
	pub score: f64,
}

/// Score every candidate against `query`, stable-sort descending and keep
/// the first `top_k`. Scores are capped at 1.0 only after ordering.
///
/// Zero-magnitude candidates are skipped; a zero-magnitude query yields no
/// results. Ties keep the candidates' input order.
pub fn rank<'a, T, I>(
	candidates: I,
	query: &TasteVector,
	top_k: usize,
	boost: Option<&dyn Fn(&T) -> f64>,
) -> Vec<Ranked<'a, T>>
where
	T: Rankable + 'a,
	I: IntoIterator<Item = &'a T>,
{
	let query_mag = magnitude(query);
	if query_mag == 0.0 || top_k == 0 {
		return Vec::new();
	}

	let mut scored: Vec<(&'a T, f64)> = candidates
		.into_iter()
		.filter_map(|entry| {
			let sim = cosine_with_magnitude(query, entry.vector(), query_mag, entry.magnitude())?;
			let bonus = boost.map(|f| f(entry)).unwrap_or(0.0);
			Some((entry, sim + bonus))
		})
		.collect();

	// Order on the uncapped score; `sort_by` is stable, so exact ties keep
	// input order.
	scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
	scored.truncate(top_k);
	scored
		.into_iter()
		.map(|(entry, raw)| Ranked {
			entry,
			score: raw.min(1.0),
		})
		.collect()
}

// ---------------------------------------------------------------------------
// Keyword boost
// ---------------------------------------------------------------------------

/// Distinct lowercase query words used to nudge items whose name or
/// description mention them.
#[derive(Debug, Clone)]
pub struct KeywordBoost {
	words: Vec<String>,
}

impl KeywordBoost {
	/// Tokenize `text` on whitespace, keeping lowercase words of at least
	/// three characters. Returns `None` when no word qualifies.
	pub fn new(text: &str) -> Option<Self> {
		let mut seen = HashSet::new();
		let words: Vec<String> = text
			.split_whitespace()
			.filter(|w| w.chars().count() >= MIN_WORD_CHARS)
			.map(str::to_lowercase)
			.filter(|w| seen.insert(w.clone()))
			.collect();
		if words.is_empty() {
			None
		} else {
			Some(Self { words })
		}
	}

	/// `min(0.05 * matched, 0.15)` where a match is a substring hit in
	/// `name + " " + description`.
	pub fn score(&self, name: &str, description: &str) -> f64 {
		let target = format!("{} {}", name, description).to_lowercase();
		let hits = self
			.words
			.iter()
			.filter(|w| target.contains(w.as_str()))
			.count();
		(hits as f64 * BOOST_PER_WORD).min(MAX_BOOST)
	}
}
