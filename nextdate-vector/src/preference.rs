// ---------------------------------------------------------------------------
// Preference vector — rated history to a single taste vector
// ---------------------------------------------------------------------------
//
// Pure functions, no side effects. History is ordered most-recent-first.
//
//   success (rating >= 3): w = rating/5 * recency(i),           adds v * w
//   failure (rating <  3): w = (3 - rating)/5 * recency(i) * .5, adds (1 - v) * w
//   recency(i) = 1 / (1 + 0.1 i)
//
// Result = clamp(sum / total_weight, 0, 1), rounded to 4 decimals, or the
// neutral vector when nothing resolves.
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use crate::registry::CustomVectorRegistry;
use crate::store::VectorStore;
use crate::types::{ItemRef, RatedEvent, TasteVector, DIMENSIONS};

/// Ratings at or above this count as a success.
pub const SUCCESS_THRESHOLD: f64 = 3.0;
const MAX_RATING: f64 = 5.0;
const RECENCY_DECAY: f64 = 0.1;
/// Failures push away at half the strength successes pull.
const FAILURE_DAMPING: f64 = 0.5;

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Maps a history reference to its vector, if one is known.
pub trait VectorResolver {
	fn resolve(&self, item: &ItemRef) -> Option<TasteVector>;
}

impl VectorResolver for HashMap<ItemRef, TasteVector> {
	fn resolve(&self, item: &ItemRef) -> Option<TasteVector> {
		self.get(item).copied()
	}
}

/// Vectors looked up once from the store and the custom registry.
#[derive(Debug, Default, Clone)]
pub struct ResolvedVectors {
	vectors: HashMap<ItemRef, TasteVector>,
}

impl ResolvedVectors {
	/// Resolve catalog refs against `store` and custom refs against
	/// `registry`. Unknown refs are simply absent.
	pub fn collect<'a, I>(store: &VectorStore, registry: &CustomVectorRegistry, refs: I) -> Self
	where
		I: IntoIterator<Item = &'a ItemRef>,
	{
		let mut catalog_ids = Vec::new();
		let mut record_ids = Vec::new();
		for r in refs {
			match r {
				ItemRef::Catalog(id) => catalog_ids.push(*id),
				ItemRef::Custom(record) => record_ids.push(record.clone()),
			}
		}

		let mut vectors: HashMap<ItemRef, TasteVector> = store
			.vectors(&catalog_ids)
			.into_iter()
			.map(|(id, v)| (ItemRef::Catalog(id), v))
			.collect();
		vectors.extend(
			registry
				.get(&record_ids)
				.into_iter()
				.map(|(id, v)| (ItemRef::Custom(id), v)),
		);
		Self { vectors }
	}

	pub fn len(&self) -> usize {
		self.vectors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.vectors.is_empty()
	}
}

impl VectorResolver for ResolvedVectors {
	fn resolve(&self, item: &ItemRef) -> Option<TasteVector> {
		self.vectors.get(item).copied()
	}
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

pub fn recency_weight(position: usize) -> f64 {
	1.0 / (1.0 + RECENCY_DECAY * position as f64)
}

/// Compute the preference vector from most-recent-first history.
///
/// Unrated entries are dropped before positions are assigned; rated
/// entries whose item does not resolve keep their position but add no
/// weight.
pub fn compute_preference(events: &[RatedEvent], resolver: &impl VectorResolver) -> TasteVector {
	let mut sum = [0.0f64; DIMENSIONS];
	let mut total_weight = 0.0;

	let rated = events
		.iter()
		.filter_map(|e| e.rating.map(|r| (&e.item, r)));
	for (i, (item, rating)) in rated.enumerate() {
		let Some(vector) = resolver.resolve(item) else {
			continue;
		};
		let recency = recency_weight(i);

		if rating >= SUCCESS_THRESHOLD {
			let weight = (rating / MAX_RATING) * recency;
			for (s, v) in sum.iter_mut().zip(vector.components()) {
				*s += v * weight;
			}
			total_weight += weight;
		} else {
			let weight = ((SUCCESS_THRESHOLD - rating) / MAX_RATING) * recency * FAILURE_DAMPING;
			for (s, v) in sum.iter_mut().zip(vector.components()) {
				*s += (1.0 - v) * weight;
			}
			total_weight += weight;
		}
	}

	if total_weight == 0.0 {
		return TasteVector::NEUTRAL;
	}
	TasteVector::from_computed(sum.map(|s| s / total_weight))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
