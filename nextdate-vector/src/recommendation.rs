// ---------------------------------------------------------------------------
// Recommender — history in, ranked items out
// ---------------------------------------------------------------------------
//
// best:  resolve history → preference → diversity nudge → search
// worst: resolve history → preference → inverted search (no nudge)
//
// Only the first `history_exclude` history entries are excluded from the
// results, so older favourites can come back around.
// ---------------------------------------------------------------------------

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::diversity::{apply_diversity, DEFAULT_DIVERSITY_STRENGTH};
use crate::error::VectorError;
use crate::preference::{compute_preference, ResolvedVectors};
use crate::registry::CustomVectorRegistry;
use crate::store::VectorStore;
use crate::types::{ItemRef, RatedEvent, SearchHit, TasteVector};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecommendConfig {
	pub diversity_strength: f64,
	/// How many of the most recent history entries are kept out of results.
	pub history_exclude: usize,
}

impl Default for RecommendConfig {
	fn default() -> Self {
		Self {
			diversity_strength: DEFAULT_DIVERSITY_STRENGTH,
			history_exclude: 20,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
	pub recommendations: Vec<SearchHit>,
	pub preference_vector: TasteVector,
}

// ---------------------------------------------------------------------------
// Recommender
// ---------------------------------------------------------------------------

pub struct Recommender {
	store: Arc<VectorStore>,
	registry: Arc<CustomVectorRegistry>,
	config: RecommendConfig,
}

impl Recommender {
	pub fn new(
		store: Arc<VectorStore>,
		registry: Arc<CustomVectorRegistry>,
		config: RecommendConfig,
	) -> Self {
		Self {
			store,
			registry,
			config,
		}
	}

	pub fn store(&self) -> &VectorStore {
		&self.store
	}

	pub fn registry(&self) -> &CustomVectorRegistry {
		&self.registry
	}

	pub fn config(&self) -> &RecommendConfig {
		&self.config
	}

	/// Vectors for every ref in `history`, from the store and the registry.
	pub fn resolve(&self, history: &[RatedEvent]) -> ResolvedVectors {
		ResolvedVectors::collect(&self.store, &self.registry, history.iter().map(|e| &e.item))
	}

	/// Preference vector for a most-recent-first history.
	pub fn preference(&self, history: &[RatedEvent]) -> Result<TasteVector, VectorError> {
		self.store.warm()?;
		Ok(compute_preference(history, &self.resolve(history)))
	}

	pub fn best(
		&self,
		history: &[RatedEvent],
		skip: &[u64],
		top_k: usize,
	) -> Result<Recommendation, VectorError> {
		self.store.warm()?;
		let resolved = self.resolve(history);
		let pref = compute_preference(history, &resolved);

		let recent: Vec<ItemRef> = history.iter().map(|e| e.item.clone()).collect();
		let pref = apply_diversity(&pref, &recent, &resolved, self.config.diversity_strength);

		let mut exclude = self.excluded(history);
		exclude.extend(skip.iter().copied());

		let recommendations = self.store.search(&pref, top_k, &exclude, None);
		tracing::debug!(
			history = history.len(),
			excluded = exclude.len(),
			returned = recommendations.len(),
			"Computed best matches"
		);
		Ok(Recommendation {
			recommendations,
			preference_vector: pref,
		})
	}

	pub fn worst(&self, history: &[RatedEvent], top_k: usize) -> Result<Recommendation, VectorError> {
		self.store.warm()?;
		let pref = compute_preference(history, &self.resolve(history));
		let exclude = self.excluded(history);
		let recommendations = self.store.search_worst(&pref, top_k, Some(&exclude));
		Ok(Recommendation {
			recommendations,
			preference_vector: pref,
		})
	}

	fn excluded(&self, history: &[RatedEvent]) -> HashSet<u64> {
		history
			.iter()
			.take(self.config.history_exclude)
			.filter_map(|e| e.item.catalog_id())
			.collect()
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::source::MemorySource;
	use crate::store::StoreConfig;
	use crate::types::Item;

	fn axis(i: usize) -> Vec<f64> {
		let mut v = vec![0.0; 9];
		v[i] = 1.0;
		v
	}

	fn item(id: u64, name: &str, values: Vec<f64>) -> Item {
		Item {
			id,
			name: name.to_string(),
			description: String::new(),
			vector: TasteVector::try_from(values).unwrap(),
		}
	}

	fn recommender(config: RecommendConfig) -> Recommender {
		let mut items: Vec<Item> = (0..9)
			.map(|i| item(i as u64 + 1, &format!("Axis {}", i), axis(i)))
			.collect();
		let mut near_cost = axis(0);
		near_cost[1] = 0.1;
		items.push(item(10, "Mostly cost", near_cost));
		let store = VectorStore::new(MemorySource::new(items), StoreConfig::default());
		Recommender::new(Arc::new(store), Arc::new(CustomVectorRegistry::default()), config)
	}

	fn rated(id: u64, rating: f64) -> RatedEvent {
		RatedEvent::rated(ItemRef::Catalog(id), rating).unwrap()
	}

	fn ids(hits: &[SearchHit]) -> Vec<u64> {
		hits.iter().map(|h| h.id).collect()
	}

	#[test]
	fn best_excludes_history_and_finds_neighbours() {
		let rec = recommender(RecommendConfig::default());
		let out = rec.best(&[rated(1, 5.0)], &[], 3).unwrap();
		assert!(!ids(&out.recommendations).contains(&1));
		assert_eq!(out.recommendations[0].id, 10);
	}

	#[test]
	fn best_honours_skip_list() {
		let rec = recommender(RecommendConfig::default());
		let out = rec.best(&[rated(1, 5.0)], &[10], 3).unwrap();
		assert!(!ids(&out.recommendations).contains(&10));
		assert!(!ids(&out.recommendations).contains(&1));
	}

	#[test]
	fn only_recent_history_is_excluded() {
		let rec = recommender(RecommendConfig {
			history_exclude: 1,
			..Default::default()
		});
		// item 10 is older than the exclusion window and can resurface
		let out = rec.best(&[rated(2, 5.0), rated(10, 5.0)], &[], 10).unwrap();
		let got = ids(&out.recommendations);
		assert!(!got.contains(&2));
		assert!(got.contains(&10));
	}

	#[test]
	fn empty_history_uses_neutral_preference() {
		let rec = recommender(RecommendConfig::default());
		let out = rec.best(&[], &[], 5).unwrap();
		assert_eq!(out.preference_vector, TasteVector::NEUTRAL);
		assert_eq!(out.recommendations.len(), 5);
	}

	#[test]
	fn best_applies_diversity() {
		let rec = recommender(RecommendConfig::default());
		let history = [rated(1, 5.0)];
		let plain = rec.preference(&history).unwrap();
		let out = rec.best(&history, &[], 1).unwrap();
		// centroid equals the preference, so the nudge is zero here
		assert_eq!(out.preference_vector, plain);

		let no_nudge = recommender(RecommendConfig {
			diversity_strength: 0.0,
			..Default::default()
		});
		let mixed = [rated(1, 5.0), rated(2, 1.0)];
		let nudged = rec.best(&mixed, &[], 1).unwrap().preference_vector;
		let raw = no_nudge.best(&mixed, &[], 1).unwrap().preference_vector;
		assert_ne!(nudged, raw);
	}

	#[test]
	fn worst_returns_opposites_without_diversity() {
		let rec = recommender(RecommendConfig::default());
		let history = [rated(1, 5.0)];
		let out = rec.worst(&history, 3).unwrap();
		assert_eq!(out.preference_vector, rec.preference(&history).unwrap());
		let got = ids(&out.recommendations);
		assert!(!got.contains(&1));
		assert!(!got.contains(&10));
	}

	#[test]
	fn custom_history_resolves_through_registry() {
		let rec = recommender(RecommendConfig::default());
		rec.registry().put("rec-1", axis(4)).unwrap();
		let history = [RatedEvent::rated(ItemRef::Custom("rec-1".into()), 5.0).unwrap()];
		let out = rec.best(&history, &[], 1).unwrap();
		assert_eq!(out.recommendations[0].id, 5);
	}
}
