// ---------------------------------------------------------------------------
// VectorStore — canonical item catalog held in memory
// ---------------------------------------------------------------------------
//
// Lifecycle is an explicit one-shot state machine:
//
//   Uninitialized ──warm()──► Loading ──ok──► Ready
//                               │
//                               └──err──► Failed ──warm()──► Loading ...
//
// Concurrent first callers block on the in-flight load and share its
// outcome. The catalog itself is an immutable snapshot behind an `Arc`;
// readers clone the `Arc` and rank without holding any lock, writers swap
// in a modified copy.
// ---------------------------------------------------------------------------

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::cosine::magnitude;
use crate::error::VectorError;
use crate::ranking::{rank, KeywordBoost, Rankable};
use crate::source::{ItemSink, ItemSource};
use crate::types::{Item, ItemSummary, SearchHit, TasteVector, round4};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a `VectorStore`.
#[derive(Debug, Clone)]
pub struct StoreConfig {
	/// Id assigned to the first appended item when the catalog is empty.
	pub append_id_base: u64,
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self {
			append_id_base: 200,
		}
	}
}

// ---------------------------------------------------------------------------
// Catalog snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredItem {
	item: Item,
	magnitude: f64,
}

impl Rankable for StoredItem {
	fn vector(&self) -> &TasteVector {
		&self.item.vector
	}

	fn magnitude(&self) -> f64 {
		self.magnitude
	}
}

/// Items in load/append order plus an id index. Never mutated once shared.
#[derive(Debug, Clone, Default)]
struct Catalog {
	items: Vec<StoredItem>,
	index: HashMap<u64, usize>,
}

impl Catalog {
	fn from_items(items: Vec<Item>) -> Self {
		let mut catalog = Self {
			items: Vec::with_capacity(items.len()),
			index: HashMap::with_capacity(items.len()),
		};
		for item in items {
			if catalog.index.contains_key(&item.id) {
				tracing::warn!(id = item.id, "Duplicate item id in source, keeping first");
				continue;
			}
			catalog.push(item);
		}
		catalog
	}

	fn push(&mut self, item: Item) {
		self.index.insert(item.id, self.items.len());
		let magnitude = magnitude(&item.vector);
		self.items.push(StoredItem { item, magnitude });
	}

	fn get(&self, id: u64) -> Option<&Item> {
		self.index.get(&id).map(|&i| &self.items[i].item)
	}

	fn max_id(&self) -> Option<u64> {
		self.index.keys().copied().max()
	}
}

// ---------------------------------------------------------------------------
// Warm-up state
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum WarmState {
	Uninitialized,
	Loading,
	Ready,
	Failed(String),
}

/// Resets `Loading` to `Failed` if the loader unwinds, so waiters are
/// never parked forever.
struct LoadingGuard<'a> {
	store: &'a VectorStore,
	armed: bool,
}

impl Drop for LoadingGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			*self.store.state.lock() = WarmState::Failed("warm-up aborted".into());
			self.store.ready.notify_all();
		}
	}
}

// ---------------------------------------------------------------------------
// VectorStore
// ---------------------------------------------------------------------------

pub struct VectorStore {
	source: Box<dyn ItemSource>,
	seed: Option<Box<dyn ItemSource>>,
	mirror: Option<Box<dyn ItemSink>>,
	config: StoreConfig,
	state: Mutex<WarmState>,
	ready: Condvar,
	catalog: RwLock<Arc<Catalog>>,
}

impl VectorStore {
	// -- Lifecycle -----------------------------------------------------------

	/// Create a store over `source`. Nothing is loaded until `warm()`.
	pub fn new(source: impl ItemSource + 'static, config: StoreConfig) -> Self {
		Self {
			source: Box::new(source),
			seed: None,
			mirror: None,
			config,
			state: Mutex::new(WarmState::Uninitialized),
			ready: Condvar::new(),
			catalog: RwLock::new(Arc::new(Catalog::default())),
		}
	}

	/// Canonical corpus used once if the live source reports zero items.
	pub fn with_seed(mut self, seed: impl ItemSource + 'static) -> Self {
		self.seed = Some(Box::new(seed));
		self
	}

	/// Backing store that appended (and seeded) items are mirrored to.
	pub fn with_mirror(mut self, mirror: impl ItemSink + 'static) -> Self {
		self.mirror = Some(Box::new(mirror));
		self
	}

	pub fn is_warmed(&self) -> bool {
		matches!(*self.state.lock(), WarmState::Ready)
	}

	/// Load the catalog exactly once. Returns the number of cached items.
	///
	/// Callers arriving while a load is in flight wait for it and share its
	/// result. A caller arriving after a failed load starts a fresh attempt.
	pub fn warm(&self) -> Result<usize, VectorError> {
		let mut state = self.state.lock();
		let mut waited = false;
		loop {
			match &*state {
				WarmState::Ready => return Ok(self.len()),
				WarmState::Failed(msg) if waited => {
					return Err(VectorError::SourceUnavailable(msg.clone()));
				}
				WarmState::Loading => {}
				WarmState::Uninitialized | WarmState::Failed(_) => break,
			}
			waited = true;
			self.ready.wait(&mut state);
		}
		*state = WarmState::Loading;
		drop(state);

		let mut guard = LoadingGuard {
			store: self,
			armed: true,
		};
		let result = self.load();
		guard.armed = false;

		let mut state = self.state.lock();
		let outcome = match result {
			Ok(catalog) => {
				let count = catalog.items.len();
				*self.catalog.write() = Arc::new(catalog);
				*state = WarmState::Ready;
				tracing::info!(count, "Item store warmed");
				Ok(count)
			}
			Err(e) => {
				tracing::error!(error = %e, "Item store warm-up failed");
				*state = WarmState::Failed(e.to_string());
				Err(e)
			}
		};
		self.ready.notify_all();
		outcome
	}

	fn load(&self) -> Result<Catalog, VectorError> {
		let mut items = self.source.load_items()?;
		if items.is_empty() {
			if let Some(seed) = &self.seed {
				let corpus = seed.load_items()?;
				tracing::info!(count = corpus.len(), "Item source empty, seeding canonical corpus");
				if let Some(mirror) = &self.mirror {
					match mirror.upsert(&corpus) {
						Ok(()) => items = self.source.load_items()?,
						Err(e) => tracing::warn!(error = %e, "Seeding the backing store failed"),
					}
				}
				if items.is_empty() {
					items = corpus;
				}
			}
		}
		Ok(Catalog::from_items(items))
	}

	fn snapshot(&self) -> Arc<Catalog> {
		Arc::clone(&self.catalog.read())
	}

	// -- Reads ---------------------------------------------------------------

	pub fn len(&self) -> usize {
		self.catalog.read().items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Items for the requested ids, in request order. Unknown ids are
	/// omitted; history may reference retired items.
	pub fn get(&self, ids: &[u64]) -> Vec<Item> {
		let catalog = self.snapshot();
		let mut seen = HashSet::with_capacity(ids.len());
		ids.iter()
			.filter(|id| seen.insert(**id))
			.filter_map(|id| catalog.get(*id).cloned())
			.collect()
	}

	/// Id → vector for the requested ids that exist.
	pub fn vectors(&self, ids: &[u64]) -> HashMap<u64, TasteVector> {
		let catalog = self.snapshot();
		ids.iter()
			.filter_map(|id| catalog.get(*id).map(|item| (*id, item.vector)))
			.collect()
	}

	pub fn all(&self) -> Vec<ItemSummary> {
		self.snapshot()
			.items
			.iter()
			.map(|s| ItemSummary {
				id: s.item.id,
				name: s.item.name.clone(),
				description: s.item.description.clone(),
			})
			.collect()
	}

	// -- Writes --------------------------------------------------------------

	/// Validate and add a new item. The id is `max(existing) + 1`, or the
	/// configured base for an empty catalog. The in-memory catalog is
	/// authoritative: a failing mirror is logged, not returned.
	pub fn append(
		&self,
		name: String,
		description: String,
		vector: Vec<f64>,
	) -> Result<u64, VectorError> {
		let vector = TasteVector::try_from(vector)?;
		self.warm()?;

		let item = {
			let mut current = self.catalog.write();
			let id = current
				.max_id()
				.map_or(self.config.append_id_base, |max| max + 1);
			let item = Item {
				id,
				name,
				description,
				vector,
			};
			let mut next = Catalog::clone(&current);
			next.push(item.clone());
			*current = Arc::new(next);
			item
		};
		tracing::info!(id = item.id, name = %item.name, "Appended item");

		if let Some(mirror) = &self.mirror {
			if let Err(e) = mirror.upsert(std::slice::from_ref(&item)) {
				tracing::warn!(id = item.id, error = %e, "Mirroring appended item failed");
			}
		}
		Ok(item.id)
	}

	// -- Search --------------------------------------------------------------

	/// Cosine top-k over the catalog, skipping `exclude`. With a text query,
	/// items mentioning its words get a small boost.
	pub fn search(
		&self,
		query: &TasteVector,
		top_k: usize,
		exclude: &HashSet<u64>,
		text_query: Option<&str>,
	) -> Vec<SearchHit> {
		let catalog = self.snapshot();
		let keywords = text_query.and_then(KeywordBoost::new);
		let boost = |s: &StoredItem| {
			keywords
				.as_ref()
				.map_or(0.0, |k| k.score(&s.item.name, &s.item.description))
		};
		let boost_ref: Option<&dyn Fn(&StoredItem) -> f64> = match keywords {
			Some(_) => Some(&boost),
			None => None,
		};

		let candidates = catalog
			.items
			.iter()
			.filter(|s| !exclude.contains(&s.item.id));
		rank(candidates, query, top_k, boost_ref)
			.into_iter()
			.map(|r| SearchHit {
				id: r.entry.item.id,
				name: r.entry.item.name.clone(),
				description: r.entry.item.description.clone(),
				score: round4(r.score),
			})
			.collect()
	}

	/// Items least aligned with `pref`: the same ranking run against the
	/// componentwise-inverted vector, without keyword boost.
	pub fn search_worst(
		&self,
		pref: &TasteVector,
		top_k: usize,
		exclude: Option<&HashSet<u64>>,
	) -> Vec<SearchHit> {
		let empty = HashSet::new();
		self.search(&pref.inverted(), top_k, exclude.unwrap_or(&empty), None)
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
