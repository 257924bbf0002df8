// ---------------------------------------------------------------------------
// CustomVectorRegistry — vectors for user-authored entries
// ---------------------------------------------------------------------------
//
// Entries that never made it into the canonical catalog are keyed by their
// history record id. Unbounded by default; with a capacity, the least
// recently used record is evicted on overflow.
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::VectorError;
use crate::types::TasteVector;

struct Entry {
	vector: TasteVector,
	last_used: u64,
}

#[derive(Default)]
struct Inner {
	entries: HashMap<String, Entry>,
	clock: u64,
}

impl Inner {
	fn tick(&mut self) -> u64 {
		self.clock += 1;
		self.clock
	}
}

#[derive(Default)]
pub struct CustomVectorRegistry {
	capacity: Option<usize>,
	inner: Mutex<Inner>,
}

impl CustomVectorRegistry {
	pub fn new(capacity: Option<usize>) -> Self {
		Self {
			capacity: capacity.filter(|c| *c > 0),
			inner: Mutex::new(Inner::default()),
		}
	}

	pub fn len(&self) -> usize {
		self.inner.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Store the vector for `record_id`. A record's vector is written once:
	/// returns `Ok(false)` and keeps the existing vector if the id is
	/// already present.
	pub fn put(&self, record_id: &str, vector: Vec<f64>) -> Result<bool, VectorError> {
		let vector = TasteVector::try_from(vector)?;
		let mut inner = self.inner.lock();
		if inner.entries.contains_key(record_id) {
			return Ok(false);
		}
		let now = inner.tick();
		inner.entries.insert(
			record_id.to_string(),
			Entry {
				vector,
				last_used: now,
			},
		);

		if let Some(capacity) = self.capacity {
			while inner.entries.len() > capacity {
				let oldest = inner
					.entries
					.iter()
					.min_by_key(|(_, e)| e.last_used)
					.map(|(id, _)| id.clone());
				match oldest {
					Some(id) => {
						inner.entries.remove(&id);
						tracing::debug!(record_id = %id, "Evicted custom vector");
					}
					None => break,
				}
			}
		}
		Ok(true)
	}

	/// Vectors for the requested record ids that are present. Missing ids
	/// are omitted, not errors.
	pub fn get(&self, record_ids: &[String]) -> HashMap<String, TasteVector> {
		let mut inner = self.inner.lock();
		let now = inner.tick();
		let mut out = HashMap::with_capacity(record_ids.len());
		for id in record_ids {
			if let Some(entry) = inner.entries.get_mut(id) {
				entry.last_used = now;
				out.insert(id.clone(), entry.vector);
			}
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ids(values: &[&str]) -> Vec<String> {
		values.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn put_then_get() {
		let registry = CustomVectorRegistry::default();
		assert!(registry.put("rec-1", vec![0.2; 9]).unwrap());
		let got = registry.get(&ids(&["rec-1", "missing"]));
		assert_eq!(got.len(), 1);
		assert_eq!(got["rec-1"].components()[0], 0.2);
	}

	#[test]
	fn put_is_write_once() {
		let registry = CustomVectorRegistry::default();
		registry.put("rec-1", vec![0.2; 9]).unwrap();
		assert!(!registry.put("rec-1", vec![0.9; 9]).unwrap());
		assert_eq!(registry.get(&ids(&["rec-1"]))["rec-1"].components()[0], 0.2);
	}

	#[test]
	fn put_rejects_invalid_vectors() {
		let registry = CustomVectorRegistry::default();
		let err = registry.put("rec-1", vec![0.2; 10]).unwrap_err();
		assert!(matches!(err, VectorError::DimensionMismatch(_)));
		assert!(registry.is_empty());
	}

	#[test]
	fn unbounded_by_default() {
		let registry = CustomVectorRegistry::new(None);
		for i in 0..500 {
			registry.put(&format!("rec-{}", i), vec![0.5; 9]).unwrap();
		}
		assert_eq!(registry.len(), 500);
	}

	#[test]
	fn capacity_evicts_least_recently_used() {
		let registry = CustomVectorRegistry::new(Some(2));
		registry.put("a", vec![0.1; 9]).unwrap();
		registry.put("b", vec![0.2; 9]).unwrap();
		// touch "a" so "b" becomes the eviction candidate
		registry.get(&ids(&["a"]));
		registry.put("c", vec![0.3; 9]).unwrap();

		assert_eq!(registry.len(), 2);
		let got = registry.get(&ids(&["a", "b", "c"]));
		assert!(got.contains_key("a"));
		assert!(!got.contains_key("b"));
		assert!(got.contains_key("c"));
	}
}
