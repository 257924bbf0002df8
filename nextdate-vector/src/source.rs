//! Collaborator seams for the item store: where items are bulk-loaded from
//! and where appended items are mirrored to.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::VectorError;
use crate::types::Item;

/// Bulk item loader, invoked once per warm-up (and again after seeding).
/// Retry, backoff and timeouts are the implementation's business.
pub trait ItemSource: Send + Sync {
	fn load_items(&self) -> Result<Vec<Item>, VectorError>;
}

/// Durable mirror for items written at runtime.
pub trait ItemSink: Send + Sync {
	fn upsert(&self, items: &[Item]) -> Result<(), VectorError>;
}

impl<T: ItemSource + ?Sized> ItemSource for Arc<T> {
	fn load_items(&self) -> Result<Vec<Item>, VectorError> {
		(**self).load_items()
	}
}

impl<T: ItemSink + ?Sized> ItemSink for Arc<T> {
	fn upsert(&self, items: &[Item]) -> Result<(), VectorError> {
		(**self).upsert(items)
	}
}

/// In-process source and sink. Useful for embedding the engine without a
/// catalog file and for tests.
#[derive(Debug, Default)]
pub struct MemorySource {
	items: Mutex<Vec<Item>>,
}

impl MemorySource {
	pub fn new(items: Vec<Item>) -> Self {
		Self {
			items: Mutex::new(items),
		}
	}

	pub fn len(&self) -> usize {
		self.items.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.lock().is_empty()
	}
}

impl ItemSource for MemorySource {
	fn load_items(&self) -> Result<Vec<Item>, VectorError> {
		Ok(self.items.lock().clone())
	}
}

impl ItemSink for MemorySource {
	fn upsert(&self, items: &[Item]) -> Result<(), VectorError> {
		let mut stored = self.items.lock();
		for item in items {
			match stored.iter_mut().find(|i| i.id == item.id) {
				Some(existing) => *existing = item.clone(),
				None => stored.push(item.clone()),
			}
		}
		Ok(())
	}
}
