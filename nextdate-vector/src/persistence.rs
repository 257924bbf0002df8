// ---------------------------------------------------------------------------
// JSON catalog files + Gzip compression
// ---------------------------------------------------------------------------
//
// Catalog files are JSON arrays of records. A file may be gzip-compressed;
// this is detected from the magic bytes on read and preserved on write.
//
// Item record shape:
//   { "id": 12, "name": "...", "description": "...", "vector": [9 floats] }
//
// Records whose vector is not a valid 9-component [0, 1] vector are
// rejected individually (logged and skipped); the rest of the file loads.
// ---------------------------------------------------------------------------

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::VectorError;
use crate::source::{ItemSink, ItemSource};
use crate::types::{Item, TasteVector};

// ---------------------------------------------------------------------------
// Gzip compress / decompress
// ---------------------------------------------------------------------------

/// Gzip-compress a byte slice (level 6).
pub fn compress(data: &[u8]) -> Result<Vec<u8>, VectorError> {
	let mut encoder = GzEncoder::new(data, Compression::new(6));
	let mut compressed = Vec::new();
	encoder.read_to_end(&mut compressed)?;
	Ok(compressed)
}

/// Gunzip-decompress a byte slice.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, VectorError> {
	let mut decoder = GzDecoder::new(data);
	let mut decompressed = Vec::new();
	decoder.read_to_end(&mut decompressed)?;
	Ok(decompressed)
}

/// Check if data starts with gzip magic bytes (0x1f, 0x8b).
pub fn is_gzipped(data: &[u8]) -> bool {
	data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

// ---------------------------------------------------------------------------
// Raw record reading
// ---------------------------------------------------------------------------

/// Read a JSON array file (plain or gzip) into loosely-typed records.
/// Returns `Ok(None)` when the file does not exist.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>, VectorError> {
	let raw = match std::fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(e.into()),
	};
	let bytes = if is_gzipped(&raw) {
		decompress(&raw)?
	} else {
		raw
	};
	let records = serde_json::from_slice(&bytes).map_err(|e| {
		VectorError::Serialization(format!("{}: {}", path.display(), e))
	})?;
	Ok(Some(records))
}

/// On-disk item shape. The vector stays unvalidated until `into_item`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemRecord {
	id: u64,
	name: String,
	#[serde(default)]
	description: String,
	vector: Vec<f64>,
}

impl ItemRecord {
	fn into_item(self) -> Result<Item, VectorError> {
		let vector = TasteVector::try_from(self.vector)?;
		Ok(Item {
			id: self.id,
			name: self.name,
			description: self.description,
			vector,
		})
	}
}

impl From<&Item> for ItemRecord {
	fn from(item: &Item) -> Self {
		Self {
			id: item.id,
			name: item.name.clone(),
			description: item.description.clone(),
			vector: item.vector.into(),
		}
	}
}

// ---------------------------------------------------------------------------
// JsonFileCatalog
// ---------------------------------------------------------------------------

/// A JSON catalog file acting as both the bulk item source and the
/// append mirror.
///
/// `upsert` is a read-modify-write of the whole file; `write_lock` is held
/// across it so concurrent mirrors through the same handle never drop each
/// other's records.
#[derive(Debug)]
pub struct JsonFileCatalog {
	path: PathBuf,
	write_lock: Mutex<()>,
}

impl JsonFileCatalog {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			write_lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn write_records(&self, records: &[ItemRecord], gzip: bool) -> Result<(), VectorError> {
		let json = serde_json::to_vec_pretty(records)
			.map_err(|e| VectorError::Serialization(e.to_string()))?;
		let bytes = if gzip { compress(&json)? } else { json };
		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				std::fs::create_dir_all(parent)?;
			}
		}
		// Write beside the target and rename so readers never see a torn file.
		let tmp = self
			.path
			.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
		std::fs::write(&tmp, bytes)?;
		std::fs::rename(&tmp, &self.path)?;
		Ok(())
	}

	fn existing_is_gzipped(&self) -> bool {
		let mut head = [0u8; 2];
		match std::fs::File::open(&self.path) {
			Ok(mut f) => f.read_exact(&mut head).is_ok() && is_gzipped(&head),
			Err(_) => self
				.path
				.extension()
				.is_some_and(|ext| ext.eq_ignore_ascii_case("gz")),
		}
	}
}

impl ItemSource for JsonFileCatalog {
	fn load_items(&self) -> Result<Vec<Item>, VectorError> {
		let records: Vec<ItemRecord> = match read_records(&self.path) {
			Ok(Some(records)) => records,
			Ok(None) => {
				tracing::debug!(path = %self.path.display(), "Catalog file missing, treating as empty");
				return Ok(Vec::new());
			}
			Err(VectorError::Io(e)) => {
				return Err(VectorError::SourceUnavailable(format!(
					"{}: {}",
					self.path.display(),
					e
				)))
			}
			Err(e) => return Err(e),
		};

		let mut seen = HashSet::with_capacity(records.len());
		let mut items = Vec::with_capacity(records.len());
		for record in records {
			let id = record.id;
			if !seen.insert(id) {
				tracing::warn!(id, "Skipping duplicate catalog id");
				continue;
			}
			match record.into_item() {
				Ok(item) => items.push(item),
				Err(e) => tracing::warn!(id, error = %e, "Skipping invalid catalog record"),
			}
		}
		Ok(items)
	}
}

impl ItemSink for JsonFileCatalog {
	fn upsert(&self, items: &[Item]) -> Result<(), VectorError> {
		let _guard = self.write_lock.lock();
		let gzip = self.existing_is_gzipped();
		let mut records: Vec<ItemRecord> = read_records(&self.path)?.unwrap_or_default();
		for item in items {
			match records.iter_mut().find(|r| r.id == item.id) {
				Some(existing) => *existing = ItemRecord::from(item),
				None => records.push(ItemRecord::from(item)),
			}
		}
		self.write_records(&records, gzip)
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	fn item(id: u64, name: &str, first: f64) -> Item {
		let mut v = vec![0.5; 9];
		v[0] = first;
		Item {
			id,
			name: name.to_string(),
			description: format!("{} description", name),
			vector: TasteVector::try_from(v).unwrap(),
		}
	}

	#[test]
	fn compress_decompress_roundtrip() {
		let data = b"hello world, this is a test of gzip compression";
		let compressed = compress(data).unwrap();
		assert!(is_gzipped(&compressed));
		assert_eq!(decompress(&compressed).unwrap(), data);
	}

	#[test]
	fn is_gzipped_checks_magic_bytes() {
		assert!(is_gzipped(&[0x1f, 0x8b, 0x08]));
		assert!(!is_gzipped(&[0x1f]));
		assert!(!is_gzipped(b"[]"));
	}

	#[test]
	fn missing_file_loads_empty() {
		let dir = tempfile::tempdir().unwrap();
		let catalog = JsonFileCatalog::new(dir.path().join("nope.json"));
		assert!(catalog.load_items().unwrap().is_empty());
	}

	#[test]
	fn loads_plain_json_and_skips_invalid_records() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("items.json");
		std::fs::write(
			&path,
			r#"[
				{"id": 1, "name": "Picnic", "description": "park", "vector": [0.1,0.9,0.3,0.1,0.4,0.5,0.3,0.6,0.6]},
				{"id": 2, "name": "Broken", "vector": [0.1, 0.2]},
				{"id": 3, "name": "Too Big", "vector": [1.5,0.9,0.3,0.1,0.4,0.5,0.3,0.6,0.6]},
				{"id": 1, "name": "Dupe", "vector": [0.1,0.9,0.3,0.1,0.4,0.5,0.3,0.6,0.6]},
				{"id": 4, "name": "No Description", "vector": [0.5,0.5,0.5,0.5,0.5,0.5,0.5,0.5,0.5]}
			]"#,
		)
		.unwrap();

		let items = JsonFileCatalog::new(&path).load_items().unwrap();
		let ids: Vec<u64> = items.iter().map(|i| i.id).collect();
		assert_eq!(ids, vec![1, 4]);
		assert_eq!(items[0].name, "Picnic");
		assert_eq!(items[1].description, "");
	}

	#[test]
	fn malformed_json_is_a_serialization_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("items.json");
		std::fs::write(&path, "{not json").unwrap();
		let err = JsonFileCatalog::new(&path).load_items().unwrap_err();
		assert!(matches!(err, VectorError::Serialization(_)));
	}

	#[test]
	fn upsert_appends_and_replaces() {
		let dir = tempfile::tempdir().unwrap();
		let catalog = JsonFileCatalog::new(dir.path().join("items.json"));
		catalog.upsert(&[item(1, "one", 0.1), item(2, "two", 0.2)]).unwrap();
		catalog.upsert(&[item(2, "two v2", 0.3), item(3, "three", 0.4)]).unwrap();

		let items = catalog.load_items().unwrap();
		let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
		assert_eq!(names, vec!["one", "two v2", "three"]);
		assert_eq!(items[1].vector.components()[0], 0.3);
	}

	#[test]
	fn gzip_files_stay_gzip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("items.json.gz");
		let json = serde_json::to_vec(&vec![ItemRecord::from(&item(7, "seven", 0.7))]).unwrap();
		std::fs::write(&path, compress(&json).unwrap()).unwrap();

		let catalog = JsonFileCatalog::new(&path);
		assert_eq!(catalog.load_items().unwrap().len(), 1);

		catalog.upsert(&[item(8, "eight", 0.8)]).unwrap();
		let raw = std::fs::read(&path).unwrap();
		assert!(is_gzipped(&raw));
		assert_eq!(catalog.load_items().unwrap().len(), 2);
	}

	#[test]
	fn concurrent_appends_all_reach_the_file() {
		use crate::store::{StoreConfig, VectorStore};
		use std::sync::Arc;

		let dir = tempfile::tempdir().unwrap();
		let file = Arc::new(JsonFileCatalog::new(dir.path().join("items.json")));
		let store = VectorStore::new(Arc::clone(&file), StoreConfig::default())
			.with_mirror(Arc::clone(&file));
		store.warm().unwrap();

		std::thread::scope(|scope| {
			for i in 0..16 {
				let store = &store;
				scope.spawn(move || {
					store
						.append(format!("item {}", i), String::new(), vec![0.5; 9])
						.unwrap();
				});
			}
		});

		let on_disk = file.load_items().unwrap();
		assert_eq!(store.len(), 16);
		assert_eq!(on_disk.len(), 16);
		let ids: HashSet<u64> = on_disk.iter().map(|i| i.id).collect();
		assert_eq!(ids, (200..216).collect::<HashSet<u64>>());

		let leftovers = std::fs::read_dir(dir.path())
			.unwrap()
			.filter(|e| {
				e.as_ref()
					.is_ok_and(|e| e.path().extension().is_some_and(|x| x == "tmp"))
			})
			.count();
		assert_eq!(leftovers, 0);
	}
}
