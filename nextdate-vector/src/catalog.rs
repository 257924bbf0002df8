// ---------------------------------------------------------------------------
// VenueCatalog — categorical filter, then optional vector ranking
// ---------------------------------------------------------------------------
//
// A second catalog whose entries carry attributes besides the vector and
// are partitioned by locality. Filters run in a fixed order:
//
//   partition (case-insensitive) → price tier → indoor → tag intersection
//
// Without a query vector the filtered entries come back in stored order
// with no score; with one, they go through the shared cosine ranking.
// ---------------------------------------------------------------------------

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VectorError;
use crate::persistence::read_records;
use crate::ranking::{rank, Rankable};
use crate::types::{round4, TasteVector};

fn default_price_tier() -> u8 {
	1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
	pub id: u64,
	#[serde(alias = "city")]
	pub partition: String,
	#[serde(default, alias = "state")]
	pub region: String,
	pub name: String,
	#[serde(default)]
	pub venue: String,
	#[serde(default)]
	pub address: String,
	#[serde(default)]
	pub description: String,
	#[serde(default = "default_price_tier", alias = "price_tier")]
	pub price_tier: u8,
	#[serde(default)]
	pub indoor: bool,
	#[serde(default, alias = "vibe")]
	pub tags: Vec<String>,
	pub vector: TasteVector,
}

impl Rankable for Venue {
	fn vector(&self) -> &TasteVector {
		&self.vector
	}
}

/// Optional categorical filters; `None` means "don't filter on this".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilters {
	pub price_tier: Option<u8>,
	pub indoor: Option<bool>,
	pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueHit {
	pub id: u64,
	pub partition: String,
	pub region: String,
	pub name: String,
	pub venue: String,
	pub address: String,
	pub description: String,
	pub price_tier: u8,
	pub indoor: bool,
	pub tags: Vec<String>,
	/// `None` when the results were not ranked.
	pub score: Option<f64>,
}

impl VenueHit {
	fn new(venue: &Venue, score: Option<f64>) -> Self {
		Self {
			id: venue.id,
			partition: venue.partition.clone(),
			region: venue.region.clone(),
			name: venue.name.clone(),
			venue: venue.venue.clone(),
			address: venue.address.clone(),
			description: venue.description.clone(),
			price_tier: venue.price_tier,
			indoor: venue.indoor,
			tags: venue.tags.clone(),
			score,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSummary {
	pub partition: String,
	pub region: String,
	pub count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct VenueCatalog {
	venues: Vec<Venue>,
}

impl VenueCatalog {
	pub fn new(venues: Vec<Venue>) -> Self {
		Self { venues }
	}

	/// Load from a JSON (or gzip JSON) array. Invalid records are logged
	/// and skipped; a missing file yields an empty catalog.
	pub fn load_json(path: &Path) -> Result<Self, VectorError> {
		let Some(records) = read_records::<serde_json::Value>(path)? else {
			tracing::warn!(path = %path.display(), "Venue catalog file not found");
			return Ok(Self::default());
		};
		let mut venues = Vec::with_capacity(records.len());
		for record in records {
			match serde_json::from_value::<Venue>(record) {
				Ok(v) => venues.push(v),
				Err(e) => tracing::warn!(error = %e, "Skipping invalid venue record"),
			}
		}
		tracing::info!(count = venues.len(), "Venue catalog loaded");
		Ok(Self { venues })
	}

	pub fn len(&self) -> usize {
		self.venues.len()
	}

	pub fn is_empty(&self) -> bool {
		self.venues.is_empty()
	}

	pub fn search(
		&self,
		partition: &str,
		filters: &CatalogFilters,
		query: Option<&TasteVector>,
		top_k: usize,
	) -> Vec<VenueHit> {
		let partition = partition.to_lowercase();
		let wanted_tags: Option<HashSet<String>> = filters
			.tags
			.as_ref()
			.filter(|t| !t.is_empty())
			.map(|t| t.iter().map(|s| s.to_lowercase()).collect());

		let candidates = self.venues.iter().filter(|v| {
			v.partition.to_lowercase() == partition
				&& filters.price_tier.is_none_or(|p| v.price_tier == p)
				&& filters.indoor.is_none_or(|i| v.indoor == i)
				&& wanted_tags.as_ref().is_none_or(|wanted| {
					v.tags.iter().any(|t| wanted.contains(&t.to_lowercase()))
				})
		});

		match query {
			None => candidates
				.take(top_k)
				.map(|v| VenueHit::new(v, None))
				.collect(),
			Some(q) => rank(candidates, q, top_k, None)
				.into_iter()
				.map(|r| VenueHit::new(r.entry, Some(round4(r.score))))
				.collect(),
		}
	}

	/// Distinct partitions with their region and entry count, sorted by name.
	pub fn partitions(&self) -> Vec<PartitionSummary> {
		let mut grouped: BTreeMap<&str, (&str, usize)> = BTreeMap::new();
		for v in &self.venues {
			if v.partition.is_empty() {
				continue;
			}
			let slot = grouped
				.entry(v.partition.as_str())
				.or_insert((v.region.as_str(), 0));
			slot.0 = v.region.as_str();
			slot.1 += 1;
		}
		grouped
			.into_iter()
			.map(|(partition, (region, count))| PartitionSummary {
				partition: partition.to_string(),
				region: region.to_string(),
				count,
			})
			.collect()
	}
}
