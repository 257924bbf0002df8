// ---------------------------------------------------------------------------
// Social discovery — peers with similar taste, and what they keep choosing
// ---------------------------------------------------------------------------
//
// Every peer history goes through the same preference computation as the
// caller's, then peers are ranked by cosine against the caller's vector.
// The top peers' catalog items that the caller has not tried are counted
// and returned most-common-first.
// ---------------------------------------------------------------------------

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::cosine::{cosine_with_magnitude, magnitude};
use crate::error::VectorError;
use crate::preference::{compute_preference, ResolvedVectors, VectorResolver};
use crate::recommendation::Recommender;
use crate::store::VectorStore;
use crate::types::{round4, RatedEvent, TasteVector};

pub const DEFAULT_SOCIAL_TOP_K: usize = 5;
/// Entries needed before a history says anything about taste.
const MIN_HISTORY: usize = 2;
/// Caller entries without a rating count as neutral.
const NEUTRAL_RATING: f64 = 3.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
	pub id: String,
	/// Most-recent-first, like every other history.
	pub history: Vec<RatedEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarPeer {
	pub peer_id: String,
	pub match_score: f64,
	pub total_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularItem {
	pub id: u64,
	pub name: String,
	pub count: usize,
	/// Share of all counted choices, rounded to a whole percent.
	pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialMatch {
	pub similar_peers: Vec<SimilarPeer>,
	pub they_love: Vec<PopularItem>,
	pub needs_more_history: bool,
}

impl SocialMatch {
	fn needs_more_history() -> Self {
		Self {
			similar_peers: Vec::new(),
			they_love: Vec::new(),
			needs_more_history: true,
		}
	}
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Preference vector for a peer, built only from entries that carry a
/// positive rating and resolve. `None` when fewer than two remain.
pub fn peer_preference(
	history: &[RatedEvent],
	resolver: &impl VectorResolver,
) -> Option<TasteVector> {
	let usable: Vec<RatedEvent> = history
		.iter()
		.filter(|e| e.rating.is_some_and(|r| r > 0.0) && resolver.resolve(&e.item).is_some())
		.cloned()
		.collect();
	if usable.len() < MIN_HISTORY {
		return None;
	}
	Some(compute_preference(&usable, resolver))
}

/// Peers ranked by cosine between their preference and `query`, highest
/// first. Peers without a usable preference or with a zero vector are
/// skipped. Scores are unrounded.
pub fn rank_peers<'a>(
	query: &TasteVector,
	peers: &'a [Peer],
	resolver: &impl VectorResolver,
	top_k: usize,
) -> Vec<(&'a Peer, f64)> {
	let query_mag = magnitude(query);
	let mut scored: Vec<(&Peer, f64)> = peers
		.iter()
		.filter_map(|peer| {
			let pref = peer_preference(&peer.history, resolver)?;
			let score = cosine_with_magnitude(query, &pref, query_mag, magnitude(&pref))?;
			Some((peer, score))
		})
		.collect();
	scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
	scored.truncate(top_k);
	scored
}

/// Catalog items across `peers`' histories, most common first. Items in
/// `exclude` or missing from the store are not counted; ties keep the
/// order in which items were first seen.
pub fn popular_items(
	peers: &[&Peer],
	exclude: &HashSet<u64>,
	store: &VectorStore,
	top_k: usize,
) -> Vec<PopularItem> {
	let mut order: Vec<u64> = Vec::new();
	let mut counts: HashMap<u64, usize> = HashMap::new();
	for peer in peers {
		for id in peer.history.iter().filter_map(|e| e.item.catalog_id()) {
			if exclude.contains(&id) {
				continue;
			}
			let count = counts.entry(id).or_insert(0);
			if *count == 0 {
				order.push(id);
			}
			*count += 1;
		}
	}

	let names: HashMap<u64, String> = store
		.get(&order)
		.into_iter()
		.map(|item| (item.id, item.name))
		.collect();
	let mut tallied: Vec<(u64, usize)> = order
		.into_iter()
		.filter(|id| names.contains_key(id))
		.map(|id| (id, counts[&id]))
		.collect();
	let total = tallied.iter().map(|(_, c)| c).sum::<usize>().max(1);

	tallied.sort_by(|a, b| b.1.cmp(&a.1));
	tallied
		.into_iter()
		.take(top_k)
		.map(|(id, count)| PopularItem {
			id,
			name: names.get(&id).cloned().unwrap_or_default(),
			count,
			percentage: (count as f64 / total as f64 * 100.0).round() as u32,
		})
		.collect()
}

/// Find the peers closest to the caller's taste and the items they favour
/// that the caller has not tried yet.
pub fn find_similar(
	rec: &Recommender,
	history: &[RatedEvent],
	peers: &[Peer],
	top_k: usize,
) -> Result<SocialMatch, VectorError> {
	if history.len() < MIN_HISTORY {
		return Ok(SocialMatch::needs_more_history());
	}
	rec.store().warm()?;

	let refs = history
		.iter()
		.chain(peers.iter().flat_map(|p| p.history.iter()))
		.map(|e| &e.item);
	let resolved = ResolvedVectors::collect(rec.store(), rec.registry(), refs);

	let weighted: Vec<RatedEvent> = history
		.iter()
		.map(|e| RatedEvent {
			item: e.item.clone(),
			rating: Some(e.rating.filter(|r| *r > 0.0).unwrap_or(NEUTRAL_RATING)),
		})
		.collect();
	let caller = compute_preference(&weighted, &resolved);

	let ranked = rank_peers(&caller, peers, &resolved, top_k);
	let done: HashSet<u64> = history.iter().filter_map(|e| e.item.catalog_id()).collect();
	let top: Vec<&Peer> = ranked.iter().map(|(peer, _)| *peer).collect();
	let they_love = popular_items(&top, &done, rec.store(), top_k);

	tracing::debug!(
		peers = peers.len(),
		matched = ranked.len(),
		items = they_love.len(),
		"Computed similar peers"
	);
	Ok(SocialMatch {
		similar_peers: ranked
			.into_iter()
			.map(|(peer, score)| SimilarPeer {
				peer_id: peer.id.clone(),
				match_score: round4(score),
				total_entries: peer.history.len(),
			})
			.collect(),
		they_love,
		needs_more_history: false,
	})
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::recommendation::RecommendConfig;
	use crate::registry::CustomVectorRegistry;
	use crate::source::MemorySource;
	use crate::store::StoreConfig;
	use crate::types::{Item, ItemRef};

	fn axis(i: usize) -> Vec<f64> {
		let mut v = vec![0.0; 9];
		v[i] = 1.0;
		v
	}

	fn recommender() -> Recommender {
		let mut items: Vec<Item> = (0..9)
			.map(|i| Item {
				id: i as u64 + 1,
				name: format!("Axis {}", i),
				description: String::new(),
				vector: TasteVector::try_from(axis(i)).unwrap(),
			})
			.collect();
		let mut near_cost = axis(0);
		near_cost[1] = 0.1;
		items.push(Item {
			id: 10,
			name: "Mostly cost".to_string(),
			description: String::new(),
			vector: TasteVector::try_from(near_cost).unwrap(),
		});
		let store = VectorStore::new(MemorySource::new(items), StoreConfig::default());
		Recommender::new(
			Arc::new(store),
			Arc::new(CustomVectorRegistry::default()),
			RecommendConfig::default(),
		)
	}

	fn rated(id: u64, rating: f64) -> RatedEvent {
		RatedEvent::rated(ItemRef::Catalog(id), rating).unwrap()
	}

	fn unrated(id: u64) -> RatedEvent {
		RatedEvent::new(ItemRef::Catalog(id), None).unwrap()
	}

	fn peer(id: &str, history: Vec<RatedEvent>) -> Peer {
		Peer {
			id: id.to_string(),
			history,
		}
	}

	fn vectors(ids: &[u64]) -> HashMap<ItemRef, TasteVector> {
		ids.iter()
			.map(|id| {
				(
					ItemRef::Catalog(*id),
					TasteVector::try_from(axis(*id as usize - 1)).unwrap(),
				)
			})
			.collect()
	}

	#[test]
	fn peer_preference_needs_two_usable_ratings() {
		let resolver = vectors(&[1, 2]);
		assert!(peer_preference(&[rated(1, 5.0), unrated(2)], &resolver).is_none());
		assert!(peer_preference(&[rated(1, 5.0), rated(2, 0.0)], &resolver).is_none());
		assert!(peer_preference(&[rated(1, 5.0), rated(99, 5.0)], &resolver).is_none());
		assert!(peer_preference(&[rated(1, 5.0), rated(2, 4.0)], &resolver).is_some());
	}

	#[test]
	fn peers_rank_by_similarity_and_thin_histories_are_skipped() {
		let resolver = vectors(&[1, 2, 5, 6]);
		let peers = vec![
			peer("far", vec![rated(5, 5.0), rated(6, 5.0)]),
			peer("thin", vec![rated(1, 5.0)]),
			peer("near", vec![rated(1, 5.0), rated(2, 4.0)]),
		];
		let query = TasteVector::try_from(axis(0)).unwrap();
		let ranked = rank_peers(&query, &peers, &resolver, 5);
		let ids: Vec<&str> = ranked.iter().map(|(p, _)| p.id.as_str()).collect();
		assert_eq!(ids, vec!["near", "far"]);
		assert!(ranked[0].1 > 0.5);
		assert_eq!(ranked[1].1, 0.0);

		assert_eq!(rank_peers(&query, &peers, &resolver, 1).len(), 1);
	}

	#[test]
	fn popular_items_count_untried_catalog_items() {
		let rec = recommender();
		rec.store().warm().unwrap();
		let a = peer("a", vec![rated(1, 5.0), rated(10, 5.0), rated(3, 4.0)]);
		let b = peer("b", vec![rated(10, 4.0), rated(99, 5.0), unrated(4)]);
		let exclude: HashSet<u64> = [1, 2].into_iter().collect();

		let items = popular_items(&[&a, &b], &exclude, rec.store(), 5);
		let got: Vec<(u64, usize, u32)> = items
			.iter()
			.map(|i| (i.id, i.count, i.percentage))
			.collect();
		assert_eq!(got, vec![(10, 2, 50), (3, 1, 25), (4, 1, 25)]);
		assert_eq!(items[0].name, "Mostly cost");

		assert_eq!(popular_items(&[&a, &b], &exclude, rec.store(), 1).len(), 1);
	}

	#[test]
	fn short_caller_history_needs_more() {
		let rec = recommender();
		let peers = vec![peer("a", vec![rated(1, 5.0), rated(2, 5.0)])];
		let out = find_similar(&rec, &[rated(1, 5.0)], &peers, 5).unwrap();
		assert!(out.needs_more_history);
		assert!(out.similar_peers.is_empty());
		assert!(out.they_love.is_empty());
	}

	#[test]
	fn find_similar_matches_peers_and_suggests_their_items() {
		let rec = recommender();
		// unrated caller entries still count, at a neutral weight
		let history = vec![rated(1, 5.0), unrated(2)];
		let peers = vec![
			peer("cost-lover", vec![rated(10, 5.0), rated(1, 5.0), rated(7, 3.0)]),
			peer("hiker", vec![rated(5, 5.0), rated(6, 4.0)]),
			peer("newcomer", vec![rated(10, 5.0)]),
		];
		let out = find_similar(&rec, &history, &peers, 5).unwrap();
		assert!(!out.needs_more_history);

		let ids: Vec<&str> = out.similar_peers.iter().map(|p| p.peer_id.as_str()).collect();
		assert_eq!(ids, vec!["cost-lover", "hiker"]);
		assert_eq!(out.similar_peers[0].total_entries, 3);
		let score = out.similar_peers[0].match_score;
		assert_eq!(score, round4(score));

		let loved: Vec<u64> = out.they_love.iter().map(|i| i.id).collect();
		assert!(!loved.contains(&1));
		assert!(loved.contains(&10));
	}
}
