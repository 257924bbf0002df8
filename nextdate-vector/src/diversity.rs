//! Nudges a preference vector away from what the user did most recently,
//! so recommendations do not keep circling the same few items.

use crate::preference::VectorResolver;
use crate::types::{ItemRef, TasteVector, DIMENSIONS};

pub const DEFAULT_DIVERSITY_STRENGTH: f64 = 0.15;
/// How many resolvable recent items form the centroid.
const RECENT_WINDOW: usize = 5;

/// `clamp(pref + (pref - centroid) * strength)`, where the centroid is the
/// mean of the first five recent refs (most-recent-first) that resolve.
/// Returns `pref` unchanged when none resolve.
pub fn apply_diversity(
	pref: &TasteVector,
	recent: &[ItemRef],
	resolver: &impl VectorResolver,
	strength: f64,
) -> TasteVector {
	let resolved: Vec<TasteVector> = recent
		.iter()
		.filter_map(|r| resolver.resolve(r))
		.take(RECENT_WINDOW)
		.collect();
	if resolved.is_empty() {
		return *pref;
	}

	let mut centroid = [0.0f64; DIMENSIONS];
	for v in &resolved {
		for (c, x) in centroid.iter_mut().zip(v.components()) {
			*c += x;
		}
	}
	let n = resolved.len() as f64;

	let mut out = [0.0f64; DIMENSIONS];
	for (i, o) in out.iter_mut().enumerate() {
		let p = pref.components()[i];
		*o = p + (p - centroid[i] / n) * strength;
	}
	TasteVector::from_computed(out)
}
