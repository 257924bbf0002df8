// ---------------------------------------------------------------------------
// History insights — aggregate statistics over a rated history
// ---------------------------------------------------------------------------
//
// Read-only: nothing here feeds back into ranking. History is ordered
// most-recent-first, like everywhere else.
// ---------------------------------------------------------------------------

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::preference::{VectorResolver, SUCCESS_THRESHOLD};
use crate::types::{Dimension, RatedEvent, DIMENSIONS};

const MAX_RATING: f64 = 5.0;
const UNRATED_WEIGHT: f64 = 0.5;
const RECENT_RATINGS: usize = 5;
/// Ratings per trend window; two windows are compared.
const TREND_WINDOW: usize = 3;
const TREND_THRESHOLD: f64 = 0.3;
const STRONG_LOW: f64 = 0.3;
const STRONG_HIGH: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
	Improving,
	Declining,
	Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
	pub total_entries: usize,
	pub avg_last_five: f64,
	pub success_rate: f64,
	pub dimension_averages: DimensionAverages,
	pub trend: Trend,
	pub summary: String,
}

/// Per-axis averages. Serializes as an object keyed by axis label, in
/// schema order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionAverages([f64; DIMENSIONS]);

impl DimensionAverages {
	pub fn get(&self, dim: Dimension) -> f64 {
		self.0[dim.index()]
	}

	pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
		Dimension::ALL.iter().map(|d| (*d, self.0[d.index()]))
	}
}

impl Serialize for DimensionAverages {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(DIMENSIONS))?;
		for (dim, value) in self.iter() {
			map.serialize_entry(dim.label(), &value)?;
		}
		map.end()
	}
}

fn round_to(v: f64, places: i32) -> f64 {
	let factor = 10f64.powi(places);
	(v * factor).round() / factor
}

pub fn compute_insights(history: &[RatedEvent], resolver: &impl VectorResolver) -> Insights {
	let ratings: Vec<f64> = history
		.iter()
		.filter_map(|e| e.rating)
		.filter(|r| *r > 0.0)
		.collect();

	let recent = &ratings[..ratings.len().min(RECENT_RATINGS)];
	let avg_last_five = if recent.is_empty() {
		0.0
	} else {
		round_to(recent.iter().sum::<f64>() / recent.len() as f64, 2)
	};

	let success_rate = if ratings.is_empty() {
		0.0
	} else {
		let successes = ratings.iter().filter(|r| **r >= SUCCESS_THRESHOLD).count();
		round_to(successes as f64 / ratings.len() as f64 * 100.0, 1)
	};

	let averages = dimension_averages(history, resolver);
	let summary = if history.is_empty() {
		"No history yet.".to_string()
	} else {
		summarize(&averages)
	};

	Insights {
		total_entries: history.len(),
		avg_last_five,
		success_rate,
		dimension_averages: DimensionAverages(averages),
		trend: trend(&ratings),
		summary,
	}
}

/// Weighted per-axis mean over every entry that resolves. Rated entries
/// weigh `rating / 5`; unrated or zero-rated ones weigh 0.5.
fn dimension_averages(
	history: &[RatedEvent],
	resolver: &impl VectorResolver,
) -> [f64; DIMENSIONS] {
	let mut sum = [0.0f64; DIMENSIONS];
	let mut total_weight = 0.0;
	for event in history {
		let Some(vector) = resolver.resolve(&event.item) else {
			continue;
		};
		let weight = match event.rating {
			Some(r) if r > 0.0 => r / MAX_RATING,
			_ => UNRATED_WEIGHT,
		};
		for (s, v) in sum.iter_mut().zip(vector.components()) {
			*s += v * weight;
		}
		total_weight += weight;
	}
	if total_weight == 0.0 {
		return [0.5; DIMENSIONS];
	}
	sum.map(|s| round_to((s / total_weight).clamp(0.0, 1.0), 3))
}

fn trend(ratings: &[f64]) -> Trend {
	if ratings.len() < TREND_WINDOW * 2 {
		return Trend::Neutral;
	}
	let mean = |window: &[f64]| window.iter().sum::<f64>() / window.len() as f64;
	let recent = mean(&ratings[..TREND_WINDOW]);
	let older = mean(&ratings[TREND_WINDOW..TREND_WINDOW * 2]);
	if recent > older + TREND_THRESHOLD {
		Trend::Improving
	} else if recent < older - TREND_THRESHOLD {
		Trend::Declining
	} else {
		Trend::Neutral
	}
}

/// (low, high) phrasing for the axes that show up in the summary.
fn descriptors(dim: Dimension) -> Option<(&'static str, &'static str)> {
	match dim {
		Dimension::Cost => Some(("budget-friendly", "upscale")),
		Dimension::Setting => Some(("indoor", "outdoor")),
		Dimension::Energy => Some(("relaxed", "active and energetic")),
		Dimension::SocialDensity => Some(("private and intimate", "social and lively")),
		Dimension::TimeOfDay => Some(("morning", "evening")),
		Dimension::RomanceIntensity => Some(("casual and lighthearted", "deeply romantic")),
		Dimension::ConversationDepth => {
			Some(("activity-focused (less talking)", "deep-conversation"))
		}
		Dimension::Duration | Dimension::Novelty => None,
	}
}

fn summarize(averages: &[f64; DIMENSIONS]) -> String {
	let leanings: Vec<&str> = Dimension::ALL
		.iter()
		.filter_map(|d| {
			let (low, high) = descriptors(*d)?;
			let value = averages[d.index()];
			if value < STRONG_LOW {
				Some(low)
			} else if value > STRONG_HIGH {
				Some(high)
			} else {
				None
			}
		})
		.collect();

	match leanings.split_last() {
		None => "You enjoy a well-balanced mix. Keep exploring!".to_string(),
		Some((only, [])) => format!("You tend to prefer things that are {}.", only),
		Some((last, rest)) => format!(
			"You tend to prefer things that are {} and {}.",
			rest.join(", "),
			last
		),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{ItemRef, TasteVector};
	use std::collections::HashMap;

	fn event(id: u64, rating: Option<f64>) -> RatedEvent {
		RatedEvent::new(ItemRef::Catalog(id), rating).unwrap()
	}

	fn resolver(entries: &[(u64, [f64; 9])]) -> HashMap<ItemRef, TasteVector> {
		entries
			.iter()
			.map(|(id, v)| (ItemRef::Catalog(*id), TasteVector::try_from(v.to_vec()).unwrap()))
			.collect()
	}

	#[test]
	fn empty_history() {
		let insights = compute_insights(&[], &resolver(&[]));
		assert_eq!(insights.total_entries, 0);
		assert_eq!(insights.avg_last_five, 0.0);
		assert_eq!(insights.success_rate, 0.0);
		assert_eq!(insights.trend, Trend::Neutral);
		assert_eq!(insights.dimension_averages.iter().count(), 9);
		assert!(insights.dimension_averages.iter().all(|(_, v)| v == 0.5));
		assert_eq!(insights.summary, "No history yet.");
	}

	#[test]
	fn rating_statistics_ignore_unrated_and_zero() {
		let history = vec![
			event(1, Some(5.0)),
			event(2, None),
			event(3, Some(0.0)),
			event(4, Some(2.0)),
			event(5, Some(4.0)),
		];
		let insights = compute_insights(&history, &resolver(&[]));
		assert_eq!(insights.total_entries, 5);
		assert_eq!(insights.avg_last_five, 3.67);
		assert_eq!(insights.success_rate, 66.7);
	}

	#[test]
	fn avg_last_five_uses_most_recent_ratings() {
		let history: Vec<RatedEvent> = [5.0, 5.0, 5.0, 5.0, 5.0, 1.0, 1.0]
			.iter()
			.enumerate()
			.map(|(i, r)| event(i as u64, Some(*r)))
			.collect();
		assert_eq!(compute_insights(&history, &resolver(&[])).avg_last_five, 5.0);
	}

	#[test]
	fn dimension_averages_weight_by_rating() {
		let vectors = resolver(&[(1, [1.0; 9]), (2, [0.0; 9])]);
		// weights 1.0 and 0.5 (unrated)
		let history = vec![event(1, Some(5.0)), event(2, None), event(99, Some(5.0))];
		let insights = compute_insights(&history, &vectors);
		assert_eq!(insights.dimension_averages.get(Dimension::Cost), 0.667);
		assert_eq!(
			insights.dimension_averages.get(Dimension::ConversationDepth),
			0.667
		);
	}

	#[test]
	fn trend_needs_six_ratings() {
		let improving: Vec<RatedEvent> = [5.0, 5.0, 5.0, 2.0, 2.0, 2.0]
			.iter()
			.enumerate()
			.map(|(i, r)| event(i as u64, Some(*r)))
			.collect();
		assert_eq!(compute_insights(&improving, &resolver(&[])).trend, Trend::Improving);

		let declining: Vec<RatedEvent> = [2.0, 2.0, 2.0, 4.0, 4.0, 4.0]
			.iter()
			.enumerate()
			.map(|(i, r)| event(i as u64, Some(*r)))
			.collect();
		assert_eq!(compute_insights(&declining, &resolver(&[])).trend, Trend::Declining);

		assert_eq!(
			compute_insights(&improving[..5], &resolver(&[])).trend,
			Trend::Neutral
		);
	}

	#[test]
	fn summary_names_strong_axes() {
		let vectors = resolver(&[(1, [0.9, 0.1, 0.5, 0.5, 0.9, 0.5, 0.5, 0.5, 0.5])]);
		let insights = compute_insights(&[event(1, Some(4.0))], &vectors);
		assert_eq!(
			insights.summary,
			"You tend to prefer things that are upscale, indoor and evening."
		);

		let balanced = resolver(&[(1, [0.5; 9])]);
		let insights = compute_insights(&[event(1, Some(4.0))], &balanced);
		assert_eq!(insights.summary, "You enjoy a well-balanced mix. Keep exploring!");
	}

	#[test]
	fn single_leaning_summary() {
		let vectors = resolver(&[(1, [0.5, 0.5, 0.1, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5])]);
		let insights = compute_insights(&[event(1, Some(4.0))], &vectors);
		assert_eq!(insights.summary, "You tend to prefer things that are relaxed.");
	}

	#[test]
	fn dimension_averages_serialize_in_schema_order() {
		let vectors = resolver(&[(1, [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9])]);
		let insights = compute_insights(&[event(1, Some(5.0))], &vectors);
		let json = serde_json::to_string(&insights.dimension_averages).unwrap();
		assert_eq!(
			json,
			r#"{"cost":0.1,"setting":0.2,"energy":0.3,"social_density":0.4,"time_of_day":0.5,"duration":0.6,"novelty":0.7,"romance_intensity":0.8,"conversation_depth":0.9}"#
		);
	}

	#[test]
	fn trend_serializes_lowercase() {
		assert_eq!(serde_json::to_value(Trend::Improving).unwrap(), "improving");
	}
}
