use serde::{Deserialize, Serialize};

use crate::error::VectorError;

/// Number of semantic axes in every taste vector.
pub const DIMENSIONS: usize = 9;

// ---------------------------------------------------------------------------
// Dimension schema
// ---------------------------------------------------------------------------

/// The nine semantic axes, in positional order. Every consumer indexes
/// vectors by this order; it must never be reordered or resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
	Cost,
	Setting,
	Energy,
	SocialDensity,
	TimeOfDay,
	Duration,
	Novelty,
	RomanceIntensity,
	ConversationDepth,
}

impl Dimension {
	pub const ALL: [Dimension; DIMENSIONS] = [
		Dimension::Cost,
		Dimension::Setting,
		Dimension::Energy,
		Dimension::SocialDensity,
		Dimension::TimeOfDay,
		Dimension::Duration,
		Dimension::Novelty,
		Dimension::RomanceIntensity,
		Dimension::ConversationDepth,
	];

	pub fn index(self) -> usize {
		self as usize
	}

	pub fn label(self) -> &'static str {
		match self {
			Self::Cost => "cost",
			Self::Setting => "setting",
			Self::Energy => "energy",
			Self::SocialDensity => "social_density",
			Self::TimeOfDay => "time_of_day",
			Self::Duration => "duration",
			Self::Novelty => "novelty",
			Self::RomanceIntensity => "romance_intensity",
			Self::ConversationDepth => "conversation_depth",
		}
	}
}

// ---------------------------------------------------------------------------
// TasteVector
// ---------------------------------------------------------------------------

/// Round to 4 decimal places.
pub fn round4(v: f64) -> f64 {
	(v * 10_000.0).round() / 10_000.0
}

/// A validated 9-component vector with every component in [0, 1].
///
/// The only way to build one from outside data is [`TryFrom<Vec<f64>>`],
/// which rejects wrong lengths and out-of-range components instead of
/// truncating or clamping them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct TasteVector([f64; DIMENSIONS]);

impl TasteVector {
	/// The vector returned when there is no usable signal.
	pub const NEUTRAL: TasteVector = TasteVector([0.5; DIMENSIONS]);

	/// Build a vector from computed components: clamps each to [0, 1] and
	/// rounds to 4 decimals so outputs are deterministic.
	pub(crate) fn from_computed(raw: [f64; DIMENSIONS]) -> Self {
		let mut out = [0.0; DIMENSIONS];
		for (o, v) in out.iter_mut().zip(raw) {
			let v = if v.is_finite() { v } else { 0.0 };
			*o = round4(v.clamp(0.0, 1.0));
		}
		Self(out)
	}

	pub fn components(&self) -> &[f64; DIMENSIONS] {
		&self.0
	}

	pub fn get(&self, dim: Dimension) -> f64 {
		self.0[dim.index()]
	}

	/// Componentwise `1 - v`, rounded to 4 decimals.
	pub fn inverted(&self) -> Self {
		let mut out = [0.0; DIMENSIONS];
		for (o, v) in out.iter_mut().zip(self.0) {
			*o = round4(1.0 - v);
		}
		Self(out)
	}
}

impl TryFrom<Vec<f64>> for TasteVector {
	type Error = VectorError;

	fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
		if values.len() != DIMENSIONS {
			return Err(VectorError::DimensionMismatch(format!(
				"expected {} components, got {}",
				DIMENSIONS,
				values.len()
			)));
		}
		let mut out = [0.0; DIMENSIONS];
		for (i, v) in values.into_iter().enumerate() {
			if !(0.0..=1.0).contains(&v) {
				return Err(VectorError::DimensionMismatch(format!(
					"component {} ({}) = {} is outside [0, 1]",
					i,
					Dimension::ALL[i].label(),
					v
				)));
			}
			out[i] = v;
		}
		Ok(Self(out))
	}
}

impl From<TasteVector> for Vec<f64> {
	fn from(v: TasteVector) -> Self {
		v.0.to_vec()
	}
}

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
	pub id: u64,
	pub name: String,
	#[serde(default)]
	pub description: String,
	pub vector: TasteVector,
}

/// `all()` projection: everything but the vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
	pub id: u64,
	pub name: String,
	pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
	pub id: u64,
	pub name: String,
	pub description: String,
	pub score: f64,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Reference to something a user did: a catalog item, or a user-authored
/// entry whose vector lives in the custom registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemRef {
	Catalog(u64),
	Custom(String),
}

impl ItemRef {
	pub fn catalog_id(&self) -> Option<u64> {
		match self {
			Self::Catalog(id) => Some(*id),
			Self::Custom(_) => None,
		}
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRatedEvent {
	item: ItemRef,
	rating: Option<f64>,
}

/// One history entry. `rating` is `None` for entries the user has not
/// rated yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRatedEvent", rename_all = "camelCase")]
pub struct RatedEvent {
	pub item: ItemRef,
	pub rating: Option<f64>,
}

impl RatedEvent {
	pub fn new(item: ItemRef, rating: Option<f64>) -> Result<Self, VectorError> {
		if let Some(r) = rating {
			if !(0.0..=5.0).contains(&r) {
				return Err(VectorError::InvalidRating(r));
			}
		}
		Ok(Self { item, rating })
	}

	pub fn rated(item: ItemRef, rating: f64) -> Result<Self, VectorError> {
		Self::new(item, Some(rating))
	}
}

impl TryFrom<RawRatedEvent> for RatedEvent {
	type Error = VectorError;

	fn try_from(raw: RawRatedEvent) -> Result<Self, Self::Error> {
		Self::new(raw.item, raw.rating)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dimension_order_is_fixed() {
		let labels: Vec<&str> = Dimension::ALL.iter().map(|d| d.label()).collect();
		assert_eq!(
			labels,
			vec![
				"cost",
				"setting",
				"energy",
				"social_density",
				"time_of_day",
				"duration",
				"novelty",
				"romance_intensity",
				"conversation_depth",
			]
		);
		assert_eq!(Dimension::ConversationDepth.index(), 8);
	}

	#[test]
	fn rejects_wrong_length() {
		let err = TasteVector::try_from(vec![0.5; 8]).unwrap_err();
		assert!(matches!(err, VectorError::DimensionMismatch(_)));
	}

	#[test]
	fn rejects_out_of_range_component() {
		let mut v = vec![0.5; 9];
		v[3] = 1.2;
		assert!(TasteVector::try_from(v).is_err());
		let mut v = vec![0.5; 9];
		v[0] = -0.01;
		assert!(TasteVector::try_from(v).is_err());
		let mut v = vec![0.5; 9];
		v[0] = f64::NAN;
		assert!(TasteVector::try_from(v).is_err());
	}

	#[test]
	fn deserializes_from_plain_array() {
		let v: TasteVector =
			serde_json::from_str("[0,0.1,0.2,0.3,0.4,0.5,0.6,0.7,1]").unwrap();
		assert_eq!(v.get(Dimension::Energy), 0.2);
		assert!(serde_json::from_str::<TasteVector>("[0.1, 0.2]").is_err());
		let back = serde_json::to_value(v).unwrap();
		assert_eq!(back.as_array().unwrap().len(), 9);
	}

	#[test]
	fn inversion_rounds_to_four_decimals() {
		let v = TasteVector::try_from(vec![0.33333, 0.0, 1.0, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5])
			.unwrap();
		let inv = v.inverted();
		assert_eq!(inv.components()[0], 0.6667);
		assert_eq!(inv.components()[1], 1.0);
		assert_eq!(inv.components()[2], 0.0);
	}

	#[test]
	fn computed_vectors_are_clamped() {
		let v = TasteVector::from_computed([1.7, -0.2, 0.123456, 0.5, 0.5, 0.5, 0.5, 0.5, f64::NAN]);
		assert_eq!(v.components()[0], 1.0);
		assert_eq!(v.components()[1], 0.0);
		assert_eq!(v.components()[2], 0.1235);
		assert_eq!(v.components()[8], 0.0);
	}

	#[test]
	fn item_ref_is_number_or_string() {
		let refs: Vec<ItemRef> = serde_json::from_str(r#"[12, "rec-1"]"#).unwrap();
		assert_eq!(refs[0], ItemRef::Catalog(12));
		assert_eq!(refs[1], ItemRef::Custom("rec-1".into()));
	}

	#[test]
	fn rated_event_rejects_bad_rating() {
		assert!(matches!(
			RatedEvent::rated(ItemRef::Catalog(1), 5.5),
			Err(VectorError::InvalidRating(_))
		));
		assert!(RatedEvent::new(ItemRef::Catalog(1), None).is_ok());
		let parsed: Result<RatedEvent, _> =
			serde_json::from_str(r#"{"item": 3, "rating": -1}"#);
		assert!(parsed.is_err());
		let parsed: RatedEvent = serde_json::from_str(r#"{"item": 3}"#).unwrap();
		assert_eq!(parsed.rating, None);
	}
}
