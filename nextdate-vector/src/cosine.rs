use crate::types::TasteVector;

/// Compute the magnitude (L2 norm) of a vector.
pub fn magnitude(v: &TasteVector) -> f64 {
	v.components().iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Cosine similarity using pre-computed magnitudes.
/// Returns `None` when either magnitude is zero: such a vector has no
/// direction and is never a valid ranking candidate.
pub fn cosine_with_magnitude(
	a: &TasteVector,
	b: &TasteVector,
	mag_a: f64,
	mag_b: f64,
) -> Option<f64> {
	let denom = mag_a * mag_b;
	if denom == 0.0 {
		return None;
	}
	let dot: f64 = a
		.components()
		.iter()
		.zip(b.components())
		.map(|(x, y)| x * y)
		.sum();
	let result = dot / denom;
	if !result.is_finite() {
		return None;
	}
	Some(result.clamp(-1.0, 1.0))
}

/// Cosine similarity between two taste vectors.
pub fn cosine_similarity(a: &TasteVector, b: &TasteVector) -> Option<f64> {
	cosine_with_magnitude(a, b, magnitude(a), magnitude(b))
}
