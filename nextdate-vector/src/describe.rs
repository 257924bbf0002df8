//! Free-text matching: turn a description into a taste vector through a
//! pluggable vectorizer, then search the store with keyword boost.

use std::collections::HashSet;

use crate::error::VectorError;
use crate::store::VectorStore;
use crate::types::{SearchHit, TasteVector};

/// Maps free text to raw vector components. Implementations may call out
/// to anything; their failures come back as `VectorizerFailure`.
pub trait TextVectorizer: Send + Sync {
	fn vectorize(&self, text: &str) -> Result<Vec<f64>, VectorError>;
}

/// Vectorize `text` and return the closest items. Vectorizer errors are
/// returned as-is and never retried; a malformed vector is a
/// `DimensionMismatch`.
pub fn match_description(
	store: &VectorStore,
	vectorizer: &dyn TextVectorizer,
	text: &str,
	top_k: usize,
) -> Result<(TasteVector, Vec<SearchHit>), VectorError> {
	let raw = vectorizer.vectorize(text).map_err(|e| match e {
		VectorError::VectorizerFailure(_) => e,
		other => VectorError::VectorizerFailure(other.to_string()),
	})?;
	let vector = TasteVector::try_from(raw)?;
	store.warm()?;
	let hits = store.search(&vector, top_k, &HashSet::new(), Some(text));
	Ok((vector, hits))
}
