use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
	#[error("Item source unavailable: {0}")]
	SourceUnavailable(String),
	#[error("Dimension mismatch: {0}")]
	DimensionMismatch(String),
	#[error("Invalid rating: {0} (expected 0..=5)")]
	InvalidRating(f64),
	#[error("Vectorizer failure: {0}")]
	VectorizerFailure(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Serialization error: {0}")]
	Serialization(String),
}

impl VectorError {
	pub fn code(&self) -> &str {
		match self {
			Self::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
			Self::DimensionMismatch(_) => "DIMENSION_MISMATCH",
			Self::InvalidRating(_) => "INVALID_RATING",
			Self::VectorizerFailure(_) => "VECTORIZER_FAILURE",
			Self::Io(_) => "IO",
			Self::Serialization(_) => "SERIALIZATION",
		}
	}

	pub fn to_json_rpc_error(&self) -> serde_json::Value {
		serde_json::json!({
			"vectorCode": self.code(),
			"message": self.to_string(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes_are_stable() {
		assert_eq!(VectorError::InvalidRating(7.0).code(), "INVALID_RATING");
		assert_eq!(
			VectorError::DimensionMismatch("x".into()).code(),
			"DIMENSION_MISMATCH"
		);
	}

	#[test]
	fn json_rpc_payload_carries_code_and_message() {
		let err = VectorError::SourceUnavailable("connection refused".into());
		let payload = err.to_json_rpc_error();
		assert_eq!(payload["vectorCode"], "SOURCE_UNAVAILABLE");
		assert!(payload["message"]
			.as_str()
			.unwrap()
			.contains("connection refused"));
	}
}
