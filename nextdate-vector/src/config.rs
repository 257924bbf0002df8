use std::path::PathBuf;

use clap::Parser;

use crate::diversity::DEFAULT_DIVERSITY_STRENGTH;
use crate::recommendation::RecommendConfig;

#[derive(Parser, Debug)]
#[command(
	name = "nextdate-vector-engine",
	about = "Taste-vector preference and similarity engine over JSON-RPC / NDJSON stdio"
)]
pub struct CliArgs {
	/// Item catalog file (JSON array, optionally gzip). Appends are mirrored here.
	#[arg(long, env = "NEXTDATE_CATALOG")]
	pub catalog: Option<PathBuf>,

	/// Canonical seed corpus loaded when the catalog is empty
	#[arg(long, env = "NEXTDATE_SEED")]
	pub seed: Option<PathBuf>,

	/// Venue catalog for partitioned, attribute-filtered search
	#[arg(long, env = "NEXTDATE_VENUES")]
	pub venues: Option<PathBuf>,

	/// Bound on the custom vector registry (unbounded when unset)
	#[arg(long, env = "NEXTDATE_REGISTRY_CAPACITY")]
	pub registry_capacity: Option<usize>,

	/// How strongly recommendations are pushed away from recent history
	#[arg(long, default_value_t = DEFAULT_DIVERSITY_STRENGTH)]
	pub diversity_strength: f64,

	/// Number of most recent history entries excluded from recommendations
	#[arg(long, default_value_t = 20)]
	pub history_exclude: usize,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, default_value = "info", env = "NEXTDATE_LOG_LEVEL")]
	pub log_level: String,
}

impl CliArgs {
	pub fn recommend_config(&self) -> RecommendConfig {
		RecommendConfig {
			diversity_strength: self.diversity_strength,
			history_exclude: self.history_exclude,
		}
	}
}
