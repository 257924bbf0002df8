use std::sync::Arc;

use clap::Parser;

use nextdate_vector_engine::catalog::VenueCatalog;
use nextdate_vector_engine::config::CliArgs;
use nextdate_vector_engine::persistence::JsonFileCatalog;
use nextdate_vector_engine::recommendation::Recommender;
use nextdate_vector_engine::registry::CustomVectorRegistry;
use nextdate_vector_engine::server::VectorServer;
use nextdate_vector_engine::source::MemorySource;
use nextdate_vector_engine::store::{StoreConfig, VectorStore};
use nextdate_vector_engine::transport::NdjsonTransport;

fn build_store(args: &CliArgs) -> VectorStore {
	let store = match &args.catalog {
		Some(path) => {
			let file = Arc::new(JsonFileCatalog::new(path));
			VectorStore::new(Arc::clone(&file), StoreConfig::default()).with_mirror(file)
		}
		None => {
			let memory = Arc::new(MemorySource::default());
			VectorStore::new(Arc::clone(&memory), StoreConfig::default()).with_mirror(memory)
		}
	};
	match &args.seed {
		Some(path) => store.with_seed(JsonFileCatalog::new(path)),
		None => store,
	}
}

fn main() {
	let args = CliArgs::parse();

	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
		)
		.init();

	let store = Arc::new(build_store(&args));
	if let Err(e) = store.warm() {
		tracing::warn!(error = %e, "Initial warm-up failed; retrying on first use");
	}

	let venues = match &args.venues {
		Some(path) => VenueCatalog::load_json(path).unwrap_or_else(|e| {
			tracing::warn!(error = %e, "Venue catalog unavailable");
			VenueCatalog::default()
		}),
		None => VenueCatalog::default(),
	};

	let registry = Arc::new(CustomVectorRegistry::new(args.registry_capacity));
	let recommender = Recommender::new(store, registry, args.recommend_config());
	let mut server = VectorServer::new(NdjsonTransport::new(), recommender, venues);

	tracing::info!("nextdate-vector-engine ready");

	if let Err(e) = server.run() {
		tracing::error!("Server error: {}", e);
		std::process::exit(1);
	}
}
