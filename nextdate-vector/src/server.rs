// ---------------------------------------------------------------------------
// VectorServer — JSON-RPC dispatcher
// ---------------------------------------------------------------------------
//
// Routes incoming JSON-RPC 2.0 requests (NDJSON over stdin) to the item
// store, the custom registry, the recommender and the venue catalog.
// `dispatch()` matches on the method name and hands params to a
// free-standing handler.
// ---------------------------------------------------------------------------

use std::collections::{BTreeMap, HashSet};
use std::io::{self, BufRead};

use serde::Deserialize;

use crate::catalog::{CatalogFilters, VenueCatalog};
use crate::describe::{match_description, TextVectorizer};
use crate::diversity::apply_diversity;
use crate::error::VectorError;
use crate::insights::compute_insights;
use crate::preference::ResolvedVectors;
use crate::protocol::*;
use crate::recommendation::Recommender;
use crate::social::{find_similar, Peer, DEFAULT_SOCIAL_TOP_K};
use crate::transport::NdjsonTransport;
use crate::types::{Dimension, ItemRef, RatedEvent, TasteVector};

const DEFAULT_TOP_K: usize = 10;

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct VectorServer {
	transport: NdjsonTransport,
	recommender: Recommender,
	venues: VenueCatalog,
	vectorizer: Option<Box<dyn TextVectorizer>>,
}

impl VectorServer {
	pub fn new(transport: NdjsonTransport, recommender: Recommender, venues: VenueCatalog) -> Self {
		Self {
			transport,
			recommender,
			venues,
			vectorizer: None,
		}
	}

	/// Enable `store/describe` with the given text vectorizer.
	pub fn with_vectorizer(mut self, vectorizer: impl TextVectorizer + 'static) -> Self {
		self.vectorizer = Some(Box::new(vectorizer));
		self
	}

	/// Main loop: read JSON-RPC messages from stdin, dispatch to handlers.
	pub fn run(&mut self) -> Result<(), VectorError> {
		let stdin = io::stdin();
		let reader = stdin.lock();

		for line_result in reader.lines() {
			let line = line_result?;
			if line.trim().is_empty() {
				continue;
			}

			let request: JsonRpcRequest = match serde_json::from_str(&line) {
				Ok(r) => r,
				Err(e) => {
					tracing::error!("Failed to parse request: {}", e);
					continue;
				}
			};

			self.dispatch(request);
		}

		Ok(())
	}

	// ── Dispatch ──────────────────────────────────────────────────────────

	fn dispatch(&self, req: JsonRpcRequest) {
		let id = req.id;
		let rec = &self.recommender;
		let result = match req.method.as_str() {
			// -- Store ---------------------------------------------------
			"store/warm" => rec
				.store()
				.warm()
				.map(|count| serde_json::json!({ "count": count })),
			"store/isWarmed" => Ok(serde_json::json!({ "warmed": rec.store().is_warmed() })),
			"store/get" => handle_get(rec, req.params),
			"store/append" => handle_append(rec, req.params),
			"store/all" => rec.store().warm().map(|_| {
				serde_json::json!({ "items": rec.store().all() })
			}),
			"store/search" => handle_search(rec, req.params),
			"store/searchWorst" => handle_search_worst(rec, req.params),
			"store/describe" => self.handle_describe(req.params),

			// -- Preference ----------------------------------------------
			"preference/compute" => handle_compute_preference(rec, req.params),
			"preference/diversify" => handle_diversify(rec, req.params),

			// -- Recommendation ------------------------------------------
			"recommend/best" => handle_recommend_best(rec, req.params),
			"recommend/worst" => handle_recommend_worst(rec, req.params),

			// -- Venue catalog -------------------------------------------
			"catalog/search" => handle_catalog_search(&self.venues, req.params),
			"catalog/partitions" => {
				Ok(serde_json::json!({ "partitions": self.venues.partitions() }))
			}
			"catalog/dimensions" => {
				let labels: Vec<&str> = Dimension::ALL.iter().map(|d| d.label()).collect();
				Ok(serde_json::json!({ "dimensions": labels }))
			}

			// -- Custom registry -----------------------------------------
			"registry/put" => handle_registry_put(rec, req.params),
			"registry/get" => handle_registry_get(rec, req.params),

			// -- Insights ------------------------------------------------
			"insights/compute" => handle_insights(rec, req.params),

			// -- Social --------------------------------------------------
			"social/similar" => handle_social_similar(rec, req.params),

			// -- Unknown -------------------------------------------------
			_ => {
				self.transport.write_error(
					id,
					METHOD_NOT_FOUND,
					format!("Unknown method: {}", req.method),
					None,
				);
				return;
			}
		};

		match result {
			Ok(value) => self.transport.write_response(id, value),
			Err(e) => self.transport.write_error(
				id,
				VECTOR_ERROR,
				e.to_string(),
				Some(e.to_json_rpc_error()),
			),
		}
	}

	fn handle_describe(&self, params: serde_json::Value) -> Result<serde_json::Value, VectorError> {
		let p: DescribeParams = parse_params(params)?;
		let Some(vectorizer) = self.vectorizer.as_deref() else {
			return Err(VectorError::VectorizerFailure(
				"No text vectorizer configured".to_string(),
			));
		};
		let (vector, results) = match_description(
			self.recommender.store(),
			vectorizer,
			&p.text,
			p.top_k.unwrap_or(DEFAULT_TOP_K),
		)?;
		Ok(serde_json::json!({ "vector": vector, "results": results }))
	}
}

// ---------------------------------------------------------------------------
// Param types
// ---------------------------------------------------------------------------

fn parse_params<T: serde::de::DeserializeOwned>(
	params: serde_json::Value,
) -> Result<T, VectorError> {
	serde_json::from_value(params)
		.map_err(|e| VectorError::Serialization(format!("Invalid params: {}", e)))
}

/// History entry as sent over the wire; validated into a `RatedEvent` so
/// a bad rating surfaces as `INVALID_RATING` rather than a parse error.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
	item: ItemRef,
	rating: Option<f64>,
}

fn into_events(entries: Vec<HistoryEntry>) -> Result<Vec<RatedEvent>, VectorError> {
	entries
		.into_iter()
		.map(|e| RatedEvent::new(e.item, e.rating))
		.collect()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdsParams {
	ids: Vec<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendParams {
	name: String,
	#[serde(default)]
	description: String,
	vector: Vec<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
	query: Vec<f64>,
	top_k: Option<usize>,
	#[serde(default)]
	exclude: Vec<u64>,
	text_query: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchWorstParams {
	preference: Vec<f64>,
	top_k: Option<usize>,
	exclude: Option<Vec<u64>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeParams {
	text: String,
	top_k: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryParams {
	#[serde(default)]
	history: Vec<HistoryEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiversifyParams {
	preference: Vec<f64>,
	#[serde(default)]
	recent: Vec<ItemRef>,
	strength: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendParams {
	#[serde(default)]
	history: Vec<HistoryEntry>,
	#[serde(default)]
	skip: Vec<u64>,
	top_k: Option<usize>,
}

/// Peer histories are keyed by peer id; a map keeps peer order stable.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocialParams {
	#[serde(default)]
	history: Vec<HistoryEntry>,
	#[serde(default)]
	peers: BTreeMap<String, Vec<HistoryEntry>>,
	top_k: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogSearchParams {
	partition: String,
	#[serde(default)]
	filters: CatalogFilters,
	query: Option<Vec<f64>>,
	top_k: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryPutParams {
	record_id: Option<String>,
	vector: Vec<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryGetParams {
	record_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Free-standing handler functions
// ---------------------------------------------------------------------------

fn handle_get(rec: &Recommender, params: serde_json::Value) -> Result<serde_json::Value, VectorError> {
	let p: IdsParams = parse_params(params)?;
	rec.store().warm()?;
	Ok(serde_json::json!({ "items": rec.store().get(&p.ids) }))
}

fn handle_append(
	rec: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: AppendParams = parse_params(params)?;
	let id = rec.store().append(p.name, p.description, p.vector)?;
	Ok(serde_json::json!({ "id": id }))
}

fn handle_search(
	rec: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: SearchParams = parse_params(params)?;
	let query = TasteVector::try_from(p.query)?;
	rec.store().warm()?;
	let exclude: HashSet<u64> = p.exclude.into_iter().collect();
	let results = rec.store().search(
		&query,
		p.top_k.unwrap_or(DEFAULT_TOP_K),
		&exclude,
		p.text_query.as_deref(),
	);
	Ok(serde_json::json!({ "results": results }))
}

fn handle_search_worst(
	rec: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: SearchWorstParams = parse_params(params)?;
	let pref = TasteVector::try_from(p.preference)?;
	rec.store().warm()?;
	let exclude: Option<HashSet<u64>> = p.exclude.map(|ids| ids.into_iter().collect());
	let results = rec
		.store()
		.search_worst(&pref, p.top_k.unwrap_or(DEFAULT_TOP_K), exclude.as_ref());
	Ok(serde_json::json!({ "results": results }))
}

fn handle_compute_preference(
	rec: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: HistoryParams = parse_params(params)?;
	let history = into_events(p.history)?;
	let pref = rec.preference(&history)?;
	Ok(serde_json::json!({ "preferenceVector": pref }))
}

fn handle_diversify(
	rec: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: DiversifyParams = parse_params(params)?;
	let pref = TasteVector::try_from(p.preference)?;
	rec.store().warm()?;
	let resolved = ResolvedVectors::collect(rec.store(), rec.registry(), &p.recent);
	let strength = p.strength.unwrap_or(rec.config().diversity_strength);
	let out = apply_diversity(&pref, &p.recent, &resolved, strength);
	Ok(serde_json::json!({ "preferenceVector": out }))
}

fn handle_recommend_best(
	rec: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: RecommendParams = parse_params(params)?;
	let history = into_events(p.history)?;
	let out = rec.best(&history, &p.skip, p.top_k.unwrap_or(DEFAULT_TOP_K))?;
	serde_json::to_value(out).map_err(|e| VectorError::Serialization(e.to_string()))
}

fn handle_recommend_worst(
	rec: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: RecommendParams = parse_params(params)?;
	let history = into_events(p.history)?;
	let out = rec.worst(&history, p.top_k.unwrap_or(DEFAULT_TOP_K))?;
	serde_json::to_value(out).map_err(|e| VectorError::Serialization(e.to_string()))
}

fn handle_catalog_search(
	venues: &VenueCatalog,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: CatalogSearchParams = parse_params(params)?;
	let query = p.query.map(TasteVector::try_from).transpose()?;
	let results = venues.search(
		&p.partition,
		&p.filters,
		query.as_ref(),
		p.top_k.unwrap_or(DEFAULT_TOP_K),
	);
	Ok(serde_json::json!({ "results": results }))
}

fn handle_registry_put(
	rec: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: RegistryPutParams = parse_params(params)?;
	let record_id = p
		.record_id
		.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
	let created = rec.registry().put(&record_id, p.vector)?;
	Ok(serde_json::json!({ "recordId": record_id, "created": created }))
}

fn handle_registry_get(
	rec: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: RegistryGetParams = parse_params(params)?;
	Ok(serde_json::json!({ "vectors": rec.registry().get(&p.record_ids) }))
}

fn handle_insights(
	rec: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: HistoryParams = parse_params(params)?;
	let history = into_events(p.history)?;
	rec.store().warm()?;
	let insights = compute_insights(&history, &rec.resolve(&history));
	serde_json::to_value(insights).map_err(|e| VectorError::Serialization(e.to_string()))
}

fn handle_social_similar(
	rec: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, VectorError> {
	let p: SocialParams = parse_params(params)?;
	let history = into_events(p.history)?;
	let peers = p
		.peers
		.into_iter()
		.map(|(id, entries)| {
			Ok(Peer {
				id,
				history: into_events(entries)?,
			})
		})
		.collect::<Result<Vec<Peer>, VectorError>>()?;
	let out = find_similar(rec, &history, &peers, p.top_k.unwrap_or(DEFAULT_SOCIAL_TOP_K))?;
	serde_json::to_value(out).map_err(|e| VectorError::Serialization(e.to_string()))
}
