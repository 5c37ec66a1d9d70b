use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
	ConfidenceBreakdown, Degradation, Error, FusionWeights, MedragService, QueryMetrics, Result,
	RetrievalCandidate, SearchMethod, SessionContext, Tier,
	cache::{CacheKeys, ContextFingerprint, KeyKind},
	confidence::ConfidenceInput,
	fusion, rerank,
	retrieval::elapsed_ms,
};
use medrag_domain::{Intent, MedicalDomain, QueryAnalysis, SearchStrategy, analyze_query};

const MAX_TOP_K: u32 = 100;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RetrieveRequest {
	pub query: String,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub session_id: Option<String>,
}
impl RetrieveRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), top_k: None, session_id: None }
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrieveTimings {
	pub compress_ms: f64,
	pub cache_lookup_ms: f64,
	pub embed_ms: f64,
	pub semantic_ms: f64,
	pub lexical_ms: f64,
	pub fusion_ms: f64,
	pub confidence_ms: f64,
	pub total_ms: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrieveDiagnostics {
	pub trace_id: Uuid,
	pub search_method: SearchMethod,
	pub from_cache: bool,
	pub cache_tier: Option<Tier>,
	pub cache_key_kind: Option<KeyKind>,
	pub degradation: Option<Degradation>,
	pub intent: Intent,
	pub strategy: SearchStrategy,
	pub domain: MedicalDomain,
	pub weights: FusionWeights,
	pub compressed_query: String,
	pub top_k: u32,
	pub timings: RetrieveTimings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrieveResponse {
	pub items: Vec<RetrievalCandidate>,
	pub confidence: ConfidenceBreakdown,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub suggestions: Vec<String>,
	pub diagnostics: RetrieveDiagnostics,
}

/// What a cache entry holds. Everything else in a response is recomputed per call.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CachedRetrieval {
	items: Vec<RetrievalCandidate>,
	confidence: ConfidenceBreakdown,
	search_method: SearchMethod,
	degradation: Option<Degradation>,
	weights: FusionWeights,
	compressed_query: String,
}

struct Prepared {
	trace_id: Uuid,
	query: String,
	started: Instant,
	top_k: u32,
	analysis: QueryAnalysis,
	context: SessionContext,
	keys: Option<CacheKeys>,
	timings: RetrieveTimings,
}

impl MedragService {
	/// Runs one query under the configured whole-query deadline.
	///
	/// Dropping the returned future cancels in-flight index work and skips the cache write.
	pub async fn retrieve(&self, req: RetrieveRequest) -> Result<RetrieveResponse> {
		let deadline = self.cfg.retrieval.query_timeout_ms;

		match tokio::time::timeout(Duration::from_millis(deadline), self.retrieve_inner(req)).await
		{
			Ok(result) => {
				if let (Some(tracker), Ok(response)) = (self.performance.as_ref(), result.as_ref()) {
					let diagnostics = &response.diagnostics;

					tracker.record(QueryMetrics::from_timings(
						&diagnostics.timings,
						diagnostics.from_cache,
					));
				}

				result
			},
			Err(_) => {
				tracing::warn!(timeout_ms = deadline, "Query deadline exceeded.");

				Err(Error::Timeout { stage: "query", elapsed_ms: deadline })
			},
		}
	}

	async fn retrieve_inner(&self, req: RetrieveRequest) -> Result<RetrieveResponse> {
		let mut prepared = self.prepare(&req).await?;
		let query = req.query.trim();
		let stage = Instant::now();
		let compressed = self.compressor.compress(query);

		prepared.timings.compress_ms = elapsed_ms(stage);

		if let Some(response) = self.cached_response(&mut prepared) {
			return Ok(response);
		}

		let limit =
			prepared.top_k.saturating_mul(self.cfg.retrieval.candidate_multiplier.max(1)) as usize;
		let outcome = self.retriever.retrieve(&compressed, limit).await?;

		prepared.timings.embed_ms = outcome.timings.embed_ms;
		prepared.timings.semantic_ms = outcome.timings.semantic_ms;
		prepared.timings.lexical_ms = outcome.timings.lexical_ms;

		// Semantic-only results keep the semantic order, so no domain boost.
		let (weights, max_boost) = match outcome.search_method {
			SearchMethod::Hybrid => (
				FusionWeights::for_strategy(&self.cfg.fusion.weights, prepared.analysis.strategy)
					.normalized(),
				self.cfg.fusion.max_domain_boost,
			),
			SearchMethod::SemanticOnly => (FusionWeights::SEMANTIC_ONLY, 0.0),
		};
		let stage = Instant::now();
		let mut items =
			fusion::fuse(&outcome.semantic, &outcome.lexical, &compressed, weights, max_boost);

		if self.cfg.relevance.enabled {
			items = rerank::rerank_by_relevance(
				items,
				query,
				prepared.analysis.intent,
				&self.cfg.relevance,
			);
		}

		items.truncate(prepared.top_k as usize);

		prepared.timings.fusion_ms = elapsed_ms(stage);

		let stage = Instant::now();
		let confidence = self.confidence.score(ConfidenceInput {
			query,
			intent: prepared.analysis.intent,
			candidates: &items,
			entities: &prepared.analysis.entities,
			context_used: prepared.context.has_history(),
			context_entities: prepared.context.mentioned_entities.len(),
		});

		prepared.timings.confidence_ms = elapsed_ms(stage);

		let cached = CachedRetrieval {
			items,
			confidence,
			search_method: outcome.search_method,
			degradation: outcome.degradation,
			weights,
			compressed_query: compressed.compressed.clone(),
		};

		self.store(&prepared, &cached);

		prepared.timings.total_ms = elapsed_ms(prepared.started);

		tracing::debug!(
			trace_id = %prepared.trace_id,
			items = cached.items.len(),
			search_method = cached.search_method.as_str(),
			overall_confidence = cached.confidence.overall,
			total_ms = prepared.timings.total_ms,
			"Retrieval completed."
		);

		Ok(self.respond(&prepared, cached, None))
	}

	async fn prepare(&self, req: &RetrieveRequest) -> Result<Prepared> {
		let started = Instant::now();
		let trace_id = Uuid::new_v4();
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let top_k = req.top_k.unwrap_or(self.cfg.retrieval.top_k);

		if top_k == 0 || top_k > MAX_TOP_K {
			return Err(Error::InvalidRequest {
				message: format!("top_k must be in the range 1-{MAX_TOP_K}."),
			});
		}

		let context = match req.session_id.as_deref().map(str::trim) {
			Some(session_id) if !session_id.is_empty() =>
				match self.sessions.get_context(session_id).await {
					Ok(context) => context,
					Err(err) => {
						tracing::warn!(
							error = %err,
							trace_id = %trace_id,
							"Session context lookup failed. Continuing without context."
						);

						SessionContext::default()
					},
				},
			_ => SessionContext::default(),
		};
		let analysis = analyze_query(query);
		let keys = self.cache.as_ref().and_then(|cache| {
			let fingerprint = ContextFingerprint::new(&context, analysis.domain);

			match crate::cache::build_cache_keys(
				query,
				analysis.intent,
				top_k as usize,
				fingerprint,
				cache.settings().pattern_min_chars,
			) {
				Ok(keys) => Some(keys),
				Err(err) => {
					tracing::warn!(
						error = %err,
						trace_id = %trace_id,
						"Cache key derivation failed."
					);

					None
				},
			}
		});

		Ok(Prepared {
			trace_id,
			query: query.to_string(),
			started,
			top_k,
			analysis,
			context,
			keys,
			timings: RetrieveTimings::default(),
		})
	}

	fn cached_response(&self, prepared: &mut Prepared) -> Option<RetrieveResponse> {
		let (Some(cache), Some(keys)) = (self.cache.as_ref(), prepared.keys.as_ref()) else {
			return None;
		};
		let stage = Instant::now();
		let hit = cache.lookup::<CachedRetrieval>(keys);

		prepared.timings.cache_lookup_ms = elapsed_ms(stage);

		let hit = hit?;

		prepared.timings.total_ms = elapsed_ms(prepared.started);

		tracing::debug!(
			trace_id = %prepared.trace_id,
			tier = hit.tier.as_str(),
			kind = ?hit.kind,
			"Served retrieval from cache."
		);

		let source = (hit.tier, hit.kind);

		Some(self.respond(prepared, hit.value, Some(source)))
	}

	/// Transient lexical failures are not cached, so a later call can return the hybrid result.
	fn store(&self, prepared: &Prepared, cached: &CachedRetrieval) {
		let (Some(cache), Some(keys)) = (self.cache.as_ref(), prepared.keys.as_ref()) else {
			return;
		};

		if matches!(
			cached.degradation,
			Some(Degradation::LexicalTimeout { .. } | Degradation::LexicalFailed { .. })
		) {
			tracing::debug!(trace_id = %prepared.trace_id, "Skipped caching a degraded result.");

			return;
		}

		cache.store(keys, cached);
	}

	fn respond(
		&self,
		prepared: &Prepared,
		cached: CachedRetrieval,
		source: Option<(Tier, KeyKind)>,
	) -> RetrieveResponse {
		RetrieveResponse {
			items: cached.items,
			confidence: cached.confidence,
			suggestions: self.query_suggestions(&prepared.query),
			diagnostics: RetrieveDiagnostics {
				trace_id: prepared.trace_id,
				search_method: cached.search_method,
				from_cache: source.is_some(),
				cache_tier: source.map(|(tier, _)| tier),
				cache_key_kind: source.map(|(_, kind)| kind),
				degradation: cached.degradation,
				intent: prepared.analysis.intent,
				strategy: prepared.analysis.strategy,
				domain: prepared.analysis.domain,
				weights: cached.weights,
				compressed_query: cached.compressed_query,
				top_k: prepared.top_k,
				timings: prepared.timings,
			},
		}
	}
}
