pub mod cache;
pub mod compress;
pub mod confidence;
pub mod fusion;
pub mod indexes;
pub mod performance;
pub mod rerank;
pub mod retrieval;
pub mod retrieve;

mod error;

pub use cache::{CacheStats, Clock, ManualClock, MultiTierCache, SystemClock, Tier};
pub use compress::{CompressedQuery, QueryCompressor};
pub use confidence::{ConfidenceBreakdown, ConfidenceLevel, ConfidenceScorer};
pub use error::{Error, Result};
pub use fusion::FusionWeights;
pub use indexes::Indexes;
pub use performance::{PerformanceStats, PerformanceTracker, QueryMetrics, Recommendation};
pub use retrieval::{
	Degradation, DualIndexRetriever, MatchSource, RetrievalCandidate, SearchMethod, WorkerPool,
};
pub use retrieve::{RetrieveDiagnostics, RetrieveRequest, RetrieveResponse, RetrieveTimings};

use std::{cmp::Ordering, future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Serialize};

use medrag_config::Config;
use medrag_storage::Corpus;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait Embedder
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;
}

/// Nearest-neighbour search returning `(passage_id, cosine_distance)` pairs, closest first.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, vector: &'a [f32], k: usize) -> BoxFuture<'a, Result<Vec<(u64, f32)>>>;
}

/// Scores every passage in corpus order.
pub trait LexicalIndex
where
	Self: Send + Sync,
{
	fn score<'a>(&'a self, tokens: &'a [String]) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait SessionContextProvider
where
	Self: Send + Sync,
{
	fn get_context<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<SessionContext>>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
	pub mentioned_entities: Vec<String>,
	pub turn_count: u32,
}
impl SessionContext {
	pub fn has_history(&self) -> bool {
		self.turn_count > 0 || !self.mentioned_entities.is_empty()
	}
}

/// Session provider for deployments without conversation state.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSessionContext;
impl SessionContextProvider for NoSessionContext {
	fn get_context<'a>(&'a self, _session_id: &'a str) -> BoxFuture<'a, Result<SessionContext>> {
		Box::pin(async { Ok(SessionContext::default()) })
	}
}

pub struct MedragService {
	pub cfg: Config,
	pub corpus: Arc<Corpus>,
	pub compressor: QueryCompressor,
	pub retriever: DualIndexRetriever,
	pub cache: Option<Arc<MultiTierCache>>,
	pub confidence: ConfidenceScorer,
	pub sessions: Arc<dyn SessionContextProvider>,
	pub performance: Option<PerformanceTracker>,
}
impl MedragService {
	/// Service with a private system-clock cache and no session state.
	pub fn new(cfg: Config, corpus: Arc<Corpus>, indexes: Indexes) -> Self {
		let cache = cfg
			.cache
			.enabled
			.then(|| Arc::new(MultiTierCache::new(&cfg.cache, Arc::new(SystemClock))));

		Self::with_parts(cfg, corpus, indexes, cache, Arc::new(NoSessionContext))
	}

	pub fn with_parts(
		cfg: Config,
		corpus: Arc<Corpus>,
		indexes: Indexes,
		cache: Option<Arc<MultiTierCache>>,
		sessions: Arc<dyn SessionContextProvider>,
	) -> Self {
		let retriever = DualIndexRetriever::new(
			indexes.embedder,
			indexes.vector,
			indexes.lexical,
			Arc::clone(&corpus),
			WorkerPool::from_config(&cfg.retrieval),
			retrieval::BranchTimeouts::from(&cfg.retrieval),
		);

		Self {
			compressor: QueryCompressor::new(&cfg.compression),
			confidence: ConfidenceScorer::new(cfg.confidence.clone()),
			performance: cfg
				.performance
				.enabled
				.then(|| PerformanceTracker::new(cfg.performance.clone())),
			cfg,
			corpus,
			retriever,
			cache,
			sessions,
		}
	}

	pub fn cache_stats(&self) -> Option<CacheStats> {
		self.cache.as_ref().map(|cache| cache.stats())
	}

	pub fn clear_cache(&self) {
		if let Some(cache) = self.cache.as_ref() {
			cache.clear();
		}
	}

	pub fn performance_stats(&self) -> Option<PerformanceStats> {
		self.performance.as_ref().and_then(PerformanceTracker::stats)
	}

	/// Follow-up queries for `query`; empty when suggestions are disabled.
	pub fn query_suggestions(&self, query: &str) -> Vec<String> {
		if !self.cfg.suggestions.enabled {
			return Vec::new();
		}

		medrag_domain::query_suggestions(query, self.cfg.suggestions.max_suggestions)
	}
}

/// Descending order with NaN last.
pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
