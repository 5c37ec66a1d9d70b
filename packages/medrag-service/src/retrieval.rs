//! Dual-index retrieval: semantic and lexical lookups run side by side on the worker pool,
//! each under its own timeout.

use std::{
	future::Future,
	sync::Arc,
	time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinHandle};

use crate::{CompressedQuery, Embedder, Error, LexicalIndex, Result, VectorIndex};
use medrag_storage::{Corpus, Passage};

const MIN_POOL_SIZE: usize = 3;
const MAX_POOL_SIZE: usize = 6;

/// Which branches produced a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
	Hybrid,
	Semantic,
	Keyword,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
	Hybrid,
	SemanticOnly,
}
impl SearchMethod {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Hybrid => "hybrid",
			Self::SemanticOnly => "semantic_only",
		}
	}
}

/// Why the lexical branch did not contribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Degradation {
	LexicalTimeout { timeout_ms: u64 },
	LexicalFailed { message: String },
	LexicalNoHits,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
	pub passage: Arc<Passage>,
	pub semantic_score: f32,
	pub lexical_score: f32,
	pub norm_semantic: f32,
	pub norm_lexical: f32,
	pub domain_boost: f32,
	pub fused_score: f32,
	pub search_method: MatchSource,
	/// Set by the relevance stage, which also replaces `fused_score` with its blended score.
	#[serde(default)]
	pub medical_relevance: Option<f32>,
}
impl RetrievalCandidate {
	pub fn semantic(passage: Arc<Passage>, score: f32) -> Self {
		Self::new(passage, score, 0.0, MatchSource::Semantic)
	}

	pub fn lexical(passage: Arc<Passage>, score: f32) -> Self {
		Self::new(passage, 0.0, score, MatchSource::Keyword)
	}

	pub fn id(&self) -> u64 {
		self.passage.id
	}

	fn new(passage: Arc<Passage>, semantic: f32, lexical: f32, source: MatchSource) -> Self {
		Self {
			passage,
			semantic_score: semantic,
			lexical_score: lexical,
			norm_semantic: 0.0,
			norm_lexical: 0.0,
			domain_boost: 1.0,
			fused_score: 0.0,
			search_method: source,
			medical_relevance: None,
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchTimings {
	pub embed_ms: f64,
	pub semantic_ms: f64,
	pub lexical_ms: f64,
}

#[derive(Clone, Debug)]
pub struct RetrievalOutcome {
	pub semantic: Vec<RetrievalCandidate>,
	pub lexical: Vec<RetrievalCandidate>,
	pub search_method: SearchMethod,
	pub degradation: Option<Degradation>,
	pub timings: BranchTimings,
}

#[derive(Clone, Copy, Debug)]
pub struct BranchTimeouts {
	pub semantic: Duration,
	pub lexical: Duration,
}
impl From<&medrag_config::Retrieval> for BranchTimeouts {
	fn from(cfg: &medrag_config::Retrieval) -> Self {
		Self {
			semantic: Duration::from_millis(cfg.semantic_timeout_ms),
			lexical: Duration::from_millis(cfg.lexical_timeout_ms),
		}
	}
}

/// Process-wide bound on concurrently running retrieval branches.
#[derive(Clone, Debug)]
pub struct WorkerPool {
	permits: Arc<Semaphore>,
	size: usize,
}
impl WorkerPool {
	pub fn new(size: usize) -> Self {
		let size = size.max(1);

		Self { permits: Arc::new(Semaphore::new(size)), size }
	}

	/// Configured size, or available parallelism clamped to 3..=6.
	pub fn from_config(cfg: &medrag_config::Retrieval) -> Self {
		let size = cfg.worker_pool_size.unwrap_or_else(|| {
			std::thread::available_parallelism()
				.map(|cores| cores.get())
				.unwrap_or(MIN_POOL_SIZE)
				.clamp(MIN_POOL_SIZE, MAX_POOL_SIZE)
		});

		Self::new(size)
	}

	pub fn size(&self) -> usize {
		self.size
	}

	pub fn available(&self) -> usize {
		self.permits.available_permits()
	}

	/// Runs `task` once a permit is free. Dropping the returned handle aborts the task and
	/// releases its permit.
	pub fn spawn<F, T>(&self, task: F) -> BranchHandle<T>
	where
		F: Future<Output = Result<T>> + Send + 'static,
		T: Send + 'static,
	{
		let permits = Arc::clone(&self.permits);
		let handle = tokio::spawn(async move {
			let Ok(_permit) = permits.acquire_owned().await else {
				return Err(Error::Cancelled);
			};

			task.await
		});

		BranchHandle { handle }
	}
}

pub struct BranchHandle<T> {
	handle: JoinHandle<Result<T>>,
}
impl<T> BranchHandle<T> {
	pub async fn join(mut self) -> Result<T> {
		match (&mut self.handle).await {
			Ok(result) => result,
			Err(err) if err.is_cancelled() => Err(Error::Cancelled),
			Err(err) => Err(Error::Storage { message: format!("Retrieval task failed: {err}") }),
		}
	}
}
impl<T> Drop for BranchHandle<T> {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

struct SemanticHits {
	hits: Vec<(u64, f32)>,
	embed_ms: f64,
	search_ms: f64,
}

pub struct DualIndexRetriever {
	embedder: Arc<dyn Embedder>,
	vector: Arc<dyn VectorIndex>,
	lexical: Arc<dyn LexicalIndex>,
	corpus: Arc<Corpus>,
	pool: WorkerPool,
	timeouts: BranchTimeouts,
}
impl DualIndexRetriever {
	pub fn new(
		embedder: Arc<dyn Embedder>,
		vector: Arc<dyn VectorIndex>,
		lexical: Arc<dyn LexicalIndex>,
		corpus: Arc<Corpus>,
		pool: WorkerPool,
		timeouts: BranchTimeouts,
	) -> Self {
		Self { embedder, vector, lexical, corpus, pool, timeouts }
	}

	pub fn pool(&self) -> &WorkerPool {
		&self.pool
	}

	/// Returns at most `limit` candidates per branch. Semantic failure is returned as an error;
	/// lexical failure degrades to semantic-only.
	pub async fn retrieve(
		&self,
		query: &CompressedQuery,
		limit: usize,
	) -> Result<RetrievalOutcome> {
		let text = query.search_text().to_string();
		let tokens = medrag_domain::tokenize(&text);
		let semantic = {
			let embedder = Arc::clone(&self.embedder);
			let vector = Arc::clone(&self.vector);

			self.pool.spawn(async move {
				let started = Instant::now();
				let embedding = embedder.embed(&text).await?;
				let embed_ms = elapsed_ms(started);
				let started = Instant::now();
				let hits = vector.search(&embedding, limit).await?;

				Ok(SemanticHits { hits, embed_ms, search_ms: elapsed_ms(started) })
			})
		};
		let lexical = {
			let lexical = Arc::clone(&self.lexical);

			self.pool.spawn(async move {
				let started = Instant::now();
				let scores = lexical.score(&tokens).await?;

				Ok((scores, elapsed_ms(started)))
			})
		};
		let (semantic, lexical) = tokio::join!(
			tokio::time::timeout(self.timeouts.semantic, semantic.join()),
			tokio::time::timeout(self.timeouts.lexical, lexical.join()),
		);
		let semantic = match semantic {
			Ok(Ok(hits)) => hits,
			Ok(Err(err)) => return Err(err),
			Err(_) =>
				return Err(Error::Timeout {
					stage: "semantic",
					elapsed_ms: self.timeouts.semantic.as_millis() as u64,
				}),
		};
		let mut timings = BranchTimings {
			embed_ms: semantic.embed_ms,
			semantic_ms: semantic.search_ms,
			lexical_ms: 0.0,
		};
		let semantic = self.semantic_candidates(semantic.hits, limit);
		let lexical = match lexical {
			Ok(Ok((scores, lexical_ms))) => {
				timings.lexical_ms = lexical_ms;

				self.lexical_candidates(&scores, limit)
			},
			Ok(Err(Error::Cancelled)) => return Err(Error::Cancelled),
			Ok(Err(err)) => Err(Degradation::LexicalFailed { message: err.to_string() }),
			Err(_) => Err(Degradation::LexicalTimeout {
				timeout_ms: self.timeouts.lexical.as_millis() as u64,
			}),
		};

		match lexical {
			Ok(lexical) if !lexical.is_empty() => Ok(RetrievalOutcome {
				semantic,
				lexical,
				search_method: SearchMethod::Hybrid,
				degradation: None,
				timings,
			}),
			Ok(_) => Ok(degraded(semantic, Degradation::LexicalNoHits, timings)),
			Err(degradation) => Ok(degraded(semantic, degradation, timings)),
		}
	}

	fn semantic_candidates(&self, hits: Vec<(u64, f32)>, limit: usize) -> Vec<RetrievalCandidate> {
		let mut candidates = Vec::with_capacity(hits.len().min(limit));

		for (id, distance) in hits {
			let Some(passage) = self.corpus.get(id) else {
				tracing::warn!(passage_id = id, "Vector index returned an unknown passage.");

				continue;
			};

			candidates.push(RetrievalCandidate::semantic(Arc::clone(passage), 1.0 - distance));
		}

		candidates.sort_by(|left, right| {
			crate::cmp_f32_desc(left.semantic_score, right.semantic_score)
				.then_with(|| left.id().cmp(&right.id()))
		});
		candidates.truncate(limit);

		candidates
	}

	fn lexical_candidates(
		&self,
		scores: &[f32],
		limit: usize,
	) -> Result<Vec<RetrievalCandidate>, Degradation> {
		let passages = self.corpus.passages();

		if scores.len() != passages.len() {
			return Err(Degradation::LexicalFailed {
				message: format!(
					"Lexical index returned {} scores for {} passages.",
					scores.len(),
					passages.len()
				),
			});
		}

		let mut scored: Vec<(usize, f32)> = scores
			.iter()
			.copied()
			.enumerate()
			.filter(|(_, score)| score.is_finite() && *score > 0.0)
			.collect();

		scored.sort_by(|left, right| {
			crate::cmp_f32_desc(left.1, right.1)
				.then_with(|| passages[left.0].id.cmp(&passages[right.0].id))
		});
		scored.truncate(limit);

		Ok(scored
			.into_iter()
			.map(|(position, score)| {
				RetrievalCandidate::lexical(Arc::clone(&passages[position]), score)
			})
			.collect())
	}
}

fn degraded(
	semantic: Vec<RetrievalCandidate>,
	degradation: Degradation,
	timings: BranchTimings,
) -> RetrievalOutcome {
	tracing::warn!(?degradation, "Lexical branch degraded to semantic-only retrieval.");

	RetrievalOutcome {
		semantic,
		lexical: Vec::new(),
		search_method: SearchMethod::SemanticOnly,
		degradation: Some(degradation),
		timings,
	}
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
	started.elapsed().as_secs_f64() * 1_000.0
}
