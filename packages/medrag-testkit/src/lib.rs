//! Fixtures and scripted index fakes shared by the workspace's integration tests.

mod error;

pub use error::{Error, Result};

use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use medrag_config::Config;
use medrag_providers::HashEmbedder;
use medrag_service::{
	BoxFuture, Embedder, Error as ServiceError, Indexes, LexicalIndex, ManualClock,
	MedragService, MultiTierCache, SessionContext, SessionContextProvider, VectorIndex,
};
use medrag_storage::{Bm25Params, Corpus, Passage};

const SAMPLE_CONFIG: &str = include_str!("../fixtures/sample_config.toml");
const SAMPLE_CORPUS: &str = include_str!("../fixtures/sample_corpus.json");

pub fn fixtures_dir() -> PathBuf {
	Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

pub fn sample_config() -> Result<Config> {
	Ok(medrag_config::parse(&fixtures_dir().join("sample_config.toml"), SAMPLE_CONFIG)?)
}

pub fn sample_passages() -> Result<Vec<Passage>> {
	serde_json::from_str(SAMPLE_CORPUS)
		.map_err(|err| Error::Message(format!("Failed to parse sample corpus: {err}.")))
}

pub fn sample_corpus() -> Result<Arc<Corpus>> {
	Ok(Arc::new(Corpus::new(sample_passages()?)?))
}

/// Hash embedder, in-memory vectors and BM25 over `corpus`.
pub async fn hash_indexes(cfg: &Config, corpus: &Corpus) -> Result<Indexes> {
	let dimensions = cfg.providers.hash_dimensions as usize;
	let indexes = Indexes::in_memory(
		corpus,
		Arc::new(HashEmbedder::new(dimensions)),
		dimensions,
		Bm25Params::from(&cfg.lexical),
	)
	.await?;

	Ok(indexes)
}

/// Service over a cache driven by `clock`, so tests control expiry.
pub fn service_with_clock(
	cfg: Config,
	corpus: Arc<Corpus>,
	indexes: Indexes,
	clock: Arc<ManualClock>,
) -> MedragService {
	let cache = Arc::new(MultiTierCache::new(&cfg.cache, clock));

	let sessions = Arc::new(StaticSessions::default());

	MedragService::with_parts(cfg, corpus, indexes, Some(cache), sessions)
}

/// Embedder that returns the same vector for every text.
pub struct FixedEmbedder {
	vector: Vec<f32>,
}
impl FixedEmbedder {
	pub fn new(vector: Vec<f32>) -> Self {
		Self { vector }
	}
}
impl Embedder for FixedEmbedder {
	fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, medrag_service::Result<Vec<f32>>> {
		Box::pin(async move { Ok(self.vector.clone()) })
	}
}

/// Vector index with scripted `(passage_id, distance)` hits, ignoring the query vector.
pub struct FixedVectorIndex {
	hits: Vec<(u64, f32)>,
}
impl FixedVectorIndex {
	pub fn new(hits: Vec<(u64, f32)>) -> Self {
		Self { hits }
	}

	/// Hits from similarities; the index reports distance `1 - similarity`.
	pub fn from_similarities(similarities: &[(u64, f32)]) -> Self {
		Self::new(similarities.iter().map(|(id, similarity)| (*id, 1.0 - similarity)).collect())
	}
}
impl VectorIndex for FixedVectorIndex {
	fn search<'a>(
		&'a self,
		_vector: &'a [f32],
		k: usize,
	) -> BoxFuture<'a, medrag_service::Result<Vec<(u64, f32)>>> {
		Box::pin(async move { Ok(self.hits.iter().copied().take(k).collect()) })
	}
}

/// Lexical index with scripted per-passage scores in corpus order.
pub struct FixedLexicalIndex {
	scores: Vec<f32>,
}
impl FixedLexicalIndex {
	pub fn new(scores: Vec<f32>) -> Self {
		Self { scores }
	}

	/// Zero for every passage of a corpus with `len` passages.
	pub fn zeros(len: usize) -> Self {
		Self::new(vec![0.0; len])
	}
}
impl LexicalIndex for FixedLexicalIndex {
	fn score<'a>(
		&'a self,
		_tokens: &'a [String],
	) -> BoxFuture<'a, medrag_service::Result<Vec<f32>>> {
		Box::pin(async move { Ok(self.scores.clone()) })
	}
}

/// Sleeps before delegating. Pair with a paused tokio clock.
pub struct Delayed<T> {
	inner: T,
	delay: Duration,
}
impl<T> Delayed<T> {
	pub fn new(inner: T, delay: Duration) -> Self {
		Self { inner, delay }
	}
}
impl<T> Embedder for Delayed<T>
where
	T: Embedder,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, medrag_service::Result<Vec<f32>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			self.inner.embed(text).await
		})
	}
}
impl<T> VectorIndex for Delayed<T>
where
	T: VectorIndex,
{
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		k: usize,
	) -> BoxFuture<'a, medrag_service::Result<Vec<(u64, f32)>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			self.inner.search(vector, k).await
		})
	}
}
impl<T> LexicalIndex for Delayed<T>
where
	T: LexicalIndex,
{
	fn score<'a>(
		&'a self,
		tokens: &'a [String],
	) -> BoxFuture<'a, medrag_service::Result<Vec<f32>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			self.inner.score(tokens).await
		})
	}
}

/// Fails every call with `IndexUnavailable`.
pub struct Failing {
	index: &'static str,
	message: String,
}
impl Failing {
	pub fn new(index: &'static str, message: impl Into<String>) -> Self {
		Self { index, message: message.into() }
	}

	fn error(&self) -> ServiceError {
		ServiceError::IndexUnavailable { index: self.index, message: self.message.clone() }
	}
}
impl Embedder for Failing {
	fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, medrag_service::Result<Vec<f32>>> {
		Box::pin(async move { Err(self.error()) })
	}
}
impl VectorIndex for Failing {
	fn search<'a>(
		&'a self,
		_vector: &'a [f32],
		_k: usize,
	) -> BoxFuture<'a, medrag_service::Result<Vec<(u64, f32)>>> {
		Box::pin(async move { Err(self.error()) })
	}
}
impl LexicalIndex for Failing {
	fn score<'a>(
		&'a self,
		_tokens: &'a [String],
	) -> BoxFuture<'a, medrag_service::Result<Vec<f32>>> {
		Box::pin(async move { Err(self.error()) })
	}
}

/// Counts calls that reach the wrapped index.
pub struct Counting<T> {
	inner: T,
	calls: Arc<AtomicUsize>,
}
impl<T> Counting<T> {
	pub fn new(inner: T) -> (Self, Arc<AtomicUsize>) {
		let calls = Arc::new(AtomicUsize::new(0));

		(Self { inner, calls: Arc::clone(&calls) }, calls)
	}
}
impl<T> VectorIndex for Counting<T>
where
	T: VectorIndex,
{
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		k: usize,
	) -> BoxFuture<'a, medrag_service::Result<Vec<(u64, f32)>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		self.inner.search(vector, k)
	}
}
impl<T> LexicalIndex for Counting<T>
where
	T: LexicalIndex,
{
	fn score<'a>(
		&'a self,
		tokens: &'a [String],
	) -> BoxFuture<'a, medrag_service::Result<Vec<f32>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		self.inner.score(tokens)
	}
}

/// Session provider backed by a fixed map. Unknown sessions have empty context.
#[derive(Default)]
pub struct StaticSessions {
	sessions: HashMap<String, SessionContext>,
}
impl StaticSessions {
	pub fn with_session(mut self, session_id: &str, context: SessionContext) -> Self {
		self.sessions.insert(session_id.to_string(), context);

		self
	}
}
impl SessionContextProvider for StaticSessions {
	fn get_context<'a>(
		&'a self,
		session_id: &'a str,
	) -> BoxFuture<'a, medrag_service::Result<SessionContext>> {
		Box::pin(async move { Ok(self.sessions.get(session_id).cloned().unwrap_or_default()) })
	}
}
