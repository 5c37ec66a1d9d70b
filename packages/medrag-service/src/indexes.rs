//! Trait adapters for the concrete embedders and indexes, and config-driven assembly.

use std::sync::Arc;

use crate::{BoxFuture, Embedder, Error, LexicalIndex, Result, VectorIndex};
use medrag_config::Config;
use medrag_providers::{HashEmbedder, HttpEmbedder};
use medrag_storage::{Bm25Index, Bm25Params, Corpus, MemoryVectorIndex, QdrantVectorIndex};

#[derive(Clone)]
pub struct Indexes {
	pub embedder: Arc<dyn Embedder>,
	pub vector: Arc<dyn VectorIndex>,
	pub lexical: Arc<dyn LexicalIndex>,
}
impl Indexes {
	pub fn new(
		embedder: Arc<dyn Embedder>,
		vector: Arc<dyn VectorIndex>,
		lexical: Arc<dyn LexicalIndex>,
	) -> Self {
		Self { embedder, vector, lexical }
	}

	/// Embeds every passage into an in-memory vector index and builds BM25 over the corpus.
	pub async fn in_memory(
		corpus: &Corpus,
		embedder: Arc<dyn Embedder>,
		dimensions: usize,
		params: Bm25Params,
	) -> Result<Self> {
		let mut vector = MemoryVectorIndex::new(dimensions);

		for passage in corpus.passages() {
			let embedding = embedder.embed(&passage.text).await?;

			vector.insert(passage.id, embedding)?;
		}

		tracing::debug!(passages = vector.len(), dimensions, "Built in-memory vector index.");

		Ok(Self::new(embedder, Arc::new(vector), Arc::new(Bm25Index::build(corpus, params))))
	}

	pub async fn from_config(cfg: &Config, corpus: &Corpus) -> Result<Self> {
		let (embedder, dimensions): (Arc<dyn Embedder>, usize) =
			match cfg.providers.embedder.as_str() {
				"hash" => {
					let embedder = HashEmbedder::new(cfg.providers.hash_dimensions as usize);
					let dimensions = embedder.dimensions();

					(Arc::new(embedder), dimensions)
				},
				"http" => {
					let Some(embedding) = cfg.providers.embedding.clone() else {
						return Err(Error::InvalidRequest {
							message: "providers.embedding is required for the http embedder."
								.to_string(),
						});
					};
					let embedder = HttpEmbedder::new(embedding)?;
					let dimensions = embedder.dimensions();

					(Arc::new(embedder), dimensions)
				},
				other => {
					return Err(Error::InvalidRequest {
						message: format!("Unknown embedder {other:?}."),
					});
				},
			};
		let params = Bm25Params::from(&cfg.lexical);

		match cfg.storage.vector_backend.as_str() {
			"memory" => Self::in_memory(corpus, embedder, dimensions, params).await,
			"qdrant" => {
				let Some(qdrant) = cfg.storage.qdrant.as_ref() else {
					return Err(Error::InvalidRequest {
						message: "storage.qdrant is required for the qdrant backend.".to_string(),
					});
				};
				let vector = QdrantVectorIndex::new(qdrant).map_err(|err| {
					Error::IndexUnavailable { index: "semantic", message: err.to_string() }
				})?;

				let lexical = Bm25Index::build(corpus, params);

				Ok(Self::new(embedder, Arc::new(vector), Arc::new(lexical)))
			},
			other => Err(Error::InvalidRequest {
				message: format!("Unknown vector backend {other:?}."),
			}),
		}
	}
}

impl Embedder for HashEmbedder {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(self.embed_one(text)) })
	}
}

impl Embedder for HttpEmbedder {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			let mut vectors = HttpEmbedder::embed(self, &[text.to_string()]).await?;

			vectors.pop().ok_or_else(|| Error::Provider {
				message: "Embedding response contained no vectors.".to_string(),
			})
		})
	}
}

impl VectorIndex for MemoryVectorIndex {
	fn search<'a>(&'a self, vector: &'a [f32], k: usize) -> BoxFuture<'a, Result<Vec<(u64, f32)>>> {
		Box::pin(async move {
			MemoryVectorIndex::search(self, vector, k).map_err(semantic_unavailable)
		})
	}
}

impl VectorIndex for QdrantVectorIndex {
	fn search<'a>(&'a self, vector: &'a [f32], k: usize) -> BoxFuture<'a, Result<Vec<(u64, f32)>>> {
		Box::pin(async move {
			QdrantVectorIndex::search(self, vector, k).await.map_err(semantic_unavailable)
		})
	}
}

impl LexicalIndex for Bm25Index {
	fn score<'a>(&'a self, tokens: &'a [String]) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(Bm25Index::score(self, tokens)) })
	}
}

fn semantic_unavailable(err: medrag_storage::Error) -> Error {
	Error::IndexUnavailable { index: "semantic", message: err.to_string() }
}

#[cfg(test)]
mod tests {
	use super::*;
	use medrag_storage::{Passage, PassageMetadata};

	fn corpus() -> Corpus {
		Corpus::new(vec![
			Passage {
				id: 1,
				text: "Đau đầu kèm chóng mặt thường do thiếu máu não.".to_string(),
				metadata: PassageMetadata::default(),
			},
			Passage {
				id: 2,
				text: "Tiểu đường type 2 cần kiểm soát đường huyết.".to_string(),
				metadata: PassageMetadata::default(),
			},
		])
		.expect("Failed to build corpus.")
	}

	#[tokio::test]
	async fn in_memory_indexes_answer_through_the_traits() {
		let corpus = corpus();
		let indexes = Indexes::in_memory(
			&corpus,
			Arc::new(HashEmbedder::new(256)),
			256,
			Bm25Params::default(),
		)
		.await
		.expect("Failed to build indexes.");
		let vector = indexes.embedder.embed("tiểu đường").await.expect("Failed to embed.");
		let hits = indexes.vector.search(&vector, 1).await.expect("Failed to search.");
		let scores = indexes
			.lexical
			.score(&["tiểu".to_string(), "đường".to_string()])
			.await
			.expect("Failed to score.");

		assert_eq!(hits[0].0, 2);
		assert_eq!(scores.len(), 2);
		assert!(scores[1] > scores[0]);
	}

	#[tokio::test]
	async fn dimension_mismatch_is_an_unavailable_index() {
		let index = MemoryVectorIndex::new(4);
		let err = VectorIndex::search(&index, &[1.0, 0.0], 3)
			.await
			.expect_err("Expected a dimension error.");

		assert!(matches!(err, Error::IndexUnavailable { index: "semantic", .. }));
	}
}
