use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use medrag_config::EmbeddingProviderConfig;

/// OpenAI-compatible `/embeddings` client.
#[derive(Clone, Debug)]
pub struct HttpEmbedder {
	client: Client,
	cfg: EmbeddingProviderConfig,
}
impl HttpEmbedder {
	pub fn new(cfg: EmbeddingProviderConfig) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { client, cfg })
	}

	pub fn dimensions(&self) -> usize {
		self.cfg.dimensions as usize
	}

	pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let url = format!("{}{}", self.cfg.api_base, self.cfg.path);
		let body = serde_json::json!({
			"model": self.cfg.model,
			"input": texts,
			"dimensions": self.cfg.dimensions,
		});
		let res = self
			.client
			.post(url)
			.headers(crate::auth_headers(&self.cfg.api_key, &self.cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;
		let vectors = parse_embedding_response(json)?;

		if vectors.len() != texts.len() {
			return Err(Error::InvalidResponse {
				message: format!(
					"Embedding response returned {} vectors for {} inputs.",
					vectors.len(),
					texts.len()
				),
			});
		}
		if let Some(vec) = vectors.iter().find(|vec| vec.len() != self.dimensions()) {
			return Err(Error::InvalidResponse {
				message: format!(
					"Embedding dimension mismatch: expected {}, got {}.",
					self.dimensions(),
					vec.len()
				),
			});
		}

		Ok(vectors)
	}
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Embedding response is missing data array.".to_string() }
	})?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
			Error::InvalidResponse {
				message: "Embedding item missing embedding array.".to_string(),
			}
		})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_embeddings_in_index_order() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let parsed = parse_embedding_response(json).expect("Failed to parse embeddings.");

		assert_eq!(parsed, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
	}

	#[test]
	fn rejects_non_numeric_values() {
		let json = serde_json::json!({ "data": [{ "embedding": ["x"] }] });
		let err = parse_embedding_response(json).expect_err("Expected invalid response.");

		assert!(matches!(err, Error::InvalidResponse { .. }));
	}
}
