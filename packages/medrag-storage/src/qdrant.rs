use qdrant_client::qdrant::{
	PointId, Query, QueryPointsBuilder, ScoredPoint, point_id::PointIdOptions,
};

use crate::{Error, Result};

/// Dense search against a Qdrant collection populated with numeric passage ids and a cosine
/// vector. Qdrant reports cosine similarity, which is converted back to distance.
pub struct QdrantVectorIndex {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantVectorIndex {
	pub fn new(cfg: &medrag_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Vector dimension mismatch: expected {}, got {}.",
				self.vector_dim,
				vector.len()
			)));
		}

		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.limit(k as u64)
			.with_payload(false);
		let response = self.client.query(search).await?;

		Ok(hits_from_points(response.result))
	}
}

pub fn hits_from_points(points: Vec<ScoredPoint>) -> Vec<(u64, f32)> {
	let mut hits = Vec::with_capacity(points.len());

	for point in points {
		let Some(id) = point.id.as_ref().and_then(point_id_to_u64) else {
			tracing::warn!(point_id = ?point.id, "Skipping Qdrant point without a numeric id.");

			continue;
		};

		hits.push((id, 1.0 - point.score));
	}

	hits
}

fn point_id_to_u64(point_id: &PointId) -> Option<u64> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Num(id)) => Some(*id),
		Some(PointIdOptions::Uuid(text)) => text.parse().ok(),
		None => None,
	}
}
