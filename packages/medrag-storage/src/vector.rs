use std::cmp::Ordering;

use crate::{Error, Result};

/// Brute-force cosine index kept in memory. Returns cosine distance, `1 - similarity`.
#[derive(Clone, Debug, Default)]
pub struct MemoryVectorIndex {
	dimensions: usize,
	entries: Vec<(u64, Vec<f32>)>,
}
impl MemoryVectorIndex {
	pub fn new(dimensions: usize) -> Self {
		Self { dimensions, entries: Vec::new() }
	}

	pub fn dimensions(&self) -> usize {
		self.dimensions
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn insert(&mut self, id: u64, vector: Vec<f32>) -> Result<()> {
		self.check_dimensions(&vector)?;

		match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
			Some(entry) => entry.1 = vector,
			None => self.entries.push((id, vector)),
		}

		Ok(())
	}

	/// The `k` nearest entries as `(id, distance)`, nearest first, ties by id.
	pub fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
		self.check_dimensions(vector)?;

		if vector.iter().any(|value| !value.is_finite()) {
			return Err(Error::InvalidArgument("Query vector must be finite.".to_string()));
		}

		let mut hits: Vec<(u64, f32)> = self
			.entries
			.iter()
			.map(|(id, stored)| (*id, 1.0 - cosine_similarity(vector, stored)))
			.collect();

		hits.sort_by(|left, right| {
			left.1
				.partial_cmp(&right.1)
				.unwrap_or(Ordering::Equal)
				.then_with(|| left.0.cmp(&right.0))
		});
		hits.truncate(k);

		Ok(hits)
	}

	fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
		if vector.len() != self.dimensions {
			return Err(Error::InvalidArgument(format!(
				"Vector dimension mismatch: expected {}, got {}.",
				self.dimensions,
				vector.len()
			)));
		}

		Ok(())
	}
}

/// Zero vectors have similarity 0 with everything.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
	let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
	let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
	let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

	if left_norm <= f32::EPSILON || right_norm <= f32::EPSILON {
		return 0.0;
	}

	(dot / (left_norm * right_norm)).clamp(-1.0, 1.0)
}
