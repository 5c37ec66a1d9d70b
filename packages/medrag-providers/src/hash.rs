//! Deterministic bag-of-words embedder. Needs no model or network, so it backs local runs,
//! the evaluation harness, and tests.

use medrag_domain::NormalizedText;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

#[derive(Clone, Debug)]
pub struct HashEmbedder {
	dimensions: usize,
}
impl HashEmbedder {
	/// `dimensions` is clamped to at least one.
	pub fn new(dimensions: usize) -> Self {
		Self { dimensions: dimensions.max(1) }
	}

	pub fn dimensions(&self) -> usize {
		self.dimensions
	}

	/// Unigrams and adjacent bigrams of the normalized text, each hashed to one signed
	/// dimension. The result is L2-normalized; text without tokens embeds to all zeros.
	pub fn embed_one(&self, text: &str) -> Vec<f32> {
		let normalized = NormalizedText::new(text);
		let tokens = normalized.tokens();
		let mut embedding = vec![0.0_f32; self.dimensions];

		for token in tokens {
			self.accumulate(&mut embedding, token.as_bytes(), 1.0);
		}
		for pair in tokens.windows(2) {
			let bigram = format!("{} {}", pair[0], pair[1]);

			self.accumulate(&mut embedding, bigram.as_bytes(), 0.5);
		}

		l2_normalize(&mut embedding);

		embedding
	}

	pub fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
		texts.iter().map(|text| self.embed_one(text)).collect()
	}

	fn accumulate(&self, embedding: &mut [f32], bytes: &[u8], weight: f32) {
		let hash = fnv1a_hash(bytes);
		let index = (hash % self.dimensions as u64) as usize;
		let sign = if hash >> 63 == 1 { 1.0 } else { -1.0 };

		embedding[index] += sign * weight;
	}
}

pub fn fnv1a_hash(bytes: &[u8]) -> u64 {
	let mut hash = FNV_OFFSET;

	for byte in bytes {
		hash ^= u64::from(*byte);
		hash = hash.wrapping_mul(FNV_PRIME);
	}

	hash
}

fn l2_normalize(vec: &mut [f32]) {
	let norm = vec.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm > f32::EPSILON {
		vec.iter_mut().for_each(|value| *value /= norm);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fnv_matches_reference_values() {
		assert_eq!(fnv1a_hash(b""), FNV_OFFSET);
		assert_eq!(fnv1a_hash(b"a"), 0xaf63_dc4c_8601_ec8c);
	}

	#[test]
	fn empty_text_embeds_to_zeros() {
		let embedder = HashEmbedder::new(8);

		assert_eq!(embedder.embed_one("  ?! "), vec![0.0; 8]);
	}
}
