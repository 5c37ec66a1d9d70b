//! Fusion & boost ranking: min-max normalization per branch, union by passage id, domain
//! boost, weighted sum.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CompressedQuery, MatchSource, RetrievalCandidate};
use medrag_config::{StrategyWeights, WeightPreset};
use medrag_domain::{NormalizedText, SearchStrategy, vocabulary::DOMAIN_TERMS};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
	pub semantic: f32,
	pub lexical: f32,
}
impl FusionWeights {
	pub const SEMANTIC_ONLY: Self = Self { semantic: 1.0, lexical: 0.0 };

	pub fn new(semantic: f32, lexical: f32) -> Self {
		Self { semantic, lexical }
	}

	/// Scales to sum 1. Negative or non-finite weights count as zero; all zero gives 0.5/0.5.
	pub fn normalized(self) -> Self {
		let semantic = sanitize_weight(self.semantic);
		let lexical = sanitize_weight(self.lexical);
		let total = semantic + lexical;

		if total <= f32::EPSILON {
			return Self { semantic: 0.5, lexical: 0.5 };
		}

		Self { semantic: semantic / total, lexical: lexical / total }
	}

	pub fn for_strategy(presets: &StrategyWeights, strategy: SearchStrategy) -> Self {
		let preset = match strategy {
			SearchStrategy::Emergency => presets.emergency,
			SearchStrategy::MultiSymptom => presets.multi_symptom,
			SearchStrategy::DiseaseFocused => presets.disease_focused,
			SearchStrategy::TreatmentFocused => presets.treatment_focused,
			SearchStrategy::PreventionFocused => presets.prevention_focused,
			SearchStrategy::General => presets.general,
		};

		Self::from(preset)
	}
}
impl From<WeightPreset> for FusionWeights {
	fn from(preset: WeightPreset) -> Self {
		Self { semantic: preset.semantic, lexical: preset.lexical }
	}
}

/// Domain terms present in the raw or compressed query.
pub fn query_domain_terms(query: &CompressedQuery) -> Vec<&'static str> {
	let original = NormalizedText::new(&query.original);
	let compressed = NormalizedText::new(&query.compressed);

	DOMAIN_TERMS
		.iter()
		.copied()
		.filter(|term| original.contains(term) || compressed.contains(term))
		.collect()
}

/// `1 + max_boost * shared / query_terms`, or 1.0 when the query has no domain terms.
pub fn domain_boost(passage_text: &str, query_terms: &[&str], max_boost: f32) -> f32 {
	if query_terms.is_empty() {
		return 1.0;
	}

	let passage = NormalizedText::new(passage_text);
	let shared = query_terms.iter().filter(|term| passage.contains(term)).count();

	1.0 + max_boost.max(0.0) * shared as f32 / query_terms.len() as f32
}

/// Min-max normalization. When every score is equal the raw score is kept, clamped to
/// `[0, 1]`.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
	let Some(min) = scores.iter().copied().reduce(f32::min) else {
		return Vec::new();
	};
	let max = scores.iter().copied().fold(min, f32::max);
	let range = max - min;

	if range <= f32::EPSILON {
		return scores.iter().map(|score| score.clamp(0.0, 1.0)).collect();
	}

	scores.iter().map(|score| (score - min) / range).collect()
}

pub fn fuse(
	semantic: &[RetrievalCandidate],
	lexical: &[RetrievalCandidate],
	query: &CompressedQuery,
	weights: FusionWeights,
	max_boost: f32,
) -> Vec<RetrievalCandidate> {
	if semantic.is_empty() && lexical.is_empty() {
		return Vec::new();
	}

	let weights = weights.normalized();
	let semantic_norm =
		min_max_normalize(&semantic.iter().map(|c| c.semantic_score).collect::<Vec<_>>());
	let lexical_norm =
		min_max_normalize(&lexical.iter().map(|c| c.lexical_score).collect::<Vec<_>>());
	let mut merged: BTreeMap<u64, RetrievalCandidate> = BTreeMap::new();

	for (candidate, norm) in semantic.iter().zip(semantic_norm) {
		let entry = merged.entry(candidate.id()).or_insert_with(|| candidate.clone());

		entry.semantic_score = candidate.semantic_score;
		entry.norm_semantic = norm;
	}
	for (candidate, norm) in lexical.iter().zip(lexical_norm) {
		match merged.get_mut(&candidate.id()) {
			Some(entry) => {
				entry.lexical_score = candidate.lexical_score;
				entry.norm_lexical = norm;
				entry.search_method = MatchSource::Hybrid;
			},
			None => {
				let mut entry = candidate.clone();

				entry.norm_lexical = norm;

				merged.insert(candidate.id(), entry);
			},
		}
	}

	let query_terms = query_domain_terms(query);
	let mut fused: Vec<RetrievalCandidate> = merged
		.into_values()
		.map(|mut candidate| {
			candidate.domain_boost =
				domain_boost(&candidate.passage.text, &query_terms, max_boost);
			candidate.fused_score = (weights.semantic * candidate.norm_semantic
				+ weights.lexical * candidate.norm_lexical)
				* candidate.domain_boost;

			candidate
		})
		.collect();

	fused.sort_by(|left, right| {
		crate::cmp_f32_desc(left.fused_score, right.fused_score)
			.then_with(|| left.id().cmp(&right.id()))
	});

	tracing::debug!(
		candidates = fused.len(),
		semantic_weight = weights.semantic,
		lexical_weight = weights.lexical,
		domain_terms = query_terms.len(),
		"Fused retrieval candidates."
	);

	fused
}

pub fn passage_ids(candidates: &[RetrievalCandidate]) -> Vec<u64> {
	candidates.iter().map(RetrievalCandidate::id).collect()
}

fn sanitize_weight(weight: f32) -> f32 {
	if weight.is_finite() { weight.max(0.0) } else { 0.0 }
}
