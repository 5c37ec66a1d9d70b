//! Medical-relevance filter and re-rank, applied to fused candidates before truncation.

use crate::RetrievalCandidate;
use medrag_domain::{Intent, medical_relevance};

/// Drops candidates whose medical relevance is below `min_relevance`, then orders the rest by
/// `(1 - blend_weight) * fused_score + blend_weight * relevance`, ties by passage id.
pub fn rerank_by_relevance(
	candidates: Vec<RetrievalCandidate>,
	query: &str,
	intent: Intent,
	cfg: &medrag_config::Relevance,
) -> Vec<RetrievalCandidate> {
	let before = candidates.len();
	let blend = cfg.blend_weight.clamp(0.0, 1.0);
	let mut kept: Vec<RetrievalCandidate> = candidates
		.into_iter()
		.filter_map(|mut candidate| {
			let relevance = medical_relevance(&relevance_text(&candidate), query, intent);

			if relevance < cfg.min_relevance {
				return None;
			}

			candidate.medical_relevance = Some(relevance);
			candidate.fused_score = (1.0 - blend) * candidate.fused_score + blend * relevance;

			Some(candidate)
		})
		.collect();

	kept.sort_by(|left, right| {
		crate::cmp_f32_desc(left.fused_score, right.fused_score)
			.then_with(|| left.id().cmp(&right.id()))
	});

	tracing::debug!(
		before,
		after = kept.len(),
		min_relevance = cfg.min_relevance,
		"Applied medical relevance filter."
	);

	kept
}

fn relevance_text(candidate: &RetrievalCandidate) -> String {
	match candidate.passage.metadata.entity_name.as_deref() {
		Some(name) => format!("{name} {}", candidate.passage.text),
		None => candidate.passage.text.clone(),
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use medrag_storage::{Passage, PassageMetadata};

	fn candidate(id: u64, text: &str, fused: f32) -> RetrievalCandidate {
		let passage =
			Passage { id, text: text.to_string(), metadata: PassageMetadata::default() };
		let mut candidate = RetrievalCandidate::semantic(Arc::new(passage), fused);

		candidate.fused_score = fused;

		candidate
	}

	fn cfg(min_relevance: f32, blend_weight: f32) -> medrag_config::Relevance {
		medrag_config::Relevance { enabled: true, min_relevance, blend_weight }
	}

	#[test]
	fn low_relevance_candidates_are_dropped() {
		let candidates = vec![
			candidate(1, "Lịch làm việc cuối tuần", 0.9),
			candidate(2, "Điều trị sốt bằng thuốc", 0.5),
		];
		let kept =
			rerank_by_relevance(candidates, "điều trị sốt", Intent::GeneralMedical, &cfg(0.1, 0.4));

		assert_eq!(kept.len(), 1);
		assert_eq!(kept[0].id(), 2);
		assert!((kept[0].medical_relevance.unwrap_or_default() - 0.84).abs() < 1e-6);
		// 0.6 * 0.5 + 0.4 * 0.84
		assert!((kept[0].fused_score - 0.636).abs() < 1e-6);
	}

	#[test]
	fn relevance_can_reorder_close_candidates() {
		let candidates =
			vec![candidate(1, "Sốt", 0.62), candidate(2, "Điều trị sốt bằng thuốc", 0.6)];
		let kept =
			rerank_by_relevance(candidates, "điều trị sốt", Intent::GeneralMedical, &cfg(0.0, 0.4));

		assert_eq!(kept.iter().map(RetrievalCandidate::id).collect::<Vec<_>>(), vec![2, 1]);
	}

	#[test]
	fn zero_blend_keeps_fused_order() {
		let candidates =
			vec![candidate(1, "Sốt", 0.62), candidate(2, "Điều trị sốt bằng thuốc", 0.6)];
		let kept =
			rerank_by_relevance(candidates, "điều trị sốt", Intent::GeneralMedical, &cfg(0.0, 0.0));

		assert_eq!(kept.iter().map(RetrievalCandidate::id).collect::<Vec<_>>(), vec![1, 2]);
		assert_eq!(kept[0].fused_score, 0.62);
	}

	#[test]
	fn entity_names_count_toward_relevance() {
		let mut named = candidate(1, "Xem thêm", 0.5);

		Arc::make_mut(&mut named.passage).metadata.entity_name = Some("Đau đầu".to_string());

		let kept =
			rerank_by_relevance(vec![named], "đau đầu", Intent::GeneralMedical, &cfg(0.1, 0.4));

		assert_eq!(kept.len(), 1);
	}
}
