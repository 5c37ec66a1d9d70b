use std::{collections::BTreeSet, sync::Arc};

use proptest::prelude::*;
use time::Duration;

use medrag_domain::{EntityKind, Intent, MedicalEntity, NormalizedText, char_len};
use medrag_service::{
	FusionWeights, ManualClock, MultiTierCache, RetrievalCandidate,
	cache::CacheSettings,
	compress,
	confidence::{ConfidenceInput, ConfidenceScorer},
	fusion,
};
use medrag_storage::{Passage, PassageMetadata};

// Critical terms whose tokens contain no shorter critical term and that no synonym rewrites.
const CRITICAL: &[&str] = &[
	"đau đầu",
	"sốt",
	"ho",
	"tiêu chảy",
	"táo bón",
	"chóng mặt",
	"khó thở",
	"đau ngực",
	"đau bụng",
	"mệt mỏi",
	"tiểu đường",
	"cao huyết áp",
	"ung thư",
	"đột quỵ",
	"hen suyễn",
	"dị ứng",
	"cúm",
	"thận",
	"dạ dày",
	"xét nghiệm",
];
const FILLER: &[&str] =
	&["hôm nay", "rất", "nhiều", "lúc", "sáng", "mấy ngày", "liên tục", "kéo dài", "xin", "giúp"];

const HEADACHE_QUERY: &str = "đau đầu và chóng mặt";
// Passages sharing none, some, or all of the query's domain terms.
const PASSAGE_TEXTS: &[&str] =
	&["gãy xương", "chóng mặt khi đứng", "đau đầu kéo dài", "đau đầu kèm chóng mặt", "đau bụng"];

fn passage(id: u64) -> Arc<Passage> {
	passage_with_text(id, &format!("đoạn {id}"))
}

fn passage_with_text(id: u64, text: &str) -> Arc<Passage> {
	Arc::new(Passage { id, text: text.to_string(), metadata: PassageMetadata::default() })
}

fn settings(capacities: [usize; 3]) -> CacheSettings {
	CacheSettings {
		capacities,
		ttl: Duration::seconds(60),
		pattern_ttl: Duration::seconds(120),
		promote_to_l1_after: 3,
		pattern_min_chars: 4,
	}
}

#[derive(Clone, Debug)]
enum CacheOp {
	Set(u8),
	Get(u8),
	Advance(i64),
}

fn cache_op() -> impl Strategy<Value = CacheOp> {
	prop_oneof![
		(0_u8..12).prop_map(CacheOp::Set),
		(0_u8..12).prop_map(CacheOp::Get),
		(1_i64..30).prop_map(CacheOp::Advance),
	]
}

fn entity_kind() -> impl Strategy<Value = EntityKind> {
	prop::sample::select(vec![
		EntityKind::Disease,
		EntityKind::Symptom,
		EntityKind::Treatment,
		EntityKind::BodyPart,
		EntityKind::Medication,
	])
}

proptest! {
	#[test]
	fn compression_keeps_a_critical_term_that_fits(
		term in prop::sample::select(CRITICAL.to_vec()),
		before in prop::collection::vec(prop::sample::select(FILLER.to_vec()), 0..6),
		after in prop::collection::vec(prop::sample::select(FILLER.to_vec()), 0..6),
		budget in 12_usize..80,
	) {
		let raw = format!("{} {term} {}", before.join(" "), after.join(" "));
		let compressed = compress::compress(&raw, budget, 5);

		prop_assert!(char_len(&compressed.compressed) <= budget);
		prop_assert!(compressed.critical_terms.iter().any(|found| found == term));
		prop_assert!(NormalizedText::new(&compressed.compressed).contains(term));
		prop_assert!(compressed.dropped_terms().is_empty());
	}

	#[test]
	fn semantic_weight_shift_keeps_semantic_leaning_matches_ahead(
		rows in prop::collection::vec(
			(0.0_f32..1.0, 0.0_f32..20.0, prop::sample::select(PASSAGE_TEXTS.to_vec())),
			2..8,
		),
		semantic_weight in 0.0_f32..0.9,
		shift in 0.05_f32..0.1,
	) {
		let query = compress::compress(HEADACHE_QUERY, 50, 5);
		let semantic: Vec<RetrievalCandidate> = rows
			.iter()
			.enumerate()
			.map(|(idx, (score, _, text))| {
				RetrievalCandidate::semantic(passage_with_text(idx as u64, text), *score)
			})
			.collect();
		let lexical: Vec<RetrievalCandidate> = rows
			.iter()
			.enumerate()
			.map(|(idx, (_, score, text))| {
				RetrievalCandidate::lexical(passage_with_text(idx as u64, text), *score)
			})
			.collect();
		let before = fusion::fuse(
			&semantic,
			&lexical,
			&query,
			FusionWeights::new(semantic_weight, 1.0 - semantic_weight),
			0.3,
		);
		let shifted = semantic_weight + shift;
		let after = fusion::fuse(
			&semantic,
			&lexical,
			&query,
			FusionWeights::new(shifted, 1.0 - shifted),
			0.3,
		);
		let position = |ranked: &[RetrievalCandidate], id: u64| {
			ranked.iter().position(|candidate| candidate.id() == id)
		};

		for (rank, x) in before.iter().enumerate() {
			for y in &before[rank + 1..] {
				let x_leans_semantic = x.norm_semantic - x.norm_lexical > 1e-3;
				let y_leans_lexical = y.norm_lexical - y.norm_semantic > 1e-3;

				if x_leans_semantic && y_leans_lexical {
					prop_assert!(position(&after, x.id()) < position(&after, y.id()));
				}
			}
		}
	}

	#[test]
	fn cache_keys_live_in_one_tier_within_capacity(
		ops in prop::collection::vec(cache_op(), 1..80),
	) {
		let clock = Arc::new(ManualClock::default());
		let capacities = [2, 3, 4];
		let cache = MultiTierCache::with_settings(settings(capacities), clock.clone());
		let mut written_at: Vec<Option<i64>> = vec![None; 12];
		let mut now = 0_i64;

		for op in ops {
			match op {
				CacheOp::Set(key) => {
					cache.set(&key.to_string(), vec![key], Duration::seconds(60));

					written_at[key as usize] = Some(now);
				},
				CacheOp::Get(key) => {
					let hit = cache.get(&key.to_string());
					let expired = written_at[key as usize].is_some_and(|at| now - at >= 60);

					if expired || written_at[key as usize].is_none() {
						prop_assert!(hit.is_none());
					}
					if let Some((value, _)) = hit {
						prop_assert_eq!(&*value, &[key][..]);
					}
				},
				CacheOp::Advance(secs) => {
					clock.advance(Duration::seconds(secs));

					now += secs;
				},
			}

			let present =
				(0_u8..12).filter(|key| cache.tier_of(&key.to_string()).is_some()).count();
			let stats = cache.stats();

			prop_assert_eq!(present, cache.len());

			for (tier, capacity) in stats.tiers.iter().zip(capacities) {
				prop_assert!(tier.size <= capacity);
			}
		}
	}

	#[test]
	fn confidence_factors_stay_in_unit_range(
		fused in prop::collection::vec(0.0_f32..1.5, 0..8),
		kinds in prop::collection::vec((entity_kind(), 0.1_f32..1.0), 0..6),
		context_entities in 0_usize..5,
		intent in prop::sample::select(vec![
			Intent::Emergency,
			Intent::MedicalConsultation,
			Intent::DiseaseInquiry,
			Intent::SymptomAnalysis,
			Intent::GeneralMedical,
		]),
	) {
		let candidates: Vec<RetrievalCandidate> = fused
			.iter()
			.enumerate()
			.map(|(idx, score)| {
				let mut candidate = RetrievalCandidate::semantic(passage(idx as u64), *score);

				candidate.fused_score = *score;

				candidate
			})
			.collect();
		let entities: Vec<MedicalEntity> = kinds
			.iter()
			.map(|(kind, confidence)| MedicalEntity {
				text: "sốt".to_string(),
				kind: *kind,
				start: 0,
				end: 4,
				confidence: *confidence,
			})
			.collect();
		let scorer = ConfidenceScorer::new(medrag_config::Confidence::default());
		let breakdown = scorer.score(ConfidenceInput {
			query: "bệnh gì mà sốt cao và ho nhiều, tôi nghĩ có thể là cúm",
			intent,
			candidates: &candidates,
			entities: &entities,
			context_used: context_entities > 0,
			context_entities,
		});

		for factor in [
			breakdown.search_relevance,
			breakdown.intent_clarity,
			breakdown.context_usage,
			breakdown.domain_match,
			breakdown.entity_quality,
			breakdown.source_quality,
			breakdown.overall,
		] {
			prop_assert!((0.0..=1.0).contains(&factor));
		}

		if candidates.is_empty() {
			prop_assert_eq!(breakdown.search_relevance, 0.0);
		}

		let labels: BTreeSet<&str> = breakdown.adjustments.iter().map(String::as_str).collect();

		prop_assert_eq!(labels.len(), breakdown.adjustments.len());
	}
}

#[test]
fn semantic_weight_shift_overtakes_a_lexical_match_despite_boosts() {
	let query = compress::compress(HEADACHE_QUERY, 50, 5);
	let semantic = vec![
		RetrievalCandidate::semantic(passage_with_text(1, "đau đầu kèm chóng mặt"), 0.9),
		RetrievalCandidate::semantic(passage_with_text(2, "gãy xương"), 0.2),
	];
	let lexical = vec![
		RetrievalCandidate::lexical(passage_with_text(1, "đau đầu kèm chóng mặt"), 1.0),
		RetrievalCandidate::lexical(passage_with_text(2, "gãy xương"), 8.0),
	];
	let lexical_heavy =
		fusion::fuse(&semantic, &lexical, &query, FusionWeights::new(0.3, 0.7), 0.3);
	let semantic_heavy =
		fusion::fuse(&semantic, &lexical, &query, FusionWeights::new(0.7, 0.3), 0.3);

	assert_eq!(fusion::passage_ids(&lexical_heavy), vec![2, 1]);
	assert_eq!(fusion::passage_ids(&semantic_heavy), vec![1, 2]);
	assert!((semantic_heavy[0].domain_boost - 1.3).abs() < 1e-6);
	assert_eq!(semantic_heavy[1].domain_boost, 1.0);
	assert!((semantic_heavy[0].fused_score - 0.91).abs() < 1e-6);
}
