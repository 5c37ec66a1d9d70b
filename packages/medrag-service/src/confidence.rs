//! Six-factor confidence score for a ranked result list.

use serde::{Deserialize, Serialize};

use crate::RetrievalCandidate;
use medrag_domain::{
	Intent, MedicalEntity, NormalizedText, distinct_kinds,
	vocabulary::{
		HEDGING_TERMS, HIGH_CONFIDENCE_TERMS, MEDIUM_CONFIDENCE_TERMS, QUESTION_WORDS,
		SOURCE_MARKERS,
	},
};

const RELEVANCE_RANK_WEIGHTS: [f32; 4] = [0.5, 0.3, 0.15, 0.05];
const GOOD_RESULT_SCORE: f32 = 0.5;
const DOMAIN_MARKER_WINDOW: usize = 5;
const SOURCE_WINDOW: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
	VeryLow,
	Low,
	Medium,
	High,
}
impl ConfidenceLevel {
	pub fn from_score(score: f32, levels: &medrag_config::ConfidenceLevels) -> Self {
		if score >= levels.high {
			Self::High
		} else if score >= levels.medium {
			Self::Medium
		} else if score >= levels.low {
			Self::Low
		} else {
			Self::VeryLow
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::VeryLow => "very_low",
			Self::Low => "low",
			Self::Medium => "medium",
			Self::High => "high",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
	pub search_relevance: f32,
	pub intent_clarity: f32,
	pub context_usage: f32,
	pub domain_match: f32,
	pub entity_quality: f32,
	pub source_quality: f32,
	pub overall: f32,
	pub level: ConfidenceLevel,
	/// Final adjustments that fired, in application order.
	pub adjustments: Vec<String>,
}

#[derive(Clone, Copy, Debug)]
pub struct ConfidenceInput<'a> {
	pub query: &'a str,
	pub intent: Intent,
	pub candidates: &'a [RetrievalCandidate],
	pub entities: &'a [MedicalEntity],
	pub context_used: bool,
	/// Entities carried over from earlier turns.
	pub context_entities: usize,
}

pub struct ConfidenceScorer {
	cfg: medrag_config::Confidence,
}
impl ConfidenceScorer {
	pub fn new(cfg: medrag_config::Confidence) -> Self {
		Self { cfg }
	}

	pub fn score(&self, input: ConfidenceInput<'_>) -> ConfidenceBreakdown {
		let query = NormalizedText::new(input.query);
		let search_relevance = search_relevance(input.candidates);
		let intent_clarity = intent_clarity(&query, input.intent, input.entities);
		let context_usage = context_usage(input.context_used, input.context_entities);
		let domain_match = domain_match(&query, input.candidates, input.entities);
		let entity_quality = entity_quality(input.entities);
		let source_quality = source_quality(input.candidates);
		let weights = &self.cfg.weights;
		let mut overall = search_relevance * weights.search_relevance
			+ intent_clarity * weights.intent_clarity
			+ context_usage * weights.context_usage
			+ domain_match * weights.domain_match
			+ entity_quality * weights.entity_quality
			+ source_quality * weights.source_quality;
		let rules = &self.cfg.adjustments;
		let mut adjustments = Vec::new();

		if input.intent == Intent::Emergency && search_relevance > rules.emergency_min_relevance {
			overall = (overall * rules.emergency_multiplier).min(1.0);

			adjustments.push("emergency_boost".to_string());
		}
		if search_relevance < rules.low_relevance_threshold {
			overall *= rules.low_relevance_multiplier;

			adjustments.push("low_relevance_penalty".to_string());
		}
		if domain_match > rules.domain_match_threshold {
			overall = (overall * rules.domain_match_multiplier).min(1.0);

			adjustments.push("domain_match_boost".to_string());
		}
		if context_usage > rules.context_threshold {
			overall = (overall * rules.context_multiplier).min(1.0);

			adjustments.push("context_boost".to_string());
		}

		let overall = clamp_unit(overall);

		ConfidenceBreakdown {
			search_relevance,
			intent_clarity,
			context_usage,
			domain_match,
			entity_quality,
			source_quality,
			overall,
			level: ConfidenceLevel::from_score(overall, &self.cfg.levels),
			adjustments,
		}
	}
}

/// Exactly 0.0 for an empty list.
pub fn search_relevance(candidates: &[RetrievalCandidate]) -> f32 {
	if candidates.is_empty() {
		return 0.0;
	}

	let scores: Vec<f32> = candidates.iter().map(|candidate| candidate.fused_score).collect();
	let (weighted, total_weight) = scores
		.iter()
		.zip(RELEVANCE_RANK_WEIGHTS)
		.fold((0.0, 0.0), |(sum, total), (score, weight)| (sum + score * weight, total + weight));
	let average = if total_weight > 0.0 { weighted / total_weight } else { 0.0 };
	let good = scores.iter().filter(|score| **score > GOOD_RESULT_SCORE).count();
	let count_factor = (good as f32 / 3.0).min(1.0);
	let consistency = if scores.len() > 1 {
		(1.0 - std_dev(&scores[..scores.len().min(3)])).max(0.5)
	} else {
		1.0
	};

	clamp_unit(average * count_factor * consistency)
}

pub fn intent_clarity(query: &NormalizedText, intent: Intent, entities: &[MedicalEntity]) -> f32 {
	let base = match intent {
		Intent::Emergency => 0.95,
		Intent::DiseaseInquiry => 0.85,
		Intent::SymptomAnalysis => 0.80,
		Intent::MedicalConsultation => 0.75,
		Intent::GeneralMedical => 0.60,
	};
	let mut factor = 1.0_f32;

	if query.contains_any(QUESTION_WORDS) {
		factor *= 1.2;
	}

	let specific = query.count_matches(HIGH_CONFIDENCE_TERMS);
	let hedging = query.count_matches(HEDGING_TERMS);

	factor *= 1.0 + 0.1 * specific as f32;
	factor *= (1.0 - 0.15 * hedging as f32).max(0.5);

	match query.tokens().len() {
		0..3 => factor *= 0.7,
		21.. => factor *= 0.8,
		_ => {},
	}
	match entities.len() {
		0 => factor *= 0.8,
		1 => {},
		_ => factor *= 1.1,
	}

	clamp_unit(base * factor.min(1.5))
}

pub fn context_usage(context_used: bool, context_entities: usize) -> f32 {
	if !context_used {
		return 0.5;
	}

	let multiplier = match context_entities {
		0 => 1.0,
		1 | 2 => 1.1,
		_ => 1.2,
	};

	(0.8_f32 * multiplier).min(1.0)
}

pub fn domain_match(
	query: &NormalizedText,
	candidates: &[RetrievalCandidate],
	entities: &[MedicalEntity],
) -> f32 {
	let high = query.count_matches(HIGH_CONFIDENCE_TERMS) as f32;
	let medium = query.count_matches(MEDIUM_CONFIDENCE_TERMS) as f32;
	let query_score = ((0.3 * high + 0.2 * medium) / 2.0).min(1.0);
	let window = &candidates[..candidates.len().min(DOMAIN_MARKER_WINDOW)];
	let results_score = if window.is_empty() {
		0.0
	} else {
		let marked = window.iter().filter(|candidate| has_domain_marker(candidate)).count();

		marked as f32 / window.len() as f32
	};
	let entity_score = (distinct_kinds(entities).len() as f32 / 3.0).min(1.0);

	clamp_unit(0.4 * query_score + 0.4 * results_score + 0.2 * entity_score)
}

pub fn entity_quality(entities: &[MedicalEntity]) -> f32 {
	if entities.is_empty() {
		return 0.3;
	}

	let count = entities.len() as f32;
	let mean = entities.iter().map(|entity| entity.confidence).sum::<f32>() / count;
	let count_factor = (count / 3.0).min(1.0);
	let diversity = (distinct_kinds(entities).len() as f32 / 2.0).min(1.0);

	clamp_unit(mean * count_factor * diversity)
}

pub fn source_quality(candidates: &[RetrievalCandidate]) -> f32 {
	let window = &candidates[..candidates.len().min(SOURCE_WINDOW)];

	if window.is_empty() {
		return 0.0;
	}

	let total: f32 = window
		.iter()
		.map(|candidate| {
			let metadata = &candidate.passage.metadata;
			let mut quality = 0.5_f32;

			if metadata.has_code() {
				quality += 0.2;
			}
			if metadata.has_authoritative_url() {
				quality += 0.2;
			}
			if metadata.authoritative {
				quality += 0.1;
			}

			f32::min(quality, 1.0)
		})
		.sum();

	total / window.len() as f32
}

fn has_domain_marker(candidate: &RetrievalCandidate) -> bool {
	let metadata = &candidate.passage.metadata;

	metadata.has_code()
		|| metadata.browser_url.is_some()
		|| NormalizedText::new(&candidate.passage.text).contains_any(SOURCE_MARKERS)
}

fn std_dev(values: &[f32]) -> f32 {
	if values.is_empty() {
		return 0.0;
	}

	let n = values.len() as f32;
	let mean = values.iter().sum::<f32>() / n;
	let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f32>() / n;

	variance.sqrt()
}

fn clamp_unit(value: f32) -> f32 {
	if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 }
}
