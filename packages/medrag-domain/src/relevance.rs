//! Medical relevance of a passage to a query, and follow-up query suggestions.

use std::collections::BTreeSet;

use crate::{
	Intent, NormalizedText,
	vocabulary::{
		IRRELEVANT_MARKERS, MEDICAL_SYNONYM_GROUPS, RELEVANCE_MEDICAL_TERMS,
		RELEVANCE_VIETNAMESE_TERMS, STOP_WORDS,
	},
};

const EXACT_MATCH_WEIGHT: f32 = 2.0;
const SYNONYM_MATCH_WEIGHT: f32 = 1.5;
const VIETNAMESE_TERM_WEIGHT: f32 = 1.2;
const MEDICAL_TERM_WEIGHT: f32 = 1.4;
const INTENT_TERM_WEIGHT: f32 = 1.2;
const IRRELEVANT_PENALTY: f32 = 0.3;
/// Raw score that maps to a relevance of 1.0.
const SATURATION: f32 = 10.0;

/// Relevance in `[0, 1]`: shared query tokens, synonym matches for medical terms the query
/// names, generic medical vocabulary, and intent-specific wording in the passage.
pub fn medical_relevance(passage_text: &str, query: &str, intent: Intent) -> f32 {
	let passage = NormalizedText::new(passage_text);
	let query = NormalizedText::new(query);
	let query_tokens: BTreeSet<&str> = query
		.tokens()
		.iter()
		.map(String::as_str)
		.filter(|token| !STOP_WORDS.contains(token))
		.collect();
	let exact = query_tokens
		.iter()
		.filter(|token| passage.tokens().iter().any(|candidate| candidate == *token))
		.count();
	let synonyms = MEDICAL_SYNONYM_GROUPS
		.iter()
		.filter(|(term, variants)| query.contains(term) && passage.contains_any(variants.iter()))
		.count();
	let mut score = exact as f32 * EXACT_MATCH_WEIGHT
		+ synonyms as f32 * SYNONYM_MATCH_WEIGHT
		+ passage.count_matches(RELEVANCE_VIETNAMESE_TERMS) as f32 * VIETNAMESE_TERM_WEIGHT
		+ passage.count_matches(RELEVANCE_MEDICAL_TERMS) as f32 * MEDICAL_TERM_WEIGHT
		+ passage.count_matches(intent_terms(intent)) as f32 * INTENT_TERM_WEIGHT;

	if passage.contains_any(IRRELEVANT_MARKERS) {
		score *= IRRELEVANT_PENALTY;
	}

	(score / SATURATION).min(1.0)
}

/// Up to `max` follow-up queries built around the first medical term the query names.
pub fn query_suggestions(query: &str, max: usize) -> Vec<String> {
	let query = NormalizedText::new(query);
	let Some((term, _)) = MEDICAL_SYNONYM_GROUPS
		.iter()
		.find(|(term, variants)| query.contains(term) || query.contains_any(variants.iter()))
	else {
		return Vec::new();
	};

	[
		format!("Tìm hiểu về {term}"),
		format!("Triệu chứng của {term}"),
		format!("Điều trị {term}"),
		format!("Nguyên nhân {term}"),
	]
	.into_iter()
	.take(max)
	.collect()
}

fn intent_terms(intent: Intent) -> &'static [&'static str] {
	match intent {
		Intent::Emergency => &["acute", "severe", "critical", "urgent", "cấp cứu", "nguy hiểm"],
		Intent::SymptomAnalysis => &["symptom", "sign", "triệu chứng", "dấu hiệu", "biểu hiện"],
		Intent::DiseaseInquiry => &["disease", "disorder", "condition", "bệnh", "rối loạn"],
		Intent::MedicalConsultation => &["treatment", "therapy", "management", "điều trị", "thuốc"],
		Intent::GeneralMedical => &[],
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn synonym_only_match_scores_one_group() {
		let score = medical_relevance("Headache", "đau đầu", Intent::GeneralMedical);

		assert!((score - 0.15).abs() < 1e-6);
	}

	#[test]
	fn unrelated_text_scores_zero() {
		assert_eq!(
			medical_relevance("Lịch làm việc cuối tuần", "đau đầu", Intent::GeneralMedical),
			0.0
		);
	}

	#[test]
	fn rich_passages_saturate_at_one() {
		let passage = "Đau đầu và chóng mặt là triệu chứng bệnh cần điều trị, theo ICD của WHO.";
		let score = medical_relevance(passage, "đau đầu chóng mặt", Intent::SymptomAnalysis);

		assert_eq!(score, 1.0);
	}

	#[test]
	fn administrative_markers_scale_the_score_down() {
		let query = "điều trị sốt";
		let clinical = medical_relevance("Điều trị sốt bằng thuốc", query, Intent::GeneralMedical);
		let flagged = medical_relevance(
			"Điều trị sốt bằng thuốc administrative",
			query,
			Intent::GeneralMedical,
		);

		assert!(clinical > 0.0);
		assert!((flagged - clinical * IRRELEVANT_PENALTY).abs() < 1e-6);
	}

	#[test]
	fn intent_wording_adds_relevance() {
		let passage = "Sốt cao cấp cứu";
		let general = medical_relevance(passage, "sốt", Intent::GeneralMedical);
		let emergency = medical_relevance(passage, "sốt", Intent::Emergency);

		assert!((emergency - general - 0.12).abs() < 1e-6);
	}

	#[test]
	fn suggestions_follow_the_first_named_term() {
		let suggestions = query_suggestions("Tôi bị đau đầu và chóng mặt", 5);

		assert_eq!(
			suggestions,
			vec![
				"Tìm hiểu về đau đầu".to_string(),
				"Triệu chứng của đau đầu".to_string(),
				"Điều trị đau đầu".to_string(),
				"Nguyên nhân đau đầu".to_string(),
			]
		);
		assert_eq!(query_suggestions("bị huyết áp cao", 2).len(), 2);
		assert_eq!(query_suggestions("bị huyết áp cao", 2)[0], "Tìm hiểu về cao huyết áp");
		assert!(query_suggestions("xin chào", 5).is_empty());
	}
}
