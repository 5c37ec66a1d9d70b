use proptest::prelude::*;

use medrag_domain::{
	EntityKind, Intent, NormalizedText, SearchStrategy, analyze_query, extract_entities,
	medical_relevance, normalize_text, query_suggestions, vocabulary,
};

fn medical_word() -> impl Strategy<Value = &'static str> {
	prop::sample::select(vec![
		"đau đầu",
		"chóng mặt",
		"sốt",
		"ho",
		"tiểu đường",
		"cao huyết áp",
		"tim",
		"thuốc",
		"hôm qua",
		"và",
		"tôi",
		"bị",
		"không",
		"rất",
		"nhiều",
	])
}

proptest! {
	#[test]
	fn normalization_is_idempotent(raw in "[a-zA-Z0-9àáạảãâầấậẩẫăằắặẳẵèéẹẻẽêềếệểễìíịỉĩòóọỏõôồốộổỗơờớợởỡùúụủũưừứựửữỳýỵỷỹđĐÂÔƠƯ ,.!?-]{0,60}") {
		let once = normalize_text(&raw);

		prop_assert_eq!(normalize_text(&once), once);
	}

	#[test]
	fn extracted_entities_are_ordered_and_disjoint(
		words in prop::collection::vec(medical_word(), 0..12),
	) {
		let text = normalize_text(&words.join(" "));
		let entities = extract_entities(&text);

		for pair in entities.windows(2) {
			prop_assert!(pair[0].start < pair[1].start);
			prop_assert!(pair[0].end <= pair[1].start);
		}
		for entity in &entities {
			prop_assert_eq!(&text[entity.start..entity.end], entity.text.as_str());
			prop_assert!(entity.confidence > 0.0 && entity.confidence <= 1.0);
		}
	}

	#[test]
	fn medical_relevance_stays_in_unit_range(
		passage in prop::collection::vec(medical_word(), 0..30),
		query in prop::collection::vec(medical_word(), 1..6),
	) {
		let score = medical_relevance(&passage.join(" "), &query.join(" "), Intent::SymptomAnalysis);

		prop_assert!((0.0..=1.0).contains(&score));
	}

	#[test]
	fn suggestions_respect_the_cap(
		query in prop::collection::vec(medical_word(), 1..6),
		max in 0_usize..6,
	) {
		prop_assert!(query_suggestions(&query.join(" "), max).len() <= max.min(4));
	}
}

#[test]
fn analysis_serializes_with_snake_case_labels() {
	let analysis = analyze_query("Bác sĩ ơi, tôi bị đau đầu và chóng mặt có sao không?");
	let json = serde_json::to_value(&analysis).expect("Failed to serialize analysis.");

	assert_eq!(json["intent"], "symptom_analysis");
	assert_eq!(json["strategy"], "multi_symptom");
	assert_eq!(json["entities"][0]["kind"], "symptom");
	assert_eq!(analysis.intent, Intent::SymptomAnalysis);
	assert_eq!(analysis.strategy, SearchStrategy::MultiSymptom);
}

#[test]
fn synonym_table_collapses_variants() {
	let mut text = NormalizedText::new("huyết áp cao kèm nhức đầu");

	for (from, to) in vocabulary::SYNONYMS {
		text.replace(from, to);
	}

	assert_eq!(text.as_str(), "cao huyết áp kèm đau đầu");
}

#[test]
fn english_queries_are_recognized() {
	let entities = extract_entities(&normalize_text("Fever and cough since yesterday"));
	let kinds: Vec<EntityKind> = entities.iter().map(|entity| entity.kind).collect();

	assert_eq!(kinds, vec![EntityKind::Symptom, EntityKind::Symptom]);
	assert!(entities.iter().all(|entity| entity.confidence > 0.8));
}
