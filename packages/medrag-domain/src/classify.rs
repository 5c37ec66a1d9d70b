use serde::{Deserialize, Serialize};

use crate::{
	EntityKind, MedicalEntity, NormalizedText,
	vocabulary::{
		CONSULTATION_TERMS, DISEASE_INQUIRY_TERMS, EMERGENCY_TERMS, PREVENTION_TERMS,
		STRATEGY_EMERGENCY_TERMS, SYMPTOM_TERMS, TREATMENT_TERMS,
	},
};

const URGENCY_HIGH_TERMS: &[&str] =
	&["cấp cứu", "nguy hiểm", "nghiêm trọng", "emergency", "acute", "severe"];
const URGENCY_MEDIUM_TERMS: &[&str] =
	&["đau ngực", "khó thở", "bất tỉnh", "chest pain", "dyspnea", "unconscious"];
const DOMAIN_KEYWORDS: &[(MedicalDomain, &[&str])] = &[
	(MedicalDomain::Cardiology, &["tim", "heart", "cardiac", "cardiovascular", "tim mạch"]),
	(MedicalDomain::Gastroenterology, &["dạ dày", "ruột", "stomach", "intestine", "gastric"]),
	(MedicalDomain::Neurology, &["não", "brain", "đau đầu", "headache", "chóng mặt"]),
	(MedicalDomain::Respiratory, &["phổi", "lung", "ho", "cough", "khó thở", "dyspnea"]),
	(MedicalDomain::Endocrinology, &["tiểu đường", "diabetes", "hormone"]),
	(MedicalDomain::InfectiousDisease, &["viêm", "infection", "virus", "bacteria", "cúm"]),
	(MedicalDomain::Emergency, &["cấp cứu", "emergency", "nguy hiểm", "urgent"]),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	Emergency,
	MedicalConsultation,
	DiseaseInquiry,
	SymptomAnalysis,
	GeneralMedical,
}
impl Intent {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Emergency => "emergency",
			Self::MedicalConsultation => "medical_consultation",
			Self::DiseaseInquiry => "disease_inquiry",
			Self::SymptomAnalysis => "symptom_analysis",
			Self::GeneralMedical => "general_medical",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
	Emergency,
	MultiSymptom,
	DiseaseFocused,
	TreatmentFocused,
	PreventionFocused,
	General,
}
impl SearchStrategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Emergency => "emergency",
			Self::MultiSymptom => "multi_symptom",
			Self::DiseaseFocused => "disease_focused",
			Self::TreatmentFocused => "treatment_focused",
			Self::PreventionFocused => "prevention_focused",
			Self::General => "general",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicalDomain {
	Cardiology,
	Gastroenterology,
	Neurology,
	Respiratory,
	Endocrinology,
	InfectiousDisease,
	Emergency,
	General,
}
impl MedicalDomain {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Cardiology => "cardiology",
			Self::Gastroenterology => "gastroenterology",
			Self::Neurology => "neurology",
			Self::Respiratory => "respiratory",
			Self::Endocrinology => "endocrinology",
			Self::InfectiousDisease => "infectious_disease",
			Self::Emergency => "emergency",
			Self::General => "general",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
	High,
	Medium,
	Low,
}

/// Everything the ranking pipeline derives from the raw query text alone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
	pub intent: Intent,
	pub strategy: SearchStrategy,
	pub domain: MedicalDomain,
	pub urgency: Urgency,
	pub entities: Vec<MedicalEntity>,
}

pub fn analyze_query(raw: &str) -> QueryAnalysis {
	let text = NormalizedText::new(raw);
	let entities = crate::extract_entities(text.as_str());

	QueryAnalysis {
		intent: classify_intent(&text),
		strategy: detect_strategy(&text, &entities),
		domain: identify_domain(&entities),
		urgency: assess_urgency(&text),
		entities,
	}
}

pub fn classify_intent(text: &NormalizedText) -> Intent {
	if text.contains_any(EMERGENCY_TERMS) {
		Intent::Emergency
	} else if text.contains_any(CONSULTATION_TERMS) {
		Intent::MedicalConsultation
	} else if text.contains_any(DISEASE_INQUIRY_TERMS) {
		Intent::DiseaseInquiry
	} else if text.contains_any(SYMPTOM_TERMS) {
		Intent::SymptomAnalysis
	} else {
		Intent::GeneralMedical
	}
}

pub fn detect_strategy(text: &NormalizedText, entities: &[MedicalEntity]) -> SearchStrategy {
	let symptoms = entities.iter().filter(|entity| entity.kind == EntityKind::Symptom).count();

	if text.contains_any(STRATEGY_EMERGENCY_TERMS) {
		SearchStrategy::Emergency
	} else if symptoms >= 2 {
		SearchStrategy::MultiSymptom
	} else if entities.iter().any(|entity| entity.kind == EntityKind::Disease) {
		SearchStrategy::DiseaseFocused
	} else if text.contains_any(TREATMENT_TERMS) {
		SearchStrategy::TreatmentFocused
	} else if text.contains_any(PREVENTION_TERMS) {
		SearchStrategy::PreventionFocused
	} else {
		SearchStrategy::General
	}
}

/// Highest keyword hit count across entity texts wins; ties go to the earlier domain.
pub fn identify_domain(entities: &[MedicalEntity]) -> MedicalDomain {
	let mut best = (MedicalDomain::General, 0_usize);

	for (domain, keywords) in DOMAIN_KEYWORDS {
		let score: usize = entities
			.iter()
			.map(|entity| NormalizedText::new(&entity.text).count_matches(*keywords))
			.sum();

		if score > best.1 {
			best = (*domain, score);
		}
	}

	best.0
}

pub fn assess_urgency(text: &NormalizedText) -> Urgency {
	if text.contains_any(URGENCY_HIGH_TERMS) {
		Urgency::High
	} else if text.contains_any(URGENCY_MEDIUM_TERMS) {
		Urgency::Medium
	} else {
		Urgency::Low
	}
}
