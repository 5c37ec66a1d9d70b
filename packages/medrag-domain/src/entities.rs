use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

const MEDICAL_CONTEXT_FACTOR: f32 = 1.2;
const TEMPORAL_CONTEXT_FACTOR: f32 = 1.1;
const TEMPORAL_WINDOW_CHARS: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Disease,
	Symptom,
	Treatment,
	BodyPart,
	Medication,
}
impl EntityKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Disease => "disease",
			Self::Symptom => "symptom",
			Self::Treatment => "treatment",
			Self::BodyPart => "body_part",
			Self::Medication => "medication",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicalEntity {
	pub text: String,
	pub kind: EntityKind,
	/// Byte offsets into the normalized text.
	pub start: usize,
	pub end: usize,
	pub confidence: f32,
}

struct EntityPattern {
	kind: EntityKind,
	regex: Regex,
	confidence: f32,
}

const PATTERN_SPECS: &[(EntityKind, &str, f32)] = &[
	(EntityKind::Disease, r"tiểu đường|đái tháo đường|diabetes", 0.9),
	(EntityKind::Disease, r"cao huyết áp|tăng huyết áp|huyết áp cao|hypertension", 0.9),
	(EntityKind::Disease, r"viêm phổi|pneumonia|nhiễm trùng phổi", 0.9),
	(EntityKind::Disease, r"viêm gan|hepatitis|nhiễm trùng gan", 0.8),
	(EntityKind::Disease, r"ung thư|cancer|carcinoma|khối u ác tính", 0.9),
	(EntityKind::Disease, r"tim mạch|cardiovascular|bệnh tim|heart disease", 0.8),
	(EntityKind::Disease, r"đột quỵ|stroke|tai biến mạch máu não", 0.9),
	(EntityKind::Disease, r"hen suyễn|asthma", 0.8),
	(EntityKind::Disease, r"dị ứng|allergy|allergic", 0.7),
	(EntityKind::Disease, r"cúm|influenza|flu", 0.8),
	(EntityKind::Disease, r"covid 19|coronavirus|sars cov 2", 0.9),
	(EntityKind::Disease, r"sốt xuất huyết|dengue", 0.9),
	(EntityKind::Disease, r"viêm dạ dày|gastritis", 0.8),
	(EntityKind::Disease, r"loét dạ dày|peptic ulcer|ulcer", 0.8),
	(EntityKind::Disease, r"suy thận|kidney failure|renal failure", 0.8),
	(EntityKind::Disease, r"sỏi thận|kidney stone|nephrolithiasis", 0.8),
	(EntityKind::Symptom, r"đau đầu|nhức đầu|headache", 0.8),
	(EntityKind::Symptom, r"sốt|nóng sốt|fever", 0.9),
	(EntityKind::Symptom, r"ho khan|ho có đờm|ho|cough", 0.8),
	(EntityKind::Symptom, r"buồn nôn|nausea", 0.8),
	(EntityKind::Symptom, r"nôn|ói mửa|vomiting", 0.8),
	(EntityKind::Symptom, r"đau bụng|abdominal pain|stomach pain", 0.8),
	(EntityKind::Symptom, r"tiêu chảy|đi lỏng|diarrhea", 0.8),
	(EntityKind::Symptom, r"táo bón|khó đi cầu|constipation", 0.8),
	(EntityKind::Symptom, r"chóng mặt|dizziness|vertigo", 0.7),
	(EntityKind::Symptom, r"mệt mỏi|fatigue|tired", 0.6),
	(EntityKind::Symptom, r"khó thở|dyspnea|shortness of breath", 0.8),
	(EntityKind::Symptom, r"đau ngực|chest pain", 0.8),
	(EntityKind::Symptom, r"phát ban|rash", 0.7),
	(EntityKind::Symptom, r"ngứa|itching", 0.7),
	(EntityKind::Symptom, r"sưng|phù|swelling|edema", 0.7),
	(EntityKind::Symptom, r"đau lưng|back pain", 0.7),
	(EntityKind::Symptom, r"đau cổ|neck pain", 0.7),
	(EntityKind::Symptom, r"nghẹt mũi|chảy nước mũi|runny nose", 0.7),
	(EntityKind::Treatment, r"thuốc|medication|medicine|drug", 0.6),
	(EntityKind::Treatment, r"điều trị|treatment|therapy", 0.7),
	(EntityKind::Treatment, r"phẫu thuật|surgery", 0.8),
	(EntityKind::Treatment, r"xét nghiệm|examination", 0.7),
	(EntityKind::Treatment, r"vaccine|tiêm chủng|vaccination", 0.8),
	(EntityKind::Treatment, r"khám bác sĩ|medical consultation", 0.7),
	(EntityKind::Treatment, r"chụp x quang|x ray", 0.8),
	(EntityKind::Treatment, r"siêu âm|ultrasound", 0.8),
	(EntityKind::Treatment, r"nội soi|endoscopy", 0.8),
	(EntityKind::Treatment, r"kháng sinh|antibiotic", 0.8),
	(EntityKind::Treatment, r"giảm đau|painkiller|analgesic", 0.7),
	(EntityKind::BodyPart, r"tim|heart", 0.8),
	(EntityKind::BodyPart, r"gan|liver", 0.8),
	(EntityKind::BodyPart, r"thận|kidney", 0.8),
	(EntityKind::BodyPart, r"phổi|lung", 0.8),
	(EntityKind::BodyPart, r"dạ dày|stomach", 0.8),
	(EntityKind::BodyPart, r"ruột|intestine|bowel", 0.7),
	(EntityKind::BodyPart, r"não|brain", 0.8),
	(EntityKind::BodyPart, r"xương|bone", 0.7),
	(EntityKind::BodyPart, r"máu|blood", 0.7),
	(EntityKind::Medication, r"paracetamol|acetaminophen|tylenol", 0.9),
	(EntityKind::Medication, r"aspirin", 0.9),
	(EntityKind::Medication, r"ibuprofen|advil", 0.9),
	(EntityKind::Medication, r"metformin", 0.9),
	(EntityKind::Medication, r"insulin", 0.9),
	(EntityKind::Medication, r"amoxicillin", 0.9),
	(EntityKind::Medication, r"vitamin", 0.7),
];

const MEDICAL_CONTEXT: &[&str] = &[
	"bệnh",
	"disease",
	"triệu chứng",
	"symptom",
	"điều trị",
	"treatment",
	"chẩn đoán",
	"diagnosis",
	"bác sĩ",
	"doctor",
	"bệnh viện",
	"hospital",
	"y tế",
	"medical",
];

const TEMPORAL_CONTEXT: &[&str] =
	&["hôm qua", "hôm nay", "tuần trước", "lâu rồi", "vừa rồi", "yesterday", "today"];

static PATTERNS: LazyLock<Vec<EntityPattern>> = LazyLock::new(|| {
	PATTERN_SPECS
		.iter()
		.filter_map(|(kind, alternatives, confidence)| {
			let regex = Regex::new(&format!(r"\b(?:{alternatives})\b")).ok()?;

			Some(EntityPattern { kind: *kind, regex, confidence: *confidence })
		})
		.collect()
});

/// Extracts medical entities from already-normalized text (see [`crate::normalize_text`]).
///
/// Overlapping matches keep the higher confidence one. Output is ordered by position.
pub fn extract_entities(normalized: &str) -> Vec<MedicalEntity> {
	let text = crate::NormalizedText::from_tokens(
		normalized.split_whitespace().map(str::to_string).collect(),
	);
	let has_medical_context = text.contains_any(MEDICAL_CONTEXT);
	let mut found = Vec::new();

	for pattern in PATTERNS.iter() {
		for matched in pattern.regex.find_iter(text.as_str()) {
			let mut confidence = pattern.confidence;

			if has_medical_context {
				confidence = (confidence * MEDICAL_CONTEXT_FACTOR).min(1.0);
			}
			if has_temporal_context(text.as_str(), matched.start(), matched.end()) {
				confidence = (confidence * TEMPORAL_CONTEXT_FACTOR).min(1.0);
			}

			found.push(MedicalEntity {
				text: matched.as_str().to_string(),
				kind: pattern.kind,
				start: matched.start(),
				end: matched.end(),
				confidence,
			});
		}
	}

	let mut kept = remove_overlaps(found);

	kept.sort_by_key(|entity| entity.start);

	kept
}

pub fn distinct_kinds(entities: &[MedicalEntity]) -> BTreeSet<EntityKind> {
	entities.iter().map(|entity| entity.kind).collect()
}

fn remove_overlaps(mut entities: Vec<MedicalEntity>) -> Vec<MedicalEntity> {
	// Longer spans win confidence ties so "đau ngực" beats a bare "đau".
	entities.sort_by(|left, right| {
		right
			.confidence
			.total_cmp(&left.confidence)
			.then_with(|| (right.end - right.start).cmp(&(left.end - left.start)))
			.then_with(|| left.start.cmp(&right.start))
	});

	let mut kept: Vec<MedicalEntity> = Vec::with_capacity(entities.len());

	for entity in entities {
		let overlaps =
			kept.iter().any(|other| entity.start < other.end && other.start < entity.end);

		if !overlaps {
			kept.push(entity);
		}
	}

	kept
}

fn has_temporal_context(text: &str, start: usize, end: usize) -> bool {
	let window_start = text[..start]
		.char_indices()
		.rev()
		.nth(TEMPORAL_WINDOW_CHARS.saturating_sub(1))
		.map(|(idx, _)| idx)
		.unwrap_or(0);
	let window_end = text[end..]
		.char_indices()
		.nth(TEMPORAL_WINDOW_CHARS)
		.map(|(idx, _)| end + idx)
		.unwrap_or(text.len());
	let window = crate::NormalizedText::new(&text[window_start..window_end]);

	window.contains_any(TEMPORAL_CONTEXT)
}
