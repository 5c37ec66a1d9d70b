//! Static medical vocabulary. Every entry is already in normalized form (NFC, lowercase,
//! single spaces), so entries can be matched against [`crate::NormalizedText`] directly.

/// Controlled vocabulary rewarded by the domain boost and counted as domain-term density.
pub const DOMAIN_TERMS: &[&str] = &[
	"triệu chứng",
	"bệnh",
	"điều trị",
	"thuốc",
	"nhiễm trùng",
	"viêm",
	"đau",
	"sốt",
	"ho",
	"khó thở",
	"buồn nôn",
	"nôn",
	"chóng mặt",
	"mệt mỏi",
	"đau đầu",
	"đau ngực",
	"đau bụng",
	"tiêu chảy",
	"táo bón",
	"tiểu đường",
	"cao huyết áp",
	"tim mạch",
	"ung thư",
	"đột quỵ",
	"viêm gan",
	"viêm phổi",
	"hen suyễn",
	"rối loạn",
	"hội chứng",
	"chẩn đoán",
	"phòng ngừa",
	"vaccine",
	"kháng sinh",
	"virus",
	"vi khuẩn",
	"miễn dịch",
	"dị ứng",
	"cúm",
	"di truyền",
	"y tế",
	"sức khỏe",
	"icd",
	"who",
	"classification",
	"disease",
	"disorder",
	"syndrome",
	"condition",
	"symptom",
	"treatment",
	"prevention",
	"diagnosis",
	"medication",
	"medicine",
	"medical",
	"health",
	"therapy",
	"infection",
	"inflammation",
	"chronic",
	"acute",
	"fever",
	"pain",
	"headache",
	"cough",
	"nausea",
	"vomiting",
	"diarrhea",
	"diabetes",
	"hypertension",
	"cancer",
	"stroke",
	"asthma",
	"respiratory",
	"cardiac",
];

/// Terms the compressor must never drop while the budget has room for them.
pub const CRITICAL_TERMS: &[&str] = &[
	"đau đầu",
	"sốt",
	"ho",
	"buồn nôn",
	"nôn",
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
	"tim mạch",
	"viêm gan",
	"viêm phổi",
	"hen suyễn",
	"dị ứng",
	"cúm",
	"tim",
	"gan",
	"thận",
	"phổi",
	"não",
	"dạ dày",
	"ruột",
	"thuốc",
	"điều trị",
	"phẫu thuật",
	"xét nghiệm",
];

/// Variant phrasing to canonical form. Applied longest variant first.
pub const SYNONYMS: &[(&str, &str)] = &[
	("đái tháo đường", "tiểu đường"),
	("bệnh tiểu đường", "tiểu đường"),
	("huyết áp cao", "cao huyết áp"),
	("tăng huyết áp", "cao huyết áp"),
	("nhức đầu", "đau đầu"),
	("đau đầu nhức óc", "đau đầu"),
	("buồn nôn muốn ói", "buồn nôn"),
	("cảm thấy buồn nôn", "buồn nôn"),
	("nóng sốt", "sốt"),
	("bị sốt", "sốt"),
	("ho khan", "ho"),
	("ho có đờm", "ho"),
	("bị ho", "ho"),
	("đầu óc", "đầu"),
	("bụng dưới", "bụng"),
	("bụng trên", "bụng"),
	("ngực trái", "ngực"),
	("ngực phải", "ngực"),
	("bị mắc", "bị"),
	("đang bị", "bị"),
	("có vẻ như", ""),
	("có triệu chứng", "triệu chứng"),
	("xuất hiện triệu chứng", "triệu chứng"),
];

/// Removed token by token. Multi-token entries are removed as phrases.
pub const STOP_WORDS: &[&str] = &[
	"tôi",
	"em",
	"anh",
	"chị",
	"bạn",
	"mình",
	"ta",
	"chúng ta",
	"của",
	"cho",
	"với",
	"từ",
	"trong",
	"ngoài",
	"trên",
	"dưới",
	"về",
	"có",
	"là",
	"không",
	"thì",
	"mà",
	"rồi",
	"đã",
	"sẽ",
	"đang",
	"ạ",
	"ở",
	"à",
	"vậy",
	"nha",
	"nhé",
	"hả",
	"hở",
	"và",
	"bị",
	"xin chào",
	"cảm ơn",
	"xin lỗi",
	"cho hỏi",
	"cho em hỏi",
	"bác sĩ ơi",
	"thưa bác sĩ",
	"có thể",
	"có lẽ",
	"có phải",
	"bao giờ",
	"khi nào",
	"ở đâu",
	"tại sao",
	"vì sao",
];

pub const FILLER_PHRASES: &[&str] = &[
	"có sao không",
	"có nguy hiểm không",
	"có gì không",
	"như thế nào",
	"thế nào",
	"ra sao",
	"có phải không",
];

/// Reference phrases folded away when building cache keys.
pub const REFERENCE_FOLDS: &[(&str, &str)] = &[
	("đái tháo đường", "tiểu đường"),
	("huyết áp cao", "cao huyết áp"),
	("nhức đầu", "đau đầu"),
	("có sao không", ""),
	("có nguy hiểm không", ""),
	("tôi bị", ""),
	("em bị", ""),
	("anh bị", ""),
	("chị bị", ""),
];

pub const QUESTION_WORDS: &[&str] =
	&["gì", "sao", "như thế nào", "tại sao", "khi nào", "ở đâu", "what", "why", "how", "when"];

pub const HIGH_CONFIDENCE_TERMS: &[&str] = &[
	"bệnh",
	"disease",
	"triệu chứng",
	"symptom",
	"điều trị",
	"treatment",
	"chẩn đoán",
	"diagnosis",
	"thuốc",
	"medication",
	"bác sĩ",
	"doctor",
];

pub const MEDIUM_CONFIDENCE_TERMS: &[&str] = &[
	"sức khỏe",
	"health",
	"y tế",
	"medical",
	"bệnh viện",
	"hospital",
	"khám",
	"examination",
	"xét nghiệm",
	"test",
];

pub const HEDGING_TERMS: &[&str] = &[
	"cảm thấy",
	"feel",
	"có vẻ",
	"seems",
	"nghĩ",
	"think",
	"có thể",
	"maybe",
	"không chắc",
	"not sure",
];

/// Words in a passage that mark it as clinical reference material.
pub const SOURCE_MARKERS: &[&str] =
	&["icd", "who", "medical", "diagnosis", "treatment", "disease", "chẩn đoán", "điều trị"];

pub const EMERGENCY_TERMS: &[&str] = &[
	"cấp cứu",
	"nguy hiểm",
	"khẩn cấp",
	"nghiêm trọng",
	"nặng",
	"đau ngực",
	"khó thở",
	"choáng váng",
	"bất tỉnh",
	"máu",
	"co giật",
	"ngất",
	"emergency",
	"urgent",
];

pub const CONSULTATION_TERMS: &[&str] = &[
	"nên làm gì",
	"cách điều trị",
	"khám bác sĩ",
	"đi viện",
	"lời khuyên",
	"tư vấn",
	"hướng dẫn",
	"chăm sóc",
];

pub const DISEASE_INQUIRY_TERMS: &[&str] = &[
	"bệnh",
	"hội chứng",
	"rối loạn",
	"triệu chứng",
	"nguyên nhân",
	"điều trị",
	"thuốc",
	"phòng ngừa",
	"biến chứng",
];

pub const SYMPTOM_TERMS: &[&str] = &[
	"đau",
	"sốt",
	"ho",
	"buồn nôn",
	"chóng mặt",
	"mệt mỏi",
	"khó thở",
	"đau đầu",
	"đau bụng",
	"tiêu chảy",
	"táo bón",
	"phát ban",
	"ngứa",
	"sưng",
	"viêm",
	"nhiễm trùng",
	"cảm lạnh",
	"cúm",
];

/// Strategy-level emergency cues. Narrower than [`EMERGENCY_TERMS`].
pub const STRATEGY_EMERGENCY_TERMS: &[&str] =
	&["cấp cứu", "khẩn cấp", "nguy hiểm", "nghiêm trọng", "co giật", "ngất", "bất tỉnh"];

pub const TREATMENT_TERMS: &[&str] = &["điều trị", "chữa", "thuốc", "phương pháp"];

pub const PREVENTION_TERMS: &[&str] = &["phòng ngừa", "phòng tránh", "dự phòng", "ngăn chặn"];

/// Intent hints recorded by the compressor, in priority order.
pub const COMPRESSION_INTENT_PATTERNS: &[(&str, &[&str])] = &[
	("emergency", &["cấp cứu", "nguy hiểm", "nghiêm trọng", "gấp", "khẩn cấp"]),
	("treatment", &["điều trị", "chữa", "uống thuốc", "dùng thuốc", "thuốc", "cách chữa"]),
	("prevention", &["phòng ngừa", "tránh", "dự phòng", "ngăn ngừa"]),
	("symptom_analysis", &["triệu chứng", "dấu hiệu", "biểu hiện", "cảm giác", "thấy"]),
	("disease_inquiry", &["bệnh", "chứng", "rối loạn", "hội chứng", "tình trạng"]),
];

/// Canonical term with the alternate names a passage may use for it. Ordered diseases,
/// symptoms, then care terms; query suggestions take the first group the query names.
pub const MEDICAL_SYNONYM_GROUPS: &[(&str, &[&str])] = &[
	("tiểu đường", &["diabetes", "đái tháo đường", "bệnh đường huyết", "diabetes mellitus"]),
	("cao huyết áp", &["hypertension", "huyết áp cao", "tăng huyết áp", "high blood pressure"]),
	("viêm phổi", &["pneumonia", "nhiễm trùng phổi"]),
	("viêm gan", &["hepatitis", "nhiễm trùng gan"]),
	("ung thư", &["cancer", "carcinoma", "tumor", "khối u"]),
	("tim mạch", &["cardiovascular", "cardiac", "heart disease", "bệnh tim"]),
	("đột quỵ", &["stroke", "tai biến"]),
	("hen suyễn", &["asthma", "hen phế quản"]),
	("dị ứng", &["allergy", "allergic reaction"]),
	("đau đầu", &["headache", "migraine", "nhức đầu", "đau nửa đầu"]),
	("sốt", &["fever", "pyrexia", "nóng sốt"]),
	("ho", &["cough", "ho khan", "ho có đờm"]),
	("buồn nôn", &["nausea", "cảm giác nôn"]),
	("nôn", &["vomiting", "ói mửa"]),
	("đau bụng", &["abdominal pain", "stomach pain"]),
	("tiêu chảy", &["diarrhea", "đi lỏng"]),
	("táo bón", &["constipation", "khó đi cầu"]),
	("chóng mặt", &["dizziness", "vertigo", "tiền đình"]),
	("mệt mỏi", &["fatigue", "weakness", "kiệt sức"]),
	("khó thở", &["dyspnea", "shortness of breath"]),
	("đau ngực", &["chest pain", "tức ngực"]),
	("thuốc", &["medication", "medicine", "drug"]),
	("điều trị", &["treatment", "therapy", "chữa trị"]),
	("xét nghiệm", &["test", "laboratory test"]),
];

pub const RELEVANCE_VIETNAMESE_TERMS: &[&str] =
	&["bệnh", "triệu chứng", "điều trị", "thuốc", "y tế", "sức khỏe"];

pub const RELEVANCE_MEDICAL_TERMS: &[&str] =
	&["icd", "who", "medical", "clinical", "diagnosis", "treatment"];

/// Passages carrying any of these are scaled down by the relevance filter.
pub const IRRELEVANT_MARKERS: &[&str] = &["unrelated", "non medical", "administrative"];

pub fn is_domain_term(term: &str) -> bool {
	DOMAIN_TERMS.contains(&term)
}

/// Whether `token` is one of the words of any domain term.
pub fn is_domain_token(token: &str) -> bool {
	DOMAIN_TERMS.iter().any(|term| term.split(' ').any(|word| word == token))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::text;

	#[test]
	fn vocabulary_is_stored_normalized() {
		let tables: [&[&str]; 6] = [
			DOMAIN_TERMS,
			CRITICAL_TERMS,
			STOP_WORDS,
			FILLER_PHRASES,
			QUESTION_WORDS,
			SYMPTOM_TERMS,
		];

		for table in tables {
			for entry in table {
				assert_eq!(text::normalize_text(entry), *entry, "Entry is not normalized: {entry}");
			}
		}

		for (from, to) in SYNONYMS.iter().chain(REFERENCE_FOLDS) {
			assert_eq!(text::normalize_text(from), *from);
			assert_eq!(text::normalize_text(to), *to);
		}
		for (term, variants) in MEDICAL_SYNONYM_GROUPS {
			assert_eq!(text::normalize_text(term), *term);

			for variant in *variants {
				assert_eq!(text::normalize_text(variant), *variant, "Variant is not normalized.");
			}
		}
		for entry in RELEVANCE_VIETNAMESE_TERMS
			.iter()
			.chain(RELEVANCE_MEDICAL_TERMS)
			.chain(IRRELEVANT_MARKERS)
		{
			assert_eq!(text::normalize_text(entry), *entry, "Entry is not normalized: {entry}");
		}
	}

	#[test]
	fn critical_terms_are_never_stop_words() {
		for term in CRITICAL_TERMS {
			assert!(!STOP_WORDS.contains(term), "Critical term is a stop word: {term}");
		}
	}

	#[test]
	fn domain_tokens_cover_multi_word_terms() {
		assert!(is_domain_token("huyết"));
		assert!(is_domain_term("cao huyết áp"));
		assert!(!is_domain_token("hôm"));
	}
}
