pub mod classify;
pub mod entities;
pub mod relevance;
pub mod text;
pub mod vocabulary;

pub use classify::{
	Intent, MedicalDomain, QueryAnalysis, SearchStrategy, Urgency, analyze_query,
	assess_urgency, classify_intent, detect_strategy, identify_domain,
};
pub use entities::{EntityKind, MedicalEntity, distinct_kinds, extract_entities};
pub use relevance::{medical_relevance, query_suggestions};
pub use text::{NormalizedText, char_len, normalize_text, tokenize, truncate_chars};
