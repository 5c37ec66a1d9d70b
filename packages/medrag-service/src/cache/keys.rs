use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result, SessionContext, compress};
use medrag_domain::{
	Intent, MedicalDomain, NormalizedText, char_len,
	vocabulary::{REFERENCE_FOLDS, STOP_WORDS},
};

const PATTERN_PREFIX: &str = "pattern:";
const MIN_PATTERN_KEYWORDS: usize = 2;

/// Coarse summary of the conversation state that changes what a query means.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ContextFingerprint {
	pub has_history: bool,
	pub entity_count: usize,
	pub domain: MedicalDomain,
}
impl ContextFingerprint {
	pub fn new(context: &SessionContext, domain: MedicalDomain) -> Self {
		Self {
			has_history: context.has_history(),
			entity_count: context.mentioned_entities.len(),
			domain,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternKey {
	pub key: String,
	/// Space-joined keywords, used for the frequency table.
	pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheKeys {
	pub exact: String,
	pub pattern: Option<PatternKey>,
}

/// Lowercased query with reference phrases and synonyms folded to canonical forms.
pub fn normalize_for_key(query: &str) -> NormalizedText {
	let mut text = NormalizedText::new(query);

	for (from, to) in REFERENCE_FOLDS {
		text.replace(from, to);
	}

	compress::apply_synonyms(&mut text);

	text
}

/// Sorted unique non-stop-word tokens with at least `min_chars` chars.
pub fn salient_keywords(text: &NormalizedText, min_chars: usize) -> Vec<String> {
	text.tokens()
		.iter()
		.filter(|token| char_len(token) >= min_chars && !STOP_WORDS.contains(&token.as_str()))
		.cloned()
		.collect::<BTreeSet<_>>()
		.into_iter()
		.collect()
}

pub fn build_cache_keys(
	query: &str,
	intent: Intent,
	top_k: usize,
	context: ContextFingerprint,
	pattern_min_chars: usize,
) -> Result<CacheKeys> {
	let normalized = normalize_for_key(query);
	let exact = hash_cache_key(&serde_json::json!({
		"kind": "exact",
		"query": normalized.as_str(),
		"intent": intent.as_str(),
		"context": context,
		"top_k": top_k,
	}))?;
	let keywords = salient_keywords(&normalized, pattern_min_chars);
	let pattern = if keywords.len() >= MIN_PATTERN_KEYWORDS {
		let hash = hash_cache_key(&serde_json::json!({
			"kind": "pattern",
			"keywords": keywords,
			"intent": intent.as_str(),
			"has_history": context.has_history,
			"top_k": top_k,
		}))?;

		Some(PatternKey { key: format!("{PATTERN_PREFIX}{hash}"), text: keywords.join(" ") })
	} else {
		None
	};

	Ok(CacheKeys { exact, pattern })
}

pub fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Storage {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn cache_key_prefix(key: &str) -> &str {
	let key = key.strip_prefix(PATTERN_PREFIX).unwrap_or(key);

	&key[..key.len().min(12)]
}

#[cfg(test)]
mod tests {
	use super::*;

	fn keys(query: &str, context: &SessionContext) -> CacheKeys {
		build_cache_keys(
			query,
			Intent::SymptomAnalysis,
			5,
			ContextFingerprint::new(context, MedicalDomain::Neurology),
			4,
		)
		.expect("Failed to build cache keys.")
	}

	#[test]
	fn paraphrases_share_an_exact_key() {
		let empty = SessionContext::default();
		let left = keys("Tôi bị nhức đầu, chóng mặt", &empty);
		let right = keys("nhức đầu chóng mặt", &empty);
		let folded = keys("đau đầu chóng mặt", &empty);

		assert_eq!(left.exact, right.exact);
		assert_eq!(right.exact, folded.exact);
	}

	#[test]
	fn history_separates_exact_and_pattern_keys() {
		let query = "triệu chứng tiểu đường thường gặp";
		let empty = SessionContext::default();
		let one_entity =
			SessionContext { mentioned_entities: vec!["sốt".to_string()], turn_count: 2 };
		let three_entities = SessionContext {
			mentioned_entities: vec!["sốt".to_string(), "ho".to_string(), "đau đầu".to_string()],
			turn_count: 4,
		};
		let cold = keys(query, &empty);
		let warm = keys(query, &one_entity);
		let warmer = keys(query, &three_entities);

		assert_ne!(cold.exact, warm.exact);
		assert_ne!(warm.exact, warmer.exact);
		assert!(cold.pattern.is_some());
		assert_ne!(cold.pattern, warm.pattern);
		assert_eq!(warm.pattern, warmer.pattern);
	}

	#[test]
	fn turns_without_entities_count_as_history() {
		let turns_only = SessionContext { mentioned_entities: Vec::new(), turn_count: 1 };
		let fingerprint = ContextFingerprint::new(&turns_only, MedicalDomain::General);

		assert!(fingerprint.has_history);
		assert_eq!(fingerprint.entity_count, 0);
	}

	#[test]
	fn pattern_keys_ignore_word_order() {
		let empty = SessionContext::default();
		let left = keys("triệu chứng tiểu đường", &empty);
		let right = keys("tiểu đường triệu chứng", &empty);
		let pattern = left.pattern.expect("Expected a pattern key.");

		assert!(pattern.key.starts_with("pattern:"));
		assert_eq!(Some(pattern), right.pattern);
	}

	#[test]
	fn short_queries_have_no_pattern_key() {
		assert!(keys("sốt cao", &SessionContext::default()).pattern.is_none());
	}

	#[test]
	fn cache_key_prefix_is_stable() {
		assert_eq!(cache_key_prefix("abcd1234efgh5678"), "abcd1234efgh");
		assert_eq!(cache_key_prefix("pattern:abcd1234efgh5678"), "abcd1234efgh");
		assert_eq!(cache_key_prefix("abc"), "abc");
	}
}
