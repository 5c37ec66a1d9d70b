//! Query compression: a bounded, deterministic rewrite of the raw query that keeps every
//! critical medical term the budget has room for.

use std::{cmp::Reverse, sync::Arc};

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use medrag_domain::{
	NormalizedText, char_len, truncate_chars,
	vocabulary::{
		COMPRESSION_INTENT_PATTERNS, CRITICAL_TERMS, FILLER_PHRASES, STOP_WORDS, SYNONYMS,
		is_domain_token,
	},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompressedQuery {
	pub original: String,
	pub compressed: String,
	/// Critical terms first, then the remaining tokens by importance.
	pub keywords: Vec<String>,
	pub critical_terms: Vec<String>,
	pub compression_ratio: f32,
	pub intent_hint: Option<String>,
}
impl CompressedQuery {
	/// Critical terms that were found but did not fit the budget.
	pub fn dropped_terms(&self) -> Vec<&str> {
		let compressed = NormalizedText::new(&self.compressed);

		self.critical_terms
			.iter()
			.map(String::as_str)
			.filter(|term| !compressed.contains(term))
			.collect()
	}

	/// Text handed to the indexes. Falls back to the original when compression emptied it.
	pub fn search_text(&self) -> &str {
		if self.compressed.trim().is_empty() { self.original.trim() } else { &self.compressed }
	}
}

#[derive(Debug, thiserror::Error)]
enum CompressionFailure {
	#[error("Compression budget is zero.")]
	ZeroBudget,
	#[error("Compression removed every token.")]
	Empty,
}

/// Memoizing front of [`compress`].
pub struct QueryCompressor {
	budget: usize,
	domain_bonus: usize,
	memo: Cache<(String, usize), Arc<CompressedQuery>>,
}
impl QueryCompressor {
	pub fn new(cfg: &medrag_config::Compression) -> Self {
		Self {
			budget: cfg.budget_chars,
			domain_bonus: cfg.domain_bonus,
			memo: Cache::builder().max_capacity(cfg.memo_capacity).build(),
		}
	}

	pub fn budget(&self) -> usize {
		self.budget
	}

	pub fn compress(&self, raw: &str) -> Arc<CompressedQuery> {
		self.compress_with_budget(raw, self.budget)
	}

	pub fn compress_with_budget(&self, raw: &str, budget: usize) -> Arc<CompressedQuery> {
		self.memo.get_with((raw.to_string(), budget), || {
			Arc::new(compress(raw, budget, self.domain_bonus))
		})
	}
}

/// Pure compression. Never fails: internal failures fall back to truncating the original.
pub fn compress(raw: &str, budget: usize, domain_bonus: usize) -> CompressedQuery {
	let trimmed = raw.trim();

	if trimmed.is_empty() {
		return CompressedQuery {
			original: raw.to_string(),
			compressed: String::new(),
			keywords: Vec::new(),
			critical_terms: Vec::new(),
			compression_ratio: 1.0,
			intent_hint: None,
		};
	}

	match try_compress(raw, budget, domain_bonus) {
		Ok(compressed) => compressed,
		Err(err) => {
			tracing::debug!(error = %err, budget, "Compression fell back to truncation.");

			let compressed = truncate_chars(trimmed, budget).to_string();

			CompressedQuery {
				compression_ratio: ratio(&compressed, trimmed),
				original: raw.to_string(),
				compressed,
				keywords: Vec::new(),
				critical_terms: Vec::new(),
				intent_hint: None,
			}
		},
	}
}

fn try_compress(
	raw: &str,
	budget: usize,
	domain_bonus: usize,
) -> Result<CompressedQuery, CompressionFailure> {
	if budget == 0 {
		return Err(CompressionFailure::ZeroBudget);
	}

	let mut text = NormalizedText::new(raw);
	let intent_hint = detect_intent_hint(&text);
	let mut critical_terms = find_critical_terms(&text);

	apply_synonyms(&mut text);

	for term in find_critical_terms(&text) {
		if !critical_terms.contains(&term) {
			critical_terms.push(term);
		}
	}

	strip_noise(&mut text);

	let tokens = rank_tokens(&text, domain_bonus);
	let mut pieces: Vec<&str> = Vec::new();
	let mut used = 0_usize;

	for term in &critical_terms {
		let cost = char_len(term) + usize::from(!pieces.is_empty());

		if used + cost <= budget {
			pieces.push(term);

			used += cost;
		}
	}

	for token in &tokens {
		if pieces.iter().any(|piece| piece.split(' ').any(|word| word == token)) {
			continue;
		}

		let cost = char_len(token) + usize::from(!pieces.is_empty());

		if used + cost > budget {
			break;
		}

		pieces.push(token);

		used += cost;
	}

	if pieces.is_empty() {
		return Err(CompressionFailure::Empty);
	}

	let compressed = pieces.join(" ");
	let mut keywords = critical_terms.clone();

	for token in tokens {
		if !critical_terms.iter().any(|term| term.split(' ').any(|word| word == token)) {
			keywords.push(token);
		}
	}

	Ok(CompressedQuery {
		compression_ratio: ratio(&compressed, raw.trim()),
		original: raw.to_string(),
		compressed,
		keywords,
		critical_terms,
		intent_hint,
	})
}

/// Critical terms by first token position; at the same position the longer term wins and
/// terms inside an accepted span are skipped.
fn find_critical_terms(text: &NormalizedText) -> Vec<String> {
	let mut found: Vec<(usize, usize, &str)> = CRITICAL_TERMS
		.iter()
		.filter_map(|term| {
			let start = text.find(term)?;

			Some((start, term.split(' ').count(), *term))
		})
		.collect();

	found.sort_by_key(|(start, len, _)| (*start, Reverse(*len)));

	let mut spans: Vec<(usize, usize)> = Vec::new();
	let mut terms = Vec::new();

	for (start, len, term) in found {
		let end = start + len;

		if spans.iter().any(|(s, e)| *s <= start && end <= *e) {
			continue;
		}

		spans.push((start, end));
		terms.push(term.to_string());
	}

	terms
}

pub(crate) fn apply_synonyms(text: &mut NormalizedText) {
	let mut table: Vec<&(&str, &str)> = SYNONYMS.iter().collect();

	table.sort_by_key(|(from, _)| Reverse(char_len(from)));

	for (from, to) in table {
		text.replace(from, to);
	}
}

fn strip_noise(text: &mut NormalizedText) {
	for phrase in FILLER_PHRASES {
		text.replace(phrase, "");
	}
	for phrase in STOP_WORDS.iter().filter(|word| word.contains(' ')) {
		text.replace(phrase, "");
	}

	text.retain_tokens(|token| !STOP_WORDS.contains(&token) && char_len(token) > 1);
}

fn rank_tokens(text: &NormalizedText, domain_bonus: usize) -> Vec<String> {
	let mut scored: Vec<(usize, &str)> = text
		.tokens()
		.iter()
		.map(|token| {
			let bonus = if is_domain_token(token) { domain_bonus } else { 0 };

			(char_len(token) + bonus, token.as_str())
		})
		.collect();

	scored.sort_by_key(|(score, _)| Reverse(*score));

	let mut ranked: Vec<String> = Vec::with_capacity(scored.len());

	for (_, token) in scored {
		if !ranked.iter().any(|existing| existing == token) {
			ranked.push(token.to_string());
		}
	}

	ranked
}

fn detect_intent_hint(text: &NormalizedText) -> Option<String> {
	COMPRESSION_INTENT_PATTERNS
		.iter()
		.find(|(_, patterns)| text.contains_any(*patterns))
		.map(|(intent, _)| intent.to_string())
}

fn ratio(compressed: &str, original: &str) -> f32 {
	let original_len = char_len(original);

	if original_len == 0 { 1.0 } else { char_len(compressed) as f32 / original_len as f32 }
}

/// Aggregate view over a batch of compressions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompressionReport {
	pub count: usize,
	pub average_ratio: f32,
	pub dropped_critical_terms: usize,
	pub recommendations: Vec<String>,
}

pub fn compression_report(compressions: &[CompressedQuery]) -> CompressionReport {
	let count = compressions.len();

	if count == 0 {
		return CompressionReport {
			count,
			average_ratio: 1.0,
			dropped_critical_terms: 0,
			recommendations: Vec::new(),
		};
	}

	let average_ratio =
		compressions.iter().map(|query| query.compression_ratio).sum::<f32>() / count as f32;
	let dropped_critical_terms: usize =
		compressions.iter().map(|query| query.dropped_terms().len()).sum();
	let mut recommendations = Vec::new();

	if average_ratio > 0.8 {
		recommendations.push("Queries can be compressed further; lower the budget.".to_string());
	}
	if average_ratio < 0.3 {
		recommendations
			.push("Compression is aggressive; check that query meaning survives.".to_string());
	}
	if dropped_critical_terms > 0 {
		recommendations.push(format!(
			"Budget too tight: {dropped_critical_terms} critical terms were dropped."
		));
	}
	if compressions.iter().any(|query| query.critical_terms.is_empty()) {
		recommendations.push("Some queries contain no critical medical terms.".to_string());
	}
	if compressions.iter().any(|query| query.intent_hint.is_none()) {
		recommendations.push("Some queries carry no intent keywords.".to_string());
	}
	if compressions.iter().any(|query| query.keywords.len() < 3) {
		recommendations.push("Some queries yield fewer than three keywords.".to_string());
	}

	CompressionReport { count, average_ratio, dropped_critical_terms, recommendations }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_symptoms_and_drops_fillers() {
		let query = compress("Bác sĩ ơi, tôi bị đau đầu và chóng mặt có sao không?", 50, 5);

		assert_eq!(query.critical_terms, vec!["đau đầu", "chóng mặt"]);
		assert!(query.compressed.starts_with("đau đầu chóng mặt"));
		assert!(!query.compressed.contains("không"));
		assert!(query.compression_ratio < 1.0);
	}

	#[test]
	fn synonyms_collapse_to_canonical_terms() {
		let query = compress("bị tăng huyết áp lâu năm", 50, 5);

		assert_eq!(query.critical_terms, vec!["cao huyết áp"]);
		assert!(query.compressed.starts_with("cao huyết áp"));
	}

	#[test]
	fn longer_critical_term_covers_its_prefix() {
		let query = compress("bệnh tim mạch", 50, 5);

		assert_eq!(query.critical_terms, vec!["tim mạch"]);
	}

	#[test]
	fn budget_is_respected() {
		let query = compress("đau bụng tiêu chảy buồn nôn mệt mỏi sốt cao kéo dài", 20, 5);

		assert!(char_len(&query.compressed) <= 20);
		assert!(query.compressed.starts_with("đau bụng tiêu chảy"));
		assert_eq!(query.dropped_terms(), vec!["buồn nôn", "mệt mỏi", "sốt"]);
	}

	#[test]
	fn all_stop_words_fall_back_to_truncation() {
		let query = compress("xin chào bác sĩ ơi", 8, 5);

		assert_eq!(query.compressed, "xin chào");
		assert!(query.keywords.is_empty());
	}

	#[test]
	fn unshortened_fallback_has_unit_ratio() {
		let query = compress("  cho em hỏi  ", 50, 5);

		assert_eq!(query.compressed, "cho em hỏi");
		assert_eq!(query.compression_ratio, 1.0);
	}

	#[test]
	fn empty_input_is_a_valid_query() {
		let query = compress("   ", 50, 5);

		assert!(query.compressed.is_empty());
		assert_eq!(query.compression_ratio, 1.0);
	}

	#[test]
	fn zero_budget_truncates_to_nothing() {
		let query = compress("sốt", 0, 5);

		assert!(query.compressed.is_empty());
		assert_eq!(query.compression_ratio, 0.0);
	}

	#[test]
	fn intent_hint_follows_pattern_priority() {
		assert_eq!(
			compress("cách chữa sốt", 50, 5).intent_hint.as_deref(),
			Some("treatment")
		);
		assert_eq!(compress("cấp cứu ngay", 50, 5).intent_hint.as_deref(), Some("emergency"));
		assert_eq!(compress("xin chào", 50, 5).intent_hint, None);
	}

	#[test]
	fn memo_returns_the_same_allocation() {
		let compressor = QueryCompressor::new(&medrag_config::Compression::default());
		let first = compressor.compress("đau đầu");
		let second = compressor.compress("đau đầu");

		assert!(Arc::ptr_eq(&first, &second));
	}

	#[test]
	fn report_flags_dropped_terms() {
		let queries = vec![
			compress("đau bụng tiêu chảy buồn nôn mệt mỏi sốt cao kéo dài", 20, 5),
			compress("xin chào", 50, 5),
		];
		let report = compression_report(&queries);

		assert_eq!(report.count, 2);
		assert_eq!(report.dropped_critical_terms, 3);
		assert!(report.recommendations.iter().any(|line| line.starts_with("Budget too tight")));
	}
}
