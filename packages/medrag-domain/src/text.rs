use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Query or passage text after normalization, with its token sequence.
///
/// Phrase lookups work on whole tokens, so "ho" never matches inside "không".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedText {
	text: String,
	tokens: Vec<String>,
}
impl NormalizedText {
	pub fn new(raw: &str) -> Self {
		let text = normalize_text(raw);
		let tokens =
			text.split(' ').filter(|token| !token.is_empty()).map(str::to_string).collect();

		Self { text, tokens }
	}

	pub fn from_tokens(tokens: Vec<String>) -> Self {
		Self { text: tokens.join(" "), tokens }
	}

	pub fn as_str(&self) -> &str {
		&self.text
	}

	pub fn tokens(&self) -> &[String] {
		&self.tokens
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}

	pub fn contains(&self, phrase: &str) -> bool {
		self.find(phrase).is_some()
	}

	/// Token offset of the first occurrence of `phrase`.
	pub fn find(&self, phrase: &str) -> Option<usize> {
		let needle: Vec<&str> = phrase.split_whitespace().collect();

		find_tokens(&self.tokens, &needle)
	}

	pub fn count_matches<'a, I>(&self, phrases: I) -> usize
	where
		I: IntoIterator<Item = &'a &'a str>,
	{
		phrases.into_iter().filter(|phrase| self.contains(phrase)).count()
	}

	pub fn contains_any<'a, I>(&self, phrases: I) -> bool
	where
		I: IntoIterator<Item = &'a &'a str>,
	{
		phrases.into_iter().any(|phrase| self.contains(phrase))
	}

	/// Replaces every whole-token occurrence of `from` with `to`. An empty `to` deletes the
	/// phrase.
	pub fn replace(&mut self, from: &str, to: &str) -> bool {
		let needle: Vec<&str> = from.split_whitespace().collect();

		if needle.is_empty() {
			return false;
		}

		let replacement: Vec<String> = to.split_whitespace().map(str::to_string).collect();
		let mut out = Vec::with_capacity(self.tokens.len());
		let mut idx = 0;
		let mut replaced = false;

		while idx < self.tokens.len() {
			if tokens_match_at(&self.tokens, idx, &needle) {
				out.extend(replacement.iter().cloned());

				idx += needle.len();
				replaced = true;

				continue;
			}

			out.push(self.tokens[idx].clone());

			idx += 1;
		}

		if replaced {
			*self = Self::from_tokens(out);
		}

		replaced
	}

	pub fn retain_tokens<F>(&mut self, mut keep: F)
	where
		F: FnMut(&str) -> bool,
	{
		let before = self.tokens.len();

		self.tokens.retain(|token| keep(token));

		if self.tokens.len() != before {
			self.text = self.tokens.join(" ");
		}
	}
}

/// NFC normalization, lowercase, punctuation to spaces, whitespace collapsed.
///
/// Vietnamese diacritics survive because NFC keeps precomposed letters intact.
pub fn normalize_text(raw: &str) -> String {
	let lowered: String = raw.nfc().collect::<String>().to_lowercase().nfc().collect();
	let mut cleaned = String::with_capacity(lowered.len());

	for ch in lowered.chars() {
		if ch.is_alphanumeric() || ch.is_whitespace() {
			cleaned.push(ch);
		} else {
			cleaned.push(' ');
		}
	}

	let mut out = String::with_capacity(cleaned.len());

	for word in cleaned.unicode_words() {
		if !out.is_empty() {
			out.push(' ');
		}

		out.push_str(word);
	}

	out
}

pub fn tokenize(raw: &str) -> Vec<String> {
	NormalizedText::new(raw).tokens
}

pub fn char_len(text: &str) -> usize {
	text.chars().count()
}

/// Truncates to at most `max_chars` chars without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((byte_idx, _)) => &text[..byte_idx],
		None => text,
	}
}

fn find_tokens(tokens: &[String], needle: &[&str]) -> Option<usize> {
	if needle.is_empty() || needle.len() > tokens.len() {
		return None;
	}

	(0..=tokens.len() - needle.len()).find(|&idx| tokens_match_at(tokens, idx, needle))
}

fn tokens_match_at(tokens: &[String], idx: usize, needle: &[&str]) -> bool {
	if idx + needle.len() > tokens.len() {
		return false;
	}

	tokens[idx..idx + needle.len()].iter().zip(needle).all(|(token, want)| token == want)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalization_keeps_vietnamese_diacritics() {
		assert_eq!(normalize_text("  Tôi bị ĐAU ĐẦU, chóng mặt!!  "), "tôi bị đau đầu chóng mặt");
	}

	#[test]
	fn decomposed_input_is_composed() {
		let decomposed = "đau đa\u{0302}\u{0300}u";

		assert_eq!(normalize_text(decomposed), "đau đầu");
	}

	#[test]
	fn phrase_lookup_respects_token_boundaries() {
		let text = NormalizedText::new("tôi không ho");

		assert!(text.contains("ho"));
		assert!(!NormalizedText::new("tôi không sao").contains("ho"));
		assert_eq!(text.find("không ho"), Some(1));
	}

	#[test]
	fn replace_rewrites_whole_phrases() {
		let mut text = NormalizedText::new("bị đái tháo đường và nhức đầu");

		assert!(text.replace("đái tháo đường", "tiểu đường"));
		assert!(text.replace("nhức đầu", "đau đầu"));
		assert_eq!(text.as_str(), "bị tiểu đường và đau đầu");
		assert!(!text.replace("ho khan", "ho"));
	}

	#[test]
	fn truncation_counts_chars_not_bytes() {
		assert_eq!(truncate_chars("đau đầu", 3), "đau");
		assert_eq!(truncate_chars("sốt", 10), "sốt");
	}
}
