//! BM25 Okapi scoring over the corpus, one score per passage in corpus order.

use std::collections::HashMap;

use crate::Corpus;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bm25Params {
	pub k1: f32,
	pub b: f32,
}
impl Default for Bm25Params {
	fn default() -> Self {
		Self { k1: 1.2, b: 0.4 }
	}
}
impl From<&medrag_config::Lexical> for Bm25Params {
	fn from(cfg: &medrag_config::Lexical) -> Self {
		Self { k1: cfg.k1, b: cfg.b }
	}
}

#[derive(Clone, Debug)]
struct Posting {
	doc: usize,
	term_frequency: u32,
}

#[derive(Clone, Debug)]
pub struct Bm25Index {
	params: Bm25Params,
	postings: HashMap<String, Vec<Posting>>,
	doc_lengths: Vec<u32>,
	avg_doc_length: f32,
}
impl Bm25Index {
	/// Indexes every passage with the same tokenizer the query side uses.
	pub fn build(corpus: &Corpus, params: Bm25Params) -> Self {
		let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
		let mut doc_lengths = Vec::with_capacity(corpus.len());

		for (doc, passage) in corpus.passages().iter().enumerate() {
			let tokens = medrag_domain::tokenize(&passage.text);
			let mut term_frequencies: HashMap<&str, u32> = HashMap::new();

			for token in &tokens {
				*term_frequencies.entry(token.as_str()).or_insert(0) += 1;
			}
			for (term, term_frequency) in term_frequencies {
				postings.entry(term.to_string()).or_default().push(Posting { doc, term_frequency });
			}

			doc_lengths.push(tokens.len() as u32);
		}

		let total: u64 = doc_lengths.iter().map(|len| u64::from(*len)).sum();
		let avg_doc_length =
			if doc_lengths.is_empty() { 0.0 } else { total as f32 / doc_lengths.len() as f32 };

		Self { params, postings, doc_lengths, avg_doc_length }
	}

	pub fn len(&self) -> usize {
		self.doc_lengths.len()
	}

	pub fn is_empty(&self) -> bool {
		self.doc_lengths.is_empty()
	}

	/// Scores aligned to corpus order. Repeated query tokens count once per occurrence.
	pub fn score(&self, tokens: &[String]) -> Vec<f32> {
		let mut scores = vec![0.0_f32; self.doc_lengths.len()];

		if self.doc_lengths.is_empty() || self.avg_doc_length <= 0.0 {
			return scores;
		}

		let n = self.doc_lengths.len() as f32;
		let Bm25Params { k1, b } = self.params;

		for token in tokens {
			let Some(postings) = self.postings.get(token) else {
				continue;
			};
			let df = postings.len() as f32;
			let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

			for posting in postings {
				let dl = self.doc_lengths[posting.doc] as f32;
				let tf = posting.term_frequency as f32;
				let tf_norm =
					(tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / self.avg_doc_length));

				scores[posting.doc] += idf * tf_norm;
			}
		}

		scores
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Passage, PassageMetadata};

	fn corpus(texts: &[&str]) -> Corpus {
		let passages = texts
			.iter()
			.enumerate()
			.map(|(idx, text)| Passage {
				id: idx as u64 + 1,
				text: text.to_string(),
				metadata: PassageMetadata::default(),
			})
			.collect();

		Corpus::new(passages).expect("Failed to build corpus.")
	}

	fn tokens(raw: &str) -> Vec<String> {
		medrag_domain::tokenize(raw)
	}

	#[test]
	fn scores_align_with_corpus_order() {
		let index = Bm25Index::build(
			&corpus(&["đau đầu kéo dài", "chóng mặt khi đứng dậy", "gãy xương tay"]),
			Bm25Params::default(),
		);
		let scores = index.score(&tokens("đau đầu chóng mặt"));

		assert_eq!(scores.len(), 3);
		assert!(scores[0] > 0.0);
		assert!(scores[1] > 0.0);
		assert_eq!(scores[2], 0.0);
	}

	#[test]
	fn higher_term_frequency_ranks_first() {
		let index =
			Bm25Index::build(&corpus(&["sốt sốt sốt", "sốt nhẹ", "ho"]), Bm25Params::default());
		let scores = index.score(&tokens("sốt"));

		assert!(scores[0] > scores[1]);
	}

	#[test]
	fn unknown_terms_and_empty_corpus_score_zero() {
		let index = Bm25Index::build(&corpus(&["ho khan"]), Bm25Params::default());

		assert_eq!(index.score(&tokens("tiểu đường")), vec![0.0]);

		let empty = Bm25Index::build(&Corpus::default(), Bm25Params::default());

		assert!(empty.score(&tokens("ho")).is_empty());
	}

	#[test]
	fn diacritics_distinguish_terms() {
		// "đau" (pain) and "dau" are different tokens.
		let index = Bm25Index::build(&corpus(&["đau bụng"]), Bm25Params::default());

		assert_eq!(index.score(&tokens("dau")), vec![0.0]);
	}
}
