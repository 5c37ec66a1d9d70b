use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
};

use proptest::prelude::*;

use medrag_storage::{Bm25Index, Bm25Params, Corpus, Error, MemoryVectorIndex};

fn write_temp_corpus(payload: &str) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let mut path = env::temp_dir();

	path.push(format!("medrag_corpus_test_{}_{ordinal}.json", std::process::id()));

	fs::write(&path, payload).expect("Failed to write test corpus.");

	path
}

#[test]
fn loads_corpus_and_scores_in_file_order() {
	let path = write_temp_corpus(
		r#"[
			{ "id": 30, "text": "Đau đầu do căng thẳng", "metadata": { "code": "G44.2" } },
			{ "id": 10, "text": "Chóng mặt tư thế", "metadata": { "authoritative": true } },
			{ "id": 20, "text": "Gãy xương cẳng tay" }
		]"#,
	);
	let corpus = Corpus::load(&path).expect("Failed to load corpus.");

	fs::remove_file(&path).expect("Failed to remove test corpus.");

	let scores = Bm25Index::build(&corpus, Bm25Params::default())
		.score(&medrag_domain::tokenize("đau đầu"));

	assert_eq!(corpus.passages().iter().map(|passage| passage.id).collect::<Vec<_>>(), vec![
		30, 10, 20
	]);
	assert!(scores[0] > 0.0);
	assert_eq!(&scores[1..], &[0.0, 0.0]);
	assert!(corpus.get(10).is_some_and(|passage| passage.metadata.authoritative));
}

#[test]
fn malformed_corpus_reports_path() {
	let path = write_temp_corpus("{ \"id\": 1 }");
	let err = Corpus::load(&path).expect_err("Expected parse failure.");

	fs::remove_file(&path).expect("Failed to remove test corpus.");

	assert!(matches!(err, Error::ParseCorpus { .. }));
	assert!(err.to_string().contains("medrag_corpus_test_"));
}

proptest! {
	#[test]
	fn vector_search_is_sorted_and_bounded(
		vectors in prop::collection::vec(prop::collection::vec(-1.0_f32..1.0, 4), 0..20),
		k in 0_usize..25,
	) {
		let mut index = MemoryVectorIndex::new(4);

		for (id, vector) in vectors.iter().enumerate() {
			index.insert(id as u64, vector.clone()).expect("Failed to insert.");
		}

		let hits = index.search(&[0.5, -0.25, 1.0, 0.0], k).expect("Search failed.");

		prop_assert_eq!(hits.len(), k.min(vectors.len()));

		for pair in hits.windows(2) {
			prop_assert!(pair[0].1 <= pair[1].1);
		}
		for (_, distance) in &hits {
			prop_assert!((0.0..=2.0).contains(distance));
		}
	}
}
