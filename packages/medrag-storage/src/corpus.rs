use std::{collections::HashMap, fs, path::Path, sync::Arc};

use crate::{Error, Passage, Result};

/// The passage collection both indexes are built over. Passage order is the lexical index
/// ordering.
#[derive(Clone, Debug, Default)]
pub struct Corpus {
	passages: Vec<Arc<Passage>>,
	positions: HashMap<u64, usize>,
}
impl Corpus {
	pub fn new(passages: Vec<Passage>) -> Result<Self> {
		let mut positions = HashMap::with_capacity(passages.len());

		for (position, passage) in passages.iter().enumerate() {
			if positions.insert(passage.id, position).is_some() {
				return Err(Error::Conflict(format!("Duplicate passage id {}.", passage.id)));
			}
		}

		Ok(Self { passages: passages.into_iter().map(Arc::new).collect(), positions })
	}

	/// Reads a JSON array of passages.
	pub fn load(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|err| Error::ReadCorpus { path: path.to_path_buf(), source: err })?;
		let passages: Vec<Passage> = serde_json::from_str(&raw)
			.map_err(|err| Error::ParseCorpus { path: path.to_path_buf(), source: err })?;
		let corpus = Self::new(passages)?;

		tracing::debug!(passages = corpus.len(), path = %path.display(), "Corpus loaded.");

		Ok(corpus)
	}

	pub fn len(&self) -> usize {
		self.passages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.passages.is_empty()
	}

	pub fn passages(&self) -> &[Arc<Passage>] {
		&self.passages
	}

	pub fn get(&self, id: u64) -> Option<&Arc<Passage>> {
		self.positions.get(&id).map(|position| &self.passages[*position])
	}

	pub fn position(&self, id: u64) -> Option<usize> {
		self.positions.get(&id).copied()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::PassageMetadata;

	fn passage(id: u64, text: &str) -> Passage {
		Passage { id, text: text.to_string(), metadata: PassageMetadata::default() }
	}

	#[test]
	fn rejects_duplicate_ids() {
		let err = Corpus::new(vec![passage(1, "sốt"), passage(1, "ho")])
			.expect_err("Expected duplicate ids to be rejected.");

		assert!(matches!(err, Error::Conflict(_)));
	}

	#[test]
	fn positions_follow_input_order() {
		let corpus = Corpus::new(vec![passage(9, "sốt"), passage(3, "ho")])
			.expect("Failed to build corpus.");

		assert_eq!(corpus.position(3), Some(1));
		assert_eq!(corpus.get(9).map(|passage| passage.text.as_str()), Some("sốt"));
		assert!(corpus.get(4).is_none());
	}
}
