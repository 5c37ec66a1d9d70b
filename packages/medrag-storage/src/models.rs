use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One retrievable unit of knowledge-base text. Produced by ingestion, read-only here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
	pub id: u64,
	pub text: String,
	#[serde(default)]
	pub metadata: PassageMetadata,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassageMetadata {
	pub entity_name: Option<String>,
	/// Classification code, e.g. an ICD code.
	pub code: Option<String>,
	pub category: Option<String>,
	pub browser_url: Option<String>,
	pub authoritative: bool,
	#[serde(flatten)]
	pub extra: BTreeMap<String, MetadataValue>,
}
impl PassageMetadata {
	pub fn has_code(&self) -> bool {
		self.code.as_deref().is_some_and(|code| !code.trim().is_empty())
	}

	/// Whether the source URL points at a recognized clinical reference.
	pub fn has_authoritative_url(&self) -> bool {
		const AUTHORITATIVE_HOSTS: [&str; 4] = ["who.int", "icd", "moh.gov.vn", "nih.gov"];

		self.browser_url.as_deref().is_some_and(|url| {
			let url = url.to_lowercase();

			AUTHORITATIVE_HOSTS.iter().any(|host| url.contains(host))
		})
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
	Bool(bool),
	Number(f64),
	Text(String),
}
impl MetadataValue {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Text(text) => Some(text),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unknown_metadata_keys_land_in_extra() {
		let passage: Passage = serde_json::from_value(serde_json::json!({
			"id": 7,
			"text": "Đau nửa đầu",
			"metadata": {
				"code": "G43",
				"browser_url": "https://icd.who.int/browse11/l-m/en#/G43",
				"chapter": "06",
				"verified": true,
				"depth": 3
			}
		}))
		.expect("Failed to decode passage.");

		assert!(passage.metadata.has_code());
		assert!(passage.metadata.has_authoritative_url());
		assert!(!passage.metadata.authoritative);
		assert_eq!(passage.metadata.extra["chapter"].as_str(), Some("06"));
		assert_eq!(passage.metadata.extra["verified"], MetadataValue::Bool(true));
		assert_eq!(passage.metadata.extra["depth"], MetadataValue::Number(3.0));
	}
}
