use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub compression: Compression,
	pub lexical: Lexical,
	pub fusion: Fusion,
	pub cache: Cache,
	pub confidence: Confidence,
	pub relevance: Relevance,
	pub suggestions: Suggestions,
	pub performance: Performance,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string() }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Storage {
	/// One of "memory" or "qdrant".
	pub vector_backend: String,
	pub qdrant: Option<Qdrant>,
}
impl Default for Storage {
	fn default() -> Self {
		Self { vector_backend: "memory".to_string(), qdrant: None }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Providers {
	/// One of "hash" or "http".
	pub embedder: String,
	pub hash_dimensions: u32,
	pub embedding: Option<EmbeddingProviderConfig>,
}
impl Default for Providers {
	fn default() -> Self {
		Self { embedder: "hash".to_string(), hash_dimensions: 256, embedding: None }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub top_k: u32,
	/// Each index branch keeps at most `top_k * candidate_multiplier` hits. At most 20.
	pub candidate_multiplier: u32,
	pub semantic_timeout_ms: u64,
	pub lexical_timeout_ms: u64,
	pub query_timeout_ms: u64,
	/// Defaults to the available parallelism clamped to 3..=6.
	pub worker_pool_size: Option<usize>,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			top_k: 5,
			candidate_multiplier: 2,
			semantic_timeout_ms: 1_500,
			lexical_timeout_ms: 500,
			query_timeout_ms: 5_000,
			worker_pool_size: None,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Compression {
	pub budget_chars: usize,
	pub memo_capacity: u64,
	pub domain_bonus: usize,
}
impl Default for Compression {
	fn default() -> Self {
		Self { budget_chars: 50, memo_capacity: 500, domain_bonus: 5 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Lexical {
	pub k1: f32,
	pub b: f32,
}
impl Default for Lexical {
	fn default() -> Self {
		Self { k1: 1.2, b: 0.4 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Fusion {
	pub max_domain_boost: f32,
	pub weights: StrategyWeights,
}
impl Default for Fusion {
	fn default() -> Self {
		Self { max_domain_boost: 0.3, weights: StrategyWeights::default() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct WeightPreset {
	pub semantic: f32,
	pub lexical: f32,
}
impl WeightPreset {
	pub const fn new(semantic: f32, lexical: f32) -> Self {
		Self { semantic, lexical }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyWeights {
	pub emergency: WeightPreset,
	pub multi_symptom: WeightPreset,
	pub disease_focused: WeightPreset,
	pub treatment_focused: WeightPreset,
	pub prevention_focused: WeightPreset,
	pub general: WeightPreset,
}
impl StrategyWeights {
	pub fn presets(&self) -> [(&'static str, WeightPreset); 6] {
		[
			("emergency", self.emergency),
			("multi_symptom", self.multi_symptom),
			("disease_focused", self.disease_focused),
			("treatment_focused", self.treatment_focused),
			("prevention_focused", self.prevention_focused),
			("general", self.general),
		]
	}
}
impl Default for StrategyWeights {
	fn default() -> Self {
		Self {
			emergency: WeightPreset::new(0.8, 0.2),
			multi_symptom: WeightPreset::new(0.6, 0.4),
			disease_focused: WeightPreset::new(0.7, 0.3),
			treatment_focused: WeightPreset::new(0.5, 0.5),
			prevention_focused: WeightPreset::new(0.7, 0.3),
			general: WeightPreset::new(0.7, 0.3),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub enabled: bool,
	pub l1_capacity: usize,
	pub l2_capacity: usize,
	pub l3_capacity: usize,
	pub ttl_secs: u64,
	/// Pattern keys live `ttl_secs * pattern_ttl_multiplier` seconds.
	pub pattern_ttl_multiplier: u32,
	pub promote_to_l1_after: u32,
	/// Minimum keyword length, in chars, for a keyword to enter a pattern key.
	pub pattern_min_chars: usize,
}
impl Default for Cache {
	fn default() -> Self {
		Self {
			enabled: true,
			l1_capacity: 100,
			l2_capacity: 500,
			l3_capacity: 2_000,
			ttl_secs: 1_800,
			pattern_ttl_multiplier: 2,
			promote_to_l1_after: 5,
			pattern_min_chars: 4,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Confidence {
	pub weights: ConfidenceWeights,
	pub levels: ConfidenceLevels,
	pub adjustments: ConfidenceAdjustments,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
	pub search_relevance: f32,
	pub intent_clarity: f32,
	pub context_usage: f32,
	pub domain_match: f32,
	pub entity_quality: f32,
	pub source_quality: f32,
}
impl ConfidenceWeights {
	pub fn total(&self) -> f32 {
		self.search_relevance
			+ self.intent_clarity
			+ self.context_usage
			+ self.domain_match
			+ self.entity_quality
			+ self.source_quality
	}
}
impl Default for ConfidenceWeights {
	fn default() -> Self {
		Self {
			search_relevance: 0.35,
			intent_clarity: 0.20,
			context_usage: 0.15,
			domain_match: 0.15,
			entity_quality: 0.10,
			source_quality: 0.05,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfidenceLevels {
	pub high: f32,
	pub medium: f32,
	pub low: f32,
}
impl Default for ConfidenceLevels {
	fn default() -> Self {
		Self { high: 0.8, medium: 0.6, low: 0.4 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfidenceAdjustments {
	pub emergency_multiplier: f32,
	pub emergency_min_relevance: f32,
	pub low_relevance_multiplier: f32,
	pub low_relevance_threshold: f32,
	pub domain_match_multiplier: f32,
	pub domain_match_threshold: f32,
	pub context_multiplier: f32,
	pub context_threshold: f32,
}
impl Default for ConfidenceAdjustments {
	fn default() -> Self {
		Self {
			emergency_multiplier: 1.10,
			emergency_min_relevance: 0.6,
			low_relevance_multiplier: 0.80,
			low_relevance_threshold: 0.3,
			domain_match_multiplier: 1.05,
			domain_match_threshold: 0.8,
			context_multiplier: 1.03,
			context_threshold: 0.8,
		}
	}
}

/// Post-fusion filter that drops passages with little medical content and re-ranks the rest.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Relevance {
	pub enabled: bool,
	pub min_relevance: f32,
	/// Share of the re-ranking score taken by medical relevance; the fused score takes the rest.
	pub blend_weight: f32,
}
impl Default for Relevance {
	fn default() -> Self {
		Self { enabled: false, min_relevance: 0.1, blend_weight: 0.4 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Suggestions {
	pub enabled: bool,
	pub max_suggestions: usize,
}
impl Default for Suggestions {
	fn default() -> Self {
		Self { enabled: true, max_suggestions: 5 }
	}
}

/// Rolling per-query latency record.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Performance {
	pub enabled: bool,
	/// Number of most recent queries the statistics cover.
	pub window: usize,
	/// Records kept in memory; older ones are dropped first.
	pub retain: usize,
	pub target_search_ms: u64,
	pub target_total_ms: u64,
	/// Average total latency above which the service counts as very slow.
	pub slow_total_ms: u64,
}
impl Default for Performance {
	fn default() -> Self {
		Self {
			enabled: true,
			window: 100,
			retain: 1_000,
			target_search_ms: 2_000,
			target_total_ms: 3_000,
			slow_total_ms: 5_000,
		}
	}
}
