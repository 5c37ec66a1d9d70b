mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Compression, Confidence, ConfidenceAdjustments, ConfidenceLevels, ConfidenceWeights,
	Config, EmbeddingProviderConfig, Fusion, Lexical, Performance, Providers, Qdrant, Relevance,
	Retrieval, Service, Storage, StrategyWeights, Suggestions, WeightPreset,
};

use std::{fs, path::Path};

const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;
const MAX_CANDIDATE_MULTIPLIER: u32 = 20;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(path, &raw)
}

pub fn parse(path: &Path, raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::validation("service.log_level must be non-empty."));
	}

	validate_storage(cfg)?;
	validate_providers(cfg)?;
	validate_retrieval(cfg)?;

	if cfg.compression.budget_chars == 0 {
		return Err(Error::validation("compression.budget_chars must be greater than zero."));
	}
	if cfg.compression.memo_capacity == 0 {
		return Err(Error::validation("compression.memo_capacity must be greater than zero."));
	}
	if !cfg.lexical.k1.is_finite() || cfg.lexical.k1 < 0.0 {
		return Err(Error::validation("lexical.k1 must be a finite number zero or greater."));
	}
	if !(0.0..=1.0).contains(&cfg.lexical.b) {
		return Err(Error::validation("lexical.b must be in the range 0.0-1.0."));
	}

	validate_fusion(cfg)?;
	validate_cache(cfg)?;
	validate_confidence(cfg)?;
	validate_quality(cfg)?;

	Ok(())
}

fn validate_storage(cfg: &Config) -> Result<()> {
	match cfg.storage.vector_backend.as_str() {
		"memory" => Ok(()),
		"qdrant" => {
			let Some(qdrant) = cfg.storage.qdrant.as_ref() else {
				return Err(Error::validation(
					"storage.qdrant must be set when storage.vector_backend is qdrant.",
				));
			};

			if qdrant.url.trim().is_empty() {
				return Err(Error::validation("storage.qdrant.url must be non-empty."));
			}
			if qdrant.collection.trim().is_empty() {
				return Err(Error::validation("storage.qdrant.collection must be non-empty."));
			}
			if qdrant.vector_dim != embedding_dimensions(cfg) {
				return Err(Error::validation(
					"storage.qdrant.vector_dim must match the embedder dimensions.",
				));
			}

			Ok(())
		},
		_ => Err(Error::validation("storage.vector_backend must be one of memory or qdrant.")),
	}
}

fn validate_providers(cfg: &Config) -> Result<()> {
	match cfg.providers.embedder.as_str() {
		"hash" =>
			if cfg.providers.hash_dimensions == 0 {
				return Err(Error::validation(
					"providers.hash_dimensions must be greater than zero.",
				));
			},
		"http" => {
			let Some(embedding) = cfg.providers.embedding.as_ref() else {
				return Err(Error::validation(
					"providers.embedding must be set when providers.embedder is http.",
				));
			};

			if embedding.api_key.trim().is_empty() {
				return Err(Error::validation("providers.embedding.api_key must be non-empty."));
			}
			if embedding.api_base.trim().is_empty() {
				return Err(Error::validation("providers.embedding.api_base must be non-empty."));
			}
			if embedding.dimensions == 0 {
				return Err(Error::validation(
					"providers.embedding.dimensions must be greater than zero.",
				));
			}
			if embedding.timeout_ms == 0 {
				return Err(Error::validation(
					"providers.embedding.timeout_ms must be greater than zero.",
				));
			}
		},
		_ => return Err(Error::validation("providers.embedder must be one of hash or http.")),
	}

	Ok(())
}

fn validate_retrieval(cfg: &Config) -> Result<()> {
	let retrieval = &cfg.retrieval;

	for (label, value) in [
		("retrieval.top_k", u64::from(retrieval.top_k)),
		("retrieval.candidate_multiplier", u64::from(retrieval.candidate_multiplier)),
		("retrieval.semantic_timeout_ms", retrieval.semantic_timeout_ms),
		("retrieval.lexical_timeout_ms", retrieval.lexical_timeout_ms),
		("retrieval.query_timeout_ms", retrieval.query_timeout_ms),
	] {
		if value == 0 {
			return Err(Error::validation(format!("{label} must be greater than zero.")));
		}
	}

	if retrieval.candidate_multiplier > MAX_CANDIDATE_MULTIPLIER {
		return Err(Error::validation(format!(
			"retrieval.candidate_multiplier must be at most {MAX_CANDIDATE_MULTIPLIER}."
		)));
	}
	if retrieval.query_timeout_ms < retrieval.semantic_timeout_ms {
		return Err(Error::validation(
			"retrieval.query_timeout_ms must be at least retrieval.semantic_timeout_ms.",
		));
	}
	if let Some(size) = retrieval.worker_pool_size
		&& size == 0
	{
		return Err(Error::validation("retrieval.worker_pool_size must be greater than zero."));
	}

	Ok(())
}

fn validate_fusion(cfg: &Config) -> Result<()> {
	let boost = cfg.fusion.max_domain_boost;

	if !boost.is_finite() || boost < 0.0 {
		return Err(Error::validation(
			"fusion.max_domain_boost must be a finite number zero or greater.",
		));
	}

	for (strategy, preset) in cfg.fusion.weights.presets() {
		for (side, weight) in [("semantic", preset.semantic), ("lexical", preset.lexical)] {
			if !weight.is_finite() || weight < 0.0 {
				return Err(Error::validation(format!(
					"fusion.weights.{strategy}.{side} must be a finite number zero or greater."
				)));
			}
		}

		if preset.semantic + preset.lexical <= 0.0 {
			return Err(Error::validation(format!(
				"fusion.weights.{strategy} must have a positive total weight."
			)));
		}
	}

	Ok(())
}

fn validate_cache(cfg: &Config) -> Result<()> {
	let cache = &cfg.cache;

	if !cache.enabled {
		return Ok(());
	}

	for (label, value) in [
		("cache.l1_capacity", cache.l1_capacity as u64),
		("cache.l2_capacity", cache.l2_capacity as u64),
		("cache.l3_capacity", cache.l3_capacity as u64),
		("cache.ttl_secs", cache.ttl_secs),
		("cache.pattern_ttl_multiplier", u64::from(cache.pattern_ttl_multiplier)),
		("cache.promote_to_l1_after", u64::from(cache.promote_to_l1_after)),
	] {
		if value == 0 {
			return Err(Error::validation(format!("{label} must be greater than zero.")));
		}
	}

	Ok(())
}

fn validate_confidence(cfg: &Config) -> Result<()> {
	let weights = &cfg.confidence.weights;

	for (label, weight) in [
		("search_relevance", weights.search_relevance),
		("intent_clarity", weights.intent_clarity),
		("context_usage", weights.context_usage),
		("domain_match", weights.domain_match),
		("entity_quality", weights.entity_quality),
		("source_quality", weights.source_quality),
	] {
		if !(0.0..=1.0).contains(&weight) {
			return Err(Error::validation(format!(
				"confidence.weights.{label} must be in the range 0.0-1.0."
			)));
		}
	}

	if (weights.total() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
		return Err(Error::validation("confidence.weights must sum to 1.0."));
	}

	let levels = &cfg.confidence.levels;

	if !(0.0 < levels.low && levels.low < levels.medium && levels.medium < levels.high)
		|| levels.high > 1.0
	{
		return Err(Error::validation(
			"confidence.levels must satisfy 0.0 < low < medium < high <= 1.0.",
		));
	}

	let adjustments = &cfg.confidence.adjustments;

	for (label, multiplier) in [
		("emergency_multiplier", adjustments.emergency_multiplier),
		("low_relevance_multiplier", adjustments.low_relevance_multiplier),
		("domain_match_multiplier", adjustments.domain_match_multiplier),
		("context_multiplier", adjustments.context_multiplier),
	] {
		if !multiplier.is_finite() || multiplier <= 0.0 {
			return Err(Error::validation(format!(
				"confidence.adjustments.{label} must be a finite number greater than zero."
			)));
		}
	}

	Ok(())
}

fn validate_quality(cfg: &Config) -> Result<()> {
	let relevance = &cfg.relevance;

	if relevance.enabled {
		if !(0.0..=1.0).contains(&relevance.min_relevance) {
			return Err(Error::validation("relevance.min_relevance must be in the range 0.0-1.0."));
		}
		if !(0.0..=1.0).contains(&relevance.blend_weight) {
			return Err(Error::validation("relevance.blend_weight must be in the range 0.0-1.0."));
		}
	}
	if cfg.suggestions.enabled && cfg.suggestions.max_suggestions == 0 {
		return Err(Error::validation("suggestions.max_suggestions must be greater than zero."));
	}

	let performance = &cfg.performance;

	if !performance.enabled {
		return Ok(());
	}

	for (label, value) in [
		("performance.window", performance.window as u64),
		("performance.target_search_ms", performance.target_search_ms),
		("performance.target_total_ms", performance.target_total_ms),
		("performance.slow_total_ms", performance.slow_total_ms),
	] {
		if value == 0 {
			return Err(Error::validation(format!("{label} must be greater than zero.")));
		}
	}

	if performance.retain < performance.window {
		return Err(Error::validation(
			"performance.retain must be at least performance.window.",
		));
	}

	Ok(())
}

fn embedding_dimensions(cfg: &Config) -> u32 {
	match (cfg.providers.embedder.as_str(), cfg.providers.embedding.as_ref()) {
		("http", Some(embedding)) => embedding.dimensions,
		_ => cfg.providers.hash_dimensions,
	}
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();
	cfg.storage.vector_backend = cfg.storage.vector_backend.trim().to_ascii_lowercase();
	cfg.providers.embedder = cfg.providers.embedder.trim().to_ascii_lowercase();

	if let Some(embedding) = cfg.providers.embedding.as_mut() {
		embedding.api_base = embedding.api_base.trim_end_matches('/').to_string();
	}
}
