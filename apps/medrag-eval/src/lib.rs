use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use medrag_service::{
	CacheStats, Degradation, Indexes, MedragService, PerformanceStats, RetrieveRequest,
	RetrieveResponse,
};
use medrag_storage::Corpus;

#[derive(Debug, Parser)]
#[command(
	version = medrag_cli::VERSION,
	rename_all = "kebab",
	styles = medrag_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, value_name = "FILE")]
	pub corpus: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	#[arg(long, value_name = "N")]
	pub top_k: Option<u32>,
	#[arg(long, value_name = "N", default_value_t = 1)]
	pub runs_per_query: u32,
	/// Overrides `providers.embedder` ("hash" or "http").
	#[arg(long, value_name = "NAME")]
	pub embedder: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	defaults: Option<EvalDefaults>,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Default, Deserialize, Clone)]
struct EvalDefaults {
	top_k: Option<u32>,
	session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	query: String,
	top_k: Option<u32>,
	session_id: Option<String>,
	expected_passage_ids: Vec<u64>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: EvalDatasetInfo,
	settings: EvalSettings,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
struct EvalDatasetInfo {
	name: String,
	query_count: usize,
}

#[derive(Debug, Serialize)]
struct EvalSettings {
	config_path: String,
	corpus_path: String,
	corpus_size: usize,
	embedder: String,
	vector_backend: String,
	top_k: u32,
	runs_per_query: u32,
	cache_enabled: bool,
}

#[derive(Debug, Serialize)]
struct EvalSummary {
	avg_recall_at_k: f64,
	avg_precision_at_k: f64,
	mean_rr: f64,
	mean_ndcg: f64,
	avg_confidence: f64,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
	first_run_latency_ms_p50: f64,
	first_run_latency_ms_p95: f64,
	cache_hits: u32,
	degraded_queries: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	stability: Option<StabilitySummary>,
	#[serde(skip_serializing_if = "Option::is_none")]
	cache: Option<CacheStats>,
	#[serde(skip_serializing_if = "Option::is_none")]
	performance: Option<PerformanceStats>,
}

#[derive(Debug, Serialize)]
struct StabilitySummary {
	runs_per_query: u32,
	avg_positional_churn_at_k: f64,
	avg_set_churn_at_k: f64,
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	query: String,
	trace_id: Uuid,
	#[serde(skip_serializing_if = "Option::is_none")]
	trace_ids: Option<Vec<Uuid>>,
	search_method: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	degradation: Option<Degradation>,
	confidence: f64,
	confidence_level: String,
	expected_count: usize,
	retrieved_count: usize,
	relevant_count: usize,
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	latency_ms: f64,
	first_run_latency_ms: f64,
	cache_hits: u32,
	expected_passage_ids: Vec<u64>,
	retrieved_passage_ids: Vec<u64>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	suggestions: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	stability: Option<QueryStability>,
}

#[derive(Debug, Serialize, Clone, Copy)]
struct QueryStability {
	runs_per_query: u32,
	positional_churn_at_k: f64,
	set_churn_at_k: f64,
}

struct Metrics {
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	relevant_count: usize,
}

struct QueryRuns {
	first: RetrieveResponse,
	latency_ms_mean: f64,
	first_latency_ms: f64,
	cache_hits: u32,
	stability: Option<QueryStability>,
	trace_ids: Vec<Uuid>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let mut config = medrag_config::load(&args.config)?;

	if let Some(embedder) = &args.embedder {
		config.providers.embedder = embedder.clone();

		medrag_config::validate(&config)?;
	}

	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let dataset = load_dataset(&args.dataset)?;
	let corpus = Arc::new(Corpus::load(&args.corpus)?);
	let indexes = Indexes::from_config(&config, &corpus).await?;
	let settings = EvalSettings {
		config_path: args.config.display().to_string(),
		corpus_path: args.corpus.display().to_string(),
		corpus_size: corpus.len(),
		embedder: config.providers.embedder.clone(),
		vector_backend: config.storage.vector_backend.clone(),
		top_k: args
			.top_k
			.or(dataset.defaults.as_ref().and_then(|d| d.top_k))
			.unwrap_or(config.retrieval.top_k),
		runs_per_query: args.runs_per_query.max(1),
		cache_enabled: config.cache.enabled,
	};
	let service = MedragService::new(config, corpus, indexes);

	tracing::info!(
		queries = dataset.queries.len(),
		runs_per_query = settings.runs_per_query,
		"Starting evaluation."
	);

	let output = evaluate(&service, &dataset, settings, args.top_k).await?;
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;

	parse_dataset(&raw)
}

fn parse_dataset(raw: &str) -> color_eyre::Result<EvalDataset> {
	let dataset: EvalDataset = serde_json::from_str(raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

async fn evaluate(
	service: &MedragService,
	dataset: &EvalDataset,
	settings: EvalSettings,
	top_k_override: Option<u32>,
) -> color_eyre::Result<EvalOutput> {
	let defaults = dataset.defaults.clone().unwrap_or_default();
	let runs_per_query = settings.runs_per_query.max(1);

	let mut reports = Vec::with_capacity(dataset.queries.len());
	let mut latencies_ms = Vec::with_capacity(dataset.queries.len());
	let mut first_latencies_ms = Vec::with_capacity(dataset.queries.len());
	let mut stability_positional = Vec::new();
	let mut stability_set = Vec::new();

	for (index, query) in dataset.queries.iter().enumerate() {
		let request = RetrieveRequest {
			query: query.query.clone(),
			top_k: top_k_override.or(query.top_k).or(defaults.top_k),
			session_id: query.session_id.clone().or_else(|| defaults.session_id.clone()),
		};
		let k = request.top_k.unwrap_or(settings.top_k).max(1) as usize;
		let runs = run_query_n_times(service, request, runs_per_query, k).await?;
		let expected: HashSet<u64> = query.expected_passage_ids.iter().copied().collect();
		let retrieved = unique_ids(runs.first.items.iter().map(|item| item.id()));
		let metrics = compute_metrics(&retrieved, &expected);

		if let Some(s) = runs.stability {
			stability_positional.push(s.positional_churn_at_k);
			stability_set.push(s.set_churn_at_k);
		}

		latencies_ms.push(runs.latency_ms_mean);
		first_latencies_ms.push(runs.first_latency_ms);

		let diagnostics = &runs.first.diagnostics;

		reports.push(QueryReport {
			id: query.id.clone().unwrap_or_else(|| format!("q{}", index + 1)),
			query: query.query.clone(),
			trace_id: diagnostics.trace_id,
			trace_ids: (runs.trace_ids.len() > 1).then_some(runs.trace_ids),
			search_method: diagnostics.search_method.as_str().to_string(),
			degradation: diagnostics.degradation.clone(),
			confidence: runs.first.confidence.overall as f64,
			confidence_level: runs.first.confidence.level.as_str().to_string(),
			expected_count: expected.len(),
			retrieved_count: retrieved.len(),
			relevant_count: metrics.relevant_count,
			recall_at_k: metrics.recall_at_k,
			precision_at_k: metrics.precision_at_k,
			rr: metrics.rr,
			ndcg: metrics.ndcg,
			latency_ms: runs.latency_ms_mean,
			first_run_latency_ms: runs.first_latency_ms,
			cache_hits: runs.cache_hits,
			expected_passage_ids: query.expected_passage_ids.clone(),
			retrieved_passage_ids: retrieved,
			suggestions: runs.first.suggestions.clone(),
			stability: runs.stability,
		});
	}

	let mut summary = summarize(&reports, &latencies_ms, &first_latencies_ms);

	if runs_per_query > 1 && !stability_positional.is_empty() {
		let count = stability_positional.len() as f64;

		summary.stability = Some(StabilitySummary {
			runs_per_query,
			avg_positional_churn_at_k: stability_positional.iter().sum::<f64>() / count,
			avg_set_churn_at_k: stability_set.iter().sum::<f64>() / count,
		});
	}

	summary.cache = service.cache_stats();
	summary.performance = service.performance_stats();

	Ok(EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "eval".to_string()),
			query_count: reports.len(),
		},
		settings,
		summary,
		queries: reports,
	})
}

/// Later runs of the same request exercise the cache; churn is measured against the first run.
async fn run_query_n_times(
	service: &MedragService,
	request: RetrieveRequest,
	runs_per_query: u32,
	k: usize,
) -> color_eyre::Result<QueryRuns> {
	let runs = runs_per_query.max(1);

	let mut first_response: Option<RetrieveResponse> = None;
	let mut first_retrieved = Vec::new();
	let mut first_latency_ms = 0.0_f64;
	let mut trace_ids = Vec::with_capacity(runs as usize);
	let mut latency_total_ms = 0.0_f64;
	let mut cache_hits = 0_u32;
	let mut positional_churn_sum = 0.0_f64;
	let mut set_churn_sum = 0.0_f64;
	let mut churn_count = 0_u32;

	for run_idx in 0..runs {
		let start = Instant::now();
		let response = service.retrieve(request.clone()).await?;
		let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;

		latency_total_ms += latency_ms;

		trace_ids.push(response.diagnostics.trace_id);

		if response.diagnostics.from_cache {
			cache_hits += 1;
		}

		let retrieved = unique_ids(response.items.iter().map(|item| item.id()));

		if run_idx == 0 {
			first_retrieved = retrieved;
			first_latency_ms = latency_ms;
			first_response = Some(response);

			continue;
		}

		let (positional_churn_at_k, set_churn_at_k) =
			churn_against_baseline_at_k(&first_retrieved, &retrieved, k);

		positional_churn_sum += positional_churn_at_k;
		set_churn_sum += set_churn_at_k;
		churn_count += 1;
	}

	let stability = (churn_count > 0).then(|| QueryStability {
		runs_per_query: runs,
		positional_churn_at_k: positional_churn_sum / churn_count as f64,
		set_churn_at_k: set_churn_sum / churn_count as f64,
	});
	let first =
		first_response.ok_or_else(|| eyre::eyre!("No retrieval responses were collected."))?;

	Ok(QueryRuns {
		first,
		latency_ms_mean: latency_total_ms / runs as f64,
		first_latency_ms,
		cache_hits,
		stability,
		trace_ids,
	})
}

/// Both churns are fractions of the shorter of `k` and the longer list.
fn churn_against_baseline_at_k(baseline: &[u64], other: &[u64], k: usize) -> (f64, f64) {
	let k = k.min(baseline.len().max(other.len()));

	if k == 0 {
		return (0.0, 0.0);
	}

	let positional_diff = (0..k).filter(|idx| baseline.get(*idx) != other.get(*idx)).count();
	let base_set: HashSet<u64> = baseline.iter().take(k).copied().collect();
	let other_set: HashSet<u64> = other.iter().take(k).copied().collect();
	let overlap = base_set.intersection(&other_set).count();

	(positional_diff as f64 / k as f64, 1.0 - overlap as f64 / k as f64)
}

fn unique_ids<I>(iter: I) -> Vec<u64>
where
	I: Iterator<Item = u64>,
{
	let mut seen = HashSet::new();

	iter.filter(|id| seen.insert(*id)).collect()
}

fn compute_metrics(retrieved: &[u64], expected: &HashSet<u64>) -> Metrics {
	let expected_count = expected.len();

	let mut relevant_count = 0_usize;
	let mut dcg = 0.0_f64;
	let mut first_hit: Option<usize> = None;

	for (idx, id) in retrieved.iter().enumerate() {
		if !expected.contains(id) {
			continue;
		}

		let rank = idx + 1;

		relevant_count += 1;
		dcg += 1.0 / (rank as f64 + 1.0).log2();

		first_hit.get_or_insert(rank);
	}

	let rr = first_hit.map_or(0.0, |rank| 1.0 / rank as f64);
	let idcg: f64 = (1..=expected_count.min(retrieved.len()))
		.map(|rank| 1.0 / (rank as f64 + 1.0).log2())
		.sum();
	let ndcg = if idcg > 0.0 { dcg / idcg } else { 0.0 };
	let precision_at_k =
		if retrieved.is_empty() { 0.0 } else { relevant_count as f64 / retrieved.len() as f64 };
	let recall_at_k =
		if expected_count == 0 { 0.0 } else { relevant_count as f64 / expected_count as f64 };

	Metrics { recall_at_k, precision_at_k, rr, ndcg, relevant_count }
}

fn summarize(
	reports: &[QueryReport],
	latencies_ms: &[f64],
	first_latencies_ms: &[f64],
) -> EvalSummary {
	let count = reports.len().max(1) as f64;
	let mean = |f: fn(&QueryReport) -> f64| reports.iter().map(f).sum::<f64>() / count;
	let latencies = sorted(latencies_ms);
	let first_latencies = sorted(first_latencies_ms);

	EvalSummary {
		avg_recall_at_k: mean(|r| r.recall_at_k),
		avg_precision_at_k: mean(|r| r.precision_at_k),
		mean_rr: mean(|r| r.rr),
		mean_ndcg: mean(|r| r.ndcg),
		avg_confidence: mean(|r| r.confidence),
		latency_ms_p50: percentile(&latencies, 0.50),
		latency_ms_p95: percentile(&latencies, 0.95),
		first_run_latency_ms_p50: percentile(&first_latencies, 0.50),
		first_run_latency_ms_p95: percentile(&first_latencies, 0.95),
		cache_hits: reports.iter().map(|r| r.cache_hits).sum(),
		degraded_queries: reports.iter().filter(|r| r.degradation.is_some()).count(),
		stability: None,
		cache: None,
		performance: None,
	}
}

fn sorted(values: &[f64]) -> Vec<f64> {
	let mut out = values.to_vec();

	out.sort_by(f64::total_cmp);

	out
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let pos = percentile.clamp(0.0, 1.0) * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn close(left: f64, right: f64) -> bool {
		(left - right).abs() < 1e-9
	}

	#[test]
	fn metrics_reward_early_relevant_hits() {
		let expected: HashSet<u64> = [2, 9].into_iter().collect();
		let metrics = compute_metrics(&[5, 2, 7], &expected);

		assert_eq!(metrics.relevant_count, 1);
		assert!(close(metrics.recall_at_k, 0.5));
		assert!(close(metrics.precision_at_k, 1.0 / 3.0));
		assert!(close(metrics.rr, 0.5));

		let idcg = 1.0 + 1.0 / 3.0_f64.log2();

		assert!(close(metrics.ndcg, (1.0 / 3.0_f64.log2()) / idcg));
	}

	#[test]
	fn metrics_are_zero_without_results() {
		let expected: HashSet<u64> = [1].into_iter().collect();
		let metrics = compute_metrics(&[], &expected);

		assert_eq!(metrics.relevant_count, 0);
		assert_eq!(metrics.precision_at_k, 0.0);
		assert_eq!(metrics.recall_at_k, 0.0);
		assert_eq!(metrics.rr, 0.0);
		assert_eq!(metrics.ndcg, 0.0);
	}

	#[test]
	fn churn_separates_reordering_from_replacement() {
		let (positional, set) = churn_against_baseline_at_k(&[1, 2, 3, 4], &[2, 1, 3, 4], 4);

		assert!(close(positional, 0.5));
		assert!(close(set, 0.0));

		let (positional, set) = churn_against_baseline_at_k(&[1, 2, 3, 4], &[1, 2, 3, 8], 4);

		assert!(close(positional, 0.25));
		assert!(close(set, 0.25));
	}

	#[test]
	fn percentile_interpolates_between_ranks() {
		let values = sorted(&[40.0, 10.0, 30.0, 20.0]);

		assert!(close(percentile(&values, 0.5), 25.0));
		assert!(close(percentile(&values, 1.0), 40.0));
		assert_eq!(percentile(&[], 0.95), 0.0);
	}

	#[test]
	fn unique_ids_keep_first_occurrence_order() {
		assert_eq!(unique_ids([3, 1, 3, 2, 1].into_iter()), vec![3, 1, 2]);
	}

	#[test]
	fn empty_datasets_are_rejected() {
		let err =
			parse_dataset(r#"{ "queries": [] }"#).expect_err("Expected an empty dataset error.");

		assert!(err.to_string().contains("at least one query"));

		let dataset = parse_dataset(
			r#"{ "defaults": { "top_k": 3 }, "queries": [{ "query": "sốt", "expected_passage_ids": [7] }] }"#,
		)
		.expect("Failed to parse dataset.");

		assert_eq!(dataset.defaults.and_then(|d| d.top_k), Some(3));
		assert_eq!(dataset.queries[0].expected_passage_ids, vec![7]);
	}

	#[tokio::test]
	async fn repeated_runs_are_served_from_cache() {
		let cfg = medrag_testkit::sample_config().expect("Failed to load sample config.");
		let corpus = medrag_testkit::sample_corpus().expect("Failed to load sample corpus.");
		let indexes =
			medrag_testkit::hash_indexes(&cfg, &corpus).await.expect("Failed to build indexes.");
		let service = MedragService::new(cfg, corpus, indexes);
		let dataset = parse_dataset(
			r#"{
				"name": "smoke",
				"queries": [
					{ "id": "headache", "query": "đau đầu chóng mặt", "expected_passage_ids": [1] },
					{ "query": "tiểu đường type 2 kiểm soát đường huyết", "expected_passage_ids": [5] }
				]
			}"#,
		)
		.expect("Failed to parse dataset.");
		let settings = EvalSettings {
			config_path: "sample_config.toml".to_string(),
			corpus_path: "sample_corpus.json".to_string(),
			corpus_size: 8,
			embedder: "hash".to_string(),
			vector_backend: "memory".to_string(),
			top_k: 3,
			runs_per_query: 2,
			cache_enabled: true,
		};
		let output =
			evaluate(&service, &dataset, settings, Some(3)).await.expect("Failed to evaluate.");

		assert_eq!(output.dataset.name, "smoke");
		assert_eq!(output.dataset.query_count, 2);
		assert_eq!(output.queries[0].id, "headache");
		assert_eq!(output.queries[1].id, "q2");
		assert_eq!(output.summary.cache_hits, 2);

		for report in &output.queries {
			assert_eq!(report.cache_hits, 1);
			assert!(report.retrieved_count <= 3);
			assert!((0.0..=1.0).contains(&report.recall_at_k));
			assert_eq!(report.trace_ids.as_ref().map(Vec::len), Some(2));

			let stability = report.stability.expect("Expected stability for repeated runs.");

			assert_eq!(stability.set_churn_at_k, 0.0);
		}

		let cache = output.summary.cache.expect("Expected cache statistics.");

		assert_eq!(cache.exact_hits, 2);
		assert_eq!(cache.misses, 2);

		let performance = output.summary.performance.expect("Expected performance statistics.");

		assert_eq!(performance.queries, 4);
		assert!((performance.cache_hit_rate - 0.5).abs() < 1e-9);
		assert_eq!(output.queries[0].suggestions[0], "Tìm hiểu về đau đầu");
	}
}
