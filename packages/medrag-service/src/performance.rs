//! Rolling per-query latency record with a 0-100 performance score.

use std::{
	collections::VecDeque,
	sync::{Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

use crate::RetrieveTimings;

/// Score points lost per second of average total latency above target.
const SCORE_LOSS_PER_SECOND: f64 = 20.0;
const LOW_CACHE_HIT_RATE: f64 = 0.3;
const HIGH_CACHE_HIT_RATE: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryMetrics {
	pub search_ms: f64,
	pub total_ms: f64,
	pub cache_hit: bool,
}
impl QueryMetrics {
	/// Search time is the slower of the two index branches, since they run side by side.
	pub fn from_timings(timings: &RetrieveTimings, cache_hit: bool) -> Self {
		Self {
			search_ms: timings.semantic_ms.max(timings.lexical_ms),
			total_ms: timings.total_ms,
			cache_hit,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
	ExceedsTarget,
	LowCacheHitRate,
	VerySlow,
	ExcellentCacheHitRate,
	MeetingTargets,
}
impl Recommendation {
	pub fn message(self) -> &'static str {
		match self {
			Self::ExceedsTarget =>
				"Average response time exceeds the target. Review index and fusion costs.",
			Self::LowCacheHitRate => "Cache hit rate is low. Review cache sizing and key reuse.",
			Self::VerySlow => "Responses are very slow. Check system resources.",
			Self::ExcellentCacheHitRate => "Cache hit rate is excellent.",
			Self::MeetingTargets => "Average response time meets the target.",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
	pub queries: usize,
	pub avg_search_ms: f64,
	pub avg_total_ms: f64,
	pub cache_hit_rate: f64,
	pub target_search_ms: u64,
	pub target_total_ms: u64,
	pub performance_score: f64,
	pub recommendations: Vec<Recommendation>,
}

pub struct PerformanceTracker {
	cfg: medrag_config::Performance,
	records: Mutex<VecDeque<QueryMetrics>>,
}
impl PerformanceTracker {
	pub fn new(cfg: medrag_config::Performance) -> Self {
		let capacity = cfg.retain.max(1);

		Self { cfg, records: Mutex::new(VecDeque::with_capacity(capacity)) }
	}

	pub fn record(&self, metrics: QueryMetrics) {
		let retain = self.cfg.retain.max(1);
		let mut records = self.lock();

		while records.len() >= retain {
			records.pop_front();
		}

		records.push_back(metrics);
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Statistics over the last `window` queries, or `None` before the first query.
	pub fn stats(&self) -> Option<PerformanceStats> {
		let records = self.lock();
		let window = self.cfg.window.max(1).min(records.len());

		if window == 0 {
			return None;
		}

		let recent = records.iter().skip(records.len() - window);
		let (search_sum, total_sum, hits) =
			recent.fold((0.0, 0.0, 0_usize), |(search, total, hits), record| {
				let hits = hits + usize::from(record.cache_hit);

				(search + record.search_ms, total + record.total_ms, hits)
			});
		let count = window as f64;
		let avg_total_ms = total_sum / count;
		let cache_hit_rate = hits as f64 / count;

		Some(PerformanceStats {
			queries: window,
			avg_search_ms: search_sum / count,
			avg_total_ms,
			cache_hit_rate,
			target_search_ms: self.cfg.target_search_ms,
			target_total_ms: self.cfg.target_total_ms,
			performance_score: performance_score(avg_total_ms, self.cfg.target_total_ms),
			recommendations: recommendations(&self.cfg, avg_total_ms, cache_hit_rate),
		})
	}

	pub fn clear(&self) {
		self.lock().clear();
	}

	fn lock(&self) -> MutexGuard<'_, VecDeque<QueryMetrics>> {
		self.records.lock().unwrap_or_else(|err| err.into_inner())
	}
}

/// 100 at or under target, then 20 points lost per second over it, floored at 0.
pub fn performance_score(avg_total_ms: f64, target_total_ms: u64) -> f64 {
	let target = target_total_ms as f64;

	if avg_total_ms <= target {
		return 100.0;
	}

	(100.0 - (avg_total_ms - target) / 1_000.0 * SCORE_LOSS_PER_SECOND).max(0.0)
}

fn recommendations(
	cfg: &medrag_config::Performance,
	avg_total_ms: f64,
	cache_hit_rate: f64,
) -> Vec<Recommendation> {
	let over_target = avg_total_ms > cfg.target_total_ms as f64;
	let mut out = Vec::new();

	if over_target {
		out.push(Recommendation::ExceedsTarget);
	}
	if cache_hit_rate < LOW_CACHE_HIT_RATE {
		out.push(Recommendation::LowCacheHitRate);
	}
	if avg_total_ms > cfg.slow_total_ms as f64 {
		out.push(Recommendation::VerySlow);
	}
	if cache_hit_rate > HIGH_CACHE_HIT_RATE {
		out.push(Recommendation::ExcellentCacheHitRate);
	}
	if !over_target {
		out.push(Recommendation::MeetingTargets);
	}

	out
}
