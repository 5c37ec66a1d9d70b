//! Three-tier in-memory result cache.
//!
//! Reads go L1, L2, L3 and stop at the first live entry. Every write lands in L1. A full tier
//! evicts its least recently used entry, found through a per-tier recency index, which moves one tier down when it was read at least
//! once since insertion and is dropped otherwise. Hits move entries up: L3 to L2 on any hit,
//! L2 to L1 once the access count reaches the promotion threshold. Expired entries are
//! removed when a read or an eviction finds them.
//!
//! All state sits behind one mutex per cache instance, so a key is in at most one tier at any
//! point a caller can observe.

pub mod keys;

pub use keys::{CacheKeys, ContextFingerprint, PatternKey, build_cache_keys};

use std::{
	collections::{BTreeMap, HashMap},
	sync::{Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::{Duration, OffsetDateTime};

const TOP_PATTERNS: usize = 10;

pub trait Clock
where
	Self: Send + Sync,
{
	fn now(&self) -> OffsetDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
	now: Mutex<OffsetDateTime>,
}
impl ManualClock {
	pub fn new(start: OffsetDateTime) -> Self {
		Self { now: Mutex::new(start) }
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock().unwrap_or_else(|err| err.into_inner());

		*now += by;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::UNIX_EPOCH)
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.now.lock().unwrap_or_else(|err| err.into_inner())
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
	L1,
	L2,
	L3,
}
impl Tier {
	pub const ALL: [Self; 3] = [Self::L1, Self::L2, Self::L3];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::L1 => "l1",
			Self::L2 => "l2",
			Self::L3 => "l3",
		}
	}

	fn index(self) -> usize {
		match self {
			Self::L1 => 0,
			Self::L2 => 1,
			Self::L3 => 2,
		}
	}

	fn below(self) -> Option<Self> {
		match self {
			Self::L1 => Some(Self::L2),
			Self::L2 => Some(Self::L3),
			Self::L3 => None,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
	Exact,
	Pattern,
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
	pub key: String,
	pub value: Arc<[u8]>,
	pub created_at: OffsetDateTime,
	pub last_accessed_at: OffsetDateTime,
	pub access_count: u32,
	pub ttl: Duration,
	pub size_estimate: usize,
	pub tier: Tier,
	/// Logical access clock; orders entries that share a timestamp.
	touched: u64,
}
impl CacheEntry {
	pub fn is_expired(&self, now: OffsetDateTime) -> bool {
		now - self.created_at >= self.ttl
	}
}

#[derive(Clone, Debug)]
pub struct CachedValue<T> {
	pub value: T,
	pub tier: Tier,
	pub kind: KeyKind,
}

#[derive(Clone, Debug)]
pub struct CacheSettings {
	pub capacities: [usize; 3],
	pub ttl: Duration,
	pub pattern_ttl: Duration,
	pub promote_to_l1_after: u32,
	pub pattern_min_chars: usize,
}
impl From<&medrag_config::Cache> for CacheSettings {
	fn from(cfg: &medrag_config::Cache) -> Self {
		let ttl = Duration::seconds(i64::try_from(cfg.ttl_secs).unwrap_or(i64::MAX / 4));

		Self {
			capacities: [cfg.l1_capacity.max(1), cfg.l2_capacity.max(1), cfg.l3_capacity.max(1)],
			ttl,
			pattern_ttl: ttl * cfg.pattern_ttl_multiplier.max(1),
			promote_to_l1_after: cfg.promote_to_l1_after,
			pattern_min_chars: cfg.pattern_min_chars,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
	pub tier: Tier,
	pub size: usize,
	pub capacity: usize,
	pub utilization: f64,
	pub hits: u64,
	pub size_bytes: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternCount {
	pub pattern: String,
	pub count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
	pub tiers: Vec<TierStats>,
	pub hits: u64,
	pub exact_hits: u64,
	pub pattern_hits: u64,
	pub misses: u64,
	pub total_requests: u64,
	pub hit_rate: f64,
	pub promotions: u64,
	pub demotions: u64,
	pub evictions: u64,
	pub expirations: u64,
	pub errors: u64,
	pub total_size_bytes: usize,
	pub total_patterns: usize,
	pub top_patterns: Vec<PatternCount>,
}

#[derive(Debug, Default)]
struct Counters {
	tier_hits: [u64; 3],
	exact_hits: u64,
	pattern_hits: u64,
	misses: u64,
	total_requests: u64,
	promotions: u64,
	demotions: u64,
	evictions: u64,
	expirations: u64,
	errors: u64,
}

/// One tier's entries plus a `touched -> key` index, oldest first.
#[derive(Debug, Default)]
struct TierEntries {
	entries: HashMap<String, CacheEntry>,
	recency: BTreeMap<u64, String>,
}
impl TierEntries {
	fn len(&self) -> usize {
		self.entries.len()
	}

	fn contains(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	fn get(&self, key: &str) -> Option<&CacheEntry> {
		self.entries.get(key)
	}

	fn values(&self) -> impl Iterator<Item = &CacheEntry> {
		self.entries.values()
	}

	fn put(&mut self, entry: CacheEntry) {
		self.remove(&entry.key);
		self.recency.insert(entry.touched, entry.key.clone());
		self.entries.insert(entry.key.clone(), entry);
	}

	fn remove(&mut self, key: &str) -> Option<CacheEntry> {
		let entry = self.entries.remove(key)?;

		self.recency.remove(&entry.touched);

		Some(entry)
	}

	fn touch(&mut self, key: &str, touched: u64) -> Option<&mut CacheEntry> {
		let entry = self.entries.get_mut(key)?;

		self.recency.remove(&entry.touched);
		self.recency.insert(touched, entry.key.clone());

		entry.touched = touched;

		Some(entry)
	}

	fn pop_least_recent(&mut self) -> Option<CacheEntry> {
		let (_, key) = self.recency.pop_first()?;

		self.entries.remove(&key)
	}
}

#[derive(Debug, Default)]
struct CacheState {
	tiers: [TierEntries; 3],
	counters: Counters,
	patterns: HashMap<String, u64>,
	clock: u64,
}
impl CacheState {
	fn tick(&mut self) -> u64 {
		self.clock += 1;

		self.clock
	}

	fn tier_of(&self, key: &str) -> Option<Tier> {
		Tier::ALL.into_iter().find(|tier| self.tiers[tier.index()].contains(key))
	}

	fn remove(&mut self, key: &str) -> Option<CacheEntry> {
		Tier::ALL.into_iter().find_map(|tier| self.tiers[tier.index()].remove(key))
	}

	/// Reads `key` and decodes it. Does not touch the request or miss counters.
	fn read<T, F>(
		&mut self,
		settings: &CacheSettings,
		key: &str,
		now: OffsetDateTime,
		decode: F,
	) -> Option<(T, Tier)>
	where
		F: FnOnce(&[u8]) -> Option<T>,
	{
		let tier = self.tier_of(key)?;
		let idx = tier.index();
		let expired = self.tiers[idx].get(key).is_some_and(|entry| entry.is_expired(now));

		if expired {
			self.tiers[idx].remove(key);
			self.counters.expirations += 1;

			return None;
		}

		let entry = self.tiers[idx].get(key)?;
		let Some(value) = decode(&entry.value) else {
			self.tiers[idx].remove(key);
			self.counters.errors += 1;

			return None;
		};
		let touched = self.tick();
		let entry = self.tiers[idx].touch(key, touched)?;

		entry.access_count = entry.access_count.saturating_add(1);
		entry.last_accessed_at = now;

		let access_count = entry.access_count;

		self.counters.tier_hits[idx] += 1;

		let target = match tier {
			Tier::L3 => Some(Tier::L2),
			Tier::L2 if access_count >= settings.promote_to_l1_after => Some(Tier::L1),
			_ => None,
		};
		let Some(target) = target else {
			return Some((value, tier));
		};

		if let Some(entry) = self.tiers[idx].remove(key) {
			self.counters.promotions += 1;

			tracing::debug!(
				cache_key_prefix = keys::cache_key_prefix(key),
				from = tier.as_str(),
				to = target.as_str(),
				access_count,
				"Cache entry promoted."
			);

			self.insert(settings, target, entry, now);
		}

		Some((value, target))
	}

	/// Inserts into `tier`, cascading evictions downward.
	fn insert(
		&mut self,
		settings: &CacheSettings,
		tier: Tier,
		entry: CacheEntry,
		now: OffsetDateTime,
	) {
		let mut tier = tier;
		let mut entry = entry;

		loop {
			let idx = tier.index();
			let victim = if self.tiers[idx].len() >= settings.capacities[idx] {
				self.tiers[idx].pop_least_recent()
			} else {
				None
			};

			entry.tier = tier;

			self.tiers[idx].put(entry);

			let Some(victim) = victim else {
				return;
			};

			if victim.is_expired(now) {
				self.counters.expirations += 1;

				return;
			}

			self.counters.evictions += 1;

			match tier.below() {
				Some(lower) if victim.access_count > 1 => {
					self.counters.demotions += 1;

					tier = lower;
					entry = victim;
				},
				_ => return,
			}
		}
	}
}

/// Injectable result cache. Cheap to share behind an `Arc`.
pub struct MultiTierCache {
	settings: CacheSettings,
	clock: Arc<dyn Clock>,
	state: Mutex<CacheState>,
}
impl MultiTierCache {
	pub fn new(cfg: &medrag_config::Cache, clock: Arc<dyn Clock>) -> Self {
		Self::with_settings(CacheSettings::from(cfg), clock)
	}

	pub fn with_settings(settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
		Self { settings, clock, state: Mutex::new(CacheState::default()) }
	}

	pub fn settings(&self) -> &CacheSettings {
		&self.settings
	}

	pub fn get(&self, key: &str) -> Option<(Arc<[u8]>, Tier)> {
		let now = self.clock.now();
		let mut state = self.lock();

		state.counters.total_requests += 1;

		match state.read(&self.settings, key, now, |bytes| Some(Arc::<[u8]>::from(bytes))) {
			Some(hit) => {
				state.counters.exact_hits += 1;

				Some(hit)
			},
			None => {
				state.counters.misses += 1;

				None
			},
		}
	}

	/// Writes into L1, replacing any existing entry for `key` in any tier.
	pub fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
		let now = self.clock.now();
		let mut state = self.lock();

		state.remove(key);

		let touched = state.tick();
		let entry = CacheEntry {
			key: key.to_string(),
			size_estimate: value.len(),
			value: Arc::from(value),
			created_at: now,
			last_accessed_at: now,
			access_count: 1,
			ttl,
			tier: Tier::L1,
			touched,
		};

		state.insert(&self.settings, Tier::L1, entry, now);
	}

	pub fn remove(&self, key: &str) -> bool {
		self.lock().remove(key).is_some()
	}

	pub fn tier_of(&self, key: &str) -> Option<Tier> {
		self.lock().tier_of(key)
	}

	pub fn entry(&self, key: &str) -> Option<CacheEntry> {
		let state = self.lock();
		let tier = state.tier_of(key)?;

		state.tiers[tier.index()].get(key).cloned()
	}

	pub fn len(&self) -> usize {
		self.lock().tiers.iter().map(TierEntries::len).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Exact key first, then the pattern key. Counts as one request.
	pub fn lookup<T>(&self, keys: &CacheKeys) -> Option<CachedValue<T>>
	where
		T: DeserializeOwned,
	{
		let now = self.clock.now();
		let mut state = self.lock();

		state.counters.total_requests += 1;

		if let Some((value, tier)) = state.read(&self.settings, &keys.exact, now, |bytes| {
			decode_value(bytes, &keys.exact)
		}) {
			state.counters.exact_hits += 1;

			return Some(CachedValue { value, tier, kind: KeyKind::Exact });
		}
		if let Some(pattern) = keys.pattern.as_ref()
			&& let Some((value, tier)) = state.read(&self.settings, &pattern.key, now, |bytes| {
				decode_value(bytes, &pattern.key)
			}) {
			state.counters.pattern_hits += 1;

			return Some(CachedValue { value, tier, kind: KeyKind::Pattern });
		}

		state.counters.misses += 1;

		None
	}

	/// Stores under the exact key and, when present, the pattern key with the longer TTL.
	/// Encoding failures are logged and skipped.
	pub fn store<T>(&self, keys: &CacheKeys, value: &T)
	where
		T: Serialize,
	{
		let bytes = match serde_json::to_vec(value) {
			Ok(bytes) => bytes,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_key_prefix = keys::cache_key_prefix(&keys.exact),
					"Cache encode failed."
				);

				self.lock().counters.errors += 1;

				return;
			},
		};

		if let Some(pattern) = keys.pattern.as_ref() {
			self.set(&pattern.key, bytes.clone(), self.settings.pattern_ttl);

			let mut state = self.lock();

			*state.patterns.entry(pattern.text.clone()).or_insert(0) += 1;
		}

		self.set(&keys.exact, bytes, self.settings.ttl);
	}

	pub fn stats(&self) -> CacheStats {
		let state = self.lock();
		let counters = &state.counters;
		let tiers: Vec<TierStats> = Tier::ALL
			.into_iter()
			.map(|tier| {
				let idx = tier.index();
				let entries = &state.tiers[idx];
				let capacity = self.settings.capacities[idx];

				TierStats {
					tier,
					size: entries.len(),
					capacity,
					utilization: entries.len() as f64 / capacity as f64,
					hits: counters.tier_hits[idx],
					size_bytes: entries.values().map(|entry| entry.size_estimate).sum(),
				}
			})
			.collect();
		let hits: u64 = counters.tier_hits.iter().sum();
		let mut top_patterns: Vec<PatternCount> = state
			.patterns
			.iter()
			.map(|(pattern, count)| PatternCount { pattern: pattern.clone(), count: *count })
			.collect();

		top_patterns
			.sort_by(|left, right| {
				right.count.cmp(&left.count).then(left.pattern.cmp(&right.pattern))
			});
		top_patterns.truncate(TOP_PATTERNS);

		CacheStats {
			total_size_bytes: tiers.iter().map(|tier| tier.size_bytes).sum(),
			tiers,
			hits,
			exact_hits: counters.exact_hits,
			pattern_hits: counters.pattern_hits,
			misses: counters.misses,
			total_requests: counters.total_requests,
			hit_rate: if counters.total_requests == 0 {
				0.0
			} else {
				hits as f64 / counters.total_requests as f64
			},
			promotions: counters.promotions,
			demotions: counters.demotions,
			evictions: counters.evictions,
			expirations: counters.expirations,
			errors: counters.errors,
			total_patterns: state.patterns.len(),
			top_patterns,
		}
	}

	pub fn clear(&self) {
		*self.lock() = CacheState::default();
	}

	fn lock(&self) -> MutexGuard<'_, CacheState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}
}

fn decode_value<T>(bytes: &[u8], key: &str) -> Option<T>
where
	T: DeserializeOwned,
{
	match serde_json::from_slice(bytes) {
		Ok(value) => Some(value),
		Err(err) => {
			tracing::warn!(
				error = %err,
				cache_key_prefix = keys::cache_key_prefix(key),
				"Cache decode failed."
			);

			None
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cache(capacities: [usize; 3]) -> (MultiTierCache, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::default());
		let settings = CacheSettings {
			capacities,
			ttl: Duration::seconds(1_800),
			pattern_ttl: Duration::seconds(3_600),
			promote_to_l1_after: 5,
			pattern_min_chars: 4,
		};

		(MultiTierCache::with_settings(settings, clock.clone()), clock)
	}

	fn put(cache: &MultiTierCache, key: &str) {
		cache.set(key, key.as_bytes().to_vec(), Duration::seconds(1_800));
	}

	#[test]
	fn writes_land_in_l1_and_hits_are_counted() {
		let (cache, _) = cache([2, 2, 2]);

		put(&cache, "a");

		let (value, tier) = cache.get("a").expect("Expected a hit.");

		assert_eq!(&*value, b"a");
		assert_eq!(tier, Tier::L1);
		assert!(cache.get("missing").is_none());

		let stats = cache.stats();

		assert_eq!((stats.hits, stats.misses, stats.total_requests), (1, 1, 2));
		assert_eq!(stats.tiers[0].hits, 1);
		assert!((stats.hit_rate - 0.5).abs() < 1e-9);
	}

	#[test]
	fn one_off_entries_are_dropped_on_eviction() {
		let (cache, _) = cache([1, 1, 1]);

		put(&cache, "a");
		put(&cache, "b");

		assert_eq!(cache.tier_of("a"), None);
		assert_eq!(cache.tier_of("b"), Some(Tier::L1));
		assert_eq!(cache.stats().evictions, 1);
		assert_eq!(cache.stats().demotions, 0);
	}

	#[test]
	fn eviction_takes_the_least_recently_touched_entry() {
		let (cache, _) = cache([3, 3, 3]);

		put(&cache, "a");
		put(&cache, "b");
		put(&cache, "c");
		cache.get("a");
		cache.get("c");
		put(&cache, "d");

		assert_eq!(cache.tier_of("b"), None);

		put(&cache, "e");

		// "a" was read before "c", so it goes first and drops to L2.
		assert_eq!(cache.tier_of("a"), Some(Tier::L2));
		assert_eq!(cache.tier_of("c"), Some(Tier::L1));

		let state = cache.lock();

		for tier in &state.tiers {
			assert_eq!(tier.recency.len(), tier.entries.len());
		}
	}

	#[test]
	fn reused_entries_are_demoted_then_promoted_back() {
		let (cache, _) = cache([1, 1, 1]);

		put(&cache, "a");
		cache.get("a");
		put(&cache, "b");

		assert_eq!(cache.tier_of("a"), Some(Tier::L2));

		// access_count reaches 3, below the L1 threshold of 5.
		let (_, tier) = cache.get("a").expect("Expected a hit.");

		assert_eq!(tier, Tier::L2);

		cache.get("a");
		cache.get("a");

		assert_eq!(cache.tier_of("a"), Some(Tier::L1));
		// "b" was read zero times, so it is dropped rather than demoted.
		assert_eq!(cache.tier_of("b"), None);
		assert_eq!(cache.stats().promotions, 1);
	}

	#[test]
	fn l3_hits_promote_immediately() {
		let (cache, _) = cache([1, 1, 1]);

		put(&cache, "a");
		cache.get("a");
		put(&cache, "b");
		cache.get("b");
		put(&cache, "c");

		// a: L1 -> L2 -> L3 as b and c push it down.
		assert_eq!(cache.tier_of("a"), Some(Tier::L3));
		assert_eq!(cache.tier_of("b"), Some(Tier::L2));

		let (_, tier) = cache.get("a").expect("Expected a hit.");

		assert_eq!(tier, Tier::L2);
		assert_eq!(cache.tier_of("b"), Some(Tier::L3));
	}

	#[test]
	fn expired_entries_are_unreadable() {
		let (cache, clock) = cache([2, 2, 2]);

		put(&cache, "a");
		clock.advance(Duration::seconds(1_799));

		assert!(cache.get("a").is_some());

		clock.advance(Duration::seconds(1));

		assert!(cache.get("a").is_none());
		assert_eq!(cache.stats().expirations, 1);
		assert!(cache.is_empty());
	}

	#[test]
	fn rewriting_a_key_keeps_a_single_copy() {
		let (cache, _) = cache([1, 1, 1]);

		put(&cache, "a");
		cache.get("a");
		put(&cache, "b");
		put(&cache, "a");

		assert_eq!(cache.tier_of("a"), Some(Tier::L1));
		assert_eq!(cache.len(), 1);
	}

	#[test]
	fn undecodable_values_count_as_misses() {
		let (cache, _) = cache([2, 2, 2]);
		let keys = CacheKeys { exact: "exact".to_string(), pattern: None };

		cache.set("exact", b"not json".to_vec(), Duration::seconds(60));

		assert!(cache.lookup::<Vec<u64>>(&keys).is_none());
		assert_eq!(cache.stats().errors, 1);
		assert_eq!(cache.stats().misses, 1);
		assert!(cache.is_empty());
	}

	#[test]
	fn clear_resets_entries_and_counters() {
		let (cache, _) = cache([2, 2, 2]);

		put(&cache, "a");
		cache.get("a");
		cache.clear();

		let stats = cache.stats();

		assert!(cache.is_empty());
		assert_eq!((stats.hits, stats.misses, stats.total_requests), (0, 0, 0));
		assert!(stats.tiers.iter().all(|tier| tier.size == 0 && tier.hits == 0));
	}
}
