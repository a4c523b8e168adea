use super::{DetailType, Direction, StatType};
use serde_json::json;
use std::{
    collections::BTreeMap,
    sync::{atomic::AtomicU64, RwLock},
    time::Instant,
};
use tracing::debug;

/// Counter registry shared by all components
pub struct Stats {
    mutables: RwLock<StatMutables>,
    enable_logging: bool,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            mutables: RwLock::new(StatMutables {
                counters: BTreeMap::new(),
                timestamp: Instant::now(),
            }),
            enable_logging: std::env::var("RSLAT_LOG_STATS").is_ok(),
        }
    }

    pub fn inc(&self, stat_type: StatType, detail: DetailType) {
        self.add_dir(stat_type, detail, Direction::In, 1)
    }

    pub fn inc_dir(&self, stat_type: StatType, detail: DetailType, dir: Direction) {
        self.add_dir(stat_type, detail, dir, 1)
    }

    pub fn add(&self, stat_type: StatType, detail: DetailType, value: u64) {
        self.add_dir(stat_type, detail, Direction::In, value)
    }

    /// Add `value` to given counter
    pub fn add_dir(&self, stat_type: StatType, detail: DetailType, dir: Direction, value: u64) {
        if value == 0 {
            return;
        }

        if self.enable_logging {
            debug!(
                "Stat: {:?}::{:?}::{:?} += {}",
                stat_type, detail, dir, value
            );
        }

        let key = CounterKey::new(stat_type, detail, dir);

        // This is a two-step process to avoid exclusively locking the mutex in the common case
        {
            let lock = self.mutables.read().unwrap();
            if let Some(counter) = lock.counters.get(&key) {
                counter.add(value);
                return;
            }
        }
        {
            let mut lock = self.mutables.write().unwrap();
            let counter = lock.counters.entry(key).or_insert_with(CounterEntry::new);
            counter.add(value);
        }
    }

    pub fn count(&self, stat_type: StatType, detail: DetailType, dir: Direction) -> u64 {
        let key = CounterKey::new(stat_type, detail, dir);
        self.mutables
            .read()
            .unwrap()
            .counters
            .get(&key)
            .map(|i| i.into())
            .unwrap_or_default()
    }

    /// Sum of all detail counters for the given type
    pub fn count_all(&self, stat_type: StatType, dir: Direction) -> u64 {
        let guard = self.mutables.read().unwrap();
        guard
            .counters
            .iter()
            .filter(|(key, _)| key.stat_type == stat_type && key.dir == dir)
            .map(|(_, entry)| u64::from(entry))
            .sum()
    }

    /// Returns the duration since `clear()` was last called, or startup if it never was
    pub fn last_reset(&self) -> std::time::Duration {
        self.mutables.read().unwrap().timestamp.elapsed()
    }

    pub fn clear(&self) {
        let mut lock = self.mutables.write().unwrap();
        lock.counters.clear();
        lock.timestamp = Instant::now();
    }

    pub fn dump(&self) -> serde_json::Value {
        let guard = self.mutables.read().unwrap();
        let entries: Vec<_> = guard
            .counters
            .iter()
            .map(|(key, entry)| {
                json!({
                    "type": key.stat_type.as_str(),
                    "detail": key.detail.as_str(),
                    "dir": key.dir.as_str(),
                    "value": u64::from(entry),
                })
            })
            .collect();
        json!({ "entries": entries })
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
struct CounterKey {
    stat_type: StatType,
    detail: DetailType,
    dir: Direction,
}

impl CounterKey {
    fn new(stat_type: StatType, detail: DetailType, dir: Direction) -> Self {
        Self {
            stat_type,
            detail,
            dir,
        }
    }
}

struct StatMutables {
    /// Stat entries are sorted by key to simplify log output
    counters: BTreeMap<CounterKey, CounterEntry>,
    /// Time of last clear() call
    timestamp: Instant,
}

struct CounterEntry(AtomicU64);

impl CounterEntry {
    fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    fn add(&self, value: u64) {
        self.0.fetch_add(value, std::sync::atomic::Ordering::SeqCst);
    }
}

impl From<&CounterEntry> for u64 {
    fn from(value: &CounterEntry) -> Self {
        value.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters() {
        let stats = Stats::new();
        stats.add(StatType::Election, DetailType::VoteNew, 1);
        stats.add(StatType::Election, DetailType::VoteNew, 5);
        stats.inc(StatType::Election, DetailType::VoteReplay);
        stats.inc(StatType::VoteCache, DetailType::Insert);
        assert_eq!(
            6,
            stats.count(StatType::Election, DetailType::VoteNew, Direction::In)
        );
        assert_eq!(
            1,
            stats.count(StatType::Election, DetailType::VoteReplay, Direction::In)
        );
        assert_eq!(7, stats.count_all(StatType::Election, Direction::In));
    }

    #[test]
    fn clear_resets_counters() {
        let stats = Stats::new();
        stats.inc(StatType::Active, DetailType::Started);
        stats.clear();
        assert_eq!(
            0,
            stats.count(StatType::Active, DetailType::Started, Direction::In)
        );
    }
}
