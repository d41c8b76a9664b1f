use gapfill_model::PlaceholderKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Serializable copy of the usage counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub kinds: BTreeMap<PlaceholderKind, BTreeMap<String, u64>>,
}

impl HistorySnapshot {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.kinds.values().flat_map(|values| values.values()).sum()
    }
}

/// Per-kind value usage counters with bounded capacity.
///
/// Increments of known values only take the read lock; a new value takes the write lock and,
/// when the kind is full, evicts its least-used value.
#[derive(Debug)]
pub struct UsageHistory {
    capacity: usize,
    counters: RwLock<HashMap<PlaceholderKind, HashMap<String, AtomicU64>>>,
}

impl UsageHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            counters: RwLock::new(HashMap::new()),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, kind: PlaceholderKind, value: &str) {
        if let Ok(guard) = self.counters.read() {
            if let Some(counter) = guard.get(&kind).and_then(|values| values.get(value)) {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        let Ok(mut guard) = self.counters.write() else {
            log::warn!("usage history lock poisoned; dropping record");
            return;
        };
        let values = guard.entry(kind).or_default();
        if let Some(counter) = values.get(value) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if values.len() >= self.capacity {
            let coldest = values
                .iter()
                .map(|(name, count)| (count.load(Ordering::Relaxed), name))
                .min()
                .map(|(_, name)| name.clone());
            if let Some(name) = coldest {
                log::debug!("usage history for {kind} full; evicting '{name}'");
                values.remove(&name);
            }
        }
        values.insert(value.to_string(), AtomicU64::new(1));
    }

    pub fn count(&self, kind: PlaceholderKind, value: &str) -> u64 {
        self.counters.read().map_or(0, |guard| {
            guard
                .get(&kind)
                .and_then(|values| values.get(value))
                .map_or(0, |count| count.load(Ordering::Relaxed))
        })
    }

    /// Most used values for a kind, ties by value
    pub fn top(&self, kind: PlaceholderKind, limit: usize) -> Vec<(String, u64)> {
        let Ok(guard) = self.counters.read() else {
            return Vec::new();
        };
        let Some(values) = guard.get(&kind) else {
            return Vec::new();
        };
        let mut ranked: Vec<(String, u64)> = values
            .iter()
            .map(|(value, count)| (value.clone(), count.load(Ordering::Relaxed)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        let Ok(guard) = self.counters.read() else {
            return HistorySnapshot::default();
        };
        let kinds = guard
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(kind, values)| {
                let counts = values
                    .iter()
                    .map(|(value, count)| (value.clone(), count.load(Ordering::Relaxed)))
                    .collect();
                (*kind, counts)
            })
            .collect();
        HistorySnapshot { kinds }
    }

    /// Replace the counters with `snapshot`, keeping the most used values per kind
    pub fn restore(&self, snapshot: &HistorySnapshot) {
        let Ok(mut guard) = self.counters.write() else {
            log::warn!("usage history lock poisoned; restore skipped");
            return;
        };
        guard.clear();
        for (kind, values) in &snapshot.kinds {
            let mut ranked: Vec<(&String, &u64)> = values.iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let restored = ranked
                .into_iter()
                .take(self.capacity)
                .map(|(value, count)| (value.clone(), AtomicU64::new(*count)))
                .collect();
            guard.insert(*kind, restored);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.counters.write() {
            guard.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.counters
            .read()
            .map_or(0, |guard| guard.values().map(HashMap::len).sum())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UsageHistory {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn counts_and_ranks_values() {
        let history = UsageHistory::new(10);
        history.record(PlaceholderKind::Tone, "friendly");
        history.record(PlaceholderKind::Tone, "formal");
        history.record(PlaceholderKind::Tone, "friendly");
        assert_eq!(history.count(PlaceholderKind::Tone, "friendly"), 2);
        assert_eq!(
            history.top(PlaceholderKind::Tone, 5),
            vec![("friendly".to_string(), 2), ("formal".to_string(), 1)]
        );
        assert!(history.top(PlaceholderKind::Niche, 5).is_empty());
    }

    #[test]
    fn full_kind_evicts_least_used() {
        let history = UsageHistory::new(2);
        history.record(PlaceholderKind::Tone, "a");
        history.record(PlaceholderKind::Tone, "a");
        history.record(PlaceholderKind::Tone, "b");
        history.record(PlaceholderKind::Tone, "c");
        assert_eq!(history.count(PlaceholderKind::Tone, "b"), 0);
        assert_eq!(history.count(PlaceholderKind::Tone, "a"), 2);
        assert_eq!(history.count(PlaceholderKind::Tone, "c"), 1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn snapshot_restores_into_fresh_history() {
        let history = UsageHistory::new(5);
        history.record(PlaceholderKind::Length, "1500");
        history.record(PlaceholderKind::Length, "1500");
        let json = serde_json::to_string(&history.snapshot()).unwrap();

        let restored = UsageHistory::new(5);
        restored.restore(&serde_json::from_str(&json).unwrap());
        assert_eq!(restored.count(PlaceholderKind::Length, "1500"), 2);
        assert_eq!(restored.snapshot().total(), 2);
    }

    #[test]
    fn restore_respects_capacity() {
        let mut snapshot = HistorySnapshot::default();
        snapshot.kinds.insert(
            PlaceholderKind::Tone,
            [("a".to_string(), 3), ("b".to_string(), 1), ("c".to_string(), 2)]
                .into_iter()
                .collect(),
        );
        let history = UsageHistory::new(2);
        history.restore(&snapshot);
        assert_eq!(history.count(PlaceholderKind::Tone, "b"), 0);
        assert_eq!(history.len(), 2);
    }
}
