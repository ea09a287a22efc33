use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::store::{OptimisticStore, SEED_VALUE};

#[derive(Debug)]
struct Record {
    value: String,
    version: u64,
}

/// A process-local [`OptimisticStore`] backed by a shared map.
///
/// Every record carries a version number that is bumped on each successful
/// write; the version seen at [`read`] is the fencing token.
///
/// Cloning returns a **new participant** over the same backend with its own,
/// empty token table. This is how several generators racing on one counter
/// are modelled in tests.
///
/// ## Recommended When
/// - Tests and benchmarks
/// - Several generators inside one process that need disjoint ranges
///
/// [`read`]: OptimisticStore::read
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, Record>>>,
    fences: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the persisted value for `scope` without seeding or fencing.
    pub fn value(&self, scope: &str) -> Option<String> {
        relock(&self.records).get(scope).map(|r| r.value.clone())
    }

    /// Returns the record version for `scope`: `1` after seeding, plus one per
    /// successful write.
    pub fn version(&self, scope: &str) -> Option<u64> {
        relock(&self.records).get(scope).map(|r| r.version)
    }

    /// Overwrites `scope` unconditionally, bumping its version.
    ///
    /// Simulates a foreign writer; any outstanding fences become stale.
    pub fn force(&self, scope: &str, value: impl Into<String>) {
        let mut records = relock(&self.records);
        let record = records.entry(scope.to_owned()).or_insert(Record {
            value: String::new(),
            version: 0,
        });
        record.value = value.into();
        record.version += 1;
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            fences: Mutex::default(),
        }
    }
}

impl OptimisticStore for MemoryStore {
    type Err = Infallible;

    fn read(&self, scope: &str) -> Result<String, Self::Err> {
        let (value, version) = {
            let mut records = relock(&self.records);
            let record = records.entry(scope.to_owned()).or_insert_with(|| Record {
                value: SEED_VALUE.to_owned(),
                version: 1,
            });
            (record.value.clone(), record.version)
        };
        relock(&self.fences).insert(scope.to_owned(), version);
        Ok(value)
    }

    fn try_write(&self, scope: &str, value: &str) -> Result<bool, Self::Err> {
        let mut fences = relock(&self.fences);
        let Some(fence) = fences.get_mut(scope) else {
            return Ok(false);
        };

        let mut records = relock(&self.records);
        match records.get_mut(scope) {
            Some(record) if record.version == *fence => {
                record.value = value.to_owned();
                record.version += 1;
                *fence = record.version;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// Records are plain values, so a panic elsewhere cannot leave them torn.
fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_seeds_absent_scope() {
        let store = MemoryStore::new();
        assert_eq!(store.value("a"), None);
        assert_eq!(store.read("a").unwrap(), SEED_VALUE);
        assert_eq!(store.version("a"), Some(1));
    }

    #[test]
    fn write_without_read_conflicts() {
        let store = MemoryStore::new();
        store.force("a", "7");
        assert!(!store.try_write("a", "8").unwrap());
        assert_eq!(store.value("a").as_deref(), Some("7"));
    }

    #[test]
    fn stale_fence_conflicts() {
        let a = MemoryStore::new();
        let b = a.clone();
        assert_eq!(a.read("s").unwrap(), "1");
        assert_eq!(b.read("s").unwrap(), "1");

        assert!(b.try_write("s", "11").unwrap());
        assert!(!a.try_write("s", "11").unwrap());

        assert_eq!(a.read("s").unwrap(), "11");
        assert!(a.try_write("s", "21").unwrap());
        assert_eq!(b.value("s").as_deref(), Some("21"));
    }

    #[test]
    fn own_write_keeps_fence_current() {
        let store = MemoryStore::new();
        store.read("s").unwrap();
        assert!(store.try_write("s", "2").unwrap());
        assert!(store.try_write("s", "3").unwrap());
        assert_eq!(store.version("s"), Some(3));
    }

    #[test]
    fn concurrent_seeding_is_effective_once() {
        let base = MemoryStore::new();
        let participants: Vec<_> = (0..8).map(|_| base.clone()).collect();
        let barrier = std::sync::Barrier::new(participants.len());

        std::thread::scope(|s| {
            for p in &participants {
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    assert_eq!(p.read("fresh").unwrap(), SEED_VALUE);
                });
            }
        });

        assert_eq!(base.version("fresh"), Some(1));
        let wins = participants
            .iter()
            .filter(|p| p.try_write("fresh", "101").unwrap())
            .count();
        assert_eq!(wins, 1);
    }
}
