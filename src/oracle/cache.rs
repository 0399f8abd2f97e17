/*!
The oracle query cache.

Answers are cached per solve, keyed by the concrete input tuple, the
output pattern, the scope-masked interpretation and assigned set, and the
size of the scope-masked program mask. The mask size is part of the key
because a cached *negative* conclusion may be invalidated by the later
introduction of new ground atoms over an input predicate: two queries
with identical scope-masked interpretations but different program-mask
sizes must not share an entry.

The cache is shared process-wide within a solve and guarded by a mutex
for the asynchronous variant. Oracles which use an environment reset it
explicitly.
*/

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::OracleAnswer;
use crate::structures::{Id, Interpretation};

/// The key of a cached answer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// The concrete input tuple.
    pub input: Vec<Id>,

    /// The output pattern.
    pub pattern: Vec<Id>,

    /// The scope-masked interpretation.
    pub interpretation: Interpretation,

    /// The scope-masked assigned set, absent for total queries.
    pub assigned: Option<Interpretation>,

    /// The size of the scope-masked program mask at query time.
    pub mask_size: usize,
}

/// A mutex-guarded query→answer cache.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<QueryKey, Arc<OracleAnswer>>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        QueryCache::default()
    }

    /// The cached answer under `key`, if any.
    pub fn get(&self, key: &QueryKey) -> Option<Arc<OracleAnswer>> {
        self.entries
            .lock()
            .expect("! Cache mutex poisoned")
            .get(key)
            .cloned()
    }

    /// Cache `answer` under `key`.
    pub fn insert(&self, key: QueryKey, answer: Arc<OracleAnswer>) {
        self.entries
            .lock()
            .expect("! Cache mutex poisoned")
            .insert(key, answer);
    }

    /// Drop every entry; used by environment-reading oracles on
    /// environment change.
    pub fn reset(&self) {
        self.entries
            .lock()
            .expect("! Cache mutex poisoned")
            .clear();
    }

    /// A count of cached answers.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("! Cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(mask_size: usize) -> QueryKey {
        QueryKey {
            input: Vec::new(),
            pattern: Vec::new(),
            interpretation: Interpretation::new(),
            assigned: None,
            mask_size,
        }
    }

    #[test]
    fn mask_size_separates_entries() {
        let cache = QueryCache::new();
        cache.insert(key(2), Arc::new(OracleAnswer::default()));

        assert!(cache.get(&key(2)).is_some());
        // A grown program mask must not reuse the stale conclusion.
        assert!(cache.get(&key(3)).is_none());
    }
}
