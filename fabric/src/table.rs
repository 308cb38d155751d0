//! Keyed table with a cleanup hook for displaced values
//!
//! Daemons park long-lived resources (endpoints, adapter state) in a
//! [`Table`] so teardown is uniform: whatever leaves the table, by
//! overwrite, removal, or table drop, passes through the cleanup hook
//! exactly once.

use std::collections::HashMap;
use std::fmt;

/// String-keyed value store with an optional cleanup callback
///
/// The callback receives the key and the owned value whenever a live
/// entry leaves the table. Entries taken with [`Table::take`] skip the
/// callback; ownership moves to the caller instead.
pub struct Table<V> {
    entries: HashMap<String, V>,
    cleanup: Option<Box<dyn FnMut(&str, V) + Send>>,
}

impl<V> Table<V> {
    /// Create a table with no cleanup hook
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            cleanup: None,
        }
    }

    /// Create a table whose entries are passed to `cleanup` when they
    /// leave the table.
    pub fn with_cleanup(cleanup: impl FnMut(&str, V) + Send + 'static) -> Self {
        Self {
            entries: HashMap::new(),
            cleanup: Some(Box::new(cleanup)),
        }
    }

    /// Insert a value, cleaning up any displaced entry under the same key
    pub fn put(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        if let Some(displaced) = self.entries.insert(key.clone(), value) {
            if let Some(cleanup) = &mut self.cleanup {
                cleanup(&key, displaced);
            }
        }
    }

    /// Look up a value by key
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Look up a value mutably by key
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Remove an entry through the cleanup hook
    ///
    /// Returns `true` if an entry existed under the key.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(value) => {
                if let Some(cleanup) = &mut self.cleanup {
                    cleanup(key, value);
                }
                true
            }
            None => false,
        }
    }

    /// Remove an entry without running the cleanup hook
    pub fn take(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key)
    }

    /// Whether an entry exists under the key
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over live entries in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for Table<V> {
    fn drop(&mut self) {
        if let Some(cleanup) = &mut self.cleanup {
            for (key, value) in self.entries.drain() {
                cleanup(&key, value);
            }
        }
    }
}

impl<V> fmt::Debug for Table<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("len", &self.entries.len())
            .field("has_cleanup", &self.cleanup.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn tracked_table() -> (Table<u32>, Arc<Mutex<Vec<(String, u32)>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let table = Table::with_cleanup(move |key: &str, value| {
            sink.lock().push((key.to_string(), value));
        });
        (table, log)
    }

    #[test]
    fn test_put_get_remove() {
        let mut table = Table::new();
        table.put("uart0", 1u32);
        table.put("uart1", 2);

        assert_eq!(table.get("uart0"), Some(&1));
        assert_eq!(table.len(), 2);
        assert!(table.contains_key("uart1"));

        if let Some(value) = table.get_mut("uart1") {
            *value = 20;
        }
        assert_eq!(table.get("uart1"), Some(&20));

        assert!(table.remove("uart0"));
        assert!(!table.remove("uart0"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_overwrite_cleans_displaced_value() {
        let (mut table, log) = tracked_table();
        table.put("uart0", 1);
        table.put("uart0", 2);

        assert_eq!(*log.lock(), vec![("uart0".to_string(), 1)]);
        assert_eq!(table.get("uart0"), Some(&2));
    }

    #[test]
    fn test_remove_runs_cleanup_once() {
        let (mut table, log) = tracked_table();
        table.put("uart0", 7);

        assert!(table.remove("uart0"));
        assert_eq!(*log.lock(), vec![("uart0".to_string(), 7)]);

        // A second remove finds nothing and cleans nothing
        assert!(!table.remove("uart0"));
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_drop_cleans_each_live_entry_exactly_once() {
        let (mut table, log) = tracked_table();
        table.put("a", 1);
        table.put("b", 2);
        table.put("c", 3);
        table.remove("b");

        drop(table);

        let mut seen = log.lock().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), 1),
                ("b".to_string(), 2),
                ("c".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_take_skips_cleanup() {
        let (mut table, log) = tracked_table();
        table.put("uart0", 9);

        assert_eq!(table.take("uart0"), Some(9));
        drop(table);

        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_table_without_cleanup_drops_quietly() {
        let mut table = Table::new();
        table.put("uart0", "adapter");
        table.put("uart0", "replacement");
        assert!(table.remove("uart0"));
        // Drop runs with no hook installed
    }

    #[test]
    fn test_iter_sees_live_entries() {
        let mut table = Table::new();
        table.put("a", 1);
        table.put("b", 2);

        let mut keys: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
