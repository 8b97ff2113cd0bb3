//! Bounded cursor history: remembers which entry name was selected the
//! last time a pane visited a given directory (spec §4.8 "Cursor
//! history"). Hand-rolled rather than pulled from an LRU crate — the
//! teacher keeps small bookkeeping structures like this inline rather
//! than reaching for a dependency (see its own handle tables).

use std::collections::{HashMap, VecDeque};

/// `(cwd_uri, name)` pairs, most-recently-used at the back. Capacity is
/// enforced on insert; a repeat visit moves its entry to the back
/// instead of growing the deque (spec: "LRU on repeat").
pub struct CursorHistory {
    capacity: usize,
    order: VecDeque<String>,
    names: HashMap<String, String>,
}

impl CursorHistory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), order: VecDeque::new(), names: HashMap::new() }
    }

    /// Records that `name` was the cursor position in `cwd_uri`.
    pub fn save(&mut self, cwd_uri: &str, name: &str) {
        if self.names.contains_key(cwd_uri) {
            self.order.retain(|k| k != cwd_uri);
        } else if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.names.remove(&evicted);
            }
        }
        self.order.push_back(cwd_uri.to_string());
        self.names.insert(cwd_uri.to_string(), name.to_string());
    }

    /// Looks up the last remembered cursor name for `cwd_uri`, if any.
    pub fn lookup(&self, cwd_uri: &str) -> Option<&str> {
        self.names.get(cwd_uri).map(String::as_str)
    }

    /// Drops every remembered entry for which `keep` returns `false`
    /// (spec §4.8 "Remote-path cleanup": local entries are checked for
    /// existence at startup, remote entries are kept unconditionally).
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.order.retain(|uri| keep(uri));
        self.names.retain(|uri, _| keep(uri));
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_most_recent_save_per_directory() {
        let mut history = CursorHistory::new(10);
        history.save("file:///a", "one.txt");
        history.save("file:///a", "two.txt");
        assert_eq!(history.lookup("file:///a"), Some("two.txt"));
    }

    #[test]
    fn evicts_oldest_entry_once_capacity_is_reached() {
        let mut history = CursorHistory::new(2);
        history.save("file:///a", "a.txt");
        history.save("file:///b", "b.txt");
        history.save("file:///c", "c.txt");
        assert_eq!(history.lookup("file:///a"), None);
        assert_eq!(history.lookup("file:///c"), Some("c.txt"));
    }

    #[test]
    fn repeat_save_does_not_grow_past_capacity() {
        let mut history = CursorHistory::new(2);
        history.save("file:///a", "a.txt");
        history.save("file:///b", "b.txt");
        history.save("file:///a", "a2.txt");
        history.save("file:///c", "c.txt");
        // "a" was refreshed so "b" should be the one evicted.
        assert_eq!(history.lookup("file:///b"), None);
        assert_eq!(history.lookup("file:///a"), Some("a2.txt"));
        assert_eq!(history.lookup("file:///c"), Some("c.txt"));
    }

    #[test]
    fn retain_drops_entries_that_fail_the_predicate() {
        let mut history = CursorHistory::new(10);
        history.save("file:///gone", "x.txt");
        history.save("s3://bucket/dir/", "y.txt");
        history.retain(|uri| uri.starts_with("s3://"));
        assert_eq!(history.lookup("file:///gone"), None);
        assert_eq!(history.lookup("s3://bucket/dir/"), Some("y.txt"));
    }
}
