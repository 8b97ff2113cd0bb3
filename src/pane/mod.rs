//! Per-pane state and its pure transitions (spec §4.8). Nothing here
//! talks to a terminal or a job queue directly — the Coordinator drives
//! refreshes and renders the result.

pub mod history;
pub mod sort;

use std::sync::atomic::{AtomicU64, Ordering};

use globset::{Glob, GlobMatcher};

use self::history::CursorHistory;
use self::sort::{sort_entries, SortKey};
use crate::path::{DirEntry, Path};

/// A monotonically increasing id attached to every refresh request so a
/// slow refresh that completes after a newer one was issued can be
/// dropped instead of clobbering fresher state (spec §5 "Ordering
/// guarantees": "refresh results supersede prior refresh results by
/// monotonic refresh-id; out-of-order completions are dropped").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshId(u64);

pub struct PaneModel {
    cwd: Path,
    entries: Vec<DirEntry>,
    cursor_index: usize,
    scroll_offset: usize,
    selection: Vec<String>,
    sort_key: SortKey,
    sort_ascending: bool,
    dirs_first: bool,
    filter: Option<GlobMatcher>,
    cursor_history: CursorHistory,
    refresh_counter: AtomicU64,
    current_refresh: RefreshId,
}

impl PaneModel {
    pub fn new(cwd: Path) -> Self {
        Self::with_history_capacity(cwd, 100)
    }

    pub fn with_history_capacity(cwd: Path, history_capacity: usize) -> Self {
        Self {
            cwd,
            entries: Vec::new(),
            cursor_index: 0,
            scroll_offset: 0,
            selection: Vec::new(),
            sort_key: SortKey::Name,
            sort_ascending: true,
            dirs_first: true,
            filter: None,
            cursor_history: CursorHistory::new(history_capacity),
            refresh_counter: AtomicU64::new(0),
            current_refresh: RefreshId(0),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor_index
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn cursor_entry(&self) -> Option<&DirEntry> {
        self.entries.get(self.cursor_index)
    }

    pub fn toggle_selection(&mut self, name: &str) {
        if let Some(pos) = self.selection.iter().position(|n| n == name) {
            self.selection.remove(pos);
        } else {
            self.selection.push(name.to_string());
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn set_sort(&mut self, key: SortKey, ascending: bool) {
        self.sort_key = key;
        self.sort_ascending = ascending;
        sort_entries(&mut self.entries, self.sort_key, self.dirs_first, self.sort_ascending);
    }

    pub fn toggle_dirs_first(&mut self) {
        self.dirs_first = !self.dirs_first;
        sort_entries(&mut self.entries, self.sort_key, self.dirs_first, self.sort_ascending);
    }

    pub fn set_filter(&mut self, pattern: Option<&str>) -> Result<(), globset::Error> {
        self.filter = match pattern {
            Some(p) if !p.is_empty() => Some(Glob::new(p)?.compile_matcher()),
            _ => None,
        };
        Ok(())
    }

    pub fn move_cursor(&mut self, delta: isize, viewport_rows: usize) {
        if self.entries.is_empty() {
            self.cursor_index = 0;
            self.scroll_offset = 0;
            return;
        }
        let max_index = self.entries.len() - 1;
        let new_index = (self.cursor_index as isize + delta).clamp(0, max_index as isize) as usize;
        self.cursor_index = new_index;
        if self.cursor_index < self.scroll_offset {
            self.scroll_offset = self.cursor_index;
        } else if viewport_rows > 0 && self.cursor_index >= self.scroll_offset + viewport_rows {
            self.scroll_offset = self.cursor_index + 1 - viewport_rows;
        }
    }

    /// Saves the current cursor name against the current `cwd`, switches
    /// to `dst`, and returns the id a caller should tag its refresh
    /// request with (spec §4.8 "navigate_into").
    pub fn navigate_into(&mut self, dst: Path) -> RefreshId {
        self.save_cursor_position();
        self.cwd = dst;
        self.selection.clear();
        self.begin_refresh()
    }

    pub fn go_parent(&mut self) -> Option<RefreshId> {
        let parent = self.cwd.parent()?;
        Some(self.navigate_into(parent))
    }

    fn save_cursor_position(&mut self) {
        if let Some(entry) = self.cursor_entry() {
            let name = entry.path.name();
            self.cursor_history.save(&self.cwd.as_uri(), &name);
        }
    }

    /// Allocates the next refresh id; the caller spawns the actual
    /// `cwd.iterdir()` work and must pass the id back to
    /// [`Self::apply_refresh`] on completion.
    pub fn begin_refresh(&self) -> RefreshId {
        RefreshId(self.refresh_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Applies a completed refresh's entries, unless a newer refresh was
    /// started in the meantime (spec §5: "out-of-order completions are
    /// dropped"). Restores the cursor to its remembered position for
    /// this directory, or index 0 if none is recorded (spec §4.8).
    pub fn apply_refresh(&mut self, id: RefreshId, mut entries: Vec<DirEntry>) -> bool {
        if id < self.current_refresh {
            return false;
        }
        self.current_refresh = id;

        if let Some(matcher) = &self.filter {
            entries.retain(|e| matcher.is_match(e.path.name()));
        }
        sort_entries(&mut entries, self.sort_key, self.dirs_first, self.sort_ascending);
        self.entries = entries;

        let remembered = self.cursor_history.lookup(&self.cwd.as_uri()).map(str::to_string);
        self.cursor_index = remembered
            .and_then(|name| self.entries.iter().position(|e| e.path.name() == name))
            .unwrap_or(0);
        self.scroll_offset = 0;
        true
    }

    /// Drops history entries for local paths that no longer exist,
    /// without making any network calls for remote entries (spec §4.8
    /// "Remote-path cleanup").
    pub async fn cleanup_history_on_startup(&mut self) {
        let mut doomed = Vec::new();
        for uri in self.cursor_history.uris() {
            if let Some(local_path) = uri.strip_prefix("file://") {
                if tokio::fs::metadata(local_path).await.is_err() {
                    doomed.push(uri.to_string());
                }
            }
        }
        self.cursor_history.retain(|uri| !doomed.iter().any(|d| d == uri));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{local::LocalPathImpl, EntryKind};
    use chrono::Utc;
    use std::sync::Arc;

    fn pane() -> PaneModel {
        let backend = Arc::new(LocalPathImpl::new());
        PaneModel::new(Path::local(backend, "/tmp"))
    }

    fn entry(name: &str) -> DirEntry {
        let backend = Arc::new(LocalPathImpl::new());
        DirEntry {
            path: Path::local(backend, &format!("/tmp/{name}")),
            size: 0,
            mtime: Utc::now(),
            kind: EntryKind::File,
        }
    }

    #[test]
    fn stale_refresh_is_dropped() {
        let mut pane = pane();
        let first = pane.begin_refresh();
        let second = pane.begin_refresh();
        assert!(pane.apply_refresh(second, vec![entry("b.txt")]));
        assert!(!pane.apply_refresh(first, vec![entry("a.txt")]));
        assert_eq!(pane.entries().len(), 1);
        assert_eq!(pane.entries()[0].path.name(), "b.txt");
    }

    #[test]
    fn refresh_restores_remembered_cursor() {
        let mut pane = pane();
        let id = pane.begin_refresh();
        pane.apply_refresh(id, vec![entry("a.txt"), entry("b.txt")]);
        pane.cursor_index = 1; // cursor sits on b.txt
        pane.save_cursor_position();

        let id2 = pane.begin_refresh();
        pane.apply_refresh(id2, vec![entry("a.txt"), entry("b.txt")]);
        assert_eq!(pane.cursor_entry().unwrap().path.name(), "b.txt");
    }

    #[test]
    fn toggle_selection_adds_and_removes() {
        let mut pane = pane();
        pane.toggle_selection("a.txt");
        assert_eq!(pane.selection(), &["a.txt".to_string()]);
        pane.toggle_selection("a.txt");
        assert!(pane.selection().is_empty());
    }
}
