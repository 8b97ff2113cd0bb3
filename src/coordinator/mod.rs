//! Single-threaded cooperative event loop (spec §4.9). The tick loop is
//! plain synchronous code — no `async` on the UI thread itself; async
//! only begins at the JobRunner boundary, reached via progress channels
//! drained non-blockingly once per tick, mirroring how the teacher wires
//! `ReadTask`/`VfsTask`/`StreamWriter` together over channels rather than
//! shared mutable state.

pub mod mode;

use std::time::{Duration, Instant};

use self::mode::{Mode, ModeStack};
use crate::config::Config;
use crate::env_vars::Side;
use crate::job::{fingerprint_root, CancelToken, JobFingerprint, JobId, JobKind, Progress};
use crate::pane::{PaneModel, RefreshId};
use crate::path::Path;
use crate::terminal::{InputEvent, KeyCode, KeyEvent, SystemEvent};

/// A logical action a key resolves to, independent of which physical key
/// produced it (spec §4.9 "Key-to-action resolution is configurable via
/// key_bindings").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CursorUp,
    CursorDown,
    PageUp,
    PageDown,
    Enter,
    Parent,
    ToggleSelection,
    ClearSelection,
    SwitchPane,
    ToggleDirsFirst,
    OpenFilter,
    OpenRename,
    OpenCreate,
    OpenBatchRename,
    OpenSearch,
    OpenJump,
    OpenInfo,
    ViewText,
    Suspend,
    Copy,
    Move,
    Delete,
    Cancel,
    Quit,
}

impl Action {
    const ALL: &'static [Action] = &[
        Action::CursorUp,
        Action::CursorDown,
        Action::PageUp,
        Action::PageDown,
        Action::Enter,
        Action::Parent,
        Action::ToggleSelection,
        Action::ClearSelection,
        Action::SwitchPane,
        Action::ToggleDirsFirst,
        Action::OpenFilter,
        Action::OpenRename,
        Action::OpenCreate,
        Action::OpenBatchRename,
        Action::OpenSearch,
        Action::OpenJump,
        Action::OpenInfo,
        Action::ViewText,
        Action::Suspend,
        Action::Copy,
        Action::Move,
        Action::Delete,
        Action::Cancel,
        Action::Quit,
    ];

    /// The name looked up in `Config::key_bindings`.
    fn config_name(self) -> &'static str {
        match self {
            Action::CursorUp => "cursor_up",
            Action::CursorDown => "cursor_down",
            Action::PageUp => "page_up",
            Action::PageDown => "page_down",
            Action::Enter => "enter",
            Action::Parent => "parent",
            Action::ToggleSelection => "toggle_selection",
            Action::ClearSelection => "clear_selection",
            Action::SwitchPane => "switch_pane",
            Action::ToggleDirsFirst => "toggle_dirs_first",
            Action::OpenFilter => "open_filter",
            Action::OpenRename => "open_rename",
            Action::OpenCreate => "open_create",
            Action::OpenBatchRename => "open_batch_rename",
            Action::OpenSearch => "open_search",
            Action::OpenJump => "open_jump",
            Action::OpenInfo => "open_info",
            Action::ViewText => "view_text",
            Action::Suspend => "suspend",
            Action::Copy => "copy",
            Action::Move => "move",
            Action::Delete => "delete",
            Action::Cancel => "cancel",
            Action::Quit => "quit",
        }
    }
}

/// The built-in binding a key resolves to when `key_bindings` has no
/// override for that action (spec: bindings are "configurable", implying
/// a working default set).
const DEFAULT_BINDINGS: &[(Action, &str)] = &[
    (Action::CursorUp, "up"),
    (Action::CursorDown, "down"),
    (Action::PageUp, "pageup"),
    (Action::PageDown, "pagedown"),
    (Action::Enter, "enter"),
    (Action::Parent, "backspace"),
    (Action::ToggleSelection, " "),
    (Action::ClearSelection, "ctrl+u"),
    (Action::SwitchPane, "tab"),
    (Action::ToggleDirsFirst, "ctrl+d"),
    (Action::OpenFilter, "/"),
    (Action::OpenRename, "r"),
    (Action::OpenCreate, "n"),
    (Action::OpenBatchRename, "%"),
    (Action::OpenSearch, "f"),
    (Action::OpenJump, "ctrl+j"),
    (Action::OpenInfo, "i"),
    (Action::ViewText, "v"),
    (Action::Suspend, "ctrl+z"),
    (Action::Copy, "c"),
    (Action::Move, "m"),
    (Action::Delete, "delete"),
    (Action::Cancel, "escape"),
    (Action::Quit, "q"),
];

fn key_token(key: KeyEvent) -> String {
    let mut s = String::new();
    if key.modifiers.ctrl {
        s.push_str("ctrl+");
    }
    if key.modifiers.alt {
        s.push_str("alt+");
    }
    if key.modifiers.shift {
        s.push_str("shift+");
    }
    match key.code {
        KeyCode::Char(c) => s.push(c),
        KeyCode::Enter => s.push_str("enter"),
        KeyCode::Escape => s.push_str("escape"),
        KeyCode::Tab => s.push_str("tab"),
        KeyCode::BackTab => s.push_str("backtab"),
        KeyCode::Backspace => s.push_str("backspace"),
        KeyCode::Delete => s.push_str("delete"),
        KeyCode::Up => s.push_str("up"),
        KeyCode::Down => s.push_str("down"),
        KeyCode::Left => s.push_str("left"),
        KeyCode::Right => s.push_str("right"),
        KeyCode::PageUp => s.push_str("pageup"),
        KeyCode::PageDown => s.push_str("pagedown"),
        KeyCode::Home => s.push_str("home"),
        KeyCode::End => s.push_str("end"),
        KeyCode::Function(n) => s.push_str(&format!("f{n}")),
    }
    s
}

fn resolve_action(config: &Config, key: KeyEvent) -> Option<Action> {
    let token = key_token(key);
    for action in Action::ALL {
        if config.key_bindings.get(action.config_name()).is_some_and(|bound| bound.contains(&token)) {
            return Some(*action);
        }
    }
    DEFAULT_BINDINGS.iter().find(|(_, k)| *k == token).map(|(a, _)| *a)
}

/// What a caller should do after a [`Coordinator::tick`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    pub should_render: bool,
    pub should_quit: bool,
}

/// One registered background task the Coordinator is watching for
/// progress (spec §4.9 "collect progress deltas from JobRunner").
struct WatchedJob {
    id: JobId,
    cancel: CancelToken,
    rx: async_channel::Receiver<Progress>,
}

/// A directory navigation the Coordinator has already applied to the
/// pane's `cwd`, still waiting on its `iterdir()` (spec §2 control
/// flow: "PaneModel mutation ∨ JobRunner task"). `tick`/`handle_key`
/// stay synchronous, so the async listing itself is left to whoever
/// drains this queue after a tick and feeds the result back through
/// `PaneModel::apply_refresh`.
pub struct PendingDirLoad {
    pub side: Side,
    pub refresh_id: RefreshId,
    pub dir: Path,
}

/// A file operation the Coordinator has resolved sources/destination
/// for but not yet submitted to a `JobRunner`, since `JobRunner::begin`
/// is async and the tick loop is not (spec line 230: "workers and
/// dialogs receive borrowed handles or message channels — no shared
/// mutable graph"). Mirrors `job::file_ops`'s own `copy`/`mv`/`delete`
/// argument shapes.
pub enum PendingFileOp {
    Copy { fingerprint: JobFingerprint, srcs: Vec<Path>, dst_dir: Path, overwrite: bool },
    Move { fingerprint: JobFingerprint, srcs: Vec<Path>, dst_dir: Path, overwrite: bool },
    Delete { fingerprint: JobFingerprint, paths: Vec<Path> },
}

pub struct Coordinator {
    pub left: PaneModel,
    pub right: PaneModel,
    active: Side,
    mode_stack: ModeStack,
    config: Config,
    dirty: bool,
    last_draw: Option<Instant>,
    watched_jobs: Vec<WatchedJob>,
    last_progress: Vec<Progress>,
    pending_dir_loads: Vec<PendingDirLoad>,
    pending_file_ops: Vec<PendingFileOp>,
}

impl Coordinator {
    pub fn new(left: PaneModel, right: PaneModel, config: Config) -> Self {
        Self {
            left,
            right,
            active: Side::Left,
            mode_stack: ModeStack::new(),
            config,
            dirty: true,
            last_draw: None,
            watched_jobs: Vec::new(),
            last_progress: Vec::new(),
            pending_dir_loads: Vec::new(),
            pending_file_ops: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode_stack.top()
    }

    pub fn active_side(&self) -> Side {
        self.active
    }

    pub fn active_pane(&self) -> &PaneModel {
        match self.active {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn active_pane_mut(&mut self) -> &mut PaneModel {
        match self.active {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    fn other_pane(&self) -> &PaneModel {
        match self.active {
            Side::Left => &self.right,
            Side::Right => &self.left,
        }
    }

    /// The selection if non-empty, else the entry under the cursor
    /// (mirrors `env_vars.rs`'s `selected_names` fallback).
    fn selected_paths(pane: &PaneModel) -> Vec<Path> {
        if pane.selection().is_empty() {
            pane.cursor_entry().map(|e| e.path.clone()).into_iter().collect()
        } else {
            pane.selection().iter().map(|name| pane.cwd().join(name)).collect()
        }
    }

    /// Registers a job started elsewhere (JobRunner + a spawned task) so
    /// its progress gets drained every tick.
    pub fn watch_job(&mut self, id: JobId, cancel: CancelToken, rx: async_channel::Receiver<Progress>) {
        self.watched_jobs.push(WatchedJob { id, cancel, rx });
    }

    /// Progress records collected since the last call, most recent last.
    /// Cleared each time this is read.
    pub fn drain_last_progress(&mut self) -> Vec<Progress> {
        std::mem::take(&mut self.last_progress)
    }

    /// Directory loads queued by this tick's key handling, still
    /// waiting on their `iterdir()`. Cleared each time this is read.
    pub fn drain_pending_dir_loads(&mut self) -> Vec<PendingDirLoad> {
        std::mem::take(&mut self.pending_dir_loads)
    }

    /// File operations queued by this tick's key handling, still
    /// waiting on `JobRunner::begin`. Cleared each time this is read.
    pub fn drain_pending_file_ops(&mut self) -> Vec<PendingFileOp> {
        std::mem::take(&mut self.pending_file_ops)
    }

    /// Runs one loop iteration: folds `events` through the current mode,
    /// drains finished/in-flight job progress, and decides whether a
    /// redraw is due (spec §4.9, §5 "Redraw throttling").
    pub fn tick(&mut self, events: &[InputEvent]) -> TickOutcome {
        let mut quit = false;
        for event in events {
            match event {
                InputEvent::Key(key) => {
                    if self.handle_key(*key) {
                        quit = true;
                    }
                }
                InputEvent::System(SystemEvent::Resize { .. }) => {
                    // Dialogs cache their own dimensions against the
                    // terminal bounds; a resize invalidates all of them
                    // and forces a full redraw (spec §4.9).
                    self.dirty = true;
                }
            }
        }

        self.watched_jobs.retain_mut(|job| {
            let mut finished = false;
            while let Ok(progress) = job.rx.try_recv() {
                finished = progress.finished;
                self.dirty = true;
                self.last_progress.push(progress);
            }
            !finished
        });

        let min_interval = Duration::from_millis(self.config.progress_redraw_min_interval_ms as u64);
        let elapsed_enough = match self.last_draw {
            Some(t) => t.elapsed() >= min_interval,
            None => true,
        };
        let should_render = self.dirty && elapsed_enough;
        if should_render {
            self.dirty = false;
            self.last_draw = Some(Instant::now());
        }

        TickOutcome { should_render, should_quit: quit }
    }

    /// Returns `true` if the key should terminate the loop.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let Some(action) = resolve_action(&self.config, key) else { return false };

        if self.mode_stack.top().is_dialog() {
            // Dialog-specific key handling (text editing, list filtering,
            // batch-rename preview) lives on the dialog objects
            // themselves (spec §4.13); the Coordinator only owns the
            // shared "escape closes the topmost dialog" rule.
            if action == Action::Cancel {
                self.mode_stack.exit();
                self.dirty = true;
            }
            return false;
        }

        match action {
            Action::CursorUp => self.active_pane_mut().move_cursor(-1, usize::MAX),
            Action::CursorDown => self.active_pane_mut().move_cursor(1, usize::MAX),
            Action::PageUp => self.active_pane_mut().move_cursor(-10, usize::MAX),
            Action::PageDown => self.active_pane_mut().move_cursor(10, usize::MAX),
            Action::ToggleSelection => {
                if let Some(name) = self.active_pane().cursor_entry().map(|e| e.path.name()) {
                    self.active_pane_mut().toggle_selection(&name);
                }
            }
            Action::ClearSelection => self.active_pane_mut().clear_selection(),
            Action::SwitchPane => self.active = if self.active == Side::Left { Side::Right } else { Side::Left },
            Action::ToggleDirsFirst => self.active_pane_mut().toggle_dirs_first(),
            Action::Parent => {
                if let Some(refresh_id) = self.active_pane_mut().go_parent() {
                    let side = self.active;
                    let dir = self.active_pane().cwd().clone();
                    self.pending_dir_loads.push(PendingDirLoad { side, refresh_id, dir });
                }
            }
            Action::OpenFilter => self.mode_stack.enter(Mode::Filter),
            Action::OpenRename => self.mode_stack.enter(Mode::Rename),
            Action::OpenCreate => self.mode_stack.enter(Mode::Create),
            Action::OpenBatchRename => self.mode_stack.enter(Mode::BatchRename),
            Action::OpenSearch => self.mode_stack.enter(Mode::SearchDialog),
            Action::OpenJump => self.mode_stack.enter(Mode::JumpDialog),
            Action::OpenInfo => self.mode_stack.enter(Mode::InfoDialog),
            Action::ViewText => self.mode_stack.enter(Mode::TextViewer),
            Action::Suspend => self.mode_stack.enter(Mode::SubshellSuspend),
            Action::Enter => {
                let target = self.active_pane().cursor_entry().filter(|e| e.kind.is_dir_like()).map(|e| e.path.clone());
                if let Some(target) = target {
                    let side = self.active;
                    let refresh_id = self.active_pane_mut().navigate_into(target.clone());
                    self.pending_dir_loads.push(PendingDirLoad { side, refresh_id, dir: target });
                }
                // Opening a regular file is left to an external
                // collaborator; this crate owns no process spawner.
            }
            Action::Copy => {
                let srcs = Self::selected_paths(self.active_pane());
                if !srcs.is_empty() {
                    let dst_dir = self.other_pane().cwd().clone();
                    let fingerprint = JobFingerprint { kind: JobKind::Copy, root: fingerprint_root(&dst_dir) };
                    self.pending_file_ops.push(PendingFileOp::Copy { fingerprint, srcs, dst_dir, overwrite: false });
                }
            }
            Action::Move => {
                let srcs = Self::selected_paths(self.active_pane());
                if !srcs.is_empty() {
                    let dst_dir = self.other_pane().cwd().clone();
                    let fingerprint = JobFingerprint { kind: JobKind::Move, root: fingerprint_root(&dst_dir) };
                    self.pending_file_ops.push(PendingFileOp::Move { fingerprint, srcs, dst_dir, overwrite: false });
                }
            }
            Action::Delete => {
                let paths = Self::selected_paths(self.active_pane());
                if !paths.is_empty() {
                    let fingerprint =
                        JobFingerprint { kind: JobKind::Delete, root: fingerprint_root(self.active_pane().cwd()) };
                    self.pending_file_ops.push(PendingFileOp::Delete { fingerprint, paths });
                }
            }
            Action::Cancel => {
                for job in &self.watched_jobs {
                    job.cancel.cancel();
                }
            }
            Action::Quit => return true,
        }
        self.dirty = true;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{local::LocalPathImpl, DirEntry, EntryKind, Path};
    use chrono::Utc;
    use std::sync::Arc;

    fn coordinator() -> Coordinator {
        let backend = Arc::new(LocalPathImpl::new());
        let left = PaneModel::new(Path::local(backend.clone(), "/tmp/left"));
        let right = PaneModel::new(Path::local(backend, "/tmp/right"));
        Coordinator::new(left, right, Config::default())
    }

    #[test]
    fn tab_switches_the_active_pane() {
        let mut coord = coordinator();
        assert_eq!(coord.active_side(), Side::Left);
        coord.tick(&[InputEvent::Key(KeyEvent::plain(KeyCode::Tab))]);
        assert_eq!(coord.active_side(), Side::Right);
    }

    #[test]
    fn opening_a_dialog_then_escape_returns_to_normal() {
        let mut coord = coordinator();
        coord.tick(&[InputEvent::Key(KeyEvent::plain(KeyCode::Char('/')))]);
        assert_eq!(coord.mode(), Mode::Filter);
        coord.tick(&[InputEvent::Key(KeyEvent::plain(KeyCode::Escape))]);
        assert_eq!(coord.mode(), Mode::Normal);
    }

    #[test]
    fn a_second_dialog_replaces_the_first() {
        let mut coord = coordinator();
        coord.tick(&[InputEvent::Key(KeyEvent::plain(KeyCode::Char('/')))]);
        coord.tick(&[InputEvent::Key(KeyEvent::plain(KeyCode::Char('r')))]);
        assert_eq!(coord.mode(), Mode::Rename);
    }

    #[test]
    fn redraw_is_throttled_to_the_configured_interval() {
        let mut coord = coordinator();
        let mut cfg = Config::default();
        cfg.progress_redraw_min_interval_ms = 1_000;
        coord.config = cfg;
        let first = coord.tick(&[]);
        assert!(first.should_render);
        coord.dirty = true;
        let second = coord.tick(&[]);
        assert!(!second.should_render);
    }

    #[test]
    fn quit_action_is_reported() {
        let mut coord = coordinator();
        let outcome = coord.tick(&[InputEvent::Key(KeyEvent::plain(KeyCode::Char('q')))]);
        assert!(outcome.should_quit);
    }

    fn seed_entry(pane: &mut PaneModel, path: Path, kind: EntryKind) {
        let id = pane.begin_refresh();
        pane.apply_refresh(id, vec![DirEntry { path, size: 0, mtime: Utc::now(), kind }]);
    }

    #[test]
    fn enter_on_a_directory_queues_a_pending_dir_load() {
        let mut coord = coordinator();
        let backend = Arc::new(LocalPathImpl::new());
        let sub = Path::local(backend, "/tmp/left/sub");
        seed_entry(&mut coord.left, sub.clone(), EntryKind::Dir);

        coord.tick(&[InputEvent::Key(KeyEvent::plain(KeyCode::Enter))]);

        let loads = coord.drain_pending_dir_loads();
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].side, Side::Left);
        assert_eq!(loads[0].dir.as_uri(), sub.as_uri());
        assert_eq!(coord.left.cwd().as_uri(), sub.as_uri());
    }

    #[test]
    fn enter_on_a_regular_file_queues_nothing() {
        let mut coord = coordinator();
        let backend = Arc::new(LocalPathImpl::new());
        let file = Path::local(backend, "/tmp/left/a.txt");
        seed_entry(&mut coord.left, file, EntryKind::File);

        coord.tick(&[InputEvent::Key(KeyEvent::plain(KeyCode::Enter))]);

        assert!(coord.drain_pending_dir_loads().is_empty());
    }

    #[test]
    fn copy_action_queues_selection_against_the_other_panes_cwd() {
        let mut coord = coordinator();
        let backend = Arc::new(LocalPathImpl::new());
        let file = Path::local(backend, "/tmp/left/a.txt");
        seed_entry(&mut coord.left, file, EntryKind::File);
        coord.left.toggle_selection("a.txt");

        coord.tick(&[InputEvent::Key(KeyEvent::plain(KeyCode::Char('c')))]);

        let ops = coord.drain_pending_file_ops();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            PendingFileOp::Copy { srcs, dst_dir, .. } => {
                assert_eq!(srcs.len(), 1);
                assert_eq!(srcs[0].name(), "a.txt");
                assert_eq!(dst_dir.as_uri(), coord.right.cwd().as_uri());
            }
            _ => panic!("expected a Copy op"),
        }
    }

    #[test]
    fn delete_with_no_selection_falls_back_to_the_cursor_entry() {
        let mut coord = coordinator();
        let backend = Arc::new(LocalPathImpl::new());
        let file = Path::local(backend, "/tmp/left/a.txt");
        seed_entry(&mut coord.left, file, EntryKind::File);

        coord.tick(&[InputEvent::Key(KeyEvent::plain(KeyCode::Delete))]);

        let ops = coord.drain_pending_file_ops();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            PendingFileOp::Delete { paths, .. } => {
                assert_eq!(paths.len(), 1);
                assert_eq!(paths[0].name(), "a.txt");
            }
            _ => panic!("expected a Delete op"),
        }
    }

    #[tokio::test]
    async fn cancel_action_cancels_every_watched_job() {
        let mut coord = coordinator();
        let runner = crate::job::JobRunner::new();
        let fp = JobFingerprint { kind: JobKind::Copy, root: "file:///tmp".to_string() };
        let (id, cancel, _tx, rx) = runner.begin(fp).await;
        coord.watch_job(id, cancel.clone(), rx);

        coord.tick(&[InputEvent::Key(KeyEvent::plain(KeyCode::Escape))]);

        assert!(cancel.is_cancelled());
    }
}
