//! Search dialog: edits a filename pattern and its mode (glob or regex),
//! compiling to the same [`crate::job::search::SearchPattern`] JobRunner
//! consumes (spec §4.13 "search-dialog", spec §4.10 "search").

use super::input::InputDialog;
use super::{Dialog, DialogOutcome};
use crate::job::search::SearchPattern;
use crate::terminal::{KeyCode, KeyEvent, Renderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Glob,
    Regex,
}

pub struct SearchDialog {
    input: InputDialog,
    mode: SearchMode,
}

impl SearchDialog {
    pub fn new() -> Self {
        Self { input: InputDialog::new("Search (Tab: toggle glob/regex)", ""), mode: SearchMode::Glob }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            SearchMode::Glob => SearchMode::Regex,
            SearchMode::Regex => SearchMode::Glob,
        };
    }

    pub fn confirmed(&self) -> bool {
        self.input.confirmed()
    }

    /// Compiles the current buffer under the active mode, or `None` if
    /// it doesn't parse.
    pub fn compile(&self) -> Option<SearchPattern> {
        match self.mode {
            SearchMode::Glob => globset::Glob::new(self.input.value()).ok().map(|g| SearchPattern::Glob(g.compile_matcher())),
            SearchMode::Regex => regex::Regex::new(self.input.value()).ok().map(SearchPattern::Regex),
        }
    }
}

impl Default for SearchDialog {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialog for SearchDialog {
    fn enter(&mut self) {
        self.input.enter();
    }

    fn handle_key(&mut self, key: KeyEvent) -> DialogOutcome {
        if key.code == KeyCode::Tab {
            self.toggle_mode();
            return DialogOutcome::Continue;
        }
        self.input.handle_key(key)
    }

    fn render(&self, renderer: &mut dyn Renderer) {
        self.input.render(renderer);
    }

    fn exit(&mut self) {
        self.input.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_toggles_between_glob_and_regex() {
        let mut dlg = SearchDialog::new();
        assert_eq!(dlg.mode(), SearchMode::Glob);
        dlg.handle_key(KeyEvent::plain(KeyCode::Tab));
        assert_eq!(dlg.mode(), SearchMode::Regex);
    }

    #[test]
    fn invalid_regex_fails_to_compile() {
        let mut dlg = SearchDialog::new();
        dlg.handle_key(KeyEvent::plain(KeyCode::Tab));
        for c in "[unterminated".chars() {
            dlg.handle_key(KeyEvent::plain(KeyCode::Char(c)));
        }
        assert!(dlg.compile().is_none());
    }

    #[test]
    fn valid_glob_compiles() {
        let mut dlg = SearchDialog::new();
        for c in "*.txt".chars() {
            dlg.handle_key(KeyEvent::plain(KeyCode::Char(c)));
        }
        assert!(dlg.compile().is_some());
    }
}
