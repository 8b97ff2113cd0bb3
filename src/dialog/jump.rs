//! Jump dialog: picks a destination URI from the configured favorite
//! paths by substring filter (spec §4.13 "jump-dialog"; favorites come
//! from `Config::favorite_paths`, spec §6 persisted state).

use super::list_dialog::ListDialog;
use super::{Dialog, DialogOutcome};
use crate::config::FavoritePath;
use crate::terminal::{KeyEvent, Renderer};

pub struct JumpDialog {
    list: ListDialog,
    favorites: Vec<FavoritePath>,
}

impl JumpDialog {
    pub fn new(favorites: Vec<FavoritePath>) -> Self {
        let names = favorites.iter().map(|f| f.name.clone()).collect();
        Self { list: ListDialog::new(names), favorites }
    }

    pub fn confirmed(&self) -> bool {
        self.list.confirmed()
    }

    pub fn selected_uri(&self) -> Option<&str> {
        let name = self.list.selected()?;
        self.favorites.iter().find(|f| f.name == name).map(|f| f.uri.as_str())
    }
}

impl Dialog for JumpDialog {
    fn enter(&mut self) {
        self.list.enter();
    }

    fn handle_key(&mut self, key: KeyEvent) -> DialogOutcome {
        self.list.handle_key(key)
    }

    fn render(&self, renderer: &mut dyn Renderer) {
        self.list.render(renderer);
    }

    fn exit(&mut self) {
        self.list.exit();
    }
}
