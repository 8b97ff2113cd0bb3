//! List dialog: filters a list of strings by substring match, selection
//! confirmed with Enter (spec §4.13).

use super::{Dialog, DialogOutcome};
use crate::terminal::{Attrs, Cell, Color, KeyCode, KeyEvent, Renderer};

pub struct ListDialog {
    items: Vec<String>,
    filter: String,
    cursor: usize,
    confirmed: bool,
}

impl ListDialog {
    pub fn new(items: Vec<String>) -> Self {
        Self { items, filter: String::new(), cursor: 0, confirmed: false }
    }

    pub fn filtered(&self) -> Vec<&str> {
        let needle = self.filter.to_lowercase();
        self.items.iter().filter(|i| i.to_lowercase().contains(&needle)).map(String::as_str).collect()
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn selected(&self) -> Option<&str> {
        self.filtered().get(self.cursor).copied()
    }

    fn clamp_cursor(&mut self) {
        let len = self.filtered().len();
        if len == 0 {
            self.cursor = 0;
        } else if self.cursor >= len {
            self.cursor = len - 1;
        }
    }
}

impl Dialog for ListDialog {
    fn enter(&mut self) {
        self.confirmed = false;
        self.filter.clear();
        self.cursor = 0;
    }

    fn handle_key(&mut self, key: KeyEvent) -> DialogOutcome {
        match key.code {
            KeyCode::Char(c) => {
                self.filter.push(c);
                self.cursor = 0;
                DialogOutcome::Continue
            }
            KeyCode::Backspace => {
                self.filter.pop();
                self.cursor = 0;
                DialogOutcome::Continue
            }
            KeyCode::Up => {
                self.cursor = self.cursor.saturating_sub(1);
                DialogOutcome::Continue
            }
            KeyCode::Down => {
                self.cursor += 1;
                self.clamp_cursor();
                DialogOutcome::Continue
            }
            KeyCode::Enter => {
                self.confirmed = !self.filtered().is_empty();
                DialogOutcome::Close
            }
            KeyCode::Escape => DialogOutcome::Close,
            _ => DialogOutcome::Continue,
        }
    }

    fn render(&self, renderer: &mut dyn Renderer) {
        let width = self.items.iter().map(|i| i.len()).max().unwrap_or(10).max(20) as u16 + 2;
        let height = (self.filtered().len() as u16 + 2).min(renderer.rows());
        let (row0, rows) = super::clamp_and_center(renderer.rows(), height);
        let (col0, cols) = super::clamp_and_center(renderer.cols(), width);
        for (i, ch) in format!("filter: {}", self.filter).chars().take(cols as usize).enumerate() {
            renderer.set_cell(
                row0,
                col0 + i as u16,
                Cell { glyph: ch, fg: Color::Indexed(7), bg: Color::Indexed(0), attrs: Attrs { bold: true, ..Attrs::default() } },
            );
        }
        for (row_idx, item) in self.filtered().iter().enumerate().take(rows.saturating_sub(1) as usize) {
            let attrs = Attrs { reverse: row_idx == self.cursor, ..Attrs::default() };
            for (i, ch) in item.chars().take(cols as usize).enumerate() {
                renderer.set_cell(row0 + 1 + row_idx as u16, col0 + i as u16, Cell { glyph: ch, fg: Color::Indexed(15), bg: Color::Indexed(0), attrs });
            }
        }
    }

    fn exit(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_narrows_the_list() {
        let mut dlg = ListDialog::new(vec!["alpha".into(), "beta".into(), "gamma".into()]);
        for c in "ga".chars() {
            dlg.handle_key(KeyEvent::plain(KeyCode::Char(c)));
        }
        assert_eq!(dlg.filtered(), vec!["gamma"]);
    }

    #[test]
    fn enter_confirms_the_cursor_item() {
        let mut dlg = ListDialog::new(vec!["alpha".into(), "beta".into()]);
        dlg.handle_key(KeyEvent::plain(KeyCode::Down));
        dlg.handle_key(KeyEvent::plain(KeyCode::Enter));
        assert!(dlg.confirmed());
        assert_eq!(dlg.selected(), Some("beta"));
    }

    #[test]
    fn enter_on_an_empty_filtered_list_does_not_confirm() {
        let mut dlg = ListDialog::new(vec!["alpha".into()]);
        for c in "zzz".chars() {
            dlg.handle_key(KeyEvent::plain(KeyCode::Char(c)));
        }
        dlg.handle_key(KeyEvent::plain(KeyCode::Enter));
        assert!(!dlg.confirmed());
    }
}
