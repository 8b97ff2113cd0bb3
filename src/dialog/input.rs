//! Single-line text editor, the basis for rename/create/filter prompts
//! (spec §4.13).

use super::{Dialog, DialogOutcome};
use crate::terminal::{Attrs, Cell, Color, KeyCode, KeyEvent, Renderer};

pub struct InputDialog {
    title: String,
    buffer: String,
    cursor: usize,
    confirmed: bool,
}

impl InputDialog {
    pub fn new(title: impl Into<String>, initial: impl Into<String>) -> Self {
        let buffer: String = initial.into();
        let cursor = buffer.chars().count();
        Self { title: title.into(), buffer, cursor, confirmed: false }
    }

    pub fn value(&self) -> &str {
        &self.buffer
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.buffer.char_indices().nth(char_index).map(|(i, _)| i).unwrap_or(self.buffer.len())
    }

    fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let at = self.byte_index(self.cursor - 1);
        self.buffer.remove(at);
        self.cursor -= 1;
    }
}

impl Dialog for InputDialog {
    fn enter(&mut self) {
        self.confirmed = false;
    }

    fn handle_key(&mut self, key: KeyEvent) -> DialogOutcome {
        match key.code {
            KeyCode::Char(c) => {
                self.insert(c);
                DialogOutcome::Continue
            }
            KeyCode::Backspace => {
                self.backspace();
                DialogOutcome::Continue
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                DialogOutcome::Continue
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.buffer.chars().count());
                DialogOutcome::Continue
            }
            KeyCode::Home => {
                self.cursor = 0;
                DialogOutcome::Continue
            }
            KeyCode::End => {
                self.cursor = self.buffer.chars().count();
                DialogOutcome::Continue
            }
            KeyCode::Enter => {
                self.confirmed = true;
                DialogOutcome::Close
            }
            KeyCode::Escape => DialogOutcome::Close,
            _ => DialogOutcome::Continue,
        }
    }

    fn render(&self, renderer: &mut dyn Renderer) {
        let width = (self.buffer.len().max(self.title.len()) + 4) as u16;
        let (row0, _) = super::clamp_and_center(renderer.rows(), 3);
        let (col0, cols) = super::clamp_and_center(renderer.cols(), width);
        for (i, ch) in self.title.chars().take(cols as usize).enumerate() {
            renderer.set_cell(
                row0,
                col0 + i as u16,
                Cell { glyph: ch, fg: Color::Indexed(7), bg: Color::Indexed(0), attrs: Attrs { bold: true, ..Attrs::default() } },
            );
        }
        for (i, ch) in self.buffer.chars().take(cols as usize).enumerate() {
            renderer.set_cell(
                row0 + 1,
                col0 + i as u16,
                Cell { glyph: ch, fg: Color::Indexed(15), bg: Color::Indexed(0), attrs: Attrs::default() },
            );
        }
    }

    fn exit(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_appends_and_backspace_removes() {
        let mut dlg = InputDialog::new("Rename", "");
        dlg.handle_key(KeyEvent::plain(KeyCode::Char('a')));
        dlg.handle_key(KeyEvent::plain(KeyCode::Char('b')));
        assert_eq!(dlg.value(), "ab");
        dlg.handle_key(KeyEvent::plain(KeyCode::Backspace));
        assert_eq!(dlg.value(), "a");
    }

    #[test]
    fn enter_confirms_and_closes() {
        let mut dlg = InputDialog::new("Rename", "old.txt");
        let outcome = dlg.handle_key(KeyEvent::plain(KeyCode::Enter));
        assert_eq!(outcome, DialogOutcome::Close);
        assert!(dlg.confirmed());
    }

    #[test]
    fn escape_closes_without_confirming() {
        let mut dlg = InputDialog::new("Rename", "old.txt");
        let outcome = dlg.handle_key(KeyEvent::plain(KeyCode::Escape));
        assert_eq!(outcome, DialogOutcome::Close);
        assert!(!dlg.confirmed());
    }
}
