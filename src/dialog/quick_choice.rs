//! Quick-choice dialog: a message plus labeled hotkeys, returning a
//! caller-defined choice tag (spec §4.13).

use super::{Dialog, DialogOutcome};
use crate::terminal::{Attrs, Cell, Color, KeyCode, KeyEvent, Renderer};

#[derive(Debug, Clone)]
pub struct Choice {
    pub label: String,
    pub hotkey: char,
    pub tag: String,
}

pub struct QuickChoiceDialog {
    message: String,
    choices: Vec<Choice>,
    chosen: Option<String>,
}

impl QuickChoiceDialog {
    pub fn new(message: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self { message: message.into(), choices, chosen: None }
    }

    pub fn chosen(&self) -> Option<&str> {
        self.chosen.as_deref()
    }
}

impl Dialog for QuickChoiceDialog {
    fn enter(&mut self) {
        self.chosen = None;
    }

    fn handle_key(&mut self, key: KeyEvent) -> DialogOutcome {
        match key.code {
            KeyCode::Char(c) => {
                if let Some(choice) = self.choices.iter().find(|ch| ch.hotkey.eq_ignore_ascii_case(&c)) {
                    self.chosen = Some(choice.tag.clone());
                    DialogOutcome::Close
                } else {
                    DialogOutcome::Continue
                }
            }
            KeyCode::Escape => DialogOutcome::Close,
            _ => DialogOutcome::Continue,
        }
    }

    fn render(&self, renderer: &mut dyn Renderer) {
        let labels: String = self.choices.iter().map(|c| format!("[{}] {}", c.hotkey, c.label)).collect::<Vec<_>>().join("  ");
        let width = self.message.len().max(labels.len()) as u16 + 2;
        let (row0, _) = super::clamp_and_center(renderer.rows(), 3);
        let (col0, cols) = super::clamp_and_center(renderer.cols(), width);
        for (i, ch) in self.message.chars().take(cols as usize).enumerate() {
            renderer.set_cell(row0, col0 + i as u16, Cell { glyph: ch, fg: Color::Indexed(15), bg: Color::Indexed(0), attrs: Attrs::default() });
        }
        for (i, ch) in labels.chars().take(cols as usize).enumerate() {
            renderer.set_cell(
                row0 + 1,
                col0 + i as u16,
                Cell { glyph: ch, fg: Color::Indexed(11), bg: Color::Indexed(0), attrs: Attrs { bold: true, ..Attrs::default() } },
            );
        }
    }

    fn exit(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialog() -> QuickChoiceDialog {
        QuickChoiceDialog::new(
            "Overwrite existing file?",
            vec![
                Choice { label: "Yes".into(), hotkey: 'y', tag: "yes".into() },
                Choice { label: "No".into(), hotkey: 'n', tag: "no".into() },
            ],
        )
    }

    #[test]
    fn matching_hotkey_closes_with_its_tag() {
        let mut dlg = dialog();
        let outcome = dlg.handle_key(KeyEvent::plain(KeyCode::Char('y')));
        assert_eq!(outcome, DialogOutcome::Close);
        assert_eq!(dlg.chosen(), Some("yes"));
    }

    #[test]
    fn hotkey_matching_is_case_insensitive() {
        let mut dlg = dialog();
        dlg.handle_key(KeyEvent::plain(KeyCode::Char('N')));
        assert_eq!(dlg.chosen(), Some("no"));
    }

    #[test]
    fn unrelated_key_does_not_close() {
        let mut dlg = dialog();
        let outcome = dlg.handle_key(KeyEvent::plain(KeyCode::Char('z')));
        assert_eq!(outcome, DialogOutcome::Continue);
        assert_eq!(dlg.chosen(), None);
    }
}
