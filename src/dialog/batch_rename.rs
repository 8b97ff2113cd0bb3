//! Batch-rename dialog: two text editors (regex, destination) with focus
//! switching by Up/Down, destination macros `\0`, `\1..\9`, `\d`, and a
//! per-row preview flagged `OK | UNCHANGED | CONFLICT | INVALID`.
//! Execution refuses any `CONFLICT`/`INVALID` row (spec §4.13).
//!
//! `\d` is resolved to the item's 1-based position in the batch — the
//! usual auto-numbering macro in batch-rename tools, and the only
//! reading of "\d" that isn't already covered by `\0..\9`.

use std::collections::HashMap;

use regex::Regex;

use super::input::InputDialog;
use super::{Dialog, DialogOutcome};
use crate::terminal::{KeyCode, KeyEvent, Renderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameStatus {
    Ok,
    Unchanged,
    Conflict,
    Invalid,
}

#[derive(Debug, Clone)]
pub struct PreviewRow {
    pub original: String,
    pub renamed: String,
    pub status: RenameStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Regex,
    Destination,
}

pub struct BatchRenameDialog {
    names: Vec<String>,
    regex_editor: InputDialog,
    dest_editor: InputDialog,
    focus: Focus,
    confirmed: bool,
}

impl BatchRenameDialog {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            regex_editor: InputDialog::new("Match", ""),
            dest_editor: InputDialog::new("Replace with", ""),
            focus: Focus::Regex,
            confirmed: false,
        }
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    fn substitute(dest_template: &str, caps: &regex::Captures, index: usize) -> String {
        let mut out = String::new();
        let mut chars = dest_template.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.peek().copied() {
                Some('d') => {
                    chars.next();
                    out.push_str(&index.to_string());
                }
                Some(d) if d.is_ascii_digit() => {
                    chars.next();
                    let n = d.to_digit(10).unwrap() as usize;
                    if let Some(m) = caps.get(n) {
                        out.push_str(m.as_str());
                    }
                }
                Some(other) => {
                    chars.next();
                    out.push(other);
                }
                None => out.push('\\'),
            }
        }
        out
    }

    /// Computes the rename preview for every entry (spec §4.13
    /// "preview flags each row"). An unparsable regex flags every row
    /// `Invalid` rather than panicking.
    pub fn preview(&self) -> Vec<PreviewRow> {
        let pattern = self.regex_editor.value();
        let dest = self.dest_editor.value();

        let Ok(re) = Regex::new(pattern) else {
            return self
                .names
                .iter()
                .map(|n| PreviewRow { original: n.clone(), renamed: n.clone(), status: RenameStatus::Invalid })
                .collect();
        };

        let mut renamed_names = Vec::with_capacity(self.names.len());
        for (i, name) in self.names.iter().enumerate() {
            let renamed = match re.captures(name) {
                Some(caps) => Self::substitute(dest, &caps, i + 1),
                None => name.clone(),
            };
            renamed_names.push(renamed);
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for r in &renamed_names {
            *counts.entry(r.as_str()).or_insert(0) += 1;
        }

        self.names
            .iter()
            .zip(renamed_names.iter())
            .map(|(original, renamed)| {
                let status = if renamed == original {
                    RenameStatus::Unchanged
                } else if renamed.is_empty() || renamed.contains('/') {
                    RenameStatus::Invalid
                } else if counts.get(renamed.as_str()).copied().unwrap_or(0) > 1 {
                    RenameStatus::Conflict
                } else if self.names.iter().any(|n| n != original && n == renamed) {
                    RenameStatus::Conflict
                } else {
                    RenameStatus::Ok
                };
                PreviewRow { original: original.clone(), renamed: renamed.clone(), status }
            })
            .collect()
    }

    /// Execution is refused if any row is `Conflict` or `Invalid` (spec
    /// §4.13 "Execution refuses any CONFLICT/INVALID row").
    pub fn can_execute(&self) -> bool {
        self.preview().iter().all(|r| matches!(r.status, RenameStatus::Ok | RenameStatus::Unchanged))
    }
}

impl Dialog for BatchRenameDialog {
    fn enter(&mut self) {
        self.confirmed = false;
        self.regex_editor.enter();
        self.dest_editor.enter();
        self.focus = Focus::Regex;
    }

    fn handle_key(&mut self, key: KeyEvent) -> DialogOutcome {
        match key.code {
            KeyCode::Up | KeyCode::Down => {
                self.focus = match self.focus {
                    Focus::Regex => Focus::Destination,
                    Focus::Destination => Focus::Regex,
                };
                DialogOutcome::Continue
            }
            KeyCode::Enter => {
                self.confirmed = self.can_execute();
                DialogOutcome::Close
            }
            KeyCode::Escape => DialogOutcome::Close,
            _ => {
                let editor = match self.focus {
                    Focus::Regex => &mut self.regex_editor,
                    Focus::Destination => &mut self.dest_editor,
                };
                // The per-field editor's own Enter/Escape handling
                // doesn't apply here; translate everything else to
                // a plain edit so the field never closes on its own.
                editor.handle_key(key);
                DialogOutcome::Continue
            }
        }
    }

    fn render(&self, renderer: &mut dyn Renderer) {
        self.regex_editor.render(renderer);
        self.dest_editor.render(renderer);
    }

    fn exit(&mut self) {
        self.regex_editor.exit();
        self.dest_editor.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialog_with(names: &[&str], pattern: &str, dest: &str) -> BatchRenameDialog {
        let mut dlg = BatchRenameDialog::new(names.iter().map(|s| s.to_string()).collect());
        for c in pattern.chars() {
            dlg.handle_key(KeyEvent::plain(KeyCode::Char(c)));
        }
        dlg.handle_key(KeyEvent::plain(KeyCode::Up));
        for c in dest.chars() {
            dlg.handle_key(KeyEvent::plain(KeyCode::Char(c)));
        }
        dlg
    }

    #[test]
    fn capture_group_macro_substitutes() {
        let dlg = dialog_with(&["photo1.jpg", "photo2.jpg"], r"photo(\d+)\.jpg", r"img_\1.jpg");
        let rows = dlg.preview();
        assert_eq!(rows[0].renamed, "img_1.jpg");
        assert_eq!(rows[1].renamed, "img_2.jpg");
        assert!(rows.iter().all(|r| r.status == RenameStatus::Ok));
    }

    #[test]
    fn auto_numbering_macro_uses_batch_position() {
        let dlg = dialog_with(&["a.txt", "b.txt"], r".*", r"file_\d.txt");
        let rows = dlg.preview();
        assert_eq!(rows[0].renamed, "file_1.txt");
        assert_eq!(rows[1].renamed, "file_2.txt");
    }

    #[test]
    fn colliding_results_are_flagged_conflict() {
        let dlg = dialog_with(&["a.txt", "b.txt"], r".*\.txt", "same.txt");
        let rows = dlg.preview();
        assert!(rows.iter().all(|r| r.status == RenameStatus::Conflict));
        assert!(!dlg.can_execute());
    }

    #[test]
    fn non_matching_rows_are_unchanged() {
        let dlg = dialog_with(&["keep.md"], r"\.txt$", "renamed.md");
        let rows = dlg.preview();
        assert_eq!(rows[0].status, RenameStatus::Unchanged);
        assert_eq!(rows[0].renamed, "keep.md");
    }

    #[test]
    fn empty_result_is_invalid_and_blocks_execution() {
        let dlg = dialog_with(&["a.txt"], r".*", "");
        assert!(!dlg.can_execute());
    }
}
