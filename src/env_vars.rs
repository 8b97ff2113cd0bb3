//! Builds the environment variables exported to sub-processes (spec §6).
//!
//! Spawning the process is an external collaborator's job; this module
//! only computes the variable map from pane state.

use std::collections::HashMap;

use crate::pane::PaneModel;

/// Which pane a `TFM_{LEFT,RIGHT,THIS,OTHER}_*` variable describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

fn shell_quote(name: &str) -> String {
    format!("'{}'", name.replace('\'', r"'\''"))
}

/// Space-separated, shell-quoted list of absolute names: the current
/// selection, or the cursor file if the selection is empty (spec §6).
fn selected_names(pane: &PaneModel) -> String {
    let names: Vec<&str> = if pane.selection().is_empty() {
        pane.cursor_entry().map(|e| e.path.name()).into_iter().collect()
    } else {
        pane.selection().iter().map(|s| s.as_str()).collect()
    };
    names.into_iter().map(shell_quote).collect::<Vec<_>>().join(" ")
}

/// Builds the full `TFM_*` variable map for the given active side.
pub fn for_panes(
    left: &PaneModel,
    right: &PaneModel,
    active: Side,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("TFM_ACTIVE".to_string(), "1".to_string());
    vars.insert("TFM_LEFT_DIR".to_string(), left.cwd().as_uri());
    vars.insert("TFM_RIGHT_DIR".to_string(), right.cwd().as_uri());

    let (this, other, this_side, other_side) = match active {
        Side::Left => (left, right, "THIS", "OTHER"),
        Side::Right => (right, left, "THIS", "OTHER"),
    };
    vars.insert(format!("TFM_{this_side}_DIR"), this.cwd().as_uri());
    vars.insert(format!("TFM_{other_side}_DIR"), other.cwd().as_uri());

    vars.insert("TFM_LEFT_SELECTED".to_string(), selected_names(left));
    vars.insert("TFM_RIGHT_SELECTED".to_string(), selected_names(right));
    vars.insert(format!("TFM_{this_side}_SELECTED"), selected_names(this));
    vars.insert(format!("TFM_{other_side}_SELECTED"), selected_names(other));

    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{local::LocalPathImpl, Path};

    fn local_pane(dir: &str) -> PaneModel {
        let backend = std::sync::Arc::new(LocalPathImpl::new());
        PaneModel::new(Path::local(backend, dir))
    }

    #[test]
    fn falls_back_to_cursor_file_when_selection_empty() {
        let left = local_pane("/tmp/left");
        let right = local_pane("/tmp/right");
        let vars = for_panes(&left, &right, Side::Left);
        assert_eq!(vars["TFM_ACTIVE"], "1");
        assert_eq!(vars["TFM_THIS_DIR"], left.cwd().as_uri());
        assert_eq!(vars["TFM_OTHER_DIR"], right.cwd().as_uri());
    }
}
