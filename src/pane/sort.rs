//! Entry ordering for a pane's listing (spec §4.8 "Sort keys").

use crate::path::DirEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Size,
    Mtime,
    Extension,
}

fn extension_of(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// Stable sort by `key`, with directories collated before files when
/// `dirs_first` is set (spec: "stable; directories-first toggle").
pub fn sort_entries(entries: &mut [DirEntry], key: SortKey, dirs_first: bool, ascending: bool) {
    entries.sort_by(|a, b| {
        if dirs_first {
            let a_dir = a.kind.is_dir_like();
            let b_dir = b.kind.is_dir_like();
            if a_dir != b_dir {
                return b_dir.cmp(&a_dir);
            }
        }
        let ordering = match key {
            SortKey::Name => a.path.name().cmp(&b.path.name()),
            SortKey::Size => a.size.cmp(&b.size),
            SortKey::Mtime => a.mtime.cmp(&b.mtime),
            SortKey::Extension => extension_of(&a.path.name()).cmp(extension_of(&b.path.name())),
        };
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });
}
