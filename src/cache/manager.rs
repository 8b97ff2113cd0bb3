//! Translates file-operation outcomes into cache invalidation sets
//! (spec §4.7). Kept separate from [`super::MetadataCache`] itself so the
//! cache stays a dumb keyed store and all policy about "what a copy
//! touches" lives in one place.

use tracing::debug;

use super::MetadataCache;
use crate::path::Path;

/// One kind of file operation CacheManager knows how to translate into
/// invalidations (spec §4.7 table).
pub enum FileOpEvent<'a> {
    Copy { srcs: &'a [Path], dst_dir: &'a Path },
    Move { srcs: &'a [Path], dst_dir: &'a Path },
    Delete { paths: &'a [Path] },
    Mkdir { path: &'a Path },
    CreateFile { path: &'a Path },
    ArchiveCreate { archive: &'a Path, sources: &'a [Path] },
    ArchiveExtract { dst_dir: &'a Path },
}

pub struct CacheManager {
    cache: MetadataCache,
}

impl CacheManager {
    pub fn new(cache: MetadataCache) -> Self {
        Self { cache }
    }

    /// Never returns an error: invalidation is best-effort and must
    /// never abort the file operation that triggered it (spec §4.7).
    pub fn on_event(&self, event: FileOpEvent<'_>) {
        match event {
            FileOpEvent::Copy { srcs, dst_dir } => {
                self.invalidate_listing(dst_dir);
                for src in srcs {
                    self.invalidate_entry(&dst_dir.join(&src.name()));
                }
            }
            FileOpEvent::Move { srcs, dst_dir } => {
                for src in srcs {
                    if let Some(parent) = src.parent() {
                        self.invalidate_listing(&parent);
                    }
                    self.invalidate_entry(src);
                }
                self.invalidate_listing(dst_dir);
            }
            FileOpEvent::Delete { paths } => {
                for path in paths {
                    if let Some(parent) = path.parent() {
                        self.invalidate_listing(&parent);
                    }
                }
            }
            FileOpEvent::Mkdir { path } | FileOpEvent::CreateFile { path } => {
                if let Some(parent) = path.parent() {
                    self.invalidate_listing(&parent);
                }
            }
            FileOpEvent::ArchiveCreate { archive, sources } => {
                if let Some(parent) = archive.parent() {
                    self.invalidate_listing(&parent);
                }
                for source in sources {
                    if let Some(parent) = source.parent() {
                        self.invalidate_listing(&parent);
                    }
                }
            }
            FileOpEvent::ArchiveExtract { dst_dir } => {
                self.invalidate_listing_and_descendants(dst_dir);
            }
        }
    }

    fn invalidate_listing(&self, dir: &Path) {
        let bucket = dir.bucket().to_string();
        let prefix = dir.key();
        debug!(uri = %dir.as_uri(), "invalidating directory listing");
        self.cache.invalidate(move |key| key.bucket == bucket && key.prefix == prefix);
    }

    /// Drops whichever cache entry (stat or listing) is keyed at exactly
    /// `path`'s own bucket/prefix — used for the specific child entries a
    /// copy/move touches, as distinct from a directory's own listing.
    fn invalidate_entry(&self, path: &Path) {
        let bucket = path.bucket().to_string();
        let prefix = path.key();
        debug!(uri = %path.as_uri(), "invalidating cached entry");
        self.cache.invalidate(move |key| key.bucket == bucket && key.prefix == prefix);
    }

    fn invalidate_listing_and_descendants(&self, dir: &Path) {
        let bucket = dir.bucket().to_string();
        let prefix = dir.key();
        debug!(uri = %dir.as_uri(), "invalidating directory listing and descendants");
        self.cache
            .invalidate(move |key| key.bucket == bucket && key.prefix.starts_with(&prefix));
    }
}

