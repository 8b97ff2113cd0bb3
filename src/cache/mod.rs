//! The metadata cache (spec §4.6): a single per-process keyed store with
//! per-entry TTL, built on `moka::sync::Cache` so `get`/`put` are
//! lock-free and never block on I/O — the same reasoning that led the
//! teacher to pick `whirlwind`'s sharded maps for its own hot paths
//! (`src/vfs.rs`'s handle table).

pub mod manager;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use moka::Expiry;

/// Which S3 operation a [`CacheKey`] was recorded under; kept separate
/// from the key's other fields so `Stat` and `Listing` entries never
/// collide even when they share a prefix (spec §4.3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheOp {
    Stat,
    /// A fully-aggregated `iterdir` result, keyed by `complete = true`.
    Listing,
}

/// A total-order, structurally-equal cache key (spec §4.6: "Keys are
/// total-order records; equality is structural").
///
/// Every field that two call sites might construct independently (S3
/// `iterdir` populating hints vs. a later `stat()` on one of those
/// children) must be included here identically — this is the type that
/// makes the cache-key-consistency invariant in spec §4.3 mechanical
/// rather than a convention callers have to remember.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub op: CacheOp,
    pub scheme: &'static str,
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<char>,
    pub complete: bool,
}

impl CacheKey {
    pub fn stat(scheme: &'static str, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        CacheKey {
            op: CacheOp::Stat,
            scheme,
            bucket: bucket.into(),
            prefix: key.into(),
            delimiter: None,
            complete: false,
        }
    }

    pub fn listing(scheme: &'static str, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        CacheKey {
            op: CacheOp::Listing,
            scheme,
            bucket: bucket.into(),
            prefix: prefix.into(),
            delimiter: Some('/'),
            complete: true,
        }
    }
}

/// One child seen during an aggregated listing, named relative to the
/// prefix it was listed under (spec §4.3 "Listing aggregation").
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub name: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub etag: Option<String>,
    pub storage_class: Option<String>,
    pub kind: crate::path::EntryKind,
}

/// One object's worth of metadata, or an aggregated directory listing
/// (spec §4.6: "caches populated during listing must therefore contain
/// every field required by later `stat()` calls").
#[derive(Debug, Clone)]
pub enum Payload {
    Stat {
        size: u64,
        mtime: DateTime<Utc>,
        etag: Option<String>,
        storage_class: Option<String>,
        kind: crate::path::EntryKind,
    },
    Listing(Arc<Vec<ListingEntry>>),
}

#[derive(Clone)]
struct Entry {
    payload: Payload,
    ttl: Option<Duration>,
}

struct TtlExpiry;

impl Expiry<CacheKey, Entry> for TtlExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// The cache itself. Cheap to clone (wraps `moka`'s internal `Arc`s);
/// every `PathImpl` backend that wants caching holds one.
#[derive(Clone)]
pub struct MetadataCache {
    inner: Cache<CacheKey, Entry>,
}

impl MetadataCache {
    pub fn new(max_entries: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(TtlExpiry)
            .build();
        Self { inner }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Payload> {
        self.inner.get(key).map(|entry| entry.payload)
    }

    pub fn put(&self, key: CacheKey, payload: Payload, ttl: Option<Duration>) {
        self.inner.insert(key, Entry { payload, ttl });
    }

    /// Removes every entry whose key matches `predicate` (spec §4.6,
    /// §4.7). `moka` has no native predicate-eviction, so this walks a
    /// point-in-time snapshot of keys — acceptable since invalidation is
    /// driven by user-initiated file ops, not a hot path.
    pub fn invalidate(&self, predicate: impl Fn(&CacheKey) -> bool) {
        let keys: Vec<CacheKey> =
            self.inner.iter().map(|(k, _)| k.as_ref().clone()).filter(|k| predicate(k)).collect();
        for key in keys {
            self.inner.invalidate(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat_payload() -> Payload {
        Payload::Stat {
            size: 0,
            mtime: Utc::now(),
            etag: None,
            storage_class: None,
            kind: crate::path::EntryKind::File,
        }
    }

    #[test]
    fn get_after_put_round_trips() {
        let cache = MetadataCache::new(100);
        let key = CacheKey::stat("s3", "bucket", "a/b.txt");
        cache.put(key.clone(), stat_payload(), None);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn stat_and_listing_keys_for_same_prefix_do_not_collide() {
        let stat_key = CacheKey::stat("s3", "bucket", "dir/");
        let listing_key = CacheKey::listing("s3", "bucket", "dir/");
        assert_ne!(stat_key, listing_key);
    }

    #[test]
    fn invalidate_removes_only_matching_keys() {
        let cache = MetadataCache::new(100);
        let keep = CacheKey::stat("s3", "bucket", "keep.txt");
        let drop = CacheKey::stat("s3", "bucket", "drop.txt");
        cache.put(keep.clone(), stat_payload(), None);
        cache.put(drop.clone(), stat_payload(), None);
        cache.invalidate(|k| k.prefix == "drop.txt");
        assert!(cache.get(&keep).is_some());
        assert!(cache.get(&drop).is_none());
    }
}
