//! The storage-polymorphic path layer (spec §4.1, §4.5).
//!
//! [`Path`] is a cheap, clone-by-value handle that dispatches through a
//! per-scheme [`PathImpl`] trait object, mirroring how the teacher's
//! `Vfs` trait is the single capability surface every backend implements
//! (see `src/vfs/mod.rs`) — here the "handle" is the `Path` itself rather
//! than an opaque file id, since the core has no notion of NFS file
//! handles to reuse.

pub mod archive;
pub mod local;
pub mod s3;

use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{ErrorKind, Result, TfmError};

/// One of the three schemes the core knows how to browse (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    File,
    S3,
    Archive,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scheme::File => "file",
            Scheme::S3 => "s3",
            Scheme::Archive => "archive",
        };
        f.write_str(s)
    }
}

/// What kind of thing a [`DirEntry`]/[`Stat`] describes (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    /// Models S3 and archive directories with no backing object (spec §3,
    /// glossary "Virtual directory").
    VirtualDir,
}

impl EntryKind {
    pub fn is_dir_like(self) -> bool {
        matches!(self, EntryKind::Dir | EntryKind::VirtualDir)
    }
}

/// A metadata hint captured at listing time, embedded in a [`Path`] so
/// later `stat`/`is_dir`/`is_file` calls need no backend I/O (spec §3,
/// glossary "Metadata hint").
#[derive(Debug, Clone, Default)]
pub struct MetadataHint {
    pub size: Option<u64>,
    pub mtime: Option<DateTime<Utc>>,
    pub is_dir: Option<bool>,
    pub is_file: Option<bool>,
    pub etag: Option<String>,
    pub storage_class: Option<String>,
    pub is_virtual_dir: bool,
}

impl MetadataHint {
    pub fn kind(&self) -> Option<EntryKind> {
        if self.is_virtual_dir {
            return Some(EntryKind::VirtualDir);
        }
        match (self.is_dir, self.is_file) {
            (Some(true), _) => Some(EntryKind::Dir),
            (_, Some(true)) => Some(EntryKind::File),
            _ => None,
        }
    }
}

/// Result of `stat()` (spec §4.1 "Metadata").
#[derive(Debug, Clone)]
pub struct Stat {
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub kind: EntryKind,
    pub etag: Option<String>,
}

/// A resolved child of a directory (spec §3).
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: Path,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub kind: EntryKind,
}

/// The capability set every backend implements (spec §4.1). Methods take
/// the calling [`Path`] so backends can read its components/hint without
/// the trait needing scheme-specific signatures.
#[async_trait::async_trait]
pub trait PathImpl: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool>;
    async fn is_file(&self, path: &Path) -> Result<bool>;
    async fn is_dir(&self, path: &Path) -> Result<bool>;
    async fn is_symlink(&self, path: &Path) -> Result<bool>;

    /// Finite, not-restartable enumeration (spec §4.1, §9 "Coroutines /
    /// generators"). Callers that need to re-enumerate call this again.
    async fn iterdir(&self, path: &Path) -> Result<Vec<Path>>;

    async fn stat(&self, path: &Path) -> Result<Stat>;

    async fn open_reader(
        &self,
        path: &Path,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>>;

    async fn open_writer(
        &self,
        path: &Path,
        overwrite: bool,
    ) -> Result<Box<dyn AsyncWrite + Send + Unpin>>;

    async fn mkdir(&self, path: &Path, parents: bool, exist_ok: bool) -> Result<()>;
    async fn unlink(&self, path: &Path) -> Result<()>;
    async fn rmtree(&self, path: &Path) -> Result<()>;

    /// Atomic within a backend; fails with `UnsupportedOperation` when the
    /// backend cannot do it natively (spec §4.2: local rename across
    /// filesystems; archives never support it).
    async fn rename(&self, path: &Path, dst: &Path) -> Result<()>;

    /// Same-scheme server-side copy where the backend natively supports
    /// it (S3 `CopyObject`, local hard-link-free file copy). Returns
    /// `UnsupportedOperation` to fall back to the façade's generic
    /// stream copy.
    async fn copy_same_scheme(&self, path: &Path, dst: &Path) -> Result<()> {
        let _ = (path, dst);
        Err(TfmError::new(ErrorKind::UnsupportedOperation, "backend has no native copy"))
    }

    fn is_remote(&self) -> bool;
    fn is_archive_member(&self) -> bool;
}

struct PathInner {
    scheme: Scheme,
    /// Bucket name for S3, the containing archive's own URI for
    /// Archive, empty for File.
    authority: String,
    segments: Vec<String>,
    /// S3 "directory marker" semantics: a key ending in `/`.
    trailing_slash: bool,
    backend: Arc<dyn PathImpl>,
    hint: RwLock<Option<MetadataHint>>,
}

/// A logical location with a scheme; cheap, clone-by-value, holds no
/// open handles (spec §3).
#[derive(Clone)]
pub struct Path(Arc<PathInner>);

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path").field("uri", &self.as_uri()).finish()
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.as_uri() == other.as_uri()
    }
}
impl Eq for Path {}

impl Path {
    fn new(
        scheme: Scheme,
        authority: impl Into<String>,
        segments: Vec<String>,
        trailing_slash: bool,
        backend: Arc<dyn PathImpl>,
    ) -> Self {
        Path(Arc::new(PathInner {
            scheme,
            authority: authority.into(),
            segments,
            trailing_slash,
            backend,
            hint: RwLock::new(None),
        }))
    }

    pub fn local(backend: Arc<local::LocalPathImpl>, absolute_path: &str) -> Self {
        let segments = split_segments(absolute_path);
        Path::new(Scheme::File, String::new(), segments, false, backend)
    }

    pub fn s3(backend: Arc<s3::S3PathImpl>, bucket: &str, key: &str) -> Self {
        let trailing = key.ends_with('/') && !key.is_empty();
        let segments = split_segments(key);
        Path::new(Scheme::S3, bucket, segments, trailing, backend)
    }

    pub fn archive(
        backend: Arc<archive::ArchivePathImpl>,
        archive_uri: &str,
        inner_path: &str,
    ) -> Self {
        let segments = split_segments(inner_path);
        Path::new(Scheme::Archive, archive_uri, segments, false, backend)
    }

    pub fn scheme(&self) -> Scheme {
        self.0.scheme
    }

    pub fn as_uri(&self) -> String {
        match self.0.scheme {
            Scheme::File => format!("file:///{}", self.0.segments.join("/")),
            Scheme::S3 => {
                let key = self.0.segments.join("/");
                let slash = if self.0.trailing_slash || key.is_empty() { "/" } else { "" };
                format!("s3://{}/{}{}", self.0.authority, key, slash)
            }
            Scheme::Archive => {
                format!("{}#/{}", self.0.authority, self.0.segments.join("/"))
            }
        }
    }

    pub fn name(&self) -> String {
        self.0
            .segments
            .last()
            .cloned()
            .unwrap_or_else(|| self.0.authority.clone())
    }

    pub fn parent(&self) -> Option<Path> {
        if self.0.segments.is_empty() {
            return None;
        }
        let mut segments = self.0.segments.clone();
        segments.pop();
        Some(Path::new(
            self.0.scheme,
            self.0.authority.clone(),
            segments,
            true,
            self.0.backend.clone(),
        ))
    }

    /// Logical locations are always fully resolved in this model; there
    /// is no notion of a relative `Path` value.
    pub fn is_absolute(&self) -> bool {
        true
    }

    pub fn join(&self, segment: &str) -> Path {
        let mut segments = self.0.segments.clone();
        segments.extend(split_segments(segment));
        Path::new(
            self.0.scheme,
            self.0.authority.clone(),
            segments,
            segment.ends_with('/'),
            self.0.backend.clone(),
        )
    }

    pub fn with_name(&self, new_name: &str) -> Path {
        let mut segments = self.0.segments.clone();
        if segments.is_empty() {
            segments.push(new_name.to_string());
        } else {
            *segments.last_mut().unwrap() = new_name.to_string();
        }
        Path::new(self.0.scheme, self.0.authority.clone(), segments, false, self.0.backend.clone())
    }

    pub fn with_suffix(&self, suffix: &str) -> Path {
        let current = self.name();
        let stem = current.rsplit_once('.').map(|(s, _)| s).unwrap_or(&current);
        let suffix = suffix.strip_prefix('.').unwrap_or(suffix);
        self.with_name(&format!("{stem}.{suffix}"))
    }

    pub fn is_remote(&self) -> bool {
        self.0.backend.is_remote()
    }

    pub fn is_archive_member(&self) -> bool {
        self.0.backend.is_archive_member()
    }

    pub(crate) fn bucket(&self) -> &str {
        &self.0.authority
    }

    pub(crate) fn key(&self) -> String {
        let key = self.0.segments.join("/");
        if self.0.trailing_slash && !key.is_empty() {
            format!("{key}/")
        } else {
            key
        }
    }

    pub(crate) fn segments(&self) -> &[String] {
        &self.0.segments
    }

    pub fn hint(&self) -> Option<MetadataHint> {
        self.0.hint.read().unwrap().clone()
    }

    pub fn set_hint(&self, hint: MetadataHint) {
        *self.0.hint.write().unwrap() = Some(hint);
    }

    fn set_hint_from_stat(&self, stat: &Stat) {
        self.set_hint(MetadataHint {
            size: Some(stat.size),
            mtime: Some(stat.mtime),
            is_dir: Some(stat.kind.is_dir_like()),
            is_file: Some(stat.kind == EntryKind::File),
            etag: stat.etag.clone(),
            storage_class: None,
            is_virtual_dir: stat.kind == EntryKind::VirtualDir,
        });
    }

    // ---- Classification: hints first, backend only on a miss (spec §4.1) ----

    pub async fn exists(&self) -> Result<bool> {
        if let Some(hint) = self.hint() {
            if hint.is_dir.is_some() || hint.is_file.is_some() {
                return Ok(true);
            }
        }
        self.0.backend.exists(self).await
    }

    pub async fn is_file(&self) -> Result<bool> {
        if let Some(hint) = self.hint() {
            if let Some(is_file) = hint.is_file {
                return Ok(is_file);
            }
        }
        self.0.backend.is_file(self).await
    }

    pub async fn is_dir(&self) -> Result<bool> {
        if let Some(hint) = self.hint() {
            if let Some(is_dir) = hint.is_dir {
                return Ok(is_dir);
            }
        }
        self.0.backend.is_dir(self).await
    }

    pub async fn is_symlink(&self) -> Result<bool> {
        self.0.backend.is_symlink(self).await
    }

    pub async fn iterdir(&self) -> Result<Vec<Path>> {
        self.0.backend.iterdir(self).await
    }

    pub async fn stat(&self) -> Result<Stat> {
        if let Some(hint) = self.hint() {
            if let (Some(size), Some(mtime), Some(kind)) = (hint.size, hint.mtime, hint.kind()) {
                return Ok(Stat { size, mtime, kind, etag: hint.etag.clone() });
            }
        }
        let stat = self.0.backend.stat(self).await?;
        self.set_hint_from_stat(&stat);
        Ok(stat)
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        let mut reader = self.0.backend.open_reader(self).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.map_err(TfmError::from)?;
        Ok(buf)
    }

    /// Decodes bytes via the UTF-8 → Latin-1 → CP-1252 fallback chain
    /// (spec §4.1).
    pub async fn read_text(&self) -> Result<String> {
        let bytes = self.read_bytes().await?;
        Ok(decode_with_fallback(&bytes))
    }

    pub async fn write_bytes(&self, data: &[u8], overwrite: bool) -> Result<()> {
        let mut writer = self.0.backend.open_writer(self, overwrite).await?;
        writer.write_all(data).await.map_err(TfmError::from)?;
        writer.shutdown().await.map_err(TfmError::from)?;
        Ok(())
    }

    pub async fn write_text(&self, text: &str, overwrite: bool) -> Result<()> {
        self.write_bytes(text.as_bytes(), overwrite).await
    }

    pub async fn mkdir(&self, parents: bool, exist_ok: bool) -> Result<()> {
        self.0.backend.mkdir(self, parents, exist_ok).await
    }

    pub async fn unlink(&self) -> Result<()> {
        self.0.backend.unlink(self).await
    }

    pub async fn rmtree(&self) -> Result<()> {
        self.0.backend.rmtree(self).await
    }

    pub async fn rename(&self, dst: &Path) -> Result<()> {
        self.0.backend.rename(self, dst).await
    }

    // ---- Cross-scheme orchestration (spec §4.5) ----

    const STREAM_CHUNK: usize = 1 << 20;

    /// Same-scheme delegates to the backend; cross-scheme streams bytes
    /// through the process in `STREAM_CHUNK`-sized buffers, recursing
    /// into directories preserving structure.
    pub async fn copy_to(&self, dst: &Path, overwrite: bool) -> Result<()> {
        if self.is_dir().await? {
            return self.copy_tree(dst, overwrite).await;
        }
        if self.scheme() == dst.scheme() {
            match self.0.backend.copy_same_scheme(self, dst).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::UnsupportedOperation => {}
                Err(e) => return Err(e),
            }
        }
        self.stream_copy_file(dst, overwrite).await
    }

    async fn copy_tree(&self, dst: &Path, overwrite: bool) -> Result<()> {
        dst.mkdir(true, true).await?;
        for child in self.iterdir().await? {
            let child_dst = dst.join(&child.name());
            Box::pin(child.copy_to(&child_dst, overwrite)).await?;
        }
        Ok(())
    }

    async fn stream_copy_file(&self, dst: &Path, overwrite: bool) -> Result<()> {
        let reader = self.0.backend.open_reader(self).await?;
        let mut reader = BufReader::with_capacity(Self::STREAM_CHUNK, reader);
        let mut writer = dst.0.backend.open_writer(dst, overwrite).await?;
        tokio::io::copy_buf(&mut reader, &mut writer).await.map_err(TfmError::from)?;
        writer.shutdown().await.map_err(TfmError::from)?;
        Ok(())
    }

    /// Same-scheme uses native rename; cross-scheme copies then deletes
    /// the source. On partial failure the source is retained and the
    /// destination may contain partial data (spec §4.5).
    pub async fn move_to(&self, dst: &Path, overwrite: bool) -> Result<()> {
        if self.scheme() == dst.scheme() {
            match self.rename(dst).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::UnsupportedOperation => {}
                Err(e) => return Err(e),
            }
        }
        self.copy_to(dst, overwrite).await?;
        if self.is_dir().await? {
            self.rmtree().await
        } else {
            self.unlink().await
        }
    }
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// UTF-8 → Latin-1 → CP-1252 decoding chain (spec §4.1). Latin-1 and
/// CP-1252 are both total over every byte value and differ only in
/// 0x80-0x9F, which Latin-1 maps to C1 control characters that
/// essentially never occur in real text — their presence after a
/// Latin-1 decode is the signal to prefer the CP-1252 reading instead.
fn decode_with_fallback(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    let latin1 = encoding_rs::mem::decode_latin1(bytes);
    if latin1.chars().any(|c| ('\u{80}'..='\u{9f}').contains(&c)) {
        let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
        return decoded.into_owned();
    }
    latin1.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_prefers_utf8() {
        assert_eq!(decode_with_fallback("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn decode_falls_back_for_invalid_utf8() {
        let bytes = [0x80, 0x81]; // invalid UTF-8, valid cp1252
        let decoded = decode_with_fallback(&bytes);
        assert_eq!(decoded.chars().count(), 2);
    }
}
