//! Read-only backend over ZIP and TAR (optionally gzip/bzip2/xz
//! compressed) archives (spec §4.4). The whole archive is decoded once,
//! lazily, into an in-memory tree — TAR's sequential format gives no
//! other choice, and ZIP's central directory is small enough that the
//! same strategy is simplest for both.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::OnceCell;

use super::{EntryKind, Path, PathImpl, Stat};
use crate::error::{ErrorKind, Result, TfmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
}

impl Format {
    fn detect(archive_uri: &str) -> Result<Format> {
        let lower = archive_uri.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Ok(Format::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Ok(Format::TarGz)
        } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") {
            Ok(Format::TarBz2)
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Ok(Format::TarXz)
        } else if lower.ends_with(".tar") {
            Ok(Format::Tar)
        } else {
            Err(TfmError::new(ErrorKind::UnsupportedOperation, "unrecognized archive extension"))
        }
    }
}

struct ArchiveNode {
    kind: EntryKind,
    size: u64,
    mtime: DateTime<Utc>,
    data: Option<Vec<u8>>,
}

pub struct ArchivePathImpl {
    archive_file: PathBuf,
    format: Format,
    tree: OnceCell<Arc<HashMap<String, ArchiveNode>>>,
}

impl ArchivePathImpl {
    pub fn new(archive_file: PathBuf, archive_uri: &str) -> Result<Self> {
        Ok(Self { archive_file, format: Format::detect(archive_uri)?, tree: OnceCell::new() })
    }

    async fn tree(&self) -> Result<Arc<HashMap<String, ArchiveNode>>> {
        self.tree
            .get_or_try_init(|| async {
                let path = self.archive_file.clone();
                let format = self.format;
                tokio::task::spawn_blocking(move || load_tree(&path, format))
                    .await
                    .map_err(|e| TfmError::with_source(ErrorKind::IoFailure, "archive load task panicked", e))?
                    .map(Arc::new)
            })
            .await
            .map(Arc::clone)
    }

    fn normalized_key(path: &Path) -> String {
        path.segments().join("/")
    }
}

/// Rejects `..` components so an entry can never resolve outside the
/// archive root (spec §4.4 "Security").
fn normalize_entry_name(raw: &str) -> Option<String> {
    let mut out = Vec::new();
    for part in raw.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return None;
        }
        out.push(part);
    }
    Some(out.join("/"))
}

fn insert_parents(tree: &mut HashMap<String, ArchiveNode>, path: &str) {
    let mut segments: Vec<&str> = path.split('/').collect();
    segments.pop();
    let mut acc = Vec::new();
    for segment in segments {
        acc.push(segment);
        let key = acc.join("/");
        tree.entry(key)
            .or_insert_with(|| ArchiveNode { kind: EntryKind::Dir, size: 0, mtime: Utc::now(), data: None });
    }
}

fn load_tree(path: &PathBuf, format: Format) -> Result<HashMap<String, ArchiveNode>> {
    let mut tree = HashMap::new();
    match format {
        Format::Zip => {
            let file = std::fs::File::open(path).map_err(TfmError::from)?;
            let mut archive = zip::ZipArchive::new(file)
                .map_err(|e| TfmError::with_source(ErrorKind::IoFailure, "invalid zip archive", e))?;
            for i in 0..archive.len() {
                let mut entry = archive
                    .by_index(i)
                    .map_err(|e| TfmError::with_source(ErrorKind::IoFailure, "corrupt zip entry", e))?;
                let Some(name) = normalize_entry_name(entry.name()) else {
                    return Err(TfmError::new(ErrorKind::PermissionDenied, "archive entry escapes root"));
                };
                if name.is_empty() {
                    continue;
                }
                let is_dir = entry.is_dir();
                let mtime = entry
                    .last_modified()
                    .and_then(|t| {
                        chrono::NaiveDate::from_ymd_opt(t.year() as i32, t.month() as u32, t.day() as u32)
                            .and_then(|d| d.and_hms_opt(t.hour() as u32, t.minute() as u32, t.second() as u32))
                    })
                    .map(|dt| dt.and_utc())
                    .unwrap_or_else(Utc::now);
                let size = entry.size();
                let data = if is_dir {
                    None
                } else {
                    let mut buf = Vec::with_capacity(size as usize);
                    entry.read_to_end(&mut buf).map_err(TfmError::from)?;
                    Some(buf)
                };
                insert_parents(&mut tree, &name);
                tree.insert(
                    name,
                    ArchiveNode { kind: if is_dir { EntryKind::Dir } else { EntryKind::File }, size, mtime, data },
                );
            }
        }
        Format::Tar | Format::TarGz | Format::TarBz2 | Format::TarXz => {
            let file = std::fs::File::open(path).map_err(TfmError::from)?;
            let reader: Box<dyn Read> = match format {
                Format::Tar => Box::new(file),
                Format::TarGz => Box::new(flate2::read::GzDecoder::new(file)),
                Format::TarBz2 => Box::new(bzip2::read::BzDecoder::new(file)),
                Format::TarXz => Box::new(xz2::read::XzDecoder::new(file)),
                Format::Zip => unreachable!(),
            };
            let mut archive = tar::Archive::new(reader);
            for entry in archive.entries().map_err(TfmError::from)? {
                let mut entry = entry.map_err(TfmError::from)?;
                let header = entry.header().clone();
                let raw_path = entry.path().map_err(TfmError::from)?;
                let raw_name = raw_path.to_string_lossy().into_owned();
                let Some(name) = normalize_entry_name(&raw_name) else {
                    return Err(TfmError::new(ErrorKind::PermissionDenied, "archive entry escapes root"));
                };
                if name.is_empty() {
                    continue;
                }
                let is_dir = header.entry_type().is_dir();
                let mtime = DateTime::from_timestamp(header.mtime().unwrap_or(0) as i64, 0)
                    .unwrap_or_else(Utc::now);
                let size = header.size().unwrap_or(0);
                let data = if is_dir {
                    None
                } else {
                    let mut buf = Vec::with_capacity(size as usize);
                    entry.read_to_end(&mut buf).map_err(TfmError::from)?;
                    Some(buf)
                };
                insert_parents(&mut tree, &name);
                tree.insert(
                    name,
                    ArchiveNode { kind: if is_dir { EntryKind::Dir } else { EntryKind::File }, size, mtime, data },
                );
            }
        }
    }
    Ok(tree)
}

struct MemoryReader {
    data: Vec<u8>,
    pos: usize,
}

impl AsyncRead for MemoryReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let remaining = &this.data[this.pos..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

fn unsupported(op: &str) -> TfmError {
    TfmError::new(ErrorKind::UnsupportedOperation, format!("archive backend does not support {op}"))
}

#[async_trait::async_trait]
impl PathImpl for ArchivePathImpl {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.tree().await?.contains_key(&Self::normalized_key(path)))
    }

    async fn is_file(&self, path: &Path) -> Result<bool> {
        Ok(matches!(self.tree().await?.get(&Self::normalized_key(path)), Some(n) if n.kind == EntryKind::File))
    }

    async fn is_dir(&self, path: &Path) -> Result<bool> {
        let key = Self::normalized_key(path);
        if key.is_empty() {
            return Ok(true);
        }
        Ok(matches!(self.tree().await?.get(&key), Some(n) if n.kind == EntryKind::Dir))
    }

    async fn is_symlink(&self, _path: &Path) -> Result<bool> {
        Ok(false)
    }

    async fn iterdir(&self, path: &Path) -> Result<Vec<Path>> {
        let tree = self.tree().await?;
        let prefix = Self::normalized_key(path);
        let mut out = Vec::new();
        for (key, node) in tree.iter() {
            let rest = match prefix.as_str() {
                "" => key.as_str(),
                p => match key.strip_prefix(p).and_then(|s| s.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                },
            };
            if rest.is_empty() || rest.contains('/') {
                continue;
            }
            let child = path.join(rest);
            child.set_hint(super::MetadataHint {
                size: Some(node.size),
                mtime: Some(node.mtime),
                is_dir: Some(node.kind == EntryKind::Dir),
                is_file: Some(node.kind == EntryKind::File),
                etag: None,
                storage_class: None,
                is_virtual_dir: false,
            });
            out.push(child);
        }
        Ok(out)
    }

    async fn stat(&self, path: &Path) -> Result<Stat> {
        let key = Self::normalized_key(path);
        if key.is_empty() {
            return Ok(Stat { size: 0, mtime: Utc::now(), kind: EntryKind::Dir, etag: None });
        }
        let tree = self.tree().await?;
        let node =
            tree.get(&key).ok_or_else(|| TfmError::new(ErrorKind::NotFound, path.as_uri()))?;
        Ok(Stat { size: node.size, mtime: node.mtime, kind: node.kind, etag: None })
    }

    async fn open_reader(&self, path: &Path) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let tree = self.tree().await?;
        let key = Self::normalized_key(path);
        let node = tree.get(&key).ok_or_else(|| TfmError::new(ErrorKind::NotFound, path.as_uri()))?;
        let data = node
            .data
            .clone()
            .ok_or_else(|| TfmError::new(ErrorKind::UnsupportedOperation, "not a file"))?;
        Ok(Box::new(MemoryReader { data, pos: 0 }))
    }

    async fn open_writer(
        &self,
        _path: &Path,
        _overwrite: bool,
    ) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        Err(unsupported("writing"))
    }

    async fn mkdir(&self, _path: &Path, _parents: bool, _exist_ok: bool) -> Result<()> {
        Err(unsupported("mkdir"))
    }

    async fn unlink(&self, _path: &Path) -> Result<()> {
        Err(unsupported("unlink"))
    }

    async fn rmtree(&self, _path: &Path) -> Result<()> {
        Err(unsupported("rmtree"))
    }

    async fn rename(&self, _path: &Path, _dst: &Path) -> Result<()> {
        Err(unsupported("rename"))
    }

    fn is_remote(&self) -> bool {
        false
    }

    fn is_archive_member(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(Format::detect("/tmp/a.zip").unwrap(), Format::Zip);
        assert_eq!(Format::detect("/tmp/a.tar.gz").unwrap(), Format::TarGz);
        assert_eq!(Format::detect("/tmp/a.tbz2").unwrap(), Format::TarBz2);
        assert!(Format::detect("/tmp/a.rar").is_err());
    }

    #[test]
    fn rejects_escaping_entries() {
        assert_eq!(normalize_entry_name("a/b"), Some("a/b".to_string()));
        assert_eq!(normalize_entry_name("../../etc/passwd"), None);
        assert_eq!(normalize_entry_name("a/../b"), None);
    }
}
