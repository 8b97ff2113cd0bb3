//! Local filesystem backend, built directly on `tokio::fs` the way the
//! teacher's `ShadowFS` drives file ops (`demos/shadow_fs/fs/mod.rs`) —
//! minus the NFS handle/attr-cache layer, since callers here address
//! files by path rather than by opaque handle.

use std::os::unix::fs::MetadataExt;

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{EntryKind, Path, PathImpl, Stat};
use crate::error::{ErrorKind, Result, TfmError};

#[derive(Debug, Default)]
pub struct LocalPathImpl;

impl LocalPathImpl {
    pub fn new() -> Self {
        Self
    }

    fn to_std_path(path: &Path) -> std::path::PathBuf {
        std::path::PathBuf::from(format!("/{}", path.segments().join("/")))
    }
}

fn entry_kind(meta: &std::fs::Metadata) -> EntryKind {
    if meta.file_type().is_symlink() {
        EntryKind::Symlink
    } else if meta.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::File
    }
}

fn stat_from_meta(meta: std::fs::Metadata) -> Result<Stat> {
    let mtime = meta.modified().map_err(TfmError::from)?;
    Ok(Stat {
        size: meta.len(),
        mtime: chrono::DateTime::<chrono::Utc>::from(mtime),
        kind: entry_kind(&meta),
        etag: None,
    })
}

#[async_trait::async_trait]
impl PathImpl for LocalPathImpl {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::symlink_metadata(Self::to_std_path(path)).await.is_ok())
    }

    async fn is_file(&self, path: &Path) -> Result<bool> {
        match fs::metadata(Self::to_std_path(path)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_dir(&self, path: &Path) -> Result<bool> {
        match fs::metadata(Self::to_std_path(path)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_symlink(&self, path: &Path) -> Result<bool> {
        match fs::symlink_metadata(Self::to_std_path(path)).await {
            Ok(meta) => Ok(meta.file_type().is_symlink()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn iterdir(&self, path: &Path) -> Result<Vec<Path>> {
        let std_path = Self::to_std_path(path);
        let mut reader = fs::read_dir(&std_path).await.map_err(TfmError::from)?;
        let mut children = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(TfmError::from)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = entry.metadata().await.map_err(TfmError::from)?;
            let child = path.join(&name);
            let stat = stat_from_meta(meta)?;
            child.set_hint(super::MetadataHint {
                size: Some(stat.size),
                mtime: Some(stat.mtime),
                is_dir: Some(stat.kind.is_dir_like()),
                is_file: Some(stat.kind == EntryKind::File),
                etag: None,
                storage_class: None,
                is_virtual_dir: false,
            });
            children.push(child);
        }
        Ok(children)
    }

    async fn stat(&self, path: &Path) -> Result<Stat> {
        let meta = fs::symlink_metadata(Self::to_std_path(path)).await.map_err(TfmError::from)?;
        stat_from_meta(meta)
    }

    async fn open_reader(&self, path: &Path) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let file = fs::File::open(Self::to_std_path(path)).await.map_err(TfmError::from)?;
        Ok(Box::new(file))
    }

    async fn open_writer(
        &self,
        path: &Path,
        overwrite: bool,
    ) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        let mut options = OpenOptions::new();
        options.write(true).create(true);
        if overwrite {
            options.truncate(true);
        } else {
            options.create_new(true);
        }
        let file = options.open(Self::to_std_path(path)).await.map_err(TfmError::from)?;
        Ok(Box::new(file))
    }

    async fn mkdir(&self, path: &Path, parents: bool, exist_ok: bool) -> Result<()> {
        let std_path = Self::to_std_path(path);
        let result = if parents { fs::create_dir_all(&std_path).await } else { fs::create_dir(&std_path).await };
        match result {
            Ok(()) => Ok(()),
            Err(e) if exist_ok && e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn unlink(&self, path: &Path) -> Result<()> {
        fs::remove_file(Self::to_std_path(path)).await.map_err(TfmError::from)
    }

    async fn rmtree(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(Self::to_std_path(path)).await.map_err(TfmError::from)
    }

    async fn rename(&self, path: &Path, dst: &Path) -> Result<()> {
        if dst.scheme() != super::Scheme::File {
            return Err(TfmError::new(
                ErrorKind::UnsupportedOperation,
                "local rename requires a local destination",
            ));
        }
        fs::rename(Self::to_std_path(path), Self::to_std_path(dst)).await.map_err(TfmError::from)
    }

    fn is_remote(&self) -> bool {
        false
    }

    fn is_archive_member(&self) -> bool {
        false
    }
}

/// A single `stat`-equivalent used by higher layers that want the raw
/// device/inode pair for hard-link detection; not part of `PathImpl`
/// since only the local backend has this notion.
pub async fn same_file(a: &Path, b: &Path) -> Result<bool> {
    let ma = fs::metadata(LocalPathImpl::to_std_path(a)).await.map_err(TfmError::from)?;
    let mb = fs::metadata(LocalPathImpl::to_std_path(b)).await.map_err(TfmError::from)?;
    Ok(ma.dev() == mb.dev() && ma.ino() == mb.ino())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn roundtrips_a_file_through_a_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalPathImpl::new());
        let file_path = Path::local(backend, &format!("{}/hello.txt", dir.path().display()));
        file_path.write_text("hi", true).await.unwrap();
        assert_eq!(file_path.read_text().await.unwrap(), "hi");
        let stat = file_path.stat().await.unwrap();
        assert_eq!(stat.size, 2);
        assert_eq!(stat.kind, EntryKind::File);
    }

    #[tokio::test]
    async fn iterdir_populates_hints() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        let backend = Arc::new(LocalPathImpl::new());
        let dir_path = Path::local(backend, &dir.path().display().to_string());
        let children = dir_path.iterdir().await.unwrap();
        assert_eq!(children.len(), 1);
        assert!(children[0].hint().is_some());
        assert!(children[0].is_file().await.unwrap());
    }

    #[tokio::test]
    async fn refuses_to_overwrite_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalPathImpl::new());
        let file_path = Path::local(backend, &format!("{}/hello.txt", dir.path().display()));
        file_path.write_text("hi", true).await.unwrap();
        let err = file_path.write_text("again", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }
}
