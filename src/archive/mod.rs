//! Archive creation and extraction (spec §4.12). Unlike
//! [`crate::path::archive`], which only reads an already-existing
//! archive, this module builds new ones and unpacks existing ones onto
//! a destination directory — through a local staging area whenever a
//! source or destination is remote (spec: "materialize each source to a
//! staging area if any source or destination is remote").

use std::io::Write;
use std::path::{Path as StdPath, PathBuf};

use async_channel::Sender;

use crate::cache::manager::{CacheManager, FileOpEvent};
use crate::error::{ErrorKind, Result, TfmError};
use crate::job::{CancelToken, ItemError, JobId, Progress};
use crate::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    Gzip,
    Bzip2,
    Xz,
}

/// Copies any non-local source into a temp directory so archive
/// creation/extraction can run against plain `std::fs`, then removes the
/// staging directory whether the operation succeeded or failed (spec:
/// "clean staging on success or failure").
struct Staging {
    dir: tempfile::TempDir,
}

impl Staging {
    fn new() -> Result<Self> {
        Ok(Self { dir: tempfile::tempdir().map_err(TfmError::from)? })
    }

    fn path(&self) -> &StdPath {
        self.dir.path()
    }
}

async fn materialize_local(path: &Path, staging: &Staging) -> Result<PathBuf> {
    if !path.is_remote() {
        return Ok(PathBuf::from(format!("/{}", path.segments().join("/"))));
    }
    let local = staging.path().join(path.name());
    let data = path.read_bytes().await?;
    tokio::fs::write(&local, data).await.map_err(TfmError::from)?;
    Ok(local)
}

/// Creates an archive of `sources` at `dst_archive` (spec §4.12
/// "create"). Progress emits one event per source processed.
pub async fn create(
    sources: Vec<Path>,
    dst_archive: Path,
    format: ArchiveFormat,
    job_id: JobId,
    cancel: CancelToken,
    progress: Sender<Progress>,
    cache_manager: &CacheManager,
) -> Result<()> {
    let staging = Staging::new()?;
    let result = create_inner(&sources, &dst_archive, format, job_id, &cancel, &progress, &staging).await;
    drop(staging);
    if result.is_ok() {
        cache_manager.on_event(FileOpEvent::ArchiveCreate { archive: &dst_archive, sources: &sources });
    }
    result
}

async fn create_inner(
    sources: &[Path],
    dst_archive: &Path,
    format: ArchiveFormat,
    job_id: JobId,
    cancel: &CancelToken,
    progress: &Sender<Progress>,
    staging: &Staging,
) -> Result<()> {
    let staged_archive_path = staging.path().join("archive.out");
    let mut errors = Vec::new();
    let total = sources.len() as u64;

    // Materialize every source to a local path first (spec: "materialize
    // each source to a staging area if any source or destination is
    // remote") — write_archive only ever sees plain `std::fs::File`s.
    let mut staged_sources = Vec::with_capacity(sources.len());
    for (i, source) in sources.iter().enumerate() {
        cancel.check()?;
        match materialize_local(source, staging).await {
            Ok(local) => staged_sources.push((source.name(), local)),
            Err(e) => errors.push(ItemError { item: source.as_uri(), message: e.to_string() }),
        }
        let _ = progress
            .send(Progress {
                job_id,
                done: i as u64 + 1,
                total: Some(total),
                current_item: Some(source.as_uri()),
                errors: std::mem::take(&mut errors),
                finished: false,
            })
            .await;
    }

    {
        let file = std::fs::File::create(&staged_archive_path).map_err(TfmError::from)?;
        write_archive(file, &staged_sources, format, cancel, &mut errors)?;
    }

    let data = tokio::fs::read(&staged_archive_path).await.map_err(TfmError::from)?;
    dst_archive.write_bytes(&data, true).await?;

    let _ = progress
        .send(Progress { job_id, done: total, total: Some(total), current_item: None, errors, finished: true })
        .await;
    Ok(())
}

fn write_archive(
    file: std::fs::File,
    sources: &[(String, PathBuf)],
    format: ArchiveFormat,
    cancel: &CancelToken,
    errors: &mut Vec<ItemError>,
) -> Result<()> {
    match format {
        ArchiveFormat::Zip => {
            let mut writer = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            for (name, local_path) in sources {
                cancel.check()?;
                if let Err(e) = write_zip_entry(&mut writer, name, local_path, options) {
                    errors.push(ItemError { item: name.clone(), message: e.to_string() });
                }
            }
            writer.finish().map_err(|e| TfmError::with_source(ErrorKind::IoFailure, "failed to finalize zip", e))?;
        }
        ArchiveFormat::Tar | ArchiveFormat::TarGz | ArchiveFormat::TarBz2 | ArchiveFormat::TarXz => {
            let encoder: Box<dyn Write> = match format {
                ArchiveFormat::Tar => Box::new(file),
                ArchiveFormat::TarGz => Box::new(flate2::write::GzEncoder::new(file, flate2::Compression::default())),
                ArchiveFormat::TarBz2 => Box::new(bzip2::write::BzEncoder::new(file, bzip2::Compression::default())),
                ArchiveFormat::TarXz => Box::new(xz2::write::XzEncoder::new(file, 6)),
                _ => unreachable!(),
            };
            let mut builder = tar::Builder::new(encoder);
            for (name, local_path) in sources {
                cancel.check()?;
                if let Err(e) = builder.append_path_with_name(local_path, name) {
                    errors.push(ItemError { item: name.clone(), message: e.to_string() });
                }
            }
            builder.into_inner().map_err(TfmError::from)?;
        }
        ArchiveFormat::Gzip | ArchiveFormat::Bzip2 | ArchiveFormat::Xz => {
            let (name, local_path) = sources.first().ok_or_else(|| {
                TfmError::new(ErrorKind::UnsupportedOperation, "single-stream formats need exactly one source")
            })?;
            let mut input = std::fs::File::open(local_path)
                .map_err(|e| TfmError::with_source(ErrorKind::IoFailure, format!("failed to open {name}"), e))?;
            match format {
                ArchiveFormat::Gzip => {
                    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
                    std::io::copy(&mut input, &mut encoder).map_err(TfmError::from)?;
                }
                ArchiveFormat::Bzip2 => {
                    let mut encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
                    std::io::copy(&mut input, &mut encoder).map_err(TfmError::from)?;
                }
                ArchiveFormat::Xz => {
                    let mut encoder = xz2::write::XzEncoder::new(file, 6);
                    std::io::copy(&mut input, &mut encoder).map_err(TfmError::from)?;
                }
                _ => unreachable!(),
            }
        }
    }
    Ok(())
}

fn write_zip_entry<W: std::io::Write + std::io::Seek>(
    writer: &mut zip::ZipWriter<W>,
    name: &str,
    local_path: &StdPath,
    options: zip::write::SimpleFileOptions,
) -> Result<()> {
    writer
        .start_file(name, options)
        .map_err(|e| TfmError::with_source(ErrorKind::IoFailure, "failed to start zip entry", e))?;
    let mut input = std::fs::File::open(local_path).map_err(TfmError::from)?;
    std::io::copy(&mut input, writer).map_err(TfmError::from)?;
    Ok(())
}

/// Extracts `src_archive` into `dst_dir` (spec §4.12 "extract",
/// symmetric to `create`). Built directly on [`crate::path::archive`]'s
/// already-parsed tree rather than re-implementing format dispatch.
pub async fn extract(
    src_archive: Path,
    dst_dir: Path,
    job_id: JobId,
    cancel: CancelToken,
    progress: Sender<Progress>,
    cache_manager: &CacheManager,
) -> Result<()> {
    let members = flatten_tree(&src_archive).await?;
    let total = members.len() as u64;
    let mut errors = Vec::new();

    for (i, (relative, member)) in members.iter().enumerate() {
        cancel.check()?;
        let dst = join_relative(&dst_dir, relative);
        let result = if member.is_dir().await.unwrap_or(false) {
            dst.mkdir(true, true).await
        } else {
            member.copy_to(&dst, true).await
        };
        if let Err(e) = result {
            errors.push(ItemError { item: member.as_uri(), message: e.to_string() });
        }
        let _ = progress
            .send(Progress {
                job_id,
                done: i as u64 + 1,
                total: Some(total),
                current_item: Some(member.as_uri()),
                errors: std::mem::take(&mut errors),
                finished: false,
            })
            .await;
    }

    cache_manager.on_event(FileOpEvent::ArchiveExtract { dst_dir: &dst_dir });
    let _ = progress
        .send(Progress { job_id, done: total, total: Some(total), current_item: None, errors: Vec::new(), finished: true })
        .await;
    Ok(())
}

fn join_relative(base: &Path, relative: &str) -> Path {
    relative.split('/').fold(base.clone(), |acc, segment| acc.join(segment))
}

/// Walks the archive's whole member tree in pre-order (directories
/// before the files they contain), pairing each member with its path
/// relative to the archive root.
async fn flatten_tree(root: &Path) -> Result<Vec<(String, Path)>> {
    let mut out = Vec::new();
    let mut stack = vec![(String::new(), root.clone())];
    while let Some((prefix, dir)) = stack.pop() {
        for child in dir.iterdir().await? {
            let relative = if prefix.is_empty() { child.name() } else { format!("{prefix}/{}", child.name()) };
            let is_dir = child.is_dir().await?;
            out.push((relative.clone(), child.clone()));
            if is_dir {
                stack.push((relative, child));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MetadataCache;
    use crate::job::{JobFingerprint, JobKind, JobRunner};
    use crate::path::archive::ArchivePathImpl;
    use crate::path::local::LocalPathImpl;
    use std::sync::Arc;

    #[tokio::test]
    async fn create_then_extract_round_trips_a_zip() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let local = Arc::new(LocalPathImpl::new());
        let runner = JobRunner::new();
        let cache_manager = CacheManager::new(MetadataCache::new(100));

        let a = Path::local(local.clone(), &format!("{}/a.txt", src_dir.path().display()));
        a.write_text("hello", true).await.unwrap();
        let b = Path::local(local.clone(), &format!("{}/b.txt", src_dir.path().display()));
        b.write_text("world", true).await.unwrap();

        let archive_path = out_dir.path().join("bundle.zip");
        let dst_archive = Path::local(local.clone(), &archive_path.display().to_string());
        let (job_id, cancel, tx, _rx) = runner
            .begin(JobFingerprint { kind: JobKind::ArchiveCreate, root: dst_archive.as_uri() })
            .await;
        create(vec![a, b], dst_archive, ArchiveFormat::Zip, job_id, cancel, tx, &cache_manager).await.unwrap();
        assert!(archive_path.exists());

        let archive_uri = format!("archive://{}", archive_path.display());
        let backend = Arc::new(ArchivePathImpl::new(archive_path.clone(), &archive_uri).unwrap());
        let archive_root = Path::archive(backend, &archive_uri, "/");

        let extract_dir = out_dir.path().join("extracted");
        tokio::fs::create_dir_all(&extract_dir).await.unwrap();
        let dst_dir = Path::local(local, &extract_dir.display().to_string());
        let (job_id, cancel, tx, _rx) = runner
            .begin(JobFingerprint { kind: JobKind::ArchiveExtract, root: archive_root.as_uri() })
            .await;
        extract(archive_root, dst_dir, job_id, cancel, tx, &cache_manager).await.unwrap();

        let extracted_a = tokio::fs::read_to_string(extract_dir.join("a.txt")).await.unwrap();
        assert_eq!(extracted_a, "hello");
        let extracted_b = tokio::fs::read_to_string(extract_dir.join("b.txt")).await.unwrap();
        assert_eq!(extracted_b, "world");
    }
}
