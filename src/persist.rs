//! Disk I/O helpers: bootstrap, raw read, atomic write, quarantine.
//!
//! The rename-over approach is atomic on POSIX filesystems and on NTFS. On
//! FAT32 or network shares there are no hard guarantees. If that matters to
//! you, keep backups or use a real database.

use crate::durability::Durability;
use crate::error::{Error, Result};
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[cfg(test)]
thread_local! {
    // Makes the next renames on this thread fail, after the temp file is written.
    pub(crate) static FAIL_RENAME: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Create the parent directory and, if `path` is missing, write `initial` to
/// it. Returns `true` when this call created the file.
///
/// Uses `create_new` so a concurrent creator winning the race is not an error
/// and an existing file is never touched.
pub async fn create_if_missing(path: &Path, initial: &[u8]) -> Result<bool> {
    if let Some(parent) = parent_dir(path) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(e, format!("create directory {}", parent.display())))?;
    }
    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(Error::io(e, format!("create {}", path.display()))),
    };
    file.write_all(initial)
        .await
        .map_err(|e| Error::io(e, format!("write {}", path.display())))?;
    file.sync_all()
        .await
        .map_err(|e| Error::io(e, format!("sync {}", path.display())))?;
    Ok(true)
}

/// Read the whole file at `path`.
pub async fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .await
        .map_err(|e| Error::io(e, format!("read {}", path.display())))
}

/// Write `bytes` to a uniquely named temp file next to `path`, then rename it
/// over `path`. A crash at any point leaves either the old or the new
/// content, never a mix. On failure the temp file is removed best-effort.
pub async fn atomic_write(path: &Path, bytes: &[u8], durability: Durability) -> Result<()> {
    let tmp = temp_path(path);
    match write_then_rename(&tmp, path, bytes, durability).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                debug!(path = %tmp.display(), error = %cleanup, "could not remove temp file");
            }
            Err(e)
        }
    }
}

async fn write_then_rename(
    tmp: &Path,
    path: &Path,
    bytes: &[u8],
    durability: Durability,
) -> Result<()> {
    let mut file = fs::File::create(tmp)
        .await
        .map_err(|e| Error::io(e, format!("create {}", tmp.display())))?;
    file.write_all(bytes)
        .await
        .map_err(|e| Error::io(e, format!("write {}", tmp.display())))?;
    file.flush()
        .await
        .map_err(|e| Error::io(e, format!("flush {}", tmp.display())))?;
    if durability.syncs() {
        file.sync_all()
            .await
            .map_err(|e| Error::io(e, format!("sync {}", tmp.display())))?;
    }
    drop(file);
    #[cfg(test)]
    if FAIL_RENAME.with(std::cell::Cell::get) {
        return Err(Error::io(
            std::io::Error::other("rename refused"),
            format!("rename over {}", path.display()),
        ));
    }
    fs::rename(tmp, path)
        .await
        .map_err(|e| Error::io(e, format!("rename over {}", path.display())))?;
    if durability.syncs() {
        sync_dir(path).await?;
    }
    Ok(())
}

// Makes the rename itself durable. Directories can't be opened for syncing
// on Windows, so this is unix-only.
#[cfg(unix)]
async fn sync_dir(path: &Path) -> Result<()> {
    let dir = parent_dir(path).unwrap_or_else(|| Path::new("."));
    let handle = fs::File::open(dir)
        .await
        .map_err(|e| Error::io(e, format!("open directory {}", dir.display())))?;
    handle
        .sync_all()
        .await
        .map_err(|e| Error::io(e, format!("sync directory {}", dir.display())))
}

#[cfg(not(unix))]
async fn sync_dir(_path: &Path) -> Result<()> {
    Ok(())
}

/// Move an undecodable file out of the way so its bytes survive for manual
/// recovery. Returns where it went.
pub async fn quarantine(path: &Path) -> Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let target = sibling(path, &format!("{}.corrupt-{stamp}", file_name(path)));
    fs::rename(path, &target)
        .await
        .map_err(|e| Error::io(e, format!("quarantine {}", path.display())))?;
    Ok(target)
}

/// `.<name>.<uuid>.tmp` in the same directory, so the rename never crosses
/// filesystems and concurrent writers never share a temp file.
pub fn temp_path(path: &Path) -> PathBuf {
    sibling(
        path,
        &format!(".{}.{}.tmp", file_name(path), uuid::Uuid::new_v4().simple()),
    )
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "collection.json".into())
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    match parent_dir(path) {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}
