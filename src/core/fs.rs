// ─── Filesystem helpers ───
// Staged writes: output is produced at a temporary sibling and renamed into
// place, so readers only ever observe complete files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};

const MAX_MOVE_TRIES: u32 = 2;

/// A unique hidden sibling of `path`, used to stage writes.
pub fn temporary_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staged = format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple());
    match path.parent() {
        Some(parent) => parent.join(staged),
        None => PathBuf::from(staged),
    }
}

pub fn create_parent_dirs(path: &Path) -> WorkspaceResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).at(parent)?;
        }
    }
    Ok(())
}

/// Rename `source` over `dest`.
///
/// Renames refused because another process holds the file open are retried
/// with a short linear backoff. When the retries are exhausted the first
/// error is returned. Renames the filesystem cannot perform atomically fall
/// back to copy-and-delete.
pub fn atomic_move(source: &Path, dest: &Path) -> WorkspaceResult<()> {
    let mut tries = 0;
    let mut first_error: Option<std::io::Error> = None;
    loop {
        match std::fs::rename(source, dest) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied && tries < MAX_MOVE_TRIES => {
                tries += 1;
                warn!(
                    "Rename of {:?} to {:?} was denied, retrying ({}/{})",
                    source, dest, tries, MAX_MOVE_TRIES
                );
                first_error.get_or_insert(e);
                std::thread::sleep(Duration::from_millis(10 * u64::from(tries)));
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(WorkspaceError::Io {
                    path: dest.to_path_buf(),
                    source: first_error.unwrap_or(e),
                });
            }
            Err(e) => {
                if source.is_file() && std::fs::copy(source, dest).is_ok() {
                    std::fs::remove_file(source).at(source)?;
                    return Ok(());
                }
                return Err(WorkspaceError::Io {
                    path: dest.to_path_buf(),
                    source: e,
                });
            }
        }
    }
}

/// Run `write` against a temporary sibling of `dest`, then publish it.
///
/// The staged file is removed when `write` fails.
pub fn write_atomically<T>(
    dest: &Path,
    write: impl FnOnce(&Path) -> WorkspaceResult<T>,
) -> WorkspaceResult<T> {
    create_parent_dirs(dest)?;
    let staged = temporary_sibling(dest);
    match write(&staged) {
        Ok(value) => {
            if let Err(e) = atomic_move(&staged, dest) {
                let _ = std::fs::remove_file(&staged);
                return Err(e);
            }
            Ok(value)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&staged);
            Err(e)
        }
    }
}
