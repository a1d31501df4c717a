use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::error::{FileSystemError, FileSystemResult};

/// Creates a directory structure if it doesn't exist.
///
/// If the directory already exists, this function does nothing. If the path
/// exists but is not a directory, an error is returned.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).map_err(|err| FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source: err,
        })?;
    } else if !path.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Removes the specified file or directory safely.
///
/// If the path does not exist, this function returns `Ok(())` without error.
/// Directories are removed recursively.
///
/// # Errors
///
/// Returns a [`FileSystemError::File`] if the removal fails for any reason
/// other than the path not existing.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(());
    }

    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|err| FileSystemError::File {
        path: path.to_path_buf(),
        action: "remove",
        source: err,
    })
}

/// Writes `content` to `path` using a write-new-then-replace discipline.
///
/// The content is first written to a `.part` sibling in the same directory
/// and synced to disk, then renamed over the target. A crash at any point
/// leaves either the old file or the new file in place, never a torn one.
/// Readers of `path` can never observe a partial write.
///
/// # Errors
///
/// * [`FileSystemError::File`] if the temporary file cannot be created,
///   written, or synced.
/// * [`FileSystemError::Rename`] if the final rename fails.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> FileSystemResult<()> {
    let path = path.as_ref();
    let tmp_path = part_path(path);

    let mut tmp_file = File::create(&tmp_path).map_err(|err| FileSystemError::File {
        path: tmp_path.clone(),
        action: "create",
        source: err,
    })?;

    tmp_file
        .write_all(content)
        .and_then(|()| tmp_file.sync_all())
        .map_err(|err| FileSystemError::File {
            path: tmp_path.clone(),
            action: "write",
            source: err,
        })?;

    fs::rename(&tmp_path, path).map_err(|err| FileSystemError::Rename {
        from: tmp_path,
        to: path.to_path_buf(),
        source: err,
    })
}

/// The `.part` sibling a pending write lands in, e.g. `state.json.part`.
fn part_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".part");
    PathBuf::from(os)
}
