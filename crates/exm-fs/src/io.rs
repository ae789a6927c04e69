//! Atomic I/O and install-directory bootstrap

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use fs2::FileExt;

use crate::paths::{BOUNDARY_MARKER, MODULE_SUBDIR};
use crate::{Error, Result};

/// Marker file identifying a scope directory as managed by this system.
pub const EXM_MARKER: &str = "exm.json";

/// Content written into a marker file that does not exist yet.
const EMPTY_JSON_OBJECT: &[u8] = b"{}";

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename so readers never observe a partial file.
/// Acquires an advisory lock on the temp file while writing.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Temp file in the same directory, so the rename stays on one filesystem.
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .lock_exclusive()
        .map_err(|_| Error::LockFailed {
            path: path.to_path_buf(),
        })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .sync_all()
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.unlock().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

    Ok(())
}

/// Create a marker file containing `{}` unless it already exists.
///
/// An existing file is never rewritten, whatever its contents.
pub fn ensure_marker(path: &Path) -> Result<()> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(EMPTY_JSON_OBJECT)
                .map_err(|e| Error::io(path, e))?;
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Bring a scope directory into the shape the package manager and the
/// extension system expect before any install runs.
///
/// Creates `<dir>/node_modules` plus the `package.json` and `exm.json`
/// markers. Idempotent; existing markers are left untouched.
pub fn ensure_install_layout(scope_dir: &Path) -> Result<()> {
    let modules = scope_dir.join(MODULE_SUBDIR);
    fs::create_dir_all(&modules).map_err(|e| Error::io(&modules, e))?;

    ensure_marker(&scope_dir.join(BOUNDARY_MARKER))?;
    ensure_marker(&scope_dir.join(EXM_MARKER))?;

    Ok(())
}
