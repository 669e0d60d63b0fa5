//! Per-session scratch workspace
//!
//! Each session gets a unique directory under the OS temp root holding
//! exactly one file: the source the client submitted. The directory is
//! bind-mounted into the sandbox read-write, so it must be writable by the
//! sandbox's unprivileged user. Cleanup rides on `TempDir`'s `Drop`, which
//! covers every exit path including panics.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{ExecError, ExecResult};

/// Exclusive filesystem root for one session.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    source_path: PathBuf,
}

// The process inside the container runs as an unprivileged user and must be
// able to create artifacts next to the source file.
fn wide_open_permissions() -> Option<fs::Permissions> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Some(fs::Permissions::from_mode(0o777))
    }

    #[cfg(not(unix))]
    None
}

impl Workspace {
    /// Create the workspace and write the source file into it.
    pub fn create(source_name: &str, code: &str) -> ExecResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("runbox-")
            .tempdir()
            .map_err(ExecError::Workspace)?;

        if let Some(perms) = wide_open_permissions() {
            fs::set_permissions(dir.path(), perms).map_err(ExecError::Workspace)?;
        }

        let source_path = dir.path().join(source_name);
        fs::write(&source_path, code).map_err(ExecError::Workspace)?;

        Ok(Self { dir, source_path })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_single_source_file() {
        let ws = Workspace::create("main.py", "print(1)").unwrap();
        assert_eq!(fs::read_to_string(ws.source_path()).unwrap(), "print(1)");

        let entries: Vec<_> = fs::read_dir(ws.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn removed_on_drop() {
        let path = {
            let ws = Workspace::create("main.js", "console.log(1)").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn directory_is_world_writable() {
        use std::os::unix::fs::PermissionsExt;

        let ws = Workspace::create("main.py", "").unwrap();
        let mode = fs::metadata(ws.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }
}
