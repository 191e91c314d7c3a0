//! Engine Collaborator Interfaces
//!
//! The execution engine is synchronous. It reaches the filesystem through
//! `ShellFs`, implemented over the async `fs::FileSystem` by
//! `SyncFsAdapter`.

use crate::fs::{FsError, FsStat};

/// Filesystem interface used by redirections, globbing, `cd`, `source`
/// and the `test` file operators. Paths are absolute.
pub trait ShellFs: Send + Sync {
    fn read_file(&self, path: &str) -> Result<String, FsError>;

    fn write_file(&self, path: &str, contents: &str) -> Result<(), FsError>;

    fn append_file(&self, path: &str, contents: &str) -> Result<(), FsError>;

    fn exists(&self, path: &str) -> bool;

    fn stat(&self, path: &str) -> Result<FsStat, FsError>;

    fn is_dir(&self, path: &str) -> bool {
        self.stat(path).map(|s| s.is_directory).unwrap_or(false)
    }

    fn is_file(&self, path: &str) -> bool {
        self.stat(path).map(|s| s.is_file).unwrap_or(false)
    }

    /// Resolve `path` against the directory `base`.
    fn resolve_path(&self, base: &str, path: &str) -> String;

    /// Paths matching a glob pattern, sorted. Relative patterns are matched
    /// against `cwd` and returned relative to it.
    fn glob(&self, pattern: &str, cwd: &str) -> Result<Vec<String>, FsError>;
}
