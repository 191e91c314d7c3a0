//! Sync FileSystem Adapter
//!
//! Bridges the async `fs::FileSystem` trait to the engine's synchronous
//! `ShellFs` trait. Uses `tokio::task::block_in_place` + `block_on` to run
//! async operations to completion on the calling thread.

use std::sync::Arc;

use glob::{MatchOptions, Pattern};

use crate::fs::{FileSystem as AsyncFileSystem, FsError, FsStat};
use crate::interpreter::interpreter::ShellFs;

/// Adapter that wraps an async FileSystem and provides a sync interface.
pub struct SyncFsAdapter {
    inner: Arc<dyn AsyncFileSystem>,
    handle: tokio::runtime::Handle,
}

impl SyncFsAdapter {
    /// Create a new adapter wrapping the given async filesystem.
    ///
    /// # Arguments
    /// * `fs` - The async filesystem to wrap
    /// * `handle` - The tokio runtime handle for executing async operations
    pub fn new(fs: Arc<dyn AsyncFileSystem>, handle: tokio::runtime::Handle) -> Self {
        Self { inner: fs, handle }
    }

    fn block_on<F, T>(&self, f: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        tokio::task::block_in_place(|| self.handle.block_on(f))
    }
}

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

impl ShellFs for SyncFsAdapter {
    fn read_file(&self, path: &str) -> Result<String, FsError> {
        self.block_on(self.inner.read_file(path))
    }

    fn write_file(&self, path: &str, contents: &str) -> Result<(), FsError> {
        self.block_on(self.inner.write_file(path, contents.as_bytes()))
    }

    fn append_file(&self, path: &str, contents: &str) -> Result<(), FsError> {
        self.block_on(self.inner.append_file(path, contents.as_bytes()))
    }

    fn exists(&self, path: &str) -> bool {
        self.block_on(self.inner.exists(path))
    }

    fn stat(&self, path: &str) -> Result<FsStat, FsError> {
        self.block_on(self.inner.stat(path))
    }

    fn resolve_path(&self, base: &str, path: &str) -> String {
        self.inner.resolve_path(base, path)
    }

    fn glob(&self, pattern: &str, cwd: &str) -> Result<Vec<String>, FsError> {
        let absolute = pattern.starts_with('/');
        let full_pattern = if absolute {
            pattern.to_string()
        } else if cwd == "/" {
            format!("/{}", pattern)
        } else {
            format!("{}/{}", cwd.trim_end_matches('/'), pattern)
        };
        let matcher = Pattern::new(&full_pattern).map_err(|e| FsError::Other {
            message: format!("invalid glob pattern: {}", e),
        })?;

        let prefix = if cwd == "/" { "/".to_string() } else { format!("{}/", cwd.trim_end_matches('/')) };
        let mut matches: Vec<String> = self
            .block_on(self.inner.get_all_paths())
            .into_iter()
            .filter(|p| p != "/" && matcher.matches_with(p, GLOB_OPTIONS))
            .map(|p| match p.strip_prefix(&prefix) {
                Some(relative) if !absolute => relative.to_string(),
                _ => p,
            })
            .collect();
        matches.sort();
        Ok(matches)
    }
}

// ============================================================================
// Tests
// ============================================================================
