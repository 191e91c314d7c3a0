//! File System Types
//!
//! Core types and traits for the virtual file system.

use std::collections::HashMap;
use std::time::SystemTime;

use async_trait::async_trait;
use thiserror::Error;

/// File system errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("ENOENT: no such file or directory, {operation} '{path}'")]
    NotFound { path: String, operation: String },

    #[error("EEXIST: file already exists, {operation} '{path}'")]
    AlreadyExists { path: String, operation: String },

    #[error("EISDIR: illegal operation on a directory, {operation} '{path}'")]
    IsDirectory { path: String, operation: String },

    #[error("ENOTDIR: not a directory, {operation} '{path}'")]
    NotDirectory { path: String, operation: String },

    #[error("ENOTEMPTY: directory not empty, {operation} '{path}'")]
    NotEmpty { path: String, operation: String },

    #[error("{message}")]
    Other { message: String },
}

impl FsError {
    /// Short message in the form shells print after the path
    /// (`bash: PATH: No such file or directory`).
    pub fn shell_message(&self) -> &'static str {
        match self {
            FsError::NotFound { .. } => "No such file or directory",
            FsError::AlreadyExists { .. } => "File exists",
            FsError::IsDirectory { .. } => "Is a directory",
            FsError::NotDirectory { .. } => "Not a directory",
            FsError::NotEmpty { .. } => "Directory not empty",
            FsError::Other { .. } => "Input/output error",
        }
    }
}

/// File system entry types
#[derive(Debug, Clone)]
pub enum FsEntry {
    File {
        content: Vec<u8>,
        mode: u32,
        mtime: SystemTime,
    },
    Directory {
        mode: u32,
        mtime: SystemTime,
    },
}

impl FsEntry {
    pub fn file(content: impl Into<Vec<u8>>) -> Self {
        FsEntry::File {
            content: content.into(),
            mode: 0o644,
            mtime: SystemTime::now(),
        }
    }

    pub fn directory() -> Self {
        FsEntry::Directory {
            mode: 0o755,
            mtime: SystemTime::now(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FsEntry::File { .. })
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FsEntry::Directory { .. })
    }

    pub fn mode(&self) -> u32 {
        match self {
            FsEntry::File { mode, .. } | FsEntry::Directory { mode, .. } => *mode,
        }
    }

    pub fn mtime(&self) -> SystemTime {
        match self {
            FsEntry::File { mtime, .. } | FsEntry::Directory { mtime, .. } => *mtime,
        }
    }
}

/// File status information
#[derive(Debug, Clone)]
pub struct FsStat {
    pub is_file: bool,
    pub is_directory: bool,
    pub mode: u32,
    pub size: u64,
    pub mtime: SystemTime,
}

/// Options for mkdir operation
#[derive(Debug, Clone, Default)]
pub struct MkdirOptions {
    pub recursive: bool,
}

/// Options for rm operation
#[derive(Debug, Clone, Default)]
pub struct RmOptions {
    pub recursive: bool,
    pub force: bool,
}

/// Initial files map type (path → text content)
pub type InitialFiles = HashMap<String, String>;

/// Abstract filesystem interface that can be implemented by different backends.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read the contents of a file as a string
    async fn read_file(&self, path: &str) -> Result<String, FsError>;

    /// Write content to a file, creating it if it doesn't exist
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;

    /// Append content to a file, creating it if it doesn't exist
    async fn append_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;

    /// Check if a path exists
    async fn exists(&self, path: &str) -> bool;

    /// Get file/directory information
    async fn stat(&self, path: &str) -> Result<FsStat, FsError>;

    /// Create a directory
    async fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError>;

    /// Read directory contents (sorted entry names)
    async fn readdir(&self, path: &str) -> Result<Vec<String>, FsError>;

    /// Remove a file or directory
    async fn rm(&self, path: &str, options: &RmOptions) -> Result<(), FsError>;

    /// Every path in the filesystem (used for glob matching)
    async fn get_all_paths(&self) -> Vec<String>;

    /// Resolve a relative path against a base path
    fn resolve_path(&self, base: &str, path: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_entry_methods() {
        let file = FsEntry::file(b"x".to_vec());
        assert!(file.is_file());
        assert!(!file.is_directory());
        assert_eq!(file.mode(), 0o644);

        let dir = FsEntry::directory();
        assert!(dir.is_directory());
        assert_eq!(dir.mode(), 0o755);
    }

    #[test]
    fn test_shell_message() {
        let err = FsError::NotFound { path: "/x".into(), operation: "open".into() };
        assert_eq!(err.shell_message(), "No such file or directory");
        assert_eq!(err.to_string(), "ENOENT: no such file or directory, open '/x'");
    }
}
