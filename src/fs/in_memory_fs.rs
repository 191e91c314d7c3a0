//! In-Memory File System Implementation
//!
//! A pure in-memory virtual file system for the shell runtime.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::types::*;

/// In-memory virtual file system.
pub struct InMemoryFs {
    data: RwLock<HashMap<String, FsEntry>>,
}

impl InMemoryFs {
    /// Create a new filesystem containing only `/`.
    pub fn new() -> Self {
        Self::with_files(&InitialFiles::new())
    }

    /// Create with initial files; parent directories are created implicitly.
    pub fn with_files(files: &InitialFiles) -> Self {
        let mut data = HashMap::new();
        data.insert("/".to_string(), FsEntry::directory());
        for (path, content) in files {
            let normalized = normalize_path(path);
            ensure_parent_dirs(&mut data, &normalized);
            data.insert(normalized, FsEntry::file(content.as_bytes().to_vec()));
        }
        Self { data: RwLock::new(data) }
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Path utilities
// ============================================================================

pub(crate) fn normalize_path(path: &str) -> String {
    let mut resolved: Vec<&str> = Vec::new();
    for part in path.split('/').filter(|p| !p.is_empty() && *p != ".") {
        if part == ".." {
            resolved.pop();
        } else {
            resolved.push(part);
        }
    }
    format!("/{}", resolved.join("/"))
}

fn dirname(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(pos) => normalized[..pos].to_string(),
    }
}

fn ensure_parent_dirs(data: &mut HashMap<String, FsEntry>, path: &str) {
    let dir = dirname(path);
    if dir == "/" || data.contains_key(&dir) {
        return;
    }
    ensure_parent_dirs(data, &dir);
    data.insert(dir, FsEntry::directory());
}

fn not_found(path: &str, operation: &str) -> FsError {
    FsError::NotFound {
        path: path.to_string(),
        operation: operation.to_string(),
    }
}

fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        "/".to_string()
    } else {
        format!("{}/", dir)
    }
}

// ============================================================================
// FileSystem trait implementation
// ============================================================================

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read_file(&self, path: &str) -> Result<String, FsError> {
        let data = self.data.read().await;
        match data.get(&normalize_path(path)) {
            Some(FsEntry::File { content, .. }) => Ok(String::from_utf8_lossy(content).to_string()),
            Some(FsEntry::Directory { .. }) => Err(FsError::IsDirectory {
                path: path.to_string(),
                operation: "read".to_string(),
            }),
            None => Err(not_found(path, "open")),
        }
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        let mut data = self.data.write().await;
        let normalized = normalize_path(path);
        if let Some(FsEntry::Directory { .. }) = data.get(&normalized) {
            return Err(FsError::IsDirectory {
                path: path.to_string(),
                operation: "write".to_string(),
            });
        }
        ensure_parent_dirs(&mut data, &normalized);
        data.insert(normalized, FsEntry::file(content.to_vec()));
        Ok(())
    }

    async fn append_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        let mut data = self.data.write().await;
        let normalized = normalize_path(path);
        match data.get_mut(&normalized) {
            Some(FsEntry::Directory { .. }) => Err(FsError::IsDirectory {
                path: path.to_string(),
                operation: "write".to_string(),
            }),
            Some(FsEntry::File { content: existing, mtime, .. }) => {
                existing.extend_from_slice(content);
                *mtime = std::time::SystemTime::now();
                Ok(())
            }
            None => {
                ensure_parent_dirs(&mut data, &normalized);
                data.insert(normalized, FsEntry::file(content.to_vec()));
                Ok(())
            }
        }
    }

    async fn exists(&self, path: &str) -> bool {
        self.data.read().await.contains_key(&normalize_path(path))
    }

    async fn stat(&self, path: &str) -> Result<FsStat, FsError> {
        let data = self.data.read().await;
        let entry = data.get(&normalize_path(path)).ok_or_else(|| not_found(path, "stat"))?;
        let size = match entry {
            FsEntry::File { content, .. } => content.len() as u64,
            FsEntry::Directory { .. } => 0,
        };
        Ok(FsStat {
            is_file: entry.is_file(),
            is_directory: entry.is_directory(),
            mode: entry.mode(),
            size,
            mtime: entry.mtime(),
        })
    }

    async fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError> {
        let mut data = self.data.write().await;
        let normalized = normalize_path(path);

        if let Some(entry) = data.get(&normalized) {
            if entry.is_file() || !options.recursive {
                return Err(FsError::AlreadyExists {
                    path: path.to_string(),
                    operation: "mkdir".to_string(),
                });
            }
            return Ok(());
        }

        let parent = dirname(&normalized);
        match data.get(&parent) {
            Some(FsEntry::Directory { .. }) => {}
            Some(FsEntry::File { .. }) => {
                return Err(FsError::NotDirectory {
                    path: path.to_string(),
                    operation: "mkdir".to_string(),
                })
            }
            None if options.recursive => ensure_parent_dirs(&mut data, &normalized),
            None => return Err(not_found(path, "mkdir")),
        }
        data.insert(normalized, FsEntry::directory());
        Ok(())
    }

    async fn readdir(&self, path: &str) -> Result<Vec<String>, FsError> {
        let data = self.data.read().await;
        let normalized = normalize_path(path);
        match data.get(&normalized) {
            Some(FsEntry::Directory { .. }) => {}
            Some(FsEntry::File { .. }) => {
                return Err(FsError::NotDirectory {
                    path: path.to_string(),
                    operation: "scandir".to_string(),
                })
            }
            None => return Err(not_found(path, "scandir")),
        }

        let prefix = child_prefix(&normalized);
        let names: BTreeSet<String> = data
            .keys()
            .filter_map(|p| p.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn rm(&self, path: &str, options: &RmOptions) -> Result<(), FsError> {
        let mut data = self.data.write().await;
        let normalized = normalize_path(path);

        match data.get(&normalized) {
            None if options.force => return Ok(()),
            None => return Err(not_found(path, "rm")),
            Some(FsEntry::Directory { .. }) => {
                let prefix = child_prefix(&normalized);
                let children: Vec<String> = data.keys().filter(|k| k.starts_with(&prefix)).cloned().collect();
                if !children.is_empty() && !options.recursive {
                    return Err(FsError::NotEmpty {
                        path: path.to_string(),
                        operation: "rm".to_string(),
                    });
                }
                for child in children {
                    data.remove(&child);
                }
            }
            Some(FsEntry::File { .. }) => {}
        }
        if normalized != "/" {
            data.remove(&normalized);
        }
        Ok(())
    }

    async fn get_all_paths(&self) -> Vec<String> {
        let data = self.data.read().await;
        let mut paths: Vec<String> = data.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn resolve_path(&self, base: &str, path: &str) -> String {
        if path.starts_with('/') {
            normalize_path(path)
        } else {
            normalize_path(&format!("{}/{}", base, path))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
