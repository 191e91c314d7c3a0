//! File System Module
//!
//! Virtual file system used for redirection targets, pathname expansion,
//! `cd`, `source` and `test` file operators. `InMemoryFs` is the default
//! backend; hosts may supply their own `FileSystem`.

pub mod types;
pub mod in_memory_fs;

pub use types::*;
pub use in_memory_fs::InMemoryFs;
