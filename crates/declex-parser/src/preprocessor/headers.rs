//! Header Search
//!
//! Resolves the file named by an inclusion directive against the includer's
//! directory and the configured search directories.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::source::{FileEntry, FileManager};

/// Kind of a search directory; directories are searched in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SearchKind {
    /// User `-I` directories
    Angled,
    /// Compiler resource directories
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDir {
    pub path: PathBuf,
    pub kind: SearchKind,
}

/// Search directories as configured, before ordering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSearchOptions {
    pub entries: Vec<SearchDir>,
}

impl HeaderSearchOptions {
    pub fn add_path(&mut self, path: impl Into<PathBuf>, kind: SearchKind) {
        self.entries.push(SearchDir {
            path: path.into(),
            kind,
        });
    }
}

/// A resolved inclusion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    pub entry: FileEntry,
    /// Index of the search directory that matched; `None` when found next
    /// to the includer or by absolute path
    pub dir_index: Option<usize>,
}

/// Header file resolver
pub struct HeaderSearch {
    dirs: Vec<SearchDir>,
}

impl HeaderSearch {
    pub fn new(options: &HeaderSearchOptions) -> Self {
        let mut dirs = options.entries.clone();
        // Stable, so command-line order is kept within each kind
        dirs.sort_by_key(|d| d.kind);
        Self { dirs }
    }

    /// Search directories in lookup order
    pub fn search_dirs(&self) -> &[SearchDir] {
        &self.dirs
    }

    /// Resolve a header name.
    ///
    /// `includer_dir` is tried first for quoted names; `from_index` restarts
    /// the directory walk for `#include_next`.
    pub fn lookup_file(
        &self,
        name: &str,
        is_angled: bool,
        includer_dir: Option<&Path>,
        from_index: Option<usize>,
        file_manager: &mut FileManager,
    ) -> Option<FoundFile> {
        if name.is_empty() {
            return None;
        }

        let path = Path::new(name);
        if path.is_absolute() {
            return file_manager.get_file(path).map(|entry| FoundFile {
                entry,
                dir_index: None,
            });
        }

        if !is_angled && from_index.is_none() {
            if let Some(dir) = includer_dir {
                if let Some(entry) = file_manager.get_file(&dir.join(path)) {
                    debug!("Resolved {} relative to {}", name, dir.display());
                    return Some(FoundFile {
                        entry,
                        dir_index: None,
                    });
                }
            }
        }

        let start = from_index.unwrap_or(0);
        for (index, dir) in self.dirs.iter().enumerate().skip(start) {
            if let Some(entry) = file_manager.get_file(&dir.path.join(path)) {
                debug!("Resolved {} in {}", name, dir.path.display());
                return Some(FoundFile {
                    entry,
                    dir_index: Some(index),
                });
            }
        }

        debug!("Failed to resolve header: {}", name);
        None
    }
}
