//! File and Source Management
//!
//! The [`FileManager`] gives every file a stable identity, including
//! virtual files that only exist as remapped buffers. The [`SourceManager`]
//! owns the loaded buffers and the content overrides applied to them.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// A file known to the [`FileManager`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    uid: usize,
    name: PathBuf,
}

impl FileEntry {
    /// Unique identity of the file for the lifetime of the run
    pub fn uid(&self) -> usize {
        self.uid
    }

    /// Normalized absolute path
    pub fn name(&self) -> &Path {
        &self.name
    }
}

/// An in-memory buffer standing in for (or replacing) file content
#[derive(Debug, Clone)]
pub struct MemoryBuffer {
    name: String,
    data: Rc<str>,
}

impl MemoryBuffer {
    pub fn new(name: impl Into<String>, data: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// A zero-length buffer
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Resolves paths to [`FileEntry`] values.
///
/// Relative paths are taken against the working directory and normalized
/// lexically, so `dir/./a.h` and `dir/sub/../a.h` name the same entry. Files
/// on disk are further keyed by their canonical path.
pub struct FileManager {
    working_dir: PathBuf,
    entries: HashMap<PathBuf, FileEntry>,
    virtual_files: HashSet<usize>,
    next_uid: usize,
}

impl FileManager {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            entries: HashMap::new(),
            virtual_files: HashSet::new(),
            next_uid: 0,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Absolute, lexically normalized form of `path`
    pub fn normalize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_lexically(path)
        } else {
            normalize_lexically(&self.working_dir.join(path))
        }
    }

    /// Look up a file that exists on disk or was registered as virtual
    pub fn get_file(&mut self, path: &Path) -> Option<FileEntry> {
        let key = self.normalize(path);
        if let Some(entry) = self.entries.get(&key) {
            return Some(entry.clone());
        }
        if !key.is_file() {
            return None;
        }

        let canonical = fs::canonicalize(&key).unwrap_or_else(|_| key.clone());
        let entry = match self.entries.get(&canonical) {
            Some(entry) => entry.clone(),
            None => {
                let entry = self.new_entry(canonical.clone());
                self.entries.insert(canonical, entry.clone());
                entry
            }
        };
        self.entries.insert(key, entry.clone());
        Some(entry)
    }

    /// Register `path` as existing whether or not it is on disk
    pub fn get_virtual_file(&mut self, path: &Path) -> FileEntry {
        if let Some(entry) = self.get_file(path) {
            self.virtual_files.insert(entry.uid);
            return entry;
        }

        let key = self.normalize(path);
        let entry = self.new_entry(key.clone());
        self.entries.insert(key, entry.clone());
        self.virtual_files.insert(entry.uid);
        debug!("Registered virtual file {}", entry.name.display());
        entry
    }

    /// Whether the entry was registered through [`FileManager::get_virtual_file`]
    pub fn is_virtual(&self, entry: &FileEntry) -> bool {
        self.virtual_files.contains(&entry.uid)
    }

    fn new_entry(&mut self, name: PathBuf) -> FileEntry {
        let uid = self.next_uid;
        self.next_uid += 1;
        FileEntry { uid, name }
    }
}

/// Handle of a buffer entered into the [`SourceManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u32);

struct SourceFile {
    name: Rc<str>,
    dir: PathBuf,
    entry: Option<FileEntry>,
    data: Rc<str>,
}

/// Owns every buffer that takes part in the run
pub struct SourceManager {
    file_manager: FileManager,
    overrides: HashMap<usize, MemoryBuffer>,
    files: Vec<SourceFile>,
    main_file: Option<FileId>,
}

impl SourceManager {
    pub fn new(file_manager: FileManager) -> Self {
        Self {
            file_manager,
            overrides: HashMap::new(),
            files: Vec::new(),
            main_file: None,
        }
    }

    pub fn file_manager(&self) -> &FileManager {
        &self.file_manager
    }

    pub fn file_manager_mut(&mut self) -> &mut FileManager {
        &mut self.file_manager
    }

    /// Register an in-memory buffer as the main file of the run.
    ///
    /// Quoted includes from the main buffer are resolved against the working
    /// directory.
    pub fn create_main_file_for_buffer(&mut self, buffer: MemoryBuffer) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            name: Rc::from(buffer.name()),
            dir: self.file_manager.working_dir().to_path_buf(),
            entry: None,
            data: buffer.data,
        });
        self.main_file = Some(id);
        id
    }

    pub fn main_file(&self) -> Option<FileId> {
        self.main_file
    }

    /// Replace the content of `entry` for the rest of the run
    pub fn override_file_contents(&mut self, entry: &FileEntry, buffer: MemoryBuffer) {
        debug!(
            "Overriding {} with {} byte buffer",
            entry.name().display(),
            buffer.len()
        );
        self.overrides.insert(entry.uid, buffer);
    }

    /// Enter a file, reading it from its override or from disk
    pub fn create_file_id(&mut self, entry: &FileEntry) -> io::Result<FileId> {
        let data: Rc<str> = match self.overrides.get(&entry.uid) {
            Some(buffer) => buffer.data.clone(),
            None if self.file_manager.is_virtual(entry) => Rc::from(""),
            None => {
                let bytes = fs::read(entry.name())?;
                Rc::from(String::from_utf8_lossy(&bytes).as_ref())
            }
        };

        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            name: Rc::from(entry.name().to_string_lossy().as_ref()),
            dir: entry
                .name()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.file_manager.working_dir().to_path_buf()),
            entry: Some(entry.clone()),
            data,
        });
        Ok(id)
    }

    pub fn buffer(&self, id: FileId) -> Rc<str> {
        self.files[id.0 as usize].data.clone()
    }

    pub fn file_name(&self, id: FileId) -> Rc<str> {
        self.files[id.0 as usize].name.clone()
    }

    /// Directory used for quoted includes made from this file
    pub fn file_dir(&self, id: FileId) -> &Path {
        &self.files[id.0 as usize].dir
    }

    pub fn file_entry(&self, id: FileId) -> Option<&FileEntry> {
        self.files[id.0 as usize].entry.as_ref()
    }
}

/// Resolve `.` and `..` components without touching the file system
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = out.has_root() && out.parent().is_none();
                if !at_root && !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
