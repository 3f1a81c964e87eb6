use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    writes: Vec<PathBuf>,
    denied: HashSet<PathBuf>,
}

/// In-memory filesystem for tests.
///
/// Every successful [`FileSystem::write`] is recorded so tests can assert
/// exactly which outputs were produced (the write log). Paths are
/// expected to be absolute.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.add_dir("/");
        fs
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        insert_entry(&mut state.entries, &path, MockEntry::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        if !state.entries.contains_key(&path) {
            insert_entry(&mut state.entries, &path, MockEntry::Dir(Vec::new()));
        }
    }

    /// Remove a file or a whole directory subtree.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut state = self.lock();
        state.entries.retain(|p, _| !p.starts_with(path));
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            let name = name.to_string_lossy();
            if let Some(MockEntry::Dir(children)) = state.entries.get_mut(parent) {
                children.retain(|c| c.as_str() != name);
            }
        }
    }

    /// Make every write to `path` fail.
    pub fn deny_writes(&self, path: impl AsRef<Path>) {
        self.lock().denied.insert(path.as_ref().to_path_buf());
    }

    /// Paths written so far, in write order.
    pub fn writes(&self) -> Vec<PathBuf> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// How many times `path` was written.
    pub fn writes_to(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.lock().writes.iter().filter(|p| p.as_path() == path).count()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().entries.get(path.as_ref()) {
            Some(MockEntry::File(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }
}

fn insert_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path, entry: MockEntry) {
    entries.insert(path.to_path_buf(), entry);

    // Ensure parent directories exist implicitly for simplicity in this mock
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return;
    };
    if !matches!(entries.get(parent), Some(MockEntry::Dir(_))) {
        insert_entry(entries, parent, MockEntry::Dir(Vec::new()));
    }
    if let Some(MockEntry::Dir(children)) = entries.get_mut(parent) {
        let name = name.to_string_lossy().into_owned();
        if !children.contains(&name) {
            children.push(name);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File(content)) => Ok(content.clone()),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if state.denied.contains(path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        if matches!(state.entries.get(path), Some(MockEntry::Dir(_))) {
            return Err(anyhow!("Is a directory: {:?}", path));
        }
        insert_entry(&mut state.entries, path, MockEntry::File(contents.to_vec()));
        state.writes.push(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::Dir(_)))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // In mock, we just return the path as is, assuming absolute paths are used in tests
        Ok(path.to_path_buf())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        match self.lock().entries.get(path) {
            Some(MockEntry::Dir(children)) => Ok(children.clone()),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
