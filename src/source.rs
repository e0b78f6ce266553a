use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

/// Where the importer finds peer source files. The importer only ever asks
/// for cleaned, relative paths.
pub trait SourceProvider {
    fn open(&self, path: &Path) -> io::Result<String>;
}

/// Sources rooted at a directory on disk. Only regular files resolve.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceProvider for DirSource {
    fn open(&self, path: &Path) -> io::Result<String> {
        let full = self.root.join(path);
        let meta = fs::metadata(&full)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            ));
        }
        fs::read_to_string(&full)
    }
}

/// In-memory sources, for tests and embedding hosts.
#[derive(Default)]
pub struct MemorySource {
    files: HashMap<PathBuf, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, source: impl Into<String>) {
        self.files.insert(path.into(), source.into());
    }

    pub fn with(mut self, path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }
}

impl SourceProvider for MemorySource {
    fn open(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }
}
