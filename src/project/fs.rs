//! File-system collaborator interface.
//!
//! The core never touches `std::fs` directly; everything goes through
//! [`FileSystem`] so hosts can plug in their own file layer and tests can
//! run against an in-memory tree.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Host file-system seam consumed by the coordinator and write-back engine.
pub trait FileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String>;
    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn list_children(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// First direct child of `dir` satisfying `predicate`, if any.
    fn find_file(&self, dir: &Path, predicate: &dyn Fn(&Path) -> bool) -> Option<PathBuf> {
        self.list_children(dir)
            .ok()?
            .into_iter()
            .find(|p| predicate(p))
    }
}

/// The real file system.
#[derive(Debug, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_children(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            out.push(entry?.path());
        }
        out.sort();
        Ok(out)
    }
}

/// In-memory file system for tests and hosts with virtual documents.
///
/// Clones share the same backing store, so a test can keep a handle after
/// boxing one copy into the session.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    files: Rc<RefCell<BTreeMap<PathBuf, String>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.borrow_mut().insert(path.into(), contents.into());
    }

    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files.borrow().get(path).cloned()
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.files.borrow_mut().remove(path).is_some()
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn list_children(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_fs_round_trips_and_lists() {
        let fs = MemoryFileSystem::new();
        fs.insert("/p/build.gradle", "a = 1\n");
        fs.insert("/p/gradle.properties", "v=3\n");
        fs.insert("/p/app/build.gradle", "");

        assert_eq!(fs.read_file(Path::new("/p/build.gradle")).unwrap(), "a = 1\n");
        assert!(fs.exists(Path::new("/p/gradle.properties")));
        assert_eq!(fs.list_children(Path::new("/p")).unwrap().len(), 2);

        let found = fs.find_file(Path::new("/p"), &|p| {
            p.file_name().is_some_and(|n| n == "gradle.properties")
        });
        assert_eq!(found, Some(PathBuf::from("/p/gradle.properties")));
    }

    #[test]
    fn missing_file_is_not_found() {
        let fs = MemoryFileSystem::new();
        let err = fs.read_file(Path::new("/nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
