//! The session coordinator.
//!
//! [`BuildModelContext`] owns every DSL file participating in one logical
//! project session: the root build file, per-module build files, the
//! settings file, and companion properties files. Files live in an arena
//! and are handed out as [`FileId`]s, so exactly one in-memory instance
//! exists per underlying file per session and every model sees the same
//! edits before `apply_changes`.

use super::fs::FileSystem;
use super::properties::PropertiesFile;
use crate::base::{FileId, PropertiesId};
use crate::dsl::{ElementPayload, ElementTree, ExprValue, LiteralValue, build_tree};
use crate::syntax::ast::{AstNode, SourceFile};
use crate::syntax::{Parse, ParseError, parse};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Conventional file names.
pub const BUILD_FILE_NAME: &str = "build.gradle";
pub const SETTINGS_FILE_NAME: &str = "settings.gradle";
pub const PROPERTIES_FILE_NAME: &str = "gradle.properties";

/// What role a DSL file plays in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DslFileKind {
    Build,
    Settings,
}

/// One parsed DSL document: source snapshot, lossless CST, and the mutable
/// element tree, plus non-owning links to its resolution-context
/// dependencies.
#[derive(Debug)]
pub struct DslFile {
    pub path: PathBuf,
    pub kind: DslFileKind,
    text: String,
    parse: Parse,
    pub tree: ElementTree,
    /// Companion properties file, associated once at creation.
    pub properties: Option<PropertiesId>,
    /// Parent-module build file for inherited configuration.
    pub parent_module: Option<FileId>,
}

impl DslFile {
    /// The source text snapshot this file's anchors refer to.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn syntax(&self) -> crate::syntax::SyntaxNode {
        self.parse.syntax()
    }

    /// Replaces the file contents, rebuilding the CST and element tree.
    /// All outstanding [`crate::dsl::ElementId`]s are invalidated.
    pub(crate) fn replace_text(&mut self, text: String) -> Result<(), Vec<ParseError>> {
        let parsed = parse(&text);
        if !parsed.ok() {
            return Err(parsed.errors);
        }
        let source = SourceFile::cast(parsed.syntax()).expect("root node is always a SourceFile");
        self.tree = build_tree(&source);
        self.parse = parsed;
        self.text = text;
        Ok(())
    }
}

/// Structural errors from the coordinator. Value-level conditions
/// (missing files, unresolved references) are not errors.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} has {} syntax error(s), first: {}", path.display(), errors.len(), errors[0])]
    Parse {
        path: PathBuf,
        errors: Vec<ParseError>,
    },
}

/// Session-wide coordinator and file cache.
///
/// All mutation goes through `&mut self`, so lookup-or-create is atomic
/// with respect to the single-writer-per-file invariant: the same path can
/// never yield two live instances within one session.
pub struct BuildModelContext {
    fs: Box<dyn FileSystem>,
    files: Vec<DslFile>,
    properties: Vec<PropertiesFile>,
    by_path: FxHashMap<PathBuf, FileId>,
    properties_by_path: FxHashMap<PathBuf, Option<PropertiesId>>,
    root_project_file: Option<FileId>,
    /// Externally injected bindings, last in every resolution chain.
    global_properties: IndexMap<String, String>,
}

impl BuildModelContext {
    pub fn new(fs: Box<dyn FileSystem>) -> Self {
        Self {
            fs,
            files: Vec::new(),
            properties: Vec::new(),
            by_path: FxHashMap::default(),
            properties_by_path: FxHashMap::default(),
            root_project_file: None,
            global_properties: IndexMap::new(),
        }
    }

    pub fn fs(&self) -> &dyn FileSystem {
        &*self.fs
    }

    // =========================================================================
    // File cache
    // =========================================================================

    /// Looks up or parses the build file at `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist: absence is a normal
    /// configuration state. Parse failures are structural errors and the
    /// file is not cached, so a later call retries after the text changes.
    pub fn get_or_create_build_file(
        &mut self,
        path: &Path,
    ) -> Result<Option<FileId>, ProjectError> {
        self.get_or_create_file(path, DslFileKind::Build)
    }

    /// Looks up or parses the settings file at `path`.
    pub fn get_or_create_settings_file(
        &mut self,
        path: &Path,
    ) -> Result<Option<FileId>, ProjectError> {
        self.get_or_create_file(path, DslFileKind::Settings)
    }

    fn get_or_create_file(
        &mut self,
        path: &Path,
        kind: DslFileKind,
    ) -> Result<Option<FileId>, ProjectError> {
        if let Some(&id) = self.by_path.get(path) {
            return Ok(Some(id));
        }
        if !self.fs.exists(path) {
            debug!(path = %path.display(), "requested file does not exist");
            return Ok(None);
        }
        let text = self.fs.read_file(path).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = parse(&text);
        if !parsed.ok() {
            warn!(
                path = %path.display(),
                errors = parsed.errors.len(),
                "build file failed to parse"
            );
            return Err(ProjectError::Parse {
                path: path.to_path_buf(),
                errors: parsed.errors,
            });
        }
        let source = SourceFile::cast(parsed.syntax()).expect("root node is always a SourceFile");
        let tree = build_tree(&source);
        debug!(
            path = %path.display(),
            elements = tree.len(),
            "parsed build file"
        );

        let properties = self.associate_properties_file(path);
        let parent_module = self
            .root_project_file
            .filter(|&root| self.files[root.index()].path != path);

        let id = FileId(self.files.len() as u32);
        self.files.push(DslFile {
            path: path.to_path_buf(),
            kind,
            text,
            parse: parsed,
            tree,
            properties,
            parent_module,
        });
        self.by_path.insert(path.to_path_buf(), id);
        Ok(Some(id))
    }

    /// Registers an already-created file under an additional path so other
    /// files in the session can discover it (e.g. a composite-build root).
    pub fn put_build_file(&mut self, url: PathBuf, file: FileId) {
        self.by_path.insert(url, file);
    }

    /// Marks `file` as the root project build file; files created later
    /// link to it as their parent module.
    pub fn set_root_project_file(&mut self, file: FileId) {
        self.root_project_file = Some(file);
    }

    pub fn root_project_file(&self) -> Option<FileId> {
        self.root_project_file
    }

    pub fn file(&self, id: FileId) -> &DslFile {
        &self.files[id.index()]
    }

    pub fn file_mut(&mut self, id: FileId) -> &mut DslFile {
        &mut self.files[id.index()]
    }

    /// Every file requested so far, in creation order.
    pub fn all_files(&self) -> impl Iterator<Item = FileId> + '_ {
        (0..self.files.len() as u32).map(FileId)
    }

    /// Invalidates all cached instances; the next access reparses from the
    /// file system. All outstanding ids become invalid.
    pub fn reset(&mut self) {
        debug!(files = self.files.len(), "resetting session cache");
        self.files.clear();
        self.properties.clear();
        self.by_path.clear();
        self.properties_by_path.clear();
        self.root_project_file = None;
    }

    // =========================================================================
    // Properties files
    // =========================================================================

    /// Associates the sibling `gradle.properties`, resolved once per build
    /// file rather than per lookup.
    fn associate_properties_file(&mut self, build_file: &Path) -> Option<PropertiesId> {
        let dir = build_file.parent()?;
        let candidate = self.fs.find_file(dir, &|p| {
            p.file_name().is_some_and(|n| n == PROPERTIES_FILE_NAME)
        })?;
        self.get_or_create_properties_file(&candidate)
    }

    /// Looks up or parses a properties file; `None` when absent or
    /// unreadable (absence is normal).
    pub fn get_or_create_properties_file(&mut self, path: &Path) -> Option<PropertiesId> {
        if let Some(&cached) = self.properties_by_path.get(path) {
            return cached;
        }
        let loaded = self.fs.read_file(path).ok().map(|text| {
            let id = PropertiesId(self.properties.len() as u32);
            self.properties
                .push(PropertiesFile::parse(path.to_path_buf(), &text));
            id
        });
        self.properties_by_path.insert(path.to_path_buf(), loaded);
        loaded
    }

    pub fn properties_file(&self, id: PropertiesId) -> &PropertiesFile {
        &self.properties[id.index()]
    }

    // =========================================================================
    // Injected globals
    // =========================================================================

    /// Adds an externally supplied binding, consulted after every file-level
    /// source in the resolution chain.
    pub fn inject_global_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.global_properties.insert(key.into(), value.into());
    }

    pub fn global_property(&self, key: &str) -> Option<&str> {
        self.global_properties.get(key).map(String::as_str)
    }

    // =========================================================================
    // Project layout discovery
    // =========================================================================

    /// The settings file next to the root build file, if both exist.
    pub fn settings_file(&mut self) -> Result<Option<FileId>, ProjectError> {
        let Some(root) = self.root_project_file else {
            return Ok(None);
        };
        let Some(dir) = self.files[root.index()].path.parent().map(Path::to_path_buf) else {
            return Ok(None);
        };
        self.get_or_create_settings_file(&dir.join(SETTINGS_FILE_NAME))
    }

    /// Module paths declared by `include` statements in a settings file
    /// (`include ':app', ':lib'`), in declaration order.
    pub fn module_paths(&self, settings: FileId) -> Vec<String> {
        let file = self.file(settings);
        let tree = &file.tree;
        let mut out = Vec::new();
        for child in tree.children(tree.root()) {
            let element = tree.get(child);
            if !element.is_live() || !element.name.matches("include") {
                continue;
            }
            if let ElementPayload::Expr(expr) = &element.payload {
                if let ExprValue::Call { args, .. } = &expr.value {
                    for &arg in args {
                        if let Some(e) = tree.get(arg).as_expr() {
                            if let ExprValue::Literal(LiteralValue::Str(s)) = &e.value {
                                out.push(s.clone());
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Directory of a `:module:path` relative to the root project.
    pub fn module_directory(&self, module_path: &str) -> Option<PathBuf> {
        let root = self.root_project_file?;
        let mut dir = self.files[root.index()].path.parent()?.to_path_buf();
        for segment in module_path.split(':').filter(|s| !s.is_empty()) {
            dir.push(segment);
        }
        Some(dir)
    }

    /// Build files of all included modules, discovered through the settings
    /// file. The root build file itself is not repeated.
    pub fn all_module_build_files(&mut self) -> Result<Vec<FileId>, ProjectError> {
        let Some(settings) = self.settings_file()? else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for module_path in self.module_paths(settings) {
            if module_path == ":" {
                continue;
            }
            let Some(dir) = self.module_directory(&module_path) else {
                continue;
            };
            if let Some(id) = self.get_or_create_build_file(&dir.join(BUILD_FILE_NAME))? {
                out.push(id);
            }
        }
        Ok(out)
    }
}

impl std::fmt::Debug for BuildModelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildModelContext")
            .field("files", &self.files.len())
            .field("properties", &self.properties.len())
            .field("root_project_file", &self.root_project_file)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::MemoryFileSystem;

    fn context_with(files: &[(&str, &str)]) -> BuildModelContext {
        let fs = MemoryFileSystem::new();
        for (path, text) in files {
            fs.insert(*path, *text);
        }
        BuildModelContext::new(Box::new(fs))
    }

    #[test]
    fn same_path_yields_the_same_instance() {
        let mut ctx = context_with(&[("/p/build.gradle", "a = 1\n")]);
        let first = ctx
            .get_or_create_build_file(Path::new("/p/build.gradle"))
            .unwrap()
            .unwrap();
        let second = ctx
            .get_or_create_build_file(Path::new("/p/build.gradle"))
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_is_absent_not_an_error() {
        let mut ctx = context_with(&[]);
        let result = ctx
            .get_or_create_build_file(Path::new("/nope/build.gradle"))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn malformed_file_is_a_parse_error_and_not_cached() {
        let mut ctx = context_with(&[("/p/build.gradle", "foo = = 1\n")]);
        let err = ctx
            .get_or_create_build_file(Path::new("/p/build.gradle"))
            .unwrap_err();
        assert!(matches!(err, ProjectError::Parse { .. }));
        // A retry still goes through the parse path rather than a cache.
        assert!(
            ctx.get_or_create_build_file(Path::new("/p/build.gradle"))
                .is_err()
        );
    }

    #[test]
    fn sibling_properties_file_is_associated_once() {
        let mut ctx = context_with(&[
            ("/p/build.gradle", "a = 1\n"),
            ("/p/gradle.properties", "version=3\n"),
        ]);
        let id = ctx
            .get_or_create_build_file(Path::new("/p/build.gradle"))
            .unwrap()
            .unwrap();
        let props = ctx.file(id).properties.expect("properties associated");
        assert_eq!(ctx.properties_file(props).get("version"), Some("3"));
    }

    #[test]
    fn module_files_link_to_the_root_project() {
        let mut ctx = context_with(&[
            ("/p/build.gradle", "ext.shared = 'root'\n"),
            ("/p/app/build.gradle", "b = 2\n"),
        ]);
        let root = ctx
            .get_or_create_build_file(Path::new("/p/build.gradle"))
            .unwrap()
            .unwrap();
        ctx.set_root_project_file(root);
        let module = ctx
            .get_or_create_build_file(Path::new("/p/app/build.gradle"))
            .unwrap()
            .unwrap();
        assert_eq!(ctx.file(module).parent_module, Some(root));
        assert_eq!(ctx.file(root).parent_module, None);
    }

    #[test]
    fn put_build_file_registers_an_alias_path() {
        let mut ctx = context_with(&[("/p/build.gradle", "a = 1\n")]);
        let id = ctx
            .get_or_create_build_file(Path::new("/p/build.gradle"))
            .unwrap()
            .unwrap();
        ctx.put_build_file(PathBuf::from("/composite/build.gradle"), id);
        // The alias resolves from the cache; no file exists at that path.
        let via_alias = ctx
            .get_or_create_build_file(Path::new("/composite/build.gradle"))
            .unwrap()
            .unwrap();
        assert_eq!(via_alias, id);
    }

    #[test]
    fn reset_forces_reparse() {
        let mut ctx = context_with(&[("/p/build.gradle", "a = 1\n")]);
        let first = ctx
            .get_or_create_build_file(Path::new("/p/build.gradle"))
            .unwrap()
            .unwrap();
        ctx.reset();
        let second = ctx
            .get_or_create_build_file(Path::new("/p/build.gradle"))
            .unwrap()
            .unwrap();
        // Fresh arena after reset; the id happens to restart from zero.
        assert_eq!(first.index(), second.index());
        assert_eq!(ctx.all_files().count(), 1);
    }

    #[test]
    fn settings_include_enumeration() {
        let mut ctx = context_with(&[
            ("/p/build.gradle", "x = 1\n"),
            ("/p/settings.gradle", "include ':app', ':lib'\n"),
            ("/p/app/build.gradle", "a = 1\n"),
            ("/p/lib/build.gradle", "b = 2\n"),
        ]);
        let root = ctx
            .get_or_create_build_file(Path::new("/p/build.gradle"))
            .unwrap()
            .unwrap();
        ctx.set_root_project_file(root);
        let modules = ctx.all_module_build_files().unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(ctx.file(modules[0]).path, Path::new("/p/app/build.gradle"));
    }
}
