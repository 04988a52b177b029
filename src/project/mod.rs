//! Project session management: the file cache, cross-file discovery, and
//! the file-system collaborator seam.

mod context;
mod fs;
mod properties;

pub use context::{
    BUILD_FILE_NAME, BuildModelContext, DslFile, DslFileKind, PROPERTIES_FILE_NAME, ProjectError,
    SETTINGS_FILE_NAME,
};
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use properties::PropertiesFile;
