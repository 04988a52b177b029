//! Foundation types for gradlekit.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`FileId`], [`PropertiesId`] - Handles into the session file arenas
//! - [`DslName`] - Quote-normalized DSL identifiers
//!
//! This module has NO dependencies on other gradlekit modules.

mod name;

pub use name::DslName;

/// Handle identifying one parsed DSL file within a session.
///
/// Indexes into the [`BuildModelContext`](crate::project::BuildModelContext)
/// file arena. Ids are only meaningful within the session that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub(crate) u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle identifying one companion properties file within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertiesId(pub(crate) u32);

impl PropertiesId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
