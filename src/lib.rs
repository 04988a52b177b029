//! # gradlekit
//!
//! Mutable model layer for Gradle-style build scripts: a lossless syntax
//! tree, an editable element tree, property resolution across files, and
//! minimal-diff write-back.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! apply     → Write-back: text edits, rendering, conflict detection
//!   ↓
//! resolve   → Property resolution across files and scopes
//!   ↓
//! project   → File loading, gradle.properties, module discovery
//!   ↓
//! dsl       → Element tree: blocks, properties, edit states
//!   ↓
//! syntax    → Lossless CST (rowan), lexer, parser, typed AST
//!   ↓
//! base      → Primitives (FileId, DslName)
//! ```

// ============================================================================
// MODULES (dependency order: base → syntax → dsl → project → resolve → apply)
// ============================================================================

/// Foundation types: FileId, PropertiesId, DslName
pub mod base;

/// Syntax: logos lexer, recursive-descent parser, rowan CST, typed AST
pub mod syntax;

/// Element tree: blocks, properties, values, edit-state tracking
pub mod dsl;

/// Project management: file system abstraction, build/settings/properties files
pub mod project;

/// Property resolution: references, interpolation, precedence chain
pub mod resolve;

/// Write-back: minimal text edits, statement rendering, conflict detection
pub mod apply;

// Re-export foundation types
pub use base::{DslName, FileId, PropertiesId};

// Re-export the items most callers need
pub use apply::{apply_all_changes, apply_changes, ApplyError};
pub use dsl::{
    BlockKind, Element, ElementId, ElementKindFilter, ElementState, ElementTree, ExprStyle,
    ExprValue, LiteralValue, Segment,
};
pub use project::{
    BuildModelContext, DslFile, DslFileKind, FileSystem, MemoryFileSystem, OsFileSystem,
    ProjectError,
};
pub use resolve::{resolve, resolve_reference, ResolutionContext, ResolvedValue, UnresolvedReason};
pub use syntax::{parse, Parse, ParseError};
