//! Quote-normalized DSL names.
//!
//! Build scripts may spell the same logical name three ways: `foo`, `"foo"`
//! and `'foo'`. Lookups and comparisons must treat all three as equal, while
//! write-back must keep the author's original spelling for untouched
//! elements.

use smol_str::SmolStr;

/// A DSL element name, carrying both the source spelling and the
/// quote-stripped form used for lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DslName {
    original: SmolStr,
    normalized: SmolStr,
}

impl DslName {
    /// Creates a name from its source spelling, normalizing quotes and
    /// escape sequences.
    pub fn from_source(original: &str) -> Self {
        Self {
            original: SmolStr::new(original),
            normalized: SmolStr::new(normalize(original)),
        }
    }

    /// Creates a name that was never in the source (for in-memory elements).
    pub fn new(name: &str) -> Self {
        let normalized = normalize(name);
        Self {
            original: SmolStr::new(&normalized),
            normalized: SmolStr::new(normalized),
        }
    }

    /// The spelling as it appeared in the source (quotes included).
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The quote-stripped form used for lookup and comparison.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Whether this name matches another spelling after normalization.
    pub fn matches(&self, other: &str) -> bool {
        self.normalized == normalize(other)
    }

    /// Renders the name for newly written syntax: bare if it is a valid
    /// identifier path, single-quoted otherwise.
    pub fn render(&self) -> String {
        if is_identifier_path(&self.normalized) {
            self.normalized.to_string()
        } else {
            format!("'{}'", self.normalized.replace('\'', "\\'"))
        }
    }
}

impl std::fmt::Display for DslName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalized)
    }
}

/// Strips matching outer quotes and resolves simple escapes.
fn normalize(name: &str) -> String {
    let inner = match name.as_bytes() {
        [b'"', .., b'"'] | [b'\'', .., b'\''] if name.len() >= 2 => &name[1..name.len() - 1],
        _ => name,
    };
    if !inner.contains('\\') {
        return inner.to_string();
    }
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(esc) => out.push(esc),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// True when `name` is a dotted path of plain identifiers (`foo`, `ext.foo`).
fn is_identifier_path(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) if unicode_ident::is_xid_start(first) || first == '_' => {
                    chars.all(|c| unicode_ident::is_xid_continue(c))
                }
                _ => false,
            }
        })
}
