//! Information about source files and positions within them.

/// Identifies the origin of parsed input.
#[derive(Clone, Debug, Default)]
pub struct SourceInfo {
    /// A display name for the source (a file path, or something like
    /// `<stdin>` or `<command string>`).
    pub source: String,
}

impl SourceInfo {
    /// Returns a new `SourceInfo` with the given display name.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// A position within a source.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SourcePosition {
    /// 1-based line number.
    pub line: u32,
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}", self.line)
    }
}
