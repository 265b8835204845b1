use std::fmt;

use serde::Serialize;

/// A position inside one input source.
///
/// `line` and `column` count from 1; a line of 0 means only the file is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Pos {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Position naming only the file.
    pub fn file(file: impl Into<String>) -> Self {
        Self::new(file, 0, 0)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        } else {
            write!(f, "{}", self.file)
        }
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pass that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Source,
    Resolve,
    Unique,
    Roles,
    Recursion,
    Search,
    Aliases,
    Diff,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Source => "source",
            Channel::Resolve => "resolve",
            Channel::Unique => "unique",
            Channel::Roles => "roles",
            Channel::Recursion => "recursion",
            Channel::Search => "search",
            Channel::Aliases => "aliases",
            Channel::Diff => "diff",
        }
    }
}

/// Structured message with severity, origin and optional positions.
///
/// `related` is only set by the schema diff, where `pos` is the old
/// declaration and `related` the new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub channel: Channel,
    pub pos: Option<Pos>,
    pub related: Option<Pos>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        channel: Channel,
        pos: Option<&Pos>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            channel,
            pos: pos.cloned(),
            related: None,
            message: message.into(),
        }
    }

    pub fn warning(channel: Channel, pos: &Pos, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, channel, Some(pos), message)
    }

    pub fn error(channel: Channel, pos: &Pos, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, channel, Some(pos), message)
    }

    /// Attach the second position of an old/new comparison.
    pub fn with_related(mut self, related: &Pos) -> Self {
        self.related = Some(related.clone());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity >= Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.pos, &self.related) {
            (Some(old), Some(new)) => write!(f, "{old} -> {new}: ")?,
            (Some(pos), None) => write!(f, "{pos}: ")?,
            (None, _) => {}
        }
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Ordered accumulator of diagnostics across passes.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Returns true when there are no errors (warnings are allowed).
    pub fn is_ok(&self) -> bool {
        !self.items.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn has_fatal(&self) -> bool {
        self.items
            .iter()
            .any(|diag| diag.severity == Severity::Fatal)
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn push_warning(&mut self, channel: Channel, pos: &Pos, message: impl Into<String>) {
        self.push(Diagnostic::warning(channel, pos, message));
    }

    pub fn push_error(&mut self, channel: Channel, pos: &Pos, message: impl Into<String>) {
        self.push(Diagnostic::error(channel, pos, message));
    }

    /// Merge another set of diagnostics into this one, keeping order.
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|diag| diag.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|diag| diag.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Count of errors raised by one pass.
    pub fn errors_in(&self, channel: Channel) -> usize {
        self.errors().filter(|diag| diag.channel == channel).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_positioned_message() {
        let pos = Pos::new("db.json", 3, 7);
        let diag = Diagnostic::error(Channel::Search, &pos, "LIKE operator on non-textual field");
        assert_eq!(
            diag.to_string(),
            "db.json:3:7: error: LIKE operator on non-textual field"
        );
    }

    #[test]
    fn formats_file_only_and_positionless_messages() {
        let diag = Diagnostic::warning(Channel::Roles, &Pos::file("db.json"), "no roles");
        assert_eq!(diag.to_string(), "db.json: warning: no roles");

        let diag = Diagnostic::new(
            Severity::Error,
            Channel::Resolve,
            None,
            "no structures in configuration",
        );
        assert_eq!(diag.to_string(), "error: no structures in configuration");
    }

    #[test]
    fn formats_two_position_message() {
        let old = Pos::new("old.json", 1, 2);
        let new = Pos::new("new.json", 3, 4);
        let diag = Diagnostic::error(Channel::Diff, &old, "type change").with_related(&new);
        assert_eq!(
            diag.to_string(),
            "old.json:1:2 -> new.json:3:4: error: type change"
        );
    }

    #[test]
    fn warnings_do_not_fail() {
        let pos = Pos::file("a.json");
        let mut diags = Diagnostics::default();
        diags.push_warning(Channel::Search, &pos, "ambiguous");
        assert!(diags.is_ok());

        let mut other = Diagnostics::default();
        other.push_error(Channel::Unique, &pos, "duplicate");
        diags.merge(other);
        assert!(!diags.is_ok());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.errors_in(Channel::Unique), 1);
    }
}
