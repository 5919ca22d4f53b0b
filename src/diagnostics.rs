use log::{error, info, warn};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    MissingIdentifier,
    UnknownContainerType,
    UnknownElementType,
    UnknownField,
    MissingSerializer,
    TypeMismatchOnApply,
    MalformedNode,
    UnresolvedInheritanceTarget,
    CyclicInheritance,
    UnresolvedReference,
    DuplicateIdentifier,
}

/// A recoverable problem found while parsing. Never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{file}:{line}: {severity}: {message}")]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub file: String,
    pub line: usize,
    pub message: String,
}

/// Flat, append-only diagnostic list. Every entry is mirrored to the `log` facade.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => error!("{diagnostic}"),
            Severity::Warning => warn!("{diagnostic}"),
            Severity::Info => info!("{diagnostic}"),
        }
        self.entries.push(diagnostic);
    }

    pub fn report(
        &mut self,
        severity: Severity,
        kind: DiagnosticKind,
        file: &str,
        line: usize,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            severity,
            kind,
            file: file.to_string(),
            line,
            message: message.into(),
        });
    }

    pub fn error(&mut self, kind: DiagnosticKind, file: &str, line: usize, message: impl Into<String>) {
        self.report(Severity::Error, kind, file, line, message);
    }

    pub fn warning(&mut self, kind: DiagnosticKind, file: &str, line: usize, message: impl Into<String>) {
        self.report(Severity::Warning, kind, file, line, message);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
