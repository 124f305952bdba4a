//! Diagnostic types for composition results.

use std::fmt;

/// Severity level for a diagnostic.
///
/// Ordered so the sink can keep a high-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
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

/// The recoverable problem kinds a composition run can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A sprite PNG does not match its sheet's sprite size.
    WrongSpriteDimensions,
    /// Two main-sheet sprites share a root name.
    DuplicateSpriteName,
    /// A filler sprite or entry is shadowed by an earlier definition.
    ObsoleteFiller,
    /// Two main-sheet entries define the same id.
    DuplicateId,
    /// A tile entry references a sprite name that has no PNG.
    MissingSprite,
    /// A sprite was registered but never referenced.
    UnreferencedSprite,
    /// A tile entry has no id or no layers and was skipped.
    SkipEmptyEntry,
    /// A sheet directory yielded no sprites.
    EmptySheet,
}

impl DiagnosticKind {
    /// Default severity when this kind is reported.
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::WrongSpriteDimensions
            | DiagnosticKind::DuplicateSpriteName
            | DiagnosticKind::DuplicateId
            | DiagnosticKind::MissingSprite => Severity::Error,
            DiagnosticKind::ObsoleteFiller | DiagnosticKind::UnreferencedSprite => {
                Severity::Warning
            }
            DiagnosticKind::SkipEmptyEntry | DiagnosticKind::EmptySheet => Severity::Info,
        }
    }

    /// Variant name, used as a structured log field.
    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticKind::WrongSpriteDimensions => "WrongSpriteDimensions",
            DiagnosticKind::DuplicateSpriteName => "DuplicateSpriteName",
            DiagnosticKind::ObsoleteFiller => "ObsoleteFiller",
            DiagnosticKind::DuplicateId => "DuplicateId",
            DiagnosticKind::MissingSprite => "MissingSprite",
            DiagnosticKind::UnreferencedSprite => "UnreferencedSprite",
            DiagnosticKind::SkipEmptyEntry => "SkipEmptyEntry",
            DiagnosticKind::EmptySheet => "EmptySheet",
        }
    }

    /// Machine-readable code, e.g. `compose::missing-sprite`.
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::WrongSpriteDimensions => "compose::wrong-sprite-dimensions",
            DiagnosticKind::DuplicateSpriteName => "compose::duplicate-sprite-name",
            DiagnosticKind::ObsoleteFiller => "compose::obsolete-filler",
            DiagnosticKind::DuplicateId => "compose::duplicate-id",
            DiagnosticKind::MissingSprite => "compose::missing-sprite",
            DiagnosticKind::UnreferencedSprite => "compose::unreferenced-sprite",
            DiagnosticKind::SkipEmptyEntry => "compose::skip-empty-entry",
            DiagnosticKind::EmptySheet => "compose::empty-sheet",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single reported diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: Severity,
    /// What went wrong.
    pub kind: DiagnosticKind,
    /// Human-readable context (file, sprite or id involved).
    pub context: String,
    /// Optional help text suggesting how to fix the issue.
    pub help: Option<String>,
}

impl Diagnostic {
    /// Create a diagnostic with the kind's default severity.
    pub fn new(kind: DiagnosticKind, context: impl Into<String>) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            context: context.into(),
            help: None,
        }
    }

    /// Override the severity (e.g. downgrade to an advisory).
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Add help text to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.kind.code(), self.context)
    }
}
