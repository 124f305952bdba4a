//! Diagnostic reporting for composition runs.
//!
//! The [`DiagnosticSink`] is owned by the assembler and passed explicitly to
//! every stage that can report a recoverable problem. It keeps the highest
//! severity seen, which decides the process exit status, and optionally
//! aborts on the first error.

mod warning;

pub use warning::{Diagnostic, DiagnosticKind, Severity};

use crate::error::{ComposeError, Result};

/// Collects diagnostics and tracks the severity watermark.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    watermark: Option<Severity>,
    fail_fast: bool,
}

impl DiagnosticSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that aborts on the first error.
    pub fn fail_fast() -> Self {
        Self {
            fail_fast: true,
            ..Self::default()
        }
    }

    /// Record a diagnostic.
    ///
    /// Returns `Err(ComposeError::Aborted)` when fail-fast is enabled and the
    /// diagnostic is an error.
    pub fn report(&mut self, diagnostic: Diagnostic) -> Result<()> {
        emit(&diagnostic);

        let severity = diagnostic.severity;
        self.watermark = self.watermark.max(Some(severity));

        if self.fail_fast && severity == Severity::Error {
            let err = ComposeError::Aborted {
                code: diagnostic.kind.code(),
                context: diagnostic.context.clone(),
            };
            self.diagnostics.push(diagnostic);
            return Err(err);
        }

        self.diagnostics.push(diagnostic);
        Ok(())
    }

    /// Report a diagnostic of `kind` with its default severity.
    pub fn report_kind(&mut self, kind: DiagnosticKind, context: impl Into<String>) -> Result<()> {
        self.report(Diagnostic::new(kind, context))
    }

    /// Highest severity reported so far.
    pub fn watermark(&self) -> Option<Severity> {
        self.watermark
    }

    /// Check if any error has been reported.
    pub fn has_errors(&self) -> bool {
        self.watermark == Some(Severity::Error)
    }

    /// Process exit status derived from the watermark.
    pub fn exit_code(&self) -> u8 {
        if self.has_errors() {
            1
        } else {
            0
        }
    }

    /// Count errors.
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Count warnings.
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Count diagnostics of a specific kind.
    pub fn count_kind(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    /// Iterate over diagnostics in report order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

fn emit(d: &Diagnostic) {
    let code = d.kind.code();
    let kind = d.kind.name();
    match d.severity {
        Severity::Info => tracing::info!(kind, code, "{}", d.context),
        Severity::Warning => tracing::warn!(kind, code, "{}", d.context),
        Severity::Error => tracing::error!(kind, code, "{}", d.context),
    }
    if let Some(help) = &d.help {
        tracing::debug!(code, "help: {}", help);
    }
}
