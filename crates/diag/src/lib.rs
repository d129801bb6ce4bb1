//! Diagnostic accumulation for the code generator.
//!
//! Compilation does not abort on the first error: the compiler keeps
//! emitting plausible bytecode for the rest of the program and collects
//! every diagnostic it encounters along the way, so a single `compile`
//! call can report many problems at once.

use std::fmt;

use wyvern_span::{LineMap, Span};

/// Coarse classification of why compilation failed, used by tests and by
/// callers that want to react differently to different failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
  InvalidAssignmentTarget,
  UnsupportedConstruct,
  ResourceExhausted,
  OffsetOverflow,
  StrictModeViolation,
  SymbolTableInconsistency,
  SemanticError,
}

impl fmt::Display for DiagnosticKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      DiagnosticKind::InvalidAssignmentTarget => "invalid assignment target",
      DiagnosticKind::UnsupportedConstruct => "unsupported construct",
      DiagnosticKind::ResourceExhausted => "resource exhausted",
      DiagnosticKind::OffsetOverflow => "offset overflow",
      DiagnosticKind::StrictModeViolation => "strict mode violation",
      DiagnosticKind::SymbolTableInconsistency => "internal error",
      DiagnosticKind::SemanticError => "semantic error",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
  pub span: Span,
  pub kind: DiagnosticKind,
  pub message: String,
}

impl Diagnostic {
  pub fn new(kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
    Self {
      span,
      kind,
      message: message.into(),
    }
  }

  /// Render a single diagnostic against the original source, in the
  /// `line:col: kind: message` shape used throughout this toolchain's
  /// test snapshots.
  pub fn report(&self, src: &str) -> String {
    let map = LineMap::new(src);
    let line = map.line(self.span.lo);
    format!("{}: {}: {}", line, self.kind, self.message)
  }
}

/// Accumulates diagnostics during a single compilation.
#[derive(Debug, Default)]
pub struct Diagnostics {
  items: Vec<Diagnostic>,
}

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
    self.items.push(Diagnostic::new(kind, span, message));
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
    self.items.iter()
  }

  pub fn into_vec(self) -> Vec<Diagnostic> {
    self.items
  }

  pub fn report(&self, src: &str) -> String {
    self
      .items
      .iter()
      .map(|d| d.report(src))
      .collect::<Vec<_>>()
      .join("\n")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accumulates_in_order() {
    let mut diags = Diagnostics::new();
    diags.push(DiagnosticKind::SemanticError, Span::new(0, 1), "first");
    diags.push(DiagnosticKind::UnsupportedConstruct, Span::new(2, 3), "second");
    assert_eq!(diags.len(), 2);
    assert_eq!(diags.iter().next().unwrap().message, "first");
  }
}
