//! Thin error-handling glue over `wyvern_diag`.
//!
//! Most lowering functions do not return `Result` at all: per the
//! recovery model, a failure pushes a diagnostic and the caller gets a
//! sentinel register back so it can keep emitting plausible code for the
//! rest of the program. `Result` is reserved for the handful of places
//! that truly cannot continue — jump offset overflow while patching, and
//! symbol-table inconsistencies, which are bugs rather than user errors.

pub use wyvern_diag::{Diagnostic, DiagnosticKind, Diagnostics};

pub type Result<T> = std::result::Result<T, Diagnostic>;
