//! Compile-time configuration, threaded explicitly through `Compiler::new`
//! rather than read from module-level globals.

#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
  /// Compile as if every function had a `"use strict"` directive, even
  /// where none is written.
  pub strict_by_default: bool,
  /// Mirrors the `check-recursion-limit` Cargo feature this workspace's
  /// stack is built around: when set, function compilation tracks
  /// nesting depth and reports `ResourceExhausted` instead of recursing
  /// into the host stack without bound.
  pub check_recursion_limit: bool,
  pub max_compiler_depth: u32,
}

impl Default for CompileOptions {
  fn default() -> Self {
    Self {
      strict_by_default: false,
      check_recursion_limit: true,
      max_compiler_depth: 512,
    }
  }
}
