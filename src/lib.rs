//! Bytecode code generator: walks a checked AST and produces a `Chunk`
//! per function, ready for a register-based VM this crate does not
//! itself implement.

pub mod chunk;
pub mod compiler;
pub mod emit;
pub mod error;
pub mod op;
pub mod options;
pub mod regalloc;
pub mod symtab;

pub use chunk::{Chunk, Constant, ExceptionEntry, FunctionFlags};
pub use error::{Diagnostic, DiagnosticKind};
pub use op::{Op, Reg};
pub use options::CompileOptions;

use compiler::Compiler;

/// Compiles a checked module into its top-level `Chunk` (named
/// `"<main>"`), with every nested function reachable through its
/// constant pool. Never panics on malformed input: failures accumulate
/// as diagnostics and compilation keeps going so a single call can
/// report everything wrong with a program at once.
pub fn compile(module: &wyvern_ast::Module, options: CompileOptions) -> Result<Chunk, Vec<Diagnostic>> {
  let flags = FunctionFlags {
    is_strict: options.strict_by_default || module.is_strict,
    ..Default::default()
  };
  let mut options = options;
  options.strict_by_default = flags.is_strict;

  let mut c = Compiler::new(options);
  emit::stmt::emit_block(&mut c, &module.body);
  c.emit(op::Op::ReturnUndefined, wyvern_span::Span::empty());

  let (chunk, _upvalues) = match c.pop_function() {
    Ok(pair) => pair,
    Err(diag) => {
      c.diagnostics.push(diag.kind, diag.span, diag.message);
      return Err(c.diagnostics.into_vec());
    }
  };

  if c.diagnostics.is_empty() {
    Ok(chunk)
  } else {
    Err(c.diagnostics.into_vec())
  }
}

#[cfg(test)]
mod tests;
