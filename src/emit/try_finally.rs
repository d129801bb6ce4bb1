//! `try`/`catch`/`finally` lowering.
//!
//! Exception dispatch itself is table-driven (`Chunk::exception_table`),
//! the same way this crate defers jump-target *encoding* to a real
//! encoder elsewhere: the protected range and its handler entry points
//! are recorded as instruction indices, not represented by bracketing
//! opcodes. Only the *completion routing* a `finally` must perform for a
//! `break`/`continue`/`return` that fires while it is active goes
//! through real instructions (`PushBreak`/`PushContinue`/`ReturnFinally`),
//! via `Compiler::push_finally`/`finally_contexts_between`.

use wyvern_ast as ast;
use wyvern_span::Span;

use crate::compiler::Compiler;
use crate::op::Op;

use super::destructure::declare_target;
use super::stmt::emit_stmt;

pub fn emit_try(c: &mut Compiler, stmt: &ast::TryStmt, span: Span) {
  let finally_label = stmt.finalizer.as_ref().map(|_| c.push_finally());

  let try_start = c.pos();
  c.push_scope();
  for s in &stmt.block {
    emit_stmt(c, s);
  }
  c.pop_scope();
  let try_end = c.pos();

  let after_label = c.label();
  match finally_label {
    Some(label) => c.emit_jump(label, span),
    None => c.emit_jump(after_label, span),
  };

  let catch_target = stmt.handler.as_ref().map(|handler| {
    let pos = c.pos();
    c.push_scope();
    if let Some(param) = &handler.param {
      let dst = c.alloc_reg();
      c.emit(Op::LoadException { dst }, span);
      declare_target(c, param, ast::DeclKind::Let, false, dst, span);
      c.free_reg(dst);
    }
    for s in &handler.body {
      emit_stmt(c, s);
    }
    c.pop_scope();
    match finally_label {
      Some(label) => c.emit_jump(label, span),
      None => c.emit_jump(after_label, span),
    };
    pos
  });

  let finally_target = finally_label.map(|label| {
    let pos = c.pos();
    c.bind_label(label);
    for s in stmt.finalizer.as_ref().unwrap() {
      emit_stmt(c, s);
    }
    c.emit(Op::ReturnFinally, span);
    c.pop_finally();
    pos
  });

  c.bind_label(after_label);

  if catch_target.is_some() || finally_target.is_some() {
    c.record_exception_entry(try_start, try_end, catch_target, finally_target);
  }
}
