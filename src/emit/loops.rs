//! `while`/`do-while`/`for`/`for-in`/`for-of` lowering.
//!
//! `for-of` has no dedicated iterator bytecode in this crate's opcode
//! set: the protocol is modeled the way a dynamically-typed host would
//! implement it without VM support, through ordinary property/method
//! ops (`Symbol.iterator`, `.next()`, `.done`, `.value`), with
//! `CleanupIfNotDone` as the one purpose-built instruction for the
//! close-on-early-exit step every other exit path must run.

use wyvern_ast as ast;
use wyvern_span::Span;

use crate::compiler::Compiler;
use crate::chunk::Constant;
use crate::op::{Op, Reg};

use super::destructure::declare_target;
use super::expr::emit_expr;
use super::stmt::{emit_stmt, emit_var_decl};

pub fn emit_while(c: &mut Compiler, label: Option<String>, test: &ast::Expr, body: &ast::Stmt, span: Span) {
  c.push_loop(label, None);
  let index = c.loop_stack_len() - 1;
  let continue_label = c.loop_continue_label(index);
  let break_label = c.loop_break_label(index);
  c.bind_label(continue_label);
  let t = emit_expr(c, test);
  c.emit_jump_if_false(t, break_label, test.span);
  c.free_reg(t);
  emit_stmt(c, body);
  c.emit_jump(continue_label, span);
  c.bind_label(break_label);
  c.pop_loop();
}

pub fn emit_do_while(c: &mut Compiler, label: Option<String>, body: &ast::Stmt, test: &ast::Expr, span: Span) {
  c.push_loop(label, None);
  let index = c.loop_stack_len() - 1;
  let continue_label = c.loop_continue_label(index);
  let break_label = c.loop_break_label(index);
  let start = c.label();
  c.bind_label(start);
  emit_stmt(c, body);
  c.bind_label(continue_label);
  let t = emit_expr(c, test);
  c.emit_jump_if_false(t, break_label, test.span);
  c.free_reg(t);
  c.emit_jump(start, span);
  c.bind_label(break_label);
  c.pop_loop();
}

pub fn emit_for(
  c: &mut Compiler,
  label: Option<String>,
  init: Option<&ast::ForInit>,
  test: Option<&ast::Expr>,
  update: Option<&ast::Expr>,
  body: &ast::Stmt,
  span: Span,
) {
  c.push_scope();
  if let Some(init) = init {
    match init {
      ast::ForInit::Decl(decl) => emit_var_decl(c, decl, span),
      ast::ForInit::Expr(e) => {
        let r = emit_expr(c, e);
        c.free_reg(r);
      }
    }
  }

  c.push_loop(label, None);
  let index = c.loop_stack_len() - 1;
  let continue_label = c.loop_continue_label(index);
  let break_label = c.loop_break_label(index);

  let test_label = c.label();
  c.bind_label(test_label);
  if let Some(test) = test {
    let t = emit_expr(c, test);
    c.emit_jump_if_false(t, break_label, test.span);
    c.free_reg(t);
  }
  emit_stmt(c, body);
  c.bind_label(continue_label);
  if let Some(update) = update {
    let r = emit_expr(c, update);
    c.free_reg(r);
  }
  c.emit_jump(test_label, span);
  c.bind_label(break_label);
  c.pop_loop();
  c.pop_scope();
}

pub fn emit_for_in(
  c: &mut Compiler,
  label: Option<String>,
  decl_kind: Option<ast::DeclKind>,
  target: &ast::AssignTarget,
  object: &ast::Expr,
  body: &ast::Stmt,
  span: Span,
) {
  let obj = emit_expr(c, object);
  let keys = c.alloc_reg();
  c.emit(Op::GetOwnKeys { dst: keys, obj }, span);
  c.free_reg(obj);
  let length_name = c.constant_name("length");
  let len = c.alloc_reg();
  c.emit(Op::GetProp { dst: len, obj: keys, name: length_name }, span);
  let i = c.alloc_reg();
  let zero = c.constant(Constant::Number(0.0));
  c.emit(Op::LoadConst { dst: i, index: zero }, span);

  c.push_loop(label, None);
  let index = c.loop_stack_len() - 1;
  let continue_label = c.loop_continue_label(index);
  let break_label = c.loop_break_label(index);

  let test_label = c.label();
  c.bind_label(test_label);
  let cmp = c.alloc_reg();
  c.emit(Op::Lt { dst: cmp, lhs: i, rhs: len }, span);
  c.emit_jump_if_false(cmp, break_label, span);
  c.free_reg(cmp);

  c.push_scope();
  let key = c.alloc_reg();
  c.emit(Op::GetIndex { dst: key, obj: keys, key: i }, span);
  bind_loop_target(c, decl_kind, target, key, span);
  c.free_reg(key);
  emit_stmt(c, body);
  c.pop_scope();

  c.bind_label(continue_label);
  let one = c.constant(Constant::Number(1.0));
  let one_reg = c.alloc_reg();
  c.emit(Op::LoadConst { dst: one_reg, index: one }, span);
  c.emit(Op::Add { dst: i, lhs: i, rhs: one_reg }, span);
  c.free_reg(one_reg);
  c.emit_jump(test_label, span);
  c.bind_label(break_label);
  c.pop_loop();

  c.free_reg(i);
  c.free_reg(len);
  c.free_reg(keys);
}

pub fn emit_for_of(
  c: &mut Compiler,
  label: Option<String>,
  decl_kind: Option<ast::DeclKind>,
  target: &ast::AssignTarget,
  iterable: &ast::Expr,
  body: &ast::Stmt,
  _is_await: bool,
  span: Span,
) {
  let iterable_reg = emit_expr(c, iterable);
  let iter_base = c.alloc_contiguous(1);
  c.emit(Op::Move { dst: iter_base, src: iterable_reg }, span);
  c.free_reg(iterable_reg);
  let iterator_name = c.constant_name("Symbol.iterator");
  c.emit(Op::CallMethod { base: iter_base, name: iterator_name, argc: 0 }, span);
  let iter = iter_base;

  let done = c.alloc_reg();
  c.emit(Op::LoadFalse { dst: done }, span);

  c.push_loop(label, Some((iter, done)));
  let index = c.loop_stack_len() - 1;
  let continue_label = c.loop_continue_label(index);
  let break_label = c.loop_break_label(index);

  c.bind_label(continue_label);
  let next_base = c.alloc_contiguous(1);
  c.emit(Op::Move { dst: next_base, src: iter }, span);
  let next_name = c.constant_name("next");
  c.emit(Op::CallMethod { base: next_base, name: next_name, argc: 0 }, span);
  let done_name = c.constant_name("done");
  c.emit(Op::GetProp { dst: done, obj: next_base, name: done_name }, span);

  let not_done = c.alloc_reg();
  c.emit(Op::Not { dst: not_done, src: done }, span);
  c.emit_jump_if_false(not_done, break_label, span);
  c.free_reg(not_done);

  let value_name = c.constant_name("value");
  let value = c.alloc_reg();
  c.emit(Op::GetProp { dst: value, obj: next_base, name: value_name }, span);
  c.free_reg(next_base);

  c.push_scope();
  bind_loop_target(c, decl_kind, target, value, span);
  c.free_reg(value);
  emit_stmt(c, body);
  c.pop_scope();

  c.emit_jump(continue_label, span);
  c.bind_label(break_label);
  c.pop_loop();

  // `done` is already true on the natural-exhaustion path that falls
  // through here, so this is a no-op at runtime, but every exit path
  // (not just an explicit `break`) must run the close step.
  c.emit(Op::CleanupIfNotDone { iter, done }, span);
  c.free_reg(done);
  c.free_reg(iter);
}

fn bind_loop_target(c: &mut Compiler, decl_kind: Option<ast::DeclKind>, target: &ast::AssignTarget, value: Reg, span: Span) {
  match decl_kind {
    Some(kind) => declare_target(c, target, kind, false, value, span),
    None => super::assign::write_target(c, target, value, span),
  }
}
