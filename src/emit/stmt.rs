//! Statement lowering: declarations, control flow, and completion
//! dispatch (`break`/`continue`/`return`) through active loops and
//! `finally` blocks.

use wyvern_ast as ast;
use wyvern_diag::DiagnosticKind;
use wyvern_span::Span;

use crate::compiler::Compiler;
use crate::op::Op;

use super::destructure::declare_target;
use super::expr::emit_expr;

pub fn emit_block(c: &mut Compiler, body: &[ast::Stmt]) {
  for stmt in body {
    emit_stmt(c, stmt);
  }
}

pub fn emit_stmt(c: &mut Compiler, stmt: &ast::Stmt) {
  match &stmt.node {
    ast::StmtKind::VarDecl(decl) => emit_var_decl(c, decl, stmt.span),
    ast::StmtKind::Expr(e) => {
      let r = emit_expr(c, e);
      c.free_reg(r);
    }
    ast::StmtKind::Block(body) => {
      c.push_scope();
      emit_block(c, body);
      c.pop_scope();
    }
    ast::StmtKind::Empty => {}
    ast::StmtKind::If {
      test,
      consequent,
      alternate,
    } => emit_if(c, test, consequent, alternate.as_deref(), stmt.span),
    ast::StmtKind::While { test, body } => super::loops::emit_while(c, None, test, body, stmt.span),
    ast::StmtKind::DoWhile { body, test } => super::loops::emit_do_while(c, None, body, test, stmt.span),
    ast::StmtKind::For {
      init,
      test,
      update,
      body,
    } => super::loops::emit_for(c, None, init.as_ref(), test.as_ref(), update.as_ref(), body, stmt.span),
    ast::StmtKind::ForIn {
      decl_kind,
      target,
      object,
      body,
    } => super::loops::emit_for_in(c, None, *decl_kind, target, object, body, stmt.span),
    ast::StmtKind::ForOf {
      decl_kind,
      target,
      iterable,
      body,
      is_await,
    } => super::loops::emit_for_of(c, None, *decl_kind, target, iterable, body, *is_await, stmt.span),
    ast::StmtKind::Switch { discriminant, cases } => super::switch::emit_switch(c, None, discriminant, cases, stmt.span),
    ast::StmtKind::Return(value) => emit_return(c, value.as_ref(), stmt.span),
    ast::StmtKind::Break(label) => emit_break(c, label.as_ref(), stmt.span),
    ast::StmtKind::Continue(label) => emit_continue(c, label.as_ref(), stmt.span),
    ast::StmtKind::Labeled { label, body } => emit_labeled(c, label, body, stmt.span),
    ast::StmtKind::Try(try_stmt) => super::try_finally::emit_try(c, try_stmt, stmt.span),
    ast::StmtKind::Throw(e) => {
      let v = emit_expr(c, e);
      c.emit(Op::Throw { src: v }, stmt.span);
      c.free_reg(v);
    }
    ast::StmtKind::With { object, body } => emit_with(c, object, body, stmt.span),
    ast::StmtKind::FunctionDecl(func) => super::function::emit_function_decl(c, func, stmt.span),
    ast::StmtKind::ClassDecl(class) => super::function::emit_class_decl(c, class, stmt.span),
  }
}

pub(super) fn emit_var_decl(c: &mut Compiler, decl: &ast::VarDecl, span: Span) {
  let tdz = !matches!(decl.kind, ast::DeclKind::Var);
  for declarator in &decl.declarators {
    if tdz {
      if let ast::AssignTarget::Ident(ident) = &declarator.target {
        emit_tdz_ident_decl(c, ident.as_str(), decl.kind, declarator.init.as_ref(), span);
        continue;
      }
    }
    match &declarator.init {
      Some(init) => {
        let v = emit_expr(c, init);
        declare_target(c, &declarator.target, decl.kind, tdz, v, span);
        c.free_reg(v);
      }
      None => {
        let v = c.alloc_reg();
        c.emit(Op::LoadUndefined { dst: v }, span);
        declare_target(c, &declarator.target, decl.kind, tdz, v, span);
        c.free_reg(v);
      }
    }
  }
}

/// `let`/`const x = init` binds a plain identifier: the register is
/// reserved and poisoned with the TDZ sentinel *before* `init` compiles,
/// so a self-reference (`let x = x`) sees the sentinel rather than
/// whatever happened to be left in the register, and any runtime read
/// that reaches this register ahead of the store below gets the same
/// fault regardless of where in the source it's textually compiled.
fn emit_tdz_ident_decl(c: &mut Compiler, name: &str, kind: ast::DeclKind, init: Option<&ast::Expr>, span: Span) {
  let site = c.define_binding(name, kind, true);
  emit_load_uninitialized(c, site, span);
  let v = match init {
    Some(init) => emit_expr(c, init),
    None => {
      let v = c.alloc_reg();
      c.emit(Op::LoadUndefined { dst: v }, span);
      v
    }
  };
  store_site(c, site, v, span);
  c.free_reg(v);
  c.initialize_tdz(name);
}

fn emit_load_uninitialized(c: &mut Compiler, site: crate::compiler::BindingSite, span: Span) {
  use crate::compiler::BindingSite;
  match site {
    BindingSite::Register(reg) => c.emit(Op::LoadUninitialized { dst: reg }, span),
    BindingSite::Spill(slot) => {
      let scratch = c.alloc_reg();
      c.emit(Op::LoadUninitialized { dst: scratch }, span);
      c.emit(Op::StoreSpill { slot: slot as u16, src: scratch }, span);
      c.free_reg(scratch);
    }
    BindingSite::Global(_) => {}
  }
}

fn emit_if(c: &mut Compiler, test: &ast::Expr, consequent: &ast::Stmt, alternate: Option<&ast::Stmt>, span: Span) {
  let t = emit_expr(c, test);
  match alternate {
    None => {
      let end = c.label();
      c.emit_jump_if_false(t, end, test.span);
      c.free_reg(t);
      emit_stmt(c, consequent);
      c.bind_label(end);
    }
    Some(alt) => {
      let [alt_label, end] = c.labels::<2>();
      c.emit_jump_if_false(t, alt_label, test.span);
      c.free_reg(t);
      emit_stmt(c, consequent);
      c.emit_jump(end, span);
      c.bind_label(alt_label);
      emit_stmt(c, alt);
      c.bind_label(end);
    }
  }
}

fn emit_return(c: &mut Compiler, value: Option<&ast::Expr>, span: Span) {
  let finallies = c.finally_contexts_between(None);
  c.emit_cleanups_through(None, span);
  if let Some(&target) = finallies.last() {
    match value {
      Some(e) => {
        let v = emit_expr(c, e);
        c.emit(Op::Return { src: v }, span);
        c.free_reg(v);
      }
      None => c.emit(Op::ReturnUndefined, span),
    };
    c.emit_jump(target, span);
    return;
  }
  match value {
    Some(e) => {
      let v = emit_expr(c, e);
      c.emit(Op::Return { src: v }, span);
      c.free_reg(v);
    }
    None => {
      c.emit(Op::ReturnUndefined, span);
    }
  }
}

fn emit_break(c: &mut Compiler, label: Option<&ast::Ident>, span: Span) {
  let name = label.map(|i| i.as_str());
  let Some(index) = c.find_loop(name) else {
    c.error(
      DiagnosticKind::SemanticError,
      span,
      "break used outside of a loop or labeled statement",
    );
    return;
  };
  let finallies = c.finally_contexts_between(Some(index));
  if let Some(&target) = finallies.last() {
    c.emit_cleanups_including(index, span);
    c.emit(Op::PushBreak { target: loop_target_token(index) }, span);
    c.emit_jump(target, span);
    return;
  }
  c.emit_cleanups_including(index, span);
  let label = c.loop_break_label(index);
  c.emit_jump(label, span);
}

fn emit_continue(c: &mut Compiler, label: Option<&ast::Ident>, span: Span) {
  let name = label.map(|i| i.as_str());
  let Some(index) = c.find_loop(name) else {
    c.error(
      DiagnosticKind::SemanticError,
      span,
      "continue used outside of a loop",
    );
    return;
  };
  if !c.loop_is_loop(index) {
    c.error(
      DiagnosticKind::SemanticError,
      span,
      "continue cannot target a non-loop labeled statement",
    );
    return;
  }
  let finallies = c.finally_contexts_between(Some(index));
  if let Some(&target) = finallies.last() {
    c.emit_cleanups_through(Some(index), span);
    c.emit(Op::PushContinue { target: loop_target_token(index) }, span);
    c.emit_jump(target, span);
    return;
  }
  c.emit_cleanups_through(Some(index), span);
  let label = c.loop_continue_label(index);
  c.emit_jump(label, span);
}

/// `PushBreak`/`PushContinue` record which loop a deferred completion
/// targets by its stack depth at the point of the `break`/`continue` —
/// the finally-resumption dispatch matches this back against the loop
/// depth active when each `finally` block resumes.
fn loop_target_token(index: usize) -> u16 {
  index as u16
}

fn emit_labeled(c: &mut Compiler, label: &ast::Ident, body: &ast::Stmt, span: Span) {
  match &body.node {
    ast::StmtKind::While { test, body } => super::loops::emit_while(c, Some(label.as_str().to_string()), test, body, span),
    ast::StmtKind::DoWhile { body, test } => super::loops::emit_do_while(c, Some(label.as_str().to_string()), body, test, span),
    ast::StmtKind::For {
      init,
      test,
      update,
      body,
    } => super::loops::emit_for(
      c,
      Some(label.as_str().to_string()),
      init.as_ref(),
      test.as_ref(),
      update.as_ref(),
      body,
      span,
    ),
    ast::StmtKind::ForIn {
      decl_kind,
      target,
      object,
      body,
    } => super::loops::emit_for_in(c, Some(label.as_str().to_string()), *decl_kind, target, object, body, span),
    ast::StmtKind::ForOf {
      decl_kind,
      target,
      iterable,
      body,
      is_await,
    } => super::loops::emit_for_of(
      c,
      Some(label.as_str().to_string()),
      *decl_kind,
      target,
      iterable,
      body,
      *is_await,
      span,
    ),
    _ => {
      c.push_labeled_block(label.as_str().to_string());
      emit_stmt(c, body);
      let ctx = c.pop_loop();
      c.bind_label(ctx.break_label);
    }
  }
}

fn emit_with(c: &mut Compiler, object: &ast::Expr, body: &ast::Stmt, span: Span) {
  let obj = emit_expr(c, object);
  c.push_with_scope();
  let site = c.define_binding("#with", ast::DeclKind::Let, false);
  store_site(c, site, obj, span);
  c.free_reg(obj);
  emit_stmt(c, body);
  c.pop_scope();
}

fn store_site(c: &mut Compiler, site: crate::compiler::BindingSite, src: crate::op::Reg, span: Span) {
  use crate::compiler::BindingSite;
  match site {
    BindingSite::Register(reg) => c.emit(Op::Move { dst: reg, src }, span),
    BindingSite::Spill(slot) => c.emit(Op::StoreSpill { slot: slot as u16, src }, span),
    BindingSite::Global(name) => c.emit(Op::SetGlobal { name, src }, span),
  };
}
