//! `switch` lowering: a strict-equality test chain into a shared lexical
//! scope spanning every case body, so a `let` declared in one case is
//! visible (subject to TDZ) from a later case that falls through into it.

use wyvern_ast as ast;
use wyvern_span::Span;

use crate::compiler::Compiler;
use crate::emit::builder::Label;
use crate::op::Op;

use super::expr::emit_expr;
use super::stmt::emit_stmt;

pub fn emit_switch(c: &mut Compiler, label: Option<String>, discriminant: &ast::Expr, cases: &[ast::SwitchCase], span: Span) {
  let disc = emit_expr(c, discriminant);
  c.push_scope();

  let case_labels: Vec<Label> = (0..cases.len()).map(|_| c.label()).collect();
  let default_index = cases.iter().position(|case| case.test.is_none());

  c.push_breakable(label);
  let index = c.loop_stack_len() - 1;
  let break_label = c.loop_break_label(index);

  for (i, case) in cases.iter().enumerate() {
    let Some(test) = &case.test else { continue };
    let test_val = emit_expr(c, test);
    let cmp = c.alloc_reg();
    c.emit(Op::StrictEq { dst: cmp, lhs: disc, rhs: test_val }, test.span);
    c.free_reg(test_val);
    let not_cmp = c.alloc_reg();
    c.emit(Op::Not { dst: not_cmp, src: cmp }, test.span);
    c.free_reg(cmp);
    c.emit_jump_if_false(not_cmp, case_labels[i], test.span);
    c.free_reg(not_cmp);
  }
  c.free_reg(disc);

  match default_index {
    Some(i) => c.emit_jump(case_labels[i], span),
    None => c.emit_jump(break_label, span),
  };

  for (i, case) in cases.iter().enumerate() {
    c.bind_label(case_labels[i]);
    for stmt in &case.body {
      emit_stmt(c, stmt);
    }
  }

  c.bind_label(break_label);
  c.pop_loop();
  c.pop_scope();
}
