//! Assignment and compound-assignment lowering, plus the `read_target`/
//! `write_target` primitives `update` expressions and destructuring share.

use wyvern_ast as ast;
use wyvern_diag::DiagnosticKind;
use wyvern_span::Span;

use crate::compiler::{Compiler, Resolved};
use crate::op::{Op, Reg};

use super::expr::emit_expr;

pub fn emit_assign(c: &mut Compiler, op: ast::AssignOp, target: &ast::AssignTarget, value: &ast::Expr, span: Span) -> Reg {
  if let Some(bin_op) = op.as_binary() {
    let old = read_target(c, target, span);
    let rhs = emit_expr(c, value);
    let dst = c.alloc_reg();
    emit_binary_op(c, bin_op, dst, old, rhs, span);
    c.free_reg(rhs);
    c.free_reg(old);
    write_target(c, target, dst, span);
    return dst;
  }

  if op.is_logical() {
    return emit_logical_assign(c, op, target, value, span);
  }

  match target {
    ast::AssignTarget::Array(pattern) => {
      let v = emit_expr(c, value);
      super::destructure::destructure_array_assign(c, pattern, v, span);
      v
    }
    ast::AssignTarget::Object(pattern) => {
      let v = emit_expr(c, value);
      super::destructure::destructure_object_assign(c, pattern, v, span);
      v
    }
    _ => {
      let v = emit_expr(c, value);
      write_target(c, target, v, span);
      v
    }
  }
}

fn emit_binary_op(c: &mut Compiler, op: ast::BinaryOp, dst: Reg, lhs: Reg, rhs: Reg, span: Span) {
  macro_rules! bin {
    ($variant:ident) => {
      c.emit(Op::$variant { dst, lhs, rhs }, span)
    };
  }
  match op {
    ast::BinaryOp::Add => bin!(Add),
    ast::BinaryOp::Sub => bin!(Sub),
    ast::BinaryOp::Mul => bin!(Mul),
    ast::BinaryOp::Div => bin!(Div),
    ast::BinaryOp::Rem => bin!(Rem),
    ast::BinaryOp::Pow => bin!(Pow),
    ast::BinaryOp::BitAnd => bin!(BitAnd),
    ast::BinaryOp::BitOr => bin!(BitOr),
    ast::BinaryOp::BitXor => bin!(BitXor),
    ast::BinaryOp::Shl => bin!(Shl),
    ast::BinaryOp::Shr => bin!(Shr),
    ast::BinaryOp::UShr => bin!(UShr),
    _ => unreachable!("not a compound-assignment operator: {op:?}"),
  };
}

/// `&&=`, `||=`, `??=`: the assignment (and any side-effecting target
/// evaluation) only happens on the branch that short-circuits through.
fn emit_logical_assign(c: &mut Compiler, op: ast::AssignOp, target: &ast::AssignTarget, value: &ast::Expr, span: Span) -> Reg {
  let old = read_target(c, target, span);
  let end = c.label();
  match op {
    ast::AssignOp::LogicalAnd => c.emit_jump_if_false(old, end, span),
    ast::AssignOp::LogicalOr => {
      let do_assign = c.label();
      c.emit_jump_if_false(old, do_assign, span);
      c.emit_jump(end, span);
      c.bind_label(do_assign);
    }
    ast::AssignOp::Coalesce => {
      let do_assign = c.label();
      c.emit_jump_if_nullish(old, do_assign, span);
      c.emit_jump(end, span);
      c.bind_label(do_assign);
    }
    _ => unreachable!(),
  };
  let v = emit_expr(c, value);
  write_target(c, target, v, span);
  c.emit(Op::Move { dst: old, src: v }, span);
  c.free_reg(v);
  c.bind_label(end);
  old
}

/// Reads the current value of an assignment target. Array/Object patterns
/// are never themselves readable (they only appear as destructuring
/// targets), so they fall through to a diagnostic.
pub fn read_target(c: &mut Compiler, target: &ast::AssignTarget, span: Span) -> Reg {
  match target {
    ast::AssignTarget::Ident(ident) => super::expr::emit_get_var(c, ident.as_str(), span),
    ast::AssignTarget::Member { object, property, optional } => {
      let obj = emit_expr(c, object);
      let dst = c.alloc_reg();
      match property {
        ast::PropertyKey::Computed(e) => {
          let key = emit_expr(c, e);
          c.emit(Op::GetIndex { dst, obj, key }, span);
          c.free_reg(key);
        }
        _ => {
          let name = property_name(c, property, span);
          if *optional {
            c.emit(Op::GetPropOpt { dst, obj, name }, span);
          } else {
            c.emit(Op::GetProp { dst, obj, name }, span);
          }
        }
      }
      c.free_reg(obj);
      dst
    }
    ast::AssignTarget::Index { object, index, optional } => {
      let obj = emit_expr(c, object);
      let key = emit_expr(c, index);
      let dst = c.alloc_reg();
      if *optional {
        c.emit(Op::GetIndexOpt { dst, obj, key }, span);
      } else {
        c.emit(Op::GetIndex { dst, obj, key }, span);
      }
      c.free_reg(obj);
      c.free_reg(key);
      dst
    }
    ast::AssignTarget::Array(_) | ast::AssignTarget::Object(_) => c.error(
      DiagnosticKind::InvalidAssignmentTarget,
      span,
      "a destructuring pattern cannot be read as a value",
    ),
  }
}

/// Stores `src` into an assignment target. `src` is left alive; callers
/// own freeing it.
pub fn write_target(c: &mut Compiler, target: &ast::AssignTarget, src: Reg, span: Span) {
  match target {
    ast::AssignTarget::Ident(ident) => write_var(c, ident.as_str(), src, span),
    ast::AssignTarget::Member { object, property, .. } => {
      let obj = emit_expr(c, object);
      match property {
        ast::PropertyKey::Private(name) => {
          let name = c.constant_name(name);
          c.emit(Op::SetPrivateField { obj, name, src }, span);
        }
        ast::PropertyKey::Computed(e) => {
          let key = emit_expr(c, e);
          c.emit(Op::SetIndex { obj, key, src }, span);
          c.free_reg(key);
        }
        _ => {
          let name = property_name(c, property, span);
          c.emit(Op::SetProp { obj, name, src }, span);
        }
      }
      c.free_reg(obj);
    }
    ast::AssignTarget::Index { object, index, .. } => {
      let obj = emit_expr(c, object);
      let key = emit_expr(c, index);
      c.emit(Op::SetIndex { obj, key, src }, span);
      c.free_reg(obj);
      c.free_reg(key);
    }
    ast::AssignTarget::Array(pattern) => super::destructure::destructure_array_assign(c, pattern, src, span),
    ast::AssignTarget::Object(pattern) => super::destructure::destructure_object_assign(c, pattern, src, span),
  }
}

fn property_name(c: &mut Compiler, key: &ast::PropertyKey, span: Span) -> u16 {
  match key {
    ast::PropertyKey::Ident(s) | ast::PropertyKey::String(s) => c.constant_name(s),
    ast::PropertyKey::Private(s) => c.constant_name(s),
    ast::PropertyKey::Number(n) => c.constant_name(&n.to_string()),
    ast::PropertyKey::Computed(_) => {
      c.error(DiagnosticKind::UnsupportedConstruct, span, "expected a static key");
      0
    }
  }
}

pub fn write_var(c: &mut Compiler, name: &str, src: Reg, span: Span) {
  if c.has_active_with_objects() && c.resolve_with_property(name, true) {
    let with_obj = super::expr::emit_get_var(c, "#with", span);
    let name_idx = c.constant_name(name);
    c.emit(
      Op::SetProp {
        obj: with_obj,
        name: name_idx,
        src,
      },
      span,
    );
    c.free_reg(with_obj);
    return;
  }

  if let Some((_, mutable, _)) = c.resolve_symbol(name) {
    if !mutable {
      c.error(
        DiagnosticKind::StrictModeViolation,
        span,
        format!("cannot assign to const variable '{name}'"),
      );
      return;
    }
  }

  match c.resolve_var(name) {
    Resolved::Local(reg) => c.emit(Op::Move { dst: reg, src }, span),
    Resolved::Spilled(slot) => c.emit(Op::StoreSpill { slot: slot as u16, src }, span),
    Resolved::Upvalue(index) => c.emit(Op::SetFree { index, src }, span),
    Resolved::Global(name_idx) => c.emit(Op::SetGlobal { name: name_idx, src }, span),
  };
}
