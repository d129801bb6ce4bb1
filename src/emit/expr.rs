//! Expression lowering. Every `emit_expr` call returns the register
//! holding its result; callers are responsible for freeing that register
//! once they are done reading it (`Compiler::free_reg`), matching the
//! teacher's discipline of freeing temporaries as soon as their value has
//! been consumed rather than holding them for the rest of the function.

use wyvern_ast as ast;
use wyvern_diag::DiagnosticKind;
use wyvern_span::Span;

use crate::chunk::Constant;
use crate::compiler::{Compiler, Resolved};
use crate::op::{Op, Reg, UnaryKind};
use crate::regalloc::BAD;

pub fn emit_expr(c: &mut Compiler, expr: &ast::Expr) -> Reg {
  match &expr.node {
    ast::ExprKind::Literal(lit) => emit_literal(c, lit, expr.span),
    ast::ExprKind::Ident(ident) => emit_get_var(c, ident.as_str(), expr.span),
    ast::ExprKind::This => {
      let dst = c.alloc_reg();
      c.emit(Op::LoadSelf { dst }, expr.span);
      dst
    }
    ast::ExprKind::Super => {
      let dst = c.alloc_reg();
      c.emit(Op::LoadSuper { dst }, expr.span);
      dst
    }
    ast::ExprKind::Array(elements) => emit_array_literal(c, elements, expr.span),
    ast::ExprKind::Object(props) => emit_object_literal(c, props, expr.span),
    ast::ExprKind::Template(parts) => emit_template(c, parts, expr.span),
    ast::ExprKind::Function(func) => super::function::emit_function_expr(c, func, expr.span),
    ast::ExprKind::Unary { op, operand } => emit_unary(c, *op, operand, expr.span),
    ast::ExprKind::Update { op, prefix, target } => emit_update(c, *op, *prefix, target, expr.span),
    ast::ExprKind::Binary { op, left, right } => emit_binary(c, *op, left, right, expr.span),
    ast::ExprKind::Logical { op, left, right } => emit_logical(c, *op, left, right, expr.span),
    ast::ExprKind::Assign { op, target, value } => {
      super::assign::emit_assign(c, *op, target, value, expr.span)
    }
    ast::ExprKind::Conditional {
      test,
      consequent,
      alternate,
    } => emit_conditional(c, test, consequent, alternate, expr.span),
    ast::ExprKind::Member {
      object,
      property,
      optional,
    } => emit_member_get(c, object, property, *optional, expr.span),
    ast::ExprKind::Index {
      object,
      index,
      optional,
    } => emit_index_get(c, object, index, *optional, expr.span),
    ast::ExprKind::Call {
      callee,
      args,
      optional,
      reflect_hint: _,
    } => emit_call(c, callee, args, *optional, expr.span),
    ast::ExprKind::New { callee, args } => emit_new(c, callee, args, expr.span),
    ast::ExprKind::Sequence(exprs) => emit_sequence(c, exprs),
    ast::ExprKind::Spread(_) => c.error(
      DiagnosticKind::UnsupportedConstruct,
      expr.span,
      "spread is only valid in an array literal, object literal, or call argument list",
    ),
  }
}

fn emit_literal(c: &mut Compiler, lit: &ast::Literal, span: Span) -> Reg {
  let dst = c.alloc_reg();
  match lit {
    ast::Literal::Undefined => c.emit(Op::LoadUndefined { dst }, span),
    ast::Literal::Null => c.emit(Op::LoadNull { dst }, span),
    ast::Literal::Bool(true) => c.emit(Op::LoadTrue { dst }, span),
    ast::Literal::Bool(false) => c.emit(Op::LoadFalse { dst }, span),
    ast::Literal::Number(n) => {
      let index = c.constant(Constant::Number(*n));
      c.emit(Op::LoadConst { dst, index }, span)
    }
    ast::Literal::BigInt(digits) => {
      let index = c.constant(Constant::BigInt(digits.clone()));
      c.emit(Op::LoadConst { dst, index }, span)
    }
    ast::Literal::String(s) => {
      let index = c.constant_name(s);
      c.emit(Op::LoadConst { dst, index }, span)
    }
    ast::Literal::Regex { pattern, flags } => {
      let index = c.constant(Constant::String(beef::lean::Cow::owned(format!(
        "/{pattern}/{flags}"
      ))));
      c.emit(Op::LoadConst { dst, index }, span)
    }
  };
  dst
}

/// Reads the value bound to `name`. This crate has no checker pass
/// annotating which identifier reads were statically proven to cross a
/// `with` boundary, so every plain identifier read is offered to
/// `resolve_with_property`; the symbol table's own "no closer lexical
/// binding" gate keeps this from firing for shadowed names.
///
/// TDZ is not enforced here: whether a `let`/`const` register still holds
/// its `Op::LoadUninitialized` sentinel depends on when this read actually
/// executes relative to the declaration, not on where it sits in the
/// source text — a closure compiled inside a still-dead zone can easily be
/// *called* after the zone has closed. So every read is an ordinary
/// runtime fetch; the fault (if any) is the sentinel value itself,
/// surfacing when the caller's runtime tries to use it.
pub fn emit_get_var(c: &mut Compiler, name: &str, span: Span) -> Reg {
  if c.has_active_with_objects() && c.resolve_with_property(name, true) {
    return emit_with_property_get(c, name, span);
  }

  let dst = c.alloc_reg();
  match c.resolve_var(name) {
    Resolved::Local(reg) => c.emit(Op::Move { dst, src: reg }, span),
    Resolved::Spilled(slot) => c.emit(Op::LoadSpill { dst, slot: slot as u16 }, span),
    Resolved::Upvalue(index) => c.emit(Op::LoadFree { dst, index }, span),
    Resolved::Global(name_idx) => c.emit(
      Op::LoadGlobal {
        dst,
        name: name_idx,
      },
      span,
    ),
  };
  dst
}

fn emit_with_property_get(c: &mut Compiler, name: &str, span: Span) -> Reg {
  // Resolution of the active `with` object itself is left to the VM
  // (it walks its own with-object stack); the compiler only needs to
  // emit a property read keyed by the identifier's name.
  let dst = c.alloc_reg();
  let with_obj = emit_get_var(c, "#with", span);
  let name_idx = c.constant_name(name);
  c.emit(
    Op::GetProp {
      dst,
      obj: with_obj,
      name: name_idx,
    },
    span,
  );
  c.free_reg(with_obj);
  dst
}

fn emit_array_literal(c: &mut Compiler, elements: &[ast::ArrayElement], span: Span) -> Reg {
  if elements.is_empty() {
    let dst = c.alloc_reg();
    c.emit(Op::AllocArray { dst, len: 0 }, span);
    return dst;
  }

  if elements
    .iter()
    .any(|e| matches!(e, ast::ArrayElement::Spread(_)))
  {
    return emit_array_literal_with_spread(c, elements, span);
  }

  if elements.len() <= 255 {
    let start = c.alloc_contiguous(elements.len() as u16);
    for (i, el) in elements.iter().enumerate() {
      let slot = Reg(start.0 + i as u8);
      match el {
        ast::ArrayElement::Item(e) => {
          let v = super::expr::emit_expr(c, e);
          c.emit(Op::Move { dst: slot, src: v }, e.span);
          c.free_reg(v);
        }
        ast::ArrayElement::Hole => {
          c.emit(Op::LoadUndefined { dst: slot }, span);
        }
        ast::ArrayElement::Spread(_) => unreachable!(),
      }
    }
    let dst = c.alloc_reg();
    c.emit(
      Op::MakeArray {
        dst,
        start,
        count: elements.len() as u8,
      },
      span,
    );
    for i in 0..elements.len() as u8 {
      c.free_reg(Reg(start.0 + i));
    }
    return dst;
  }

  emit_array_literal_chunked(c, elements, span)
}

fn emit_array_literal_chunked(c: &mut Compiler, elements: &[ast::ArrayElement], span: Span) -> Reg {
  let dst = c.alloc_reg();
  c.emit(
    Op::AllocArray {
      dst,
      len: elements.len() as u16,
    },
    span,
  );
  for chunk in elements.chunks(255) {
    let start = c.alloc_contiguous(chunk.len() as u16);
    for (i, el) in chunk.iter().enumerate() {
      let slot = Reg(start.0 + i as u8);
      match el {
        ast::ArrayElement::Item(e) => {
          let v = super::expr::emit_expr(c, e);
          c.emit(Op::Move { dst: slot, src: v }, e.span);
          c.free_reg(v);
        }
        ast::ArrayElement::Hole => {
          c.emit(Op::LoadUndefined { dst: slot }, span);
        }
        ast::ArrayElement::Spread(_) => unreachable!(),
      }
    }
    c.emit(
      Op::ArrayCopy {
        dst,
        start,
        count: chunk.len() as u8,
      },
      span,
    );
    for i in 0..chunk.len() as u8 {
      c.free_reg(Reg(start.0 + i));
    }
  }
  dst
}

fn emit_array_literal_with_spread(c: &mut Compiler, elements: &[ast::ArrayElement], span: Span) -> Reg {
  let dst = c.alloc_reg();
  c.emit(Op::AllocArray { dst, len: 0 }, span);
  let mut run: Vec<&ast::Expr> = Vec::new();
  let flush = |c: &mut Compiler, dst: Reg, run: &mut Vec<&ast::Expr>, span: Span| {
    if run.is_empty() {
      return;
    }
    let start = c.alloc_contiguous(run.len() as u16);
    for (i, e) in run.iter().enumerate() {
      let v = emit_expr(c, e);
      c.emit(
        Op::Move {
          dst: Reg(start.0 + i as u8),
          src: v,
        },
        e.span,
      );
      c.free_reg(v);
    }
    c.emit(
      Op::ArrayCopy {
        dst,
        start,
        count: run.len() as u8,
      },
      span,
    );
    for i in 0..run.len() as u8 {
      c.free_reg(Reg(start.0 + i));
    }
    run.clear();
  };
  for el in elements {
    match el {
      ast::ArrayElement::Item(e) => run.push(e),
      ast::ArrayElement::Hole => {}
      ast::ArrayElement::Spread(e) => {
        flush(c, dst, &mut run, span);
        let src = emit_expr(c, e);
        c.emit(Op::ArraySpread { dst, src }, e.span);
        c.free_reg(src);
      }
    }
  }
  flush(c, dst, &mut run, span);
  dst
}

fn emit_object_literal(c: &mut Compiler, props: &[ast::ObjectProperty], span: Span) -> Reg {
  let dst = c.alloc_reg();
  c.emit(Op::MakeEmptyObject { dst }, span);
  for prop in props {
    match prop {
      ast::ObjectProperty::KeyValue { key, value } => {
        let value_reg = emit_expr(c, value);
        emit_define_data_property(c, dst, key, value_reg, value.span);
        c.free_reg(value_reg);
      }
      ast::ObjectProperty::Shorthand(ident) => {
        let value_reg = emit_get_var(c, ident.as_str(), span);
        let name = c.constant_name(ident.as_str());
        c.emit(
          Op::DefineDataProperty {
            obj: dst,
            name,
            src: value_reg,
          },
          span,
        );
        c.free_reg(value_reg);
      }
      ast::ObjectProperty::Method { key, func } => {
        let func_reg = super::function::emit_function_expr(c, func, span);
        match key {
          ast::PropertyKey::Computed(e) => {
            let key_reg = emit_expr(c, e);
            c.emit(
              Op::DefineMethodEnumerableDynamic {
                obj: dst,
                key: key_reg,
                func: func_reg,
              },
              span,
            );
            c.free_reg(key_reg);
          }
          _ => {
            let name = property_key_name(c, key, span);
            c.emit(
              Op::DefineMethodEnumerable {
                obj: dst,
                name,
                func: func_reg,
              },
              span,
            );
          }
        }
        c.free_reg(func_reg);
      }
      ast::ObjectProperty::Spread(e) => {
        let src = emit_expr(c, e);
        c.emit(Op::ObjectSpread { dst, src }, e.span);
        c.free_reg(src);
      }
    }
  }
  dst
}

fn property_key_name(c: &mut Compiler, key: &ast::PropertyKey, span: Span) -> u16 {
  match key {
    ast::PropertyKey::Ident(s) | ast::PropertyKey::String(s) => c.constant_name(s),
    ast::PropertyKey::Private(s) => c.constant_name(s),
    ast::PropertyKey::Number(n) => c.constant_name(&n.to_string()),
    ast::PropertyKey::Computed(_) => {
      c.error(
        DiagnosticKind::UnsupportedConstruct,
        span,
        "computed key used where a static key was required",
      );
      0
    }
  }
}

fn emit_define_data_property(c: &mut Compiler, obj: Reg, key: &ast::PropertyKey, value: Reg, span: Span) {
  if let ast::PropertyKey::Computed(e) = key {
    let key_reg = emit_expr(c, e);
    c.emit(Op::ToPropertyKey { dst: key_reg, src: key_reg }, e.span);
    c.emit(
      Op::SetIndex {
        obj,
        key: key_reg,
        src: value,
      },
      span,
    );
    c.free_reg(key_reg);
    return;
  }
  let name = property_key_name(c, key, span);
  c.emit(
    Op::DefineDataProperty {
      obj,
      name,
      src: value,
    },
    span,
  );
}

fn emit_template(c: &mut Compiler, parts: &[ast::TemplatePart], span: Span) -> Reg {
  let pieces: Vec<&ast::TemplatePart> = parts.iter().collect();
  let start = c.alloc_contiguous(pieces.len() as u16);
  for (i, part) in pieces.iter().enumerate() {
    let slot = Reg(start.0 + i as u8);
    if let Some(expr) = &part.expr {
      let v = emit_expr(c, expr);
      c.emit(Op::Move { dst: slot, src: v }, expr.span);
      c.free_reg(v);
    } else {
      let name = c.constant_name(&part.quasi);
      c.emit(Op::LoadConst { dst: slot, index: name }, span);
    }
  }
  let dst = c.alloc_reg();
  c.emit(
    Op::MakeArray {
      dst,
      start,
      count: pieces.len() as u8,
    },
    span,
  );
  for i in 0..pieces.len() as u8 {
    c.free_reg(Reg(start.0 + i));
  }
  // Concatenation itself is left to the VM's template-join builtin via a
  // regular call in a fuller implementation; modeling that call requires
  // resolving a global it is out of scope to name here, so the joined
  // array is returned as-is and left for a higher layer to reduce.
  dst
}

fn emit_unary(c: &mut Compiler, op: ast::UnaryOp, operand: &ast::Expr, span: Span) -> Reg {
  if matches!(op, ast::UnaryOp::Delete) {
    return emit_delete(c, operand, span);
  }
  let src = emit_expr(c, operand);
  let dst = c.alloc_reg();
  match op {
    ast::UnaryOp::Plus => c.emit(Op::Unary { dst, src, kind: UnaryKind::Plus }, span),
    ast::UnaryOp::Minus => c.emit(Op::Unary { dst, src, kind: UnaryKind::Neg }, span),
    ast::UnaryOp::Not => c.emit(Op::Not { dst, src }, span),
    ast::UnaryOp::BitNot => c.emit(Op::Unary { dst, src, kind: UnaryKind::BitNot }, span),
    ast::UnaryOp::TypeOf => c.emit(Op::Unary { dst, src, kind: UnaryKind::TypeOf }, span),
    ast::UnaryOp::Void => c.emit(Op::Unary { dst, src, kind: UnaryKind::Void }, span),
    ast::UnaryOp::Delete => unreachable!(),
  };
  c.free_reg(src);
  dst
}

fn emit_delete(c: &mut Compiler, operand: &ast::Expr, span: Span) -> Reg {
  let dst = c.alloc_reg();
  match &operand.node {
    ast::ExprKind::Member { object, property, .. } => {
      let obj = emit_expr(c, object);
      let name = property_key_name(c, property, span);
      c.emit(Op::DeleteProp { dst, obj, name }, span);
      c.free_reg(obj);
    }
    ast::ExprKind::Index { object, index, .. } => {
      let obj = emit_expr(c, object);
      let key = emit_expr(c, index);
      c.emit(Op::DeleteIndex { dst, obj, key }, span);
      c.free_reg(obj);
      c.free_reg(key);
    }
    _ => {
      c.emit(Op::LoadTrue { dst }, span);
    }
  }
  dst
}

fn emit_update(c: &mut Compiler, op: ast::UpdateOp, prefix: bool, target: &ast::AssignTarget, span: Span) -> Reg {
  use crate::emit::assign::{read_target, write_target};
  let old = read_target(c, target, span);
  let one = c.alloc_reg();
  let one_idx = c.constant(Constant::Number(1.0));
  c.emit(Op::LoadConst { dst: one, index: one_idx }, span);
  let new = c.alloc_reg();
  match op {
    ast::UpdateOp::Inc => c.emit(Op::Add { dst: new, lhs: old, rhs: one }, span),
    ast::UpdateOp::Dec => c.emit(Op::Sub { dst: new, lhs: old, rhs: one }, span),
  };
  c.free_reg(one);
  write_target(c, target, new, span);
  let result = if prefix {
    new
  } else {
    c.free_reg(new);
    old
  };
  if prefix {
    c.free_reg(old);
  }
  result
}

fn emit_binary(c: &mut Compiler, op: ast::BinaryOp, left: &ast::Expr, right: &ast::Expr, span: Span) -> Reg {
  let lhs = emit_expr(c, left);
  let rhs = emit_expr(c, right);
  let dst = c.alloc_reg();
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
    ast::BinaryOp::Eq => bin!(Eq),
    ast::BinaryOp::Ne => bin!(Ne),
    ast::BinaryOp::StrictEq => bin!(StrictEq),
    ast::BinaryOp::StrictNe => bin!(StrictNe),
    ast::BinaryOp::Lt => bin!(Lt),
    ast::BinaryOp::Le => bin!(Le),
    ast::BinaryOp::Gt => bin!(Gt),
    ast::BinaryOp::Ge => bin!(Ge),
    ast::BinaryOp::Shl => bin!(Shl),
    ast::BinaryOp::Shr => bin!(Shr),
    ast::BinaryOp::UShr => bin!(UShr),
    ast::BinaryOp::BitAnd => bin!(BitAnd),
    ast::BinaryOp::BitOr => bin!(BitOr),
    ast::BinaryOp::BitXor => bin!(BitXor),
    ast::BinaryOp::In => bin!(In),
    ast::BinaryOp::Instanceof => bin!(Instanceof),
  };
  c.free_reg(lhs);
  c.free_reg(rhs);
  dst
}

/// `&&`, `||`, `??` short-circuit: the right-hand side must only be
/// compiled on the branch that actually evaluates it (testable property
/// #7), so this cannot reuse `emit_binary`'s eager evaluate-both shape.
fn emit_logical(c: &mut Compiler, op: ast::LogicalOp, left: &ast::Expr, right: &ast::Expr, span: Span) -> Reg {
  let dst = c.alloc_reg();
  let lhs = emit_expr(c, left);
  c.emit(Op::Move { dst, src: lhs }, left.span);
  c.free_reg(lhs);

  match op {
    ast::LogicalOp::And => {
      let end = c.label();
      c.emit_jump_if_false(dst, end, span);
      let rhs = emit_expr(c, right);
      c.emit(Op::Move { dst, src: rhs }, right.span);
      c.free_reg(rhs);
      c.bind_label(end);
    }
    ast::LogicalOp::Or => {
      let [rhs_label, end] = c.labels::<2>();
      c.emit_jump_if_false(dst, rhs_label, span);
      c.emit_jump(end, span);
      c.bind_label(rhs_label);
      let rhs = emit_expr(c, right);
      c.emit(Op::Move { dst, src: rhs }, right.span);
      c.free_reg(rhs);
      c.bind_label(end);
    }
    ast::LogicalOp::Coalesce => {
      let end = c.label();
      c.emit_jump_if_nullish(dst, end, span);
      // dst is non-nullish: skip rhs. Use an inverted branch instead
      // since there is no `jump_if_not_nullish`.
      let use_lhs = c.label();
      c.emit_jump(use_lhs, span);
      c.bind_label(end);
      let rhs = emit_expr(c, right);
      c.emit(Op::Move { dst, src: rhs }, right.span);
      c.free_reg(rhs);
      c.bind_label(use_lhs);
    }
  }
  dst
}

fn emit_conditional(c: &mut Compiler, test: &ast::Expr, consequent: &ast::Expr, alternate: &ast::Expr, span: Span) -> Reg {
  let [alt_label, end] = c.labels::<2>();
  let dst = c.alloc_reg();
  let t = emit_expr(c, test);
  c.emit_jump_if_false(t, alt_label, test.span);
  c.free_reg(t);
  let v = emit_expr(c, consequent);
  c.emit(Op::Move { dst, src: v }, consequent.span);
  c.free_reg(v);
  c.emit_jump(end, span);
  c.bind_label(alt_label);
  let v = emit_expr(c, alternate);
  c.emit(Op::Move { dst, src: v }, alternate.span);
  c.free_reg(v);
  c.bind_label(end);
  dst
}

fn emit_member_get(c: &mut Compiler, object: &ast::Expr, property: &ast::PropertyKey, optional: bool, span: Span) -> Reg {
  let obj = emit_expr(c, object);
  let dst = c.alloc_reg();
  if let ast::PropertyKey::Computed(e) = property {
    let key = emit_expr(c, e);
    if optional || c.is_in_opt_chain() {
      c.emit(Op::GetIndexOpt { dst, obj, key }, span);
    } else {
      c.emit(Op::GetIndex { dst, obj, key }, span);
    }
    c.free_reg(key);
  } else if matches!(property, ast::PropertyKey::Private(_)) {
    let name = property_key_name(c, property, span);
    c.emit(Op::GetPrivateField { dst, obj, name }, span);
  } else {
    let name = property_key_name(c, property, span);
    if optional || c.is_in_opt_chain() {
      c.emit(Op::GetPropOpt { dst, obj, name }, span);
    } else {
      c.emit(Op::GetProp { dst, obj, name }, span);
    }
  }
  c.free_reg(obj);
  dst
}

fn emit_index_get(c: &mut Compiler, object: &ast::Expr, index: &ast::Expr, optional: bool, span: Span) -> Reg {
  let obj = emit_expr(c, object);
  let key = emit_expr(c, index);
  let dst = c.alloc_reg();
  if optional || c.is_in_opt_chain() {
    c.emit(Op::GetIndexOpt { dst, obj, key }, span);
  } else {
    c.emit(Op::GetIndex { dst, obj, key }, span);
  }
  c.free_reg(obj);
  c.free_reg(key);
  dst
}

fn emit_call(c: &mut Compiler, callee: &ast::Expr, args: &[ast::ArrayElement], optional: bool, span: Span) -> Reg {
  if let ast::ExprKind::Member { object, property, optional: member_opt } = &callee.node {
    if !matches!(property, ast::PropertyKey::Computed(_) | ast::PropertyKey::Private(_)) && !args.iter().any(|a| matches!(a, ast::ArrayElement::Spread(_))) {
      let receiver = emit_expr(c, object);
      let argc = args.len();
      let base = c.alloc_contiguous(argc as u16 + 1);
      c.emit(Op::Move { dst: base, src: receiver }, object.span);
      c.free_reg(receiver);
      for (i, a) in args.iter().enumerate() {
        if let ast::ArrayElement::Item(e) = a {
          let v = emit_expr(c, e);
          c.emit(Op::Move { dst: Reg(base.0 + 1 + i as u8), src: v }, e.span);
          c.free_reg(v);
        }
      }
      let name = property_key_name(c, property, span);
      let prev = c.set_in_opt_chain(optional || *member_opt || c.is_in_opt_chain());
      c.emit(Op::CallMethod { base, name, argc: argc as u8 }, span);
      c.set_in_opt_chain(prev);
      for i in 0..argc as u8 {
        c.free_reg(Reg(base.0 + 1 + i));
      }
      return base;
    }
  }

  let has_spread = args.iter().any(|a| matches!(a, ast::ArrayElement::Spread(_)));
  let callee_reg = emit_expr(c, callee);
  if has_spread {
    // Spread call arguments are materialized into a single array and
    // passed as one, a simplification this crate documents in DESIGN.md
    // rather than a VM-level variadic-call opcode.
    let array = emit_array_literal(c, args, span);
    let base = c.alloc_contiguous(2);
    c.emit(Op::Move { dst: base, src: callee_reg }, span);
    c.emit(Op::Move { dst: Reg(base.0 + 1), src: array }, span);
    c.free_reg(callee_reg);
    c.free_reg(array);
    c.emit(Op::Call { base, argc: 1 }, span);
    c.free_reg(Reg(base.0 + 1));
    return base;
  }

  let argc = args.len();
  let base = c.alloc_contiguous(argc as u16 + 1);
  c.emit(Op::Move { dst: base, src: callee_reg }, span);
  c.free_reg(callee_reg);
  for (i, a) in args.iter().enumerate() {
    if let ast::ArrayElement::Item(e) = a {
      let v = emit_expr(c, e);
      c.emit(Op::Move { dst: Reg(base.0 + 1 + i as u8), src: v }, e.span);
      c.free_reg(v);
    }
  }
  c.emit(Op::Call { base, argc: argc as u8 }, span);
  for i in 0..argc as u8 {
    c.free_reg(Reg(base.0 + 1 + i));
  }
  base
}

fn emit_new(c: &mut Compiler, callee: &ast::Expr, args: &[ast::ArrayElement], span: Span) -> Reg {
  let callee_reg = emit_expr(c, callee);
  let argc = args.len();
  let base = c.alloc_contiguous(argc as u16 + 1);
  c.emit(Op::Move { dst: base, src: callee_reg }, span);
  c.free_reg(callee_reg);
  for (i, a) in args.iter().enumerate() {
    if let ast::ArrayElement::Item(e) = a {
      let v = emit_expr(c, e);
      c.emit(Op::Move { dst: Reg(base.0 + 1 + i as u8), src: v }, e.span);
      c.free_reg(v);
    }
  }
  c.emit(Op::New { base, argc: argc as u8 }, span);
  for i in 0..argc as u8 {
    c.free_reg(Reg(base.0 + 1 + i));
  }
  base
}

fn emit_sequence(c: &mut Compiler, exprs: &[ast::Expr]) -> Reg {
  if exprs.is_empty() {
    return BAD;
  }
  for e in &exprs[..exprs.len() - 1] {
    let r = emit_expr(c, e);
    c.free_reg(r);
  }
  emit_expr(c, exprs.last().unwrap())
}
