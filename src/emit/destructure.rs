//! Recursive array/object destructuring, in both its two shapes:
//! declaration context (`let [a, b] = x`, binds fresh names via
//! `Compiler::define_binding`) and assignment context (`[a, b] = x`,
//! writes through `assign::write_target`). The two contexts read array
//! elements differently: assignment-context array patterns read by
//! numeric index (`GetIndex` with a loaded numeric constant), matching a
//! fixed-arity structural match; declaration-context array patterns walk
//! the iterator protocol instead (`Symbol.iterator`/`.next()`, the same
//! shape `loops.rs`'s `for-of` lowering uses), since `let [a, b] = x`
//! must accept any iterable, not just indexable arrays.

use wyvern_ast as ast;
use wyvern_diag::DiagnosticKind;
use wyvern_span::Span;

use crate::chunk::Constant;
use crate::op::{Op, Reg};

use super::assign::write_target;
use super::expr::emit_expr;
use crate::compiler::Compiler;

fn load_index(c: &mut Compiler, i: u32, span: Span) -> Reg {
  let dst = c.alloc_reg();
  let idx = c.constant(Constant::Number(i as f64));
  c.emit(Op::LoadConst { dst, index: idx }, span);
  dst
}

pub(super) fn apply_default(c: &mut Compiler, reg: Reg, default: Option<&ast::Expr>, span: Span) {
  let Some(default) = default else { return };
  let end = c.label();
  c.emit_jump_if_undefined(reg, end, span);
  // reg currently holds `undefined`; fall through only on that branch.
  let skip = c.label();
  c.emit_jump(skip, span);
  c.bind_label(end);
  let v = emit_expr(c, default);
  c.emit(Op::Move { dst: reg, src: v }, default.span);
  c.free_reg(v);
  c.bind_label(skip);
}

// ---------------------------------------------------------------------
// assignment context
// ---------------------------------------------------------------------

pub fn destructure_array_assign(c: &mut Compiler, pattern: &ast::ArrayPattern, src: Reg, span: Span) {
  for (i, el) in pattern.elements.iter().enumerate() {
    let Some(el) = el else { continue };
    let idx = load_index(c, i as u32, span);
    let v = c.alloc_reg();
    c.emit(Op::GetIndex { dst: v, obj: src, key: idx }, span);
    c.free_reg(idx);
    apply_default(c, v, el.default.as_deref(), span);
    write_target(c, &el.target, v, span);
    c.free_reg(v);
  }
  if let Some(rest) = &pattern.rest {
    let dst = c.alloc_reg();
    c.emit(
      Op::ArraySlice {
        dst,
        src,
        start: pattern.elements.len() as u16,
      },
      span,
    );
    write_target(c, rest, dst, span);
    c.free_reg(dst);
  }
}

/// `let {..} = null` / `{..} = undefined` must throw before any property
/// is read off `src`, rather than letting the first `GetProp`/`GetIndex`
/// silently produce `undefined` for every binding.
fn guard_against_nullish(c: &mut Compiler, src: Reg, span: Span) {
  let is_nullish = c.alloc_reg();
  c.emit(Op::IsNullish { dst: is_nullish, src }, span);
  let ok = c.label();
  c.emit_jump_if_false(is_nullish, ok, span);
  c.free_reg(is_nullish);
  let msg = c.alloc_reg();
  let msg_idx = c.constant(Constant::String(beef::lean::Cow::owned(
    "Cannot destructure 'null' or 'undefined'".to_string(),
  )));
  c.emit(Op::LoadConst { dst: msg, index: msg_idx }, span);
  c.emit(Op::Throw { src: msg }, span);
  c.free_reg(msg);
  c.bind_label(ok);
}

pub fn destructure_object_assign(c: &mut Compiler, pattern: &ast::ObjectPattern, src: Reg, span: Span) {
  guard_against_nullish(c, src, span);
  let mut seen_keys = Vec::new();
  for prop in &pattern.props {
    let v = c.alloc_reg();
    match &prop.key {
      ast::PropertyKey::Computed(e) => {
        let key = emit_expr(c, e);
        c.emit(Op::GetIndex { dst: v, obj: src, key }, span);
        c.free_reg(key);
      }
      _ => {
        let name = property_key_name(c, &prop.key, span);
        c.emit(Op::GetProp { dst: v, obj: src, name }, span);
        if let Some(s) = static_key_string(&prop.key) {
          seen_keys.push(s);
        }
      }
    }
    apply_default(c, v, prop.default.as_deref(), span);
    write_target(c, &prop.target, v, span);
    c.free_reg(v);
  }
  if let Some(rest) = &pattern.rest {
    let keys: Vec<beef::lean::Cow<'static, str>> =
      seen_keys.into_iter().map(beef::lean::Cow::owned).collect();
    let keys_idx = c.constant(Constant::StringArray(keys));
    let dst = c.alloc_reg();
    c.emit(Op::CopyObjectExcluding { dst, src, keys: keys_idx }, span);
    write_target(c, rest, dst, span);
    c.free_reg(dst);
  }
}

fn static_key_string(key: &ast::PropertyKey) -> Option<String> {
  match key {
    ast::PropertyKey::Ident(s) | ast::PropertyKey::String(s) => Some(s.clone()),
    ast::PropertyKey::Number(n) => Some(n.to_string()),
    ast::PropertyKey::Private(_) | ast::PropertyKey::Computed(_) => None,
  }
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
        "a computed key cannot be used as a static destructuring key",
      );
      0
    }
  }
}

// ---------------------------------------------------------------------
// declaration context
// ---------------------------------------------------------------------

pub fn declare_target(c: &mut Compiler, target: &ast::AssignTarget, kind: ast::DeclKind, tdz: bool, src: Reg, span: Span) {
  match target {
    ast::AssignTarget::Ident(ident) => {
      let site = c.define_binding(ident.as_str(), kind, tdz);
      store_binding_site(c, site, src, span);
      if tdz {
        c.initialize_tdz(ident.as_str());
      }
    }
    ast::AssignTarget::Array(pattern) => declare_array(c, pattern, kind, tdz, src, span),
    ast::AssignTarget::Object(pattern) => declare_object(c, pattern, kind, tdz, src, span),
    ast::AssignTarget::Member { .. } | ast::AssignTarget::Index { .. } => {
      c.error(
        DiagnosticKind::InvalidAssignmentTarget,
        span,
        "a member or index expression cannot be a declaration target",
      );
    }
  }
}

fn store_binding_site(c: &mut Compiler, site: crate::compiler::BindingSite, src: Reg, span: Span) {
  use crate::compiler::BindingSite;
  match site {
    BindingSite::Register(reg) => c.emit(Op::Move { dst: reg, src }, span),
    BindingSite::Spill(slot) => c.emit(Op::StoreSpill { slot: slot as u16, src }, span),
    BindingSite::Global(name) => c.emit(Op::SetGlobal { name, src }, span),
  };
}

/// Advances a `for-of`-style iterator one step and returns its next value,
/// or `undefined` without calling `.next()` again once `done` is already
/// true — mirrors `loops.rs`'s `emit_for_of` body, collapsed to a single
/// step since a destructuring pattern has a statically-known element
/// count rather than an unbounded loop.
fn next_iterator_value(c: &mut Compiler, iter: Reg, done: Reg, span: Span) -> Reg {
  let value = c.alloc_reg();
  c.emit(Op::LoadUndefined { dst: value }, span);
  let [do_next, finish] = c.labels::<2>();
  c.emit_jump_if_false(done, do_next, span);
  c.emit_jump(finish, span);
  c.bind_label(do_next);

  let next_base = c.alloc_contiguous(1);
  c.emit(Op::Move { dst: next_base, src: iter }, span);
  let next_name = c.constant_name("next");
  c.emit(Op::CallMethod { base: next_base, name: next_name, argc: 0 }, span);
  let done_name = c.constant_name("done");
  c.emit(Op::GetProp { dst: done, obj: next_base, name: done_name }, span);

  let not_done = c.alloc_reg();
  c.emit(Op::Not { dst: not_done, src: done }, span);
  c.emit_jump_if_false(not_done, finish, span);
  c.free_reg(not_done);

  let value_name = c.constant_name("value");
  c.emit(Op::GetProp { dst: value, obj: next_base, name: value_name }, span);
  c.free_reg(next_base);
  c.bind_label(finish);
  value
}

fn declare_array(c: &mut Compiler, pattern: &ast::ArrayPattern, kind: ast::DeclKind, tdz: bool, src: Reg, span: Span) {
  let iter_base = c.alloc_contiguous(1);
  c.emit(Op::Move { dst: iter_base, src }, span);
  let iterator_name = c.constant_name("Symbol.iterator");
  c.emit(Op::CallMethod { base: iter_base, name: iterator_name, argc: 0 }, span);
  let iter = iter_base;
  let done = c.alloc_reg();
  c.emit(Op::LoadFalse { dst: done }, span);

  for el in pattern.elements.iter() {
    let v = next_iterator_value(c, iter, done, span);
    let Some(el) = el else {
      c.free_reg(v);
      continue;
    };
    apply_default(c, v, el.default.as_deref(), span);
    declare_target(c, &el.target, kind, tdz, v, span);
    c.free_reg(v);
  }
  if let Some(rest) = &pattern.rest {
    let dst = c.alloc_reg();
    c.emit(Op::AllocArray { dst, len: 0 }, span);
    c.emit(Op::ArraySpread { dst, src: iter }, span);
    c.emit(Op::LoadTrue { dst: done }, span);
    declare_target(c, rest, kind, tdz, dst, span);
    c.free_reg(dst);
  }

  c.emit(Op::CleanupIfNotDone { iter, done }, span);
  c.free_reg(done);
  c.free_reg(iter);
}

fn declare_object(c: &mut Compiler, pattern: &ast::ObjectPattern, kind: ast::DeclKind, tdz: bool, src: Reg, span: Span) {
  guard_against_nullish(c, src, span);
  let mut seen_keys = Vec::new();
  for prop in &pattern.props {
    let v = c.alloc_reg();
    match &prop.key {
      ast::PropertyKey::Computed(e) => {
        let key = emit_expr(c, e);
        c.emit(Op::GetIndex { dst: v, obj: src, key }, span);
        c.free_reg(key);
      }
      _ => {
        let name = property_key_name(c, &prop.key, span);
        c.emit(Op::GetProp { dst: v, obj: src, name }, span);
        if let Some(s) = static_key_string(&prop.key) {
          seen_keys.push(s);
        }
      }
    }
    apply_default(c, v, prop.default.as_deref(), span);
    declare_target(c, &prop.target, kind, tdz, v, span);
    c.free_reg(v);
  }
  if let Some(rest) = &pattern.rest {
    let keys: Vec<beef::lean::Cow<'static, str>> =
      seen_keys.into_iter().map(beef::lean::Cow::owned).collect();
    let keys_idx = c.constant(Constant::StringArray(keys));
    let dst = c.alloc_reg();
    c.emit(Op::CopyObjectExcluding { dst, src, keys: keys_idx }, span);
    declare_target(c, rest, kind, tdz, dst, span);
    c.free_reg(dst);
  }
}
