//! Function and class lowering: parameter binding (including defaults,
//! rest, and destructuring), strict-mode propagation, the generator
//! prologue, and the self-binding a named function expression needs to
//! recurse without an outer variable to capture.

use wyvern_ast as ast;
use wyvern_diag::DiagnosticKind;
use wyvern_span::Span;

use crate::chunk::{Constant, FunctionFlags};
use crate::compiler::Compiler;
use crate::op::{Op, Reg};
use crate::regalloc::BAD;

use super::destructure::{apply_default, declare_target};
use super::stmt::emit_block;

fn function_flags(c: &Compiler, func: &ast::Function) -> FunctionFlags {
  FunctionFlags {
    is_arrow: func.is_arrow,
    is_generator: func.is_generator,
    is_async: func.is_async,
    is_method: func.is_method,
    is_strict: c.is_strict() || func.has_strict_directive,
  }
}

/// Compiles `func`'s body into a standalone `Chunk` and emits a `Closure`
/// instruction for it into the *current* (enclosing) function, returning
/// the register holding the closure value. `self_name` is the identifier
/// a named function expression may recurse by.
fn compile_function(c: &mut Compiler, func: &ast::Function, self_name: Option<&str>, span: Span) -> Reg {
  let name = func
    .name
    .as_ref()
    .map(|n| n.as_str().to_string())
    .or_else(|| self_name.map(str::to_string))
    .unwrap_or_else(|| "<anonymous>".to_string());
  let flags = function_flags(c, func);

  if let Err(diag) = c.push_function(name, flags) {
    c.diagnostics.push(diag.kind, diag.span, diag.message);
    return BAD;
  }

  if !func.is_arrow {
    let self_binding = self_name.or_else(|| func.name.as_ref().map(|n| n.as_str()));
    if let Some(self_binding) = self_binding {
      let self_reg = c.alloc_reg();
      c.emit(Op::LoadSelf { dst: self_reg }, span);
      c.bind_param(self_binding, self_reg);
    }
  }

  if func.is_generator {
    let dst = c.alloc_reg();
    c.emit(Op::InitYield { dst }, span);
    c.free_reg(dst);
  }

  bind_params(c, &func.params, span);

  emit_block(c, &func.body);
  c.emit(Op::ReturnUndefined, span);

  let (chunk, upvalues) = match c.pop_function() {
    Ok(pair) => pair,
    Err(diag) => {
      c.diagnostics.push(diag.kind, diag.span, diag.message);
      return BAD;
    }
  };

  let function_index = c.constant(Constant::Function(std::rc::Rc::new(chunk)));
  let dst = c.alloc_reg();
  c.emit(
    Op::Closure {
      dst,
      function: function_index,
      upvalues,
    },
    span,
  );
  dst
}

fn bind_params(c: &mut Compiler, params: &ast::Params, span: Span) {
  // Reserve registers 0..arity up front so they coincide with the
  // calling convention's fixed argument registers before any other
  // allocation in the body can claim them.
  let arg_regs: Vec<Reg> = (0..params.items.len()).map(|_| c.alloc_reg()).collect();

  // Simple-identifier parameter names, in order, for the forward-reference
  // check below. A pattern/rest parameter can't be named by a later
  // default, so it's simply absent from this list rather than tracked.
  let param_names: Vec<Option<&str>> = params
    .items
    .iter()
    .map(|p| match &p.target {
      ast::AssignTarget::Ident(ident) => Some(ident.as_str()),
      _ => None,
    })
    .collect();

  for (i, (param, reg)) in params.items.iter().zip(arg_regs.iter().copied()).enumerate() {
    if let Some(default) = &param.default {
      let later: Vec<String> = param_names[i + 1..]
        .iter()
        .filter_map(|n| n.map(str::to_string))
        .collect();
      check_forward_param_refs(c, default, &later);
    }
    apply_default(c, reg, param.default.as_ref(), span);
    match &param.target {
      ast::AssignTarget::Ident(ident) => c.bind_param(ident.as_str(), reg),
      _ => declare_target(c, &param.target, ast::DeclKind::Let, false, reg, span),
    }
  }

  if let Some(rest) = &params.rest {
    let dst = c.alloc_reg();
    c.emit(
      Op::CollectRestArgs {
        dst,
        start: params.items.len() as u8,
      },
      span,
    );
    declare_target(c, rest, ast::DeclKind::Let, false, dst, span);
    c.free_reg(dst);
  }
}

/// Parameter defaults evaluate strictly left to right as part of a single
/// call's synchronous setup, so (unlike a `let` read through a closure)
/// there is no way for a default to observe a later parameter except by
/// naming it directly — a purely static check is sound here. Does not
/// recurse into nested function bodies: those are separately scoped and
/// resolve any reference through upvalue capture, not this frame's
/// parameter registers, so they can't actually hit the TDZ this check
/// guards against.
fn check_forward_param_refs(c: &mut Compiler, expr: &ast::Expr, later_params: &[String]) {
  if later_params.is_empty() {
    return;
  }
  match &expr.node {
    ast::ExprKind::Ident(ident) => {
      if later_params.iter().any(|p| p == ident.as_str()) {
        c.error(
          DiagnosticKind::SemanticError,
          expr.span,
          format!("cannot access '{}' before initialization", ident.as_str()),
        );
      }
    }
    ast::ExprKind::Literal(_) | ast::ExprKind::This | ast::ExprKind::Super | ast::ExprKind::Function(_) => {}
    ast::ExprKind::Array(elements) => {
      for el in elements {
        match el {
          ast::ArrayElement::Item(e) | ast::ArrayElement::Spread(e) => check_forward_param_refs(c, e, later_params),
          ast::ArrayElement::Hole => {}
        }
      }
    }
    ast::ExprKind::Object(props) => {
      for p in props {
        match p {
          ast::ObjectProperty::KeyValue { key, value } => {
            check_forward_param_refs_key(c, key, later_params);
            check_forward_param_refs(c, value, later_params);
          }
          ast::ObjectProperty::Shorthand(ident) => {
            if later_params.iter().any(|p| p == ident.as_str()) {
              c.error(
                DiagnosticKind::SemanticError,
                expr.span,
                format!("cannot access '{}' before initialization", ident.as_str()),
              );
            }
          }
          ast::ObjectProperty::Method { key, .. } => check_forward_param_refs_key(c, key, later_params),
          ast::ObjectProperty::Spread(e) => check_forward_param_refs(c, e, later_params),
        }
      }
    }
    ast::ExprKind::Template(parts) => {
      for part in parts {
        if let Some(e) = &part.expr {
          check_forward_param_refs(c, e, later_params);
        }
      }
    }
    ast::ExprKind::Unary { operand, .. } => check_forward_param_refs(c, operand, later_params),
    ast::ExprKind::Update { target, .. } => check_forward_param_refs_target(c, target, later_params),
    ast::ExprKind::Binary { left, right, .. } | ast::ExprKind::Logical { left, right, .. } => {
      check_forward_param_refs(c, left, later_params);
      check_forward_param_refs(c, right, later_params);
    }
    ast::ExprKind::Assign { target, value, .. } => {
      check_forward_param_refs_target(c, target, later_params);
      check_forward_param_refs(c, value, later_params);
    }
    ast::ExprKind::Conditional { test, consequent, alternate } => {
      check_forward_param_refs(c, test, later_params);
      check_forward_param_refs(c, consequent, later_params);
      check_forward_param_refs(c, alternate, later_params);
    }
    ast::ExprKind::Member { object, property, .. } => {
      check_forward_param_refs(c, object, later_params);
      check_forward_param_refs_key(c, property, later_params);
    }
    ast::ExprKind::Index { object, index, .. } => {
      check_forward_param_refs(c, object, later_params);
      check_forward_param_refs(c, index, later_params);
    }
    ast::ExprKind::Call { callee, args, .. } => {
      check_forward_param_refs(c, callee, later_params);
      for a in args {
        match a {
          ast::ArrayElement::Item(e) | ast::ArrayElement::Spread(e) => check_forward_param_refs(c, e, later_params),
          ast::ArrayElement::Hole => {}
        }
      }
    }
    ast::ExprKind::New { callee, args } => {
      check_forward_param_refs(c, callee, later_params);
      for a in args {
        match a {
          ast::ArrayElement::Item(e) | ast::ArrayElement::Spread(e) => check_forward_param_refs(c, e, later_params),
          ast::ArrayElement::Hole => {}
        }
      }
    }
    ast::ExprKind::Sequence(exprs) => {
      for e in exprs {
        check_forward_param_refs(c, e, later_params);
      }
    }
    ast::ExprKind::Spread(e) => check_forward_param_refs(c, e, later_params),
  }
}

fn check_forward_param_refs_key(c: &mut Compiler, key: &ast::PropertyKey, later_params: &[String]) {
  if let ast::PropertyKey::Computed(e) = key {
    check_forward_param_refs(c, e, later_params);
  }
}

fn check_forward_param_refs_target(c: &mut Compiler, target: &ast::AssignTarget, later_params: &[String]) {
  match target {
    ast::AssignTarget::Ident(_) => {}
    ast::AssignTarget::Member { object, property, .. } => {
      check_forward_param_refs(c, object, later_params);
      check_forward_param_refs_key(c, property, later_params);
    }
    ast::AssignTarget::Index { object, index, .. } => {
      check_forward_param_refs(c, object, later_params);
      check_forward_param_refs(c, index, later_params);
    }
    ast::AssignTarget::Array(pattern) => {
      for el in pattern.elements.iter().flatten() {
        check_forward_param_refs_target(c, &el.target, later_params);
        if let Some(d) = &el.default {
          check_forward_param_refs(c, d, later_params);
        }
      }
      if let Some(rest) = &pattern.rest {
        check_forward_param_refs_target(c, rest, later_params);
      }
    }
    ast::AssignTarget::Object(pattern) => {
      for prop in &pattern.props {
        check_forward_param_refs_key(c, &prop.key, later_params);
        check_forward_param_refs_target(c, &prop.target, later_params);
        if let Some(d) = &prop.default {
          check_forward_param_refs(c, d, later_params);
        }
      }
      if let Some(rest) = &pattern.rest {
        check_forward_param_refs_target(c, rest, later_params);
      }
    }
  }
}

pub fn emit_function_expr(c: &mut Compiler, func: &ast::Function, span: Span) -> Reg {
  compile_function(c, func, None, span)
}

pub fn emit_function_decl(c: &mut Compiler, func: &ast::Function, span: Span) {
  let name = func
    .name
    .as_ref()
    .expect("function declarations always carry a name")
    .as_str()
    .to_string();
  let value = compile_function(c, func, None, span);
  let site = c.define_binding(&name, ast::DeclKind::Var, false);
  store_site(c, site, value, span);
  c.free_reg(value);
}

fn store_site(c: &mut Compiler, site: crate::compiler::BindingSite, src: Reg, span: Span) {
  use crate::compiler::BindingSite;
  match site {
    BindingSite::Register(reg) => c.emit(Op::Move { dst: reg, src }, span),
    BindingSite::Spill(slot) => c.emit(Op::StoreSpill { slot: slot as u16, src }, span),
    BindingSite::Global(name) => c.emit(Op::SetGlobal { name, src }, span),
  };
}

pub fn emit_class_decl(c: &mut Compiler, class: &ast::Class, span: Span) {
  let proto = c.alloc_reg();
  c.emit(Op::MakeEmptyObject { dst: proto }, span);

  let ctor_func = class
    .methods
    .iter()
    .find(|m| !m.is_static && is_constructor_key(&m.key))
    .map(|m| m.func.clone());

  let class_name = class.name.as_ref().map(|n| n.as_str().to_string());
  let synthesized;
  let ctor_ast: &ast::Function = match &ctor_func {
    Some(func) => func,
    None => {
      synthesized = synthesize_default_constructor(class.super_class.is_some());
      &synthesized
    }
  };
  let ctor = compile_function(c, ctor_ast, class_name.as_deref(), span);
  c.emit(Op::SetPrototype { obj: ctor, proto }, span);

  if let Some(super_class) = &class.super_class {
    let super_reg = super::expr::emit_expr(c, super_class);
    let proto_name = c.constant_name("prototype");
    let super_proto = c.alloc_reg();
    c.emit(Op::GetProp { dst: super_proto, obj: super_reg, name: proto_name }, span);
    c.emit(Op::SetPrototype { obj: proto, proto: super_proto }, span);
    c.free_reg(super_proto);
    c.free_reg(super_reg);
  }

  for member in &class.methods {
    if is_constructor_key(&member.key) && !member.is_static {
      continue;
    }
    let target = if member.is_static { ctor } else { proto };
    let method = compile_function(c, &member.func, None, span);
    match &member.key {
      ast::PropertyKey::Computed(e) => {
        let key = super::expr::emit_expr(c, e);
        c.emit(Op::DefineMethodEnumerableDynamic { obj: target, key, func: method }, span);
        c.free_reg(key);
      }
      _ => {
        let name = method_key_name(c, &member.key, span);
        c.emit(Op::DefineMethodEnumerable { obj: target, name, func: method }, span);
      }
    }
    c.free_reg(method);
  }
  c.free_reg(proto);

  if let Some(name) = &class_name {
    let site = c.define_binding(name, ast::DeclKind::Let, true);
    store_site(c, site, ctor, span);
    c.initialize_tdz(name);
  }
  c.free_reg(ctor);
}

fn is_constructor_key(key: &ast::PropertyKey) -> bool {
  matches!(key, ast::PropertyKey::Ident(name) if name == "constructor")
}

fn method_key_name(c: &mut Compiler, key: &ast::PropertyKey, span: Span) -> u16 {
  match key {
    ast::PropertyKey::Ident(s) | ast::PropertyKey::String(s) => c.constant_name(s),
    ast::PropertyKey::Private(s) => c.constant_name(s),
    ast::PropertyKey::Number(n) => c.constant_name(&n.to_string()),
    ast::PropertyKey::Computed(_) => {
      c.error(
        wyvern_diag::DiagnosticKind::UnsupportedConstruct,
        span,
        "expected a static method key",
      );
      0
    }
  }
}

/// A class with no explicit `constructor` gets an implicit one: empty,
/// or (when the class extends another) a bare `super()` forwarding call
/// — this crate has no variadic spread-call opcode over an implicit
/// `arguments` object, so unlike real ECMAScript the synthesized
/// constructor does not forward its own arguments to `super`.
fn synthesize_default_constructor(has_super: bool) -> ast::Function {
  let body = if has_super {
    vec![ast::Spanned::new(
      Span::empty(),
      ast::StmtKind::Expr(ast::Spanned::new(
        Span::empty(),
        ast::ExprKind::Call {
          callee: Box::new(ast::Spanned::new(Span::empty(), ast::ExprKind::Super)),
          args: Vec::new(),
          optional: false,
          reflect_hint: None,
        },
      )),
    )]
  } else {
    Vec::new()
  };
  ast::Function {
    name: None,
    params: ast::Params::default(),
    body,
    is_arrow: false,
    is_generator: false,
    is_async: false,
    is_method: true,
    has_strict_directive: true,
  }
}
