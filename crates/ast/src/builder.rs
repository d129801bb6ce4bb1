//! Small constructor helpers for building fixture trees in tests.
//!
//! There is no parser in this workspace, so tests that want to exercise
//! the code generator build the tree by hand. These helpers just save
//! typing `Spanned::new(Span::empty(), ...)` everywhere; none of them
//! are used by the generator itself.

use wyvern_span::Span;

use crate::*;

pub fn expr(kind: ExprKind) -> Expr {
  Spanned::new(Span::empty(), kind)
}

pub fn stmt(kind: StmtKind) -> Stmt {
  Spanned::new(Span::empty(), kind)
}

pub fn ident(name: &str) -> Ident {
  Ident(name.to_string())
}

pub fn num(value: f64) -> Expr {
  expr(ExprKind::Literal(Literal::Number(value)))
}

pub fn str_lit(value: &str) -> Expr {
  expr(ExprKind::Literal(Literal::String(value.to_string())))
}

pub fn boolean(value: bool) -> Expr {
  expr(ExprKind::Literal(Literal::Bool(value)))
}

pub fn undefined() -> Expr {
  expr(ExprKind::Literal(Literal::Undefined))
}

pub fn get(name: &str) -> Expr {
  expr(ExprKind::Ident(ident(name)))
}

pub fn target_ident(name: &str) -> AssignTarget {
  AssignTarget::Ident(ident(name))
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
  expr(ExprKind::Binary {
    op,
    left: Box::new(left),
    right: Box::new(right),
  })
}

pub fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
  expr(ExprKind::Logical {
    op,
    left: Box::new(left),
    right: Box::new(right),
  })
}

pub fn assign(op: AssignOp, target: AssignTarget, value: Expr) -> Expr {
  expr(ExprKind::Assign {
    op,
    target: Box::new(target),
    value: Box::new(value),
  })
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
  expr(ExprKind::Call {
    callee: Box::new(callee),
    args: args.into_iter().map(ArrayElement::Item).collect(),
    optional: false,
    reflect_hint: None,
  })
}

pub fn member(object: Expr, name: &str) -> Expr {
  expr(ExprKind::Member {
    object: Box::new(object),
    property: PropertyKey::Ident(name.to_string()),
    optional: false,
  })
}

pub fn index(object: Expr, key: Expr) -> Expr {
  expr(ExprKind::Index {
    object: Box::new(object),
    index: Box::new(key),
    optional: false,
  })
}

pub fn var_decl(kind: DeclKind, name: &str, init: Option<Expr>) -> Stmt {
  stmt(StmtKind::VarDecl(VarDecl {
    kind,
    declarators: vec![VarDeclarator {
      target: target_ident(name),
      init,
    }],
  }))
}

pub fn expr_stmt(e: Expr) -> Stmt {
  stmt(StmtKind::Expr(e))
}

pub fn block(stmts: Vec<Stmt>) -> Stmt {
  stmt(StmtKind::Block(stmts))
}

pub fn return_stmt(e: Option<Expr>) -> Stmt {
  stmt(StmtKind::Return(e))
}

pub fn if_stmt(test: Expr, consequent: Stmt, alternate: Option<Stmt>) -> Stmt {
  stmt(StmtKind::If {
    test,
    consequent: Box::new(consequent),
    alternate: alternate.map(Box::new),
  })
}

pub fn while_stmt(test: Expr, body: Stmt) -> Stmt {
  stmt(StmtKind::While {
    test,
    body: Box::new(body),
  })
}

pub fn module(body: Vec<Stmt>) -> Module {
  Module {
    body,
    is_strict: false,
  }
}

pub fn function(name: Option<&str>, params: Params, body: Vec<Stmt>) -> Function {
  Function {
    name: name.map(ident),
    params,
    body,
    is_arrow: false,
    is_generator: false,
    is_async: false,
    is_method: false,
    has_strict_directive: false,
  }
}

pub fn param(name: &str) -> Param {
  Param {
    target: target_ident(name),
    default: None,
  }
}
