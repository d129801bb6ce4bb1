//! AST node definitions consumed by the code generator.
//!
//! This crate owns no lexer and no parser: it is the tree shape the
//! generator pattern-matches against, annotated by whatever checker sits
//! in front of it. `is_from_with` and `reflect_hint` are the only two
//! checker-to-generator contracts this crate models (see the `with`
//! statement and `Call` node respectively).

pub mod builder;

use std::ops::Deref;

use wyvern_span::Span;

/// Wraps a node with the source span it was parsed from. Dereferences to
/// the node itself so call sites read naturally: `match &*expr`.
#[derive(Debug, Clone)]
pub struct Spanned<T> {
  pub span: Span,
  pub node: T,
}

impl<T> Spanned<T> {
  pub fn new(span: Span, node: T) -> Self {
    Self { span, node }
  }
}

impl<T> Deref for Spanned<T> {
  type Target = T;
  fn deref(&self) -> &T {
    &self.node
  }
}

pub type Expr = Spanned<ExprKind>;
pub type Stmt = Spanned<StmtKind>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(pub String);

impl Ident {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for Ident {
  fn from(value: &str) -> Self {
    Ident(value.to_string())
  }
}

#[derive(Debug, Clone)]
pub enum Literal {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  BigInt(String),
  String(String),
  /// `/pattern/flags`
  Regex { pattern: String, flags: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Pow,
  Eq,
  Ne,
  StrictEq,
  StrictNe,
  Lt,
  Le,
  Gt,
  Ge,
  Shl,
  Shr,
  UShr,
  BitAnd,
  BitOr,
  BitXor,
  In,
  Instanceof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
  And,
  Or,
  Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Plus,
  Minus,
  Not,
  BitNot,
  TypeOf,
  Void,
  Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
  Inc,
  Dec,
}

/// `=` or a compound assignment operator (`+=`, `&&=`, ...). Logical
/// assignment operators are distinguished from arithmetic/bitwise ones
/// because they short-circuit the right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
  Assign,
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Pow,
  BitAnd,
  BitOr,
  BitXor,
  Shl,
  Shr,
  UShr,
  LogicalAnd,
  LogicalOr,
  Coalesce,
}

impl AssignOp {
  pub fn is_logical(self) -> bool {
    matches!(
      self,
      AssignOp::LogicalAnd | AssignOp::LogicalOr | AssignOp::Coalesce
    )
  }

  /// The plain binary operator a compound (non-logical) assignment
  /// desugars to, e.g. `+=` -> `Add`.
  pub fn as_binary(self) -> Option<BinaryOp> {
    Some(match self {
      AssignOp::Add => BinaryOp::Add,
      AssignOp::Sub => BinaryOp::Sub,
      AssignOp::Mul => BinaryOp::Mul,
      AssignOp::Div => BinaryOp::Div,
      AssignOp::Rem => BinaryOp::Rem,
      AssignOp::Pow => BinaryOp::Pow,
      AssignOp::BitAnd => BinaryOp::BitAnd,
      AssignOp::BitOr => BinaryOp::BitOr,
      AssignOp::BitXor => BinaryOp::BitXor,
      AssignOp::Shl => BinaryOp::Shl,
      AssignOp::Shr => BinaryOp::Shr,
      AssignOp::UShr => BinaryOp::UShr,
      _ => return None,
    })
  }
}

#[derive(Debug, Clone)]
pub enum PropertyKey {
  Ident(String),
  /// `#name` — a class-private field.
  Private(String),
  String(String),
  Number(f64),
  Computed(Box<Expr>),
}

/// The left-hand side of an assignment, a declarator, a parameter, or a
/// destructuring element. Identifier/index/member are the base cases;
/// array/object recurse.
#[derive(Debug, Clone)]
pub enum AssignTarget {
  Ident(Ident),
  Member {
    object: Box<Expr>,
    property: PropertyKey,
    optional: bool,
  },
  Index {
    object: Box<Expr>,
    index: Box<Expr>,
    optional: bool,
  },
  Array(ArrayPattern),
  Object(ObjectPattern),
}

#[derive(Debug, Clone)]
pub struct PatternElement {
  pub target: AssignTarget,
  pub default: Option<Box<Expr>>,
}

#[derive(Debug, Clone)]
pub struct ArrayPattern {
  /// `None` entries are elisions: `let [, b] = arr`.
  pub elements: Vec<Option<PatternElement>>,
  pub rest: Option<Box<AssignTarget>>,
}

#[derive(Debug, Clone)]
pub struct ObjectPatternProp {
  pub key: PropertyKey,
  pub target: AssignTarget,
  pub default: Option<Box<Expr>>,
}

#[derive(Debug, Clone)]
pub struct ObjectPattern {
  pub props: Vec<ObjectPatternProp>,
  pub rest: Option<Box<AssignTarget>>,
}

#[derive(Debug, Clone)]
pub enum ArrayElement {
  Item(Expr),
  Spread(Expr),
  /// Elision: `[1, , 3]`.
  Hole,
}

#[derive(Debug, Clone)]
pub enum ObjectProperty {
  KeyValue { key: PropertyKey, value: Expr },
  Shorthand(Ident),
  Method { key: PropertyKey, func: Box<Function> },
  Spread(Expr),
}

#[derive(Debug, Clone)]
pub struct TemplatePart {
  pub quasi: String,
  pub expr: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
  Var,
  Let,
  Const,
}

#[derive(Debug, Clone)]
pub struct VarDeclarator {
  pub target: AssignTarget,
  pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
  pub kind: DeclKind,
  pub declarators: Vec<VarDeclarator>,
}

#[derive(Debug, Clone)]
pub struct Param {
  pub target: AssignTarget,
  pub default: Option<Expr>,
}

#[derive(Debug, Clone, Default)]
pub struct Params {
  pub items: Vec<Param>,
  pub rest: Option<AssignTarget>,
}

impl Params {
  /// ECMAScript `function.length`: count of parameters before the first
  /// one with a default value, a rest target, or a destructuring target.
  pub fn length(&self) -> u32 {
    let mut n = 0;
    for p in &self.items {
      if p.default.is_some() || !matches!(p.target, AssignTarget::Ident(_)) {
        break;
      }
      n += 1;
    }
    n
  }

  /// Arity: every parameter except an implicit `this`, i.e. simply the
  /// declared parameter count (rest parameters are not counted).
  pub fn arity(&self) -> u32 {
    self.items.len() as u32
  }
}

#[derive(Debug, Clone)]
pub struct Function {
  pub name: Option<Ident>,
  pub params: Params,
  pub body: Vec<Stmt>,
  pub is_arrow: bool,
  pub is_generator: bool,
  pub is_async: bool,
  pub is_method: bool,
  /// Set by the checker when the body opens with a `"use strict"` directive,
  /// or when the function is a class method (always strict).
  pub has_strict_directive: bool,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
  /// `None` marks the `default:` case.
  pub test: Option<Expr>,
  pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum ForInit {
  Decl(VarDecl),
  Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct CatchClause {
  pub param: Option<AssignTarget>,
  pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct TryStmt {
  pub block: Vec<Stmt>,
  pub handler: Option<CatchClause>,
  pub finalizer: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
  Literal(Literal),
  Ident(Ident),
  This,
  Super,
  Array(Vec<ArrayElement>),
  Object(Vec<ObjectProperty>),
  Template(Vec<TemplatePart>),
  Function(Box<Function>),
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  Update {
    op: UpdateOp,
    prefix: bool,
    target: Box<AssignTarget>,
  },
  Binary {
    op: BinaryOp,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  Logical {
    op: LogicalOp,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  Assign {
    op: AssignOp,
    target: Box<AssignTarget>,
    value: Box<Expr>,
  },
  Conditional {
    test: Box<Expr>,
    consequent: Box<Expr>,
    alternate: Box<Expr>,
  },
  Member {
    object: Box<Expr>,
    property: PropertyKey,
    optional: bool,
  },
  Index {
    object: Box<Expr>,
    index: Box<Expr>,
    optional: bool,
  },
  Call {
    callee: Box<Expr>,
    args: Vec<ArrayElement>,
    optional: bool,
    /// Set by the checker when it statically resolved the callee to a
    /// known builtin; the generator may use this to skip the generic
    /// dynamic-dispatch call opcode. Absent otherwise.
    reflect_hint: Option<u32>,
  },
  New {
    callee: Box<Expr>,
    args: Vec<ArrayElement>,
  },
  Sequence(Vec<Expr>),
  Spread(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum StmtKind {
  VarDecl(VarDecl),
  Expr(Expr),
  Block(Vec<Stmt>),
  Empty,
  If {
    test: Expr,
    consequent: Box<Stmt>,
    alternate: Option<Box<Stmt>>,
  },
  While {
    test: Expr,
    body: Box<Stmt>,
  },
  DoWhile {
    body: Box<Stmt>,
    test: Expr,
  },
  For {
    init: Option<ForInit>,
    test: Option<Expr>,
    update: Option<Expr>,
    body: Box<Stmt>,
  },
  ForIn {
    decl_kind: Option<DeclKind>,
    target: AssignTarget,
    object: Expr,
    body: Box<Stmt>,
  },
  ForOf {
    decl_kind: Option<DeclKind>,
    target: AssignTarget,
    iterable: Expr,
    body: Box<Stmt>,
    is_await: bool,
  },
  Switch {
    discriminant: Expr,
    cases: Vec<SwitchCase>,
  },
  Return(Option<Expr>),
  Break(Option<Ident>),
  Continue(Option<Ident>),
  Labeled {
    label: Ident,
    body: Box<Stmt>,
  },
  Try(TryStmt),
  Throw(Expr),
  /// Checker has already flagged which identifiers inside `body` may
  /// resolve dynamically through `object`; see `is_from_with` on `Ident`
  /// reads within.
  With {
    object: Expr,
    body: Box<Stmt>,
  },
  FunctionDecl(Box<Function>),
  ClassDecl(Box<Class>),
}

#[derive(Debug, Clone)]
pub struct ClassMember {
  pub key: PropertyKey,
  pub func: Function,
  pub is_static: bool,
}

#[derive(Debug, Clone)]
pub struct Class {
  pub name: Option<Ident>,
  pub super_class: Option<Expr>,
  pub methods: Vec<ClassMember>,
}

#[derive(Debug, Clone)]
pub struct Module {
  pub body: Vec<Stmt>,
  pub is_strict: bool,
}
