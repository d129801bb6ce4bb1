//! The per-function bytecode container and its constant pool.

use std::fmt;
use std::rc::Rc;

use beef::lean::Cow;

use crate::op::Op;

/// A value that can live in a chunk's constant pool. Tagged values,
/// numbers, and nested function blueprints only — there is no VM here to
/// give these a runtime representation, so this is deliberately the
/// smallest type that lets instructions reference pooled data.
#[derive(Clone, Debug)]
pub enum Constant {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  BigInt(String),
  String(Cow<'static, str>),
  /// A pre-built array of string keys, used by `CopyObjectExcluding` for
  /// rest-property destructuring where every excluded key is static.
  StringArray(Vec<Cow<'static, str>>),
  Function(Rc<Chunk>),
}

impl fmt::Display for Constant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Constant::Undefined => write!(f, "undefined"),
      Constant::Null => write!(f, "null"),
      Constant::Bool(v) => write!(f, "{v}"),
      Constant::Number(v) => write!(f, "{v}"),
      Constant::BigInt(v) => write!(f, "{v}n"),
      Constant::String(v) => write!(f, "{v:?}"),
      Constant::StringArray(v) => write!(f, "{v:?}"),
      Constant::Function(v) => write!(f, "<function {}>", v.name),
    }
  }
}

/// One `try` block's protected instruction range and where control
/// resumes when it unwinds. Instruction indices, not byte offsets, same
/// as everywhere else in this typed `Op` stream — a real encoder is
/// responsible for lowering these the same way it lowers jump operands.
#[derive(Clone, Copy, Debug)]
pub struct ExceptionEntry {
  pub try_start: u32,
  pub try_end: u32,
  pub catch_target: Option<u32>,
  pub finally_target: Option<u32>,
}

/// Structural flags describing how a chunk's function may be called or
/// resumed, independent of anything an opcode encodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FunctionFlags {
  pub is_arrow: bool,
  pub is_generator: bool,
  pub is_async: bool,
  pub is_method: bool,
  pub is_strict: bool,
}

/// One compiled function, including the top-level program (whose
/// `name` is `"<main>"`).
#[derive(Clone, Debug)]
pub struct Chunk {
  pub name: Cow<'static, str>,
  /// Register-file size the VM must reserve for this frame.
  pub frame_size: u32,
  /// Count of spill slots this frame's spill area must hold.
  pub spill_count: u32,
  pub code: Vec<Op>,
  /// One source line per instruction in `code`, same length and index.
  pub lines: Vec<u32>,
  pub const_pool: Vec<Constant>,
  pub flags: FunctionFlags,
  /// Present only for functions that may be the target of a direct
  /// `eval`; lets the VM reconstruct a lexical scope dynamically.
  pub scope_descriptor: Option<Vec<Cow<'static, str>>>,
  pub exception_table: Vec<ExceptionEntry>,
}

impl Chunk {
  pub fn disassemble(&self, print_operands: bool) -> String {
    let mut out = String::new();
    self.disassemble_inner(&mut out, print_operands);
    out
  }

  fn disassemble_inner(&self, out: &mut String, print_operands: bool) {
    use std::fmt::Write;

    for v in self.const_pool.iter() {
      if let Constant::Function(func) = v {
        func.disassemble_inner(out, print_operands);
        out.push('\n');
      }
    }

    writeln!(out, "function <{}>:", self.name).unwrap();
    writeln!(out, "  frame_size: {}", self.frame_size).unwrap();
    writeln!(out, "  spill_count: {}", self.spill_count).unwrap();
    writeln!(out, "  length: {}", self.code.len()).unwrap();

    if self.const_pool.is_empty() {
      writeln!(out, "  const: <empty>").unwrap();
    } else {
      writeln!(out, "  const (length={}):", self.const_pool.len()).unwrap();
      for (i, value) in self.const_pool.iter().enumerate() {
        writeln!(out, "    {i}: {value}").unwrap();
      }
    }

    writeln!(out, "  code:").unwrap();
    let offset_align = self.code.len().to_string().len();
    for (pc, (op, line)) in self.code.iter().zip(self.lines.iter()).enumerate() {
      if print_operands {
        writeln!(out, "    {pc:offset_align$} {line:>5} | {op:?}").unwrap();
      } else {
        writeln!(out, "    {pc:offset_align$} {line:>5} | {}", op_name(op)).unwrap();
      }
    }
  }
}

fn op_name(op: &Op) -> &'static str {
  macro_rules! name_of {
    ($op:expr, $($variant:ident),* $(,)?) => {
      match $op {
        $(Op::$variant { .. } => stringify!($variant),)*
        Op::ReturnUndefined => "ReturnUndefined",
        Op::ReturnFinally => "ReturnFinally",
      }
    };
  }
  name_of!(
    op,
    Move,
    LoadConst,
    LoadUndefined,
    LoadNull,
    LoadSelf,
    LoadSuper,
    LoadException,
    LoadTrue,
    LoadFalse,
    LoadUninitialized,
    LoadGlobal,
    SetGlobal,
    LoadFree,
    SetFree,
    LoadSpill,
    StoreSpill,
    CloseUpvalue,
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
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Instanceof,
    Unary,
    Not,
    IsNullish,
    MakeEmptyObject,
    MakeArray,
    AllocArray,
    ArrayCopy,
    ArraySpread,
    ArraySlice,
    ObjectSpread,
    CopyObjectExcluding,
    GetProp,
    SetProp,
    GetPropOpt,
    DefineDataProperty,
    DefineAccessor,
    DefineAccessorDynamic,
    DefineMethodEnumerable,
    DefineMethodEnumerableDynamic,
    SetPrototype,
    GetIndex,
    SetIndex,
    GetIndexOpt,
    ToPropertyKey,
    GetPrivateField,
    SetPrivateField,
    GetOwnKeys,
    DeleteProp,
    DeleteIndex,
    Jump,
    JumpIfFalse,
    JumpIfUndefined,
    JumpIfNullish,
    Call,
    CallMethod,
    New,
    Closure,
    Throw,
    Return,
    PushBreak,
    PushContinue,
    InitYield,
    CleanupIfNotDone,
    CollectRestArgs,
  )
}
