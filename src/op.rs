//! The opcode contract this crate promises to a hypothetical VM.
//!
//! Only the *shape* of each instruction matters here — there is no
//! interpreter in this crate. Every multi-byte operand that reaches a
//! real instruction stream is encoded big-endian (see `chunk::encode`);
//! while compiling, instructions are kept in this typed form so that the
//! register allocator's patch pass (`regalloc::patch_registers`) can
//! rewrite register operands in place without re-parsing bytes.

/// A register index into the current call frame. `0..=253` is the usable
/// range; `254`/`255` are reserved sentinels (see `regalloc::Reg`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(pub u8);

/// Byte offset for a forward/backward jump, relative to the instruction
/// following the 2-byte offset operand. Patched in place by the two-phase
/// jump helpers in `emit::builder`.
pub type JumpOffset = i16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryKind {
  Plus,
  Neg,
  BitNot,
  TypeOf,
  Void,
}

/// Tags an upvalue descriptor's capture source, matching the closure
/// operand layout byte-for-byte: `0` upvalue-of-parent, `1`
/// register-of-parent, `2` 8-bit parent spill slot, `3` 16-bit parent
/// spill slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpvalueSource {
  ParentUpvalue = 0,
  ParentRegister = 1,
  ParentSpill8 = 2,
  ParentSpill16 = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDesc {
  pub source: UpvalueSource,
  pub index: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
  // -- moves and loads --------------------------------------------------
  Move { dst: Reg, src: Reg },
  LoadConst { dst: Reg, index: u16 },
  LoadUndefined { dst: Reg },
  LoadNull { dst: Reg },
  /// Loads the currently executing closure. Used for `this`, and for the
  /// inner self-binding a named function expression introduces so its
  /// body can recurse by its own name without an outer variable to
  /// capture.
  LoadSelf { dst: Reg },
  LoadSuper { dst: Reg },
  /// Reads the value currently being unwound into a `catch` handler.
  /// Valid only at a handler entry point named by the chunk's
  /// `exception_table`.
  LoadException { dst: Reg },
  LoadTrue { dst: Reg },
  LoadFalse { dst: Reg },
  /// TDZ sentinel: reading this value before `InitializeTdz` is reached
  /// in real execution is what produces the TDZ fault.
  LoadUninitialized { dst: Reg },
  LoadGlobal { dst: Reg, name: u16 },
  SetGlobal { name: u16, src: Reg },
  LoadFree { dst: Reg, index: u16 },
  SetFree { index: u16, src: Reg },
  LoadSpill { dst: Reg, slot: u16 },
  StoreSpill { slot: u16, src: Reg },
  /// Emitted once per per-iteration binding at the end of a loop body (and
  /// once before the first test in a C-style `for`), closing any upvalue
  /// that currently points at `reg` so the next iteration gets a fresh one.
  CloseUpvalue { reg: Reg },

  // -- arithmetic / bitwise / compare ------------------------------------
  Add { dst: Reg, lhs: Reg, rhs: Reg },
  Sub { dst: Reg, lhs: Reg, rhs: Reg },
  Mul { dst: Reg, lhs: Reg, rhs: Reg },
  Div { dst: Reg, lhs: Reg, rhs: Reg },
  Rem { dst: Reg, lhs: Reg, rhs: Reg },
  Pow { dst: Reg, lhs: Reg, rhs: Reg },
  BitAnd { dst: Reg, lhs: Reg, rhs: Reg },
  BitOr { dst: Reg, lhs: Reg, rhs: Reg },
  BitXor { dst: Reg, lhs: Reg, rhs: Reg },
  Shl { dst: Reg, lhs: Reg, rhs: Reg },
  Shr { dst: Reg, lhs: Reg, rhs: Reg },
  UShr { dst: Reg, lhs: Reg, rhs: Reg },
  Eq { dst: Reg, lhs: Reg, rhs: Reg },
  Ne { dst: Reg, lhs: Reg, rhs: Reg },
  StrictEq { dst: Reg, lhs: Reg, rhs: Reg },
  StrictNe { dst: Reg, lhs: Reg, rhs: Reg },
  Lt { dst: Reg, lhs: Reg, rhs: Reg },
  Le { dst: Reg, lhs: Reg, rhs: Reg },
  Gt { dst: Reg, lhs: Reg, rhs: Reg },
  Ge { dst: Reg, lhs: Reg, rhs: Reg },
  In { dst: Reg, lhs: Reg, rhs: Reg },
  Instanceof { dst: Reg, lhs: Reg, rhs: Reg },
  Unary { dst: Reg, src: Reg, kind: UnaryKind },
  Not { dst: Reg, src: Reg },
  IsNullish { dst: Reg, src: Reg },

  // -- objects / arrays ---------------------------------------------------
  MakeEmptyObject { dst: Reg },
  /// `count <= 255`; elements live in `count` contiguous registers
  /// starting at `start`.
  MakeArray { dst: Reg, start: Reg, count: u8 },
  /// Fallback for literals wider than 255 elements: allocate the backing
  /// store up front...
  AllocArray { dst: Reg, len: u16 },
  /// ...then append in chunks of up to 255 contiguous registers.
  ArrayCopy { dst: Reg, start: Reg, count: u8 },
  ArraySpread { dst: Reg, src: Reg },
  /// Numeric-index rest extraction used by assignment-context (not
  /// declaration-context) array destructuring: `dst = src[start..]`.
  ArraySlice { dst: Reg, src: Reg, start: u16 },
  ObjectSpread { dst: Reg, src: Reg },
  /// `dst = { ...src } ` minus the named keys — backs rest-property
  /// destructuring (`{a, ...rest}`). `keys` indexes a constant-pool array
  /// of the excluded key strings.
  CopyObjectExcluding { dst: Reg, src: Reg, keys: u16 },
  GetProp { dst: Reg, obj: Reg, name: u16 },
  SetProp { obj: Reg, name: u16, src: Reg },
  GetPropOpt { dst: Reg, obj: Reg, name: u16 },
  DefineDataProperty { obj: Reg, name: u16, src: Reg },
  DefineAccessor { obj: Reg, name: u16, getter: Reg, setter: Reg },
  DefineAccessorDynamic { obj: Reg, key: Reg, getter: Reg, setter: Reg },
  DefineMethodEnumerable { obj: Reg, name: u16, func: Reg },
  DefineMethodEnumerableDynamic { obj: Reg, key: Reg, func: Reg },
  SetPrototype { obj: Reg, proto: Reg },
  GetIndex { dst: Reg, obj: Reg, key: Reg },
  SetIndex { obj: Reg, key: Reg, src: Reg },
  GetIndexOpt { dst: Reg, obj: Reg, key: Reg },
  ToPropertyKey { dst: Reg, src: Reg },
  GetPrivateField { dst: Reg, obj: Reg, name: u16 },
  SetPrivateField { obj: Reg, name: u16, src: Reg },
  GetOwnKeys { dst: Reg, obj: Reg },
  DeleteProp { dst: Reg, obj: Reg, name: u16 },
  DeleteIndex { dst: Reg, obj: Reg, key: Reg },

  // -- control flow ---------------------------------------------------
  Jump { offset: JumpOffset },
  JumpIfFalse { test: Reg, offset: JumpOffset },
  JumpIfUndefined { test: Reg, offset: JumpOffset },
  JumpIfNullish { test: Reg, offset: JumpOffset },

  // -- calls ---------------------------------------------------------
  /// `base` holds the callee; `base+1..=base+argc` hold the (contiguous)
  /// arguments. The return value is written back into `base`.
  Call { base: Reg, argc: u8 },
  /// Fused property-lookup + call: `base` holds the receiver;
  /// `base+1..=base+argc` hold the arguments.
  CallMethod { base: Reg, name: u16, argc: u8 },
  New { base: Reg, argc: u8 },
  Closure { dst: Reg, function: u16, upvalues: Vec<UpvalueDesc> },

  // -- exceptions & completions ---------------------------------------------------
  Throw { src: Reg },
  Return { src: Reg },
  ReturnUndefined,
  /// Re-dispatches a pending completion (break/continue/return) recorded
  /// by `PushBreak`/`PushContinue`/before entering a `finally` block.
  ReturnFinally,
  PushBreak { target: u16 },
  PushContinue { target: u16 },
  InitYield { dst: Reg },
  /// Rest-parameter prologue: collects every actual argument from index
  /// `start` onward into a fresh array at `dst`. The call's true argument
  /// count is a runtime-only quantity this crate's static `Op` stream
  /// never carries, so unlike every other array-building op this one is
  /// a single fixed-shape instruction rather than a `MakeArray`-style
  /// contiguous-registers sequence.
  CollectRestArgs { dst: Reg, start: u8 },

  // -- iterator protocol ---------------------------------------------------
  /// `if !done { iter.return() }` — the for-of cleanup guard.
  CleanupIfNotDone { iter: Reg, done: Reg },
}
