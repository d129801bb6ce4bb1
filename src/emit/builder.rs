//! Bytecode emission helpers: a flat op/line stream plus the two-phase
//! jump pattern (placeholder now, patch once the target is known).
//!
//! This crate's `Chunk::code` is a typed `Vec<Op>` rather than an encoded
//! byte string — there is no VM here to decode bytes for. A jump
//! `offset` is therefore a signed instruction-index delta rather than a
//! signed byte delta; a real encoder (out of scope) is responsible for
//! turning that into the big-endian byte offset the external opcode
//! contract promises. The bounds check is kept at the same `i16` width
//! regardless, so the overflow invariant is exercised the same way.

use beef::lean::Cow;

use crate::chunk::Constant;
use crate::op::{JumpOffset, Op, Reg};
use wyvern_diag::DiagnosticKind;
use wyvern_span::Span;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Clone, Copy)]
enum LabelTarget {
  Unbound,
  Bound(usize),
}

struct PendingJump {
  op_index: usize,
  label: Label,
}

pub struct Builder {
  ops: Vec<Op>,
  lines: Vec<u32>,
  const_pool: Vec<Constant>,
  labels: Vec<LabelTarget>,
  pending: Vec<PendingJump>,
}

impl Default for Builder {
  fn default() -> Self {
    Self::new()
  }
}

impl Builder {
  pub fn new() -> Self {
    Self {
      ops: Vec::new(),
      lines: Vec::new(),
      const_pool: Vec::new(),
      labels: Vec::new(),
      pending: Vec::new(),
    }
  }

  pub fn pos(&self) -> usize {
    self.ops.len()
  }

  pub fn emit(&mut self, op: Op, span: Span) -> usize {
    let index = self.ops.len();
    self.ops.push(op);
    self.lines.push(span.lo);
    index
  }

  pub fn label(&mut self) -> Label {
    self.labels.push(LabelTarget::Unbound);
    Label(self.labels.len() - 1)
  }

  pub fn labels<const N: usize>(&mut self) -> [Label; N] {
    std::array::from_fn(|_| self.label())
  }

  /// Binds `label` to the *next* instruction to be emitted.
  pub fn bind_label(&mut self, label: Label) {
    self.labels[label.0] = LabelTarget::Bound(self.ops.len());
  }

  pub fn emit_jump(&mut self, label: Label, span: Span) -> usize {
    let index = self.emit(Op::Jump { offset: 0 }, span);
    self.pending.push(PendingJump {
      op_index: index,
      label,
    });
    index
  }

  pub fn emit_jump_if_false(&mut self, test: Reg, label: Label, span: Span) -> usize {
    let index = self.emit(Op::JumpIfFalse { test, offset: 0 }, span);
    self.pending.push(PendingJump {
      op_index: index,
      label,
    });
    index
  }

  pub fn emit_jump_if_undefined(&mut self, test: Reg, label: Label, span: Span) -> usize {
    let index = self.emit(Op::JumpIfUndefined { test, offset: 0 }, span);
    self.pending.push(PendingJump {
      op_index: index,
      label,
    });
    index
  }

  pub fn emit_jump_if_nullish(&mut self, test: Reg, label: Label, span: Span) -> usize {
    let index = self.emit(Op::JumpIfNullish { test, offset: 0 }, span);
    self.pending.push(PendingJump {
      op_index: index,
      label,
    });
    index
  }

  /// Patches a jump placeholder directly to a known instruction index,
  /// bypassing the label table — used by loop/finally contexts where the
  /// target position is only known once the construct is fully emitted
  /// and placeholders were recorded by op index instead.
  pub fn patch_jump_to(&mut self, op_index: usize, target: usize) -> Result<()> {
    let offset = Self::compute_offset(op_index, target)?;
    Self::write_offset(&mut self.ops[op_index], offset);
    Ok(())
  }

  fn compute_offset(op_index: usize, target: usize) -> Result<JumpOffset> {
    let delta = target as i64 - (op_index as i64 + 1);
    if delta < i16::MIN as i64 || delta > i16::MAX as i64 {
      return Err(wyvern_diag::Diagnostic::new(
        DiagnosticKind::OffsetOverflow,
        Span::empty(),
        format!("jump offset {delta} exceeds the 16-bit signed range"),
      ));
    }
    Ok(delta as i16)
  }

  fn write_offset(op: &mut Op, offset: JumpOffset) {
    match op {
      Op::Jump { offset: o } => *o = offset,
      Op::JumpIfFalse { offset: o, .. } => *o = offset,
      Op::JumpIfUndefined { offset: o, .. } => *o = offset,
      Op::JumpIfNullish { offset: o, .. } => *o = offset,
      other => unreachable!("not a jump instruction: {other:?}"),
    }
  }

  /// Resolves every label-based placeholder recorded via `emit_jump*`.
  /// Must be called once, after the function body is fully emitted and
  /// every label referenced by a pending jump has been bound.
  pub fn resolve_labels(&mut self) -> Result<()> {
    let pending = std::mem::take(&mut self.pending);
    for PendingJump { op_index, label } in pending {
      let target = match self.labels[label.0] {
        LabelTarget::Bound(pos) => pos,
        LabelTarget::Unbound => unreachable!("label {:?} was never bound", label.0),
      };
      self.patch_jump_to(op_index, target)?;
    }
    Ok(())
  }

  /// Interns a string constant, reusing an existing slot when the value
  /// already appears in the pool (keeps emitted chunks deterministic and
  /// small for repeated identifiers/property names).
  pub fn constant_name(&mut self, name: &str) -> u16 {
    if let Some(i) = self.const_pool.iter().position(|c| match c {
      Constant::String(s) => s.as_ref() == name,
      _ => false,
    }) {
      return i as u16;
    }
    self.constant(Constant::String(Cow::owned(name.to_string())))
  }

  pub fn constant(&mut self, value: Constant) -> u16 {
    self.const_pool.push(value);
    (self.const_pool.len() - 1) as u16
  }

  pub fn patch_ops(&mut self, f: impl FnOnce(&mut Vec<Op>)) {
    f(&mut self.ops);
  }

  pub fn build(self) -> (Vec<Op>, Vec<u32>, Vec<Constant>) {
    (self.ops, self.lines, self.const_pool)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn forward_jump_patches_to_bound_position() {
    let mut b = Builder::new();
    let end = b.label();
    b.emit_jump_if_false(Reg(0), end, Span::empty());
    b.emit(Op::LoadTrue { dst: Reg(1) }, Span::empty());
    b.bind_label(end);
    b.emit(Op::ReturnUndefined, Span::empty());
    b.resolve_labels().unwrap();
    match b.ops[0] {
      Op::JumpIfFalse { offset, .. } => assert_eq!(offset, 1),
      _ => panic!("expected JumpIfFalse"),
    }
  }

  #[test]
  fn backward_jump_patches_negative_offset() {
    let mut b = Builder::new();
    let start = b.label();
    b.bind_label(start);
    b.emit(Op::LoadTrue { dst: Reg(0) }, Span::empty());
    b.emit_jump(start, Span::empty());
    b.resolve_labels().unwrap();
    match b.ops[1] {
      Op::Jump { offset } => assert_eq!(offset, -2),
      _ => panic!("expected Jump"),
    }
  }

  #[test]
  fn string_constants_are_interned() {
    let mut b = Builder::new();
    let a = b.constant_name("x");
    let c = b.constant_name("y");
    let d = b.constant_name("x");
    assert_eq!(a, d);
    assert_ne!(a, c);
  }
}
