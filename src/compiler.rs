//! Ties the register allocator, symbol table, and bytecode builder
//! together into the per-function state a tree walk needs, and threads
//! that state through nested function literals via an index-addressed
//! stack rather than owned parent pointers — sidestepping the ownership
//! cycle a literal `parent: &mut Compiler` borrow would create, the same
//! problem the teacher's `Function { parent: Option<Box<Function>> }` +
//! `std::mem::replace` dance solves, generalized here to support walking
//! more than one level up for upvalue chains.

use indexmap::IndexMap;

use wyvern_ast as ast;
use wyvern_diag::DiagnosticKind;
use wyvern_span::Span;

use crate::chunk::{Chunk, Constant, ExceptionEntry, FunctionFlags};
use crate::emit::builder::{Builder, Label};
use crate::error::{Diagnostic, Diagnostics, Result};
use crate::op::{Op, Reg, UpvalueDesc, UpvalueSource};
use crate::options::CompileOptions;
use crate::regalloc::{RegAlloc, BAD};
use crate::symtab::{BindingKind, SymbolTable};

/// Where a resolved identifier read/write ultimately lands.
#[derive(Debug, Clone, Copy)]
pub enum Resolved {
  Local(Reg),
  Spilled(u32),
  Upvalue(u16),
  Global(u16),
}

/// A loop or labeled-statement context, pushed while compiling its body
/// so `break`/`continue` can find their targets and cleanup.
pub struct LoopContext {
  pub label: Option<String>,
  pub continue_label: Label,
  pub break_label: Label,
  /// Set for `for-of`: the iterator/done registers every exit path from
  /// this loop must run `CleanupIfNotDone` against.
  pub iterator_cleanup: Option<(Reg, Reg)>,
  /// `false` for a labeled non-loop statement (e.g. a labeled block),
  /// which only `break` may target — `continue` to such a label is a
  /// semantic error the caller must report.
  pub is_loop: bool,
}

/// A `try ... finally` context. `break`/`continue`/`return` compiled
/// while this is on the stack must route through `finally_label` instead
/// of jumping directly, unless their target loop is above
/// `loop_depth_at_creation` (i.e. still inside the `try`).
pub struct FinallyContext {
  pub loop_depth_at_creation: usize,
  pub finally_label: Label,
}

struct FunctionState {
  name: String,
  builder: Builder,
  regalloc: RegAlloc,
  symtab: SymbolTable,
  flags: FunctionFlags,
  /// name -> (capture slot index in this function's own upvalue table,
  /// descriptor of where the parent should read it from).
  captures: IndexMap<String, UpvalueDesc>,
  loop_stack: Vec<LoopContext>,
  finally_stack: Vec<FinallyContext>,
  exception_table: Vec<ExceptionEntry>,
  is_in_opt_chain: bool,
  next_spill_slot: u32,
  scope_descriptor: Option<Vec<String>>,
}

impl FunctionState {
  fn new(name: String, flags: FunctionFlags) -> Self {
    Self {
      name,
      builder: Builder::new(),
      regalloc: RegAlloc::new(),
      symtab: SymbolTable::new(),
      flags,
      captures: IndexMap::new(),
      loop_stack: Vec::new(),
      finally_stack: Vec::new(),
      exception_table: Vec::new(),
      is_in_opt_chain: false,
      next_spill_slot: 0,
      scope_descriptor: None,
    }
  }
}

pub struct Compiler {
  pub options: CompileOptions,
  pub diagnostics: Diagnostics,
  stack: Vec<FunctionState>,
  globals: IndexMap<String, u16>,
}

impl Compiler {
  pub fn new(options: CompileOptions) -> Self {
    let flags = FunctionFlags {
      is_strict: options.strict_by_default,
      ..Default::default()
    };
    Self {
      options,
      diagnostics: Diagnostics::new(),
      stack: vec![FunctionState::new("<main>".to_string(), flags)],
      globals: IndexMap::new(),
    }
  }

  fn cur(&self) -> usize {
    self.stack.len() - 1
  }

  fn current(&mut self) -> &mut FunctionState {
    self.stack.last_mut().expect("compiler function stack underflow")
  }

  pub fn is_top_level(&self) -> bool {
    self.stack.len() == 1
  }

  pub fn current_flags(&self) -> FunctionFlags {
    self.stack.last().unwrap().flags
  }

  pub fn is_strict(&self) -> bool {
    self.stack.last().unwrap().flags.is_strict
  }

  pub fn set_in_opt_chain(&mut self, value: bool) -> bool {
    std::mem::replace(&mut self.current().is_in_opt_chain, value)
  }

  pub fn is_in_opt_chain(&self) -> bool {
    self.stack.last().unwrap().is_in_opt_chain
  }

  // ----- diagnostics -----------------------------------------------------

  pub fn error(&mut self, kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Reg {
    self.diagnostics.push(kind, span, message);
    BAD
  }

  // ----- registers ---------------------------------------------------------

  pub fn alloc_reg(&mut self) -> Reg {
    match self.current().regalloc.alloc() {
      Ok(r) => r,
      Err(_) => {
        self.diagnostics.push(
          DiagnosticKind::ResourceExhausted,
          Span::empty(),
          "register file exhausted",
        );
        BAD
      }
    }
  }

  pub fn alloc_contiguous(&mut self, count: u16) -> Reg {
    match self.current().regalloc.alloc_contiguous(count) {
      Ok(r) => r,
      Err(_) => {
        self.diagnostics.push(
          DiagnosticKind::ResourceExhausted,
          Span::empty(),
          format!("could not allocate {count} contiguous registers"),
        );
        BAD
      }
    }
  }

  pub fn try_alloc_contiguous(&mut self, count: u16) -> Option<Reg> {
    self.current().regalloc.try_alloc_contiguous(count)
  }

  pub fn max_contiguous_available(&mut self) -> u16 {
    self.current().regalloc.max_contiguous_available()
  }

  pub fn free_reg(&mut self, reg: Reg) {
    self.current().regalloc.free(reg);
  }

  pub fn pin_reg(&mut self, reg: Reg) {
    self.current().regalloc.pin(reg);
  }

  pub fn unpin_reg(&mut self, reg: Reg) {
    self.current().regalloc.unpin(reg);
  }

  fn alloc_spill_slot(&mut self) -> u32 {
    let slot = self.current().next_spill_slot;
    self.current().next_spill_slot += 1;
    slot
  }

  // ----- scopes -----------------------------------------------------

  pub fn push_scope(&mut self) {
    self.current().symtab.push_scope();
  }

  pub fn push_with_scope(&mut self) {
    self.current().symtab.push_with_scope();
  }

  pub fn pop_scope(&mut self) {
    self.current().symtab.pop_scope();
  }

  // ----- bindings -----------------------------------------------------

  /// Defines `name`, preferring a register but spilling when the
  /// function's variable pressure has exceeded the threshold. Returns
  /// the register actually holding the value right now (for spilled
  /// bindings, a scratch register the caller must store into and can
  /// then free — the symbol itself lives in the spill slot).
  pub fn define_binding(&mut self, name: &str, kind: ast::DeclKind, tdz: bool) -> BindingSite {
    if self.is_top_level() && matches!(kind, ast::DeclKind::Var) {
      let index = self.global_index(name);
      self.current().symtab.define_global(name, index);
      return BindingSite::Global(index);
    }

    if let Some(reg) = self.current().regalloc.try_alloc_for_variable() {
      match (kind, tdz) {
        (ast::DeclKind::Const, true) => self.current().symtab.define_const_tdz(name, reg),
        (ast::DeclKind::Const, false) => self.current().symtab.define_const(name, reg),
        (_, true) => self.current().symtab.define_tdz(name, reg),
        (_, false) => self.current().symtab.define(name, reg),
      }
      BindingSite::Register(reg)
    } else {
      let slot = self.alloc_spill_slot();
      match kind {
        ast::DeclKind::Const if tdz => self.current().symtab.define_const_tdz_spilled(name, slot),
        _ => self.current().symtab.define_spilled(name, slot),
      }
      BindingSite::Spill(slot)
    }
  }

  pub fn initialize_tdz(&mut self, name: &str) {
    self.current().symtab.initialize_tdz(name);
  }

  /// Binds `name` directly to `reg` rather than allocating a fresh one —
  /// used for simple-identifier parameters, which the calling convention
  /// already places in their argument register.
  pub fn bind_param(&mut self, name: &str, reg: Reg) {
    self.current().symtab.define(name, reg);
  }

  fn global_index(&mut self, name: &str) -> u16 {
    if let Some(i) = self.globals.get(name) {
      return *i;
    }
    let index = self.globals.len() as u16;
    self.globals.insert(name.to_string(), index);
    index
  }

  pub fn has_active_with_objects(&self) -> bool {
    self.stack.last().unwrap().symtab.has_active_with_objects()
  }

  pub fn resolve_with_property(&self, name: &str, is_from_with: bool) -> bool {
    self
      .stack
      .last()
      .unwrap()
      .symtab
      .resolve_with_property(name, is_from_with)
  }

  /// Resolves `name` to a local, an upvalue (capturing through as many
  /// enclosing functions as needed), or an implicit global.
  pub fn resolve_var(&mut self, name: &str) -> Resolved {
    if let Some(sym) = self.stack.last().unwrap().symtab.resolve(name) {
      return match sym.kind {
        BindingKind::Local(reg) => Resolved::Local(reg),
        BindingKind::Spilled(slot) => Resolved::Spilled(slot),
        BindingKind::Global(index) => Resolved::Global(index),
      };
    }

    if let Some(desc) = self.resolve_upvalue(self.cur(), name) {
      let slot = self
        .stack
        .last()
        .unwrap()
        .captures
        .get_index_of(name)
        .expect("just inserted");
      let _ = desc;
      return Resolved::Upvalue(slot as u16);
    }

    Resolved::Global(self.global_index(name))
  }

  /// Looks up a symbol without attempting upvalue capture, for callers
  /// (spill/TDZ/mutability checks) that need the raw binding kind.
  pub fn resolve_symbol(&self, name: &str) -> Option<(BindingKind, bool, bool)> {
    self
      .stack
      .last()
      .unwrap()
      .symtab
      .resolve(name)
      .map(|s| (s.kind, s.mutable, s.initialized))
  }

  fn resolve_upvalue(&mut self, idx: usize, name: &str) -> Option<UpvalueDesc> {
    if idx == 0 {
      return None;
    }
    if let Some(desc) = self.stack[idx].captures.get(name) {
      return Some(*desc);
    }
    let parent_idx = idx - 1;
    if let Some(sym) = self.stack[parent_idx].symtab.resolve(name) {
      let desc = match sym.kind {
        BindingKind::Local(reg) => {
          self.stack[parent_idx].regalloc.pin(reg);
          UpvalueDesc {
            source: UpvalueSource::ParentRegister,
            index: reg.0 as u16,
          }
        }
        BindingKind::Spilled(slot) if slot <= u8::MAX as u32 => UpvalueDesc {
          source: UpvalueSource::ParentSpill8,
          index: slot as u16,
        },
        BindingKind::Spilled(slot) => UpvalueDesc {
          source: UpvalueSource::ParentSpill16,
          index: slot as u16,
        },
        BindingKind::Global(_) => return None,
      };
      self.stack[idx].captures.insert(name.to_string(), desc);
      return Some(desc);
    }

    self.resolve_upvalue(parent_idx, name)?;
    let parent_slot = self.stack[parent_idx]
      .captures
      .get_index_of(name)
      .expect("resolve_upvalue just inserted this") as u16;
    let desc = UpvalueDesc {
      source: UpvalueSource::ParentUpvalue,
      index: parent_slot,
    };
    self.stack[idx].captures.insert(name.to_string(), desc);
    Some(desc)
  }

  // ----- emission -----------------------------------------------------

  pub fn emit(&mut self, op: Op, span: Span) -> usize {
    self.current().builder.emit(op, span)
  }

  pub fn label(&mut self) -> Label {
    self.current().builder.label()
  }

  pub fn labels<const N: usize>(&mut self) -> [Label; N] {
    self.current().builder.labels::<N>()
  }

  pub fn bind_label(&mut self, label: Label) {
    self.current().builder.bind_label(label)
  }

  pub fn emit_jump(&mut self, label: Label, span: Span) -> usize {
    self.current().builder.emit_jump(label, span)
  }

  pub fn emit_jump_if_false(&mut self, test: Reg, label: Label, span: Span) -> usize {
    self.current().builder.emit_jump_if_false(test, label, span)
  }

  pub fn emit_jump_if_undefined(&mut self, test: Reg, label: Label, span: Span) -> usize {
    self
      .current()
      .builder
      .emit_jump_if_undefined(test, label, span)
  }

  pub fn emit_jump_if_nullish(&mut self, test: Reg, label: Label, span: Span) -> usize {
    self
      .current()
      .builder
      .emit_jump_if_nullish(test, label, span)
  }

  pub fn constant_name(&mut self, name: &str) -> u16 {
    self.current().builder.constant_name(name)
  }

  pub fn constant(&mut self, value: Constant) -> u16 {
    self.current().builder.constant(value)
  }

  pub fn pos(&mut self) -> usize {
    self.current().builder.pos()
  }

  // ----- loop / finally context -----------------------------------------------------

  pub fn push_loop(&mut self, label: Option<String>, iterator_cleanup: Option<(Reg, Reg)>) {
    let continue_label = self.label();
    let break_label = self.label();
    self.current().loop_stack.push(LoopContext {
      label,
      continue_label,
      break_label,
      iterator_cleanup,
      is_loop: true,
    });
  }

  /// Pushes a breakable (but not continuable) context for a labeled
  /// statement whose body is not itself a loop.
  pub fn push_labeled_block(&mut self, label: String) {
    self.push_breakable(Some(label));
  }

  /// Pushes a breakable (but not continuable) context, optionally
  /// labeled. Used for both labeled non-loop statements and `switch`,
  /// which `break` may always target but `continue` never can.
  pub fn push_breakable(&mut self, label: Option<String>) {
    let continue_label = self.label();
    let break_label = self.label();
    self.current().loop_stack.push(LoopContext {
      label,
      continue_label,
      break_label,
      iterator_cleanup: None,
      is_loop: false,
    });
  }

  pub fn loop_is_loop(&self, index: usize) -> bool {
    self.stack.last().unwrap().loop_stack[index].is_loop
  }

  pub fn pop_loop(&mut self) -> LoopContext {
    self
      .current()
      .loop_stack
      .pop()
      .expect("loop stack underflow")
  }

  pub fn loop_stack_len(&self) -> usize {
    self.stack.last().unwrap().loop_stack.len()
  }

  /// Finds the target loop for a labeled/unlabeled break or continue,
  /// from innermost outward.
  pub fn find_loop(&self, label: Option<&str>) -> Option<usize> {
    let loops = &self.stack.last().unwrap().loop_stack;
    match label {
      None => {
        if loops.is_empty() {
          None
        } else {
          Some(loops.len() - 1)
        }
      }
      Some(l) => loops
        .iter()
        .rposition(|ctx| ctx.label.as_deref() == Some(l)),
    }
  }

  pub fn loop_break_label(&self, index: usize) -> Label {
    self.stack.last().unwrap().loop_stack[index].break_label
  }

  pub fn loop_continue_label(&self, index: usize) -> Label {
    self.stack.last().unwrap().loop_stack[index].continue_label
  }

  pub fn loop_cleanup(&self, index: usize) -> Option<(Reg, Reg)> {
    self.stack.last().unwrap().loop_stack[index].iterator_cleanup
  }

  /// Emits `CleanupIfNotDone` for every `for-of` loop strictly inside
  /// `target_index` (exclusive) out to the innermost active loop,
  /// innermost first — the cleanup sequence a labeled `continue` must
  /// run while unwinding through intervening loops without exiting its
  /// own target. `target_index == None` cleans up every active loop
  /// (used by `return`, which always exits past all of them).
  pub fn emit_cleanups_through(&mut self, target_index: Option<usize>, span: Span) {
    let start = target_index.map(|i| i + 1).unwrap_or(0);
    self.emit_cleanups_from(start, span);
  }

  /// Like `emit_cleanups_through`, but also cleans up `target_index`
  /// itself — what a `break` needs, since a `break` (unlike `continue`)
  /// actually exits its target loop, which may itself be a `for-of`
  /// whose iterator is still live.
  pub fn emit_cleanups_including(&mut self, target_index: usize, span: Span) {
    self.emit_cleanups_from(target_index, span);
  }

  fn emit_cleanups_from(&mut self, start: usize, span: Span) {
    let loops: Vec<Option<(Reg, Reg)>> = self.stack.last().unwrap().loop_stack[start..]
      .iter()
      .map(|l| l.iterator_cleanup)
      .collect();
    for cleanup in loops.into_iter().rev() {
      if let Some((iter, done)) = cleanup {
        self.emit(Op::CleanupIfNotDone { iter, done }, span);
      }
    }
  }

  pub fn push_finally(&mut self) -> Label {
    let finally_label = self.label();
    let depth = self.loop_stack_len();
    self.current().finally_stack.push(FinallyContext {
      loop_depth_at_creation: depth,
      finally_label,
    });
    finally_label
  }

  pub fn pop_finally(&mut self) -> FinallyContext {
    self
      .current()
      .finally_stack
      .pop()
      .expect("finally stack underflow")
  }

  pub fn record_exception_entry(&mut self, try_start: usize, try_end: usize, catch_target: Option<usize>, finally_target: Option<usize>) {
    self.current().exception_table.push(ExceptionEntry {
      try_start: try_start as u32,
      try_end: try_end as u32,
      catch_target: catch_target.map(|v| v as u32),
      finally_target: finally_target.map(|v| v as u32),
    });
  }

  /// `true` when a pending break/continue/return must route through at
  /// least one active `finally` before reaching `target_loop_depth`
  /// (`None` for `return`, which always routes through every active
  /// finally).
  pub fn finally_contexts_between(&self, target_loop_depth: Option<usize>) -> Vec<Label> {
    let target = target_loop_depth.unwrap_or(usize::MAX);
    self
      .stack
      .last()
      .unwrap()
      .finally_stack
      .iter()
      .filter(|f| f.loop_depth_at_creation > target || target_loop_depth.is_none())
      .map(|f| f.finally_label)
      .collect()
  }

  // ----- function nesting -----------------------------------------------------

  pub fn push_function(&mut self, name: String, flags: FunctionFlags) -> Result<()> {
    if self.options.check_recursion_limit && self.stack.len() as u32 >= self.options.max_compiler_depth {
      return Err(Diagnostic::new(
        DiagnosticKind::ResourceExhausted,
        Span::empty(),
        "function nesting exceeds the configured compiler depth limit",
      ));
    }
    self.stack.push(FunctionState::new(name, flags));
    Ok(())
  }

  pub fn set_scope_descriptor(&mut self, names: Vec<String>) {
    self.current().scope_descriptor = Some(names);
  }

  /// Pops the innermost function, resolving its jump labels and handing
  /// back the finished chunk plus the capture descriptors its *own*
  /// upvalue table is built from (in slot order) — the parent uses these
  /// to emit the `Closure` instruction.
  pub fn pop_function(&mut self) -> Result<(Chunk, Vec<UpvalueDesc>)> {
    let mut state = self.stack.pop().expect("function stack underflow");
    state.builder.resolve_labels()?;
    let (code, lines, const_pool) = state.builder.build();
    let frame_size = state.regalloc.max_regs();
    let upvalues: Vec<UpvalueDesc> = state.captures.values().copied().collect();
    let chunk = Chunk {
      name: beef::lean::Cow::owned(state.name),
      frame_size,
      spill_count: state.next_spill_slot,
      code,
      lines,
      const_pool,
      flags: state.flags,
      scope_descriptor: state
        .scope_descriptor
        .map(|v| v.into_iter().map(beef::lean::Cow::owned).collect()),
      exception_table: state.exception_table,
    };
    Ok((chunk, upvalues))
  }
}

#[derive(Debug, Clone, Copy)]
pub enum BindingSite {
  Register(Reg),
  Spill(u32),
  Global(u16),
}
