//! Lexical scope stack for a single function's compilation.
//!
//! Resolution never crosses a function boundary by itself — a miss at
//! the root scope of one `Compiler` is reported back to the caller
//! (`compiler::Compiler::resolve_upvalue`), which consults the enclosing
//! `Compiler`'s table explicitly. That keeps this module ignorant of the
//! parent/child relationship entirely.

use indexmap::IndexMap;

use crate::op::Reg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
  Local(Reg),
  Spilled(u32),
  Global(u16),
}

#[derive(Debug, Clone)]
pub struct Symbol {
  pub name: String,
  pub kind: BindingKind,
  pub mutable: bool,
  /// `false` until the declaration that introduced this binding has
  /// "executed" in program order; reads while `false` are TDZ faults.
  pub initialized: bool,
  pub is_this_parameter: bool,
}

struct Scope {
  symbols: IndexMap<String, Symbol>,
  /// Set when this scope is the body of a `with` statement; read/write
  /// of checker-flagged identifiers routes through the with-object
  /// instead of (or in addition to) lexical resolution.
  has_with_object: bool,
}

pub struct SymbolTable {
  scopes: Vec<Scope>,
}

impl Default for SymbolTable {
  fn default() -> Self {
    Self::new()
  }
}

impl SymbolTable {
  pub fn new() -> Self {
    Self {
      scopes: vec![Scope {
        symbols: IndexMap::new(),
        has_with_object: false,
      }],
    }
  }

  pub fn push_scope(&mut self) {
    self.scopes.push(Scope {
      symbols: IndexMap::new(),
      has_with_object: false,
    });
  }

  pub fn push_with_scope(&mut self) {
    self.scopes.push(Scope {
      symbols: IndexMap::new(),
      has_with_object: true,
    });
  }

  pub fn pop_scope(&mut self) {
    self
      .scopes
      .pop()
      .expect("symbol table scope stack underflow");
  }

  fn current_mut(&mut self) -> &mut Scope {
    self.scopes.last_mut().expect("no active scope")
  }

  fn define_raw(&mut self, name: &str, kind: BindingKind, mutable: bool, initialized: bool) {
    self.current_mut().symbols.insert(
      name.to_string(),
      Symbol {
        name: name.to_string(),
        kind,
        mutable,
        initialized,
        is_this_parameter: false,
      },
    );
  }

  pub fn define(&mut self, name: &str, reg: Reg) {
    self.define_raw(name, BindingKind::Local(reg), true, true);
  }

  pub fn define_const(&mut self, name: &str, reg: Reg) {
    self.define_raw(name, BindingKind::Local(reg), false, true);
  }

  pub fn define_tdz(&mut self, name: &str, reg: Reg) {
    self.define_raw(name, BindingKind::Local(reg), true, false);
  }

  pub fn define_const_tdz(&mut self, name: &str, reg: Reg) {
    self.define_raw(name, BindingKind::Local(reg), false, false);
  }

  pub fn define_global(&mut self, name: &str, global_index: u16) {
    self.define_raw(name, BindingKind::Global(global_index), true, true);
  }

  pub fn define_spilled(&mut self, name: &str, slot: u32) {
    self.define_raw(name, BindingKind::Spilled(slot), true, true);
  }

  pub fn define_const_tdz_spilled(&mut self, name: &str, slot: u32) {
    self.define_raw(name, BindingKind::Spilled(slot), false, false);
  }

  pub fn mark_this_parameter(&mut self, name: &str) {
    if let Some(sym) = self.current_mut().symbols.get_mut(name) {
      sym.is_this_parameter = true;
    }
  }

  /// Clears the TDZ flag once the declaration statement that introduced
  /// `name` has been compiled.
  pub fn initialize_tdz(&mut self, name: &str) {
    for scope in self.scopes.iter_mut().rev() {
      if let Some(sym) = scope.symbols.get_mut(name) {
        sym.initialized = true;
        return;
      }
    }
  }

  /// Walk outward from the innermost scope looking for `name`. Does not
  /// cross into an enclosing function — that is the caller's job.
  pub fn resolve(&self, name: &str) -> Option<&Symbol> {
    for scope in self.scopes.iter().rev() {
      if let Some(sym) = scope.symbols.get(name) {
        return Some(sym);
      }
    }
    None
  }

  pub fn has_active_with_objects(&self) -> bool {
    self.scopes.iter().any(|s| s.has_with_object)
  }

  /// Returns `true` when a name should be resolved through the nearest
  /// active `with` object rather than lexically, per the checker's
  /// `is_from_with` annotation on the read/write site. Lexical bindings
  /// introduced *inside* the `with` body (e.g. its own `let`s) still take
  /// priority: this only applies when `resolve` finds nothing closer.
  pub fn resolve_with_property(&self, name: &str, is_from_with: bool) -> bool {
    is_from_with && self.has_active_with_objects() && self.resolve(name).is_none()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shadowing_resolves_innermost_first() {
    let mut t = SymbolTable::new();
    t.define("x", Reg(0));
    t.push_scope();
    t.define("x", Reg(1));
    assert_eq!(t.resolve("x").unwrap().kind, BindingKind::Local(Reg(1)));
    t.pop_scope();
    assert_eq!(t.resolve("x").unwrap().kind, BindingKind::Local(Reg(0)));
  }

  #[test]
  fn tdz_round_trip() {
    let mut t = SymbolTable::new();
    t.define_tdz("x", Reg(0));
    assert!(!t.resolve("x").unwrap().initialized);
    t.initialize_tdz("x");
    assert!(t.resolve("x").unwrap().initialized);
  }

  #[test]
  fn with_property_only_when_unshadowed() {
    let mut t = SymbolTable::new();
    t.push_with_scope();
    assert!(t.resolve_with_property("x", true));
    t.define("x", Reg(2));
    assert!(!t.resolve_with_property("x", true));
    assert!(!t.resolve_with_property("x", false));
  }
}
