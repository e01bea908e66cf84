// Lexically scoped name table: a stack of scopes, each a map from name to
// declaration info. Grounded on the scope-stack `Env<T>` pattern (push a
// map on scope entry, search innermost-to-outermost on lookup) rather than
// a parent-linked chain, since the code generator's block entry/exit is
// already a push/pop discipline this maps onto directly.

use std::collections::HashMap;

use crate::errors::{CompileError, SourceLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Parameter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub kind: SymbolKind,
    pub scope_depth: usize,
}

pub struct SymbolTable {
    scopes: Vec<HashMap<String, SymbolInfo>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { scopes: vec![HashMap::new()] }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn reset(&mut self) {
        self.scopes.clear();
        self.scopes.push(HashMap::new());
    }

    /// Declares `name` in the current (innermost) scope. Re-declaring an
    /// existing name in the *same* scope is a semantic error; shadowing an
    /// outer scope's name is fine.
    pub fn declare(&mut self, name: &str, kind: SymbolKind, location: SourceLocation) -> Result<(), CompileError> {
        let depth = self.depth();
        let scope = self.scopes.last_mut().expect("at least one scope always exists");
        if scope.contains_key(name) {
            return Err(CompileError::SemanticError {
                message: format!("'{}' is already declared in this scope", name),
                location,
            });
        }
        scope.insert(name.to_string(), SymbolInfo { kind, scope_depth: depth });
        Ok(())
    }

    /// Resolves a name against the active scope chain; a nested
    /// declaration shadows an outer one of the same name.
    pub fn lookup(&self, name: &str) -> Option<&SymbolInfo> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1, 1)
    }

    #[test]
    fn declare_and_lookup() {
        let mut table = SymbolTable::new();
        table.declare("x", SymbolKind::Variable, loc()).unwrap();
        assert!(table.is_declared("x"));
        assert!(!table.is_declared("y"));
    }

    #[test]
    fn redeclaration_in_same_scope_is_an_error() {
        let mut table = SymbolTable::new();
        table.declare("x", SymbolKind::Variable, loc()).unwrap();
        assert!(table.declare("x", SymbolKind::Variable, loc()).is_err());
    }

    #[test]
    fn shadowing_in_nested_scope_is_allowed() {
        let mut table = SymbolTable::new();
        table.declare("x", SymbolKind::Variable, loc()).unwrap();
        table.enter_scope();
        assert!(table.declare("x", SymbolKind::Variable, loc()).is_ok());
        table.exit_scope();
        assert!(table.is_declared("x"));
    }

    #[test]
    fn exit_scope_drops_inner_declarations() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare("inner", SymbolKind::Variable, loc()).unwrap();
        table.exit_scope();
        assert!(!table.is_declared("inner"));
    }
}
