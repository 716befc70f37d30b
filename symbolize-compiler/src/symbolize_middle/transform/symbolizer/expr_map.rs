// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//
//! Map from the values of a procedure to the handles of their symbolic expressions.

use std::collections::HashMap;
use symbolize_ir::{Operand, ValueId};

/// The symbolic counterpart of a concrete value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymExpr {
    /// The value is statically known to be concrete.
    Absent,
    /// The value whose runtime content is the expression handle.
    Handle(ValueId),
}

impl SymExpr {
    /// The operand that passes this expression to the runtime. Absent expressions are null.
    pub fn operand(self) -> Operand {
        match self {
            SymExpr::Absent => Operand::null(),
            SymExpr::Handle(handle) => Operand::Value(handle),
        }
    }

    pub fn handle(self) -> Option<ValueId> {
        match self {
            SymExpr::Absent => None,
            SymExpr::Handle(handle) => Some(handle),
        }
    }

    pub fn is_absent(self) -> bool {
        self == SymExpr::Absent
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExprMap {
    entries: HashMap<ValueId, SymExpr>,
}

impl ExprMap {
    /// Bind the expression of `value`. Each value is bound once.
    pub fn insert(&mut self, value: ValueId, expr: SymExpr) {
        let previous = self.entries.insert(value, expr);
        assert!(previous.is_none(), "Value {value} already has an expression");
    }

    pub fn get(&self, value: ValueId) -> Option<SymExpr> {
        self.entries.get(&value).copied()
    }

    /// The expression of an operand. Constants and values not yet visited are absent.
    pub fn lookup(&self, operand: &Operand) -> SymExpr {
        operand.as_value().and_then(|value| self.get(value)).unwrap_or(SymExpr::Absent)
    }

    /// Make every entry bound to handle `from` use handle `to`.
    pub fn redirect(&mut self, from: ValueId, to: ValueId) {
        for expr in self.entries.values_mut().filter(|expr| **expr == SymExpr::Handle(from)) {
            *expr = SymExpr::Handle(to);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ValueId, SymExpr)> + '_ {
        self.entries.iter().map(|(value, expr)| (*value, *expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let mut map = ExprMap::default();
        map.insert(ValueId(0), SymExpr::Handle(ValueId(3)));
        map.insert(ValueId(1), SymExpr::Absent);
        assert_eq!(map.lookup(&Operand::Value(ValueId(0))), SymExpr::Handle(ValueId(3)));
        assert_eq!(map.lookup(&Operand::Value(ValueId(1))), SymExpr::Absent);
        assert_eq!(map.lookup(&Operand::Value(ValueId(9))), SymExpr::Absent);
        assert_eq!(map.lookup(&Operand::int(4, 32)).operand(), Operand::null());
    }

    #[test]
    #[should_panic(expected = "already has an expression")]
    fn test_single_binding() {
        let mut map = ExprMap::default();
        map.insert(ValueId(0), SymExpr::Absent);
        map.insert(ValueId(0), SymExpr::Absent);
    }
}
