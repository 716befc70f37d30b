// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A runtime that records the calls of instrumented code, used to test the instrumentation
//! under the interpreter.

use crate::symbolize_middle::runtime::{self, ExprKind, OpcodeTag};
use std::collections::HashMap;
use symbolize_ir::eval::{EvalError, ExternalRoutines, RtValue};
use symbolize_ir::{CompilationUnit, InstKind, Procedure, RoutineId};

/// What the mock runtime knows about an expression handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockExpr {
    Parameter(u64),
    Node { kind: ExprKind, width: u16, operands: Vec<u64> },
    Returned(String),
}

#[derive(Default)]
pub struct MockRuntime {
    /// Every call received, in order.
    pub calls: Vec<(String, Vec<RtValue>)>,
    pub exprs: HashMap<u64, MockExpr>,
    /// Concrete results of the wrappers.
    wrappers: HashMap<String, Option<RtValue>>,
    shadow: HashMap<u64, u64>,
    return_expr: u64,
    next_handle: u64,
}

impl MockRuntime {
    pub fn with_wrapper(mut self, name: &str, result: Option<RtValue>) -> Self {
        self.wrappers.insert(name.to_string(), result);
        self
    }

    fn fresh(&mut self, expr: MockExpr) -> RtValue {
        self.next_handle += 1;
        let handle = 0x1_0000_0000 + self.next_handle * 8;
        self.exprs.insert(handle, expr);
        RtValue::Ptr(handle)
    }

    /// Names of the calls received, in order.
    pub fn call_names(&self) -> Vec<&str> {
        self.calls.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// The expressions built for `kind`, in order.
    pub fn built(&self, kind: ExprKind) -> Vec<&[RtValue]> {
        self.calls
            .iter()
            .filter(|(name, args)| {
                name == runtime::BUILD_EXPR
                    && OpcodeTag::decode(args[0].bits() as u32).map(|tag| tag.kind) == Some(kind)
            })
            .map(|(_, args)| &args[1..])
            .collect()
    }
}

impl ExternalRoutines for MockRuntime {
    fn call(&mut self, name: &str, args: &[RtValue]) -> Result<Option<RtValue>, EvalError> {
        self.calls.push((name.to_string(), args.to_vec()));
        match name {
            runtime::INITIALIZE
            | runtime::FINALIZE
            | runtime::PUSH_PATH_CONSTRAINT
            | runtime::NOTIFY_BASIC_BLOCK => Ok(None),
            runtime::GET_PARAMETER_EXPRESSION => {
                Ok(Some(self.fresh(MockExpr::Parameter(args[0].bits()))))
            }
            runtime::BUILD_EXPR => {
                let tag = OpcodeTag::decode(args[0].bits() as u32)
                    .ok_or_else(|| EvalError::TypeError("invalid opcode tag".to_string()))?;
                let operands = args[1..].iter().map(|arg| arg.bits()).collect();
                Ok(Some(self.fresh(MockExpr::Node { kind: tag.kind, width: tag.width, operands })))
            }
            runtime::READ_MEMORY => {
                Ok(Some(RtValue::Ptr(self.shadow.get(&args[0].bits()).copied().unwrap_or(0))))
            }
            runtime::WRITE_MEMORY => {
                self.shadow.insert(args[0].bits(), args[2].bits());
                Ok(None)
            }
            runtime::GET_RETURN_EXPRESSION => {
                Ok(Some(RtValue::Ptr(std::mem::take(&mut self.return_expr))))
            }
            _ => match self.wrappers.get(name).copied() {
                Some(result) => {
                    let handle = self.fresh(MockExpr::Returned(name.to_string()));
                    self.return_expr = handle.bits();
                    Ok(result)
                }
                None => Err(EvalError::UnknownExternal(name.to_string())),
            },
        }
    }
}

/// Names of the routines called by a procedure, in block order.
pub fn callees<'a>(unit: &'a CompilationUnit, procedure: &Procedure) -> Vec<&'a str> {
    procedure
        .blocks
        .iter()
        .flat_map(|block| &block.instructions)
        .filter_map(|inst| match &inst.kind {
            InstKind::Call { callee, .. } => Some(unit.routine(*callee).name.as_str()),
            _ => None,
        })
        .collect()
}

pub fn body(unit: &CompilationUnit, name: &str) -> Procedure {
    let id: RoutineId = unit.find_routine(name).unwrap();
    unit.routine(id).body.clone().unwrap()
}
