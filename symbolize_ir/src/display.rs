// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Textual dump of the IR. The format is meant for humans and debug logs, it is not parsed back.

use crate::{
    BasicBlock, BlockId, CompilationUnit, Constant, InstKind, Instruction, Operand, Procedure,
    RoutineId, Signature, Terminator, Type, ValueId,
};
use itertools::Itertools;
use std::fmt::{Display, Formatter, Result};

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int { width } => write!(f, "i{width}"),
            Type::Ptr => write!(f, "ptr"),
        }
    }
}

impl Display for ValueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "%{}", self.0)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "bb{}", self.0)
    }
}

impl Display for RoutineId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "@{}", self.0)
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Constant::Int { value, width } => write!(f, "i{width} {value}"),
            Constant::Null => write!(f, "null"),
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Operand::Value(value) => write!(f, "{value}"),
            Operand::Const(constant) => write!(f, "{constant}"),
        }
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let params = self.params.iter().join(", ");
        let dots = match (self.variadic, self.params.is_empty()) {
            (false, _) => "",
            (true, true) => "...",
            (true, false) => ", ...",
        };
        write!(f, "fn({params}{dots}) -> {}", self.ret)
    }
}

/// Display an instruction. Callees are printed by id since the routine table is not available.
impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if let Some(result) = self.result {
            write!(f, "{result} = ")?;
        }
        match &self.kind {
            InstKind::Binary { op, lhs, rhs } => write!(f, "{op} {lhs}, {rhs}"),
            InstKind::Compare { pred, lhs, rhs } => write!(f, "icmp {pred} {lhs}, {rhs}"),
            InstKind::Cast { op, value } => write!(f, "{op} {value}"),
            InstKind::Select { cond, if_true, if_false } => {
                write!(f, "select {cond}, {if_true}, {if_false}")
            }
            InstKind::Alloca { size } => write!(f, "alloca {size}"),
            InstKind::Load { ptr } => write!(f, "load {ptr}"),
            InstKind::Store { ptr, value } => write!(f, "store {value}, {ptr}"),
            InstKind::PtrOffset { base, offset } => write!(f, "ptradd {base}, {offset}"),
            InstKind::Call { callee, args } => write!(f, "call {callee}({})", args.iter().join(", ")),
            InstKind::Phi { incoming } => write!(
                f,
                "phi {}",
                incoming.iter().map(|(bb, op)| format!("[{op}, {bb}]")).join(", ")
            ),
            InstKind::Opaque { mnemonic, operands } => {
                write!(f, "opaque {mnemonic}({})", operands.iter().join(", "))
            }
        }
    }
}

impl Display for Terminator {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Terminator::Goto { target } => write!(f, "goto {target}"),
            Terminator::Branch { cond, then_bb, else_bb } => {
                write!(f, "br {cond}, {then_bb}, {else_bb}")
            }
            Terminator::Return { value: Some(value) } => write!(f, "ret {value}"),
            Terminator::Return { value: None } => write!(f, "ret"),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

impl Display for BasicBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        for inst in &self.instructions {
            writeln!(f, "    {inst}")?;
        }
        writeln!(f, "    {}", self.terminator)
    }
}

impl Display for Procedure {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let params = self
            .params
            .iter()
            .map(|param| format!("{} {param}", self.value_ty(*param)))
            .join(", ");
        writeln!(f, "({params}) -> {} {{", self.return_ty)?;
        for (bb, block) in self.block_ids().zip(&self.blocks) {
            writeln!(f, "  {bb}:")?;
            write!(f, "{block}")?;
        }
        write!(f, "}}")
    }
}

impl Display for CompilationUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "; source: {}", self.source_file)?;
        for (id, routine) in self.routine_ids().zip(&self.routines) {
            match &routine.body {
                None => writeln!(f, "declare {id} {}: {}", routine.name, routine.signature)?,
                Some(body) => writeln!(f, "define {id} {}{body}", routine.name)?,
            }
        }
        for hook in &self.global_ctors {
            writeln!(f, "; ctor {} priority {}", hook.routine, hook.priority)?;
        }
        for hook in &self.global_dtors {
            writeln!(f, "; dtor {} priority {}", hook.routine, hook.priority)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::ProcedureBuilder;
    use crate::{BinOp, CompilationUnit, Operand, Signature, Type};

    #[test]
    fn test_unit_dump() {
        let mut builder = ProcedureBuilder::new(&[Type::i32()], Type::i32());
        let x = builder.param(0);
        let y = builder.binary(BinOp::Add, x.into(), Operand::int(1, 32));
        builder.ret(Some(y.into()));
        let mut unit = CompilationUnit::new("inc.c");
        let sig = Signature::new(vec![Type::i32()], Type::i32());
        let inc = unit.add_routine("inc", sig, Some(builder.finish())).unwrap();
        unit.add_routine("log", Signature::variadic(vec![Type::Ptr], Type::Void), None).unwrap();
        unit.append_global_ctor(inc, 3);

        let expected = "; source: inc.c\n\
                        define @0 inc(i32 %0) -> i32 {\n  bb0:\n    %1 = add %0, i32 1\n    ret %1\n}\n\
                        declare @1 log: fn(ptr, ...) -> void\n\
                        ; ctor @0 priority 3\n";
        assert_eq!(unit.to_string(), expected);
    }
}
