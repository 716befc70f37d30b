// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
use super::{Procedure, RoutineId, Type};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("routine `{0}` already exists")]
    NameCollision(String),
    #[error("routine `{name}` already exists with signature `{existing}`, expected `{expected}`")]
    SignatureMismatch { name: String, existing: Signature, expected: Signature },
    #[error("no routine named `{0}`")]
    UnknownRoutine(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
    /// Whether extra arguments may follow the fixed parameters.
    #[serde(default)]
    pub variadic: bool,
}

impl Signature {
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        Signature { params, ret, variadic: false }
    }

    pub fn variadic(params: Vec<Type>, ret: Type) -> Self {
        Signature { params, ret, variadic: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub name: String,
    pub signature: Signature,
    /// `None` for external declarations.
    pub body: Option<Procedure>,
}

impl Routine {
    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }
}

/// An entry of the global constructor or destructor list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookEntry {
    pub priority: u32,
    pub routine: RoutineId,
}

/// A translation unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub source_file: String,
    pub routines: Vec<Routine>,
    /// Routines invoked before any user code runs, in ascending priority.
    #[serde(default)]
    pub global_ctors: Vec<HookEntry>,
    /// Routines invoked at process exit, in ascending priority.
    #[serde(default)]
    pub global_dtors: Vec<HookEntry>,
}

impl CompilationUnit {
    pub fn new(source_file: impl Into<String>) -> Self {
        CompilationUnit { source_file: source_file.into(), ..Default::default() }
    }

    pub fn routine(&self, id: RoutineId) -> &Routine {
        &self.routines[id.index()]
    }

    pub fn routine_mut(&mut self, id: RoutineId) -> &mut Routine {
        &mut self.routines[id.index()]
    }

    pub fn routine_ids(&self) -> impl Iterator<Item = RoutineId> + '_ {
        (0..self.routines.len()).map(|idx| RoutineId(idx as u32))
    }

    pub fn find_routine(&self, name: &str) -> Option<RoutineId> {
        self.routines.iter().position(|routine| routine.name == name).map(|idx| RoutineId(idx as u32))
    }

    /// Add a new routine. Fails if a routine with the same name exists.
    pub fn add_routine(
        &mut self,
        name: &str,
        signature: Signature,
        body: Option<Procedure>,
    ) -> Result<RoutineId, IrError> {
        if self.find_routine(name).is_some() {
            return Err(IrError::NameCollision(name.to_string()));
        }
        let id = RoutineId(self.routines.len() as u32);
        self.routines.push(Routine { name: name.to_string(), signature, body });
        trace!(name, ?id, "add_routine");
        Ok(id)
    }

    /// Return the routine with the given name if it has the expected signature, or declare it.
    pub fn get_or_declare(&mut self, name: &str, signature: Signature) -> Result<RoutineId, IrError> {
        match self.find_routine(name) {
            Some(id) if self.routine(id).signature == signature => Ok(id),
            Some(id) => Err(IrError::SignatureMismatch {
                name: name.to_string(),
                existing: self.routine(id).signature.clone(),
                expected: signature,
            }),
            None => self.add_routine(name, signature, None),
        }
    }

    /// Rename a routine. Every call site follows since calls refer to the routine id.
    pub fn rename_routine(&mut self, id: RoutineId, new_name: &str) -> Result<(), IrError> {
        match self.find_routine(new_name) {
            Some(existing) if existing == id => Ok(()),
            Some(_) => Err(IrError::NameCollision(new_name.to_string())),
            None => {
                self.routine_mut(id).name = new_name.to_string();
                Ok(())
            }
        }
    }

    pub fn append_global_ctor(&mut self, routine: RoutineId, priority: u32) {
        self.global_ctors.push(HookEntry { priority, routine });
    }

    pub fn append_global_dtor(&mut self, routine: RoutineId, priority: u32) {
        self.global_dtors.push(HookEntry { priority, routine });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_declare() {
        let mut unit = CompilationUnit::new("test.c");
        let sig = Signature::new(vec![Type::i64()], Type::Ptr);
        let first = unit.get_or_declare("malloc", sig.clone()).unwrap();
        let second = unit.get_or_declare("malloc", sig).unwrap();
        assert_eq!(first, second);
        let mismatch = unit.get_or_declare("malloc", Signature::new(vec![], Type::Void));
        assert!(matches!(mismatch, Err(IrError::SignatureMismatch { .. })));
    }

    #[test]
    fn test_rename_collision() {
        let mut unit = CompilationUnit::new("test.c");
        let foo = unit.add_routine("foo", Signature::new(vec![], Type::Void), None).unwrap();
        unit.add_routine("bar", Signature::new(vec![], Type::Void), None).unwrap();
        assert_eq!(unit.rename_routine(foo, "bar"), Err(IrError::NameCollision("bar".into())));
        assert_eq!(unit.rename_routine(foo, "foo"), Ok(()));
        assert_eq!(unit.rename_routine(foo, "baz"), Ok(()));
        assert_eq!(unit.find_routine("baz"), Some(foo));
    }

    #[test]
    fn test_unit_serde() {
        let mut unit = CompilationUnit::new("test.c");
        unit.add_routine("foo", Signature::variadic(vec![Type::i32()], Type::Ptr), None).unwrap();
        let json = serde_json::to_string(&unit).unwrap();
        let back: CompilationUnit = serde_json::from_str(&json).unwrap();
        assert_eq!(unit, back);
    }
}
