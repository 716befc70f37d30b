// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//
//! Static knowledge of the external routines that have a symbol-aware wrapper.
//!
//! A wrapper takes every original argument followed by the handle of its symbolic
//! expression, and publishes the handle of its result through the runtime's return slot.

/// Suffix appended to the name of an intercepted routine to obtain its wrapper.
pub const WRAPPER_SUFFIX: &str = "_symbolized";

macro_rules! intercepted {
    ($($name:literal),* $(,)?) => {
        &[$(($name, concat!($name, "_symbolized"))),*]
    };
}

/// Routines of the C library modelled by the runtime.
pub const DEFAULT_INTERCEPTIONS: &[(&str, &str)] = intercepted![
    "malloc", "calloc", "realloc", "mmap", "mmap64", "open", "read", "lseek", "lseek64", "fopen",
    "fopen64", "fread", "fgets", "fgetc", "getc", "ungetc", "getchar", "fseek", "fseeko",
    "fseeko64", "rewind", "memcpy", "memset", "memmove", "memcmp", "bcopy", "bcmp", "bzero",
    "strncpy", "strchr", "ntohl",
];

/// Table of `(original, wrapper)` pairs.
#[derive(Clone, Copy, Debug)]
pub struct InterceptionTable {
    entries: &'static [(&'static str, &'static str)],
}

impl Default for InterceptionTable {
    fn default() -> Self {
        InterceptionTable::new(DEFAULT_INTERCEPTIONS)
    }
}

impl InterceptionTable {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        InterceptionTable { entries }
    }

    pub fn entries(&self) -> &'static [(&'static str, &'static str)] {
        self.entries
    }

    /// The wrapper that replaces `original`, if the routine is intercepted.
    pub fn wrapper_for(&self, original: &str) -> Option<&'static str> {
        self.entries.iter().find(|(name, _)| *name == original).map(|(_, wrapper)| *wrapper)
    }

    /// Whether `name` is the wrapper of an intercepted routine.
    pub fn is_wrapper(&self, name: &str) -> bool {
        self.entries.iter().any(|(_, wrapper)| *wrapper == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = InterceptionTable::default();
        assert_eq!(table.wrapper_for("malloc"), Some("malloc_symbolized"));
        assert_eq!(table.wrapper_for("malloc_symbolized"), None);
        assert!(table.is_wrapper("memcpy_symbolized"));
        assert!(!table.is_wrapper("memcpy"));
        assert!(table.entries().iter().all(|(name, wrapper)| {
            wrapper.strip_suffix(WRAPPER_SUFFIX) == Some(*name)
        }));
    }

    #[test]
    fn test_custom_table() {
        static ENTRIES: &[(&str, &str)] = &[("next_token", "next_token_symbolized")];
        let table = InterceptionTable::new(ENTRIES);
        assert!(table.is_wrapper("next_token_symbolized"));
        assert_eq!(table.wrapper_for("malloc"), None);
    }
}
