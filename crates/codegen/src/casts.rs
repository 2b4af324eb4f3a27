//! The implicit-cast table.
//!
//! An ordered list of `(from, to, kind, implicit)` entries consulted
//! whenever assignment, return, call-argument, or binary-operand
//! unification needs a conversion. The first match wins; a successful
//! implicit use makes the generator warn but proceed.

use parser::{TypeId, TypeRegistry};

/// How a conversion is lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    SignExtend,
    Truncate,
}

/// One allowed conversion.
#[derive(Debug, Clone, Copy)]
pub struct Cast {
    pub from: TypeId,
    pub to: TypeId,
    pub kind: CastKind,
    pub implicit: bool,
}

pub struct CastTable {
    casts: Vec<Cast>,
}

impl CastTable {
    /// The default table: `int32 -> int64` (sign-extend) and
    /// `int64 -> int32` (truncate), both implicit.
    pub fn with_defaults() -> Self {
        Self {
            casts: vec![
                Cast {
                    from: TypeRegistry::INT32,
                    to: TypeRegistry::INT64,
                    kind: CastKind::SignExtend,
                    implicit: true,
                },
                Cast {
                    from: TypeRegistry::INT64,
                    to: TypeRegistry::INT32,
                    kind: CastKind::Truncate,
                    implicit: true,
                },
            ],
        }
    }

    /// Extend the table; later entries never shadow earlier ones.
    pub fn add(&mut self, cast: Cast) {
        self.casts.push(cast);
    }

    /// First implicit entry converting `from` to `to`, if any.
    pub fn find_implicit(&self, from: TypeId, to: TypeId) -> Option<Cast> {
        self.casts
            .iter()
            .find(|c| c.from == from && c.to == to && c.implicit)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_entries() {
        let table = CastTable::with_defaults();
        let up = table
            .find_implicit(TypeRegistry::INT32, TypeRegistry::INT64)
            .expect("int32 -> int64");
        assert_eq!(up.kind, CastKind::SignExtend);

        let down = table
            .find_implicit(TypeRegistry::INT64, TypeRegistry::INT32)
            .expect("int64 -> int32");
        assert_eq!(down.kind, CastKind::Truncate);
    }

    #[test]
    fn test_no_entry_for_unrelated_types() {
        let table = CastTable::with_defaults();
        assert!(table.find_implicit(TypeRegistry::FLOAT, TypeRegistry::INT32).is_none());
        assert!(table.find_implicit(TypeRegistry::BOOL, TypeRegistry::INT32).is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let mut table = CastTable::with_defaults();
        table.add(Cast {
            from: TypeRegistry::INT32,
            to: TypeRegistry::INT64,
            kind: CastKind::Truncate,
            implicit: true,
        });
        let found = table.find_implicit(TypeRegistry::INT32, TypeRegistry::INT64).unwrap();
        assert_eq!(found.kind, CastKind::SignExtend);
    }

    #[test]
    fn test_explicit_entries_are_not_implicit_matches() {
        let mut table = CastTable::with_defaults();
        table.add(Cast {
            from: TypeRegistry::INT8,
            to: TypeRegistry::INT64,
            kind: CastKind::SignExtend,
            implicit: false,
        });
        assert!(table.find_implicit(TypeRegistry::INT8, TypeRegistry::INT64).is_none());
    }
}
