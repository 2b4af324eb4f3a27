//! IR-level types.

use std::fmt;

/// A type in the emitted IR. Pointers are typed; named aggregates refer to a
/// module-level type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Void,
    I1,
    I8,
    I32,
    I64,
    F32,
    Ptr(Box<Ty>),
    Struct(String),
}

impl Ty {
    pub fn ptr_to(self) -> Ty {
        Ty::Ptr(Box::new(self))
    }

    pub fn pointee(&self) -> Option<&Ty> {
        match self {
            Ty::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Ty::F32)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Ty::I1 | Ty::I8 | Ty::I32 | Ty::I64)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Ty::Ptr(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Void)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => write!(f, "void"),
            Ty::I1 => write!(f, "i1"),
            Ty::I8 => write!(f, "i8"),
            Ty::I32 => write!(f, "i32"),
            Ty::I64 => write!(f, "i64"),
            Ty::F32 => write!(f, "float"),
            Ty::Ptr(inner) => write!(f, "{}*", inner),
            Ty::Struct(name) => write!(f, "%{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Ty::I32.to_string(), "i32");
        assert_eq!(Ty::F32.to_string(), "float");
        assert_eq!(Ty::I8.ptr_to().to_string(), "i8*");
        assert_eq!(Ty::I32.ptr_to().ptr_to().to_string(), "i32**");
        assert_eq!(Ty::Struct("Vec2".to_string()).to_string(), "%Vec2");
    }

    #[test]
    fn test_pointee() {
        let p = Ty::I64.ptr_to();
        assert_eq!(p.pointee(), Some(&Ty::I64));
        assert_eq!(Ty::I64.pointee(), None);
    }

    #[test]
    fn test_predicates() {
        assert!(Ty::I1.is_integer());
        assert!(Ty::F32.is_float());
        assert!(!Ty::F32.is_integer());
        assert!(Ty::I8.ptr_to().is_pointer());
        assert!(Ty::Void.is_void());
    }
}
