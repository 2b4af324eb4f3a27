//! Interned type registry.
//!
//! All types of one compilation live in a [`TypeRegistry`]; the rest of the
//! pipeline refers to them through [`TypeId`] handles, so type equality is
//! handle equality. Pointer types are synthesized lazily by name
//! (`"*" + inner`); user-defined record types are registered when the parser
//! sees their definition.

use std::collections::HashMap;
use std::fmt;

/// Handle to an interned type. Two equal ids always denote the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    /// Sentinel for expressions whose type is not yet known (calls to
    /// functions defined later in the file, patched after parsing).
    pub const UNRESOLVED: TypeId = TypeId(u32::MAX);

    pub fn is_resolved(self) -> bool {
        self != Self::UNRESOLVED
    }
}

/// What sort of type an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Primitive,
    Pointer,
    Record,
}

#[derive(Debug)]
struct TypeInfo {
    name: String,
    kind: TypeKind,
    /// For pointers, the type pointed to.
    pointee: Option<TypeId>,
    /// For records, the ordered member list.
    members: Vec<(String, TypeId)>,
}

/// Error for a type name that is not registered. After resolution this can
/// only arise from compiler bugs, not from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub message: String,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TypeError {}

pub struct TypeRegistry {
    types: Vec<TypeInfo>,
    by_name: HashMap<String, TypeId>,
}

impl TypeRegistry {
    pub const INT8: TypeId = TypeId(0);
    pub const INT32: TypeId = TypeId(1);
    pub const INT64: TypeId = TypeId(2);
    pub const FLOAT: TypeId = TypeId(3);
    pub const BOOL: TypeId = TypeId(4);
    pub const STRING: TypeId = TypeId(5);
    pub const VOID: TypeId = TypeId(6);

    /// Create a registry seeded with the primitive types and their pointer
    /// counterparts.
    pub fn new() -> Self {
        let mut registry = Self { types: Vec::new(), by_name: HashMap::new() };

        for name in ["int8", "int32", "int64", "float", "bool", "string", "void"] {
            registry.insert(name.to_string(), TypeKind::Primitive, None);
        }
        for id in [
            Self::INT8,
            Self::INT32,
            Self::INT64,
            Self::FLOAT,
            Self::BOOL,
            Self::STRING,
        ] {
            registry.pointer_to(id);
        }

        registry
    }

    fn insert(&mut self, name: String, kind: TypeKind, pointee: Option<TypeId>) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.types.push(TypeInfo { name, kind, pointee, members: Vec::new() });
        id
    }

    /// Look a type up by name.
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Look a type up by name, failing if it is absent.
    pub fn get(&self, name: &str) -> Result<TypeId, TypeError> {
        self.lookup(name).ok_or_else(|| TypeError {
            message: format!("type '{}' not registered", name),
        })
    }

    /// Return the pointer type to `inner`, creating it on first request.
    pub fn pointer_to(&mut self, inner: TypeId) -> TypeId {
        let name = format!("*{}", self.name(inner));
        if let Some(id) = self.lookup(&name) {
            return id;
        }
        self.insert(name, TypeKind::Pointer, Some(inner))
    }

    /// Register a user-defined record type with its ordered members.
    ///
    /// Fails if the name is already taken.
    pub fn define_record(
        &mut self,
        name: &str,
        members: Vec<(String, TypeId)>,
    ) -> Result<TypeId, TypeError> {
        if self.lookup(name).is_some() {
            return Err(TypeError { message: format!("type '{}' is already defined", name) });
        }
        let id = self.insert(name.to_string(), TypeKind::Record, None);
        self.types[id.0 as usize].members = members;
        Ok(id)
    }

    /// The canonical display name (pointer types prefixed with `*`).
    pub fn name(&self, id: TypeId) -> &str {
        &self.types[id.0 as usize].name
    }

    pub fn kind(&self, id: TypeId) -> TypeKind {
        self.types[id.0 as usize].kind
    }

    /// The pointee of a pointer type.
    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        self.types[id.0 as usize].pointee
    }

    pub fn members(&self, id: TypeId) -> &[(String, TypeId)] {
        &self.types[id.0 as usize].members
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        self.kind(id) == TypeKind::Pointer
    }

    pub fn is_int(&self, id: TypeId) -> bool {
        id == Self::INT8 || id == Self::INT32 || id == Self::INT64
    }

    /// Iterate over every registered type id.
    pub fn ids(&self) -> impl Iterator<Item = TypeId> {
        (0..self.types.len() as u32).map(TypeId)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
