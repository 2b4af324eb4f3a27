//! IR values: temporaries, globals, and constants.

use std::fmt;

/// An operand in the emitted IR.
///
/// Temporaries carry their uniqued name (`%addtmp`, `%addtmp1`, …) handed
/// out by the builder; string constants render as an inline
/// `getelementptr` over the module's private byte array.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `%name`
    Temp(String),
    /// `@name`
    Global(String),
    ConstInt(i64),
    ConstFloat(f32),
    ConstBool(bool),
    Null,
    /// Pointer to string constant `@.str.<id>` of `len` bytes (including
    /// the trailing NUL).
    CStr { id: u32, len: u32 },
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Temp(name) => write!(f, "%{}", name),
            Value::Global(name) => write!(f, "@{}", name),
            Value::ConstInt(v) => write!(f, "{}", v),
            Value::ConstFloat(v) => write!(f, "{:e}", v),
            Value::ConstBool(v) => write!(f, "{}", v),
            Value::Null => write!(f, "null"),
            Value::CStr { id, len } => write!(
                f,
                "getelementptr inbounds ([{} x i8], [{} x i8]* @.str.{}, i32 0, i32 0)",
                len, len, id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::Temp("addtmp".to_string()).to_string(), "%addtmp");
        assert_eq!(Value::Global("counter".to_string()).to_string(), "@counter");
        assert_eq!(Value::ConstInt(-3).to_string(), "-3");
        assert_eq!(Value::ConstBool(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_float_display_is_exponential() {
        assert_eq!(Value::ConstFloat(2.5).to_string(), "2.5e0");
        assert_eq!(Value::ConstFloat(1.0).to_string(), "1e0");
    }

    #[test]
    fn test_cstr_display() {
        let v = Value::CStr { id: 0, len: 3 };
        assert_eq!(
            v.to_string(),
            "getelementptr inbounds ([3 x i8], [3 x i8]* @.str.0, i32 0, i32 0)"
        );
    }
}
