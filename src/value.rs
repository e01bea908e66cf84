// The VM's value model: three tagged kinds (number, string, boolean), plus
// the coercions and structural-equality rules spec.md §3 lays out.
//
// Numbers are f64 (IEEE-754 double), strings are immutable and
// reference-counted (cheap clone on LOAD/STORE copy-outs), booleans are
// two-valued. Equality is structural and type-exact; truthiness and the
// `toNumber`/`toString`/`toBoolean` coercions are the only place types
// silently cross over.

use std::fmt;
use std::rc::Rc;

use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};

use crate::errors::RuntimeError;

/// Discriminant for `Value`, used both for fast `match`-free dispatch and
/// to report "expected one of {..}, found {..}" in `TypeMismatch` errors
/// (see `expected()` below). Mirrors the `TypeTag`/`BitFlags` idiom the
/// teacher uses for its own (richer) value model in `vm.rs`.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    Number = 0b001,
    String = 0b010,
    Boolean = 0b100,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Number => write!(f, "number"),
            TypeTag::String => write!(f, "string"),
            TypeTag::Boolean => write!(f, "boolean"),
        }
    }
}

/// A (possibly singleton) set of `TypeTag`s, for "expected number or
/// string" style diagnostics.
pub type TypeSet = BitFlags<TypeTag>;

pub fn fmt_type_set(set: TypeSet) -> String {
    set.iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

// `thiserror`'s `#[error(...)]` format string calls `Display` on fields
// directly, so give `TypeSet` a `Display` impl via a thin wrapper is not
// possible for a foreign type — instead format it inline at call sites.
// To keep `RuntimeError`'s derive simple, we implement `Display` through a
// free function used from the format string (see errors.rs).
impl fmt::Display for TypeSetDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", fmt_type_set(self.0))
    }
}

/// Wrapper that lets `TypeSet` participate in `Display`-driven error
/// formatting without an orphan-rule violation on the foreign `BitFlags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSetDisplay(pub TypeSet);

impl From<TypeTag> for TypeSetDisplay {
    fn from(t: TypeTag) -> Self {
        TypeSetDisplay(BitFlags::from(t))
    }
}

impl From<TypeSet> for TypeSetDisplay {
    fn from(set: TypeSet) -> Self {
        TypeSetDisplay(set)
    }
}

/// The VM's runtime value. Strings are `Rc<String>` so that `LOAD`/`STORE`
/// "fresh copy" semantics (spec.md §3 VM state invariants) are cheap: a
/// copy of an `Rc<String>` shares the backing bytes but is an independent
/// handle, which is all the invariant requires (no aliasing between
/// *slots*, not no aliasing of immutable backing storage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    #[serde(with = "rc_string")]
    String(Rc<String>),
    Boolean(bool),
}

mod rc_string {
    use std::rc::Rc;

    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Rc<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(v.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Rc<String>, D::Error> {
        Ok(Rc::new(String::deserialize(d)?))
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(Rc::new(s.into()))
    }

    pub fn get_type(&self) -> TypeTag {
        match self {
            Value::Number(_) => TypeTag::Number,
            Value::String(_) => TypeTag::String,
            Value::Boolean(_) => TypeTag::Boolean,
        }
    }

    /// Truthiness per spec.md GLOSSARY: `0`, `""` and `false` are falsy;
    /// everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
        }
    }

    /// `toNumber`: numbers pass through, strings parse, booleans map to
    /// 1/0. Fails (as `TypeMismatch`) on a non-numeric string.
    pub fn to_number(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().map_err(|_| type_mismatch(TypeTag::Number, TypeTag::String)),
        }
    }

    /// `toString`: numbers use host default formatting, booleans as
    /// `true`/`false`, strings verbatim.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.as_str().to_string(),
            Value::Boolean(b) => b.to_string(),
        }
    }

    /// `toBoolean`: identical to truthiness, exposed separately because
    /// the built-in `toBoolean(x)` and the VM's internal truthiness check
    /// are the same rule used in two contexts (spec.md §4.7).
    pub fn to_boolean(&self) -> bool {
        self.is_truthy()
    }

    /// Structural, type-exact equality (spec.md §3): no coercion, and a
    /// type mismatch is simply "not equal" rather than an error (`EQ`/`NE`
    /// never fault, per spec.md §4.7).
    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

/// Host-default number formatting: integral values print without a
/// trailing `.0` (matching what `println!("{}", 27.0f64)` would *not* do
/// by default — we special-case it so `toString(27.0)` reads `"27"`, as
/// S1 in spec.md §8 requires).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

pub fn type_mismatch(expected: impl Into<TypeSetDisplay>, actual: impl Into<TypeSetDisplay>) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.into(),
        actual: actual.into(),
        context: None,
    }
}
