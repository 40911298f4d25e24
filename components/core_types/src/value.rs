//! JavaScript value representation using tagged variants.
//!
//! This module provides the core `Value` enum that represents all possible
//! JavaScript values. Primitives are stored inline, objects are referenced
//! by their index in the realm's heap.

use num_bigint::BigInt;
use num_traits::Zero;
use std::fmt;

/// Represents any JavaScript value.
///
/// Integral numbers that fit in 32 bits are kept as [`Value::Smi`]; every
/// other number is a [`Value::Double`]. Use [`Value::number`] to build a
/// number so the two representations never disagree about the same
/// mathematical value.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let undefined = Value::Undefined;
/// let number = Value::number(42.0);
/// let float = Value::number(3.5);
///
/// assert_eq!(number, Value::Smi(42));
/// assert_eq!(float, Value::Double(3.5));
/// assert!(!undefined.is_truthy());
/// assert_eq!(number.type_of(), "number");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JavaScript undefined value
    Undefined,
    /// JavaScript null value
    Null,
    /// JavaScript boolean (true or false)
    Boolean(bool),
    /// Small integer (fits in 32 bits)
    Smi(i32),
    /// IEEE 754 double-precision floating point
    Double(f64),
    /// JavaScript string value
    String(String),
    /// JavaScript BigInt (arbitrary precision integer)
    BigInt(BigInt),
    /// Heap-allocated object, referenced by its heap index
    HeapObject(usize),
}

impl Value {
    /// Build a number value, preferring the small-integer representation.
    ///
    /// Negative zero stays a double so that `1 / -0` keeps its sign.
    pub fn number(n: f64) -> Value {
        if n.fract() == 0.0
            && n >= i32::MIN as f64
            && n <= i32::MAX as f64
            && !(n == 0.0 && n.is_sign_negative())
        {
            Value::Smi(n as i32)
        } else {
            Value::Double(n)
        }
    }

    /// Build a string value
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    /// Returns the numeric value if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Smi(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the heap index if this is an object
    pub fn as_object(&self) -> Option<usize> {
        match self {
            Value::HeapObject(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns true for numbers (Smi or Double)
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Smi(_) | Value::Double(_))
    }

    /// Returns true for heap objects
    pub fn is_object(&self) -> bool {
        matches!(self, Value::HeapObject(_))
    }

    /// Returns true for `undefined`
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true for `undefined` and `null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns whether this value is truthy in JavaScript semantics.
    ///
    /// In JavaScript, the following values are falsy:
    /// - undefined
    /// - null
    /// - false
    /// - 0 (including -0)
    /// - NaN
    /// - "" (empty string)
    /// - 0n
    ///
    /// All other values are truthy, including all objects.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert!(!Value::Undefined.is_truthy());
    /// assert!(!Value::Null.is_truthy());
    /// assert!(!Value::Boolean(false).is_truthy());
    /// assert!(!Value::Smi(0).is_truthy());
    /// assert!(!Value::Double(f64::NAN).is_truthy());
    ///
    /// assert!(Value::Boolean(true).is_truthy());
    /// assert!(Value::Smi(42).is_truthy());
    /// assert!(Value::HeapObject(0).is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Smi(n) => *n != 0,
            Value::Double(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::BigInt(n) => !n.is_zero(),
            Value::HeapObject(_) => true,
        }
    }

    /// Returns the JavaScript typeof result for this value.
    ///
    /// Heap objects report "object" here; distinguishing callable objects
    /// needs the heap, so the interpreter refines it to "function".
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert_eq!(Value::Undefined.type_of(), "undefined");
    /// assert_eq!(Value::Null.type_of(), "object");
    /// assert_eq!(Value::Boolean(true).type_of(), "boolean");
    /// assert_eq!(Value::Smi(42).type_of(), "number");
    /// ```
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object", // JavaScript quirk
            Value::Boolean(_) => "boolean",
            Value::Smi(_) | Value::Double(_) => "number",
            Value::String(_) => "string",
            Value::BigInt(_) => "bigint",
            Value::HeapObject(_) => "object",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Smi(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// Format a number the way JavaScript's `Number.prototype.toString` does
/// for radix 10.
///
/// # Examples
///
/// ```
/// use core_types::number_to_string;
///
/// assert_eq!(number_to_string(3.0), "3");
/// assert_eq!(number_to_string(-0.0), "0");
/// assert_eq!(number_to_string(1e21), "1e+21");
/// assert_eq!(number_to_string(f64::NAN), "NaN");
/// ```
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if !(1e-6..1e21).contains(&abs) {
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        };
    }
    format!("{}", n)
}

/// Implementation of Display trait for JavaScript string conversion.
///
/// This follows JavaScript's `String()` conversion rules for primitives.
/// Objects render as "[object Object]"; richer conversions go through the
/// interpreter's operations library.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// assert_eq!(Value::Undefined.to_string(), "undefined");
/// assert_eq!(Value::Null.to_string(), "null");
/// assert_eq!(Value::Boolean(true).to_string(), "true");
/// assert_eq!(Value::Smi(42).to_string(), "42");
/// assert_eq!(Value::Double(0.5).to_string(), "0.5");
/// ```
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Smi(n) => write!(f, "{}", n),
            Value::Double(n) => f.write_str(&number_to_string(*n)),
            Value::String(s) => f.write_str(s),
            Value::BigInt(n) => write!(f, "{}", n),
            Value::HeapObject(_) => write!(f, "[object Object]"),
        }
    }
}
