//! Abstract operations
//!
//! Conversions, comparisons, operator semantics, property access and
//! invocation. The interpreter dispatches opcodes to these functions; they
//! never touch an operand stack themselves.

use crate::environment::EnvId;
use crate::error::JsResult;
use crate::generator;
use crate::heap::{array_index, Closure, JsObject, NativeCall, ObjectKind};
use crate::interpreter::Interpreter;
use crate::realm::Realm;
use bytecode_system::FunctionInfo;
use core_types::{number_to_string, JsError, Value};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::rc::Rc;

/// Largest shift applied to a BigInt
const MAX_BIGINT_SHIFT: i64 = 1 << 20;

/// Binary operators sharing the string-or-numeric evaluation path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `**`
    Exp,
    /// `%`
    Mod,
    /// `&`
    BitwiseAnd,
    /// `|`
    BitwiseOr,
    /// `^`
    BitwiseXor,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `>>>`
    ShiftRightUnsigned,
}

impl BinaryOp {
    /// Source form of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Exp => "**",
            BinaryOp::Mod => "%",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::BitwiseXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::ShiftRightUnsigned => ">>>",
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// ToBoolean
pub fn to_boolean(value: &Value) -> bool {
    value.is_truthy()
}

/// `typeof`, reporting "function" for callable objects
pub fn type_of(realm: &Realm, value: &Value) -> &'static str {
    if let Value::HeapObject(id) = value {
        if realm.heap.get(*id).map(JsObject::is_callable).unwrap_or(false) {
            return "function";
        }
    }
    value.type_of()
}

/// ToPrimitive
///
/// Objects convert through their built-in representation; user-defined
/// `valueOf` and `toString` methods are not consulted.
pub fn to_primitive(realm: &mut Realm, value: &Value) -> JsResult<Value> {
    let id = match value {
        Value::HeapObject(id) => *id,
        other => return Ok(other.clone()),
    };
    let kind = realm.heap.get(id)?.kind.clone();
    let primitive = match kind {
        ObjectKind::Primitive(inner) => inner,
        ObjectKind::Array(elements) => {
            let mut parts = Vec::with_capacity(elements.len());
            for element in &elements {
                if element.is_nullish() {
                    parts.push(String::new());
                } else {
                    parts.push(to_string(realm, element)?);
                }
            }
            Value::String(parts.join(","))
        }
        ObjectKind::Error => Value::String(describe_error(realm, value)),
        ObjectKind::Function(closure) => Value::String(format!(
            "function {}() {{ [bytecode] }}",
            closure.info.name
        )),
        ObjectKind::Native(native) => {
            Value::String(format!("function {}() {{ [native code] }}", native.name))
        }
        ObjectKind::Namespace { .. } => Value::string("[object Module]"),
        ObjectKind::Generator(_) => Value::string("[object Generator]"),
        ObjectKind::Ordinary => Value::string("[object Object]"),
    };
    Ok(primitive)
}

/// ToNumber
pub fn to_number(realm: &mut Realm, value: &Value) -> JsResult<f64> {
    match value {
        Value::Undefined => Ok(f64::NAN),
        Value::Null => Ok(0.0),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Smi(n) => Ok(*n as f64),
        Value::Double(n) => Ok(*n),
        Value::String(s) => Ok(string_to_number(s)),
        Value::BigInt(_) => Err(realm.throw(JsError::type_error(
            "Cannot convert a BigInt value to a number",
        ))),
        Value::HeapObject(_) => {
            let primitive = to_primitive(realm, value)?;
            to_number(realm, &primitive)
        }
    }
}

/// StringToNumber for numeric literals in strings
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let radix = match trimmed.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &trimmed[2..];
        if digits.is_empty() {
            return f64::NAN;
        }
        let mut result = 0.0;
        for c in digits.chars() {
            match c.to_digit(radix) {
                Some(d) => result = result * radix as f64 + d as f64,
                None => return f64::NAN,
            }
        }
        return result;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let is_decimal_literal = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !is_decimal_literal {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// ToNumeric: numbers stay numbers, BigInts stay BigInts
pub fn to_numeric(realm: &mut Realm, value: &Value) -> JsResult<Value> {
    let primitive = to_primitive(realm, value)?;
    if let Value::BigInt(_) = primitive {
        return Ok(primitive);
    }
    Ok(Value::number(to_number(realm, &primitive)?))
}

/// ToString
pub fn to_string(realm: &mut Realm, value: &Value) -> JsResult<String> {
    match value {
        Value::Undefined => Ok("undefined".to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Smi(n) => Ok(n.to_string()),
        Value::Double(n) => Ok(number_to_string(*n)),
        Value::String(s) => Ok(s.clone()),
        Value::BigInt(n) => Ok(n.to_string()),
        Value::HeapObject(_) => {
            let primitive = to_primitive(realm, value)?;
            to_string(realm, &primitive)
        }
    }
}

/// ToPropertyKey
pub fn to_property_key(realm: &mut Realm, value: &Value) -> JsResult<String> {
    to_string(realm, value)
}

/// ToObject, wrapping primitives in a fresh wrapper object
pub fn to_object(realm: &mut Realm, value: &Value) -> JsResult<usize> {
    match value {
        Value::HeapObject(id) => Ok(*id),
        Value::Undefined | Value::Null => Err(realm.throw(JsError::type_error(
            "Cannot convert undefined or null to object",
        ))),
        primitive => {
            let prototype = realm.intrinsics().object_prototype;
            Ok(realm.heap.insert(JsObject::new(
                ObjectKind::Primitive(primitive.clone()),
                Some(prototype),
            )))
        }
    }
}

/// ToInt32
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToUint32
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// Render a value for diagnostics without raising
pub fn display(realm: &mut Realm, value: &Value) -> String {
    to_string(realm, value).unwrap_or_else(|_| value.to_string())
}

// ---------------------------------------------------------------------------
// Equality and comparison
// ---------------------------------------------------------------------------

/// IsStrictlyEqual (`===`)
pub fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::BigInt(a), Value::BigInt(b)) => a == b,
        (Value::HeapObject(a), Value::HeapObject(b)) => a == b,
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn same_type(left: &Value, right: &Value) -> bool {
    (left.is_number() && right.is_number())
        || std::mem::discriminant(left) == std::mem::discriminant(right)
}

fn bigint_equals_number(big: &BigInt, n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && BigInt::from_f64(n).as_ref() == Some(big)
}

/// IsLooselyEqual (`==`)
pub fn loose_equals(realm: &mut Realm, left: &Value, right: &Value) -> JsResult<bool> {
    if same_type(left, right) {
        return Ok(strict_equals(left, right));
    }
    match (left, right) {
        (a, b) if a.is_nullish() && b.is_nullish() => Ok(true),
        (a, b) if a.is_nullish() || b.is_nullish() => Ok(false),
        (Value::String(s), n) | (n, Value::String(s)) if n.is_number() => {
            let parsed = string_to_number(s);
            Ok(n.as_number() == Some(parsed))
        }
        (Value::BigInt(big), Value::String(s)) | (Value::String(s), Value::BigInt(big)) => {
            Ok(s.trim().parse::<BigInt>().map(|n| &n == big).unwrap_or(false))
        }
        (Value::Boolean(b), other) | (other, Value::Boolean(b)) => {
            let number = Value::Smi(i32::from(*b));
            let other = other.clone();
            loose_equals(realm, &number, &other)
        }
        (Value::HeapObject(_), other) | (other, Value::HeapObject(_)) => {
            let object = if left.is_object() { left } else { right };
            let primitive = to_primitive(realm, object)?;
            let other = other.clone();
            loose_equals(realm, &primitive, &other)
        }
        (Value::BigInt(big), n) | (n, Value::BigInt(big)) => match n.as_number() {
            Some(n) => Ok(bigint_equals_number(big, n)),
            None => Ok(false),
        },
        _ => Ok(false),
    }
}

fn bigint_less_than_number(big: &BigInt, n: f64) -> Option<bool> {
    if n.is_nan() {
        return None;
    }
    if n.is_infinite() {
        return Some(n > 0.0);
    }
    let floor = n.floor();
    let bound = BigInt::from_f64(floor)?;
    Some(match big.cmp(&bound) {
        Ordering::Less => true,
        Ordering::Equal => n > floor,
        Ordering::Greater => false,
    })
}

fn number_less_than_bigint(n: f64, big: &BigInt) -> Option<bool> {
    if n.is_nan() {
        return None;
    }
    if n.is_infinite() {
        return Some(n < 0.0);
    }
    let ceil = n.ceil();
    let bound = BigInt::from_f64(ceil)?;
    Some(match bound.cmp(big) {
        Ordering::Less => true,
        Ordering::Equal => n < ceil,
        Ordering::Greater => false,
    })
}

/// IsLessThan: `Some(left < right)`, or `None` when either side is NaN
///
/// `left_first` controls which operand is converted first.
pub fn less_than(
    realm: &mut Realm,
    left: &Value,
    right: &Value,
    left_first: bool,
) -> JsResult<Option<bool>> {
    let (left, right) = if left_first {
        let l = to_primitive(realm, left)?;
        let r = to_primitive(realm, right)?;
        (l, r)
    } else {
        let r = to_primitive(realm, right)?;
        let l = to_primitive(realm, left)?;
        (l, r)
    };

    match (&left, &right) {
        (Value::String(a), Value::String(b)) => return Ok(Some(a < b)),
        (Value::BigInt(a), Value::String(b)) => {
            return Ok(b.trim().parse::<BigInt>().ok().map(|b| *a < b))
        }
        (Value::String(a), Value::BigInt(b)) => {
            return Ok(a.trim().parse::<BigInt>().ok().map(|a| a < *b))
        }
        _ => {}
    }

    let left = to_numeric(realm, &left)?;
    let right = to_numeric(realm, &right)?;
    Ok(match (&left, &right) {
        (Value::BigInt(a), Value::BigInt(b)) => Some(a < b),
        (Value::BigInt(a), n) => n.as_number().and_then(|n| bigint_less_than_number(a, n)),
        (n, Value::BigInt(b)) => n.as_number().and_then(|n| number_less_than_bigint(n, b)),
        (a, b) => match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) if !a.is_nan() && !b.is_nan() => Some(a < b),
            _ => None,
        },
    })
}

/// InstanceofOperator
pub fn instance_of(realm: &mut Realm, value: &Value, target: &Value) -> JsResult<bool> {
    let target_id = match target {
        Value::HeapObject(id) if realm.heap.get(*id)?.is_callable() => *id,
        _ => {
            return Err(realm.throw(JsError::type_error(
                "Right-hand side of 'instanceof' is not callable",
            )))
        }
    };
    let prototype = match get(realm, target_id, "prototype")? {
        Value::HeapObject(id) => id,
        _ => {
            return Err(realm.throw(JsError::type_error(
                "Function has non-object prototype in instanceof check",
            )))
        }
    };
    let mut current = match value {
        Value::HeapObject(id) => realm.heap.get(*id)?.prototype,
        _ => return Ok(false),
    };
    while let Some(id) = current {
        if id == prototype {
            return Ok(true);
        }
        current = realm.heap.get(id)?.prototype;
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn mixed_types(realm: &mut Realm) -> crate::error::Abrupt {
    realm.throw(JsError::type_error(
        "Cannot mix BigInt and other types, use explicit conversions",
    ))
}

/// Apply a string-or-numeric binary operator
pub fn apply_binary(realm: &mut Realm, op: BinaryOp, left: &Value, right: &Value) -> JsResult<Value> {
    let (left, right) = if op == BinaryOp::Add {
        let l = to_primitive(realm, left)?;
        let r = to_primitive(realm, right)?;
        if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
            let mut s = to_string(realm, &l)?;
            s.push_str(&to_string(realm, &r)?);
            return Ok(Value::String(s));
        }
        (l, r)
    } else {
        (left.clone(), right.clone())
    };

    let left = to_numeric(realm, &left)?;
    let right = to_numeric(realm, &right)?;
    match (&left, &right) {
        (Value::BigInt(a), Value::BigInt(b)) => bigint_binary(realm, op, a, b),
        (Value::BigInt(_), _) | (_, Value::BigInt(_)) => Err(mixed_types(realm)),
        _ => {
            let a = left.as_number().unwrap_or(f64::NAN);
            let b = right.as_number().unwrap_or(f64::NAN);
            Ok(number_binary(op, a, b))
        }
    }
}

fn number_exp(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() {
        return f64::NAN;
    }
    if exponent == 0.0 {
        return 1.0;
    }
    if base.abs() == 1.0 && exponent.is_infinite() {
        return f64::NAN;
    }
    base.powf(exponent)
}

fn number_binary(op: BinaryOp, a: f64, b: f64) -> Value {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Exp => number_exp(a, b),
        BinaryOp::Mod => a % b,
        BinaryOp::BitwiseAnd => (to_int32(a) & to_int32(b)) as f64,
        BinaryOp::BitwiseOr => (to_int32(a) | to_int32(b)) as f64,
        BinaryOp::BitwiseXor => (to_int32(a) ^ to_int32(b)) as f64,
        BinaryOp::ShiftLeft => to_int32(a).wrapping_shl(to_uint32(b) & 31) as f64,
        BinaryOp::ShiftRight => (to_int32(a) >> (to_uint32(b) & 31)) as f64,
        BinaryOp::ShiftRightUnsigned => (to_uint32(a) >> (to_uint32(b) & 31)) as f64,
    };
    Value::number(result)
}

fn bigint_shift(realm: &mut Realm, a: &BigInt, amount: &BigInt, left: bool) -> JsResult<Value> {
    let amount = match amount.to_i64() {
        Some(n) if n.unsigned_abs() <= MAX_BIGINT_SHIFT as u64 => n,
        _ => return Err(realm.throw(JsError::range_error("Maximum BigInt size exceeded"))),
    };
    let amount = if left { amount } else { -amount };
    let result = if amount >= 0 {
        a << (amount as usize)
    } else {
        a >> ((-amount) as usize)
    };
    Ok(Value::BigInt(result))
}

fn bigint_exp(realm: &mut Realm, base: &BigInt, exponent: &BigInt) -> JsResult<Value> {
    if exponent.is_negative() {
        return Err(realm.throw(JsError::range_error("Exponent must be non-negative")));
    }
    // 0, 1 and -1 never grow
    if base.bits() <= 1 {
        let result = if exponent.is_zero() {
            BigInt::from(1)
        } else if base.is_negative() {
            if (exponent & BigInt::from(1)).is_zero() {
                BigInt::from(1)
            } else {
                BigInt::from(-1)
            }
        } else {
            base.clone()
        };
        return Ok(Value::BigInt(result));
    }
    let exponent = match exponent.to_u64() {
        Some(n) if base.bits().saturating_mul(n) <= MAX_BIGINT_SHIFT as u64 => n as u32,
        _ => return Err(realm.throw(JsError::range_error("Maximum BigInt size exceeded"))),
    };
    Ok(Value::BigInt(base.pow(exponent)))
}

fn bigint_binary(realm: &mut Realm, op: BinaryOp, a: &BigInt, b: &BigInt) -> JsResult<Value> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Mod if b.is_zero() => {
            return Err(realm.throw(JsError::range_error("Division by zero")))
        }
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        BinaryOp::Exp => return bigint_exp(realm, a, b),
        BinaryOp::BitwiseAnd => a & b,
        BinaryOp::BitwiseOr => a | b,
        BinaryOp::BitwiseXor => a ^ b,
        BinaryOp::ShiftLeft => return bigint_shift(realm, a, b, true),
        BinaryOp::ShiftRight => return bigint_shift(realm, a, b, false),
        BinaryOp::ShiftRightUnsigned => {
            return Err(realm.throw(JsError::type_error(
                "BigInts have no unsigned right shift, use >> instead",
            )))
        }
    };
    Ok(Value::BigInt(result))
}

/// Unary `-`
pub fn negate(realm: &mut Realm, value: &Value) -> JsResult<Value> {
    match to_numeric(realm, value)? {
        Value::BigInt(n) => Ok(Value::BigInt(-n)),
        other => Ok(Value::number(-other.as_number().unwrap_or(f64::NAN))),
    }
}

/// Unary `~`
pub fn bitwise_not(realm: &mut Realm, value: &Value) -> JsResult<Value> {
    match to_numeric(realm, value)? {
        Value::BigInt(n) => Ok(Value::BigInt(!n)),
        other => Ok(Value::number(
            !to_int32(other.as_number().unwrap_or(f64::NAN)) as f64,
        )),
    }
}

/// Numeric increment or decrement by one
pub fn increment(realm: &mut Realm, value: &Value, delta: i32) -> JsResult<Value> {
    match to_numeric(realm, value)? {
        Value::BigInt(n) => Ok(Value::BigInt(n + delta)),
        other => Ok(Value::number(
            other.as_number().unwrap_or(f64::NAN) + delta as f64,
        )),
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// [[Get]] on an object, walking the prototype chain
pub fn get(realm: &mut Realm, id: usize, key: &str) -> JsResult<Value> {
    let mut current = Some(id);
    while let Some(object_id) = current {
        let object = realm.heap.get(object_id)?;
        if let ObjectKind::Namespace { module, exports } = &object.kind {
            if exports.iter().any(|name| name == key) {
                let module = *module;
                return match realm.envs.resolve_module_export(module, key) {
                    Ok(value) => Ok(value),
                    Err(error) => Err(realm.binding_error(error)),
                };
            }
        }
        if let Some(value) = object.get_own(key) {
            return Ok(value);
        }
        current = object.prototype;
    }
    Ok(Value::Undefined)
}

/// GetV: property read on any value, coercing the base to an object
pub fn get_value(realm: &mut Realm, base: &Value, key: &str) -> JsResult<Value> {
    if base.is_nullish() {
        return Err(realm.throw(JsError::type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            base, key
        ))));
    }
    let id = to_object(realm, base)?;
    get(realm, id, key)
}

enum SetTarget {
    Plain,
    ArrayLength,
    ArrayGrow(u64),
    ReadOnly(&'static str),
}

/// [[Set]] on an object
///
/// Failed writes throw in strict code and are ignored otherwise.
pub fn set(realm: &mut Realm, id: usize, key: &str, value: Value, strict: bool) -> JsResult<()> {
    let target = match &realm.heap.get(id)?.kind {
        ObjectKind::Namespace { .. } => SetTarget::ReadOnly("module namespace"),
        ObjectKind::Primitive(_) => SetTarget::ReadOnly("primitive wrapper"),
        ObjectKind::Array(_) if key == "length" => SetTarget::ArrayLength,
        ObjectKind::Array(elements) => match array_index(key) {
            Some(index) if index >= elements.len() => SetTarget::ArrayGrow(index as u64 + 1),
            _ => SetTarget::Plain,
        },
        _ => SetTarget::Plain,
    };
    match target {
        SetTarget::ArrayGrow(length) => {
            realm.check_array_length(length)?;
            realm.heap.get_mut(id)?.set_own(key, value);
            Ok(())
        }
        SetTarget::Plain => {
            realm.heap.get_mut(id)?.set_own(key, value);
            Ok(())
        }
        SetTarget::ArrayLength => {
            let length = to_number(realm, &value)?;
            if length < 0.0 || length.fract() != 0.0 || length > u32::MAX as f64 {
                return Err(realm.throw(JsError::range_error("Invalid array length")));
            }
            realm.check_array_length(length as u64)?;
            if let ObjectKind::Array(elements) = &mut realm.heap.get_mut(id)?.kind {
                elements.resize(length as usize, Value::Undefined);
            }
            Ok(())
        }
        SetTarget::ReadOnly(what) if strict => Err(realm.throw(JsError::type_error(format!(
            "Cannot assign to read only property '{}' of {}",
            key, what
        )))),
        SetTarget::ReadOnly(_) => Ok(()),
    }
}

/// PutValue on any value
pub fn set_value(
    realm: &mut Realm,
    base: &Value,
    key: &str,
    value: Value,
    strict: bool,
) -> JsResult<()> {
    match base {
        Value::HeapObject(id) => set(realm, *id, key, value, strict),
        Value::Undefined | Value::Null => Err(realm.throw(JsError::type_error(format!(
            "Cannot set properties of {} (setting '{}')",
            base, key
        )))),
        _ if strict => Err(realm.throw(JsError::type_error(format!(
            "Cannot create property '{}' on {} '{}'",
            key,
            base.type_of(),
            base
        )))),
        _ => Ok(()),
    }
}

/// `delete base[key]`
pub fn delete_property(realm: &mut Realm, base: &Value, key: &str, strict: bool) -> JsResult<bool> {
    let id = match base {
        Value::HeapObject(id) => *id,
        _ => return Ok(true),
    };
    let deleted = realm.heap.get_mut(id)?.delete_own(key);
    if !deleted && strict {
        let shown = display(realm, base);
        return Err(realm.throw(JsError::type_error(format!(
            "Cannot delete property '{}' of {}",
            key, shown
        ))));
    }
    Ok(deleted)
}

/// HasProperty, the `in` operator
pub fn has_property(realm: &mut Realm, target: &Value, key: &Value) -> JsResult<bool> {
    let key = to_property_key(realm, key)?;
    let id = match target {
        Value::HeapObject(id) => *id,
        _ => {
            let shown = display(realm, target);
            return Err(realm.throw(JsError::type_error(format!(
                "Cannot use 'in' operator to search for '{}' in {}",
                key, shown
            ))));
        }
    };
    let mut current = Some(id);
    while let Some(object_id) = current {
        let object = realm.heap.get(object_id)?;
        if object.has_own(&key) {
            return Ok(true);
        }
        if let ObjectKind::Namespace { exports, .. } = &object.kind {
            if exports.iter().any(|name| *name == key) {
                return Ok(true);
            }
        }
        current = object.prototype;
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// Create a function object over `info` capturing `env`
///
/// Generator functions get a `prototype` object inheriting from the shared
/// generator prototype; normal functions get one with a `constructor` link.
pub fn create_closure(realm: &mut Realm, info: Rc<FunctionInfo>, env: EnvId) -> Value {
    let intrinsics = realm.intrinsics().clone();
    let is_generator = info.is_generator();
    let name = Value::string(info.name.clone());
    let mut function = JsObject::new(
        ObjectKind::Function(Closure { info, env }),
        Some(intrinsics.function_prototype),
    );
    function.set_own("name", name);
    let function = realm.heap.allocate(function);

    let prototype_parent = if is_generator {
        intrinsics.generator_prototype
    } else {
        intrinsics.object_prototype
    };
    let mut prototype = JsObject::ordinary(Some(prototype_parent));
    if !is_generator {
        prototype.set_own("constructor", function.clone());
    }
    let prototype = realm.heap.allocate(prototype);
    if let Value::HeapObject(id) = function {
        if let Ok(object) = realm.heap.get_mut(id) {
            object.set_own("prototype", prototype);
        }
    }
    function
}

fn invoke_closure(
    realm: &mut Realm,
    closure: &Closure,
    this: Value,
    new_target: Value,
    args: Vec<Value>,
) -> JsResult<Value> {
    let mut arguments = Vec::with_capacity(args.len() + 2);
    arguments.push(this);
    arguments.push(new_target);
    arguments.extend(args);

    realm.enter_call()?;
    let result = Interpreter::new(Rc::clone(&closure.info), arguments, closure.env).interpret(realm);
    realm.exit_call();
    result.into_completion()
}

fn not_a(realm: &mut Realm, value: &Value, what: &str) -> crate::error::Abrupt {
    let shown = display(realm, value);
    realm.throw(JsError::type_error(format!("{} is not a {}", shown, what)))
}

/// Call
pub fn call(realm: &mut Realm, callee: &Value, this: Value, args: Vec<Value>) -> JsResult<Value> {
    let kind = match callee {
        Value::HeapObject(id) => realm.heap.get(*id)?.kind.clone(),
        _ => return Err(not_a(realm, callee, "function")),
    };
    match kind {
        ObjectKind::Function(closure) if closure.info.is_generator() => {
            generator::create_generator(realm, callee, &closure, this, args)
        }
        ObjectKind::Function(closure) => {
            invoke_closure(realm, &closure, this, Value::Undefined, args)
        }
        ObjectKind::Native(native) => {
            let call = NativeCall {
                callee: callee.clone(),
                this,
                arguments: args,
                new_target: Value::Undefined,
            };
            (native.function)(realm, &call)
        }
        _ => Err(not_a(realm, callee, "function")),
    }
}

/// Construct
pub fn construct(
    realm: &mut Realm,
    constructor: &Value,
    args: Vec<Value>,
    new_target: &Value,
) -> JsResult<Value> {
    let object = match constructor {
        Value::HeapObject(id) => realm.heap.get(*id)?.clone(),
        _ => return Err(not_a(realm, constructor, "constructor")),
    };
    if !object.is_constructor() {
        return Err(not_a(realm, constructor, "constructor"));
    }
    let new_target = if new_target.is_undefined() {
        constructor.clone()
    } else {
        new_target.clone()
    };

    match object.kind {
        ObjectKind::Function(closure) => {
            let prototype = match get_value(realm, &new_target, "prototype")? {
                Value::HeapObject(id) => id,
                _ => realm.intrinsics().object_prototype,
            };
            let this = realm.heap.allocate(JsObject::ordinary(Some(prototype)));
            let result = invoke_closure(realm, &closure, this.clone(), new_target, args)?;
            Ok(if result.is_object() { result } else { this })
        }
        ObjectKind::Native(native) => {
            let call = NativeCall {
                callee: constructor.clone(),
                this: Value::Undefined,
                arguments: args,
                new_target,
            };
            (native.function)(realm, &call)
        }
        _ => Err(not_a(realm, constructor, "constructor")),
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Create an error object of the given kind
pub fn create_error(realm: &mut Realm, error: &JsError) -> Value {
    realm.create_error(error)
}

fn lookup(realm: &Realm, id: usize, key: &str) -> Option<Value> {
    let mut current = Some(id);
    while let Some(object_id) = current {
        let object = realm.heap.get(object_id).ok()?;
        if let Some(value) = object.get_own(key) {
            return Some(value);
        }
        current = object.prototype;
    }
    None
}

/// Render a thrown value as `Name: message`
///
/// Objects with a `name` property render like error objects; anything else
/// renders through ToString. Never raises.
pub fn describe_error(realm: &mut Realm, value: &Value) -> String {
    if let Value::HeapObject(id) = value {
        if let Some(name) = lookup(realm, *id, "name") {
            let name = display(realm, &name);
            let message = match lookup(realm, *id, "message") {
                Some(message) => display(realm, &message),
                None => String::new(),
            };
            return if message.is_empty() {
                name
            } else {
                format!("{}: {}", name, message)
            };
        }
        if let Ok(object) = realm.heap.get(*id) {
            if matches!(object.kind, ObjectKind::Ordinary) {
                return "[object Object]".to_string();
            }
        }
    }
    display(realm, value)
}
