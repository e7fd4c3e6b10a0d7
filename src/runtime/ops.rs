// Foxscream Operators
// Arithmetic, comparison, bitwise, indexing and slicing on runtime values

use std::cmp::Ordering;

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::ErrorKind;

use super::prelude::Prelude;
use super::value::{Dict, DictKey, Payload, Value};

/// Operator failure without a source position
#[derive(Debug, Clone, PartialEq)]
pub struct OpError {
    pub kind: ErrorKind,
    pub message: String,
}

impl OpError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    fn overflow() -> Self {
        Self::new(ErrorKind::ValueError, "Integer overflow")
    }

    fn division_by_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero, "Division by zero")
    }
}

pub type OpResult = Result<Value, OpError>;

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        match value.borrow().payload {
            Payload::Int(n) => Some(Num::Int(n)),
            Payload::Float(f) => Some(Num::Float(f)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }
}

fn unsupported(op: &str, left: &Value, right: &Value) -> OpError {
    OpError::type_error(format!(
        "Unsupported operand types for {}: '{}' and '{}'",
        op,
        left.type_name(),
        right.type_name()
    ))
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn arithmetic(prelude: &Prelude, op: BinaryOp, a: Num, b: Num) -> OpResult {
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let result = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div => {
                if y == 0 {
                    return Err(OpError::division_by_zero());
                }
                return Ok(prelude.float(x as f64 / y as f64));
            }
            BinaryOp::FloorDiv => {
                if y == 0 {
                    return Err(OpError::division_by_zero());
                }
                floor_div(x, y)
            }
            BinaryOp::Mod => {
                if y == 0 {
                    return Err(OpError::division_by_zero());
                }
                floor_mod(x, y)
            }
            BinaryOp::Pow => {
                if y < 0 {
                    return Ok(prelude.float((x as f64).powf(y as f64)));
                }
                u32::try_from(y).ok().and_then(|exp| x.checked_pow(exp))
            }
            _ => None,
        };
        return result.map(|n| prelude.int(n)).ok_or_else(OpError::overflow);
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(OpError::division_by_zero());
            }
            x / y
        }
        BinaryOp::FloorDiv => {
            if y == 0.0 {
                return Err(OpError::division_by_zero());
            }
            (x / y).floor()
        }
        BinaryOp::Mod => {
            if y == 0.0 {
                return Err(OpError::division_by_zero());
            }
            x - y * (x / y).floor()
        }
        BinaryOp::Pow => x.powf(y),
        _ => return Err(OpError::type_error(format!("'{}' is not arithmetic", op.symbol()))),
    };
    Ok(prelude.float(result))
}

/// Longest string or array a repetition may build
const MAX_REPEAT_LEN: usize = 1 << 28;

/// Repetition count for `unit` items repeated `count` times, checked before
/// anything is allocated. Negative counts repeat nothing.
fn repeat_count(unit: usize, count: i64) -> Result<usize, OpError> {
    let count = usize::try_from(count).unwrap_or(0);
    match unit.checked_mul(count) {
        _ if unit == 0 => Ok(0),
        Some(total) if total <= MAX_REPEAT_LEN => Ok(count),
        _ => Err(OpError::new(
            ErrorKind::ValueError,
            format!("Repetition result too large ({} x {})", unit, count),
        )),
    }
}

fn repeat<T: Clone>(items: &[T], count: i64) -> Result<Vec<T>, OpError> {
    let count = repeat_count(items.len(), count)?;
    let mut repeated = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        repeated.extend_from_slice(items);
    }
    Ok(repeated)
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) {
        return match (a, b) {
            (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
            _ => a.as_f64().partial_cmp(&b.as_f64()),
        };
    }
    match (&left.borrow().payload, &right.borrow().payload) {
        (Payload::Str(a), Payload::Str(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Evaluate a non-short-circuit, non-relational binary operator
pub fn binary(prelude: &Prelude, op: BinaryOp, left: &Value, right: &Value) -> OpResult {
    match op {
        BinaryOp::Equal => return Ok(prelude.bool(left == right)),
        BinaryOp::NotEqual => return Ok(prelude.bool(left != right)),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let both_comparable = (Num::of(left).is_some() && Num::of(right).is_some())
                || (left.as_str().is_some() && right.as_str().is_some());
            if !both_comparable {
                return Err(OpError::type_error(format!(
                    "'{}' not supported between '{}' and '{}'",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                )));
            }
            let ordering = compare(left, right);
            let result = match op {
                BinaryOp::Less => ordering == Some(Ordering::Less),
                BinaryOp::LessEqual => {
                    matches!(ordering, Some(Ordering::Less | Ordering::Equal))
                }
                BinaryOp::Greater => ordering == Some(Ordering::Greater),
                _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            };
            return Ok(prelude.bool(result));
        }
        _ => {}
    }

    if let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) {
        return match op {
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::FloorDiv
            | BinaryOp::Mod
            | BinaryOp::Pow => arithmetic(prelude, op, a, b),
            _ => bitwise(prelude, op, left, right),
        };
    }

    let l = left.borrow();
    let r = right.borrow();
    match (op, &l.payload, &r.payload) {
        (BinaryOp::Add, Payload::Str(a), Payload::Str(b)) => Ok(prelude.str(format!("{}{}", a, b))),
        (BinaryOp::Add, Payload::Array(a), Payload::Array(b)) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            Ok(prelude.array(items))
        }
        (BinaryOp::Mul, Payload::Str(s), Payload::Int(n))
        | (BinaryOp::Mul, Payload::Int(n), Payload::Str(s)) => {
            Ok(prelude.str(s.repeat(repeat_count(s.len(), *n)?)))
        }
        (BinaryOp::Mul, Payload::Array(items), Payload::Int(n))
        | (BinaryOp::Mul, Payload::Int(n), Payload::Array(items)) => {
            Ok(prelude.array(repeat(items, *n)?))
        }
        (BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor, Payload::Bool(a), Payload::Bool(b)) => {
            let result = match op {
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                _ => a ^ b,
            };
            Ok(prelude.bool(result))
        }
        _ => Err(unsupported(op.symbol(), left, right)),
    }
}

fn bitwise(prelude: &Prelude, op: BinaryOp, left: &Value, right: &Value) -> OpResult {
    let (Some(a), Some(b)) = (left.as_int(), right.as_int()) else {
        return Err(unsupported(op.symbol(), left, right));
    };
    let result = match op {
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::LeftShift | BinaryOp::RightShift => {
            let shift = u32::try_from(b)
                .ok()
                .filter(|s| *s < 64)
                .ok_or_else(|| OpError::new(ErrorKind::ValueError, format!("Invalid shift count {}", b)))?;
            if op == BinaryOp::LeftShift {
                a.checked_shl(shift).ok_or_else(OpError::overflow)?
            } else {
                a >> shift
            }
        }
        _ => return Err(unsupported(op.symbol(), left, right)),
    };
    Ok(prelude.int(result))
}

pub fn unary(prelude: &Prelude, op: UnaryOp, operand: &Value) -> OpResult {
    if op == UnaryOp::Not {
        return Ok(prelude.bool(!operand.is_truthy()));
    }
    let bad_operand = || {
        OpError::type_error(format!(
            "Bad operand type for unary {}: '{}'",
            op.symbol(),
            operand.type_name()
        ))
    };
    match (op, Num::of(operand)) {
        (UnaryOp::Negate, Some(Num::Int(n))) => {
            n.checked_neg().map(|n| prelude.int(n)).ok_or_else(OpError::overflow)
        }
        (UnaryOp::Negate, Some(Num::Float(f))) => Ok(prelude.float(-f)),
        (UnaryOp::Plus, Some(_)) => Ok(operand.clone()),
        (UnaryOp::BitNot, Some(Num::Int(n))) => Ok(prelude.int(!n)),
        _ => Err(bad_operand()),
    }
}

// ==================== Containers ====================

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

fn dict_key(key: &Value) -> Result<DictKey, OpError> {
    DictKey::from_value(key).ok_or_else(|| {
        OpError::type_error(format!("Unhashable dictionary key type '{}'", key.type_name()))
    })
}

/// `object[index]`
pub fn index(prelude: &Prelude, object: &Value, index: &Value) -> OpResult {
    let target = object.borrow();
    match &target.payload {
        Payload::Array(items) => {
            let i = index.as_int().ok_or_else(|| {
                OpError::type_error(format!("Array index must be int, not '{}'", index.type_name()))
            })?;
            normalize_index(i, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| {
                    OpError::new(
                        ErrorKind::IndexError,
                        format!("Array index {} out of range for length {}", i, items.len()),
                    )
                })
        }
        Payload::Str(s) => {
            let i = index.as_int().ok_or_else(|| {
                OpError::type_error(format!("String index must be int, not '{}'", index.type_name()))
            })?;
            let chars: Vec<char> = s.chars().collect();
            normalize_index(i, chars.len())
                .map(|i| prelude.str(chars[i]))
                .ok_or_else(|| {
                    OpError::new(
                        ErrorKind::IndexError,
                        format!("String index {} out of range for length {}", i, chars.len()),
                    )
                })
        }
        Payload::Dict(dict) => {
            let key = dict_key(index)?;
            dict.get(&key).cloned().ok_or_else(|| {
                OpError::new(ErrorKind::IndexError, format!("Key {} not found", index.repr()))
            })
        }
        _ => Err(OpError::type_error(format!(
            "'{}' is not indexable",
            object.type_name()
        ))),
    }
}

/// `object[index] = value`
pub fn set_index(object: &Value, index: &Value, value: Value) -> Result<(), OpError> {
    let type_name = object.type_name();
    let position = index.as_int();
    let hashed = DictKey::from_value(index);
    let index_type = index.type_name();

    let mut target = object.borrow_mut();
    match &mut target.payload {
        Payload::Array(items) => {
            let i = position.ok_or_else(|| {
                OpError::type_error(format!("Array index must be int, not '{}'", index_type))
            })?;
            let len = items.len();
            let slot = normalize_index(i, len).ok_or_else(|| {
                OpError::new(
                    ErrorKind::IndexError,
                    format!("Array index {} out of range for length {}", i, len),
                )
            })?;
            items[slot] = value;
            Ok(())
        }
        Payload::Dict(dict) => {
            let key = hashed.ok_or_else(|| {
                OpError::type_error(format!("Unhashable dictionary key type '{}'", index_type))
            })?;
            dict.insert(key, index.clone(), value);
            Ok(())
        }
        _ => Err(OpError::type_error(format!(
            "'{}' does not support item assignment",
            type_name
        ))),
    }
}

fn slice_indices(len: usize, start: Option<i64>, end: Option<i64>, step: i64) -> Vec<usize> {
    let len = len as i64;
    let clamp = |bound: i64, low: i64, high: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };

    let mut indices = Vec::new();
    if step > 0 {
        let mut i = start.map_or(0, |s| clamp(s, 0, len));
        let stop = end.map_or(len, |e| clamp(e, 0, len));
        while i < stop {
            indices.push(i as usize);
            i += step;
        }
    } else {
        let mut i = start.map_or(len - 1, |s| clamp(s, -1, len - 1));
        let stop = end.map_or(-1, |e| clamp(e, -1, len - 1));
        while i > stop {
            indices.push(i as usize);
            i += step;
        }
    }
    indices
}

/// `object[start:end:step]`
pub fn slice(
    prelude: &Prelude,
    object: &Value,
    start: Option<&Value>,
    end: Option<&Value>,
    step: Option<&Value>,
) -> OpResult {
    let bound = |value: Option<&Value>| -> Result<Option<i64>, OpError> {
        match value {
            None => Ok(None),
            Some(v) if v.is_null() => Ok(None),
            Some(v) => v.as_int().map(Some).ok_or_else(|| {
                OpError::type_error(format!("Slice bounds must be int, not '{}'", v.type_name()))
            }),
        }
    };
    let start = bound(start)?;
    let end = bound(end)?;
    let step = bound(step)?.unwrap_or(1);
    if step == 0 {
        return Err(OpError::new(ErrorKind::ValueError, "Slice step cannot be zero"));
    }

    let target = object.borrow();
    match &target.payload {
        Payload::Array(items) => {
            let picked = slice_indices(items.len(), start, end, step)
                .into_iter()
                .map(|i| items[i].clone())
                .collect();
            Ok(prelude.array(picked))
        }
        Payload::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked: String = slice_indices(chars.len(), start, end, step)
                .into_iter()
                .map(|i| chars[i])
                .collect();
            Ok(prelude.str(picked))
        }
        _ => Err(OpError::type_error(format!(
            "'{}' cannot be sliced",
            object.type_name()
        ))),
    }
}

/// `item in container`
pub fn contains(container: &Value, item: &Value) -> Result<bool, OpError> {
    let target = container.borrow();
    match &target.payload {
        Payload::Array(items) => Ok(items.iter().any(|v| v == item)),
        Payload::Dict(dict) => Ok(DictKey::from_value(item).is_some_and(|key| dict.contains(&key))),
        Payload::Str(s) => match item.as_str() {
            Some(needle) => Ok(s.contains(&needle)),
            None => Err(OpError::type_error(format!(
                "'in <str>' requires str as left operand, not '{}'",
                item.type_name()
            ))),
        },
        _ => Err(OpError::type_error(format!(
            "Argument of type '{}' is not a container",
            container.type_name()
        ))),
    }
}

/// Build a dictionary from evaluated key/value pairs
pub fn build_dict(prelude: &Prelude, entries: Vec<(Value, Value)>) -> OpResult {
    let mut dict = Dict::new();
    for (key, value) in entries {
        let hashed = dict_key(&key)?;
        dict.insert(hashed, key, value);
    }
    Ok(prelude.dict(dict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(result: OpResult) -> String {
        match result {
            Ok(value) => value.repr(),
            Err(error) => format!("{}: {}", error.kind, error.message),
        }
    }

    #[test]
    fn test_integer_arithmetic() {
        let p = Prelude::new();
        let (seven, two) = (p.int(7), p.int(2));
        assert_eq!(render(binary(&p, BinaryOp::Add, &seven, &two)), "9");
        assert_eq!(render(binary(&p, BinaryOp::Div, &seven, &two)), "3.5");
        assert_eq!(render(binary(&p, BinaryOp::FloorDiv, &seven, &two)), "3");
        assert_eq!(render(binary(&p, BinaryOp::Pow, &seven, &two)), "49");
        assert_eq!(
            render(binary(&p, BinaryOp::FloorDiv, &p.int(-7), &two)),
            "-4"
        );
        assert_eq!(render(binary(&p, BinaryOp::Mod, &p.int(-7), &two)), "1");
    }

    #[test]
    fn test_mixed_arithmetic_promotes_to_float() {
        let p = Prelude::new();
        assert_eq!(
            render(binary(&p, BinaryOp::Mul, &p.int(2), &p.float(1.5))),
            "3.0"
        );
    }

    #[test]
    fn test_division_by_zero() {
        let p = Prelude::new();
        assert_eq!(
            render(binary(&p, BinaryOp::Mod, &p.int(1), &p.int(0))),
            "DivisionByZero: Division by zero"
        );
        assert_eq!(
            render(binary(&p, BinaryOp::Div, &p.float(1.0), &p.int(0))),
            "DivisionByZero: Division by zero"
        );
    }

    #[test]
    fn test_overflow_is_reported() {
        let p = Prelude::new();
        assert_eq!(
            render(binary(&p, BinaryOp::Add, &p.int(i64::MAX), &p.int(1))),
            "ValueError: Integer overflow"
        );
    }

    #[test]
    fn test_string_and_array_operators() {
        let p = Prelude::new();
        assert_eq!(
            render(binary(&p, BinaryOp::Add, &p.str("ab"), &p.str("c"))),
            "\"abc\""
        );
        assert_eq!(
            render(binary(&p, BinaryOp::Mul, &p.str("ab"), &p.int(2))),
            "\"abab\""
        );
        let xs = p.array(vec![p.int(1)]);
        assert_eq!(render(binary(&p, BinaryOp::Mul, &xs, &p.int(3))), "[1, 1, 1]");
        assert_eq!(
            render(binary(&p, BinaryOp::Add, &p.str("a"), &p.int(1))),
            "TypeError: Unsupported operand types for +: 'str' and 'int'"
        );
    }

    #[test]
    fn test_oversized_repetition_is_an_error() {
        let p = Prelude::new();
        assert_eq!(
            render(binary(&p, BinaryOp::Mul, &p.str("ab"), &p.int(i64::MAX))),
            format!("ValueError: Repetition result too large (2 x {})", i64::MAX)
        );
        let xs = p.array(vec![p.int(1)]);
        assert_eq!(
            render(binary(&p, BinaryOp::Mul, &p.int(1 << 40), &xs)),
            format!("ValueError: Repetition result too large (1 x {})", 1i64 << 40)
        );
        let empty = p.array(Vec::new());
        assert_eq!(render(binary(&p, BinaryOp::Mul, &empty, &p.int(i64::MAX))), "[]");
        assert_eq!(render(binary(&p, BinaryOp::Mul, &p.str("ab"), &p.int(-3))), "\"\"");
    }

    #[test]
    fn test_comparisons() {
        let p = Prelude::new();
        assert_eq!(
            render(binary(&p, BinaryOp::Less, &p.int(1), &p.float(1.5))),
            "true"
        );
        assert_eq!(
            render(binary(&p, BinaryOp::GreaterEqual, &p.str("b"), &p.str("a"))),
            "true"
        );
        assert_eq!(
            render(binary(&p, BinaryOp::Equal, &p.int(1), &p.float(1.0))),
            "true"
        );
        assert!(binary(&p, BinaryOp::Less, &p.int(1), &p.str("a")).is_err());
    }

    #[test]
    fn test_indexing_and_slicing() {
        let p = Prelude::new();
        let xs = p.array((1..=5).map(|n| p.int(n)).collect());
        assert_eq!(render(index(&p, &xs, &p.int(-1))), "5");
        assert_eq!(
            render(index(&p, &xs, &p.int(5))),
            "IndexError: Array index 5 out of range for length 5"
        );
        assert_eq!(
            render(slice(&p, &xs, Some(&p.int(1)), Some(&p.int(4)), None)),
            "[2, 3, 4]"
        );
        assert_eq!(
            render(slice(&p, &xs, None, None, Some(&p.int(-2)))),
            "[5, 3, 1]"
        );
        assert_eq!(
            render(slice(&p, &p.str("hello"), None, Some(&p.int(-1)), None)),
            "\"hell\""
        );
    }

    #[test]
    fn test_dictionary_access() {
        let p = Prelude::new();
        let dict = build_dict(&p, vec![(p.str("a"), p.int(1))]).unwrap();
        assert_eq!(render(index(&p, &dict, &p.str("a"))), "1");
        set_index(&dict, &p.str("b"), p.int(2)).unwrap();
        assert_eq!(dict.to_string(), "[\"a\": 1, \"b\": 2]");
        assert!(contains(&dict, &p.str("b")).unwrap());
        assert!(build_dict(&p, vec![(p.array(vec![]), p.int(1))]).is_err());
    }

    #[test]
    fn test_contains() {
        let p = Prelude::new();
        assert!(contains(&p.str("hello"), &p.str("ell")).unwrap());
        let xs = p.array(vec![p.int(1), p.int(2)]);
        assert!(contains(&xs, &p.float(2.0)).unwrap());
        assert!(!contains(&xs, &p.int(3)).unwrap());
    }
}
