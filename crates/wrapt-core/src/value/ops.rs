//! Arithmetic, bitwise and unary operators on `Value`.
//!
//! Every operator goes through one dispatch helper keyed by `BinaryOp`: an
//! object on the left handles the operation, otherwise an object on the right
//! handles the reflected form, otherwise primitive arithmetic applies.

use std::cmp::Ordering;

use crate::{
    errors::{Result, WraptError},
    value::Value,
};

/// Binary operator tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    TrueDiv,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::TrueDiv => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
        }
    }
}

/// Unary operator tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Pos,
    Abs,
    Invert,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "unary -",
            UnaryOp::Pos => "unary +",
            UnaryOp::Abs => "abs()",
            UnaryOp::Invert => "unary ~",
        }
    }
}

/// Numeric view of a value, bools count as integers
#[derive(Debug, Clone, Copy)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

impl PartialEq for Num {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Num {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl Value {
    /// Evaluate `self <op> rhs`
    pub fn binary_op(&self, op: BinaryOp, rhs: &Value) -> Result<Value> {
        if let Value::Object(obj) = self {
            return obj.binary_op(op, rhs, false);
        }
        if let Value::Object(obj) = rhs {
            return obj.binary_op(op, self, true);
        }
        primitive_binary_op(op, self, rhs)
    }

    /// Evaluate `self <op>= rhs`.
    ///
    /// Mutable referents are updated in place and the same handle is
    /// returned; immutable payloads produce a new value.
    pub fn inplace_op(&self, op: BinaryOp, rhs: &Value) -> Result<Value> {
        match (self, op) {
            (Value::List(list), BinaryOp::Add) => {
                let items = rhs.iter()?.collect::<Result<Vec<_>>>()?;
                list.write().extend(items);
                Ok(self.clone())
            }
            (Value::List(list), BinaryOp::Mul) => {
                let count = repeat_count(op, self, rhs)?;
                let mut list = list.write();
                repeat_len(op, list.len(), count)?;
                let original = std::mem::take(&mut *list);
                for _ in 0..count {
                    list.extend(original.iter().cloned());
                }
                Ok(self.clone())
            }
            (Value::Map(map), BinaryOp::BitOr) => {
                let Value::Map(other) = rhs else {
                    return Err(WraptError::binary_type_error(
                        "|=",
                        self.type_name(),
                        rhs.type_name(),
                    ));
                };
                let entries = other.read().clone();
                map.write().extend(entries);
                Ok(self.clone())
            }
            (Value::Object(obj), _) => Ok(obj.inplace_op(op, rhs)?.unwrap_or_else(|| self.clone())),
            _ => self.binary_op(op, rhs),
        }
    }

    pub fn unary_op(&self, op: UnaryOp) -> Result<Value> {
        let bad_operand = || {
            WraptError::type_error(format!(
                "bad operand type for {}: '{}'",
                op.symbol(),
                self.type_name()
            ))
        };
        if let Value::Object(obj) = self {
            return obj.unary_op(op);
        }
        match (op, Num::from_value(self).ok_or_else(bad_operand)?) {
            (UnaryOp::Neg, Num::Int(i)) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| WraptError::overflow("negation")),
            (UnaryOp::Neg, Num::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::Pos, Num::Int(i)) => Ok(Value::Int(i)),
            (UnaryOp::Pos, Num::Float(f)) => Ok(Value::Float(f)),
            (UnaryOp::Abs, Num::Int(i)) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| WraptError::overflow("abs")),
            (UnaryOp::Abs, Num::Float(f)) => Ok(Value::Float(f.abs())),
            (UnaryOp::Invert, Num::Int(i)) => Ok(Value::Int(!i)),
            (UnaryOp::Invert, Num::Float(_)) => Err(bad_operand()),
        }
    }

    pub fn to_int(&self) -> Result<i64> {
        match self {
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Int(i) => Ok(*i),
            Value::Float(f) if f.is_finite() => {
                let truncated = f.trunc();
                // 2^63 is the smallest float above i64::MAX
                if truncated >= -(i64::MIN as f64) || truncated < i64::MIN as f64 {
                    return Err(WraptError::overflow("int()"));
                }
                Ok(truncated as i64)
            }
            Value::Str(s) => s.trim().parse().map_err(|_| {
                WraptError::type_error(format!("invalid literal for int() with base 10: {s:?}"))
            }),
            Value::Object(obj) => obj.to_int(),
            _ => Err(WraptError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                self.type_name()
            ))),
        }
    }

    pub fn to_float(&self) -> Result<f64> {
        match self {
            Value::Bool(b) => Ok(f64::from(u8::from(*b))),
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| WraptError::type_error(format!("could not convert string to float: {s:?}"))),
            Value::Object(obj) => obj.to_float(),
            _ => Err(WraptError::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                self.type_name()
            ))),
        }
    }
}

/// Largest number of elements or bytes a repetition may produce
const MAX_REPEAT_LEN: usize = 1 << 28;

fn repeat_count(op: BinaryOp, left: &Value, count: &Value) -> Result<usize> {
    match count {
        Value::Int(_) | Value::Bool(_) => {
            let count = count.as_int().unwrap_or(0).max(0);
            usize::try_from(count).map_err(|_| WraptError::overflow(op.symbol()))
        }
        _ => Err(WraptError::binary_type_error(
            op.symbol(),
            left.type_name(),
            count.type_name(),
        )),
    }
}

/// Length of `len` repeated `count` times, refusing results that would not fit in memory
fn repeat_len(op: BinaryOp, len: usize, count: usize) -> Result<usize> {
    len.checked_mul(count)
        .filter(|total| *total <= MAX_REPEAT_LEN)
        .ok_or_else(|| WraptError::overflow(op.symbol()))
}

fn primitive_binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let type_error = || WraptError::binary_type_error(op.symbol(), left.type_name(), right.type_name());

    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.read().clone();
            items.extend(b.read().iter().cloned());
            Ok(Value::list(items))
        }
        (BinaryOp::Mul, Value::Str(s), n @ (Value::Int(_) | Value::Bool(_)))
        | (BinaryOp::Mul, n @ (Value::Int(_) | Value::Bool(_)), Value::Str(s)) => {
            let count = repeat_count(op, left, n)?;
            repeat_len(op, s.len(), count)?;
            Ok(Value::Str(s.repeat(count)))
        }
        (BinaryOp::Mul, Value::List(list), n @ (Value::Int(_) | Value::Bool(_)))
        | (BinaryOp::Mul, n @ (Value::Int(_) | Value::Bool(_)), Value::List(list)) => {
            let count = repeat_count(op, left, n)?;
            let items = list.read().clone();
            repeat_len(op, items.len(), count)?;
            Ok(Value::list(
                std::iter::repeat(items).take(count).flatten(),
            ))
        }
        (BinaryOp::BitOr, Value::Map(a), Value::Map(b)) => {
            let mut merged = a.read().clone();
            merged.extend(b.read().clone());
            Ok(Value::map(merged))
        }
        (BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor, Value::Bool(a), Value::Bool(b)) => {
            Ok(Value::Bool(match op {
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                _ => a ^ b,
            }))
        }
        _ => match (Num::from_value(left), Num::from_value(right)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => int_op(op, a, b),
            (Some(a), Some(b)) => match op {
                BinaryOp::LShift | BinaryOp::RShift | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                    Err(type_error())
                }
                _ => float_op(op, a.as_f64(), b.as_f64()),
            },
            _ => Err(type_error()),
        },
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Result<Value> {
    let overflow = || WraptError::overflow(op.symbol());
    let value = match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinaryOp::TrueDiv => return float_op(op, a as f64, b as f64),
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(WraptError::DivisionByZero);
            }
            let quotient = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                quotient - 1
            } else {
                quotient
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(WraptError::DivisionByZero);
            }
            let remainder = a.checked_rem(b).ok_or_else(overflow)?;
            if remainder != 0 && ((remainder < 0) != (b < 0)) {
                remainder + b
            } else {
                remainder
            }
        }
        BinaryOp::Pow => {
            if b < 0 {
                return float_op(op, a as f64, b as f64);
            }
            let exponent = u32::try_from(b).map_err(|_| overflow())?;
            a.checked_pow(exponent).ok_or_else(overflow)?
        }
        BinaryOp::LShift => {
            if b < 0 {
                return Err(WraptError::type_error("negative shift count"));
            }
            if a == 0 {
                0
            } else if b >= 63 {
                return Err(overflow());
            } else {
                let shifted = a << b;
                if shifted >> b != a {
                    return Err(overflow());
                }
                shifted
            }
        }
        BinaryOp::RShift => {
            if b < 0 {
                return Err(WraptError::type_error("negative shift count"));
            }
            if b >= 64 {
                if a < 0 {
                    -1
                } else {
                    0
                }
            } else {
                a >> b
            }
        }
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
    };
    Ok(Value::Int(value))
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<Value> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::TrueDiv | BinaryOp::FloorDiv | BinaryOp::Mod if b == 0.0 => {
            return Err(WraptError::DivisionByZero)
        }
        BinaryOp::TrueDiv => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => {
            let remainder = a % b;
            if remainder != 0.0 && ((remainder < 0.0) != (b < 0.0)) {
                remainder + b
            } else {
                remainder
            }
        }
        BinaryOp::Pow => a.powf(b),
        _ => {
            return Err(WraptError::binary_type_error(op.symbol(), "float", "float"));
        }
    };
    Ok(Value::Float(value))
}

macro_rules! forward_binary_operators {
    ($($trait:ident :: $method:ident => $op:ident),* $(,)?) => {
        $(
            impl std::ops::$trait<&Value> for &Value {
                type Output = Result<Value>;

                fn $method(self, rhs: &Value) -> Result<Value> {
                    self.binary_op(BinaryOp::$op, rhs)
                }
            }
        )*
    };
}

forward_binary_operators! {
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => TrueDiv,
    Rem::rem => Mod,
    BitAnd::bitand => BitAnd,
    BitOr::bitor => BitOr,
    BitXor::bitxor => BitXor,
    Shl::shl => LShift,
    Shr::shr => RShift,
}

impl std::ops::Neg for &Value {
    type Output = Result<Value>;

    fn neg(self) -> Result<Value> {
        self.unary_op(UnaryOp::Neg)
    }
}

impl std::ops::Not for &Value {
    type Output = Result<Value>;

    fn not(self) -> Result<Value> {
        self.unary_op(UnaryOp::Invert)
    }
}
