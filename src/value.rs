use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive, Zero};
use num_bigint::BigInt;

use crate::error::EvalError;
use crate::types::NumericKind;

/// Runtime value flowing through a bound expression.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(BigDecimal),
    Str(Arc<str>),
    Array(Arc<ArrayValue>),
    /// Opaque host object. Host getters and methods downcast it.
    Object(Arc<dyn Any + Send + Sync>),
}

/// A rectangular array stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayValue {
    dims: Vec<usize>,
    items: Vec<Value>,
}

impl ArrayValue {
    /// One-dimensional array.
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            dims: vec![items.len()],
            items,
        }
    }

    /// Multi-dimensional array; `None` when the item count does not match the shape.
    pub fn with_dims(dims: Vec<usize>, items: Vec<Value>) -> Option<Self> {
        if dims.is_empty() || dims.iter().product::<usize>() != items.len() {
            return None;
        }
        Some(Self { dims, items })
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, indices: &[i64]) -> Result<&Value, EvalError> {
        if indices.len() != self.dims.len() {
            return Err(EvalError::InvalidValue {
                expected: format!("{} indices", self.dims.len()),
                found: format!("{} indices", indices.len()),
            });
        }
        let mut flat = 0usize;
        for (&index, &dim) in indices.iter().zip(self.dims.iter()) {
            if index < 0 || index as usize >= dim {
                return Err(EvalError::IndexOutOfRange { index, len: dim });
            }
            flat = flat * dim + index as usize;
        }
        Ok(&self.items[flat])
    }
}

impl Value {
    /// Wrap a host object.
    pub fn object<T: Any + Send + Sync>(value: T) -> Value {
        Value::Object(Arc::new(value))
    }

    pub fn str(s: &str) -> Value {
        Value::Str(Arc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Arc::new(ArrayValue::new(items)))
    }

    /// Borrow the host object inside, if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Like [`downcast_ref`](Self::downcast_ref) but with an error naming the expected type.
    pub fn host_ref<T: Any>(&self) -> Result<&T, EvalError> {
        self.downcast_ref::<T>().ok_or_else(|| EvalError::InvalidValue {
            expected: std::any::type_name::<T>().to_string(),
            found: self.type_name().to_string(),
        })
    }

    pub fn numeric_kind(&self) -> Option<NumericKind> {
        Some(match self {
            Value::I8(_) => NumericKind::I8,
            Value::U8(_) => NumericKind::U8,
            Value::I16(_) => NumericKind::I16,
            Value::U16(_) => NumericKind::U16,
            Value::I32(_) => NumericKind::I32,
            Value::U32(_) => NumericKind::U32,
            Value::I64(_) => NumericKind::I64,
            Value::U64(_) => NumericKind::U64,
            Value::F32(_) => NumericKind::F32,
            Value::F64(_) => NumericKind::F64,
            Value::Decimal(_) => NumericKind::Decimal,
            _ => return None,
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            other => other.numeric_kind().map(NumericKind::keyword).unwrap_or("?"),
        }
    }

    /// Lossy view of any numeric value as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        self.repr().map(|r| r.to_f64())
    }

    /// Integer view truncating toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        self.repr().and_then(|r| r.to_i128_trunc()).map(|i| i as i64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn repr(&self) -> Option<Repr<'_>> {
        Some(match self {
            Value::I8(v) => Repr::Int(*v as i128),
            Value::U8(v) => Repr::Int(*v as i128),
            Value::I16(v) => Repr::Int(*v as i128),
            Value::U16(v) => Repr::Int(*v as i128),
            Value::I32(v) => Repr::Int(*v as i128),
            Value::U32(v) => Repr::Int(*v as i128),
            Value::I64(v) => Repr::Int(*v as i128),
            Value::U64(v) => Repr::Int(*v as i128),
            Value::F32(v) => Repr::Float(*v as f64),
            Value::F64(v) => Repr::Float(*v),
            Value::Decimal(d) => Repr::Dec(d),
            _ => return None,
        })
    }

    /// Explicit numeric conversion: integers wrap, floating point truncates toward zero.
    pub fn convert_numeric(&self, kind: NumericKind) -> Result<Value, EvalError> {
        let repr = self.repr().ok_or_else(|| EvalError::InvalidValue {
            expected: kind.keyword().to_string(),
            found: self.type_name().to_string(),
        })?;
        Ok(match kind {
            NumericKind::F32 => Value::F32(repr.to_f64() as f32),
            NumericKind::F64 => Value::F64(repr.to_f64()),
            NumericKind::Decimal => Value::Decimal(repr.to_decimal()?),
            int => int_value(
                int,
                repr.to_i128_trunc().ok_or(EvalError::Overflow(int.keyword()))?,
            ),
        })
    }

    pub(crate) fn negate(&self) -> Result<Value, EvalError> {
        Ok(match self {
            Value::I8(v) => Value::I8(v.wrapping_neg()),
            Value::I16(v) => Value::I16(v.wrapping_neg()),
            Value::I32(v) => Value::I32(v.wrapping_neg()),
            Value::I64(v) => Value::I64(v.wrapping_neg()),
            Value::F32(v) => Value::F32(-v),
            Value::F64(v) => Value::F64(-v),
            Value::Decimal(d) => Value::Decimal(-d.clone()),
            other => {
                return Err(EvalError::InvalidValue {
                    expected: "signed number".into(),
                    found: other.type_name().into(),
                });
            }
        })
    }
}

enum Repr<'a> {
    Int(i128),
    Float(f64),
    Dec(&'a BigDecimal),
}

impl Repr<'_> {
    fn to_f64(&self) -> f64 {
        match self {
            Repr::Int(i) => *i as f64,
            Repr::Float(f) => *f,
            Repr::Dec(d) => d.to_f64().unwrap_or(f64::NAN),
        }
    }

    fn to_i128_trunc(&self) -> Option<i128> {
        match self {
            Repr::Int(i) => Some(*i),
            Repr::Float(f) => Some(f.trunc() as i128),
            Repr::Dec(d) => d.with_scale(0).to_i128(),
        }
    }

    fn to_decimal(&self) -> Result<BigDecimal, EvalError> {
        match self {
            Repr::Int(i) => Ok(BigDecimal::new(BigInt::from(*i), 0)),
            Repr::Float(f) => {
                let d = BigDecimal::from_f64(*f).ok_or_else(|| EvalError::InvalidValue {
                    expected: "finite number".into(),
                    found: f.to_string(),
                })?;
                fit_decimal(d).ok_or(EvalError::Overflow("decimal"))
            }
            Repr::Dec(d) => Ok((*d).clone()),
        }
    }
}

/// Fractional digits a `decimal` keeps.
const DECIMAL_SCALE: i64 = 28;
/// Integral digits of the largest `decimal`, 2^96 - 1.
const DECIMAL_DIGITS: i64 = 29;

/// Largest `decimal`: a 96-bit mantissa at scale zero.
pub(crate) fn decimal_max() -> BigDecimal {
    BigDecimal::new(BigInt::from((1u128 << 96) - 1), 0)
}

/// Bring `d` into the `decimal` range, rounding to 28 fractional digits. `None` when the
/// magnitude is 2^96 or more.
///
/// Digit counts are compared before any rescaling, so extreme exponents cost nothing.
pub(crate) fn fit_decimal(d: BigDecimal) -> Option<BigDecimal> {
    let (mantissa, scale) = d.as_bigint_and_exponent();
    if mantissa.is_zero() {
        return Some(BigDecimal::zero());
    }
    let whole_digits = mantissa.magnitude().to_string().len() as i64 - scale;
    if whole_digits > DECIMAL_DIGITS {
        return None;
    }
    if whole_digits < -DECIMAL_SCALE {
        return Some(BigDecimal::zero());
    }
    let d = if scale > DECIMAL_SCALE {
        d.round(DECIMAL_SCALE)
    } else {
        d
    };
    (d.abs() <= decimal_max()).then_some(d)
}

fn int_value(kind: NumericKind, i: i128) -> Value {
    match kind {
        NumericKind::I8 => Value::I8(i as i8),
        NumericKind::U8 => Value::U8(i as u8),
        NumericKind::I16 => Value::I16(i as i16),
        NumericKind::U16 => Value::U16(i as u16),
        NumericKind::I32 => Value::I32(i as i32),
        NumericKind::U32 => Value::U32(i as u32),
        NumericKind::I64 => Value::I64(i as i64),
        NumericKind::U64 => Value::U64(i as u64),
        NumericKind::F32 => Value::F32(i as f32),
        NumericKind::F64 => Value::F64(i as f64),
        NumericKind::Decimal => Value::Decimal(BigDecimal::new(BigInt::from(i), 0)),
    }
}

/// Arithmetic operator of a folded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Rem => '%',
            BinaryOp::Pow => '^',
        }
    }
}

macro_rules! int_arith {
    ($op:expr, $a:expr, $b:expr, $variant:ident) => {{
        let (a, b) = ($a, $b);
        match $op {
            BinaryOp::Add => Value::$variant(a.wrapping_add(b)),
            BinaryOp::Sub => Value::$variant(a.wrapping_sub(b)),
            BinaryOp::Mul => Value::$variant(a.wrapping_mul(b)),
            BinaryOp::Div => {
                if b == 0 {
                    return Err(EvalError::DivideByZero);
                }
                Value::$variant(a.wrapping_div(b))
            }
            BinaryOp::Rem => {
                if b == 0 {
                    return Err(EvalError::DivideByZero);
                }
                Value::$variant(a.wrapping_rem(b))
            }
            BinaryOp::Pow => Value::F64((a as f64).powf(b as f64)),
        }
    }};
}

macro_rules! float_arith {
    ($op:expr, $a:expr, $b:expr, $variant:ident) => {{
        let (a, b) = ($a, $b);
        match $op {
            BinaryOp::Add => Value::$variant(a + b),
            BinaryOp::Sub => Value::$variant(a - b),
            BinaryOp::Mul => Value::$variant(a * b),
            BinaryOp::Div => Value::$variant(a / b),
            BinaryOp::Rem => Value::$variant(a % b),
            BinaryOp::Pow => Value::$variant(a.powf(b)),
        }
    }};
}

/// Apply `op` to two operands already converted to the same numeric kind.
pub(crate) fn arith(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    Ok(match (l, r) {
        (Value::I8(a), Value::I8(b)) => int_arith!(op, *a, *b, I8),
        (Value::U8(a), Value::U8(b)) => int_arith!(op, *a, *b, U8),
        (Value::I16(a), Value::I16(b)) => int_arith!(op, *a, *b, I16),
        (Value::U16(a), Value::U16(b)) => int_arith!(op, *a, *b, U16),
        (Value::I32(a), Value::I32(b)) => int_arith!(op, *a, *b, I32),
        (Value::U32(a), Value::U32(b)) => int_arith!(op, *a, *b, U32),
        (Value::I64(a), Value::I64(b)) => int_arith!(op, *a, *b, I64),
        (Value::U64(a), Value::U64(b)) => int_arith!(op, *a, *b, U64),
        (Value::F32(a), Value::F32(b)) => float_arith!(op, *a, *b, F32),
        (Value::F64(a), Value::F64(b)) => float_arith!(op, *a, *b, F64),
        (Value::Decimal(a), Value::Decimal(b)) => {
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div | BinaryOp::Rem if b.is_zero() => {
                    return Err(EvalError::DivideByZero);
                }
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                BinaryOp::Pow => {
                    let a = a.to_f64().unwrap_or(f64::NAN);
                    let b = b.to_f64().unwrap_or(f64::NAN);
                    return Ok(Value::F64(a.powf(b)));
                }
            };
            Value::Decimal(fit_decimal(result).ok_or(EvalError::Overflow("decimal"))?)
        }
        (l, r) => {
            return Err(EvalError::InvalidValue {
                expected: "operands of one numeric kind".into(),
                found: format!("{} {} {}", l.type_name(), op.symbol(), r.type_name()),
            });
        }
    })
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::I8(v) => write!(f, "I8({v})"),
            Value::U8(v) => write!(f, "U8({v})"),
            Value::I16(v) => write!(f, "I16({v})"),
            Value::U16(v) => write!(f, "U16({v})"),
            Value::I32(v) => write!(f, "I32({v})"),
            Value::U32(v) => write!(f, "U32({v})"),
            Value::I64(v) => write!(f, "I64({v})"),
            Value::U64(v) => write!(f, "U64({v})"),
            Value::F32(v) => write!(f, "F32({v})"),
            Value::F64(v) => write!(f, "F64({v})"),
            Value::Decimal(v) => write!(f, "Decimal({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Array(v) => write!(f, "Array({:?})", v.items),
            Value::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    BigDecimal => Decimal,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}
