use std::fmt;
use std::sync::Arc;

use strum::{EnumIs, EnumIter};

/// Numeric primitive kinds understood by the arithmetic folder.
///
/// The declaration order is the promotion rank: narrower integers first, then wider
/// integers, then floating point, then decimal. [`max_type`] relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumIs)]
pub enum NumericKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
}

impl NumericKind {
    /// Position in the promotion table.
    #[inline]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        !matches!(self, NumericKind::F32 | NumericKind::F64 | NumericKind::Decimal)
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, NumericKind::F32 | NumericKind::F64)
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        !matches!(
            self,
            NumericKind::U8 | NumericKind::U16 | NumericKind::U32 | NumericKind::U64
        )
    }

    /// Keyword used for the kind in source text (`int`, `double`, ...).
    pub const fn keyword(self) -> &'static str {
        match self {
            NumericKind::I8 => "sbyte",
            NumericKind::U8 => "byte",
            NumericKind::I16 => "short",
            NumericKind::U16 => "ushort",
            NumericKind::I32 => "int",
            NumericKind::U32 => "uint",
            NumericKind::I64 => "long",
            NumericKind::U64 => "ulong",
            NumericKind::F32 => "float",
            NumericKind::F64 => "double",
            NumericKind::Decimal => "decimal",
        }
    }

    /// Name of the kind inside the `System` namespace (`Int32`, `Double`, ...).
    pub const fn system_name(self) -> &'static str {
        match self {
            NumericKind::I8 => "SByte",
            NumericKind::U8 => "Byte",
            NumericKind::I16 => "Int16",
            NumericKind::U16 => "UInt16",
            NumericKind::I32 => "Int32",
            NumericKind::U32 => "UInt32",
            NumericKind::I64 => "Int64",
            NumericKind::U64 => "UInt64",
            NumericKind::F32 => "Single",
            NumericKind::F64 => "Double",
            NumericKind::Decimal => "Decimal",
        }
    }

    /// Kinds this kind converts to without an explicit cast.
    pub fn widens_to(self, target: NumericKind) -> bool {
        use NumericKind::*;
        if self == target {
            return true;
        }
        match self {
            I8 => matches!(target, I16 | I32 | I64 | F32 | F64 | Decimal),
            U8 => matches!(target, I16 | U16 | I32 | U32 | I64 | U64 | F32 | F64 | Decimal),
            I16 => matches!(target, I32 | I64 | F32 | F64 | Decimal),
            U16 => matches!(target, I32 | U32 | I64 | U64 | F32 | F64 | Decimal),
            I32 => matches!(target, I64 | F32 | F64 | Decimal),
            U32 => matches!(target, I64 | U64 | F32 | F64 | Decimal),
            I64 | U64 => matches!(target, F32 | F64 | Decimal),
            F32 => matches!(target, F64),
            F64 | Decimal => false,
        }
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Returns the common kind two arithmetic operands are promoted to.
///
/// `None` when either side is not numeric.
pub fn max_type(a: &Ty, b: &Ty) -> Option<NumericKind> {
    match (a, b) {
        (Ty::Numeric(a), Ty::Numeric(b)) => Some(if a.rank() >= b.rank() { *a } else { *b }),
        _ => None,
    }
}

/// A concrete type as seen by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Void,
    /// Top type; every value boxes into it.
    Object,
    Bool,
    String,
    Numeric(NumericKind),
    Array {
        element: Box<Ty>,
        rank: usize,
    },
    /// A host-defined class, possibly generic.
    Class {
        name: Arc<str>,
        namespace: Option<Arc<str>>,
        generic_args: Vec<Ty>,
    },
    /// Placeholder for the n-th generic parameter inside a host signature.
    Generic(usize),
}

impl Ty {
    pub const I8: Ty = Ty::Numeric(NumericKind::I8);
    pub const U8: Ty = Ty::Numeric(NumericKind::U8);
    pub const I16: Ty = Ty::Numeric(NumericKind::I16);
    pub const U16: Ty = Ty::Numeric(NumericKind::U16);
    pub const I32: Ty = Ty::Numeric(NumericKind::I32);
    pub const U32: Ty = Ty::Numeric(NumericKind::U32);
    pub const I64: Ty = Ty::Numeric(NumericKind::I64);
    pub const U64: Ty = Ty::Numeric(NumericKind::U64);
    pub const F32: Ty = Ty::Numeric(NumericKind::F32);
    pub const F64: Ty = Ty::Numeric(NumericKind::F64);
    pub const DECIMAL: Ty = Ty::Numeric(NumericKind::Decimal);

    /// A non-generic class without namespace.
    pub fn class(name: &str) -> Ty {
        Ty::Class {
            name: Arc::from(name),
            namespace: None,
            generic_args: Vec::new(),
        }
    }

    pub fn array(element: Ty, rank: usize) -> Ty {
        Ty::Array {
            element: Box::new(element),
            rank,
        }
    }

    pub fn numeric(&self) -> Option<NumericKind> {
        match self {
            Ty::Numeric(k) => Some(*k),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Numeric(_))
    }

    /// Replace generic placeholders with concrete arguments.
    pub fn substitute(&self, args: &[Ty]) -> Ty {
        match self {
            Ty::Generic(i) => args.get(*i).cloned().unwrap_or(Ty::Generic(*i)),
            Ty::Array { element, rank } => Ty::Array {
                element: Box::new(element.substitute(args)),
                rank: *rank,
            },
            Ty::Class {
                name,
                namespace,
                generic_args,
            } => Ty::Class {
                name: name.clone(),
                namespace: namespace.clone(),
                generic_args: generic_args.iter().map(|t| t.substitute(args)).collect(),
            },
            other => other.clone(),
        }
    }
}

impl From<NumericKind> for Ty {
    fn from(value: NumericKind) -> Self {
        Ty::Numeric(value)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => f.write_str("void"),
            Ty::Object => f.write_str("object"),
            Ty::Bool => f.write_str("bool"),
            Ty::String => f.write_str("string"),
            Ty::Numeric(k) => write!(f, "{}", k),
            Ty::Array { element, rank } => {
                write!(f, "{}[{}]", element, ",".repeat(rank.saturating_sub(1)))
            }
            Ty::Class {
                name,
                namespace,
                generic_args,
            } => {
                if let Some(ns) = namespace {
                    write!(f, "{}.", ns)?;
                }
                f.write_str(name)?;
                if !generic_args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in generic_args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            Ty::Generic(i) => write!(f, "T{}", i),
        }
    }
}
