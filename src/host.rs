use std::fmt;
use std::sync::Arc;

use crate::error::EvalError;
use crate::types::{NumericKind, Ty};
use crate::value::Value;

/// Reads a property or field. The receiver is `None` for static members.
pub type Getter = Arc<dyn Fn(Option<&Value>) -> Result<Value, EvalError> + Send + Sync>;

/// Invokes a method or indexer with already-coerced arguments.
pub type Invoker = Arc<dyn Fn(Option<&Value>, &[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// Host-defined value conversion.
pub type ConvertFn = Arc<dyn Fn(Value) -> Result<Value, EvalError> + Send + Sync>;

#[derive(Clone)]
pub struct MemberDescriptor {
    pub name: String,
    pub ty: Ty,
    pub is_static: bool,
    pub get: Getter,
}

#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub declaring: Ty,
    pub params: Vec<Ty>,
    pub return_type: Ty,
    pub is_static: bool,
    pub invoke: Invoker,
}

#[derive(Clone)]
pub struct IndexerDescriptor {
    pub declaring: Ty,
    pub params: Vec<Ty>,
    pub return_type: Ty,
    pub get: Invoker,
}

/// How a value of one type becomes a value of another without an explicit cast.
#[derive(Clone)]
pub enum Conversion {
    Identity,
    Numeric(NumericKind),
    Custom(ConvertFn),
}

/// The host type system the compiler resolves names against.
///
/// The compiler never inspects host types itself: every lookup, overload decision and
/// implicit-conversion check goes through this trait. [`TypeRegistry`](crate::TypeRegistry)
/// is a ready-made implementation.
pub trait TypeSystem {
    /// Look up a type by (optionally namespaced) name, instantiated with `generic_args`.
    fn resolve_type(&self, name: &str, namespace: Option<&str>, generic_args: &[Ty]) -> Option<Ty>;

    /// Property or field of `ty`, instance or static.
    fn find_member(&self, ty: &Ty, name: &str) -> Option<MemberDescriptor>;

    /// Best overload of `name` on `ty` for the argument types, with the parameter types each
    /// argument has to be converted to.
    fn find_method(
        &self,
        ty: &Ty,
        name: &str,
        generic_args: &[Ty],
        arg_types: &[Ty],
    ) -> Option<(MethodDescriptor, Vec<Ty>)>;

    /// Best indexer of `ty` for the argument types, including plain array indexing.
    fn find_indexer(&self, ty: &Ty, arg_types: &[Ty]) -> Option<(IndexerDescriptor, Vec<Ty>)>;

    /// `None` when `from` does not convert implicitly to `to`.
    fn implicit_conversion(&self, from: &Ty, to: &Ty) -> Option<Conversion>;
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("is_static", &self.is_static)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("declaring", &self.declaring)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .field("is_static", &self.is_static)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for IndexerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexerDescriptor")
            .field("declaring", &self.declaring)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conversion::Identity => f.write_str("Identity"),
            Conversion::Numeric(k) => write!(f, "Numeric({:?})", k),
            Conversion::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
