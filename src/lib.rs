mod ast;
mod bound;
mod cache;
mod compiler;
mod context;
mod engine;
mod error;
mod host;
mod lexer;
mod normalize;
#[cfg(feature = "optimize")]
mod optimizer;
mod parser;
mod prepared;
mod registry;
mod route;
mod typeref;
mod types;
mod value;

pub use ast::{Ast, Node, NodeId, Operator};
pub use bound::{Args, Bound, BoundKind};
pub use context::{Context, Parameter};
pub use engine::{Binder, BinderOptions, BoundExpression};
pub use error::{CompileError, EvalError};
pub use host::{
    Conversion, ConvertFn, Getter, IndexerDescriptor, Invoker, MemberDescriptor,
    MethodDescriptor, TypeSystem,
};
pub use prepared::PreparedExpr;
pub use registry::{ClassBuilder, FUNCTIONS_TYPE, FnMeta, NativeFn, TypeRegistry, f64_arg};
pub use typeref::TypeRef;
pub use types::{NumericKind, Ty, max_type};
pub use value::{ArrayValue, BinaryOp, Value};

// Re-export inventory and the #[function] macro for user crates
pub use exprbind_macros::function;
pub use inventory;
