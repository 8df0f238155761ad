use std::sync::Arc;

use log::debug;

use crate::bound::{Bound, Frame};
use crate::compiler::Compiler;
use crate::context::{Context, Parameter};
use crate::error::{CompileError, EvalError};
use crate::host::TypeSystem;
use crate::normalize::Normalizer;
use crate::parser::Parser;
use crate::prepared::PreparedExpr;
use crate::registry::TypeRegistry;
use crate::types::Ty;
use crate::value::Value;

/// Limits checked while preparing an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinderOptions {
    /// Maximum source length in bytes.
    pub max_source_len: usize,
    /// Maximum nesting of parentheses, argument lists, generic argument lists, casts and
    /// absolute values.
    pub max_depth: usize,
    /// Maximum depth of a bound computation tree. Every operator of a chain like
    /// `a + b + c` adds one level.
    pub max_tree_depth: usize,
}

impl Default for BinderOptions {
    fn default() -> Self {
        Self {
            max_source_len: 64 * 1024,
            max_depth: 128,
            max_tree_depth: 1024,
        }
    }
}

/// Compiles expression text against a host type system.
pub struct Binder<T = TypeRegistry> {
    pub(crate) types: T,
    pub(crate) options: BinderOptions,
}

impl Default for Binder<TypeRegistry> {
    fn default() -> Self {
        Self::new()
    }
}

impl Binder<TypeRegistry> {
    pub fn new() -> Self {
        Self::with_types(TypeRegistry::new())
    }
}

impl<T: TypeSystem> Binder<T> {
    /// Create a binder over a custom host type system.
    pub fn with_types(types: T) -> Self {
        Self {
            types,
            options: BinderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BinderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &BinderOptions {
        &self.options
    }

    pub fn types(&self) -> &T {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut T {
        &mut self.types
    }

    /// Parse and normalize `source`. The context only steers cast detection here.
    pub fn prepare(&self, source: &str, context: &Context) -> Result<PreparedExpr, CompileError> {
        if source.len() > self.options.max_source_len {
            return Err(CompileError::LimitExceeded {
                what: "source length",
                limit: self.options.max_source_len,
            });
        }
        let (mut ast, root) = Parser::new(source, self.options.max_depth).parse()?;
        Normalizer::new(&mut ast, &self.types, context, self.options.max_depth).run(root)?;
        let prepared = PreparedExpr::new(ast, root);
        debug!("prepared `{}` as `{}`", source, prepared);
        Ok(prepared)
    }

    /// Resolve a prepared expression. Nodes that already resolved keep their first result.
    pub fn bind(
        &self,
        prepared: &PreparedExpr,
        context: &Context,
    ) -> Result<BoundExpression, CompileError> {
        let root = Compiler::new(prepared, &self.types, context, self.options.max_tree_depth)
            .resolve(prepared.root())?;
        debug!("bound `{}` to {:?}", prepared, root);
        Ok(BoundExpression {
            root,
            parameters: context.parameters().to_vec(),
            base_type: context.base_type().cloned(),
        })
    }

    pub fn compile(&self, source: &str, context: Context) -> Result<BoundExpression, CompileError> {
        let prepared = self.prepare(source, &context)?;
        self.bind(&prepared, &context)
    }
}

/// A compiled expression. Cheap to clone and safe to share between threads.
#[derive(Clone, Debug)]
pub struct BoundExpression {
    root: Arc<Bound>,
    parameters: Vec<Parameter>,
    base_type: Option<Ty>,
}

impl BoundExpression {
    /// Result type.
    pub fn ty(&self) -> &Ty {
        &self.root.ty
    }

    /// Parameters in the order `eval` expects their values.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn base_type(&self) -> Option<&Ty> {
        self.base_type.as_ref()
    }

    pub fn root(&self) -> &Arc<Bound> {
        &self.root
    }

    /// Evaluate with a receiver instance (for `this` and base-type members) and positional
    /// parameter values.
    pub fn eval(&self, receiver: Option<&Value>, values: &[Value]) -> Result<Value, EvalError> {
        let needed = self.parameters.len();
        if values.len() < needed {
            return Err(EvalError::ValuesLen {
                expected: needed,
                got: values.len(),
            });
        }
        self.root.eval(&Frame {
            receiver,
            args: values,
        })
    }

    pub fn eval_args(&self, values: &[Value]) -> Result<Value, EvalError> {
        self.eval(None, values)
    }
}
