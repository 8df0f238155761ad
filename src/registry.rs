use std::sync::Arc;

use foldhash::{HashMap, HashMapExt};
use log::debug;
use strum::IntoEnumIterator;

use crate::error::EvalError;
use crate::host::{
    Conversion, ConvertFn, IndexerDescriptor, MemberDescriptor, MethodDescriptor, TypeSystem,
};
use crate::types::{NumericKind, Ty};
use crate::value::{Value, decimal_max};

/// Shim signature of a link-time registered free function.
pub type NativeFn = fn(&[Value]) -> Result<Value, EvalError>;

/// A free function submitted through `inventory`, usually by the `#[function]` attribute.
///
/// Every parameter and the result are `double`. The function shows up as a static method of
/// the class `type_name` (no namespace).
pub struct FnMeta {
    pub name: &'static str,
    pub type_name: &'static str,
    pub arity: u8,
    pub invoke: NativeFn,
}

inventory::collect!(FnMeta);

/// Class that collects free functions unless a `#[function("Type")]` says otherwise.
pub const FUNCTIONS_TYPE: &str = "Functions";

/// Read argument `index` as `f64`. Used by `#[function]` shims.
pub fn f64_arg(args: &[Value], index: usize) -> Result<f64, EvalError> {
    let v = arg(args, index)?;
    v.as_f64().ok_or_else(|| EvalError::InvalidValue {
        expected: "double".into(),
        found: v.type_name().into(),
    })
}

fn arg(args: &[Value], index: usize) -> Result<&Value, EvalError> {
    args.get(index).ok_or(EvalError::ValuesLen {
        expected: index + 1,
        got: args.len(),
    })
}

const BOXING_COST: u32 = 64;
const CUSTOM_COST: u32 = 32;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum TypeKey {
    Builtin(Ty),
    Named {
        namespace: Option<Arc<str>>,
        name: Arc<str>,
        arity: usize,
    },
}

impl TypeKey {
    fn of(ty: &Ty) -> TypeKey {
        match ty {
            Ty::Class {
                name,
                namespace,
                generic_args,
            } => TypeKey::Named {
                namespace: namespace.clone(),
                name: name.clone(),
                arity: generic_args.len(),
            },
            other => TypeKey::Builtin(other.clone()),
        }
    }
}

struct MethodEntry {
    desc: MethodDescriptor,
    generic_arity: usize,
}

#[derive(Default)]
struct ClassDef {
    members: HashMap<String, MemberDescriptor>,
    methods: Vec<MethodEntry>,
    indexers: Vec<IndexerDescriptor>,
}

/// Ready-made [`TypeSystem`]: C# primitive names, `System.Math`, strings, arrays, plus any
/// classes the host declares through [`ClassBuilder`].
pub struct TypeRegistry {
    classes: HashMap<TypeKey, ClassDef>,
    conversions: HashMap<(Ty, Ty), ConvertFn>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Registry with the built-in types and every [`FnMeta`] linked into the binary.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        let mut linked = 0usize;
        for meta in inventory::iter::<FnMeta> {
            let invoke = meta.invoke;
            let params = vec![Ty::F64; meta.arity as usize];
            registry
                .class(meta.type_name)
                .static_method(meta.name, &params, Ty::F64, move |args| invoke(args));
            linked += 1;
        }
        debug!("type registry ready, {} linked functions", linked);
        registry
    }

    /// Registry that knows no types at all.
    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
            conversions: HashMap::new(),
        }
    }

    /// Declare (or extend) a non-generic class without namespace.
    pub fn class(&mut self, name: &str) -> ClassBuilder<'_> {
        self.declare(None, name, 0)
    }

    /// Declare (or extend) a class in `namespace` with `arity` generic parameters. Inside its
    /// signatures the class parameters are `Ty::Generic(0..arity)`.
    pub fn class_in(&mut self, namespace: &str, name: &str, arity: usize) -> ClassBuilder<'_> {
        self.declare(Some(namespace), name, arity)
    }

    fn declare(&mut self, namespace: Option<&str>, name: &str, arity: usize) -> ClassBuilder<'_> {
        let ty = Ty::Class {
            name: Arc::from(name),
            namespace: namespace.map(Arc::from),
            generic_args: (0..arity).map(Ty::Generic).collect(),
        };
        self.extend(ty)
    }

    /// Add members to any type, built-in ones included (`int`, `string`, ...).
    pub fn extend(&mut self, ty: Ty) -> ClassBuilder<'_> {
        let arity = match &ty {
            Ty::Class { generic_args, .. } => generic_args.len(),
            _ => 0,
        };
        let def = self.classes.entry(TypeKey::of(&ty)).or_default();
        ClassBuilder { def, ty, arity }
    }

    /// Host conversion used when no identity or numeric widening applies.
    pub fn register_conversion<F>(&mut self, from: Ty, to: Ty, convert: F)
    where
        F: Fn(Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.conversions.insert((from, to), Arc::new(convert));
    }

    pub fn register_nullary(&mut self, name: &str, f: fn() -> f64) {
        self.class(FUNCTIONS_TYPE)
            .static_method(name, &[], Ty::F64, move |_| Ok(Value::F64(f())));
    }

    pub fn register_unary(&mut self, name: &str, f: fn(f64) -> f64) {
        self.class(FUNCTIONS_TYPE)
            .static_method(name, &[Ty::F64], Ty::F64, move |args| {
                Ok(Value::F64(f(f64_arg(args, 0)?)))
            });
    }

    pub fn register_binary(&mut self, name: &str, f: fn(f64, f64) -> f64) {
        self.class(FUNCTIONS_TYPE)
            .static_method(name, &[Ty::F64, Ty::F64], Ty::F64, move |args| {
                Ok(Value::F64(f(f64_arg(args, 0)?, f64_arg(args, 1)?)))
            });
    }

    pub fn register_ternary(&mut self, name: &str, f: fn(f64, f64, f64) -> f64) {
        self.class(FUNCTIONS_TYPE)
            .static_method(name, &[Ty::F64, Ty::F64, Ty::F64], Ty::F64, move |args| {
                Ok(Value::F64(f(
                    f64_arg(args, 0)?,
                    f64_arg(args, 1)?,
                    f64_arg(args, 2)?,
                )))
            });
    }

    /// Conversion cost used to rank overloads; `None` when not implicitly convertible.
    fn cost(&self, from: &Ty, to: &Ty) -> Option<u32> {
        if from == to {
            return Some(0);
        }
        match (from, to) {
            (Ty::Numeric(a), Ty::Numeric(b)) if a.widens_to(*b) => {
                Some(u32::from(b.rank() - a.rank()))
            }
            (_, Ty::Object) => Some(BOXING_COST),
            _ if self.conversions.contains_key(&(from.clone(), to.clone())) => Some(CUSTOM_COST),
            _ => None,
        }
    }

    fn total_cost(&self, args: &[Ty], params: &[Ty]) -> Option<u32> {
        args.iter()
            .zip(params)
            .map(|(a, p)| self.cost(a, p))
            .sum::<Option<u32>>()
    }

    fn register_builtins(&mut self) {
        for kind in NumericKind::iter() {
            let ty = Ty::from(kind);
            let (min, max) = numeric_bounds(kind);
            self.extend(ty.clone())
                .static_property("MinValue", ty.clone(), move || Ok(min.clone()))
                .static_property("MaxValue", ty, move || Ok(max.clone()));
        }

        self.extend(Ty::String)
            .property("Length", Ty::I32, |v| Ok(Value::I32(string_ref(v)?.chars().count() as i32)))
            .method("ToUpper", &[], Ty::String, |v, _| {
                Ok(Value::from(string_ref(v)?.to_uppercase()))
            })
            .method("ToLower", &[], Ty::String, |v, _| {
                Ok(Value::from(string_ref(v)?.to_lowercase()))
            });

        let mut math = self.class_in("System", "Math", 0);
        for kind in [
            NumericKind::I8,
            NumericKind::I16,
            NumericKind::I32,
            NumericKind::I64,
            NumericKind::F32,
            NumericKind::F64,
            NumericKind::Decimal,
        ] {
            math = math.static_method("Abs", &[kind.into()], kind.into(), |args| {
                abs(arg(args, 0)?)
            });
        }
        for kind in [
            NumericKind::I32,
            NumericKind::U32,
            NumericKind::I64,
            NumericKind::U64,
            NumericKind::F32,
            NumericKind::F64,
            NumericKind::Decimal,
        ] {
            let params = [Ty::from(kind), Ty::from(kind)];
            math = math
                .static_method("Min", &params, kind.into(), |args| {
                    pick(arg(args, 0)?, arg(args, 1)?, false)
                })
                .static_method("Max", &params, kind.into(), |args| {
                    pick(arg(args, 0)?, arg(args, 1)?, true)
                });
        }
        math.static_method("Sqrt", &[Ty::F64], Ty::F64, |args| {
            Ok(Value::F64(f64_arg(args, 0)?.sqrt()))
        })
        .static_method("Pow", &[Ty::F64, Ty::F64], Ty::F64, |args| {
            Ok(Value::F64(f64_arg(args, 0)?.powf(f64_arg(args, 1)?)))
        })
        .static_method("Floor", &[Ty::F64], Ty::F64, |args| {
            Ok(Value::F64(f64_arg(args, 0)?.floor()))
        })
        .static_method("Ceiling", &[Ty::F64], Ty::F64, |args| {
            Ok(Value::F64(f64_arg(args, 0)?.ceil()))
        })
        .static_method("Round", &[Ty::F64], Ty::F64, |args| {
            Ok(Value::F64(f64_arg(args, 0)?.round_ties_even()))
        })
        .static_property("PI", Ty::F64, || Ok(Value::F64(std::f64::consts::PI)))
        .static_property("E", Ty::F64, || Ok(Value::F64(std::f64::consts::E)));
    }

    fn array_indexer(ty: &Ty, rank: usize, element: &Ty) -> IndexerDescriptor {
        IndexerDescriptor {
            declaring: ty.clone(),
            params: vec![Ty::I64; rank],
            return_type: element.clone(),
            get: Arc::new(|recv: Option<&Value>, args: &[Value]| {
                let Some(Value::Array(array)) = recv else {
                    return Err(EvalError::InvalidValue {
                        expected: "array".into(),
                        found: recv.map_or("nothing", Value::type_name).into(),
                    });
                };
                let indices = args
                    .iter()
                    .map(|a| {
                        a.as_i64().ok_or_else(|| EvalError::InvalidValue {
                            expected: "integer index".into(),
                            found: a.type_name().into(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                array.get(&indices).cloned()
            }),
        }
    }
}

impl TypeSystem for TypeRegistry {
    fn resolve_type(&self, name: &str, namespace: Option<&str>, generic_args: &[Ty]) -> Option<Ty> {
        if generic_args.is_empty() {
            let builtin = match namespace {
                None => keyword_type(name),
                Some("System") => system_type(name),
                Some(_) => None,
            };
            if builtin.is_some() {
                return builtin;
            }
        }
        let key = TypeKey::Named {
            namespace: namespace.map(Arc::from),
            name: Arc::from(name),
            arity: generic_args.len(),
        };
        self.classes.contains_key(&key).then(|| Ty::Class {
            name: Arc::from(name),
            namespace: namespace.map(Arc::from),
            generic_args: generic_args.to_vec(),
        })
    }

    fn find_member(&self, ty: &Ty, name: &str) -> Option<MemberDescriptor> {
        if let Ty::Array { .. } = ty {
            return (name == "Length").then(|| MemberDescriptor {
                name: name.to_string(),
                ty: Ty::I32,
                is_static: false,
                get: Arc::new(|recv: Option<&Value>| match recv {
                    Some(Value::Array(a)) => Ok(Value::I32(a.len() as i32)),
                    _ => Err(EvalError::InvalidValue {
                        expected: "array".into(),
                        found: recv.map_or("nothing", Value::type_name).into(),
                    }),
                }),
            });
        }
        let mut member = self.classes.get(&TypeKey::of(ty))?.members.get(name)?.clone();
        if let Ty::Class { generic_args, .. } = ty {
            member.ty = member.ty.substitute(generic_args);
        }
        Some(member)
    }

    fn find_method(
        &self,
        ty: &Ty,
        name: &str,
        generic_args: &[Ty],
        arg_types: &[Ty],
    ) -> Option<(MethodDescriptor, Vec<Ty>)> {
        let def = self.classes.get(&TypeKey::of(ty))?;
        let mut substitution = match ty {
            Ty::Class { generic_args, .. } => generic_args.clone(),
            _ => Vec::new(),
        };
        substitution.extend_from_slice(generic_args);

        let mut best: Option<(u32, &MethodEntry, Vec<Ty>)> = None;
        for entry in &def.methods {
            if entry.desc.name != name
                || entry.generic_arity != generic_args.len()
                || entry.desc.params.len() != arg_types.len()
            {
                continue;
            }
            let params: Vec<Ty> = entry
                .desc
                .params
                .iter()
                .map(|p| p.substitute(&substitution))
                .collect();
            let Some(cost) = self.total_cost(arg_types, &params) else {
                continue;
            };
            if best.as_ref().is_none_or(|(c, _, _)| cost < *c) {
                best = Some((cost, entry, params));
            }
        }
        let (cost, entry, params) = best?;
        debug!("overload {}.{} selected at cost {}", ty, name, cost);
        let mut desc = entry.desc.clone();
        desc.declaring = ty.clone();
        desc.return_type = desc.return_type.substitute(&substitution);
        desc.params = params.clone();
        Some((desc, params))
    }

    fn find_indexer(&self, ty: &Ty, arg_types: &[Ty]) -> Option<(IndexerDescriptor, Vec<Ty>)> {
        if let Ty::Array { element, rank } = ty {
            if arg_types.len() != *rank || arg_types.iter().any(|a| self.cost(a, &Ty::I64).is_none()) {
                return None;
            }
            let indexer = Self::array_indexer(ty, *rank, element);
            let params = indexer.params.clone();
            return Some((indexer, params));
        }
        let def = self.classes.get(&TypeKey::of(ty))?;
        let substitution = match ty {
            Ty::Class { generic_args, .. } => generic_args.as_slice(),
            _ => &[],
        };
        let mut best: Option<(u32, &IndexerDescriptor, Vec<Ty>)> = None;
        for indexer in def.indexers.iter().filter(|i| i.params.len() == arg_types.len()) {
            let params: Vec<Ty> = indexer.params.iter().map(|p| p.substitute(substitution)).collect();
            let Some(cost) = self.total_cost(arg_types, &params) else {
                continue;
            };
            if best.as_ref().is_none_or(|(c, _, _)| cost < *c) {
                best = Some((cost, indexer, params));
            }
        }
        let (_, indexer, params) = best?;
        let mut indexer = indexer.clone();
        indexer.declaring = ty.clone();
        indexer.return_type = indexer.return_type.substitute(substitution);
        indexer.params = params.clone();
        Some((indexer, params))
    }

    fn implicit_conversion(&self, from: &Ty, to: &Ty) -> Option<Conversion> {
        if from == to {
            return Some(Conversion::Identity);
        }
        match (from, to) {
            (Ty::Numeric(a), Ty::Numeric(b)) if a.widens_to(*b) => Some(Conversion::Numeric(*b)),
            (_, Ty::Object) => Some(Conversion::Identity),
            _ => self
                .conversions
                .get(&(from.clone(), to.clone()))
                .map(|f| Conversion::Custom(f.clone())),
        }
    }
}

/// Adds members to a class declared with [`TypeRegistry::class`] or
/// [`TypeRegistry::class_in`].
pub struct ClassBuilder<'r> {
    def: &'r mut ClassDef,
    ty: Ty,
    arity: usize,
}

impl ClassBuilder<'_> {
    /// The declared type, with `Ty::Generic` placeholders for class parameters.
    pub fn ty(&self) -> Ty {
        self.ty.clone()
    }

    /// Instance property or field.
    pub fn property<F>(self, name: &str, ty: Ty, get: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.member(name, ty, false, Arc::new(move |recv: Option<&Value>| get(receiver(recv)?)))
    }

    pub fn static_property<F>(self, name: &str, ty: Ty, get: F) -> Self
    where
        F: Fn() -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.member(name, ty, true, Arc::new(move |_: Option<&Value>| get()))
    }

    fn member(self, name: &str, ty: Ty, is_static: bool, get: crate::host::Getter) -> Self {
        self.def.members.insert(
            name.to_string(),
            MemberDescriptor {
                name: name.to_string(),
                ty,
                is_static,
                get,
            },
        );
        self
    }

    pub fn method<F>(self, name: &str, params: &[Ty], ret: Ty, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.generic_method(name, 0, params, ret, f)
    }

    /// Instance method with `generic_arity` own type parameters. They follow the class
    /// parameters: `Ty::Generic(class_arity + i)`.
    pub fn generic_method<F>(
        self,
        name: &str,
        generic_arity: usize,
        params: &[Ty],
        ret: Ty,
        f: F,
    ) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let invoke = Arc::new(move |recv: Option<&Value>, args: &[Value]| f(receiver(recv)?, args));
        self.push_method(name, generic_arity, params, ret, false, invoke)
    }

    pub fn static_method<F>(self, name: &str, params: &[Ty], ret: Ty, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.static_generic_method(name, 0, params, ret, f)
    }

    pub fn static_generic_method<F>(
        self,
        name: &str,
        generic_arity: usize,
        params: &[Ty],
        ret: Ty,
        f: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let invoke = Arc::new(move |_: Option<&Value>, args: &[Value]| f(args));
        self.push_method(name, generic_arity, params, ret, true, invoke)
    }

    fn push_method(
        self,
        name: &str,
        generic_arity: usize,
        params: &[Ty],
        ret: Ty,
        is_static: bool,
        invoke: crate::host::Invoker,
    ) -> Self {
        self.def.methods.push(MethodEntry {
            desc: MethodDescriptor {
                name: name.to_string(),
                declaring: self.ty.clone(),
                params: params.to_vec(),
                return_type: ret,
                is_static,
                invoke,
            },
            generic_arity,
        });
        self
    }

    pub fn indexer<F>(self, params: &[Ty], ret: Ty, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.def.indexers.push(IndexerDescriptor {
            declaring: self.ty.clone(),
            params: params.to_vec(),
            return_type: ret,
            get: Arc::new(move |recv: Option<&Value>, args: &[Value]| f(receiver(recv)?, args)),
        });
        self
    }

    /// Number of class generic parameters.
    pub fn arity(&self) -> usize {
        self.arity
    }
}

fn receiver(recv: Option<&Value>) -> Result<&Value, EvalError> {
    recv.ok_or(EvalError::MissingReceiver)
}

fn string_ref(v: &Value) -> Result<&str, EvalError> {
    v.as_str().ok_or_else(|| EvalError::InvalidValue {
        expected: "string".into(),
        found: v.type_name().into(),
    })
}

fn keyword_type(name: &str) -> Option<Ty> {
    match name {
        "bool" => Some(Ty::Bool),
        "string" => Some(Ty::String),
        "object" => Some(Ty::Object),
        _ => NumericKind::iter().find(|k| k.keyword() == name).map(Ty::from),
    }
}

fn system_type(name: &str) -> Option<Ty> {
    match name {
        "Boolean" => Some(Ty::Bool),
        "String" => Some(Ty::String),
        "Object" => Some(Ty::Object),
        _ => NumericKind::iter().find(|k| k.system_name() == name).map(Ty::from),
    }
}

fn numeric_bounds(kind: NumericKind) -> (Value, Value) {
    match kind {
        NumericKind::I8 => (i8::MIN.into(), i8::MAX.into()),
        NumericKind::U8 => (u8::MIN.into(), u8::MAX.into()),
        NumericKind::I16 => (i16::MIN.into(), i16::MAX.into()),
        NumericKind::U16 => (u16::MIN.into(), u16::MAX.into()),
        NumericKind::I32 => (i32::MIN.into(), i32::MAX.into()),
        NumericKind::U32 => (u32::MIN.into(), u32::MAX.into()),
        NumericKind::I64 => (i64::MIN.into(), i64::MAX.into()),
        NumericKind::U64 => (u64::MIN.into(), u64::MAX.into()),
        NumericKind::F32 => (f32::MIN.into(), f32::MAX.into()),
        NumericKind::F64 => (f64::MIN.into(), f64::MAX.into()),
        NumericKind::Decimal => {
            let max = decimal_max();
            (Value::Decimal(-max.clone()), Value::Decimal(max))
        }
    }
}

fn abs(v: &Value) -> Result<Value, EvalError> {
    Ok(match v {
        Value::I8(x) => Value::I8(x.wrapping_abs()),
        Value::I16(x) => Value::I16(x.wrapping_abs()),
        Value::I32(x) => Value::I32(x.wrapping_abs()),
        Value::I64(x) => Value::I64(x.wrapping_abs()),
        Value::F32(x) => Value::F32(x.abs()),
        Value::F64(x) => Value::F64(x.abs()),
        Value::Decimal(d) => Value::Decimal(d.abs()),
        other => {
            return Err(EvalError::InvalidValue {
                expected: "signed number".into(),
                found: other.type_name().into(),
            });
        }
    })
}

fn pick(a: &Value, b: &Value, max: bool) -> Result<Value, EvalError> {
    macro_rules! choose {
        ($x:expr, $y:expr, $variant:ident) => {
            Value::$variant((if max { $x.max($y) } else { $x.min($y) }).clone())
        };
    }
    Ok(match (a, b) {
        (Value::I32(x), Value::I32(y)) => choose!(*x, *y, I32),
        (Value::U32(x), Value::U32(y)) => choose!(*x, *y, U32),
        (Value::I64(x), Value::I64(y)) => choose!(*x, *y, I64),
        (Value::U64(x), Value::U64(y)) => choose!(*x, *y, U64),
        (Value::F32(x), Value::F32(y)) => choose!(*x, *y, F32),
        (Value::F64(x), Value::F64(y)) => choose!(*x, *y, F64),
        (Value::Decimal(x), Value::Decimal(y)) => choose!(x, y, Decimal),
        (a, b) => {
            return Err(EvalError::InvalidValue {
                expected: "two numbers of one kind".into(),
                found: format!("{}, {}", a.type_name(), b.type_name()),
            });
        }
    })
}
