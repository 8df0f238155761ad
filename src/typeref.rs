use std::fmt;

use crate::host::TypeSystem;
use crate::types::Ty;

/// A type name as written in source: `int`, `System.Double`, `Demo.Pair<int, double>`.
///
/// Resolution goes through the host every time; nothing is cached here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
    pub namespace: Option<String>,
    pub generic_args: Vec<TypeRef>,
}

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            generic_args: Vec::new(),
        }
    }

    /// Split a dotted path into namespace and name.
    pub fn from_path(path: &[&str], generic_args: Vec<TypeRef>) -> Option<Self> {
        let (name, ns) = path.split_last()?;
        Some(Self {
            name: (*name).to_string(),
            namespace: if ns.is_empty() { None } else { Some(ns.join(".")) },
            generic_args,
        })
    }

    /// Resolve through the host. Generic arguments are resolved first; any failure yields `None`.
    pub fn resolve<T: TypeSystem + ?Sized>(&self, types: &T) -> Option<Ty> {
        let args = self
            .generic_args
            .iter()
            .map(|a| a.resolve(types))
            .collect::<Option<Vec<_>>>()?;
        types.resolve_type(&self.name, self.namespace.as_deref(), &args)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "{}.", ns)?;
        }
        f.write_str(&self.name)?;
        if !self.generic_args.is_empty() {
            f.write_str("<")?;
            for (i, a) in self.generic_args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", a)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}
