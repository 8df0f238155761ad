use crate::types::Ty;

/// A named, typed input of a compiled expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: Ty,
}

/// What unqualified identifiers resolve against: an optional receiver type and named
/// parameters. Parameters shadow members of the receiver.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Context {
    base_type: Option<Ty>,
    parameters: Vec<Parameter>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, ty: Ty) -> Self {
        self.base_type = Some(ty);
        self
    }

    pub fn with_parameter(mut self, name: &str, ty: Ty) -> Self {
        self.parameters.push(Parameter {
            name: name.to_string(),
            ty,
        });
        self
    }

    pub fn base_type(&self) -> Option<&Ty> {
        self.base_type.as_ref()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Position and declaration of the parameter called `name`.
    pub fn parameter(&self, name: &str) -> Option<(usize, &Parameter)> {
        self.parameters
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
    }
}
