use std::fmt;

use crate::{
    generics::GenericsEngine,
    metadata::flags::GenericParamAttributes,
    references::{TypeRefId, TypeReferences},
    Error, Result,
};

/// Whether a generic parameter belongs to a type (`!`) or a method (`!!`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericParamKind {
    /// Type-level parameter, `Var`
    Type,
    /// Method-level parameter, `MVar`
    Method,
}

/// How a generic parameter mention identifies its parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamBinding {
    /// Positional, `!0`
    Index(u32),
    /// By name, `!T`; bound to an index against the enclosing scope
    Name(String),
}

/// A mention of a generic parameter inside a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericParamRef {
    /// Type-level or method-level
    pub kind: GenericParamKind,
    /// Index or name
    pub binding: ParamBinding,
}

impl GenericParamRef {
    /// A positional mention.
    #[must_use]
    pub fn indexed(kind: GenericParamKind, index: u32) -> Self {
        GenericParamRef {
            kind,
            binding: ParamBinding::Index(index),
        }
    }

    /// A by-name mention.
    #[must_use]
    pub fn named(kind: GenericParamKind, name: impl Into<String>) -> Self {
        GenericParamRef {
            kind,
            binding: ParamBinding::Name(name.into()),
        }
    }
}

impl fmt::Display for GenericParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            GenericParamKind::Type => "!",
            GenericParamKind::Method => "!!",
        };
        match &self.binding {
            ParamBinding::Index(index) => write!(f, "{prefix}{index}"),
            ParamBinding::Name(name) => write!(f, "{prefix}{name}"),
        }
    }
}

/// A declared generic parameter of a type or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParameter {
    /// Parameter name
    pub name: String,
    /// Variance and special constraints
    pub flags: GenericParamAttributes,
    /// Type constraints, in declaration order
    pub constraints: Vec<TypeRefId>,
}

impl GenericParameter {
    /// Creates an unconstrained parameter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        GenericParameter {
            name: name.into(),
            flags: GenericParamAttributes::empty(),
            constraints: Vec::new(),
        }
    }

    /// Sets variance and special constraint flags.
    #[must_use]
    pub fn with_flags(mut self, flags: GenericParamAttributes) -> Self {
        self.flags = flags;
        self
    }

    /// Adds a type constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: TypeRefId) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// The ordered generic parameter list of one type or method.
///
/// The position of a parameter in the list is its index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericParameters {
    params: Vec<GenericParameter>,
}

impl GenericParameters {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter; its index is the current length.
    pub fn push(&mut self, param: GenericParameter) -> u32 {
        self.params.push(param);
        self.params.len() as u32 - 1
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Checks whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters in index order.
    pub fn iter(&self) -> impl Iterator<Item = &GenericParameter> {
        self.params.iter()
    }

    /// Index of the parameter called `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.params
            .iter()
            .position(|param| param.name == name)
            .map(|index| index as u32)
    }

    /// Parameter names in index order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|param| param.name.clone()).collect()
    }

    /// Rewrites by-name parameter mentions in every constraint to their positional form.
    ///
    /// Must run before the constraints are resolved.
    ///
    /// # Errors
    /// Returns [`crate::Error::GenericBinding`] if a constraint names a parameter that is
    /// not declared in `scope`.
    pub fn resolve_indices(
        &mut self,
        scope: &GenericScope,
        engine: &mut GenericsEngine,
        types: &mut TypeReferences,
    ) -> Result<()> {
        for param in &mut self.params {
            for constraint in &mut param.constraints {
                *constraint = engine.bind_type(types, *constraint, scope)?;
            }
        }
        Ok(())
    }
}

impl FromIterator<GenericParameter> for GenericParameters {
    fn from_iter<I: IntoIterator<Item = GenericParameter>>(iter: I) -> Self {
        GenericParameters {
            params: iter.into_iter().collect(),
        }
    }
}

/// The generic parameter names visible at one point of the input.
///
/// Inside a generic type the type-level set is its parameter list; inside a generic method
/// the method-level set is the method's list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericScope {
    /// Names bound by `!Name`
    pub type_params: Vec<String>,
    /// Names bound by `!!Name`
    pub method_params: Vec<String>,
}

impl GenericScope {
    /// A scope with no parameters.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The scope inside a type with the given parameters.
    #[must_use]
    pub fn for_type(params: &GenericParameters) -> Self {
        GenericScope {
            type_params: params.names(),
            method_params: Vec::new(),
        }
    }

    /// Adds the method-level parameters of a method declared in this scope.
    #[must_use]
    pub fn with_method(mut self, params: &GenericParameters) -> Self {
        self.method_params = params.names();
        self
    }

    /// Binds a by-name mention to its index.
    ///
    /// # Errors
    /// Returns [`crate::Error::GenericBinding`] if the name is not declared in the
    /// applicable set.
    pub fn bind(&self, kind: GenericParamKind, name: &str) -> Result<u32> {
        let set = match kind {
            GenericParamKind::Type => &self.type_params,
            GenericParamKind::Method => &self.method_params,
        };
        set.iter()
            .position(|candidate| candidate == name)
            .map(|index| index as u32)
            .ok_or_else(|| Error::GenericBinding(GenericParamRef::named(kind, name).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_ref_display() {
        assert_eq!(GenericParamRef::indexed(GenericParamKind::Type, 0).to_string(), "!0");
        assert_eq!(GenericParamRef::indexed(GenericParamKind::Method, 1).to_string(), "!!1");
        assert_eq!(GenericParamRef::named(GenericParamKind::Type, "T").to_string(), "!T");
        assert_eq!(GenericParamRef::named(GenericParamKind::Method, "U").to_string(), "!!U");
    }

    #[test]
    fn test_scope_binding_uses_matching_set() {
        let type_params: GenericParameters =
            [GenericParameter::new("K"), GenericParameter::new("V")].into_iter().collect();
        let method_params: GenericParameters = [GenericParameter::new("T")].into_iter().collect();
        let scope = GenericScope::for_type(&type_params).with_method(&method_params);

        assert_eq!(scope.bind(GenericParamKind::Type, "V"), Ok(1));
        assert_eq!(scope.bind(GenericParamKind::Method, "T"), Ok(0));
        assert_eq!(
            scope.bind(GenericParamKind::Method, "K"),
            Err(Error::GenericBinding("!!K".to_string()))
        );
        assert!(scope.bind(GenericParamKind::Type, "T").is_err());
    }

    #[test]
    fn test_resolve_indices_rewrites_constraints() {
        let mut types = TypeReferences::new();
        let mut engine = GenericsEngine::new();
        let comparable = types.local("IComparable`1");
        let by_name = types.generic_param(GenericParamRef::named(GenericParamKind::Type, "T"));
        let constraint = engine
            .instantiate(&mut types, comparable, vec![by_name])
            .unwrap();

        let mut params: GenericParameters = [GenericParameter::new("T").with_constraint(constraint)]
            .into_iter()
            .collect();
        let scope = GenericScope::for_type(&params);
        params.resolve_indices(&scope, &mut engine, &mut types).unwrap();

        let bound = params.iter().next().unwrap().constraints[0];
        assert_eq!(types.name(bound), "IComparable`1<!0>");
        assert!(!types.get(bound).is_scope_dependent());
    }

    #[test]
    fn test_resolve_indices_reports_unknown_name() {
        let mut types = TypeReferences::new();
        let mut engine = GenericsEngine::new();
        let unknown = types.generic_param(GenericParamRef::named(GenericParamKind::Type, "X"));

        let mut params: GenericParameters = [GenericParameter::new("T").with_constraint(unknown)]
            .into_iter()
            .collect();
        let scope = GenericScope::for_type(&params);
        assert_eq!(
            params.resolve_indices(&scope, &mut engine, &mut types),
            Err(Error::GenericBinding("!X".to_string()))
        );
    }
}
