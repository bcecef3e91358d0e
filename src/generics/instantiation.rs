use std::collections::HashMap;

use crate::{
    generics::{GenericParamRef, GenericScope, ParamBinding},
    references::{
        mangled_arity, MemberRefId, MemberRefKind, MemberReferences, Modifier, TypeRefId,
        TypeRefKind, TypeReferences,
    },
    Error, Result,
};

/// Ordered generic argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GenericArguments(Vec<TypeRefId>);

impl GenericArguments {
    /// Wraps an argument list.
    #[must_use]
    pub fn new(args: Vec<TypeRefId>) -> Self {
        GenericArguments(args)
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Arguments in order.
    pub fn iter(&self) -> std::slice::Iter<'_, TypeRefId> {
        self.0.iter()
    }

    /// Arguments as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[TypeRefId] {
        &self.0
    }

    /// Canonical signature of the argument list: the argument names joined by `,`.
    ///
    /// Two lists have the same signature exactly when they name the same types in the
    /// same order.
    #[must_use]
    pub fn signature(&self, types: &TypeReferences) -> String {
        let names: Vec<&str> = self.0.iter().map(|arg| types.name(*arg)).collect();
        names.join(",")
    }
}

impl From<Vec<TypeRefId>> for GenericArguments {
    fn from(args: Vec<TypeRefId>) -> Self {
        GenericArguments(args)
    }
}

/// Canonicalizing caches for generic type and method instantiations.
///
/// Both caches are scoped per open definition and keyed by the argument signature, so
/// requesting the same definition with the same arguments in the same order always returns
/// the same reference, while `G<A,B>` and `G<B,A>` stay distinct. Method instantiations are
/// cached separately from type instantiations because a generic method can be instantiated
/// independently of its declaring type.
///
/// # Examples
///
/// ```rust
/// use cilasm::generics::GenericsEngine;
/// use cilasm::references::{PrimitiveType, TypeReferences};
///
/// let mut types = TypeReferences::new();
/// let mut engine = GenericsEngine::new();
///
/// let pair = types.local("Pair`2");
/// let a = types.primitive(PrimitiveType::I4);
/// let b = types.primitive(PrimitiveType::String);
///
/// let ab = engine.instantiate(&mut types, pair, vec![a, b])?;
/// let again = engine.instantiate(&mut types, pair, vec![a, b])?;
/// let ba = engine.instantiate(&mut types, pair, vec![b, a])?;
///
/// assert_eq!(ab, again);
/// assert_ne!(ab, ba);
/// assert_eq!(types.name(ab), "Pair`2<int32,string>");
/// # Ok::<(), cilasm::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct GenericsEngine {
    type_instances: HashMap<TypeRefId, HashMap<String, TypeRefId>>,
    method_instances: HashMap<MemberRefId, HashMap<String, MemberRefId>>,
}

impl GenericsEngine {
    /// Creates an engine with empty caches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct type instantiations created.
    #[must_use]
    pub fn type_instance_count(&self) -> usize {
        self.type_instances.values().map(HashMap::len).sum()
    }

    /// Number of distinct method instantiations created.
    #[must_use]
    pub fn method_instance_count(&self) -> usize {
        self.method_instances.values().map(HashMap::len).sum()
    }

    /// Instantiates the generic type `definition` with `args`.
    ///
    /// The argument count of external definitions is checked against the arity encoded in
    /// the type name (`List`1`); local definitions are checked against their declared
    /// parameter list when the instantiation is resolved.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidReference`] if `definition` is not a plain named type
    /// or `args` is empty, and [`crate::Error::GenericArity`] on an arity mismatch.
    pub fn instantiate(
        &mut self,
        types: &mut TypeReferences,
        definition: TypeRefId,
        args: Vec<TypeRefId>,
    ) -> Result<TypeRefId> {
        match types.kind(definition) {
            TypeRefKind::Local { .. } => {}
            TypeRefKind::External { full_name, .. } => {
                if let Some(expected) = mangled_arity(full_name) {
                    Self::check_arity(types.name(definition), expected, args.len())?;
                }
            }
            _ => {
                return Err(Error::InvalidReference(format!(
                    "{} is not a generic type definition",
                    types.name(definition)
                )))
            }
        }
        if args.is_empty() {
            return Err(Error::InvalidReference(format!(
                "empty generic argument list for {}",
                types.name(definition)
            )));
        }

        let args = GenericArguments::new(args);
        let signature = args.signature(types);
        if let Some(cached) = self
            .type_instances
            .get(&definition)
            .and_then(|instances| instances.get(&signature))
        {
            return Ok(*cached);
        }

        let instance = types.instantiation(definition, args);
        self.type_instances
            .entry(definition)
            .or_default()
            .insert(signature, instance);
        Ok(instance)
    }

    /// Instantiates the generic method `method` with `args`.
    ///
    /// # Errors
    /// Returns [`crate::Error::GenericArity`] if `method` is not generic or the argument
    /// count differs from its generic arity, and [`crate::Error::InvalidReference`] if
    /// `method` is not a method mention.
    pub fn instantiate_method(
        &mut self,
        types: &TypeReferences,
        members: &mut MemberReferences,
        method: MemberRefId,
        args: Vec<TypeRefId>,
    ) -> Result<MemberRefId> {
        let arity = match members.kind(method) {
            MemberRefKind::Method(signature) => signature.generic_arity as usize,
            _ => {
                return Err(Error::InvalidReference(format!(
                    "{} is not a generic method definition",
                    members.get(method).key()
                )))
            }
        };
        Self::check_arity(members.get(method).key(), arity, args.len())?;

        let args = GenericArguments::new(args);
        let signature = args.signature(types);
        if let Some(cached) = self
            .method_instances
            .get(&method)
            .and_then(|instances| instances.get(&signature))
        {
            return Ok(*cached);
        }

        let instance = members.method_instance(types, method, args);
        self.method_instances
            .entry(method)
            .or_default()
            .insert(signature, instance);
        Ok(instance)
    }

    /// Checks a generic argument count against the declared parameter count.
    ///
    /// # Errors
    /// Returns [`crate::Error::GenericArity`] when the counts differ or `expected` is zero.
    pub fn check_arity(name: &str, expected: usize, found: usize) -> Result<()> {
        if expected == 0 || expected != found {
            return Err(Error::GenericArity {
                name: name.to_string(),
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Rewrites every by-name generic parameter inside `ty` to its positional form in `scope`.
    ///
    /// References that do not depend on the scope are returned unchanged.
    ///
    /// # Errors
    /// Returns [`crate::Error::GenericBinding`] if a name is not declared in `scope`.
    pub fn bind_type(
        &mut self,
        types: &mut TypeReferences,
        ty: TypeRefId,
        scope: &GenericScope,
    ) -> Result<TypeRefId> {
        if !types.get(ty).is_scope_dependent() {
            return Ok(ty);
        }

        match types.kind(ty).clone() {
            TypeRefKind::GenericParameter(param) => match &param.binding {
                ParamBinding::Name(name) => {
                    let index = scope.bind(param.kind, name)?;
                    Ok(types.generic_param(GenericParamRef::indexed(param.kind, index)))
                }
                ParamBinding::Index(_) => Ok(ty),
            },
            TypeRefKind::GenericInstantiation { definition, args } => {
                let definition = self.bind_type(types, definition, scope)?;
                let args = args
                    .iter()
                    .map(|arg| self.bind_type(types, *arg, scope))
                    .collect::<Result<Vec<_>>>()?;
                self.instantiate(types, definition, args)
            }
            TypeRefKind::Modified { base, modifiers } => {
                let base = self.bind_type(types, base, scope)?;
                let modifiers = modifiers
                    .into_iter()
                    .map(|modifier| match modifier {
                        Modifier::Required(inner) => {
                            Ok(Modifier::Required(self.bind_type(types, inner, scope)?))
                        }
                        Modifier::Optional(inner) => {
                            Ok(Modifier::Optional(self.bind_type(types, inner, scope)?))
                        }
                        other => Ok(other),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(types.intern(TypeRefKind::Modified { base, modifiers }))
            }
            TypeRefKind::Local { .. }
            | TypeRefKind::External { .. }
            | TypeRefKind::Primitive(_) => Ok(ty),
        }
    }

    /// Rewrites every by-name generic parameter inside a member mention to its positional
    /// form in `scope`.
    ///
    /// # Errors
    /// Returns [`crate::Error::GenericBinding`] if a name is not declared in `scope`.
    pub fn bind_member(
        &mut self,
        types: &mut TypeReferences,
        members: &mut MemberReferences,
        member: MemberRefId,
        scope: &GenericScope,
    ) -> Result<MemberRefId> {
        if !members.get(member).is_scope_dependent() {
            return Ok(member);
        }

        let owner = self.bind_type(types, members.get(member).owner(), scope)?;
        match members.kind(member).clone() {
            MemberRefKind::Method(mut signature) => {
                signature.return_type = self.bind_type(types, signature.return_type, scope)?;
                for param in &mut signature.params {
                    *param = self.bind_type(types, *param, scope)?;
                }
                for extra in &mut signature.vararg_tail {
                    *extra = self.bind_type(types, *extra, scope)?;
                }
                Ok(members.method(types, owner, signature))
            }
            MemberRefKind::Field(mut signature) => {
                signature.field_type = self.bind_type(types, signature.field_type, scope)?;
                Ok(members.field(types, owner, signature))
            }
            MemberRefKind::MethodInstance { method, args } => {
                let method = self.bind_member(types, members, method, scope)?;
                let args = args
                    .iter()
                    .map(|arg| self.bind_type(types, *arg, scope))
                    .collect::<Result<Vec<_>>>()?;
                self.instantiate_method(types, members, method, args)
            }
        }
    }
}
