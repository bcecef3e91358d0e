use std::collections::HashMap;

use crate::{
    generics::GenericArguments,
    metadata::token::Token,
    references::{MemberRefId, TypeRefId, TypeReferences},
};

/// Shape of a method mention: name, return type, fixed parameters and calling convention.
///
/// A vararg call site carries the extra argument types in `vararg_tail`; the declared form
/// of the method always has an empty tail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(clippy::struct_excessive_bools)]
pub struct MethodRefSignature {
    /// Method name
    pub name: String,
    /// Return type
    pub return_type: TypeRefId,
    /// Fixed parameter types
    pub params: Vec<TypeRefId>,
    /// `instance`
    pub has_this: bool,
    /// `explicit`
    pub explicit_this: bool,
    /// `vararg`
    pub vararg: bool,
    /// Types passed after the fixed prefix at a vararg call site
    pub vararg_tail: Vec<TypeRefId>,
    /// Number of method-level generic parameters
    pub generic_arity: u32,
}

impl MethodRefSignature {
    /// Creates a static, non-generic, fixed-arity signature.
    #[must_use]
    pub fn new(name: impl Into<String>, return_type: TypeRefId, params: Vec<TypeRefId>) -> Self {
        MethodRefSignature {
            name: name.into(),
            return_type,
            params,
            has_this: false,
            explicit_this: false,
            vararg: false,
            vararg_tail: Vec::new(),
            generic_arity: 0,
        }
    }

    /// Marks the signature as `instance`.
    #[must_use]
    pub fn instance(mut self) -> Self {
        self.has_this = true;
        self
    }

    /// Marks the signature as `vararg` without any optional tail.
    #[must_use]
    pub fn vararg(mut self) -> Self {
        self.vararg = true;
        self
    }

    /// Marks the signature as a vararg call site passing `tail` after the fixed parameters.
    #[must_use]
    pub fn with_vararg_tail(mut self, tail: Vec<TypeRefId>) -> Self {
        self.vararg = true;
        self.vararg_tail = tail;
        self
    }

    /// Sets the number of method-level generic parameters.
    #[must_use]
    pub fn generic(mut self, arity: u32) -> Self {
        self.generic_arity = arity;
        self
    }

    /// The key under which the matching method definition is registered.
    ///
    /// `instance` is part of it, since a static and an instance method may share name and
    /// parameters. `explicit` and the vararg tail are not, so every call site of one method
    /// maps to the same definition.
    #[must_use]
    pub fn definition_key(&self, types: &TypeReferences) -> String {
        method_key(
            types,
            &self.name,
            self.return_type,
            &self.params,
            self.generic_arity,
            self.vararg,
            self.has_this,
        )
    }

    /// The key under which this mention is interned on its owner.
    #[must_use]
    pub fn reference_key(&self, types: &TypeReferences) -> String {
        let mut key = String::new();
        if self.explicit_this {
            key.push_str("explicit ");
        }
        key.push_str(&self.definition_key(types));
        if !self.vararg_tail.is_empty() {
            // `...)` becomes `..., t1, t2)`
            key.pop();
            for ty in &self.vararg_tail {
                key.push(',');
                key.push_str(types.name(*ty));
            }
            key.push(')');
        }
        key
    }

    /// The same signature without the vararg tail.
    #[must_use]
    pub fn declared_form(&self) -> Self {
        MethodRefSignature {
            vararg_tail: Vec::new(),
            ..self.clone()
        }
    }

    fn types(&self) -> impl Iterator<Item = TypeRefId> + '_ {
        std::iter::once(self.return_type)
            .chain(self.params.iter().copied())
            .chain(self.vararg_tail.iter().copied())
    }
}

/// Shape of a field mention.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRefSignature {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: TypeRefId,
}

impl FieldRefSignature {
    /// Creates a field signature.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: TypeRefId) -> Self {
        FieldRefSignature {
            name: name.into(),
            field_type,
        }
    }

    /// The key under which the matching field definition is registered.
    #[must_use]
    pub fn key(&self, types: &TypeReferences) -> String {
        field_key(types, &self.name, self.field_type)
    }
}

/// Renders the signature key of a method: `[instance ]ret name`n(p1,p2,...)`.
#[must_use]
pub fn method_key(
    types: &TypeReferences,
    name: &str,
    return_type: TypeRefId,
    params: &[TypeRefId],
    generic_arity: u32,
    vararg: bool,
    has_this: bool,
) -> String {
    let mut key = String::new();
    if has_this {
        key.push_str("instance ");
    }
    key.push_str(&format!("{} {}", types.name(return_type), name));
    if generic_arity > 0 {
        key.push_str(&format!("`{generic_arity}"));
    }
    key.push('(');
    let mut rendered: Vec<&str> = params.iter().map(|ty| types.name(*ty)).collect();
    if vararg {
        rendered.push("...");
    }
    key.push_str(&rendered.join(","));
    key.push(')');
    key
}

/// Renders the signature key of a field: `type name`.
#[must_use]
pub fn field_key(types: &TypeReferences, name: &str, field_type: TypeRefId) -> String {
    format!("{} {}", types.name(field_type), name)
}

/// What a member mention refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRefKind {
    /// A method on the owner type
    Method(MethodRefSignature),
    /// A field on the owner type
    Field(FieldRefSignature),
    /// A generic method applied to arguments; only created through
    /// [`crate::generics::GenericsEngine::instantiate_method`].
    MethodInstance {
        /// The open generic method
        method: MemberRefId,
        /// Method-level generic arguments
        args: GenericArguments,
    },
}

/// One interned member mention, plus its memoized token.
#[derive(Debug, Clone)]
pub struct MemberReference {
    owner: TypeRefId,
    kind: MemberRefKind,
    key: String,
    scope_dependent: bool,
    resolved: Option<Token>,
}

impl MemberReference {
    /// The type the member is looked up on.
    #[must_use]
    pub fn owner(&self) -> TypeRefId {
        self.owner
    }

    /// The variant and its payload.
    #[must_use]
    pub fn kind(&self) -> &MemberRefKind {
        &self.kind
    }

    /// The signature key this member is interned under on its owner.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Checks whether any type in the mention names a generic parameter instead of indexing it.
    #[must_use]
    pub fn is_scope_dependent(&self) -> bool {
        self.scope_dependent
    }

    /// The memoized MethodDef/Field/MemberRef/MethodSpec token.
    #[must_use]
    pub fn resolved(&self) -> Option<Token> {
        self.resolved
    }

    /// Checks whether this is a method or method instantiation.
    #[must_use]
    pub fn is_method(&self) -> bool {
        !matches!(self.kind, MemberRefKind::Field(_))
    }
}

/// Interning arena for method and field mentions, scoped per owner type.
#[derive(Debug, Clone, Default)]
pub struct MemberReferences {
    entries: Vec<MemberReference>,
    by_key: HashMap<(TypeRefId, String), MemberRefId>,
}

impl MemberReferences {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether nothing was interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry for `id`.
    ///
    /// # Panics
    /// Panics if `id` was not produced by this arena.
    #[must_use]
    pub fn get(&self, id: MemberRefId) -> &MemberReference {
        &self.entries[id.index()]
    }

    /// Variant of `id`.
    #[must_use]
    pub fn kind(&self, id: MemberRefId) -> &MemberRefKind {
        &self.get(id).kind
    }

    /// Looks up an already interned member by owner and key.
    #[must_use]
    pub fn find(&self, owner: TypeRefId, key: &str) -> Option<MemberRefId> {
        self.by_key.get(&(owner, key.to_string())).copied()
    }

    /// Interns a method mention on `owner`.
    pub fn method(
        &mut self,
        types: &TypeReferences,
        owner: TypeRefId,
        signature: MethodRefSignature,
    ) -> MemberRefId {
        let key = signature.reference_key(types);
        let scope_dependent = types.get(owner).is_scope_dependent()
            || signature.types().any(|ty| types.get(ty).is_scope_dependent());
        self.intern(owner, key, MemberRefKind::Method(signature), scope_dependent)
    }

    /// Interns a field mention on `owner`.
    pub fn field(
        &mut self,
        types: &TypeReferences,
        owner: TypeRefId,
        signature: FieldRefSignature,
    ) -> MemberRefId {
        let key = signature.key(types);
        let scope_dependent = types.get(owner).is_scope_dependent()
            || types.get(signature.field_type).is_scope_dependent();
        self.intern(owner, key, MemberRefKind::Field(signature), scope_dependent)
    }

    /// Interns a generic method instantiation; the canonicalizing cache sits in front of this
    /// in [`crate::generics::GenericsEngine`].
    pub(crate) fn method_instance(
        &mut self,
        types: &TypeReferences,
        method: MemberRefId,
        args: GenericArguments,
    ) -> MemberRefId {
        let open = self.get(method);
        let owner = open.owner;
        let key = format!("{}<{}>", open.key, args.signature(types));
        let scope_dependent =
            open.scope_dependent || args.iter().any(|ty| types.get(*ty).is_scope_dependent());
        self.intern(
            owner,
            key,
            MemberRefKind::MethodInstance { method, args },
            scope_dependent,
        )
    }

    fn intern(
        &mut self,
        owner: TypeRefId,
        key: String,
        kind: MemberRefKind,
        scope_dependent: bool,
    ) -> MemberRefId {
        if let Some(id) = self.by_key.get(&(owner, key.clone())) {
            return *id;
        }

        let id = MemberRefId::new(self.entries.len());
        self.entries.push(MemberReference {
            owner,
            kind,
            key: key.clone(),
            scope_dependent,
            resolved: None,
        });
        self.by_key.insert((owner, key), id);
        id
    }

    /// Memoizes the token of `id`.
    pub(crate) fn set_resolved(&mut self, id: MemberRefId, token: Token) {
        self.entries[id.index()].resolved = Some(token);
    }

    /// Iterates over all interned members with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (MemberRefId, &MemberReference)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (MemberRefId::new(index), entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::PrimitiveType;

    fn setup() -> (TypeReferences, TypeRefId, TypeRefId, TypeRefId, TypeRefId) {
        let mut types = TypeReferences::new();
        let foo = types.local("Foo");
        let void = types.primitive(PrimitiveType::Void);
        let int32 = types.primitive(PrimitiveType::I4);
        let float64 = types.primitive(PrimitiveType::R8);
        (types, foo, void, int32, float64)
    }

    #[test]
    fn test_method_keys() {
        let (types, _, void, int32, _) = setup();
        let signature = MethodRefSignature::new("M", void, vec![int32, int32]).generic(2);
        assert_eq!(signature.definition_key(&types), "void M`2(int32,int32)");

        let instance = MethodRefSignature::new("M", void, vec![]).instance();
        assert_eq!(instance.definition_key(&types), "instance void M()");
        assert_eq!(instance.reference_key(&types), "instance void M()");

        let mut explicit = instance.clone();
        explicit.explicit_this = true;
        assert_eq!(explicit.definition_key(&types), "instance void M()");
        assert_eq!(explicit.reference_key(&types), "explicit instance void M()");
    }

    #[test]
    fn test_structural_interning_per_owner() {
        let (mut types, foo, void, int32, _) = setup();
        let bar = types.local("Bar");
        let mut members = MemberReferences::new();

        let signature = MethodRefSignature::new("Run", void, vec![int32]);
        let a = members.method(&types, foo, signature.clone());
        let b = members.method(&types, foo, signature.clone());
        let c = members.method(&types, bar, signature);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let field = members.field(&types, foo, FieldRefSignature::new("X", int32));
        assert_eq!(members.get(field).key(), "int32 X");
        assert!(!members.get(field).is_method());
    }

    #[test]
    fn test_vararg_tail_is_distinct() {
        let (types, foo, void, int32, float64) = setup();
        let mut members = MemberReferences::new();

        let declared = MethodRefSignature::new("M", void, vec![int32]).vararg();
        let call_site = declared
            .clone()
            .with_vararg_tail(vec![float64, float64, float64]);

        let plain = members.method(&types, foo, declared);
        let site = members.method(&types, foo, call_site);
        assert_ne!(plain, site);
        assert_eq!(
            members.get(site).key(),
            "void M(int32,...,float64,float64,float64)"
        );
        assert_eq!(members.get(plain).key(), "void M(int32,...)");

        let fixed = match members.kind(site) {
            MemberRefKind::Method(signature) => {
                assert_eq!(signature.vararg_tail, vec![float64; 3]);
                assert_eq!(signature.definition_key(&types), "void M(int32,...)");
                signature.declared_form()
            }
            other => panic!("unexpected kind {other:?}"),
        };
        assert_eq!(members.method(&types, foo, fixed), plain);
    }
}
