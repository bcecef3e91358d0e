//! Turning references into signatures and tokens.
//!
//! Every resolution is memoized on the reference entry, so a mention resolved twice yields
//! the same token and never inserts a second row.

use crate::{
    assembler::context::AssemblyContext,
    body::{LocalVariable, OperandResolver},
    definitions::{DefinitionNode, DefinitionTable, TypeDefinition, MODULE_TYPE},
    generics::{GenericParamKind, GenericScope, GenericsEngine, ParamBinding},
    metadata::{
        signatures::{
            encode_local_var_signature, encode_method_signature, encode_method_spec_signature,
            encode_type_signature, encode_typespec_signature, CustomModifier, SignatureArray,
            SignatureLocalVariables, SignatureMethod, SignatureMethodSpec, SignatureModified,
            SignatureParameter, TypeSignature, SIGNATURE_HEADER,
        },
        token::Token,
    },
    references::{
        split_type_name, FieldRefSignature, MemberRefId, MemberRefKind, MethodRefSignature,
        Modifier, TypeRefId, TypeRefKind,
    },
    Error, Result, SymbolKind,
};

impl AssemblyContext {
    /// Resolves `ty` to its binary signature.
    ///
    /// # Errors
    /// Returns [`Error::UndefinedSymbol`] for local types that were never defined,
    /// [`Error::UnknownExternal`] for undeclared scopes, [`Error::GenericBinding`] for
    /// by-name parameters that were not bound and [`Error::GenericArity`] for
    /// instantiations of local generic types with the wrong argument count.
    pub(crate) fn resolve_type(&mut self, ty: TypeRefId) -> Result<TypeSignature> {
        if let Some(signature) = self.types.get(ty).resolved() {
            return Ok(signature.clone());
        }

        let signature = match self.types.kind(ty).clone() {
            TypeRefKind::Primitive(primitive) => primitive.signature(),
            TypeRefKind::Local { full_name } => {
                let token = self.type_def_token(&full_name)?;
                self.types.set_token(ty, token);
                if self.is_local_value_type(&full_name) {
                    TypeSignature::ValueType(token)
                } else {
                    TypeSignature::Class(token)
                }
            }
            TypeRefKind::External {
                scope,
                full_name,
                value_type,
            } => {
                let mut token = self.externs.scope_token(
                    &mut self.tables,
                    &scope,
                    self.config.implicit_corlib,
                    &self.diagnostics,
                )?;
                // nested TypeRefs are scoped by their enclosing TypeRef
                let (namespace, names) = split_type_name(&full_name);
                for (depth, name) in names.iter().enumerate() {
                    let namespace = if depth == 0 { namespace.as_str() } else { "" };
                    token = self.tables.add_type_ref(token, namespace, name);
                }
                self.types.set_token(ty, token);
                if value_type {
                    TypeSignature::ValueType(token)
                } else {
                    TypeSignature::Class(token)
                }
            }
            TypeRefKind::GenericParameter(param) => match param.binding {
                ParamBinding::Index(index) => match param.kind {
                    GenericParamKind::Type => TypeSignature::GenericParamType(index),
                    GenericParamKind::Method => TypeSignature::GenericParamMethod(index),
                },
                ParamBinding::Name(_) => return Err(Error::GenericBinding(param.to_string())),
            },
            TypeRefKind::GenericInstantiation { definition, args } => {
                if let TypeRefKind::Local { full_name } = self.types.kind(definition) {
                    if let Some(index) = self.definitions.types.index_of(full_name) {
                        if let Some(node) = self
                            .definitions
                            .types
                            .node(index)
                            .filter(|_| self.definitions.types.is_defined(index))
                        {
                            GenericsEngine::check_arity(
                                full_name,
                                node.generic_params.len(),
                                args.len(),
                            )?;
                        }
                    }
                }

                let open = self.resolve_type(definition)?;
                if !open.is_named() {
                    return Err(Error::InvalidReference(format!(
                        "{} cannot be instantiated",
                        self.types.name(definition)
                    )));
                }
                let args = args
                    .iter()
                    .map(|arg| self.resolve_type(*arg))
                    .collect::<Result<Vec<_>>>()?;
                TypeSignature::GenericInst(Box::new(open), args)
            }
            TypeRefKind::Modified { base, modifiers } => {
                let Some((last, prefix)) = modifiers.split_last() else {
                    return Err(malformed_error!(
                        "empty modifier list on {}",
                        self.types.name(ty)
                    ));
                };
                // the prefix is interned as its own reference, so shared prefixes resolve once
                let inner = if prefix.is_empty() {
                    base
                } else {
                    self.types.intern(TypeRefKind::Modified {
                        base,
                        modifiers: prefix.to_vec(),
                    })
                };
                let inner = self.resolve_type(inner)?;
                self.apply_modifier(inner, last)?
            }
        };

        self.types.set_resolved(ty, signature.clone());
        Ok(signature)
    }

    /// Wraps `inner` in one modifier layer.
    fn apply_modifier(&mut self, inner: TypeSignature, modifier: &Modifier) -> Result<TypeSignature> {
        let signature = match modifier {
            Modifier::SzArray => TypeSignature::SzArray(Box::new(inner)),
            Modifier::Array(dimensions) => TypeSignature::Array(SignatureArray {
                base: Box::new(inner),
                rank: dimensions.len() as u32,
                dimensions: dimensions.clone(),
            }),
            Modifier::ByRef => TypeSignature::ByRef(Box::new(inner)),
            Modifier::Pointer => TypeSignature::Ptr(Box::new(inner)),
            Modifier::Pinned => TypeSignature::Pinned(Box::new(inner)),
            Modifier::Required(ty) | Modifier::Optional(ty) => {
                let modifier = CustomModifier {
                    is_required: matches!(modifier, Modifier::Required(_)),
                    modifier_type: self.type_token(*ty)?,
                };
                match inner {
                    TypeSignature::Modified(mut modified) => {
                        // outermost modifier is encoded first
                        modified.modifiers.insert(0, modifier);
                        TypeSignature::Modified(modified)
                    }
                    base => TypeSignature::Modified(SignatureModified {
                        modifiers: vec![modifier],
                        base: Box::new(base),
                    }),
                }
            }
        };
        Ok(signature)
    }

    /// Token naming `ty` in a TypeDefOrRef position: the TypeDef/TypeRef of named types, a
    /// TypeSpec for everything else.
    ///
    /// # Errors
    /// Propagates the failures of [`Self::resolve_type`].
    pub(crate) fn type_token(&mut self, ty: TypeRefId) -> Result<Token> {
        if let Some(token) = self.types.get(ty).token() {
            return Ok(token);
        }

        let signature = self.resolve_type(ty)?;
        let token = match signature.named_token() {
            Some(token) => token,
            None => {
                let blob = encode_typespec_signature(&signature)?;
                self.tables.add_type_spec(&blob)
            }
        };
        self.types.set_token(ty, token);
        Ok(token)
    }

    /// The reserved TypeDef row of the local type `full_name`.
    ///
    /// # Errors
    /// Returns [`Error::UndefinedSymbol`] if the type was never defined and
    /// [`Error::InvalidReference`] if it failed to resolve.
    pub(crate) fn type_def_token(&self, full_name: &str) -> Result<Token> {
        let types = &self.definitions.types;
        let node = types
            .index_of(full_name)
            .filter(|index| types.is_defined(*index))
            .and_then(|index| types.node(index))
            .ok_or_else(|| Error::UndefinedSymbol {
                kind: SymbolKind::Type,
                name: full_name.to_string(),
            })?;
        if node.lifecycle.has_failed() {
            return Err(Error::InvalidReference(format!(
                "{full_name} failed to resolve"
            )));
        }
        node.token
            .ok_or_else(|| malformed_error!("no TypeDef row reserved for {}", full_name))
    }

    fn is_local_value_type(&self, full_name: &str) -> bool {
        self.definitions
            .types
            .get(full_name)
            .is_some_and(|node| node.is_value_type(&self.types))
    }

    /// Resolves a member mention to its MethodDef, Field, MemberRef or MethodSpec token.
    ///
    /// Members of local types resolve to their definition rows, which must be allocated.
    /// A vararg call site always becomes a MemberRef carrying the call-site signature, with
    /// the MethodDef as parent when the method is local.
    ///
    /// # Errors
    /// Returns [`Error::UndefinedSymbol`] for local members that were never defined,
    /// [`Error::InvalidReference`] for fields on primitive types and propagates type
    /// resolution failures.
    pub(crate) fn member_token(&mut self, member: MemberRefId) -> Result<Token> {
        if let Some(token) = self.members.get(member).resolved() {
            return Ok(token);
        }

        let owner = self.members.get(member).owner();
        let token = match self.members.kind(member).clone() {
            MemberRefKind::Method(signature) => self.method_ref_token(owner, &signature)?,
            MemberRefKind::Field(signature) => self.field_ref_token(owner, &signature)?,
            MemberRefKind::MethodInstance { method, args } => {
                let method = self.member_token(method)?;
                let generic_args = args
                    .iter()
                    .map(|arg| self.resolve_type(*arg))
                    .collect::<Result<Vec<_>>>()?;
                let blob = encode_method_spec_signature(&SignatureMethodSpec { generic_args })?;
                self.tables.add_method_spec(method, &blob)
            }
        };

        self.members.set_resolved(member, token);
        Ok(token)
    }

    /// Token of a method mention: the MethodDef of a local method, or a MemberRef on the
    /// owner (on the MethodDef itself for a local vararg call site).
    fn method_ref_token(&mut self, owner: TypeRefId, signature: &MethodRefSignature) -> Result<Token> {
        if let TypeRefKind::Local { full_name } = self.types.kind(owner) {
            let full_name = full_name.clone();
            let key = signature.definition_key(&self.types);
            let method = self.local_member(&full_name, &key, |ty| &ty.methods, |m| m.token)?;
            if signature.vararg_tail.is_empty() {
                return Ok(method);
            }
            let blob = self.method_signature_blob(signature)?;
            return Ok(self.tables.add_member_ref(method, &signature.name, &blob));
        }

        let parent = self.type_token(owner)?;
        let blob = self.method_signature_blob(signature)?;
        Ok(self.tables.add_member_ref(parent, &signature.name, &blob))
    }

    /// Token of a field mention: the Field row of a local field or a MemberRef on the owner.
    fn field_ref_token(&mut self, owner: TypeRefId, signature: &FieldRefSignature) -> Result<Token> {
        match self.types.kind(owner).clone() {
            TypeRefKind::Primitive(primitive) => Err(Error::InvalidReference(format!(
                "primitive type {primitive} has no fields"
            ))),
            TypeRefKind::Local { full_name } => {
                let key = signature.key(&self.types);
                self.local_member(&full_name, &key, |ty| &ty.fields, |f| f.token)
            }
            _ => {
                let parent = self.type_token(owner)?;
                let blob = self.field_signature_blob(signature.field_type)?;
                Ok(self.tables.add_member_ref(parent, &signature.name, &blob))
            }
        }
    }

    /// The MethodDef a method mention designates, looking through instantiations of local
    /// generic types to their definition.
    ///
    /// # Errors
    /// Returns [`Error::InvalidReference`] if the mention is not a method of a type defined
    /// in this module.
    pub(crate) fn method_def_token(&self, method: MemberRefId) -> Result<Token> {
        let entry = self.members.get(method);
        let MemberRefKind::Method(signature) = entry.kind() else {
            return Err(Error::InvalidReference(format!(
                "{} is not a method definition",
                entry.key()
            )));
        };
        let owner = match self.types.kind(entry.owner()) {
            TypeRefKind::GenericInstantiation { definition, .. } => self.types.kind(*definition),
            other => other,
        };
        let TypeRefKind::Local { full_name } = owner else {
            return Err(Error::InvalidReference(format!(
                "{}::{} is not defined in this module",
                self.types.name(entry.owner()),
                entry.key()
            )));
        };
        let key = signature.definition_key(&self.types);
        self.local_member(full_name, &key, |ty| &ty.methods, |m| m.token)
    }

    /// Looks up the allocated row of the member `key` in one of the tables of the local
    /// type `owner`.
    pub(crate) fn local_member<N: DefinitionNode>(
        &self,
        owner: &str,
        key: &str,
        table: impl Fn(&TypeDefinition) -> &DefinitionTable<N>,
        token: impl Fn(&N) -> Option<Token>,
    ) -> Result<Token> {
        let types = &self.definitions.types;
        let owner_node = types
            .index_of(owner)
            .filter(|index| types.is_defined(*index))
            .and_then(|index| types.node(index))
            .ok_or_else(|| Error::UndefinedSymbol {
                kind: SymbolKind::Type,
                name: owner.to_string(),
            })?;
        if owner_node.lifecycle.has_failed() {
            return Err(Error::InvalidReference(format!("{owner} failed to resolve")));
        }

        let members = table(owner_node);
        let name = if owner == MODULE_TYPE {
            key.to_string()
        } else {
            format!("{owner}::{key}")
        };
        let node = members
            .index_of(key)
            .filter(|index| members.is_defined(*index))
            .and_then(|index| members.node(index))
            .ok_or_else(|| Error::UndefinedSymbol {
                kind: members.kind(),
                name: name.clone(),
            })?;
        token(node).ok_or_else(|| Error::InvalidReference(format!("{name} failed to resolve")))
    }

    /// Resolves every type of a method mention into a signature structure.
    ///
    /// # Errors
    /// Propagates type resolution failures.
    pub(crate) fn method_signature(&mut self, signature: &MethodRefSignature) -> Result<SignatureMethod> {
        Ok(SignatureMethod {
            has_this: signature.has_this,
            explicit_this: signature.explicit_this,
            vararg: signature.vararg,
            param_count_generic: signature.generic_arity,
            return_type: self.resolve_type(signature.return_type)?.into(),
            params: self.resolve_params(&signature.params)?,
            varargs: self.resolve_params(&signature.vararg_tail)?,
            ..SignatureMethod::default()
        })
    }

    /// Parameter signatures of `types`, in order.
    fn resolve_params(&mut self, types: &[TypeRefId]) -> Result<Vec<SignatureParameter>> {
        types
            .iter()
            .map(|ty| self.resolve_type(*ty).map(SignatureParameter::from))
            .collect()
    }

    /// The encoded method signature blob of `signature`.
    ///
    /// # Errors
    /// Propagates type resolution and encoding failures.
    pub(crate) fn method_signature_blob(&mut self, signature: &MethodRefSignature) -> Result<Vec<u8>> {
        let signature = self.method_signature(signature)?;
        encode_method_signature(&signature)
    }

    /// The encoded field signature blob of a field of type `field_type`.
    ///
    /// # Errors
    /// Propagates type resolution and encoding failures.
    pub(crate) fn field_signature_blob(&mut self, field_type: TypeRefId) -> Result<Vec<u8>> {
        let base = self.resolve_type(field_type)?;
        let mut blob = vec![SIGNATURE_HEADER::FIELD];
        encode_type_signature(&base, &mut blob)?;
        Ok(blob)
    }

    /// Rewrites the by-name generic parameters of a call-site signature for `scope`.
    ///
    /// # Errors
    /// Returns [`Error::GenericBinding`] for names not declared in `scope`.
    pub(crate) fn bind_signature(
        &mut self,
        signature: &MethodRefSignature,
        scope: &GenericScope,
    ) -> Result<MethodRefSignature> {
        let mut bound = signature.clone();
        bound.return_type = self
            .generics
            .bind_type(&mut self.types, signature.return_type, scope)?;
        for ty in bound.params.iter_mut().chain(bound.vararg_tail.iter_mut()) {
            *ty = self.generics.bind_type(&mut self.types, *ty, scope)?;
        }
        Ok(bound)
    }

    /// The StandAloneSig of a `.locals` declaration, or `None` when there are no locals.
    ///
    /// # Errors
    /// Propagates binding, resolution and encoding failures.
    pub(crate) fn locals_signature(
        &mut self,
        locals: &[LocalVariable],
        scope: &GenericScope,
    ) -> Result<Option<Token>> {
        if locals.is_empty() {
            return Ok(None);
        }
        let locals = locals
            .iter()
            .map(|local| {
                let ty = self
                    .generics
                    .bind_type(&mut self.types, local.local_type, scope)?;
                self.resolve_type(ty)
            })
            .collect::<Result<Vec<_>>>()?;
        let blob = encode_local_var_signature(&SignatureLocalVariables { locals })?;
        Ok(Some(self.tables.add_stand_alone_sig(&blob)))
    }
}

/// [`OperandResolver`] for one method body: binds by-name generic parameters in the body's
/// scope, then resolves through the shared caches.
pub(crate) struct BodyResolver<'a> {
    context: &'a mut AssemblyContext,
    scope: &'a GenericScope,
}

impl<'a> BodyResolver<'a> {
    pub(crate) fn new(context: &'a mut AssemblyContext, scope: &'a GenericScope) -> Self {
        BodyResolver { context, scope }
    }
}

impl OperandResolver for BodyResolver<'_> {
    fn type_token(&mut self, ty: TypeRefId) -> Result<Token> {
        let context = &mut *self.context;
        let ty = context.generics.bind_type(&mut context.types, ty, self.scope)?;
        context.type_token(ty)
    }

    fn method_token(&mut self, method: MemberRefId) -> Result<Token> {
        let context = &mut *self.context;
        let method = context.generics.bind_member(
            &mut context.types,
            &mut context.members,
            method,
            self.scope,
        )?;
        context.member_token(method)
    }

    fn field_token(&mut self, field: MemberRefId) -> Result<Token> {
        self.method_token(field)
    }

    fn string_token(&mut self, value: &str) -> Result<Token> {
        Ok(Token::user_string(
            self.context.tables.user_strings.intern(value),
        ))
    }

    fn signature_token(&mut self, signature: &MethodRefSignature) -> Result<Token> {
        let signature = self.context.bind_signature(signature, self.scope)?;
        let blob = self.context.method_signature_blob(&signature)?;
        Ok(self.context.tables.add_stand_alone_sig(&blob))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembler::AssemblerConfig,
        generics::GenericParamRef,
        metadata::tables::TableId,
        references::{ExternalScope, PrimitiveType},
    };

    fn context() -> AssemblyContext {
        AssemblyContext::new(AssemblerConfig::lenient())
    }

    #[test]
    fn test_external_resolution_is_memoized() {
        let mut context = context();
        let object = context.types.external(
            ExternalScope::Assembly("mscorlib".into()),
            "System.Object",
            false,
        );

        let first = context.type_token(object).unwrap();
        let second = context.type_token(object).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.table_id(), Some(TableId::TypeRef));
        assert_eq!(context.tables.row_count(TableId::TypeRef), 1);
        assert_eq!(context.tables.row_count(TableId::AssemblyRef), 1);
    }

    #[test]
    fn test_nested_external_chain() {
        let mut context = context();
        let inner = context.types.external(
            ExternalScope::Assembly("mscorlib".into()),
            "System.Collections.Generic.Dictionary`2/Enumerator",
            true,
        );
        let signature = context.resolve_type(inner).unwrap();
        let token = signature.named_token().unwrap();
        assert!(matches!(signature, TypeSignature::ValueType(_)));

        let row = &context.tables.type_ref[token.row() as usize - 1];
        assert_eq!(row.resolution_scope, Token::from_parts(TableId::TypeRef, 1));
        assert_eq!(context.tables.strings.get(row.name), Some("Enumerator"));
        assert_eq!(context.tables.strings.get(row.namespace), Some(""));
    }

    #[test]
    fn test_unbound_named_parameter_fails() {
        let mut context = context();
        let named = context
            .types
            .generic_param(GenericParamRef::named(GenericParamKind::Type, "T"));
        assert_eq!(
            context.resolve_type(named),
            Err(Error::GenericBinding("!T".into()))
        );
    }

    #[test]
    fn test_modifier_prefix_is_shared() {
        let mut context = context();
        let int32 = context.types.primitive(PrimitiveType::I4);
        let array = context.types.modified(int32, Modifier::SzArray);
        let byref = context.types.modified(array, Modifier::ByRef);

        assert_eq!(
            context.resolve_type(byref).unwrap(),
            TypeSignature::ByRef(Box::new(TypeSignature::SzArray(Box::new(TypeSignature::I4))))
        );
        assert!(context.types.get(array).is_resolved());

        let spec = context.type_token(array).unwrap();
        assert_eq!(spec.table_id(), Some(TableId::TypeSpec));
        assert_eq!(context.type_token(array).unwrap(), spec);
    }

    #[test]
    fn test_undefined_local_type() {
        let mut context = context();
        let missing = context.types.local("Missing");
        context.definitions.reference_type("Missing", None);
        assert_eq!(
            context.resolve_type(missing),
            Err(Error::UndefinedSymbol {
                kind: SymbolKind::Type,
                name: "Missing".into()
            })
        );
    }

    #[test]
    fn test_local_type_uses_reserved_row() {
        let mut context = context();
        let index = context
            .definitions
            .types
            .add_definition("Foo", None, TypeDefinition::new("Foo"))
            .index()
            .unwrap();
        let token = context.tables.reserve_type_def();
        if let Some(node) = context.definitions.types.node_mut(index) {
            node.token = Some(token);
        }

        let foo = context.types.local("Foo");
        assert_eq!(context.resolve_type(foo).unwrap(), TypeSignature::Class(token));
        assert_eq!(context.type_token(foo).unwrap(), token);
    }

    #[test]
    fn test_field_on_primitive_is_invalid() {
        let mut context = context();
        let int32 = context.types.primitive(PrimitiveType::I4);
        let field = context
            .members
            .field(&context.types, int32, FieldRefSignature::new("m_value", int32));
        assert!(matches!(
            context.member_token(field),
            Err(Error::InvalidReference(_))
        ));
    }

    #[test]
    fn test_external_vararg_call_site() {
        let mut context = context();
        let console = context.types.external(
            ExternalScope::Assembly("mscorlib".into()),
            "System.Console",
            false,
        );
        let void = context.types.primitive(PrimitiveType::Void);
        let string = context.types.primitive(PrimitiveType::String);
        let float64 = context.types.primitive(PrimitiveType::R8);
        let call = MethodRefSignature::new("WriteLine", void, vec![string])
            .with_vararg_tail(vec![float64; 3]);
        let member = context.members.method(&context.types, console, call);

        let token = context.member_token(member).unwrap();
        assert_eq!(token.table_id(), Some(TableId::MemberRef));
        let row = &context.tables.member_ref[0];
        let blob = context.tables.blobs.get(row.signature).unwrap();
        // VARARG, 4 params, void, string, SENTINEL, 3 x R8
        assert_eq!(blob, &[0x05, 0x04, 0x01, 0x0E, 0x41, 0x0D, 0x0D, 0x0D]);
    }
}
