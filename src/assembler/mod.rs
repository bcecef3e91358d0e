//! The builder surface a front end drives, and the pipeline behind it.
//!
//! [`ModuleAssembler`] receives declarations in source order: externs, classes with their
//! members, method bodies, attributes. Nothing is resolved while input arrives; mentions
//! are interned and forward references registered, so a type or member may be used before
//! it is declared. [`ModuleAssembler::assemble`] then runs the undefined check, the resolve
//! pass, the define pass and body finalization, and hands back an [`AssemblyOutput`].
//!
//! Every failure is recorded in the run's [`crate::diagnostics::Diagnostics`]; builder calls
//! that return a `Result` additionally hand the error back to the caller.
//!
//! # Examples
//!
//! ```rust
//! use cilasm::prelude::*;
//!
//! let mut asm = ModuleAssembler::new(AssemblerConfig::lenient());
//! asm.assembly(AssemblyManifest::new("Hello"));
//!
//! let void = asm.primitive(PrimitiveType::Void);
//! asm.begin_class(TypeDefinition::new("Demo.Program").with_flags(TypeAttributes::PUBLIC))?;
//! asm.begin_method(MethodDefinition::new("Main", void).with_flags(MethodAttributes::STATIC))?;
//! asm.entry_point()?;
//! asm.emit("ret", Operand::None)?;
//! asm.end_method()?;
//! asm.end_class()?;
//!
//! let module = asm.assemble().into_result()?;
//! assert!(module.entry_point.is_some());
//! # Ok::<(), cilasm::Error>(())
//! ```

mod config;
mod context;
mod define;
mod externs;
mod output;
mod resolver;

pub use config::{AssemblerConfig, CORLIB};
pub use context::AssemblyContext;
pub use externs::{AssemblyManifest, ExternAssembly, ExternTable, HASH_ALGORITHM_SHA1};
pub use output::{AssembledModule, AssemblyOutput, MetadataWriter, MethodBody};

use crate::{
    body::{InstructionStream, LabelHandle, Operand},
    definitions::{
        AttributeTarget, ClassLayout, CustomAttribute, DataLabel, DefineOutcome, Definitions,
        EventDefinition, FieldDefinition, MethodDefinition, MethodOverride, PropertyDefinition,
        SecurityDeclaration, TypeDefId, TypeDefinition, MODULE_TYPE,
    },
    diagnostics::{DiagnosticCategory, Diagnostics, Location},
    generics::{GenericParamRef, GenericScope},
    metadata::{flags::FieldAttributes, token::Token},
    references::{
        field_key, ExternalScope, FieldRefSignature, MemberRefId, MemberRefKind,
        MethodRefSignature, Modifier, PrimitiveType, TypeRefId, TypeRefKind,
    },
    Error, Result, SymbolKind,
};

/// Where the members of the innermost open `.class` go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassSlot {
    /// The accepted definition
    Defined(TypeDefId),
    /// A rejected duplicate, kept in [`Definitions::discarded`]
    Discarded(usize),
}

/// The `.method` currently receiving instructions.
#[derive(Debug)]
struct OpenMethod {
    node: MethodDefinition,
    scope: GenericScope,
    /// Cleared when the header failed to bind; the method is dropped at `end_method`
    valid: bool,
}

/// Builder-style entry point of the assembler.
///
/// Owns one [`AssemblyContext`]; a new assembler starts from empty caches.
#[derive(Debug)]
pub struct ModuleAssembler {
    context: AssemblyContext,
    module_name: Option<String>,
    manifest: Option<AssemblyManifest>,
    classes: Vec<ClassSlot>,
    method: Option<OpenMethod>,
}

impl Default for ModuleAssembler {
    fn default() -> Self {
        Self::new(AssemblerConfig::default())
    }
}

impl ModuleAssembler {
    /// Creates an assembler with an empty module.
    #[must_use]
    pub fn new(config: AssemblerConfig) -> Self {
        ModuleAssembler {
            context: AssemblyContext::new(config),
            module_name: None,
            manifest: None,
            classes: Vec::new(),
            method: None,
        }
    }

    /// The configuration of the run.
    #[must_use]
    pub fn config(&self) -> &AssemblerConfig {
        &self.context.config
    }

    /// Diagnostics recorded so far.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.context.diagnostics
    }

    /// The underlying context, for inspection.
    #[must_use]
    pub fn context(&self) -> &AssemblyContext {
        &self.context
    }

    /// Records `error` and hands it back.
    fn fail<T>(
        &self,
        category: DiagnosticCategory,
        error: Error,
        location: Option<&Location>,
    ) -> Result<T> {
        let locations: &[Location] = match location {
            Some(location) => std::slice::from_ref(location),
            None => &[],
        };
        self.context.report(category, &error, locations);
        Err(error)
    }

    // Manifest and externs

    /// `.module name`
    pub fn module(&mut self, name: impl Into<String>) {
        self.module_name = Some(name.into());
    }

    /// `.assembly`; a second manifest replaces the first with a warning.
    pub fn assembly(&mut self, manifest: AssemblyManifest) {
        if let Some(previous) = &self.manifest {
            self.context.diagnostics.warning(
                DiagnosticCategory::General,
                format!(".assembly {} replaces .assembly {}", manifest.name, previous.name),
            );
        }
        self.manifest = Some(manifest);
    }

    /// `.assembly extern`; returns the AssemblyRef.
    pub fn assembly_extern(&mut self, assembly: &ExternAssembly) -> Token {
        let context = &mut self.context;
        context.externs.declare_assembly(
            &mut context.tables,
            assembly,
            context.config.compact_public_keys,
        )
    }

    /// `.module extern`; returns the ModuleRef.
    pub fn module_extern(&mut self, name: &str) -> Token {
        let context = &mut self.context;
        context.externs.declare_module(&mut context.tables, name)
    }

    // Type references

    /// A type defined in this module, by full name (`Ns.Outer/Inner`) or `.typedef` alias.
    ///
    /// The type does not need to be declared yet; if it never is, the undefined check
    /// reports it with every location it was mentioned at.
    pub fn local_type(&mut self, name: &str, location: Option<Location>) -> TypeRefId {
        if let Some(alias) = self.context.aliases.get(name) {
            return *alias;
        }
        self.context.definitions.reference_type(name, location);
        self.context.types.local(name)
    }

    /// The implicit `<Module>` type.
    pub fn module_type(&mut self) -> TypeRefId {
        self.context.types.local(MODULE_TYPE)
    }

    /// A type of an external assembly or module, `[scope]Ns.Name`.
    pub fn external_type(
        &mut self,
        scope: ExternalScope,
        full_name: &str,
        value_type: bool,
    ) -> TypeRefId {
        self.context.types.external(scope, full_name, value_type)
    }

    /// A built-in type.
    pub fn primitive(&mut self, primitive: PrimitiveType) -> TypeRefId {
        self.context.types.primitive(primitive)
    }

    /// `!0`, `!!0`, `!T` or `!!T`; named forms are bound against the enclosing scope.
    pub fn generic_param(&mut self, param: GenericParamRef) -> TypeRefId {
        self.context.types.generic_param(param)
    }

    /// `base[]`, `base*`, `base&`, `base pinned`, `base modreq(...)` and friends.
    pub fn modified(&mut self, base: TypeRefId, modifier: Modifier) -> TypeRefId {
        self.context.types.modified(base, modifier)
    }

    /// `definition<args...>`
    ///
    /// # Errors
    /// Returns [`Error::GenericArity`] or [`Error::InvalidReference`] for instantiations
    /// that can be rejected without the definition; the error is also recorded.
    pub fn instantiate(&mut self, definition: TypeRefId, args: Vec<TypeRefId>) -> Result<TypeRefId> {
        let context = &mut self.context;
        match context.generics.instantiate(&mut context.types, definition, args) {
            Ok(instance) => Ok(instance),
            Err(error) => self.fail(DiagnosticCategory::Generic, error, None),
        }
    }

    /// `.typedef ty as alias`
    pub fn type_alias(&mut self, alias: impl Into<String>, ty: TypeRefId) {
        let alias = alias.into();
        if self.context.aliases.contains_key(&alias) {
            let error = Error::DuplicateDefinition {
                kind: SymbolKind::Type,
                name: alias,
            };
            self.context.report(DiagnosticCategory::Type, &error, &[]);
            return;
        }
        self.context.aliases.insert(alias, ty);
    }

    // Member references

    /// A method mention, `ret owner::name(params)`.
    ///
    /// Methods on local types are registered as forward references on their owner.
    pub fn method_ref(
        &mut self,
        owner: TypeRefId,
        signature: MethodRefSignature,
        location: Option<Location>,
    ) -> MemberRefId {
        let context = &mut self.context;
        let method = context.members.method(&context.types, owner, signature);
        let method = self.bind_mention(method);
        self.register_member(method, location);
        method
    }

    /// A field mention, `type owner::name`.
    ///
    /// Fields on local types are registered as forward references on their owner.
    pub fn field_ref(
        &mut self,
        owner: TypeRefId,
        signature: FieldRefSignature,
        location: Option<Location>,
    ) -> MemberRefId {
        let context = &mut self.context;
        let field = context.members.field(&context.types, owner, signature);
        let field = self.bind_mention(field);
        self.register_member(field, location);
        field
    }

    /// `method<args...>`
    ///
    /// # Errors
    /// Returns [`Error::GenericArity`] or [`Error::InvalidReference`]; the error is also
    /// recorded.
    pub fn instantiate_method(
        &mut self,
        method: MemberRefId,
        args: Vec<TypeRefId>,
    ) -> Result<MemberRefId> {
        let context = &mut self.context;
        match context
            .generics
            .instantiate_method(&context.types, &mut context.members, method, args)
        {
            Ok(instance) => Ok(instance),
            Err(error) => self.fail(DiagnosticCategory::Generic, error, None),
        }
    }

    /// Binds by-name generic parameters of a mention in the current scope, when possible.
    ///
    /// A mention that does not bind here is kept as is; wherever it is used later it is
    /// bound again and the failure reported there.
    fn bind_mention(&mut self, member: MemberRefId) -> MemberRefId {
        if !self.context.members.get(member).is_scope_dependent() {
            return member;
        }
        let scope = self.current_scope();
        let context = &mut self.context;
        context
            .generics
            .bind_member(&mut context.types, &mut context.members, member, &scope)
            .unwrap_or(member)
    }

    fn register_member(&mut self, member: MemberRefId, location: Option<Location>) {
        let context = &mut self.context;
        let entry = context.members.get(member);
        let owner = match context.types.kind(entry.owner()) {
            TypeRefKind::GenericInstantiation { definition, .. } => *definition,
            _ => entry.owner(),
        };
        let TypeRefKind::Local { full_name } = context.types.kind(owner) else {
            return;
        };
        let full_name = full_name.clone();

        match entry.kind().clone() {
            MemberRefKind::Method(signature) => {
                let key = signature.definition_key(&context.types);
                let placeholder = MethodDefinition::placeholder(&signature.declared_form());
                let id = context.definitions.reference_type(&full_name, location.clone());
                if let Some(ty) = context.definitions.type_def_mut(id) {
                    ty.methods.get_reference(&key, location, || placeholder);
                }
            }
            MemberRefKind::Field(signature) => {
                let key = signature.key(&context.types);
                let id = context.definitions.reference_type(&full_name, location.clone());
                if let Some(ty) = context.definitions.type_def_mut(id) {
                    ty.fields.get_reference(&key, location, || {
                        FieldDefinition::new(signature.name, signature.field_type)
                    });
                }
            }
            MemberRefKind::MethodInstance { .. } => {}
        }
    }

    // Class scope

    fn open_class(&self) -> Option<ClassSlot> {
        self.classes.last().copied()
    }

    /// The type receiving members: the innermost open class, or `<Module>`.
    fn open_type(&self) -> Option<&TypeDefinition> {
        match self.open_class() {
            Some(ClassSlot::Defined(id)) => self.context.definitions.type_def(id),
            Some(ClassSlot::Discarded(index)) => self.context.definitions.discarded.get(index),
            None => self.context.definitions.type_def(Definitions::module_type()),
        }
    }

    fn open_type_mut(&mut self) -> Option<&mut TypeDefinition> {
        match self.open_class() {
            Some(ClassSlot::Defined(id)) => self.context.definitions.type_def_mut(id),
            Some(ClassSlot::Discarded(index)) => {
                self.context.definitions.discarded.get_mut(index)
            }
            None => self
                .context
                .definitions
                .type_def_mut(Definitions::module_type()),
        }
    }

    fn open_type_name(&self) -> String {
        self.open_type()
            .map_or_else(|| MODULE_TYPE.to_string(), |ty| ty.full_name.clone())
    }

    fn class_scope(&self) -> GenericScope {
        self.open_type().map_or_else(GenericScope::empty, |ty| {
            GenericScope::for_type(&ty.generic_params)
        })
    }

    /// The generic scope at the current point of the input.
    fn current_scope(&self) -> GenericScope {
        match &self.method {
            Some(method) => method.scope.clone(),
            None => self.class_scope(),
        }
    }

    fn bind_type(&mut self, ty: TypeRefId, scope: &GenericScope) -> Result<TypeRefId> {
        let context = &mut self.context;
        context.generics.bind_type(&mut context.types, ty, scope)
    }

    fn bind_member(&mut self, member: MemberRefId, scope: &GenericScope) -> Result<MemberRefId> {
        let context = &mut self.context;
        context
            .generics
            .bind_member(&mut context.types, &mut context.members, member, scope)
    }

    /// `.class`; opens a scope that receives members until [`Self::end_class`].
    ///
    /// Inside another class the definition is nested in it. Classes without `extends`
    /// derive from `[mscorlib]System.Object`, except interfaces.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateDefinition`] if the name is already defined, and binding
    /// errors of the header. Members of a rejected class are still accepted and dropped.
    /// A class nested in a rejected class is dropped with it: it returns the enclosing
    /// duplicate's error without reporting a second diagnostic.
    pub fn begin_class(&mut self, mut definition: TypeDefinition) -> Result<TypeDefId> {
        let location = definition.location.clone();
        if let Some(method) = &self.method {
            let error = malformed_error!(
                "class {} declared inside method {}",
                definition.full_name,
                method.node.name
            );
            return self.fail(DiagnosticCategory::Type, error, location.as_ref());
        }

        if let Some(ClassSlot::Discarded(_)) = self.open_class() {
            let enclosing = self.open_type_name();
            let discarded = &mut self.context.definitions.discarded;
            discarded.push(definition.nested_in(&enclosing));
            self.classes.push(ClassSlot::Discarded(discarded.len() - 1));
            return Err(Error::DuplicateDefinition {
                kind: SymbolKind::Type,
                name: enclosing,
            });
        }

        if self.open_class().is_some() {
            definition = definition.nested_in(&self.open_type_name());
        } else if let Some(enclosing) = &definition.enclosing {
            self.context
                .definitions
                .reference_type(enclosing, location.clone());
        }

        if definition.parent.is_none()
            && !definition.is_interface()
            && !definition.is_module_type()
            && definition.full_name != "System.Object"
        {
            let object = self.context.types.external(
                ExternalScope::Assembly(CORLIB.to_string()),
                "System.Object",
                false,
            );
            definition.parent = Some(object);
        }

        let header = self.bind_header(&mut definition);
        if let Err(error) = &header {
            self.context
                .report(DiagnosticCategory::Type, error, location.as_slice());
        }

        let full_name = definition.full_name.clone();
        match self
            .context
            .definitions
            .types
            .add_definition(&full_name, location.clone(), definition)
        {
            DefineOutcome::New(index) | DefineOutcome::Promoted(index) => {
                let id = TypeDefId::new(index);
                if header.is_err() {
                    if let Some(ty) = self.context.definitions.type_def_mut(id) {
                        ty.lifecycle.fail();
                    }
                }
                self.classes.push(ClassSlot::Defined(id));
                header.map(|()| id)
            }
            DefineOutcome::Duplicate { node, error } => {
                let discarded = &mut self.context.definitions.discarded;
                discarded.push(node);
                self.classes.push(ClassSlot::Discarded(discarded.len() - 1));
                self.fail(DiagnosticCategory::Type, error, location.as_ref())
            }
        }
    }

    /// Binds by-name generic parameters in the parent, the interfaces and the constraints of
    /// a type header.
    fn bind_header(&mut self, definition: &mut TypeDefinition) -> Result<()> {
        let scope = GenericScope::for_type(&definition.generic_params);
        let context = &mut self.context;
        definition
            .generic_params
            .resolve_indices(&scope, &mut context.generics, &mut context.types)?;
        if let Some(parent) = definition.parent {
            definition.parent = Some(self.bind_type(parent, &scope)?);
        }
        for interface in &mut definition.interfaces {
            let context = &mut self.context;
            *interface = context
                .generics
                .bind_type(&mut context.types, *interface, &scope)?;
        }
        Ok(())
    }

    /// Closes the innermost `.class`.
    ///
    /// # Errors
    /// Returns an error if no class is open or a method is still open.
    pub fn end_class(&mut self) -> Result<()> {
        if let Some(method) = &self.method {
            let error = malformed_error!("method {} is not terminated", method.node.name);
            return self.fail(DiagnosticCategory::Method, error, None);
        }
        if self.classes.pop().is_none() {
            return self.fail(
                DiagnosticCategory::Type,
                malformed_error!("no class to close"),
                None,
            );
        }
        Ok(())
    }

    /// `.pack` and `.size` of the open class.
    pub fn class_layout(&mut self, packing_size: u16, class_size: u32) {
        if let Some(ty) = self.open_type_mut() {
            ty.layout = Some(ClassLayout {
                packing_size,
                class_size,
            });
        }
    }

    /// `.override declaration with body` on the open class.
    ///
    /// # Errors
    /// Returns binding errors of either method mention.
    pub fn add_override(&mut self, body: MemberRefId, declaration: MemberRefId) -> Result<()> {
        let scope = self.class_scope();
        let bound = self
            .bind_member(body, &scope)
            .and_then(|body| Ok((body, self.bind_member(declaration, &scope)?)));
        match bound {
            Ok((body, declaration)) => {
                if let Some(ty) = self.open_type_mut() {
                    ty.overrides.push(MethodOverride { body, declaration });
                }
                Ok(())
            }
            Err(error) => self.fail(DiagnosticCategory::Method, error, None),
        }
    }

    // Method scope

    /// `.method`; opens a body that receives instructions until [`Self::end_method`].
    ///
    /// Outside any class the method is global and belongs to `<Module>`.
    ///
    /// # Errors
    /// Returns an error if a method is already open, and binding errors of the header.
    /// A method whose header fails to bind still accepts instructions and is dropped at
    /// `end_method`.
    pub fn begin_method(&mut self, mut definition: MethodDefinition) -> Result<()> {
        let location = definition.location.clone();
        if let Some(open) = &self.method {
            let error = malformed_error!(
                "method {} declared inside method {}",
                definition.name,
                open.node.name
            );
            return self.fail(DiagnosticCategory::Method, error, location.as_ref());
        }

        let scope = self
            .class_scope()
            .with_method(&definition.generic_params);
        let header = self.bind_signature(&mut definition, &scope);
        self.method = Some(OpenMethod {
            node: definition,
            scope,
            valid: header.is_ok(),
        });
        match header {
            Ok(()) => Ok(()),
            Err(error) => self.fail(DiagnosticCategory::Method, error, location.as_ref()),
        }
    }

    fn bind_signature(
        &mut self,
        definition: &mut MethodDefinition,
        scope: &GenericScope,
    ) -> Result<()> {
        let context = &mut self.context;
        definition
            .generic_params
            .resolve_indices(scope, &mut context.generics, &mut context.types)?;
        definition.return_type = self.bind_type(definition.return_type, scope)?;
        for param in &mut definition.params {
            let context = &mut self.context;
            param.param_type = context
                .generics
                .bind_type(&mut context.types, param.param_type, scope)?;
        }
        Ok(())
    }

    fn open_method(&mut self) -> Result<&mut OpenMethod> {
        if self.method.is_none() {
            return self.fail(
                DiagnosticCategory::Body,
                malformed_error!("no method is open"),
                None,
            );
        }
        self.method
            .as_mut()
            .ok_or_else(|| malformed_error!("no method is open"))
    }

    /// The instruction stream of the open method, for directives without a dedicated
    /// builder call (`.locals`, `.maxstack`, `.try`, `.line`, ...).
    pub fn body_mut(&mut self) -> Option<&mut InstructionStream> {
        self.method.as_mut().map(|method| &mut method.node.body)
    }

    /// Appends an instruction to the open method.
    ///
    /// # Errors
    /// Returns an error if no method is open, the mnemonic is unknown or the operand does
    /// not fit it.
    pub fn emit(&mut self, mnemonic: &str, operand: Operand) -> Result<()> {
        let result = self.open_method()?.node.body.emit(mnemonic, operand);
        match result {
            Ok(()) => Ok(()),
            Err(error) => self.fail(DiagnosticCategory::Body, error, None),
        }
    }

    /// A reference to the label `name` of the open method, defined or not.
    ///
    /// # Errors
    /// Returns an error if no method is open.
    pub fn label(&mut self, name: &str) -> Result<LabelHandle> {
        Ok(self.open_method()?.node.body.label(name))
    }

    /// Defines the label `name` at the next instruction of the open method.
    ///
    /// # Errors
    /// Returns an error if no method is open or the label is already defined.
    pub fn define_label(&mut self, name: &str) -> Result<LabelHandle> {
        let result = self.open_method()?.node.body.define_label(name);
        match result {
            Ok(handle) => Ok(handle),
            Err(error) => self.fail(DiagnosticCategory::Body, error, None),
        }
    }

    /// `.entrypoint` in the open method.
    ///
    /// # Errors
    /// Returns an error if no method is open.
    pub fn entry_point(&mut self) -> Result<()> {
        self.open_method()?.node.entry_point = true;
        Ok(())
    }

    /// Closes the open method and adds it to the open class (or `<Module>`).
    ///
    /// # Errors
    /// Returns [`Error::DuplicateDefinition`] for a second method with the same signature
    /// or a second entry point, and an error if the entry point is not static.
    pub fn end_method(&mut self) -> Result<()> {
        let Some(method) = self.method.take() else {
            return self.fail(
                DiagnosticCategory::Method,
                malformed_error!("no method to close"),
                None,
            );
        };
        if !method.valid {
            return Ok(());
        }

        let node = method.node;
        let location = node.location.clone();
        let key = node.key(&self.context.types);
        let owner = self.open_type_name();
        let qualified = if owner == MODULE_TYPE {
            key.clone()
        } else {
            format!("{owner}::{key}")
        };
        let entry_point = node.entry_point;
        let is_static = node.is_static();

        let outcome = match self.open_type_mut() {
            Some(ty) => ty.methods.add_definition(&key, location.clone(), node),
            None => return Ok(()),
        };
        if let DefineOutcome::Duplicate { error, .. } = outcome {
            return self.fail(DiagnosticCategory::Method, error, location.as_ref());
        }

        if entry_point {
            if !is_static {
                let error =
                    Error::InvalidReference(format!("entry point {qualified} is not static"));
                return self.fail(DiagnosticCategory::Method, error, location.as_ref());
            }
            if self.context.definitions.entry_point.is_some() {
                let error = Error::DuplicateDefinition {
                    kind: SymbolKind::EntryPoint,
                    name: qualified,
                };
                return self.fail(DiagnosticCategory::Method, error, location.as_ref());
            }
            let owner = match self.open_class() {
                Some(ClassSlot::Defined(id)) => id,
                Some(ClassSlot::Discarded(_)) => return Ok(()),
                None => Definitions::module_type(),
            };
            self.context.definitions.entry_point = Some((owner, key));
        }
        Ok(())
    }

    // Members and data

    /// `.field` on the open class (or `<Module>`).
    ///
    /// # Errors
    /// Returns [`Error::DuplicateDefinition`], binding errors of the field type, and in
    /// strict mode an error for an instance field on an interface.
    pub fn add_field(&mut self, mut field: FieldDefinition) -> Result<()> {
        let location = field.location.clone();
        let scope = self.class_scope();
        field.field_type = match self.bind_type(field.field_type, &scope) {
            Ok(ty) => ty,
            Err(error) => return self.fail(DiagnosticCategory::Field, error, location.as_ref()),
        };

        let owner = self.open_type_name();
        let in_interface = self.open_type().is_some_and(TypeDefinition::is_interface);
        if in_interface && !field.is_static() {
            if self.context.config.interface_fields_static {
                self.context.diagnostics.warning(
                    DiagnosticCategory::Field,
                    format!("instance field {owner}::{} on an interface made static", field.name),
                );
                field.flags |= FieldAttributes::STATIC;
            } else {
                let error = Error::InvalidReference(format!(
                    "instance field {owner}::{} declared on an interface",
                    field.name
                ));
                return self.fail(DiagnosticCategory::Field, error, location.as_ref());
            }
        }

        if let Some(label) = &field.data_label {
            self.context
                .definitions
                .reference_data_label(label, location.clone());
        }

        let key = field_key(&self.context.types, &field.name, field.field_type);
        let outcome = match self.open_type_mut() {
            Some(ty) => ty.fields.add_definition(&key, location.clone(), field),
            None => return Ok(()),
        };
        match outcome {
            DefineOutcome::Duplicate { error, .. } => {
                self.fail(DiagnosticCategory::Field, error, location.as_ref())
            }
            _ => Ok(()),
        }
    }

    /// `.event` on the open class.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateDefinition`] and binding errors of the event type or the
    /// accessors.
    pub fn add_event(&mut self, mut event: EventDefinition) -> Result<()> {
        let location = event.location.clone();
        let scope = self.class_scope();
        if let Err(error) = self.bind_event(&mut event, &scope) {
            return self.fail(DiagnosticCategory::Member, error, location.as_ref());
        }

        let name = event.name.clone();
        let outcome = match self.open_type_mut() {
            Some(ty) => ty.events.add_definition(&name, location.clone(), event),
            None => return Ok(()),
        };
        match outcome {
            DefineOutcome::Duplicate { error, .. } => {
                self.fail(DiagnosticCategory::Member, error, location.as_ref())
            }
            _ => Ok(()),
        }
    }

    fn bind_event(&mut self, event: &mut EventDefinition, scope: &GenericScope) -> Result<()> {
        if let Some(ty) = event.event_type {
            event.event_type = Some(self.bind_type(ty, scope)?);
        }
        for accessor in [&mut event.add_on, &mut event.remove_on, &mut event.fire]
            .into_iter()
            .flatten()
        {
            *accessor = self.bind_member(*accessor, scope)?;
        }
        for other in &mut event.others {
            *other = self.bind_member(*other, scope)?;
        }
        Ok(())
    }

    /// `.property` on the open class.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateDefinition`] and binding errors of the property signature
    /// or the accessors.
    pub fn add_property(&mut self, mut property: PropertyDefinition) -> Result<()> {
        let location = property.location.clone();
        let scope = self.class_scope();
        if let Err(error) = self.bind_property(&mut property, &scope) {
            return self.fail(DiagnosticCategory::Member, error, location.as_ref());
        }

        let key = property.key(&self.context.types);
        let outcome = match self.open_type_mut() {
            Some(ty) => ty.properties.add_definition(&key, location.clone(), property),
            None => return Ok(()),
        };
        match outcome {
            DefineOutcome::Duplicate { error, .. } => {
                self.fail(DiagnosticCategory::Member, error, location.as_ref())
            }
            _ => Ok(()),
        }
    }

    fn bind_property(
        &mut self,
        property: &mut PropertyDefinition,
        scope: &GenericScope,
    ) -> Result<()> {
        property.property_type = self.bind_type(property.property_type, scope)?;
        for param in &mut property.params {
            let context = &mut self.context;
            *param = context.generics.bind_type(&mut context.types, *param, scope)?;
        }
        for accessor in [&mut property.getter, &mut property.setter]
            .into_iter()
            .flatten()
        {
            *accessor = self.bind_member(*accessor, scope)?;
        }
        for other in &mut property.others {
            *other = self.bind_member(*other, scope)?;
        }
        Ok(())
    }

    /// `.data label = bytes`
    ///
    /// # Errors
    /// Returns [`Error::DuplicateDefinition`] if the label is already defined.
    pub fn add_data(
        &mut self,
        label: &str,
        data: Vec<u8>,
        location: Option<Location>,
    ) -> Result<()> {
        let outcome = self.context.definitions.data_labels.add_definition(
            label,
            location.clone(),
            DataLabel { data },
        );
        match outcome {
            DefineOutcome::Duplicate { error, .. } => {
                self.fail(DiagnosticCategory::Field, error, location.as_ref())
            }
            _ => Ok(()),
        }
    }

    // Attributes

    /// The entity a `.custom` at the current point attaches to: the open method, else the
    /// open class. `None` at module level, where the target must be named explicitly, and
    /// inside a rejected duplicate class.
    #[must_use]
    pub fn current_target(&self) -> Option<AttributeTarget> {
        if matches!(self.open_class(), Some(ClassSlot::Discarded(_))) {
            return None;
        }
        let owner = self.open_type_name();
        match &self.method {
            Some(method) if method.valid => Some(AttributeTarget::Method {
                owner,
                key: method.node.key(&self.context.types),
            }),
            Some(_) => None,
            None if self.open_class().is_some() => Some(AttributeTarget::Type(owner)),
            None => None,
        }
    }

    /// `.custom ctor = (blob)` on `target`.
    ///
    /// The target is looked up when the module is assembled, so it may be declared later.
    pub fn custom_attribute(
        &mut self,
        target: AttributeTarget,
        constructor: MemberRefId,
        value: Vec<u8>,
        location: Option<Location>,
    ) {
        self.context.definitions.attributes.push(CustomAttribute {
            target,
            constructor,
            value,
            location,
        });
    }

    /// `.permissionset action = (blob)` on an assembly, type or method.
    ///
    /// # Errors
    /// Returns [`Error::InvalidReference`] for any other target.
    pub fn security(
        &mut self,
        target: AttributeTarget,
        action: u16,
        permission_set: Vec<u8>,
        location: Option<Location>,
    ) -> Result<()> {
        if !matches!(
            target,
            AttributeTarget::Assembly | AttributeTarget::Type(_) | AttributeTarget::Method { .. }
        ) {
            let error =
                Error::InvalidReference(format!("{target} cannot carry a permission set"));
            return self.fail(DiagnosticCategory::Attribute, error, location.as_ref());
        }
        self.context.definitions.security.push(SecurityDeclaration {
            target,
            action,
            permission_set,
            location,
        });
        Ok(())
    }

    // Output

    /// Runs the undefined check, the resolve and define passes and body finalization.
    ///
    /// The module is returned only if no error was reported during the whole run.
    #[must_use]
    pub fn assemble(mut self) -> AssemblyOutput {
        if let Some(method) = self.method.take() {
            let error = malformed_error!("method {} is not terminated", method.node.name);
            self.context
                .report(DiagnosticCategory::Method, &error, method.node.location.as_slice());
        }
        if !self.classes.is_empty() {
            let error = malformed_error!("class {} is not terminated", self.open_type_name());
            self.context.report(DiagnosticCategory::Type, &error, &[]);
        }
        self.context.finish(self.module_name, self.manifest)
    }

    /// Assembles and hands a successful module to `writer`.
    ///
    /// # Errors
    /// Returns the writer's error; assembly errors are in the returned diagnostics.
    pub fn assemble_into<W: MetadataWriter>(self, writer: &mut W) -> Result<AssemblyOutput> {
        let output = self.assemble();
        if let Some(module) = &output.module {
            writer.write_module(module)?;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        definitions::ParamDefinition,
        generics::{GenericParamKind, GenericParameter, GenericParameters},
        metadata::{
            flags::{MethodAttributes, TypeAttributes},
            tables::TableId,
        },
    };

    fn void(asm: &mut ModuleAssembler) -> TypeRefId {
        asm.primitive(PrimitiveType::Void)
    }

    #[test]
    fn test_classes_default_to_object() {
        let mut asm = ModuleAssembler::default();
        asm.begin_class(TypeDefinition::new("Foo")).unwrap();
        asm.end_class().unwrap();
        asm.begin_class(TypeDefinition::new("IFoo").with_flags(TypeAttributes::INTERFACE))
            .unwrap();
        asm.end_class().unwrap();

        let definitions = asm.context().definitions();
        let foo = definitions.type_def(definitions.find_type("Foo").unwrap()).unwrap();
        let parent = foo.parent.unwrap();
        assert_eq!(asm.context().types().name(parent), "[mscorlib]System.Object");
        let ifoo = definitions.type_def(definitions.find_type("IFoo").unwrap()).unwrap();
        assert_eq!(ifoo.parent, None);
    }

    #[test]
    fn test_nested_class_inside_class() {
        let mut asm = ModuleAssembler::default();
        asm.begin_class(TypeDefinition::new("Ns.Outer")).unwrap();
        let inner = asm.begin_class(TypeDefinition::new("Inner")).unwrap();
        asm.end_class().unwrap();
        asm.end_class().unwrap();

        let inner = asm.context().definitions().type_def(inner).unwrap();
        assert_eq!(inner.full_name, "Ns.Outer/Inner");
        assert_eq!(inner.enclosing.as_deref(), Some("Ns.Outer"));

        let module = asm.assemble().into_result().unwrap();
        assert_eq!(module.tables.nested_class.len(), 1);
    }

    #[test]
    fn test_method_generic_params_bind_by_name() {
        let mut asm = ModuleAssembler::default();
        let t = asm.generic_param(GenericParamRef::named(GenericParamKind::Method, "T"));
        let params: GenericParameters = [GenericParameter::new("T")].into_iter().collect();

        asm.begin_class(TypeDefinition::new("Foo")).unwrap();
        asm.begin_method(
            MethodDefinition::new("Id", t)
                .with_flags(MethodAttributes::STATIC)
                .with_param(ParamDefinition::named("value", t))
                .with_generic_params(params),
        )
        .unwrap();
        asm.emit("ldarg.0", Operand::None).unwrap();
        asm.emit("ret", Operand::None).unwrap();
        asm.end_method().unwrap();
        asm.end_class().unwrap();

        let output = asm.assemble();
        assert!(!output.diagnostics.has_errors(), "{}", output.diagnostics.summary());
        let module = output.module.unwrap();
        assert_eq!(module.tables.generic_param.len(), 1);
        assert_eq!(module.tables.generic_param[0].owner.table(), TableId::MethodDef as u8);
    }

    #[test]
    fn test_unknown_method_param_name() {
        let mut asm = ModuleAssembler::default();
        let u = asm.generic_param(GenericParamRef::named(GenericParamKind::Method, "U"));
        let void = void(&mut asm);
        let result = asm.begin_method(
            MethodDefinition::new("M", void)
                .with_flags(MethodAttributes::STATIC)
                .with_param(ParamDefinition::new(u)),
        );
        assert!(matches!(result, Err(Error::GenericBinding(_))));
        asm.emit("ret", Operand::None).unwrap();
        asm.end_method().unwrap();

        let output = asm.assemble();
        assert_eq!(output.diagnostics.error_count(), 1);
        assert!(output.module.is_none());
    }

    #[test]
    fn test_second_entry_point() {
        let mut asm = ModuleAssembler::default();
        let void = void(&mut asm);
        for name in ["A", "B"] {
            asm.begin_method(MethodDefinition::new(name, void).with_flags(MethodAttributes::STATIC))
                .unwrap();
            asm.entry_point().unwrap();
            asm.emit("ret", Operand::None).unwrap();
            let result = asm.end_method();
            assert_eq!(result.is_err(), name == "B");
        }
        let errors = asm.diagnostics().errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("entry point"));
    }

    #[test]
    fn test_interface_field_correction() {
        let int32 = |asm: &mut ModuleAssembler| asm.primitive(PrimitiveType::I4);

        let mut lenient = ModuleAssembler::new(AssemblerConfig::lenient());
        lenient
            .begin_class(TypeDefinition::new("IFoo").with_flags(TypeAttributes::INTERFACE))
            .unwrap();
        let ty = int32(&mut lenient);
        lenient.add_field(FieldDefinition::new("X", ty)).unwrap();
        assert_eq!(lenient.diagnostics().warning_count(), 1);

        let mut strict = ModuleAssembler::new(AssemblerConfig::strict());
        strict
            .begin_class(TypeDefinition::new("IFoo").with_flags(TypeAttributes::INTERFACE))
            .unwrap();
        let ty = int32(&mut strict);
        assert!(strict.add_field(FieldDefinition::new("X", ty)).is_err());
        assert_eq!(strict.diagnostics().error_count(), 1);
    }

    #[test]
    fn test_unterminated_scopes_are_reported() {
        let mut asm = ModuleAssembler::default();
        let void = void(&mut asm);
        asm.begin_class(TypeDefinition::new("Foo")).unwrap();
        asm.begin_method(MethodDefinition::new("M", void)).unwrap();

        let output = asm.assemble();
        assert_eq!(output.diagnostics.error_count(), 2);
        assert!(!output.is_success());
    }

    #[test]
    fn test_type_alias() {
        let mut asm = ModuleAssembler::default();
        let list = asm.external_type(
            ExternalScope::Assembly(CORLIB.into()),
            "System.Collections.ArrayList",
            false,
        );
        asm.type_alias("AL", list);
        assert_eq!(asm.local_type("AL", None), list);

        asm.type_alias("AL", list);
        assert_eq!(asm.diagnostics().error_count(), 1);
    }

    struct Recorder(Vec<usize>);

    impl MetadataWriter for Recorder {
        fn write_module(&mut self, module: &AssembledModule) -> Result<()> {
            self.0.push(module.tables.type_def.len());
            Ok(())
        }
    }

    #[test]
    fn test_assemble_into_writer() {
        let mut asm = ModuleAssembler::default();
        asm.begin_class(TypeDefinition::new("Foo")).unwrap();
        asm.end_class().unwrap();

        let mut writer = Recorder(Vec::new());
        let output = asm.assemble_into(&mut writer).unwrap();
        assert!(output.is_success());
        assert_eq!(writer.0, vec![2]);
    }
}
