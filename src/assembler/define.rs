//! The finish pipeline: undefined check, resolve pass, row allocation and define pass.
//!
//! Runs once, after the front end has fed the whole input:
//!
//! 1. report every referenced-but-undefined symbol with all of its mention sites
//! 2. reserve TypeDef rows in definition order (`<Module>` is row 1)
//! 3. resolve every type: enclosing type, parent and interfaces first, with cycle detection
//! 4. allocate Field, MethodDef and Param rows per type
//! 5. emit GenericParam rows sorted by owner, each followed by its constraints
//! 6. define every type: layout rows, constants, bodies, events, properties, overrides
//! 7. attach the manifest, custom attributes and security declarations
//! 8. compute the module row and its MVID
//!
//! Failures are reported once, where they originate; dependents of a failed type fail
//! without a diagnostic of their own.

use sha1::{Digest, Sha1};

use crate::{
    assembler::{
        context::AssemblyContext,
        externs::AssemblyManifest,
        output::{AssembledModule, AssemblyOutput, MethodBody},
        resolver::BodyResolver,
    },
    body::{finalize_body, Operand},
    definitions::AttributeTarget,
    diagnostics::{DiagnosticCategory, Location},
    generics::{GenericParameters, GenericScope},
    metadata::{
        flags::{
            FieldAttributes, MethodAttributes, MethodSemanticsAttributes, ParamAttributes,
            PropertyAttributes, TypeAttributes,
        },
        signatures::{encode_property_signature, SignatureParameter, SignatureProperty},
        tables::{
            ClassLayoutRow, ConstantRow, CustomAttributeRow, DeclSecurityRow, EventMapRow,
            EventRow, FieldLayoutRow, FieldRow, GenericParamConstraintRow, GenericParamRow,
            ImplMapRow, InterfaceImplRow, MetadataTables, MethodDefRow, MethodImplRow,
            MethodSemanticsRow, NestedClassRow, ParamRow, PropertyMapRow, PropertyRow, TableId,
        },
        token::Token,
    },
    references::{MemberRefId, TypeRefId, TypeRefKind},
    Error, Result, SymbolKind,
};

/// Fallback module name when neither `.module` nor `.assembly` named one.
const DEFAULT_MODULE_NAME: &str = "module.dll";

impl AssemblyContext {
    /// Runs the whole pipeline and packages the result.
    pub(crate) fn finish(
        mut self,
        module_name: Option<String>,
        manifest: Option<AssemblyManifest>,
    ) -> AssemblyOutput {
        self.report_undefined();
        self.reserve_type_defs();
        self.resolve_types();
        self.allocate_members();
        self.emit_generic_params();

        let mut bodies = Vec::new();
        let mut debug_lines = Vec::new();
        for index in self.definitions.types.definition_order().to_vec() {
            self.define_type(index, &mut bodies, &mut debug_lines);
        }

        if let Some(manifest) = &manifest {
            let row = manifest.to_row(&mut self.tables);
            self.tables.set_assembly(row);
        }
        self.emit_custom_attributes();
        self.emit_security();
        let entry_point = self.entry_point_token();

        let module_name = module_name
            .or_else(|| manifest.as_ref().map(|m| format!("{}.dll", m.name)))
            .unwrap_or_else(|| DEFAULT_MODULE_NAME.to_string());
        let mvid = module_version_id(&module_name, &self.tables);
        self.tables.set_module(&module_name, mvid);

        let module = if self.diagnostics.has_errors() {
            None
        } else {
            Some(AssembledModule {
                tables: self.tables,
                bodies,
                entry_point,
                debug_lines,
            })
        };
        AssemblyOutput {
            module,
            diagnostics: self.diagnostics,
        }
    }

    /// Reports every symbol that was referenced but never defined, once per symbol with all
    /// of its mention sites.
    fn report_undefined(&self) {
        for missing in self.definitions.check_for_undefined() {
            let category = match missing.kind {
                SymbolKind::Type => DiagnosticCategory::Type,
                SymbolKind::Method | SymbolKind::EntryPoint => DiagnosticCategory::Method,
                SymbolKind::Field | SymbolKind::DataLabel => DiagnosticCategory::Field,
                SymbolKind::Event | SymbolKind::Property => DiagnosticCategory::Member,
            };
            self.report(category, &missing.to_error(), &missing.locations);
        }
    }

    /// Reserves one TypeDef row per defined type in definition order, so that headers may
    /// refer to types whose own resolution has not run yet.
    fn reserve_type_defs(&mut self) {
        for index in self.definitions.types.definition_order().to_vec() {
            let token = self.tables.reserve_type_def();
            if let Some(node) = self.definitions.types.node_mut(index) {
                node.token = Some(token);
            }
        }
    }

    /// Resolve pass over every type definition.
    fn resolve_types(&mut self) {
        for index in self.definitions.types.definition_order().to_vec() {
            self.resolve_type_def(index);
        }
    }

    /// Resolves the type at `index` and fills its TypeDef row; returns whether it succeeded.
    fn resolve_type_def(&mut self, index: usize) -> bool {
        let Some(node) = self.definitions.types.node_mut(index) else {
            return false;
        };
        if node.lifecycle.is_resolved() {
            return !node.lifecycle.has_failed();
        }
        if let Err(error) = node.lifecycle.begin_resolve(&node.full_name) {
            let location = node.location.clone();
            self.report(DiagnosticCategory::Type, &error, location.as_slice());
            return false;
        }

        let enclosing = node.enclosing.clone();
        let parent = node.parent;
        let interfaces = node.interfaces.clone();
        let constraints: Vec<TypeRefId> = node
            .generic_params
            .iter()
            .flat_map(|param| param.constraints.iter().copied())
            .collect();
        let location = node.location.clone();

        let extends = match self.resolve_header(enclosing.as_deref(), parent, &interfaces, &constraints) {
            Ok(extends) => extends,
            Err(error) => {
                if let Some(error) = error {
                    self.report_resolution(DiagnosticCategory::Type, &error, location.as_ref());
                }
                if let Some(node) = self.definitions.types.node_mut(index) {
                    node.lifecycle.fail();
                }
                return false;
            }
        };

        let Some(node) = self.definitions.types.node_mut(index) else {
            return false;
        };
        node.lifecycle.finish_resolve();
        let token = node.token;
        let flags = node.flags;
        let name = node.name.clone();
        let namespace = node.namespace.clone();

        let name = self.tables.strings.intern(&name);
        let namespace = self.tables.strings.intern(&namespace);
        if let Some(row) = token.and_then(|token| self.tables.type_def_mut(token)) {
            row.flags = flags.bits();
            row.name = name;
            row.namespace = namespace;
            row.extends = if flags.contains(TypeAttributes::INTERFACE) {
                Token::default()
            } else {
                extends.unwrap_or_default()
            };
        }
        true
    }

    /// Resolves what a type header depends on. `Err(None)` means a dependency failed and
    /// already reported why.
    fn resolve_header(
        &mut self,
        enclosing: Option<&str>,
        parent: Option<TypeRefId>,
        interfaces: &[TypeRefId],
        constraints: &[TypeRefId],
    ) -> std::result::Result<Option<Token>, Option<Error>> {
        if let Some(enclosing) = enclosing {
            let outer = self
                .definitions
                .types
                .index_of(enclosing)
                .filter(|outer| self.definitions.types.is_defined(*outer))
                .ok_or_else(|| {
                    Some(Error::UndefinedSymbol {
                        kind: SymbolKind::Type,
                        name: enclosing.to_string(),
                    })
                })?;
            if !self.resolve_type_def(outer) {
                return Err(None);
            }
        }

        let extends = match parent {
            Some(parent) => Some(self.resolve_dependency(parent)?),
            None => None,
        };
        for interface in interfaces {
            self.resolve_dependency(*interface)?;
        }
        for constraint in constraints {
            self.type_token(*constraint).map_err(Some)?;
        }
        Ok(extends)
    }

    /// Token of a type the header of another type depends on. Local types (and instantiations
    /// of local generic types) are resolved first, which is where cycles are detected.
    fn resolve_dependency(&mut self, ty: TypeRefId) -> std::result::Result<Token, Option<Error>> {
        if let Some(index) = self.local_definition(ty) {
            if !self.resolve_type_def(index) {
                return Err(None);
            }
        }
        self.type_token(ty).map_err(Some)
    }

    /// Index of the local definition behind `ty`, looking through generic instantiations.
    fn local_definition(&self, ty: TypeRefId) -> Option<usize> {
        let full_name = match self.types.kind(ty) {
            TypeRefKind::Local { full_name } => full_name,
            TypeRefKind::GenericInstantiation { definition, .. } => {
                match self.types.kind(*definition) {
                    TypeRefKind::Local { full_name } => full_name,
                    _ => return None,
                }
            }
            _ => return None,
        };
        self.definitions
            .types
            .index_of(full_name)
            .filter(|index| self.definitions.types.is_defined(*index))
    }

    fn live_type(&self, index: usize) -> bool {
        self.definitions
            .types
            .node(index)
            .is_some_and(|node| node.lifecycle.is_resolved() && !node.lifecycle.has_failed())
    }

    /// Allocates Field, MethodDef and Param rows type by type and sets each TypeDef's
    /// field and method lists.
    ///
    /// Failed types still get their list columns so the list ranges stay contiguous, but
    /// none of their members.
    fn allocate_members(&mut self) {
        for index in self.definitions.types.definition_order().to_vec() {
            let field_list = self.tables.field.len() as u32 + 1;
            let method_list = self.tables.method_def.len() as u32 + 1;
            let Some(node) = self.definitions.types.node(index) else {
                continue;
            };
            if let Some(row) = node.token.and_then(|token| self.tables.type_def_mut(token)) {
                row.field_list = field_list;
                row.method_list = method_list;
            }
            if !self.live_type(index) {
                continue;
            }

            let fields = node.fields.definition_order().to_vec();
            let methods = node.methods.definition_order().to_vec();
            for field in fields {
                self.allocate_field(index, field);
            }
            for method in methods {
                self.allocate_method(index, method);
            }
        }
    }

    /// Encodes the signature of one field and appends its Field row.
    fn allocate_field(&mut self, type_index: usize, field_index: usize) {
        let Some(field) = self
            .definitions
            .types
            .node(type_index)
            .and_then(|ty| ty.fields.node(field_index))
        else {
            return;
        };
        let name = field.name.clone();
        let field_type = field.field_type;
        let location = field.location.clone();
        let mut flags = field.flags;
        if field.constant.is_some() {
            flags |= FieldAttributes::HAS_DEFAULT;
        }
        if field.data_label.is_some() {
            flags |= FieldAttributes::HAS_FIELD_RVA;
        }

        let outcome = self.field_signature_blob(field_type).map(|blob| {
            let row = FieldRow {
                flags: flags.bits(),
                name: self.tables.strings.intern(&name),
                signature: self.tables.blobs.intern(&blob),
            };
            self.tables.add_field(row)
        });
        if let Err(error) = &outcome {
            self.report_resolution(DiagnosticCategory::Field, error, location.as_ref());
        }

        if let Some(field) = self
            .definitions
            .types
            .node_mut(type_index)
            .and_then(|ty| ty.fields.node_mut(field_index))
        {
            match outcome {
                Ok(token) => {
                    field.token = Some(token);
                    field.lifecycle.finish_resolve();
                }
                Err(_) => field.lifecycle.fail(),
            }
        }
    }

    /// Encodes the signature of one method and appends its MethodDef row plus Param rows
    /// for named or decorated parameters.
    fn allocate_method(&mut self, type_index: usize, method_index: usize) {
        let Some(owner) = self.definitions.types.node(type_index) else {
            return;
        };
        let Some(method) = owner.methods.node(method_index) else {
            return;
        };
        let owner_name = owner.full_name.clone();
        let key = method.key(&self.types);
        let signature = method.signature();
        let flags = method.flags;
        let impl_flags = method.impl_flags;
        let params = method.params.clone();
        let location = method.location.clone();
        let return_param = method.return_param;

        let blob = match self.method_signature_blob(&signature) {
            Ok(blob) => blob,
            Err(error) => {
                self.report_resolution(DiagnosticCategory::Method, &error, location.as_ref());
                if let Some(method) = self.method_node_mut(type_index, method_index) {
                    method.lifecycle.fail();
                }
                return;
            }
        };

        let row = MethodDefRow {
            impl_flags: impl_flags.bits(),
            flags: flags.bits(),
            name: self.tables.strings.intern(&signature.name),
            signature: self.tables.blobs.intern(&blob),
            param_list: self.tables.param.len() as u32 + 1,
        };
        let token = self.tables.add_method_def(row);

        if !return_param.is_empty() || self.has_param_attributes(&owner_name, &key, 0) {
            let row = ParamRow {
                flags: return_param.bits(),
                sequence: 0,
                name: 0,
            };
            let param = self.tables.add_param(row);
            self.param_tokens.insert((token, 0), param);
        }
        for (position, param) in params.iter().enumerate() {
            let sequence = position as u16 + 1;
            let mut flags = param.flags;
            if param.default.is_some() {
                flags |= ParamAttributes::HAS_DEFAULT;
            }
            let row = ParamRow {
                flags: flags.bits(),
                sequence,
                name: param
                    .name
                    .as_deref()
                    .map_or(0, |name| self.tables.strings.intern(name)),
            };
            let param = self.tables.add_param(row);
            self.param_tokens.insert((token, sequence), param);
        }

        if let Some(method) = self.method_node_mut(type_index, method_index) {
            method.token = Some(token);
            method.lifecycle.finish_resolve();
        }
    }

    fn method_node_mut(
        &mut self,
        type_index: usize,
        method_index: usize,
    ) -> Option<&mut crate::definitions::MethodDefinition> {
        self.definitions
            .types
            .node_mut(type_index)?
            .methods
            .node_mut(method_index)
    }

    fn has_param_attributes(&self, owner_name: &str, key: &str, position: u16) -> bool {
        self.definitions.attributes.iter().any(|attribute| {
            matches!(
                &attribute.target,
                AttributeTarget::Param { owner, method, sequence }
                    if owner == owner_name && method == key && *sequence == position
            )
        })
    }

    /// Emits GenericParam rows in TypeOrMethodDef coded index order, each followed by the
    /// GenericParamConstraint rows of its constraints.
    fn emit_generic_params(&mut self) {
        let mut owners: Vec<(u32, Token, GenericParameters)> = Vec::new();
        for (index, _, entry) in self.definitions.types.iter() {
            let ty = entry.node();
            if !entry.is_defined() || !self.live_type(index) {
                continue;
            }
            if let Some(token) = ty.token.filter(|_| !ty.generic_params.is_empty()) {
                owners.push((token.row() << 1, token, ty.generic_params.clone()));
            }
            for (_, _, method) in ty.methods.iter() {
                let method = method.node();
                if let Some(token) = method.token.filter(|_| !method.generic_params.is_empty()) {
                    owners.push(((token.row() << 1) | 1, token, method.generic_params.clone()));
                }
            }
        }
        // TypeOrMethodDef coded index order
        owners.sort_by_key(|(coded, _, _)| *coded);

        for (_, owner, params) in owners {
            for (number, param) in params.iter().enumerate() {
                let row = GenericParamRow {
                    number: number as u16,
                    flags: param.flags.bits(),
                    owner,
                    name: self.tables.strings.intern(&param.name),
                };
                let token = self.tables.add_generic_param(row);
                self.generic_param_tokens.insert((owner, number as u32), token);

                for constraint in &param.constraints {
                    match self.type_token(*constraint) {
                        Ok(constraint) => {
                            self.tables
                                .add_generic_param_constraint(GenericParamConstraintRow {
                                    owner: token,
                                    constraint,
                                });
                        }
                        Err(error) => {
                            self.report_resolution(DiagnosticCategory::Generic, &error, None);
                        }
                    }
                }
            }
        }
    }

    /// Define pass of one resolved type.
    ///
    /// Adds the InterfaceImpl, NestedClass and ClassLayout rows, then defines fields,
    /// methods (finalizing their bodies into `bodies`), events and properties, and last
    /// the MethodImpl rows of its `.override`s. Types whose Resolve pass failed are skipped.
    fn define_type(
        &mut self,
        index: usize,
        bodies: &mut Vec<MethodBody>,
        debug_lines: &mut Vec<(Token, Vec<(u32, u32)>)>,
    ) {
        if !self.live_type(index) {
            return;
        }
        let Some(node) = self.definitions.types.node_mut(index) else {
            return;
        };
        if let Err(error) = node.lifecycle.mark_defined(&node.full_name) {
            let location = node.location.clone();
            self.report(DiagnosticCategory::Type, &error, location.as_slice());
            return;
        }
        let Some(token) = node.token else {
            return;
        };
        let location = node.location.clone();
        let interfaces = node.interfaces.clone();
        let enclosing = node.enclosing.clone();
        let layout = node.layout;
        let in_interface = node.is_interface();
        let overrides = node.overrides.clone();
        let fields = node.fields.definition_order().to_vec();
        let methods = node.methods.definition_order().to_vec();

        for interface in interfaces {
            match self.type_token(interface) {
                Ok(interface) => {
                    self.tables.add_interface_impl(InterfaceImplRow {
                        class: token,
                        interface,
                    });
                }
                Err(error) => {
                    self.report_resolution(DiagnosticCategory::Type, &error, location.as_ref());
                }
            }
        }
        if let Some(enclosing) = enclosing {
            match self.type_def_token(&enclosing) {
                Ok(enclosing_class) => {
                    self.tables.add_nested_class(NestedClassRow {
                        nested_class: token,
                        enclosing_class,
                    });
                }
                Err(error) => {
                    self.report_resolution(DiagnosticCategory::Type, &error, location.as_ref());
                }
            }
        }
        if let Some(layout) = layout {
            self.tables.add_class_layout(ClassLayoutRow {
                packing_size: layout.packing_size,
                class_size: layout.class_size,
                parent: token,
            });
        }

        for field in fields {
            self.define_field(index, field);
        }
        let scope = self.type_scope(index);
        for method in methods {
            self.define_method(index, method, in_interface, &scope, bodies, debug_lines);
        }
        self.define_events(index, token);
        self.define_properties(index, token);

        for method_override in overrides {
            let implementation = self
                .method_def_token(method_override.body)
                .and_then(|body| Ok((body, self.member_token(method_override.declaration)?)));
            match implementation {
                Ok((body, declaration)) => {
                    self.tables.add_method_impl(MethodImplRow {
                        class: token,
                        body,
                        declaration,
                    });
                }
                Err(error) => {
                    self.report_resolution(DiagnosticCategory::Method, &error, location.as_ref());
                }
            }
        }
    }

    /// Constant, FieldLayout and FieldRVA rows of one field.
    fn define_field(&mut self, type_index: usize, field_index: usize) {
        let Some(field) = self
            .definitions
            .types
            .node_mut(type_index)
            .and_then(|ty| ty.fields.node_mut(field_index))
        else {
            return;
        };
        let Some(token) = field.token else {
            return;
        };
        if let Err(error) = field.lifecycle.mark_defined(&field.name) {
            let location = field.location.clone();
            self.report(DiagnosticCategory::Field, &error, location.as_slice());
            return;
        }
        let constant = field.constant.clone();
        let offset = field.offset;
        let data_label = field.data_label.clone();

        if let Some(constant) = constant {
            let value = self.tables.blobs.intern(&constant.to_bytes());
            self.tables.add_constant(ConstantRow {
                element_type: constant.element_type(),
                parent: token,
                value,
            });
        }
        if let Some(offset) = offset {
            self.tables.add_field_layout(FieldLayoutRow {
                offset,
                field: token,
            });
        }
        if let Some(label) = data_label {
            let labels = &self.definitions.data_labels;
            let data = labels
                .index_of(&label)
                .filter(|index| labels.is_defined(*index))
                .and_then(|index| labels.node(index))
                .map(|label| label.data.clone());
            // undefined labels were reported by the undefined check
            if let Some(data) = data {
                self.tables.add_field_rva(token, data);
            }
        }
    }

    /// Define pass of one method.
    ///
    /// Checks the body against the method's kind, completes or rejects an empty body per
    /// the configuration, finalizes the instruction stream and adds the Constant rows of
    /// parameter defaults and the ImplMap row of a P/Invoke method. A body that fails to
    /// finalize is reported and left out of `bodies`.
    fn define_method(
        &mut self,
        type_index: usize,
        method_index: usize,
        in_interface: bool,
        type_scope: &GenericScope,
        bodies: &mut Vec<MethodBody>,
        debug_lines: &mut Vec<(Token, Vec<(u32, u32)>)>,
    ) {
        let default_max_stack = self.config.default_max_stack;
        let Some(owner_name) = self
            .definitions
            .types
            .node(type_index)
            .map(|ty| ty.full_name.clone())
        else {
            return;
        };
        let Some(method) = self.method_node_mut(type_index, method_index) else {
            return;
        };
        let Some(token) = method.token else {
            return;
        };
        if let Err(error) = method.lifecycle.mark_defined(&method.name) {
            let location = method.location.clone();
            self.report(DiagnosticCategory::Method, &error, location.as_slice());
            return;
        }

        let name = method.name.clone();
        let location = method.location.clone();
        let checked = method.check_body(in_interface);
        let needs_body = method.needs_body(in_interface);
        let mut body = std::mem::take(&mut method.body);
        let layout = method.body_layout(default_max_stack);
        let scope = type_scope.clone().with_method(&method.generic_params);
        let defaults: Vec<_> = method
            .params
            .iter()
            .enumerate()
            .filter_map(|(position, param)| {
                param
                    .default
                    .clone()
                    .map(|value| (position as u16 + 1, value))
            })
            .collect();
        let pinvoke = method.pinvoke.clone();

        let qualified = if owner_name == crate::definitions::MODULE_TYPE {
            name.clone()
        } else {
            format!("{owner_name}::{name}")
        };

        if let Err(error) = checked {
            self.report(DiagnosticCategory::Method, &error, location.as_slice());
        } else if needs_body {
            let mut complete = true;
            if body.is_empty() {
                if self.config.auto_complete_empty_bodies {
                    self.diagnostics.warning(
                        DiagnosticCategory::Body,
                        format!("method {qualified} has no body; ret added"),
                    );
                    if let Err(error) = body.emit("ret", Operand::None) {
                        self.report(DiagnosticCategory::Method, &error, location.as_slice());
                        complete = false;
                    }
                } else {
                    let error = Error::MalformedBody(format!("method {qualified} has no body"));
                    self.report(DiagnosticCategory::Method, &error, location.as_slice());
                    complete = false;
                }
            }

            if complete {
                let finalized = {
                    let mut resolver = BodyResolver::new(self, &scope);
                    finalize_body(&body, &layout, &mut resolver)
                };
                let locals = self.locals_signature(body.locals(), &scope);
                match finalized.and_then(|finalized| Ok((finalized, locals?))) {
                    Ok((finalized, local_var_sig)) => {
                        if self.config.debug_lines && !finalized.lines.is_empty() {
                            debug_lines.push((token, finalized.lines));
                        }
                        bodies.push(MethodBody {
                            method: token,
                            code: finalized.code,
                            max_stack: finalized.max_stack,
                            local_var_sig,
                            init_locals: body.init_locals(),
                            exception_clauses: finalized.clauses,
                            labels: finalized.labels,
                        });
                    }
                    Err(error) => {
                        self.report_resolution(
                            DiagnosticCategory::Method,
                            &error,
                            location.as_ref(),
                        );
                    }
                }
            }
        }

        for (sequence, value) in defaults {
            if let Some(param) = self.param_tokens.get(&(token, sequence)).copied() {
                let blob = self.tables.blobs.intern(&value.to_bytes());
                self.tables.add_constant(ConstantRow {
                    element_type: value.element_type(),
                    parent: param,
                    value: blob,
                });
            }
        }

        if let Some(pinvoke) = pinvoke {
            let import_scope = self.externs.declare_module(&mut self.tables, &pinvoke.module);
            let import_name = self
                .tables
                .strings
                .intern(pinvoke.entry_point.as_deref().unwrap_or(&name));
            self.tables.add_impl_map(ImplMapRow {
                flags: pinvoke.flags.bits(),
                member_forwarded: token,
                import_name,
                import_scope,
            });
        }
    }

    /// EventMap, Event and MethodSemantics rows for the events of `owner`.
    fn define_events(&mut self, type_index: usize, owner: Token) {
        let Some(events) = self
            .definitions
            .types
            .node(type_index)
            .map(|ty| ty.events.definition_order().to_vec())
        else {
            return;
        };
        if events.is_empty() {
            return;
        }
        self.tables.add_event_map(EventMapRow {
            parent: owner,
            event_list: self.tables.event.len() as u32 + 1,
        });

        for event_index in events {
            let Some(event) = self
                .definitions
                .types
                .node(type_index)
                .and_then(|ty| ty.events.node(event_index))
            else {
                continue;
            };
            let name = event.name.clone();
            let flags = event.flags;
            let event_type = event.event_type;
            let accessors = event.accessors();
            let location = event.location.clone();

            let event_type = match event_type.map(|ty| self.type_token(ty)).transpose() {
                Ok(event_type) => event_type.unwrap_or_default(),
                Err(error) => {
                    self.report_resolution(DiagnosticCategory::Member, &error, location.as_ref());
                    Token::default()
                }
            };
            let row = EventRow {
                flags: flags.bits(),
                name: self.tables.strings.intern(&name),
                event_type,
            };
            let token = self.tables.add_event(row);
            if let Some(event) = self
                .definitions
                .types
                .node_mut(type_index)
                .and_then(|ty| ty.events.node_mut(event_index))
            {
                event.token = Some(token);
                event.lifecycle.finish_resolve();
                if let Err(error) = event.lifecycle.mark_defined(&name) {
                    self.report(DiagnosticCategory::Member, &error, location.as_slice());
                }
            }
            self.add_semantics(token, &accessors, location.as_ref());
        }
    }

    /// PropertyMap, Property, Constant and MethodSemantics rows for the properties of
    /// `owner`.
    fn define_properties(&mut self, type_index: usize, owner: Token) {
        let Some(properties) = self
            .definitions
            .types
            .node(type_index)
            .map(|ty| ty.properties.definition_order().to_vec())
        else {
            return;
        };
        if properties.is_empty() {
            return;
        }
        self.tables.add_property_map(PropertyMapRow {
            parent: owner,
            property_list: self.tables.property.len() as u32 + 1,
        });

        for property_index in properties {
            let Some(property) = self
                .definitions
                .types
                .node(type_index)
                .and_then(|ty| ty.properties.node(property_index))
            else {
                continue;
            };
            let name = property.name.clone();
            let mut flags = property.flags;
            let has_this = property.has_this;
            let property_type = property.property_type;
            let params = property.params.clone();
            let constant = property.constant.clone();
            let accessors = property.accessors();
            let location = property.location.clone();
            if constant.is_some() {
                flags |= PropertyAttributes::HAS_DEFAULT;
            }

            let signature = match self.property_signature_blob(has_this, property_type, &params) {
                Ok(signature) => self.tables.blobs.intern(&signature),
                Err(error) => {
                    self.report_resolution(DiagnosticCategory::Member, &error, location.as_ref());
                    0
                }
            };
            let row = PropertyRow {
                flags: flags.bits(),
                name: self.tables.strings.intern(&name),
                signature,
            };
            let token = self.tables.add_property(row);
            if let Some(constant) = constant {
                let value = self.tables.blobs.intern(&constant.to_bytes());
                self.tables.add_constant(ConstantRow {
                    element_type: constant.element_type(),
                    parent: token,
                    value,
                });
            }
            if let Some(property) = self
                .definitions
                .types
                .node_mut(type_index)
                .and_then(|ty| ty.properties.node_mut(property_index))
            {
                property.token = Some(token);
                property.lifecycle.finish_resolve();
                if let Err(error) = property.lifecycle.mark_defined(&name) {
                    self.report(DiagnosticCategory::Member, &error, location.as_slice());
                }
            }
            self.add_semantics(token, &accessors, location.as_ref());
        }
    }

    fn property_signature_blob(
        &mut self,
        has_this: bool,
        property_type: TypeRefId,
        params: &[TypeRefId],
    ) -> Result<Vec<u8>> {
        let signature = SignatureProperty {
            has_this,
            modifiers: Vec::new(),
            base: self.resolve_type(property_type)?,
            params: params
                .iter()
                .map(|ty| self.resolve_type(*ty).map(SignatureParameter::from))
                .collect::<Result<Vec<_>>>()?,
        };
        encode_property_signature(&signature)
    }

    /// Links each accessor to `association`; accessors must be methods of local types.
    fn add_semantics(
        &mut self,
        association: Token,
        accessors: &[(MethodSemanticsAttributes, MemberRefId)],
        location: Option<&Location>,
    ) {
        for (semantics, method) in accessors {
            match self.method_def_token(*method) {
                Ok(method) => {
                    self.tables.add_method_semantics(MethodSemanticsRow {
                        semantics: semantics.bits(),
                        method,
                        association,
                    });
                }
                Err(error) => {
                    self.report_resolution(DiagnosticCategory::Member, &error, location);
                }
            }
        }
    }

    /// Token of the entity an attribute or security declaration is attached to.
    fn target_token(&self, target: &AttributeTarget) -> Result<Token> {
        match target {
            AttributeTarget::Assembly => {
                if self.tables.assembly.is_empty() {
                    Err(Error::InvalidReference(
                        "no .assembly manifest to attach to".to_string(),
                    ))
                } else {
                    Ok(Token::from_parts(TableId::Assembly, 1))
                }
            }
            AttributeTarget::Module => Ok(Token::from_parts(TableId::Module, 1)),
            AttributeTarget::Type(name) => self.type_def_token(name),
            AttributeTarget::Method { owner, key } => {
                self.local_member(owner, key, |ty| &ty.methods, |m| m.token)
            }
            AttributeTarget::Field { owner, key } => {
                self.local_member(owner, key, |ty| &ty.fields, |f| f.token)
            }
            AttributeTarget::Event { owner, name } => {
                self.local_member(owner, name, |ty| &ty.events, |e| e.token)
            }
            AttributeTarget::Property { owner, key } => {
                self.local_member(owner, key, |ty| &ty.properties, |p| p.token)
            }
            AttributeTarget::Param {
                owner,
                method,
                sequence,
            } => {
                let method = self.local_member(owner, method, |ty| &ty.methods, |m| m.token)?;
                self.param_tokens
                    .get(&(method, *sequence))
                    .copied()
                    .ok_or_else(|| Error::InvalidReference(format!("{target} has no parameter row")))
            }
            AttributeTarget::GenericParam {
                owner,
                method,
                index,
            } => {
                let owner_token = match method {
                    Some(method) => {
                        self.local_member(owner, method, |ty| &ty.methods, |m| m.token)?
                    }
                    None => self.type_def_token(owner)?,
                };
                self.generic_param_tokens
                    .get(&(owner_token, *index))
                    .copied()
                    .ok_or_else(|| {
                        Error::InvalidReference(format!("{target} is not a generic parameter"))
                    })
            }
        }
    }

    /// Adds a CustomAttribute row per `.custom` whose target and constructor resolve.
    ///
    /// The constructor must resolve to a MethodDef or MemberRef; the blob is stored as given.
    fn emit_custom_attributes(&mut self) {
        let attributes = std::mem::take(&mut self.definitions.attributes);
        for attribute in &attributes {
            let location = attribute.location.as_ref();
            // an unknown target is never covered by the undefined check
            let parent = match self.target_token(&attribute.target) {
                Ok(parent) => parent,
                Err(error) => {
                    self.report(
                        DiagnosticCategory::Attribute,
                        &error,
                        attribute.location.as_slice(),
                    );
                    continue;
                }
            };
            let constructor = match self.member_token(attribute.constructor) {
                Ok(constructor)
                    if constructor.is_table(TableId::MethodDef)
                        || constructor.is_table(TableId::MemberRef) =>
                {
                    constructor
                }
                Ok(_) => {
                    let error = Error::InvalidReference(format!(
                        "attribute constructor {} is not a method",
                        self.members.get(attribute.constructor).key()
                    ));
                    self.report_resolution(DiagnosticCategory::Attribute, &error, location);
                    continue;
                }
                Err(error) => {
                    self.report_resolution(DiagnosticCategory::Attribute, &error, location);
                    continue;
                }
            };
            let value = self.tables.blobs.intern(&attribute.value);
            self.tables.add_custom_attribute(CustomAttributeRow {
                parent,
                constructor,
                value,
            });
        }
        self.definitions.attributes = attributes;
    }

    /// Adds DeclSecurity rows and sets `HasSecurity` on the owning type or method.
    ///
    /// Only the assembly, types and methods may carry permission sets.
    fn emit_security(&mut self) {
        let declarations = std::mem::take(&mut self.definitions.security);
        for declaration in &declarations {
            let location = declaration.location.as_slice();
            let parent = match self.target_token(&declaration.target) {
                Ok(parent)
                    if parent.is_table(TableId::TypeDef)
                        || parent.is_table(TableId::MethodDef)
                        || parent.is_table(TableId::Assembly) =>
                {
                    parent
                }
                Ok(_) => {
                    let error = Error::InvalidReference(format!(
                        "{} cannot carry a permission set",
                        declaration.target
                    ));
                    self.report(DiagnosticCategory::Attribute, &error, location);
                    continue;
                }
                Err(error) => {
                    self.report(DiagnosticCategory::Attribute, &error, location);
                    continue;
                }
            };

            if let Some(row) = self.tables.type_def_mut(parent) {
                row.flags |= TypeAttributes::HAS_SECURITY.bits();
            } else if parent.is_table(TableId::MethodDef) {
                let row = parent.row().checked_sub(1);
                if let Some(row) = row.and_then(|row| self.tables.method_def.get_mut(row as usize)) {
                    row.flags |= MethodAttributes::HAS_SECURITY.bits();
                }
            }
            let permission_set = self.tables.blobs.intern(&declaration.permission_set);
            self.tables.add_decl_security(DeclSecurityRow {
                action: declaration.action,
                parent,
                permission_set,
            });
        }
        self.definitions.security = declarations;
    }

    /// MethodDef token of the `.entrypoint` method, if it got a row.
    fn entry_point_token(&self) -> Option<Token> {
        let (owner, key) = self.definitions.entry_point.as_ref()?;
        self.definitions.type_def(*owner)?.methods.get(key)?.token
    }
}

/// Derives the module version id from the module name and the table sizes: the first 16
/// bytes of their SHA-1, so identical input yields an identical MVID.
fn module_version_id(name: &str, tables: &MetadataTables) -> uguid::Guid {
    let mut hasher = Sha1::new();
    hasher.update(name.as_bytes());
    for (table, count) in tables.row_counts() {
        hasher.update([table as u8]);
        hasher.update((count as u32).to_le_bytes());
    }
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uguid::Guid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mvid_is_deterministic() {
        let mut tables = MetadataTables::new();
        let first = module_version_id("a.dll", &tables);
        assert_eq!(first, module_version_id("a.dll", &tables));
        assert_ne!(first, module_version_id("b.dll", &tables));

        tables.reserve_type_def();
        assert_ne!(first, module_version_id("a.dll", &tables));
    }

    #[test]
    fn test_empty_context_yields_module_type_only() {
        let output = AssemblyContext::default().finish(None, None);
        let module = output.into_result().unwrap();

        assert_eq!(module.tables.type_def.len(), 1);
        assert_eq!(module.tables.strings.get(module.tables.type_def[0].name), Some("<Module>"));
        assert_eq!(module.tables.module.len(), 1);
        assert!(module.bodies.is_empty());
        assert_eq!(module.entry_point, None);
    }

    #[test]
    fn test_module_name_falls_back_to_assembly() {
        let output = AssemblyContext::default().finish(None, Some(AssemblyManifest::new("Hello")));
        let module = output.into_result().unwrap();
        let name = module.tables.module[0].name;
        assert_eq!(module.tables.strings.get(name), Some("Hello.dll"));
        assert_eq!(module.tables.assembly.len(), 1);
    }
}
