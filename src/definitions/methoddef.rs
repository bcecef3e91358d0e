use crate::{
    body::{BodyLayout, InstructionStream},
    definitions::{ConstantValue, DefinitionNode, Lifecycle},
    diagnostics::Location,
    generics::GenericParameters,
    metadata::{
        flags::{MethodAttributes, MethodImplAttributes, PInvokeAttributes, ParamAttributes},
        token::Token,
    },
    references::{method_key, MethodRefSignature, TypeRefId, TypeReferences},
    Error, Result,
};

/// A declared parameter (or the return value).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDefinition {
    /// Name, if given
    pub name: Option<String>,
    /// `[in]`, `[out]`, `[opt]`
    pub flags: ParamAttributes,
    /// Parameter type
    pub param_type: TypeRefId,
    /// `= value` for optional parameters
    pub default: Option<ConstantValue>,
}

impl ParamDefinition {
    /// Creates an unnamed parameter.
    #[must_use]
    pub fn new(param_type: TypeRefId) -> Self {
        ParamDefinition {
            name: None,
            flags: ParamAttributes::empty(),
            param_type,
            default: None,
        }
    }

    /// Creates a named parameter.
    #[must_use]
    pub fn named(name: impl Into<String>, param_type: TypeRefId) -> Self {
        ParamDefinition {
            name: Some(name.into()),
            ..Self::new(param_type)
        }
    }

    /// Sets the attributes.
    #[must_use]
    pub fn with_flags(mut self, flags: ParamAttributes) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: ConstantValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Checks whether anything besides the type was declared.
    #[must_use]
    pub fn is_decorated(&self) -> bool {
        self.name.is_some() || !self.flags.is_empty() || self.default.is_some()
    }
}

/// `pinvokeimpl("module" as "entry" ...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PInvokeInfo {
    /// Native module name
    pub module: String,
    /// Entry point name; the method name when absent
    pub entry_point: Option<String>,
    /// Marshalling and calling convention flags
    pub flags: PInvokeAttributes,
}

/// A method declared on a type or at module scope.
#[derive(Debug, Clone)]
pub struct MethodDefinition {
    /// Method name
    pub name: String,
    /// Method attributes
    pub flags: MethodAttributes,
    /// Implementation attributes
    pub impl_flags: MethodImplAttributes,
    /// Return type
    pub return_type: TypeRefId,
    /// Attributes and default of the return value (sequence 0)
    pub return_param: ParamAttributes,
    /// Parameters in order
    pub params: Vec<ParamDefinition>,
    /// `explicit`
    pub explicit_this: bool,
    /// `vararg`
    pub vararg: bool,
    /// Method-level generic parameters
    pub generic_params: GenericParameters,
    /// Instructions, labels, locals and exception regions
    pub body: InstructionStream,
    /// Native import
    pub pinvoke: Option<PInvokeInfo>,
    /// `.entrypoint`
    pub entry_point: bool,
    /// Resolve/define state
    pub lifecycle: Lifecycle,
    /// MethodDef token, once the row is allocated
    pub token: Option<Token>,
    /// Defining occurrence
    pub location: Option<Location>,
}

impl MethodDefinition {
    /// Creates a private instance method without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, return_type: TypeRefId) -> Self {
        MethodDefinition {
            name: name.into(),
            flags: MethodAttributes::empty(),
            impl_flags: MethodImplAttributes::empty(),
            return_type,
            return_param: ParamAttributes::empty(),
            params: Vec::new(),
            explicit_this: false,
            vararg: false,
            generic_params: GenericParameters::new(),
            body: InstructionStream::new(),
            pinvoke: None,
            entry_point: false,
            lifecycle: Lifecycle::default(),
            token: None,
            location: None,
        }
    }

    /// A referenced-only node standing in for the method a mention points at.
    #[must_use]
    pub fn placeholder(signature: &MethodRefSignature) -> Self {
        let mut method = MethodDefinition::new(signature.name.clone(), signature.return_type);
        if !signature.has_this {
            method.flags |= MethodAttributes::STATIC;
        }
        method.params = signature
            .params
            .iter()
            .map(|ty| ParamDefinition::new(*ty))
            .collect();
        method.vararg = signature.vararg;
        method.explicit_this = signature.explicit_this;
        method
    }

    /// Sets the method attributes.
    #[must_use]
    pub fn with_flags(mut self, flags: MethodAttributes) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the implementation attributes.
    #[must_use]
    pub fn with_impl_flags(mut self, flags: MethodImplAttributes) -> Self {
        self.impl_flags = flags;
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn with_param(mut self, param: ParamDefinition) -> Self {
        self.params.push(param);
        self
    }

    /// Marks the method `vararg`.
    #[must_use]
    pub fn vararg(mut self) -> Self {
        self.vararg = true;
        self
    }

    /// Sets the method-level generic parameters.
    #[must_use]
    pub fn with_generic_params(mut self, params: GenericParameters) -> Self {
        self.generic_params = params;
        self
    }

    /// Declares the method as a native import.
    #[must_use]
    pub fn with_pinvoke(mut self, pinvoke: PInvokeInfo) -> Self {
        self.flags |= MethodAttributes::PINVOKE_IMPL;
        self.pinvoke = Some(pinvoke);
        self
    }

    /// Records the defining occurrence.
    #[must_use]
    pub fn at_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Checks whether the method is `static`.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodAttributes::STATIC)
    }

    /// Number of method-level generic parameters.
    #[must_use]
    pub fn generic_arity(&self) -> u32 {
        self.generic_params.len() as u32
    }

    /// Parameter types in order.
    #[must_use]
    pub fn param_types(&self) -> Vec<TypeRefId> {
        self.params.iter().map(|param| param.param_type).collect()
    }

    /// The key the method is registered under on its owner.
    #[must_use]
    pub fn key(&self, types: &TypeReferences) -> String {
        method_key(
            types,
            &self.name,
            self.return_type,
            &self.param_types(),
            self.generic_arity(),
            self.vararg,
            !self.is_static(),
        )
    }

    /// The declared signature, in the form a call site would mention it.
    #[must_use]
    pub fn signature(&self) -> MethodRefSignature {
        MethodRefSignature {
            name: self.name.clone(),
            return_type: self.return_type,
            params: self.param_types(),
            has_this: !self.is_static(),
            explicit_this: self.explicit_this,
            vararg: self.vararg,
            vararg_tail: Vec::new(),
            generic_arity: self.generic_arity(),
        }
    }

    /// What the body finalizer needs to know about the method.
    #[must_use]
    pub fn body_layout(&self, default_max_stack: u16) -> BodyLayout {
        BodyLayout {
            params: self.params.iter().map(|param| param.name.clone()).collect(),
            has_this: !self.is_static(),
            default_max_stack,
        }
    }

    /// Checks whether the method must carry a CIL body.
    ///
    /// Abstract methods, runtime/native/internal-call methods, P/Invoke imports and
    /// non-static interface methods have none.
    #[must_use]
    pub fn needs_body(&self, in_interface: bool) -> bool {
        !self.flags.contains(MethodAttributes::ABSTRACT)
            && !self.impl_flags.is_external()
            && !self.flags.contains(MethodAttributes::PINVOKE_IMPL)
            && !(in_interface && !self.is_static())
    }

    /// Rejects a body on a method that may not have one.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBody`] naming the rule that was broken.
    pub fn check_body(&self, in_interface: bool) -> Result<()> {
        if self.body.is_empty() {
            return Ok(());
        }
        let reason = if in_interface && !self.is_static() {
            "non-static interface method"
        } else if self.flags.contains(MethodAttributes::ABSTRACT) {
            "abstract method"
        } else if self.flags.contains(MethodAttributes::PINVOKE_IMPL) {
            "pinvoke method"
        } else if self.impl_flags.is_external() {
            "native, runtime or internal call method"
        } else {
            return Ok(());
        };
        Err(Error::MalformedBody(format!("{reason} {} has a body", self.name)))
    }
}

impl DefinitionNode for MethodDefinition {
    fn promote(&mut self, definition: Self) {
        *self = MethodDefinition {
            lifecycle: self.lifecycle,
            token: self.token,
            ..definition
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{body::Operand, references::PrimitiveType};

    fn void(types: &mut TypeReferences) -> TypeRefId {
        types.primitive(PrimitiveType::Void)
    }

    #[test]
    fn test_key_matches_reference_definition_key() {
        let mut types = TypeReferences::new();
        let void = void(&mut types);
        let int32 = types.primitive(PrimitiveType::I4);

        let method = MethodDefinition::new("M", void)
            .with_flags(MethodAttributes::STATIC)
            .with_param(ParamDefinition::named("a", int32))
            .vararg();
        let call_site =
            MethodRefSignature::new("M", void, vec![int32]).with_vararg_tail(vec![int32]);

        assert_eq!(method.key(&types), "void M(int32,...)");
        assert_eq!(method.key(&types), call_site.definition_key(&types));
    }

    #[test]
    fn test_instance_and_static_keys_differ() {
        let mut types = TypeReferences::new();
        let void = void(&mut types);

        let instance = MethodDefinition::new("M", void);
        let shared = MethodDefinition::new("M", void).with_flags(MethodAttributes::STATIC);
        assert_eq!(instance.key(&types), "instance void M()");
        assert_ne!(instance.key(&types), shared.key(&types));
        assert_eq!(
            instance.key(&types),
            MethodRefSignature::new("M", void, vec![]).instance().definition_key(&types)
        );
    }

    #[test]
    fn test_body_rules() {
        let mut types = TypeReferences::new();
        let void = void(&mut types);

        let mut abstract_method =
            MethodDefinition::new("A", void).with_flags(MethodAttributes::ABSTRACT);
        assert!(!abstract_method.needs_body(false));
        assert!(abstract_method.check_body(false).is_ok());
        abstract_method.body.emit("ret", Operand::None).unwrap();
        assert!(matches!(
            abstract_method.check_body(false),
            Err(Error::MalformedBody(_))
        ));

        let mut interface_method = MethodDefinition::new("I", void);
        interface_method.body.emit("ret", Operand::None).unwrap();
        assert!(interface_method.check_body(true).is_err());
        assert!(interface_method.check_body(false).is_ok());

        let static_interface_method =
            MethodDefinition::new("S", void).with_flags(MethodAttributes::STATIC);
        assert!(static_interface_method.needs_body(true));

        let runtime = MethodDefinition::new("Invoke", void)
            .with_impl_flags(MethodImplAttributes::RUNTIME);
        assert!(!runtime.needs_body(false));
    }

    #[test]
    fn test_layout_names_arguments() {
        let mut types = TypeReferences::new();
        let void = void(&mut types);
        let int32 = types.primitive(PrimitiveType::I4);
        let method = MethodDefinition::new("M", void)
            .with_param(ParamDefinition::named("x", int32))
            .with_param(ParamDefinition::new(int32));
        let layout = method.body_layout(8);
        assert!(layout.has_this);
        assert_eq!(layout.params, vec![Some("x".to_string()), None]);
    }
}
