//! Attribute bitmasks for the definitions the assembler emits (ECMA-335 II.23.1).
//!
//! Only the bits the assembler inspects or sets carry named constants; every set is
//! created with `from_bits_retain` so that flags written by the front end survive
//! unchanged into the emitted rows.

use bitflags::bitflags;

bitflags! {
    /// `TypeAttributes` (II.23.1.15)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeAttributes: u32 {
        /// Visibility mask
        const VISIBILITY_MASK = 0x0000_0007;
        /// Type is public
        const PUBLIC = 0x0000_0001;
        /// Nested type with public visibility
        const NESTED_PUBLIC = 0x0000_0002;
        /// Nested type with private visibility
        const NESTED_PRIVATE = 0x0000_0003;
        /// Fields are laid out sequentially
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Fields carry explicit offsets
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type is abstract
        const ABSTRACT = 0x0000_0080;
        /// Type is sealed
        const SEALED = 0x0000_0100;
        /// Name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// Type is imported
        const IMPORT = 0x0000_1000;
        /// Type is serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Type has declarative security
        const HAS_SECURITY = 0x0004_0000;
        /// Initialize the type before first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x0000_0800;
    }
}

bitflags! {
    /// `MethodAttributes` (II.23.1.10)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodAttributes: u16 {
        /// Member access mask
        const MEMBER_ACCESS_MASK = 0x0007;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by everyone
        const PUBLIC = 0x0006;
        /// Method is static
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new vtable slot
        const NEW_SLOT = 0x0100;
        /// Method is abstract
        const ABSTRACT = 0x0400;
        /// Name is special
        const SPECIAL_NAME = 0x0800;
        /// Implementation is forwarded through P/Invoke
        const PINVOKE_IMPL = 0x2000;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x1000;
        /// Method has declarative security
        const HAS_SECURITY = 0x4000;
    }
}

bitflags! {
    /// `MethodImplAttributes` (II.23.1.11)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodImplAttributes: u16 {
        /// Code type mask
        const CODE_TYPE_MASK = 0x0003;
        /// Method impl is native
        const NATIVE = 0x0001;
        /// Method impl is OPTIL
        const OPTIL = 0x0002;
        /// Method impl is provided by the runtime
        const RUNTIME = 0x0003;
        /// Method impl is unmanaged
        const UNMANAGED = 0x0004;
        /// Method cannot be inlined
        const NO_INLINING = 0x0008;
        /// Method signature is exported exactly as declared
        const PRESERVE_SIG = 0x0080;
        /// Method is implemented inside the runtime
        const INTERNAL_CALL = 0x1000;
        /// Method is single threaded through the body
        const SYNCHRONIZED = 0x0020;
    }
}

impl MethodImplAttributes {
    /// Checks whether the implementation is supplied outside of a CIL body.
    #[must_use]
    pub fn is_external(self) -> bool {
        let code_type = self.bits() & Self::CODE_TYPE_MASK.bits();
        code_type == Self::NATIVE.bits()
            || code_type == Self::RUNTIME.bits()
            || self.contains(Self::INTERNAL_CALL)
    }
}

bitflags! {
    /// `FieldAttributes` (II.23.1.5)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldAttributes: u16 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by everyone
        const PUBLIC = 0x0006;
        /// Field is static
        const STATIC = 0x0010;
        /// Field is initialized only
        const INIT_ONLY = 0x0020;
        /// Value is a compile time constant
        const LITERAL = 0x0040;
        /// Field has an RVA
        const HAS_FIELD_RVA = 0x0100;
        /// Field has a default value
        const HAS_DEFAULT = 0x8000;
        /// Field has marshalling information
        const HAS_FIELD_MARSHAL = 0x1000;
    }
}

bitflags! {
    /// `ParamAttributes` (II.23.1.13)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamAttributes: u16 {
        /// Parameter is `[in]`
        const IN = 0x0001;
        /// Parameter is `[out]`
        const OUT = 0x0002;
        /// Parameter is `[opt]`
        const OPTIONAL = 0x0010;
        /// Parameter has a default value
        const HAS_DEFAULT = 0x1000;
        /// Parameter has marshalling information
        const HAS_FIELD_MARSHAL = 0x2000;
    }
}

bitflags! {
    /// `GenericParamAttributes` (II.23.1.7)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GenericParamAttributes: u16 {
        /// Covariant (`+`)
        const COVARIANT = 0x0001;
        /// Contravariant (`-`)
        const CONTRAVARIANT = 0x0002;
        /// `class` constraint
        const REFERENCE_TYPE_CONSTRAINT = 0x0004;
        /// `valuetype` constraint
        const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT = 0x0008;
        /// `.ctor` constraint
        const DEFAULT_CONSTRUCTOR_CONSTRAINT = 0x0010;
    }
}

bitflags! {
    /// `EventAttributes` (II.23.1.4)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventAttributes: u16 {
        /// Name is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x0400;
    }
}

bitflags! {
    /// `PropertyAttributes` (II.23.1.14)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyAttributes: u16 {
        /// Name is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x0400;
        /// Property has a default value
        const HAS_DEFAULT = 0x1000;
    }
}

bitflags! {
    /// `MethodSemanticsAttributes` (II.23.1.12)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodSemanticsAttributes: u16 {
        /// Property setter
        const SETTER = 0x0001;
        /// Property getter
        const GETTER = 0x0002;
        /// Other accessor
        const OTHER = 0x0004;
        /// Event add accessor
        const ADD_ON = 0x0008;
        /// Event remove accessor
        const REMOVE_ON = 0x0010;
        /// Event raise accessor
        const FIRE = 0x0020;
    }
}

bitflags! {
    /// `PInvokeAttributes` (II.23.1.8)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PInvokeAttributes: u16 {
        /// Use the member name as specified
        const NO_MANGLE = 0x0001;
        /// Marshal strings as ANSI
        const CHAR_SET_ANSI = 0x0002;
        /// Marshal strings as Unicode
        const CHAR_SET_UNICODE = 0x0004;
        /// Marshal strings as auto
        const CHAR_SET_AUTO = 0x0006;
        /// Record the last Win32 error
        const SUPPORTS_LAST_ERROR = 0x0040;
        /// Platform default calling convention
        const CALL_CONV_WINAPI = 0x0100;
        /// `cdecl` calling convention
        const CALL_CONV_CDECL = 0x0200;
        /// `stdcall` calling convention
        const CALL_CONV_STDCALL = 0x0300;
    }
}

bitflags! {
    /// `AssemblyFlags` (II.23.1.2)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AssemblyFlags: u32 {
        /// The assembly reference holds the full public key
        const PUBLIC_KEY = 0x0001;
        /// Assembly is retargetable
        const RETARGETABLE = 0x0100;
        /// JIT tracking is enabled
        const ENABLE_JIT_COMPILE_TRACKING = 0x8000;
        /// JIT optimizer is disabled
        const DISABLE_JIT_COMPILE_OPTIMIZER = 0x4000;
    }
}

bitflags! {
    /// Exception handler clause kinds (II.25.4.6)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause
        const EXCEPTION = 0x0000;
        /// An exception filter and handler clause
        const FILTER = 0x0001;
        /// A finally clause
        const FINALLY = 0x0002;
        /// A fault clause (finally that executes only on exception)
        const FAULT = 0x0004;
    }
}

/// Declarative security action codes (II.22.11)
#[allow(non_snake_case, missing_docs)]
pub mod SecurityAction {
    pub const REQUEST: u16 = 0x0001;
    pub const DEMAND: u16 = 0x0002;
    pub const ASSERT: u16 = 0x0003;
    pub const DENY: u16 = 0x0004;
    pub const PERMIT_ONLY: u16 = 0x0005;
    pub const LINK_DEMAND: u16 = 0x0006;
    pub const INHERITANCE_DEMAND: u16 = 0x0007;
    pub const REQUEST_MINIMUM: u16 = 0x0008;
    pub const REQUEST_OPTIONAL: u16 = 0x0009;
    pub const REQUEST_REFUSE: u16 = 0x000A;
}
