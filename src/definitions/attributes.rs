use std::fmt;

use crate::{diagnostics::Location, references::MemberRefId};

/// The entity a `.custom` or `.permissionset` directive is attached to.
///
/// Targets name their entity by the same keys the definition tables use, so an attribute
/// may be declared before the entity it decorates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeTarget {
    /// The `.assembly` manifest
    Assembly,
    /// The `.module`
    Module,
    /// A type, by full name (`Ns.Outer/Inner`)
    Type(String),
    /// A method, by owner full name and definition key
    Method {
        /// Owner type (`<Module>` for globals)
        owner: String,
        /// Definition key of the method
        key: String,
    },
    /// A field, by owner full name and definition key
    Field {
        /// Owner type (`<Module>` for globals)
        owner: String,
        /// Definition key of the field
        key: String,
    },
    /// A parameter; sequence 0 is the return value
    Param {
        /// Owner type of the method
        owner: String,
        /// Definition key of the method
        method: String,
        /// 1-based parameter position, 0 for the return value
        sequence: u16,
    },
    /// An event, by owner and name
    Event {
        /// Owner type
        owner: String,
        /// Event name
        name: String,
    },
    /// A property, by owner and key
    Property {
        /// Owner type
        owner: String,
        /// Property key (`type name(params)`)
        key: String,
    },
    /// A generic parameter of a type, or of a method when `method` is set
    GenericParam {
        /// Owner type
        owner: String,
        /// Definition key of the owning method
        method: Option<String>,
        /// Parameter index
        index: u32,
    },
}

impl fmt::Display for AttributeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeTarget::Assembly => f.write_str(".assembly"),
            AttributeTarget::Module => f.write_str(".module"),
            AttributeTarget::Type(name) => f.write_str(name),
            AttributeTarget::Method { owner, key }
            | AttributeTarget::Field { owner, key }
            | AttributeTarget::Property { owner, key } => write!(f, "{owner}::{key}"),
            AttributeTarget::Param {
                owner,
                method,
                sequence,
            } => write!(f, "{owner}::{method} [{sequence}]"),
            AttributeTarget::Event { owner, name } => write!(f, "{owner}::{name}"),
            AttributeTarget::GenericParam {
                owner,
                method: Some(method),
                index,
            } => write!(f, "{owner}::{method} !!{index}"),
            AttributeTarget::GenericParam {
                owner,
                method: None,
                index,
            } => write!(f, "{owner} !{index}"),
        }
    }
}

/// A `.custom` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAttribute {
    /// Decorated entity
    pub target: AttributeTarget,
    /// Attribute constructor
    pub constructor: MemberRefId,
    /// Serialized constructor arguments and named arguments
    pub value: Vec<u8>,
    /// Source position of the directive
    pub location: Option<Location>,
}

/// A `.permissionset` directive; only assemblies, types and methods may carry one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDeclaration {
    /// Decorated entity
    pub target: AttributeTarget,
    /// Security action code, see [`crate::metadata::flags::SecurityAction`]
    pub action: u16,
    /// Serialized permission set
    pub permission_set: Vec<u8>,
    /// Source position of the directive
    pub location: Option<Location>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display() {
        assert_eq!(AttributeTarget::Type("Ns.Foo".into()).to_string(), "Ns.Foo");
        assert_eq!(
            AttributeTarget::Param {
                owner: "Foo".into(),
                method: "void M(int32)".into(),
                sequence: 1
            }
            .to_string(),
            "Foo::void M(int32) [1]"
        );
        assert_eq!(
            AttributeTarget::GenericParam {
                owner: "Foo`1".into(),
                method: None,
                index: 0
            }
            .to_string(),
            "Foo`1 !0"
        );
    }
}
