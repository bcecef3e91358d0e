use crate::{
    definitions::{ConstantValue, DefinitionNode, Lifecycle},
    diagnostics::Location,
    metadata::{
        flags::{EventAttributes, MethodSemanticsAttributes, PropertyAttributes},
        token::Token,
    },
    references::{MemberRefId, TypeRefId, TypeReferences},
};

/// An `.event` with its accessor methods.
#[derive(Debug, Clone)]
pub struct EventDefinition {
    /// Event name
    pub name: String,
    /// Event attributes
    pub flags: EventAttributes,
    /// Delegate type of the event
    pub event_type: Option<TypeRefId>,
    /// `.addon`
    pub add_on: Option<MemberRefId>,
    /// `.removeon`
    pub remove_on: Option<MemberRefId>,
    /// `.fire`
    pub fire: Option<MemberRefId>,
    /// `.other`
    pub others: Vec<MemberRefId>,
    /// Resolve/define state
    pub lifecycle: Lifecycle,
    /// Event token, once the row is allocated
    pub token: Option<Token>,
    /// Defining occurrence
    pub location: Option<Location>,
}

impl EventDefinition {
    /// Creates an event without accessors.
    #[must_use]
    pub fn new(name: impl Into<String>, event_type: Option<TypeRefId>) -> Self {
        EventDefinition {
            name: name.into(),
            flags: EventAttributes::empty(),
            event_type,
            add_on: None,
            remove_on: None,
            fire: None,
            others: Vec::new(),
            lifecycle: Lifecycle::default(),
            token: None,
            location: None,
        }
    }

    /// Accessors paired with their semantics, in row order.
    #[must_use]
    pub fn accessors(&self) -> Vec<(MethodSemanticsAttributes, MemberRefId)> {
        let mut accessors = Vec::new();
        if let Some(method) = self.add_on {
            accessors.push((MethodSemanticsAttributes::ADD_ON, method));
        }
        if let Some(method) = self.remove_on {
            accessors.push((MethodSemanticsAttributes::REMOVE_ON, method));
        }
        if let Some(method) = self.fire {
            accessors.push((MethodSemanticsAttributes::FIRE, method));
        }
        for method in &self.others {
            accessors.push((MethodSemanticsAttributes::OTHER, *method));
        }
        accessors
    }
}

impl DefinitionNode for EventDefinition {
    fn promote(&mut self, definition: Self) {
        *self = EventDefinition {
            lifecycle: self.lifecycle,
            token: self.token,
            ..definition
        };
    }
}

/// A `.property` with its accessor methods.
#[derive(Debug, Clone)]
pub struct PropertyDefinition {
    /// Property name
    pub name: String,
    /// Property attributes
    pub flags: PropertyAttributes,
    /// `instance`
    pub has_this: bool,
    /// Property type
    pub property_type: TypeRefId,
    /// Index parameter types
    pub params: Vec<TypeRefId>,
    /// `.get`
    pub getter: Option<MemberRefId>,
    /// `.set`
    pub setter: Option<MemberRefId>,
    /// `.other`
    pub others: Vec<MemberRefId>,
    /// `= value`
    pub constant: Option<ConstantValue>,
    /// Resolve/define state
    pub lifecycle: Lifecycle,
    /// Property token, once the row is allocated
    pub token: Option<Token>,
    /// Defining occurrence
    pub location: Option<Location>,
}

impl PropertyDefinition {
    /// Creates an instance property without accessors.
    #[must_use]
    pub fn new(name: impl Into<String>, property_type: TypeRefId) -> Self {
        PropertyDefinition {
            name: name.into(),
            flags: PropertyAttributes::empty(),
            has_this: true,
            property_type,
            params: Vec::new(),
            getter: None,
            setter: None,
            others: Vec::new(),
            constant: None,
            lifecycle: Lifecycle::default(),
            token: None,
            location: None,
        }
    }

    /// The key the property is registered under: `type name(params)`.
    #[must_use]
    pub fn key(&self, types: &TypeReferences) -> String {
        let params: Vec<&str> = self.params.iter().map(|ty| types.name(*ty)).collect();
        format!(
            "{} {}({})",
            types.name(self.property_type),
            self.name,
            params.join(",")
        )
    }

    /// Accessors paired with their semantics, in row order.
    #[must_use]
    pub fn accessors(&self) -> Vec<(MethodSemanticsAttributes, MemberRefId)> {
        let mut accessors = Vec::new();
        if let Some(method) = self.setter {
            accessors.push((MethodSemanticsAttributes::SETTER, method));
        }
        if let Some(method) = self.getter {
            accessors.push((MethodSemanticsAttributes::GETTER, method));
        }
        for method in &self.others {
            accessors.push((MethodSemanticsAttributes::OTHER, *method));
        }
        accessors
    }
}

impl DefinitionNode for PropertyDefinition {
    fn promote(&mut self, definition: Self) {
        *self = PropertyDefinition {
            lifecycle: self.lifecycle,
            token: self.token,
            ..definition
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::{MemberReferences, MethodRefSignature, PrimitiveType};

    #[test]
    fn test_property_key_and_accessors() {
        let mut types = TypeReferences::new();
        let mut members = MemberReferences::new();
        let owner = types.local("Foo");
        let int32 = types.primitive(PrimitiveType::I4);
        let void = types.primitive(PrimitiveType::Void);
        let getter = members.method(
            &types,
            owner,
            MethodRefSignature::new("get_Item", int32, vec![int32]).instance(),
        );
        let setter = members.method(
            &types,
            owner,
            MethodRefSignature::new("set_Item", void, vec![int32, int32]).instance(),
        );

        let mut property = PropertyDefinition::new("Item", int32);
        property.params.push(int32);
        property.getter = Some(getter);
        property.setter = Some(setter);

        assert_eq!(property.key(&types), "int32 Item(int32)");
        assert_eq!(
            property.accessors(),
            vec![
                (MethodSemanticsAttributes::SETTER, setter),
                (MethodSemanticsAttributes::GETTER, getter)
            ]
        );
    }

    #[test]
    fn test_event_accessor_order() {
        let mut types = TypeReferences::new();
        let mut members = MemberReferences::new();
        let owner = types.local("Foo");
        let void = types.primitive(PrimitiveType::Void);
        let add = members.method(&types, owner, MethodRefSignature::new("add_E", void, vec![]));
        let remove =
            members.method(&types, owner, MethodRefSignature::new("remove_E", void, vec![]));

        let mut event = EventDefinition::new("E", None);
        event.remove_on = Some(remove);
        event.add_on = Some(add);
        let semantics: Vec<_> = event.accessors().into_iter().map(|(kind, _)| kind).collect();
        assert_eq!(
            semantics,
            vec![
                MethodSemanticsAttributes::ADD_ON,
                MethodSemanticsAttributes::REMOVE_ON
            ]
        );
    }
}
