use widestring::U16String;

use crate::{
    definitions::{DefinitionNode, Lifecycle},
    diagnostics::Location,
    metadata::{flags::FieldAttributes, signatures::ELEMENT_TYPE, token::Token},
    references::TypeRefId,
};

/// A literal default value (`= int32(5)`, `= "text"`, `= nullref`).
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// `bool(...)`
    Bool(bool),
    /// `char(...)`
    Char(u16),
    /// `int8(...)`
    I1(i8),
    /// `uint8(...)`
    U1(u8),
    /// `int16(...)`
    I2(i16),
    /// `uint16(...)`
    U2(u16),
    /// `int32(...)`
    I4(i32),
    /// `uint32(...)`
    U4(u32),
    /// `int64(...)`
    I8(i64),
    /// `uint64(...)`
    U8(u64),
    /// `float32(...)`
    R4(f32),
    /// `float64(...)`
    R8(f64),
    /// A string literal, stored as UTF-16
    String(String),
    /// `nullref`
    Null,
}

impl ConstantValue {
    /// The element type byte of the Constant row (II.22.9).
    #[must_use]
    pub fn element_type(&self) -> u8 {
        match self {
            ConstantValue::Bool(_) => ELEMENT_TYPE::BOOLEAN,
            ConstantValue::Char(_) => ELEMENT_TYPE::CHAR,
            ConstantValue::I1(_) => ELEMENT_TYPE::I1,
            ConstantValue::U1(_) => ELEMENT_TYPE::U1,
            ConstantValue::I2(_) => ELEMENT_TYPE::I2,
            ConstantValue::U2(_) => ELEMENT_TYPE::U2,
            ConstantValue::I4(_) => ELEMENT_TYPE::I4,
            ConstantValue::U4(_) => ELEMENT_TYPE::U4,
            ConstantValue::I8(_) => ELEMENT_TYPE::I8,
            ConstantValue::U8(_) => ELEMENT_TYPE::U8,
            ConstantValue::R4(_) => ELEMENT_TYPE::R4,
            ConstantValue::R8(_) => ELEMENT_TYPE::R8,
            ConstantValue::String(_) => ELEMENT_TYPE::STRING,
            ConstantValue::Null => ELEMENT_TYPE::CLASS,
        }
    }

    /// The little-endian value blob.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ConstantValue::Bool(value) => vec![u8::from(*value)],
            ConstantValue::Char(value) | ConstantValue::U2(value) => value.to_le_bytes().to_vec(),
            ConstantValue::I1(value) => value.to_le_bytes().to_vec(),
            ConstantValue::U1(value) => vec![*value],
            ConstantValue::I2(value) => value.to_le_bytes().to_vec(),
            ConstantValue::I4(value) => value.to_le_bytes().to_vec(),
            ConstantValue::U4(value) => value.to_le_bytes().to_vec(),
            ConstantValue::I8(value) => value.to_le_bytes().to_vec(),
            ConstantValue::U8(value) => value.to_le_bytes().to_vec(),
            ConstantValue::R4(value) => value.to_le_bytes().to_vec(),
            ConstantValue::R8(value) => value.to_le_bytes().to_vec(),
            ConstantValue::String(value) => U16String::from_str(value)
                .as_slice()
                .iter()
                .flat_map(|unit| unit.to_le_bytes())
                .collect(),
            ConstantValue::Null => vec![0; 4],
        }
    }
}

/// A field declared on a type or at module scope.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// Field name
    pub name: String,
    /// Field attributes
    pub flags: FieldAttributes,
    /// Field type
    pub field_type: TypeRefId,
    /// `= value`
    pub constant: Option<ConstantValue>,
    /// `[offset]` for explicit layout
    pub offset: Option<u32>,
    /// `at LABEL` - initial value from a module `.data` label
    pub data_label: Option<String>,
    /// Resolve/define state
    pub lifecycle: Lifecycle,
    /// Field token, once the row is allocated
    pub token: Option<Token>,
    /// Defining occurrence
    pub location: Option<Location>,
}

impl FieldDefinition {
    /// Creates a private instance field of `field_type`.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: TypeRefId) -> Self {
        FieldDefinition {
            name: name.into(),
            flags: FieldAttributes::empty(),
            field_type,
            constant: None,
            offset: None,
            data_label: None,
            lifecycle: Lifecycle::default(),
            token: None,
            location: None,
        }
    }

    /// Sets the attributes.
    #[must_use]
    pub fn with_flags(mut self, flags: FieldAttributes) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_constant(mut self, value: ConstantValue) -> Self {
        self.constant = Some(value);
        self
    }

    /// Sets the explicit layout offset.
    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Initializes the field from the `.data` label `label`.
    #[must_use]
    pub fn at(mut self, label: impl Into<String>) -> Self {
        self.data_label = Some(label.into());
        self
    }

    /// Records the defining occurrence.
    #[must_use]
    pub fn at_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Checks whether the field is `static`.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldAttributes::STATIC)
    }
}

impl DefinitionNode for FieldDefinition {
    fn promote(&mut self, definition: Self) {
        *self = FieldDefinition {
            lifecycle: self.lifecycle,
            token: self.token,
            ..definition
        };
    }
}

/// A module-level `.data` label with its initial bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataLabel {
    /// Initial value
    pub data: Vec<u8>,
}

impl DefinitionNode for DataLabel {
    fn promote(&mut self, definition: Self) {
        self.data = definition.data;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_blobs() {
        assert_eq!(ConstantValue::I4(-2).to_bytes(), vec![0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(ConstantValue::Bool(true).to_bytes(), vec![1]);
        assert_eq!(ConstantValue::String("Hi".into()).to_bytes(), vec![b'H', 0, b'i', 0]);
        assert_eq!(ConstantValue::R8(1.0).to_bytes(), 1.0f64.to_le_bytes().to_vec());
        assert_eq!(ConstantValue::Null.to_bytes(), vec![0, 0, 0, 0]);
        assert_eq!(ConstantValue::Null.element_type(), 0x12);
        assert_eq!(ConstantValue::U8(1).element_type(), 0x0b);
    }
}
