use crate::{
    metadata::signatures::ArrayDimensions,
    references::{TypeRefId, TypeReferences},
};

/// A type constructor applied on top of a base type.
///
/// Modifiers are recorded in source order and applied one after the other when the
/// modified reference is resolved: `int32[]&` is `[SzArray, ByRef]` over `int32`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// `[]`
    SzArray,
    /// `[lo...hi, ...]` - one entry per dimension
    Array(Vec<ArrayDimensions>),
    /// `&`
    ByRef,
    /// `*`
    Pointer,
    /// `pinned`
    Pinned,
    /// `modreq(T)`
    Required(TypeRefId),
    /// `modopt(T)`
    Optional(TypeRefId),
}

impl Modifier {
    /// Checks whether the modifier is a custom modifier (`modreq`/`modopt`).
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Modifier::Required(_) | Modifier::Optional(_))
    }

    /// The textual form appended to the base type's canonical name.
    #[must_use]
    pub fn describe(&self, types: &TypeReferences) -> String {
        match self {
            Modifier::SzArray => "[]".to_string(),
            Modifier::Array(dimensions) => {
                let rendered: Vec<String> = dimensions.iter().map(describe_dimension).collect();
                format!("[{}]", rendered.join(","))
            }
            Modifier::ByRef => "&".to_string(),
            Modifier::Pointer => "*".to_string(),
            Modifier::Pinned => " pinned".to_string(),
            Modifier::Required(ty) => format!(" modreq({})", types.name(*ty)),
            Modifier::Optional(ty) => format!(" modopt({})", types.name(*ty)),
        }
    }

    /// The type named by a custom modifier.
    #[must_use]
    pub fn modifier_type(&self) -> Option<TypeRefId> {
        match self {
            Modifier::Required(ty) | Modifier::Optional(ty) => Some(*ty),
            _ => None,
        }
    }
}

fn describe_dimension(dimension: &ArrayDimensions) -> String {
    match (dimension.lower_bound, dimension.size) {
        (Some(lower), Some(size)) => {
            format!("{}...{}", lower, i64::from(lower) + i64::from(size) - 1)
        }
        (Some(lower), None) => format!("{lower}..."),
        (None, Some(size)) => size.to_string(),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_rendering() {
        let types = TypeReferences::new();
        let array = Modifier::Array(vec![
            ArrayDimensions {
                size: Some(4),
                lower_bound: Some(1),
            },
            ArrayDimensions {
                size: None,
                lower_bound: Some(0),
            },
            ArrayDimensions::default(),
        ]);
        assert_eq!(array.describe(&types), "[1...4,0...,]");
        assert_eq!(Modifier::Pinned.describe(&types), " pinned");
        assert!(!Modifier::ByRef.is_custom());
    }
}
