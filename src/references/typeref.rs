use std::collections::HashMap;
use std::fmt;

use crate::{
    generics::{GenericArguments, GenericParamRef, ParamBinding},
    metadata::{signatures::TypeSignature, token::Token},
    references::{Modifier, PrimitiveType, TypeRefId},
};

/// The module or assembly an external type lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternalScope {
    /// `[Name]` - a declared `.assembly extern`
    Assembly(String),
    /// `[.module Name]` - a declared `.module extern`
    Module(String),
}

impl ExternalScope {
    /// The declared name of the assembly or module.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ExternalScope::Assembly(name) | ExternalScope::Module(name) => name,
        }
    }
}

impl fmt::Display for ExternalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalScope::Assembly(name) => write!(f, "[{name}]"),
            ExternalScope::Module(name) => write!(f, "[.module {name}]"),
        }
    }
}

/// What a type mention refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRefKind {
    /// A type defined (or expected to be defined) in this module, by full name.
    ///
    /// Nested types use `Outer/Inner`. Whether the type is a value type is decided by its
    /// definition, not by the keyword used at the mention.
    Local {
        /// `Namespace.Name` or `Namespace.Outer/Inner`
        full_name: String,
    },
    /// A type imported from a declared external assembly or module.
    External {
        /// Owning assembly or module
        scope: ExternalScope,
        /// `Namespace.Name` or `Namespace.Outer/Inner`
        full_name: String,
        /// Mentioned with `valuetype`
        value_type: bool,
    },
    /// A built-in element type
    Primitive(PrimitiveType),
    /// `!n`, `!!n`, `!T` or `!!T`
    GenericParameter(GenericParamRef),
    /// A generic definition applied to arguments; only created through
    /// [`crate::generics::GenericsEngine::instantiate`].
    GenericInstantiation {
        /// The open generic type
        definition: TypeRefId,
        /// Arguments in order
        args: GenericArguments,
    },
    /// A base type with array/pointer/by-ref/pinned/custom modifiers applied in order.
    Modified {
        /// The innermost unmodified type
        base: TypeRefId,
        /// Modifiers in application order
        modifiers: Vec<Modifier>,
    },
}

/// One interned type mention, plus its memoized resolution.
#[derive(Debug, Clone)]
pub struct TypeReference {
    kind: TypeRefKind,
    name: String,
    scope_dependent: bool,
    resolved: Option<TypeSignature>,
    token: Option<Token>,
}

impl TypeReference {
    /// The variant and its payload.
    #[must_use]
    pub fn kind(&self) -> &TypeRefKind {
        &self.kind
    }

    /// The canonical name, unique per distinct reference.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks whether the reference contains generic parameters named instead of indexed,
    /// whose meaning depends on the enclosing generic scope.
    #[must_use]
    pub fn is_scope_dependent(&self) -> bool {
        self.scope_dependent
    }

    /// Checks whether the reference has been resolved to a signature.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// The memoized signature, once resolved.
    #[must_use]
    pub fn resolved(&self) -> Option<&TypeSignature> {
        self.resolved.as_ref()
    }

    /// The memoized TypeDef/TypeRef/TypeSpec token, once requested.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.token
    }
}

/// Interning arena for type mentions.
///
/// Every distinct canonical name maps to exactly one [`TypeRefId`] for the whole run, so the
/// memoized resolution stored on the entry is shared by every site that mentions the type.
///
/// # Examples
///
/// ```rust
/// use cilasm::references::{ExternalScope, Modifier, PrimitiveType, TypeReferences};
///
/// let mut types = TypeReferences::new();
/// let object = types.external(ExternalScope::Assembly("mscorlib".into()), "System.Object", false);
/// let again = types.external(ExternalScope::Assembly("mscorlib".into()), "System.Object", false);
/// assert_eq!(object, again);
///
/// let int32 = types.primitive(PrimitiveType::I4);
/// let array = types.modified(int32, Modifier::SzArray);
/// let byref = types.modified(array, Modifier::ByRef);
/// assert_eq!(types.name(byref), "int32[]&");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeReferences {
    entries: Vec<TypeReference>,
    by_kind: HashMap<TypeRefKind, TypeRefId>,
}

impl TypeReferences {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned references.
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
    pub fn get(&self, id: TypeRefId) -> &TypeReference {
        &self.entries[id.index()]
    }

    /// Canonical name of `id`.
    #[must_use]
    pub fn name(&self, id: TypeRefId) -> &str {
        &self.get(id).name
    }

    /// Variant of `id`.
    #[must_use]
    pub fn kind(&self, id: TypeRefId) -> &TypeRefKind {
        &self.get(id).kind
    }

    /// Looks up an already interned reference by canonical name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<TypeRefId> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .map(TypeRefId::new)
    }

    /// Interns a local type mention.
    pub fn local(&mut self, full_name: &str) -> TypeRefId {
        self.intern(TypeRefKind::Local {
            full_name: full_name.to_string(),
        })
    }

    /// Interns an external type mention.
    pub fn external(&mut self, scope: ExternalScope, full_name: &str, value_type: bool) -> TypeRefId {
        self.intern(TypeRefKind::External {
            scope,
            full_name: full_name.to_string(),
            value_type,
        })
    }

    /// Interns a primitive type.
    pub fn primitive(&mut self, primitive: PrimitiveType) -> TypeRefId {
        self.intern(TypeRefKind::Primitive(primitive))
    }

    /// Interns a generic parameter mention.
    pub fn generic_param(&mut self, param: GenericParamRef) -> TypeRefId {
        self.intern(TypeRefKind::GenericParameter(param))
    }

    /// Applies `modifier` on top of `base`, flattening nested modifier chains.
    pub fn modified(&mut self, base: TypeRefId, modifier: Modifier) -> TypeRefId {
        let (base, mut modifiers) = match self.kind(base) {
            TypeRefKind::Modified { base, modifiers } => (*base, modifiers.clone()),
            _ => (base, Vec::new()),
        };
        modifiers.push(modifier);
        self.intern(TypeRefKind::Modified { base, modifiers })
    }

    /// Interns a generic instantiation; the canonicalizing cache sits in front of this in
    /// [`crate::generics::GenericsEngine`].
    pub(crate) fn instantiation(
        &mut self,
        definition: TypeRefId,
        args: GenericArguments,
    ) -> TypeRefId {
        self.intern(TypeRefKind::GenericInstantiation { definition, args })
    }

    /// Interns `kind`, returning the existing id when the same mention was seen before.
    ///
    /// Component references are already interned, so structural equality of the variant is
    /// identity of the mention.
    pub fn intern(&mut self, kind: TypeRefKind) -> TypeRefId {
        if let Some(id) = self.by_kind.get(&kind) {
            return *id;
        }
        let name = self.canonical_name(&kind);

        let scope_dependent = self.compute_scope_dependent(&kind);
        let id = TypeRefId::new(self.entries.len());
        self.by_kind.insert(kind.clone(), id);
        self.entries.push(TypeReference {
            kind,
            name,
            scope_dependent,
            resolved: None,
            token: None,
        });
        id
    }

    /// Renders the canonical name of `kind`.
    #[must_use]
    pub fn canonical_name(&self, kind: &TypeRefKind) -> String {
        match kind {
            // quoted like ilasm would when the name reads as a keyword or a type parameter
            TypeRefKind::Local { full_name }
                if PrimitiveType::from_name(full_name).is_some() || full_name.starts_with('!') =>
            {
                format!("'{full_name}'")
            }
            TypeRefKind::Local { full_name } => full_name.clone(),
            TypeRefKind::External {
                scope,
                full_name,
                value_type,
            } => {
                if *value_type {
                    format!("valuetype {scope}{full_name}")
                } else {
                    format!("{scope}{full_name}")
                }
            }
            TypeRefKind::Primitive(primitive) => primitive.name().to_string(),
            TypeRefKind::GenericParameter(param) => param.to_string(),
            TypeRefKind::GenericInstantiation { definition, args } => {
                format!("{}<{}>", self.name(*definition), args.signature(self))
            }
            TypeRefKind::Modified { base, modifiers } => {
                let mut name = self.name(*base).to_string();
                for modifier in modifiers {
                    name.push_str(&modifier.describe(self));
                }
                name
            }
        }
    }

    fn compute_scope_dependent(&self, kind: &TypeRefKind) -> bool {
        match kind {
            TypeRefKind::Local { .. } | TypeRefKind::External { .. } | TypeRefKind::Primitive(_) => {
                false
            }
            TypeRefKind::GenericParameter(param) => matches!(param.binding, ParamBinding::Name(_)),
            TypeRefKind::GenericInstantiation { definition, args } => {
                self.get(*definition).scope_dependent
                    || args.iter().any(|arg| self.get(*arg).scope_dependent)
            }
            TypeRefKind::Modified { base, modifiers } => {
                self.get(*base).scope_dependent
                    || modifiers
                        .iter()
                        .filter_map(Modifier::modifier_type)
                        .any(|ty| self.get(ty).scope_dependent)
            }
        }
    }

    /// Memoizes the resolved signature of `id`.
    pub(crate) fn set_resolved(&mut self, id: TypeRefId, signature: TypeSignature) {
        self.entries[id.index()].resolved = Some(signature);
    }

    /// Memoizes the token of `id`.
    pub(crate) fn set_token(&mut self, id: TypeRefId, token: Token) {
        self.entries[id.index()].token = Some(token);
    }

    /// Iterates over all interned references with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (TypeRefId, &TypeReference)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (TypeRefId::new(index), entry))
    }
}

/// Splits `Namespace.Outer/Inner` into the namespace and the chain of simple names.
///
/// Only the outermost type carries a namespace.
#[must_use]
pub fn split_type_name(full_name: &str) -> (String, Vec<String>) {
    let mut parts = full_name.split('/');
    let outer = parts.next().unwrap_or_default();
    let (namespace, outer_name) = match outer.rfind('.') {
        Some(dot) => (outer[..dot].to_string(), outer[dot + 1..].to_string()),
        None => (String::new(), outer.to_string()),
    };

    let mut names = vec![outer_name];
    names.extend(parts.map(str::to_string));
    (namespace, names)
}

/// Parses the generic arity encoded in a mangled type name (`List`1`).
#[must_use]
pub fn mangled_arity(full_name: &str) -> Option<usize> {
    let simple = full_name.rsplit('/').next().unwrap_or(full_name);
    let (_, arity) = simple.rsplit_once('`')?;
    arity.parse().ok()
}
