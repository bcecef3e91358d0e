use indexmap::IndexMap;

use crate::{diagnostics::Location, Error, SymbolKind};

/// Behaviour shared by the nodes stored in a [`DefinitionTable`].
pub trait DefinitionNode {
    /// Merges an authoritative definition into a node that was created by a forward
    /// reference, keeping whatever the placeholder accumulated (member tables, mentions).
    fn promote(&mut self, definition: Self);

    /// Appends the contained symbols that are still undefined. Containers (types) report
    /// their member tables here; leaf nodes report nothing.
    fn undefined_members(&self, _owner: &str, _out: &mut Vec<Undefined>) {}
}

/// A symbol that was referenced but never defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Undefined {
    /// What kind of entity is missing
    pub kind: SymbolKind,
    /// Qualified name of the missing entity
    pub name: String,
    /// Every location the entity was mentioned at
    pub locations: Vec<Location>,
}

impl Undefined {
    /// The matching [`crate::Error::UndefinedSymbol`].
    #[must_use]
    pub fn to_error(&self) -> Error {
        Error::UndefinedSymbol {
            kind: self.kind,
            name: self.name.clone(),
        }
    }
}

/// One entry of a definition table.
#[derive(Debug, Clone)]
pub struct TableEntry<N> {
    node: N,
    references: Vec<Location>,
    definition: Option<Location>,
    defined: bool,
}

impl<N> TableEntry<N> {
    /// The node.
    pub fn node(&self) -> &N {
        &self.node
    }

    /// Locations of every reference, in the order they were recorded.
    pub fn references(&self) -> &[Location] {
        &self.references
    }

    /// Location of the defining occurrence, if it was given.
    pub fn definition(&self) -> Option<&Location> {
        self.definition.as_ref()
    }

    /// Checks whether a defining occurrence was registered.
    pub fn is_defined(&self) -> bool {
        self.defined
    }
}

/// Result of [`DefinitionTable::add_definition`].
#[derive(Debug)]
pub enum DefineOutcome<N> {
    /// No entry existed; the definition created one at this index
    New(usize),
    /// A forward reference existed at this index and was promoted
    Promoted(usize),
    /// The key was already defined; the first definition stays and `node` is handed back
    /// detached
    Duplicate {
        /// The rejected node
        node: N,
        /// The matching [`crate::Error::DuplicateDefinition`]
        error: Error,
    },
}

impl<N> DefineOutcome<N> {
    /// Index of the entry that now holds the definition, if it was accepted.
    pub fn index(&self) -> Option<usize> {
        match self {
            DefineOutcome::New(index) | DefineOutcome::Promoted(index) => Some(*index),
            DefineOutcome::Duplicate { .. } => None,
        }
    }
}

/// Per-scope bookkeeping distinguishing "defined" from "merely referenced".
///
/// Entries are keyed by name (types) or signature key (members) and keep their index for
/// the whole run, so a node created by a forward reference is the same node that the later
/// definition fills in. Definitions additionally remember the order they arrived in, which is
/// the order their rows are emitted in.
///
/// # Examples
///
/// ```rust
/// use cilasm::definitions::{DefineOutcome, DefinitionTable, FieldDefinition};
/// use cilasm::references::{PrimitiveType, TypeReferences};
/// use cilasm::SymbolKind;
///
/// let mut types = TypeReferences::new();
/// let int32 = types.primitive(PrimitiveType::I4);
/// let mut fields: DefinitionTable<FieldDefinition> = DefinitionTable::new(SymbolKind::Field);
///
/// let referenced = fields.get_reference("int32 X", None, || FieldDefinition::new("X", int32));
/// assert!(!fields.is_defined(referenced));
///
/// let outcome = fields.add_definition("int32 X", None, FieldDefinition::new("X", int32));
/// assert_eq!(outcome.index(), Some(referenced));
/// assert!(fields.check_for_undefined("Foo").is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct DefinitionTable<N> {
    kind: SymbolKind,
    entries: IndexMap<String, TableEntry<N>>,
    order: Vec<usize>,
}

impl<N: DefinitionNode> DefinitionTable<N> {
    /// Creates an empty table for symbols of `kind`.
    #[must_use]
    pub fn new(kind: SymbolKind) -> Self {
        DefinitionTable {
            kind,
            entries: IndexMap::new(),
            order: Vec::new(),
        }
    }

    /// Kind of the symbols in this table.
    #[must_use]
    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// Number of entries, referenced or defined.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry for `key`.
    #[must_use]
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.entries.get_index_of(key)
    }

    /// Key of the entry at `index`.
    #[must_use]
    pub fn key(&self, index: usize) -> Option<&str> {
        self.entries.get_index(index).map(|(key, _)| key.as_str())
    }

    /// Entry at `index`.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&TableEntry<N>> {
        self.entries.get_index(index).map(|(_, entry)| entry)
    }

    /// Node at `index`.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&N> {
        self.entry(index).map(TableEntry::node)
    }

    /// Mutable node at `index`.
    pub fn node_mut(&mut self, index: usize) -> Option<&mut N> {
        self.entries
            .get_index_mut(index)
            .map(|(_, entry)| &mut entry.node)
    }

    /// Node for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&N> {
        self.entries.get(key).map(TableEntry::node)
    }

    /// Checks whether the entry at `index` has a defining occurrence.
    #[must_use]
    pub fn is_defined(&self, index: usize) -> bool {
        self.entry(index).is_some_and(TableEntry::is_defined)
    }

    /// Checks whether the entry at `index` is defined and, for containers, all of its
    /// members are defined as well.
    #[must_use]
    pub fn is_fully_defined(&self, index: usize) -> bool {
        let Some((key, entry)) = self.entries.get_index(index) else {
            return false;
        };
        let mut missing = Vec::new();
        entry.node.undefined_members(key, &mut missing);
        entry.defined && missing.is_empty()
    }

    /// Returns the entry for `key`, creating a referenced-only entry from `placeholder` if
    /// there is none. `location`, if given, is recorded as a reference site either way.
    pub fn get_reference(
        &mut self,
        key: &str,
        location: Option<Location>,
        placeholder: impl FnOnce() -> N,
    ) -> usize {
        let index = match self.entries.get_index_of(key) {
            Some(index) => index,
            None => {
                self.entries.insert(
                    key.to_string(),
                    TableEntry {
                        node: placeholder(),
                        references: Vec::new(),
                        definition: None,
                        defined: false,
                    },
                );
                self.entries.len() - 1
            }
        };
        if let Some(location) = location {
            self.entries[index].references.push(location);
        }
        index
    }

    /// Registers the defining occurrence of `key`.
    ///
    /// A referenced-only entry is promoted in place so every earlier reference sees the
    /// definition. Defining an already defined key leaves the first definition untouched and
    /// returns the new node as [`DefineOutcome::Duplicate`].
    pub fn add_definition(
        &mut self,
        key: &str,
        location: Option<Location>,
        node: N,
    ) -> DefineOutcome<N> {
        match self.entries.get_index_of(key) {
            Some(index) => {
                let entry = &mut self.entries[index];
                if entry.defined {
                    return DefineOutcome::Duplicate {
                        node,
                        error: Error::DuplicateDefinition {
                            kind: self.kind,
                            name: key.to_string(),
                        },
                    };
                }
                entry.node.promote(node);
                entry.definition = location;
                entry.defined = true;
                self.order.push(index);
                DefineOutcome::Promoted(index)
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    TableEntry {
                        node,
                        references: Vec::new(),
                        definition: location,
                        defined: true,
                    },
                );
                let index = self.entries.len() - 1;
                self.order.push(index);
                DefineOutcome::New(index)
            }
        }
    }

    /// Moves every entry of `other` into this table, definitions first in their arrival
    /// order, then the referenced-only entries. A definition whose key is already defined
    /// here is dropped.
    pub fn absorb(&mut self, other: Self) {
        let mut slots: Vec<Option<(String, TableEntry<N>)>> =
            other.entries.into_iter().map(Some).collect();

        for index in other.order {
            let Some((key, entry)) = slots.get_mut(index).and_then(Option::take) else {
                continue;
            };
            if let Some(index) = self
                .add_definition(&key, entry.definition, entry.node)
                .index()
            {
                self.entries[index].references.extend(entry.references);
            }
        }

        for (key, entry) in slots.into_iter().flatten() {
            let TableEntry {
                node, references, ..
            } = entry;
            let index = self.get_reference(&key, None, || node);
            self.entries[index].references.extend(references);
        }
    }

    /// Indices of defined entries in the order their definitions arrived.
    #[must_use]
    pub fn definition_order(&self) -> &[usize] {
        &self.order
    }

    /// Iterates over all entries in first-mention order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, &TableEntry<N>)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, (key, entry))| (index, key.as_str(), entry))
    }

    /// Every entry that is still referenced-only, plus the undefined members of every
    /// container, qualified with `scope` (empty for module-level tables).
    #[must_use]
    pub fn check_for_undefined(&self, scope: &str) -> Vec<Undefined> {
        let mut missing = Vec::new();
        for (key, entry) in &self.entries {
            let name = qualify(scope, key);
            if !entry.defined {
                missing.push(Undefined {
                    kind: self.kind,
                    name: name.clone(),
                    locations: entry.references.clone(),
                });
            }
            entry.node.undefined_members(&name, &mut missing);
        }
        missing
    }
}

fn qualify(scope: &str, key: &str) -> String {
    if scope.is_empty() {
        key.to_string()
    } else {
        format!("{scope}::{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Node {
        value: u32,
        mentions: u32,
    }

    impl DefinitionNode for Node {
        fn promote(&mut self, definition: Self) {
            self.value = definition.value;
        }
    }

    #[test]
    fn test_reference_then_define_keeps_identity() {
        let mut table = DefinitionTable::new(SymbolKind::Type);
        let forward = table.get_reference("Foo", Some(Location::new(1, 1)), Node::default);
        table.node_mut(forward).unwrap().mentions += 1;
        let again = table.get_reference("Foo", Some(Location::new(2, 1)), Node::default);
        assert_eq!(forward, again);
        assert_eq!(table.entry(forward).unwrap().references().len(), 2);

        let outcome = table.add_definition(
            "Foo",
            Some(Location::new(9, 1)),
            Node {
                value: 7,
                mentions: 0,
            },
        );
        assert!(matches!(outcome, DefineOutcome::Promoted(index) if index == forward));
        let node = table.node(forward).unwrap();
        assert_eq!((node.value, node.mentions), (7, 1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_duplicate_keeps_first_definition() {
        let mut table = DefinitionTable::new(SymbolKind::Type);
        table.add_definition(
            "Foo",
            None,
            Node {
                value: 1,
                mentions: 0,
            },
        );
        let outcome = table.add_definition(
            "Foo",
            None,
            Node {
                value: 2,
                mentions: 0,
            },
        );
        match outcome {
            DefineOutcome::Duplicate { node, error } => {
                assert_eq!(node.value, 2);
                assert_eq!(
                    error,
                    Error::DuplicateDefinition {
                        kind: SymbolKind::Type,
                        name: "Foo".to_string()
                    }
                );
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(table.get("Foo").unwrap().value, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_definition_order_differs_from_mention_order() {
        let mut table = DefinitionTable::new(SymbolKind::Field);
        table.get_reference("B", None, Node::default);
        table.add_definition("A", None, Node::default());
        table.add_definition("B", None, Node::default());
        assert_eq!(table.key(0), Some("B"));
        assert_eq!(table.definition_order(), &[1, 0]);
    }

    #[test]
    fn test_undefined_carries_all_locations() {
        let mut table = DefinitionTable::new(SymbolKind::Method);
        table.get_reference("void M()", Some(Location::new(3, 4)), Node::default);
        table.get_reference("void M()", Some(Location::new(5, 6)), Node::default);
        table.add_definition("void N()", None, Node::default());

        let missing = table.check_for_undefined("Foo");
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "Foo::void M()");
        assert_eq!(missing[0].locations.len(), 2);
        assert_eq!(
            missing[0].to_error().to_string(),
            "Undefined method - Foo::void M()"
        );
    }
}
