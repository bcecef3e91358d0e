use std::fmt;

use indexmap::IndexMap;

use crate::{Error, Result};

/// Stable handle of a label within one method body, assigned at first mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelHandle(u32);

impl LabelHandle {
    /// Position of the label in its table.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a label is identified in the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LabelKey {
    /// A named label, unique per method body
    Name(String),
    /// The instruction at the given index in the stream (or the end of the body)
    Position(usize),
    /// A raw byte offset from the start of the body, computed outside the assembler
    Offset(u32),
}

impl fmt::Display for LabelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelKey::Name(name) => f.write_str(name),
            LabelKey::Position(index) => write!(f, "#{index}"),
            LabelKey::Offset(offset) => write!(f, "IL_{offset:04x}"),
        }
    }
}

/// Where a label points once it is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTarget {
    /// Before the instruction at this index
    Instruction(usize),
    /// At this byte offset
    Offset(u32),
}

#[derive(Debug, Clone)]
struct LabelEntry {
    target: Option<LabelTarget>,
}

/// The ordered label table of one method body.
///
/// Named, positional and raw-offset labels share one table. Mentioning a label returns the
/// same handle every time; a named label mentioned before it is defined starts as a
/// placeholder and is unified with its definition when that arrives.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    entries: IndexMap<LabelKey, LabelEntry>,
}

impl LabelTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct labels mentioned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether no label was mentioned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the handle for `key`, creating the entry on first mention.
    ///
    /// Positional and offset labels are defined by construction.
    pub fn reference(&mut self, key: LabelKey) -> LabelHandle {
        let target = match &key {
            LabelKey::Name(_) => None,
            LabelKey::Position(index) => Some(LabelTarget::Instruction(*index)),
            LabelKey::Offset(offset) => Some(LabelTarget::Offset(*offset)),
        };
        let entry = self.entries.entry(key);
        let index = entry.index();
        entry.or_insert(LabelEntry { target });
        LabelHandle(index as u32)
    }

    /// Defines the named label `name` before the instruction at `position`.
    ///
    /// # Errors
    /// Returns [`crate::Error::DuplicateLabel`] if the name was already defined.
    pub fn define(&mut self, name: &str, position: usize) -> Result<LabelHandle> {
        let handle = self.reference(LabelKey::Name(name.to_string()));
        let entry = &mut self.entries[handle.index()];
        if entry.target.is_some() {
            return Err(Error::DuplicateLabel(name.to_string()));
        }
        entry.target = Some(LabelTarget::Instruction(position));
        Ok(handle)
    }

    /// The key a handle was created for.
    #[must_use]
    pub fn key(&self, handle: LabelHandle) -> Option<&LabelKey> {
        self.entries.get_index(handle.index()).map(|(key, _)| key)
    }

    /// Where the label points, if it was defined.
    #[must_use]
    pub fn target(&self, handle: LabelHandle) -> Option<LabelTarget> {
        self.entries
            .get_index(handle.index())
            .and_then(|(_, entry)| entry.target)
    }

    /// Looks up a named label without creating it.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<LabelHandle> {
        self.entries
            .get_index_of(&LabelKey::Name(name.to_string()))
            .map(|index| LabelHandle(index as u32))
    }

    /// Names of labels that were mentioned but never defined, in first-mention order.
    #[must_use]
    pub fn undefined(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| match key {
                LabelKey::Name(name) if entry.target.is_none() => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Iterates over all labels in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (LabelHandle, &LabelKey, Option<LabelTarget>)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, (key, entry))| (LabelHandle(index as u32), key, entry.target))
    }
}
