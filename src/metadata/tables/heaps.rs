//! Interning heaps for strings, blobs, user strings and GUIDs.
//!
//! All heaps deduplicate their content: adding the same value twice returns the same
//! index. Indices follow ECMA-335 II.24.2: the `#Strings`, `#Blob` and `#US` heaps start
//! with a single empty entry at offset 0, and `#GUID` indices are 1-based.

use std::collections::HashMap;

use widestring::U16String;

use crate::utils::write_compressed_uint;

/// The `#Strings` heap: null-terminated UTF-8 identifiers.
#[derive(Debug, Clone)]
pub struct StringHeap {
    data: Vec<u8>,
    index: HashMap<String, u32>,
}

impl Default for StringHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl StringHeap {
    /// Creates a heap containing only the empty string at offset 0.
    #[must_use]
    pub fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(String::new(), 0);
        Self {
            data: vec![0],
            index,
        }
    }

    /// Returns the offset of `value`, appending it on first use.
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(offset) = self.index.get(value) {
            return *offset;
        }

        let offset = self.data.len() as u32;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.index.insert(value.to_string(), offset);
        offset
    }

    /// Returns the string stored at `offset`, if it starts an entry.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<&str> {
        let start = offset as usize;
        let end = start + self.data.get(start..)?.iter().position(|b| *b == 0)?;
        std::str::from_utf8(&self.data[start..end]).ok()
    }

    /// Raw heap bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// The `#Blob` heap: length-prefixed byte sequences (signatures, attribute values).
#[derive(Debug, Clone)]
pub struct BlobHeap {
    data: Vec<u8>,
    index: HashMap<Vec<u8>, u32>,
}

impl Default for BlobHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobHeap {
    /// Creates a heap containing only the empty blob at offset 0.
    #[must_use]
    pub fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(Vec::new(), 0);
        Self {
            data: vec![0],
            index,
        }
    }

    /// Returns the offset of `blob`, appending it on first use.
    pub fn intern(&mut self, blob: &[u8]) -> u32 {
        if let Some(offset) = self.index.get(blob) {
            return *offset;
        }

        let offset = self.data.len() as u32;
        write_compressed_uint(blob.len() as u32, &mut self.data);
        self.data.extend_from_slice(blob);
        self.index.insert(blob.to_vec(), offset);
        offset
    }

    /// Returns the blob content stored at `offset`, without its length prefix.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<&[u8]> {
        let start = offset as usize;
        let first = *self.data.get(start)?;
        let (len, header) = if first & 0x80 == 0 {
            (usize::from(first), 1)
        } else if first & 0xC0 == 0x80 {
            let second = *self.data.get(start + 1)?;
            ((usize::from(first & 0x3F) << 8) | usize::from(second), 2)
        } else {
            let bytes = self.data.get(start..start + 4)?;
            (
                (usize::from(bytes[0] & 0x1F) << 24)
                    | (usize::from(bytes[1]) << 16)
                    | (usize::from(bytes[2]) << 8)
                    | usize::from(bytes[3]),
                4,
            )
        };
        self.data.get(start + header..start + header + len)
    }

    /// Raw heap bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// The `#US` heap: UTF-16 string literals used by `ldstr`.
#[derive(Debug, Clone)]
pub struct UserStringHeap {
    data: Vec<u8>,
    index: HashMap<String, u32>,
}

impl Default for UserStringHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStringHeap {
    /// Creates a heap containing only the empty entry at offset 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: vec![0],
            index: HashMap::new(),
        }
    }

    /// Returns the offset of `value`, appending it on first use.
    ///
    /// Entries are stored as UTF-16LE with the trailing flag byte set when any code
    /// unit needs special handling (ECMA-335 II.24.2.4).
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(offset) = self.index.get(value) {
            return *offset;
        }

        let wide = U16String::from_str(value);
        let units = wide.as_slice();

        let mut bytes = Vec::with_capacity(units.len() * 2 + 1);
        let mut special = false;
        for unit in units {
            bytes.extend_from_slice(&unit.to_le_bytes());
            special |= needs_special_handling(*unit);
        }
        bytes.push(u8::from(special));

        let offset = self.data.len() as u32;
        write_compressed_uint(bytes.len() as u32, &mut self.data);
        self.data.extend_from_slice(&bytes);
        self.index.insert(value.to_string(), offset);
        offset
    }

    /// Raw heap bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

fn needs_special_handling(unit: u16) -> bool {
    if unit > 0x7E {
        return true;
    }
    matches!(unit, 0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D)
}

/// The `#GUID` heap.
#[derive(Debug, Clone, Default)]
pub struct GuidHeap {
    guids: Vec<uguid::Guid>,
}

impl GuidHeap {
    /// Returns the 1-based index of `guid`, appending it on first use.
    pub fn intern(&mut self, guid: uguid::Guid) -> u32 {
        if let Some(position) = self.guids.iter().position(|g| *g == guid) {
            return position as u32 + 1;
        }
        self.guids.push(guid);
        self.guids.len() as u32
    }

    /// Returns the GUID at the 1-based `index`.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<uguid::Guid> {
        let position = (index as usize).checked_sub(1)?;
        self.guids.get(position).copied()
    }

    /// All stored GUIDs in heap order.
    #[must_use]
    pub fn guids(&self) -> &[uguid::Guid] {
        &self.guids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_heap_deduplicates() {
        let mut heap = StringHeap::new();
        let a = heap.intern("System");
        let b = heap.intern("Object");
        let c = heap.intern("System");

        assert_eq!(a, 1);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(heap.intern(""), 0);
        assert_eq!(heap.get(b), Some("Object"));
    }

    #[test]
    fn test_blob_heap_roundtrip() {
        let mut heap = BlobHeap::new();
        let sig = heap.intern(&[0x06, 0x08]);
        assert_eq!(heap.get(sig), Some(&[0x06_u8, 0x08][..]));
        assert_eq!(heap.intern(&[0x06, 0x08]), sig);
        assert_eq!(heap.intern(&[]), 0);

        let large = vec![0xAB_u8; 200];
        let offset = heap.intern(&large);
        assert_eq!(heap.get(offset).map(<[u8]>::len), Some(200));
    }

    #[test]
    fn test_user_string_encoding() {
        let mut heap = UserStringHeap::new();
        let offset = heap.intern("Hi");
        assert_eq!(offset, 1);
        // length 5 = 2 UTF-16 code units + flag byte
        assert_eq!(&heap.data()[1..], &[0x05, b'H', 0, b'i', 0, 0]);
        assert_eq!(heap.intern("Hi"), offset);

        let special = heap.intern("don't");
        assert_eq!(*heap.data().last().unwrap(), 1);
        assert!(special > offset);
    }

    #[test]
    fn test_guid_heap_is_one_based() {
        let mut heap = GuidHeap::default();
        let guid = uguid::guid!("01234567-89ab-cdef-0123-456789abcdef");
        assert_eq!(heap.intern(guid), 1);
        assert_eq!(heap.intern(guid), 1);
        assert_eq!(heap.get(1), Some(guid));
        assert_eq!(heap.get(0), None);
    }
}
