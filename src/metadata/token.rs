//! Metadata tokens used as the binary handle of every resolved entity.
//!
//! A token is a 32-bit value whose top byte names the metadata table and whose low
//! 24 bits are the 1-based row inside that table (ECMA-335 II.22). Every reference the
//! assembler resolves ends up as a token: TypeDef/TypeRef/TypeSpec for types,
//! MethodDef/MemberRef/MethodSpec for methods, Field/MemberRef for fields, and the
//! user-string pseudo table (`0x70`) for `ldstr` operands.
//!
//! # Examples
//!
//! ```rust
//! use cilasm::metadata::{tables::TableId, token::Token};
//!
//! let token = Token::from_parts(TableId::MethodDef, 3);
//! assert_eq!(token.value(), 0x0600_0003);
//! assert_eq!(token.table(), 0x06);
//! assert_eq!(token.row(), 3);
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::metadata::tables::TableId;

/// Table byte of the user-string heap pseudo table (`ldstr` operands).
pub const USER_STRING_TABLE: u8 = 0x70;

/// A metadata token, the combination of table id and row index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Token(pub u32);

impl Token {
    /// Creates a token from its raw 32-bit value.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a 1-based row index.
    ///
    /// # Arguments
    ///
    /// * `table` - The metadata table the row lives in
    /// * `row` - The 1-based row index (only the low 24 bits are kept)
    #[must_use]
    pub fn from_parts(table: TableId, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Creates a user-string token for the given heap offset.
    #[must_use]
    pub fn user_string(offset: u32) -> Self {
        Token((u32::from(USER_STRING_TABLE) << 24) | (offset & 0x00FF_FFFF))
    }

    /// Returns the raw 32-bit value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the table byte.
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Returns the row index.
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns the table id, if the table byte names a known table.
    #[must_use]
    pub fn table_id(&self) -> Option<TableId> {
        TableId::from_u8(self.table())
    }

    /// Checks whether this token lives in the given table.
    #[must_use]
    pub fn is_table(&self, table: TableId) -> bool {
        self.table() == table as u8
    }

    /// Checks whether this is the null token.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_token_from_parts() {
        let token = Token::from_parts(TableId::TypeDef, 5);
        assert_eq!(token.value(), 0x0200_0005);
        assert!(token.is_table(TableId::TypeDef));
        assert_eq!(token.table_id(), Some(TableId::TypeDef));
    }

    #[test]
    fn test_token_row_is_masked() {
        let token = Token::from_parts(TableId::Field, 0x0100_0001);
        assert_eq!(token.table(), 0x04);
        assert_eq!(token.row(), 1);
    }

    #[test]
    fn test_user_string_token() {
        let token = Token::user_string(0x1c);
        assert_eq!(token.value(), 0x7000_001c);
        assert_eq!(token.table_id(), None);
    }

    #[test]
    fn test_token_is_null() {
        assert!(Token(0).is_null());
        assert!(!Token(0x0600_0001).is_null());
    }

    #[test]
    fn test_token_display_and_debug() {
        let token = Token(0x0600_0001);
        assert_eq!(format!("{}", token), "0x06000001");
        let debug_str = format!("{:?}", token);
        assert!(debug_str.contains("table: 0x06"));
        assert!(debug_str.contains("row: 1"));
    }

    #[test]
    fn test_token_as_map_key() {
        let mut map = HashMap::new();
        map.insert(Token(0x0200_0001), "Foo");
        map.insert(Token(0x0200_0002), "Bar");
        assert_eq!(map.get(&Token(0x0200_0001)), Some(&"Foo"));
        assert_eq!(map.len(), 2);
    }
}
