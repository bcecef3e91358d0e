//! `.assembly extern`, `.module extern` and the `.assembly` manifest.

use std::collections::HashMap;

use crate::{
    assembler::config::CORLIB,
    diagnostics::{DiagnosticCategory, Diagnostics},
    metadata::{
        flags::AssemblyFlags,
        tables::{AssemblyRefRow, AssemblyRow, MetadataTables},
        token::Token,
    },
    references::ExternalScope,
    utils::public_key_token,
    Error, Result,
};

/// SHA-1, the hash algorithm id ilasm writes by default.
pub const HASH_ALGORITHM_SHA1: u32 = 0x8004;

/// An `.assembly extern` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExternAssembly {
    /// Simple name
    pub name: String,
    /// Major, minor, build, revision
    pub version: [u16; 4],
    /// `.culture`
    pub culture: Option<String>,
    /// `.publickey`
    pub public_key: Option<Vec<u8>>,
    /// `.publickeytoken`
    pub public_key_token: Option<Vec<u8>>,
    /// `.hash`
    pub hash: Option<Vec<u8>>,
    /// `retargetable` and friends
    pub flags: AssemblyFlags,
}

impl ExternAssembly {
    /// Creates a declaration carrying only a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        ExternAssembly {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets `.ver`.
    #[must_use]
    pub fn with_version(mut self, major: u16, minor: u16, build: u16, revision: u16) -> Self {
        self.version = [major, minor, build, revision];
        self
    }

    /// Sets `.culture`.
    #[must_use]
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = Some(culture.into());
        self
    }

    /// Sets the full public key.
    #[must_use]
    pub fn with_public_key(mut self, key: Vec<u8>) -> Self {
        self.public_key = Some(key);
        self
    }

    /// Sets the public key token.
    #[must_use]
    pub fn with_public_key_token(mut self, token: Vec<u8>) -> Self {
        self.public_key_token = Some(token);
        self
    }

    /// Sets the hash value.
    #[must_use]
    pub fn with_hash(mut self, hash: Vec<u8>) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Sets the flags.
    #[must_use]
    pub fn with_flags(mut self, flags: AssemblyFlags) -> Self {
        self.flags = flags;
        self
    }

    fn to_row(&self, tables: &mut MetadataTables, compact_keys: bool) -> AssemblyRefRow {
        let mut flags = self.flags - AssemblyFlags::PUBLIC_KEY;
        let key = match (&self.public_key, &self.public_key_token) {
            (Some(key), _) if compact_keys => public_key_token(key).to_vec(),
            (Some(key), _) => {
                flags |= AssemblyFlags::PUBLIC_KEY;
                key.clone()
            }
            (None, Some(token)) => token.clone(),
            (None, None) => Vec::new(),
        };

        AssemblyRefRow {
            major_version: self.version[0],
            minor_version: self.version[1],
            build_number: self.version[2],
            revision_number: self.version[3],
            flags: flags.bits(),
            public_key_or_token: blob_or_null(tables, &key),
            name: tables.strings.intern(&self.name),
            culture: self
                .culture
                .as_deref()
                .map_or(0, |culture| tables.strings.intern(culture)),
            hash_value: blob_or_null(tables, self.hash.as_deref().unwrap_or_default()),
        }
    }
}

/// The `.assembly` manifest of the module being assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyManifest {
    /// Simple name
    pub name: String,
    /// Major, minor, build, revision
    pub version: [u16; 4],
    /// `.culture`
    pub culture: Option<String>,
    /// `.publickey`
    pub public_key: Option<Vec<u8>>,
    /// `.hash algorithm`
    pub hash_algorithm: u32,
    /// Assembly flags
    pub flags: AssemblyFlags,
}

impl AssemblyManifest {
    /// Creates a manifest with version 0.0.0.0 and the SHA-1 hash algorithm.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        AssemblyManifest {
            name: name.into(),
            version: [0; 4],
            culture: None,
            public_key: None,
            hash_algorithm: HASH_ALGORITHM_SHA1,
            flags: AssemblyFlags::empty(),
        }
    }

    /// Sets `.ver`.
    #[must_use]
    pub fn with_version(mut self, major: u16, minor: u16, build: u16, revision: u16) -> Self {
        self.version = [major, minor, build, revision];
        self
    }

    /// Sets `.publickey`.
    #[must_use]
    pub fn with_public_key(mut self, key: Vec<u8>) -> Self {
        self.public_key = Some(key);
        self
    }

    /// Sets `.culture`.
    #[must_use]
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = Some(culture.into());
        self
    }

    pub(crate) fn to_row(&self, tables: &mut MetadataTables) -> AssemblyRow {
        let mut flags = self.flags;
        if self.public_key.is_some() {
            flags |= AssemblyFlags::PUBLIC_KEY;
        }
        AssemblyRow {
            hash_alg_id: self.hash_algorithm,
            major_version: self.version[0],
            minor_version: self.version[1],
            build_number: self.version[2],
            revision_number: self.version[3],
            flags: flags.bits(),
            public_key: blob_or_null(tables, self.public_key.as_deref().unwrap_or_default()),
            name: tables.strings.intern(&self.name),
            culture: self
                .culture
                .as_deref()
                .map_or(0, |culture| tables.strings.intern(culture)),
        }
    }
}

fn blob_or_null(tables: &mut MetadataTables, blob: &[u8]) -> u32 {
    if blob.is_empty() {
        0
    } else {
        tables.blobs.intern(blob)
    }
}

/// Declared external assemblies and modules with their AssemblyRef/ModuleRef rows.
#[derive(Debug, Clone, Default)]
pub struct ExternTable {
    assemblies: HashMap<String, Token>,
    modules: HashMap<String, Token>,
}

impl ExternTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an external assembly and returns its AssemblyRef.
    ///
    /// Redeclaring a name returns the first row; later attributes are ignored.
    pub fn declare_assembly(
        &mut self,
        tables: &mut MetadataTables,
        assembly: &ExternAssembly,
        compact_keys: bool,
    ) -> Token {
        if let Some(token) = self.assemblies.get(&assembly.name) {
            return *token;
        }
        let row = assembly.to_row(tables, compact_keys);
        let token = tables.add_assembly_ref(row);
        self.assemblies.insert(assembly.name.clone(), token);
        token
    }

    /// Declares an external module and returns its ModuleRef.
    pub fn declare_module(&mut self, tables: &mut MetadataTables, name: &str) -> Token {
        if let Some(token) = self.modules.get(name) {
            return *token;
        }
        let token = tables.add_module_ref(name);
        self.modules.insert(name.to_string(), token);
        token
    }

    /// Checks whether `scope` was declared.
    #[must_use]
    pub fn is_declared(&self, scope: &ExternalScope) -> bool {
        match scope {
            ExternalScope::Assembly(name) => self.assemblies.contains_key(name),
            ExternalScope::Module(name) => self.modules.contains_key(name),
        }
    }

    /// The resolution scope token of `scope`.
    ///
    /// With `implicit_corlib` the core library is declared on first use, noted as info.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownExternal`] if `scope` was never declared.
    pub fn scope_token(
        &mut self,
        tables: &mut MetadataTables,
        scope: &ExternalScope,
        implicit_corlib: bool,
        diagnostics: &Diagnostics,
    ) -> Result<Token> {
        match scope {
            ExternalScope::Assembly(name) => {
                if let Some(token) = self.assemblies.get(name) {
                    return Ok(*token);
                }
                if implicit_corlib && name == CORLIB {
                    diagnostics.info(
                        DiagnosticCategory::External,
                        format!("assembly extern {CORLIB} declared implicitly"),
                    );
                    return Ok(self.declare_assembly(tables, &ExternAssembly::new(CORLIB), false));
                }
                Err(Error::UnknownExternal(name.clone()))
            }
            ExternalScope::Module(name) => self
                .modules
                .get(name)
                .copied()
                .ok_or_else(|| Error::UnknownExternal(format!(".module {name}"))),
        }
    }
}
