pub mod discovery;
pub mod hash;
pub mod metadata;
pub mod mime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use discovery::{discover, discover_entry, DiscoveredFile, DiscoverySet};
pub use hash::FileHashes;
pub use metadata::{resolve, resolve_with_discovery, Metadata};

/// The three kinds of entry a backend may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
    Link,
}

/// Effective access rights of the connected user on an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    pub readable: bool,
    pub writeable: bool,
    pub executable: bool,
}

impl Access {
    /// Derive access from an `rwx` triple, e.g. the owner part of `rwxr-xr-x`.
    pub fn from_rwx(triple: &str) -> Self {
        let bytes = triple.as_bytes();
        Self {
            readable: bytes.first() == Some(&b'r'),
            writeable: bytes.get(1) == Some(&b'w'),
            executable: matches!(bytes.get(2), Some(b'x' | b's' | b't')),
        }
    }
}

/// One stat record as a backend reports it.
///
/// `kind` is `None` for entries that exist but are neither directory, file
/// nor link (sockets, devices).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntry {
    pub name: String,
    /// Logical (normalized, root-relative) path.
    pub path: String,
    pub kind: Option<EntryKind>,
    pub size: u64,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    /// Permission bits (`0o7777` mask) when the backend knows them.
    pub mode: Option<u32>,
    pub access: Access,
}

impl RawEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == Some(EntryKind::Directory)
    }

    pub fn is_file(&self) -> bool {
        self.kind == Some(EntryKind::File)
    }
}

/// Format permission bits as `rwxrwxrwx`.
pub fn format_permissions(mode: u32) -> String {
    let mut out = String::with_capacity(9);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// Parse an `rwxrwxrwx` string (optionally prefixed by a type character)
/// back into permission bits.
pub fn parse_permissions(perm: &str) -> Option<u32> {
    let perm = if perm.len() == 10 { &perm[1..] } else { perm };
    if perm.len() != 9 || !perm.is_ascii() {
        return None;
    }
    let mut mode = 0u32;
    for (idx, ch) in perm.chars().enumerate() {
        let bit = 1 << (8 - idx);
        match ch {
            'r' | 'w' | 'x' => mode |= bit,
            's' | 't' => mode |= bit,
            '-' | 'S' | 'T' => {}
            _ => return None,
        }
    }
    Some(mode)
}
