//! Per-path metadata resolution.
//!
//! [`resolve`] stats a path once and derives every attribute from that
//! record: type flags, name parts, MIME type, ownership, timestamps,
//! effective access, content hashes and the size of everything beneath the
//! path. A missing path is not an error; it yields a record with
//! `exists == false` and the dependent fields left empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backends::Backend;
use crate::errors::{Result, StorageError};
use crate::path;

use super::discovery::{discover_entry, DiscoverySet};
use super::{mime, EntryKind};

/// Everything known about one path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// The normalized logical path.
    pub path: String,
    pub exists: bool,
    /// The path in the backend's own namespace.
    pub absolute_path: Option<String>,
    pub is_absolute_path: bool,
    pub is_root: bool,
    pub is_directory: bool,
    pub is_file: bool,
    pub is_link: bool,
    #[serde(rename = "type")]
    pub entry_type: Option<EntryKind>,
    pub name: Option<String>,
    pub parent: Option<String>,
    pub extension: Option<String>,
    pub name_without_extension: Option<String>,
    /// Total bytes of all files at or beneath the path.
    pub size: Option<u64>,
    pub mime_type: Option<String>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub create_date: Option<DateTime<Utc>>,
    pub access_date: Option<DateTime<Utc>>,
    pub modified_date: Option<DateTime<Utc>>,
    pub is_readable: bool,
    pub is_writeable: bool,
    pub is_executable: bool,
    pub hash_md5: Option<String>,
    pub hash_sha1: Option<String>,
    pub hash_sha1_raw: Option<Vec<u8>>,
}

/// Compute the [`Metadata`] of `path`.
pub fn resolve(backend: &mut dyn Backend, path: &str) -> Result<Metadata> {
    resolve_with_discovery(backend, path).map(|(metadata, _)| metadata)
}

/// Compute the [`Metadata`] of `path` and keep the discovery walk used to
/// size it.
pub fn resolve_with_discovery(
    backend: &mut dyn Backend,
    path: &str,
) -> Result<(Metadata, DiscoverySet)> {
    let logical = path::normalize(path);
    let absolute = backend.absolute_path(&logical);

    let mut metadata = Metadata {
        path: logical.clone(),
        absolute_path: Some(absolute.clone()),
        is_absolute_path: path::is_absolute(&logical),
        ..Metadata::default()
    };

    let Some(entry) = backend.stat(&logical)? else {
        debug!("{} does not exist", logical);
        return Ok((metadata, DiscoverySet::default()));
    };
    let Some(kind) = entry.kind else {
        return Err(StorageError::Invariant(format!(
            "{logical} is not a directory, file, or link"
        )));
    };

    metadata.exists = true;
    metadata.is_root = absolute == backend.root_path();
    metadata.is_directory = kind == EntryKind::Directory;
    metadata.is_file = kind == EntryKind::File;
    metadata.is_link = kind == EntryKind::Link;
    metadata.entry_type = Some(kind);

    let name = path::name(&logical);
    metadata.name = Some(name.to_string());
    if !metadata.is_root {
        metadata.parent = path::parent(&logical);
    }
    if kind == EntryKind::File {
        let extension = path::extension(name);
        metadata.extension = extension.map(str::to_string);
        metadata.name_without_extension = Some(path::name_without_extension(name).to_string());
        metadata.mime_type = Some(mime::for_extension(extension).to_string());
    }

    metadata.owner = entry.owner.clone();
    metadata.group = entry.group.clone();
    metadata.create_date = entry.created;
    metadata.access_date = entry.accessed;
    metadata.modified_date = entry.modified;
    metadata.is_readable = entry.access.readable;
    metadata.is_writeable = entry.access.writeable;
    metadata.is_executable = entry.access.executable;

    if kind == EntryKind::File && entry.access.readable {
        match backend.hashes(&logical) {
            Ok(hashes) => {
                metadata.hash_md5 = Some(hashes.md5);
                metadata.hash_sha1 = Some(hashes.sha1);
                metadata.hash_sha1_raw = Some(hashes.sha1_raw);
            }
            Err(StorageError::PermissionDenied(_)) => {}
            Err(e) => return Err(e),
        }
    }

    let discovery = discover_entry(backend, &logical, &entry)?;
    metadata.size = Some(discovery.total_size());

    Ok((metadata, discovery))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LocalBackend;
    use crate::config::ConnectionOptions;
    use crate::files::FileHashes;
    use std::fs;

    fn local(root: &std::path::Path) -> LocalBackend {
        let mut backend = LocalBackend::new(ConnectionOptions {
            root: root.to_string_lossy().to_string(),
            ..ConnectionOptions::default()
        });
        backend.connect().unwrap();
        backend
    }

    #[test]
    fn missing_path_has_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = local(dir.path());

        let m = resolve(&mut backend, "/does/not/exist").unwrap();
        assert!(!m.exists);
        assert_eq!(m.path, "/does/not/exist");
        assert!(m.is_absolute_path);
        assert!(!m.is_root && !m.is_directory && !m.is_file && !m.is_link);
        assert!(m.entry_type.is_none());
        assert!(m.name.is_none());
        assert!(m.parent.is_none());
        assert!(m.size.is_none());
        assert!(m.mime_type.is_none());
        assert!(m.modified_date.is_none());
        assert!(m.hash_md5.is_none());
    }

    #[test]
    fn file_metadata() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Data")).unwrap();
        fs::write(dir.path().join("Data/test1.txt"), "yabba, dabba, doo").unwrap();
        let mut backend = local(dir.path());

        let m = resolve(&mut backend, "/Data/./test1.txt").unwrap();
        assert!(m.exists);
        assert!(m.is_file);
        assert_eq!(m.entry_type, Some(EntryKind::File));
        assert_eq!(m.path, "/Data/test1.txt");
        assert_eq!(m.name.as_deref(), Some("test1.txt"));
        assert_eq!(m.parent.as_deref(), Some("/Data"));
        assert_eq!(m.extension.as_deref(), Some("txt"));
        assert_eq!(m.name_without_extension.as_deref(), Some("test1"));
        assert_eq!(m.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(m.size, Some(17));
        assert!(m.is_readable);

        let expected = FileHashes::from_bytes(b"yabba, dabba, doo");
        assert_eq!(m.hash_md5.as_deref(), Some(expected.md5.as_str()));
        assert_eq!(m.hash_sha1.as_deref(), Some(expected.sha1.as_str()));
        assert_eq!(m.hash_sha1_raw.as_ref().map(Vec::len), Some(20));
    }

    #[test]
    fn directory_metadata_sums_sizes() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("d/sub")).unwrap();
        fs::write(dir.path().join("d/a.bin"), [0u8; 10]).unwrap();
        fs::write(dir.path().join("d/sub/b.bin"), [0u8; 5]).unwrap();
        let mut backend = local(dir.path());

        let (m, discovery) = resolve_with_discovery(&mut backend, "/d").unwrap();
        assert!(m.is_directory);
        assert!(m.extension.is_none());
        assert!(m.name_without_extension.is_none());
        assert!(m.mime_type.is_none());
        assert!(m.hash_md5.is_none());
        assert_eq!(m.size, Some(15));
        assert_eq!(discovery.directories, vec!["/d", "/d/sub"]);
    }

    #[test]
    fn root_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = local(dir.path());

        let m = resolve(&mut backend, "/").unwrap();
        assert!(m.exists);
        assert!(m.is_root);
        assert!(m.is_directory);
        assert!(m.parent.is_none());
        assert_eq!(m.size, Some(0));
    }

    #[test]
    fn serializes_type_field() {
        let m = Metadata {
            entry_type: Some(EntryKind::Directory),
            ..Metadata::default()
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["type"], "directory");
        assert!(json.get("entry_type").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn fifo_is_neither_directory_file_nor_link() {
        use nix::sys::stat::Mode;

        let dir = tempfile::tempdir().unwrap();
        nix::unistd::mkfifo(&dir.path().join("pipe"), Mode::S_IRWXU).unwrap();
        let mut backend = local(dir.path());

        let err = resolve(&mut backend, "/pipe").unwrap_err();
        assert!(matches!(err, StorageError::Invariant(_)));
    }
}
