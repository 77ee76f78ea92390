//! The `write` action and the directory/file creation helpers shared with
//! copy and move.

use serde::Deserialize;
use tracing::{debug, info};

use crate::backends::{Backend, WriteMode};
use crate::errors::{Result, StorageError};
use crate::operation::OperationContext;
use crate::path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// File name below the operation path; empty writes to the path itself.
    pub file: String,
    pub data: String,
    pub replace: bool,
    pub append: bool,
    pub truncate: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            file: String::new(),
            data: String::new(),
            replace: true,
            append: false,
            truncate: false,
        }
    }
}

/// Write `opts.data` to `path/file`.
///
/// Blank data is a request for a directory: missing levels are created, an
/// existing directory is left alone and an existing file is refused.
pub fn write(backend: &mut dyn Backend, ctx: &OperationContext, opts: &WriteOptions) -> Result<()> {
    let target = if opts.file.is_empty() {
        ctx.path.clone()
    } else {
        path::join(&ctx.path, &opts.file)
    };

    if opts.data.trim().is_empty() {
        return match backend.stat(&target)? {
            Some(entry) if entry.is_directory() => Ok(()),
            Some(_) => Err(StorageError::OperationFailed(format!(
                "refusing to overwrite {target} with empty data"
            ))),
            None => ensure_directory(backend, &target),
        };
    }

    if let Some(parent) = path::parent(&target).filter(|p| !p.is_empty()) {
        ensure_directory(backend, &parent)?;
    }
    store(backend, &target, opts.data.as_bytes(), opts)?;
    info!("Wrote {} bytes to {}", opts.data.len(), target);
    Ok(())
}

/// Write `data` to a file, honouring `replace`.
pub(crate) fn put_file(
    backend: &mut dyn Backend,
    target: &str,
    data: &[u8],
    replace: bool,
) -> Result<()> {
    let opts = WriteOptions {
        replace,
        ..WriteOptions::default()
    };
    store(backend, target, data, &opts)
}

fn store(backend: &mut dyn Backend, target: &str, data: &[u8], opts: &WriteOptions) -> Result<()> {
    let existing = backend.stat(target)?;
    if let Some(entry) = &existing {
        if entry.is_directory() {
            return Err(StorageError::OperationFailed(format!(
                "{target} is a directory"
            )));
        }
        if !entry.access.writeable {
            return Err(StorageError::PermissionDenied(target.to_string()));
        }
    }

    let mode = if opts.append {
        WriteMode::Append
    } else if opts.truncate {
        WriteMode::Truncate
    } else if existing.is_some() {
        if !opts.replace {
            return Err(StorageError::OperationFailed(format!(
                "attempting to write to existing file {target}"
            )));
        }
        WriteMode::Replace
    } else {
        WriteMode::Create
    };

    backend.write_bytes(target, data, mode)
}

/// `mkdir -p`: create `dir` and every missing ancestor.
pub(crate) fn ensure_directory(backend: &mut dyn Backend, dir: &str) -> Result<()> {
    let mut missing = Vec::new();
    let mut current = Some(path::normalize(dir));

    while let Some(candidate) = current {
        if candidate.is_empty() {
            break;
        }
        match backend.stat(&candidate)? {
            Some(entry) if entry.is_directory() => break,
            Some(_) => {
                return Err(StorageError::OperationFailed(format!(
                    "{candidate} exists and is not a directory"
                )))
            }
            None => {
                current = path::parent(&candidate);
                missing.push(candidate);
            }
        }
    }

    for dir in missing.iter().rev() {
        debug!("Creating missing directory {}", dir);
        backend.mkdir(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LocalBackend;
    use crate::config::ConnectionOptions;
    use std::fs;

    fn local(root: &std::path::Path) -> LocalBackend {
        let mut backend = LocalBackend::new(ConnectionOptions {
            root: root.to_string_lossy().to_string(),
            ..ConnectionOptions::default()
        });
        backend.connect().unwrap();
        backend
    }

    fn ctx(backend: &mut LocalBackend, path: &str) -> OperationContext {
        OperationContext::resolve(backend, path).unwrap()
    }

    #[test]
    fn ensure_directory_creates_every_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = local(dir.path());

        ensure_directory(&mut backend, "/a/b/c").unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
        // Already present: nothing to do.
        ensure_directory(&mut backend, "/a/b").unwrap();
    }

    #[test]
    fn ensure_directory_rejects_file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blocker"), "x").unwrap();
        let mut backend = local(dir.path());

        let err = ensure_directory(&mut backend, "/blocker/sub").unwrap_err();
        assert!(matches!(err, StorageError::OperationFailed(_)));
    }

    #[test]
    fn nested_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = local(dir.path());
        let context = ctx(&mut backend, "/Data/OneMoreFolder/Cats/love/Dogs");
        let opts = WriteOptions {
            file: "sometimes.txt".into(),
            data: "Poop".into(),
            ..WriteOptions::default()
        };

        write(&mut backend, &context, &opts).unwrap();
        let written = dir
            .path()
            .join("Data/OneMoreFolder/Cats/love/Dogs/sometimes.txt");
        assert_eq!(fs::read_to_string(written).unwrap(), "Poop");
    }

    #[test]
    fn blank_data_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = local(dir.path());
        let context = ctx(&mut backend, "/base");
        let opts = WriteOptions {
            file: "newdir".into(),
            data: "   ".into(),
            ..WriteOptions::default()
        };

        write(&mut backend, &context, &opts).unwrap();
        assert!(dir.path().join("base/newdir").is_dir());
        // Repeating is a no-op on the existing directory.
        write(&mut backend, &context, &opts).unwrap();
    }

    #[test]
    fn blank_data_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "precious").unwrap();
        let mut backend = local(dir.path());
        let context = ctx(&mut backend, "/keep.txt");

        let err = write(&mut backend, &context, &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, StorageError::OperationFailed(_)));
        assert_eq!(
            fs::read_to_string(dir.path().join("keep.txt")).unwrap(),
            "precious"
        );
    }

    #[test]
    fn replace_false_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f.txt"), "old").unwrap();
        let mut backend = local(dir.path());
        let context = ctx(&mut backend, "/f.txt");

        let refuse = WriteOptions {
            data: "new".into(),
            replace: false,
            ..WriteOptions::default()
        };
        let err = write(&mut backend, &context, &refuse).unwrap_err();
        assert!(err.to_string().contains("attempting to write to existing file"));

        let replace = WriteOptions {
            data: "new".into(),
            ..WriteOptions::default()
        };
        write(&mut backend, &context, &replace).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("f.txt")).unwrap(), "new");
    }

    #[test]
    fn append_wins_over_truncate() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("log.txt"), "a").unwrap();
        let mut backend = local(dir.path());
        let context = ctx(&mut backend, "/log.txt");

        let opts = WriteOptions {
            data: "b".into(),
            append: true,
            truncate: true,
            replace: false,
            ..WriteOptions::default()
        };
        write(&mut backend, &context, &opts).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("log.txt")).unwrap(), "ab");

        let opts = WriteOptions {
            data: "c".into(),
            truncate: true,
            ..WriteOptions::default()
        };
        write(&mut backend, &context, &opts).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("log.txt")).unwrap(), "c");
    }

    #[test]
    fn writing_onto_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("d")).unwrap();
        let mut backend = local(dir.path());
        let context = ctx(&mut backend, "/d");

        let opts = WriteOptions {
            data: "x".into(),
            ..WriteOptions::default()
        };
        assert!(write(&mut backend, &context, &opts).is_err());
    }
}
