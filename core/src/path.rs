//! Logical path handling.
//!
//! Paths handed to fsbridge are slash-delimited strings. [`normalize`] puts
//! them into canonical form; the remaining helpers derive names, parents and
//! extensions from a normalized path and map logical paths onto a backend's
//! configured root.

use crate::errors::{Result, StorageError};

/// Canonicalize a path string.
///
/// Backslashes become slashes, empty and `.` segments are dropped and `..`
/// pops the previously retained segment. Popping past the first segment is
/// a no-op. A leading `/` is preserved. The function is total and
/// idempotent; the empty string normalizes to itself.
pub fn normalize(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let is_absolute = unified.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if is_absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Whether a normalized path is absolute.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Final segment of a normalized path (empty for `/` and the empty path).
pub fn name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Parent of a normalized path, or `None` for `/` and the empty path.
pub fn parent(path: &str) -> Option<String> {
    if path.is_empty() || path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(path[..idx].to_string()),
        None => Some(String::new()),
    }
}

/// Extension of a file name, without the dot.
///
/// Dot-files (`.bashrc`) and names ending in a dot have no extension.
pub fn extension(file_name: &str) -> Option<&str> {
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(idx) if idx + 1 == file_name.len() => None,
        Some(idx) => Some(&file_name[idx + 1..]),
    }
}

/// File name with its extension (if any) removed.
pub fn name_without_extension(file_name: &str) -> &str {
    match extension(file_name) {
        Some(ext) => &file_name[..file_name.len() - ext.len() - 1],
        None => file_name,
    }
}

/// Join `child` onto `base` and normalize the result.
pub fn join(base: &str, child: &str) -> String {
    if base.is_empty() {
        return normalize(child);
    }
    normalize(&format!("{base}/{child}"))
}

/// Whether `path` equals `ancestor` or lies beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if path == ancestor {
        return true;
    }
    if ancestor == "/" {
        return is_absolute(path);
    }
    if ancestor.is_empty() {
        return !is_absolute(path);
    }
    path.strip_prefix(ancestor).is_some_and(|rest| rest.starts_with('/'))
}

/// Rebase `path` from `base_folder` onto `target`.
///
/// `target + path[len(base_folder)..]`, normalized. Fails when `path` does
/// not lie beneath `base_folder`.
pub fn build_new_path(target: &str, path: &str, base_folder: &str) -> Result<String> {
    if !is_within(path, base_folder) {
        return Err(StorageError::InvalidArgument(format!(
            "{path} is not inside {base_folder}"
        )));
    }
    let suffix = &path[base_folder.len()..];
    Ok(join(target, suffix))
}

/// Map a logical path onto `root`.
///
/// Both are normalized first, so `..` in the logical path can never climb
/// above the root.
pub fn under_root(root: &str, logical: &str) -> String {
    let root = normalize(root);
    let logical = normalize(logical);
    let relative = logical.trim_start_matches('/');

    if relative.is_empty() {
        if root.is_empty() {
            return "/".to_string();
        }
        return root;
    }
    if root.is_empty() || root == "/" {
        format!("/{relative}")
    } else {
        format!("{root}/{relative}")
    }
}
