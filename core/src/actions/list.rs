//! The `getList` action.

use serde::Deserialize;

use crate::errors::{Result, StorageError};
use crate::operation::OperationContext;
use crate::path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    pub recursive: bool,
    pub exclude_files: bool,
    pub exclude_folders: bool,
    /// Extensions to keep (files only), matched case-insensitively.
    pub extension_list: Vec<String>,
    /// Substring the entry name must contain.
    pub name_mask: Option<String>,
}

impl ListOptions {
    fn keeps_name(&self, name: &str) -> bool {
        match self.name_mask.as_deref() {
            Some(mask) if !mask.is_empty() => name.contains(mask),
            _ => true,
        }
    }

    fn keeps_extension(&self, name: &str) -> bool {
        if self.extension_list.is_empty() {
            return true;
        }
        let Some(ext) = path::extension(name) else {
            return false;
        };
        self.extension_list
            .iter()
            .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Paths beneath the operation path that pass the filters, sorted.
///
/// Works purely from the discovery already in `ctx`. A file path lists as
/// itself.
pub fn get_list(ctx: &OperationContext, opts: &ListOptions) -> Result<Vec<String>> {
    if !ctx.metadata.exists {
        return Err(StorageError::NotFound(ctx.path.clone()));
    }
    if !ctx.metadata.is_directory {
        return Ok(vec![ctx.path.clone()]);
    }

    let base = ctx.path.as_str();
    let in_scope = |p: &str| opts.recursive || path::parent(p).as_deref() == Some(base);

    let mut result = Vec::new();
    if !opts.exclude_folders {
        result.extend(
            ctx.discovery
                .directories
                .iter()
                .filter(|d| d.as_str() != base)
                .filter(|d| in_scope(d))
                .filter(|d| opts.keeps_name(path::name(d)))
                .cloned(),
        );
    }
    if !opts.exclude_files {
        result.extend(
            ctx.discovery
                .file_paths()
                .filter(|f| in_scope(f))
                .filter(|f| opts.keeps_name(path::name(f)))
                .filter(|f| opts.keeps_extension(path::name(f)))
                .map(str::to_string),
        );
    }

    result.sort();
    result.dedup();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{DiscoveredFile, DiscoverySet, Metadata};

    fn tree_context() -> OperationContext {
        let file = |p: &str| DiscoveredFile {
            path: p.to_string(),
            size: 1,
        };
        OperationContext {
            path: "/root".into(),
            metadata: Metadata {
                path: "/root".into(),
                exists: true,
                is_directory: true,
                ..Metadata::default()
            },
            discovery: DiscoverySet {
                directories: vec![
                    "/root".into(),
                    "/root/docs".into(),
                    "/root/docs/old".into(),
                    "/root/img".into(),
                ],
                files: vec![
                    file("/root/readme.TXT"),
                    file("/root/docs/a.txt"),
                    file("/root/docs/old/b.md"),
                    file("/root/img/logo.png"),
                ],
            },
        }
    }

    #[test]
    fn non_recursive_lists_direct_children() {
        let list = get_list(&tree_context(), &ListOptions::default()).unwrap();
        assert_eq!(list, vec!["/root/docs", "/root/img", "/root/readme.TXT"]);
    }

    #[test]
    fn recursive_lists_everything_but_the_base() {
        let opts = ListOptions {
            recursive: true,
            ..ListOptions::default()
        };
        let list = get_list(&tree_context(), &opts).unwrap();
        assert_eq!(
            list,
            vec![
                "/root/docs",
                "/root/docs/a.txt",
                "/root/docs/old",
                "/root/docs/old/b.md",
                "/root/img",
                "/root/img/logo.png",
                "/root/readme.TXT",
            ]
        );
    }

    #[test]
    fn extension_filter_is_case_insensitive_and_files_only() {
        let opts = ListOptions {
            recursive: true,
            exclude_folders: true,
            extension_list: vec!["txt".into(), ".MD".into()],
            ..ListOptions::default()
        };
        let list = get_list(&tree_context(), &opts).unwrap();
        assert_eq!(
            list,
            vec!["/root/docs/a.txt", "/root/docs/old/b.md", "/root/readme.TXT"]
        );
    }

    #[test]
    fn name_mask_and_exclusions() {
        let opts = ListOptions {
            recursive: true,
            exclude_files: true,
            name_mask: Some("o".into()),
            ..ListOptions::default()
        };
        let list = get_list(&tree_context(), &opts).unwrap();
        assert_eq!(list, vec!["/root/docs", "/root/docs/old"]);
    }

    #[test]
    fn missing_path_is_not_found() {
        let ctx = OperationContext {
            path: "/ghost".into(),
            metadata: Metadata::default(),
            discovery: DiscoverySet::default(),
        };
        assert!(matches!(
            get_list(&ctx, &ListOptions::default()),
            Err(StorageError::NotFound(_))
        ));
    }
}
