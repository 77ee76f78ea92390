//! End-to-end operations against the local backend.
//!
//! Every test builds its own temporary root and drives
//! `fsbridge_core::operation::run` the way the agent does: action name,
//! path, backend name and a single option bag.

mod common;

use std::fs;

use common::{local_options, make_tree, snapshot, with};
use fsbridge_core::actions::Outcome;
use fsbridge_core::errors::{ErrorKind, StorageError};
use fsbridge_core::operation::{metadata, run};
use serde_json::json;

// ── write / read ────────────────────────────────────────────────────

#[test]
fn write_replace_contract() {
    let dir = tempfile::tempdir().unwrap();
    let opts = local_options(dir.path());
    fs::write(dir.path().join("p.txt"), "first").unwrap();

    let err = run(
        "write",
        "/p.txt",
        "Local",
        &with(opts.clone(), json!({"data": "second", "replace": false})),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Filesystem);

    run(
        "write",
        "/p.txt",
        "Local",
        &with(opts.clone(), json!({"data": "second", "replace": true})),
    )
    .unwrap();
    let outcome = run("read", "/p.txt", "Local", &opts).unwrap();
    assert_eq!(outcome, Outcome::Content(b"second".to_vec()));
}

#[test]
fn write_to_nonexistent_nested_path() {
    let dir = tempfile::tempdir().unwrap();
    let opts = local_options(dir.path());

    run(
        "write",
        "/Data/OneMoreFolder/Cats/love/Dogs",
        "Local",
        &with(opts.clone(), json!({"file": "sometimes.txt", "data": "Poop"})),
    )
    .unwrap();

    let m = metadata("/Data/OneMoreFolder/Cats/love/Dogs/sometimes.txt", "Local", &opts).unwrap();
    assert!(m.exists);
    assert!(m.is_file);
    assert_eq!(m.size, Some(4));
}

#[test]
fn read_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = run("read", "/ghost.txt", "Local", &local_options(dir.path())).unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[test]
fn read_only_connection_refuses_writes() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("f.txt"), "x").unwrap();
    let opts = with(local_options(dir.path()), json!({"read_only": true}));

    let err = run("write", "/f.txt", "Local", &with(opts.clone(), json!({"data": "y"})))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Permission);
    let err = run("delete", "/f.txt", "Local", &opts).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Permission);

    // Reads still work.
    let outcome = run("read", "/f.txt", "Local", &opts).unwrap();
    assert_eq!(outcome, Outcome::Content(b"x".to_vec()));
}

// ── metadata ────────────────────────────────────────────────────────

#[test]
fn metadata_on_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let m = metadata("/does/not/exist", "Local", &local_options(dir.path())).unwrap();
    assert!(!m.exists);
    assert!(m.entry_type.is_none());
    assert!(m.size.is_none());
    assert!(m.hash_md5.is_none());
}

#[test]
fn metadata_of_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("empty")).unwrap();
    let m = metadata("/empty", "Local", &local_options(dir.path())).unwrap();
    assert!(m.is_directory);
    assert_eq!(m.size, Some(0));
}

// ── getList ─────────────────────────────────────────────────────────

#[test]
fn get_list_filters() {
    let dir = tempfile::tempdir().unwrap();
    make_tree(dir.path());
    let opts = local_options(dir.path());

    let outcome = run("getList", "/src", "Local", &opts).unwrap();
    assert_eq!(
        outcome,
        Outcome::List(vec![
            "/src/a.txt".into(),
            "/src/b.log".into(),
            "/src/nested".into(),
        ])
    );

    let outcome = run(
        "getList",
        "/src",
        "Local",
        &with(
            opts.clone(),
            json!({"recursive": true, "exclude_folders": true, "extension_list": ["TXT"]}),
        ),
    )
    .unwrap();
    assert_eq!(
        outcome,
        Outcome::List(vec!["/src/a.txt".into(), "/src/nested/c.txt".into()])
    );

    let outcome = run(
        "getList",
        "/src",
        "Local",
        &with(opts, json!({"recursive": true, "exclude_files": true, "name_mask": "deep"})),
    )
    .unwrap();
    assert_eq!(outcome, Outcome::List(vec!["/src/nested/deeper".into()]));
}

// ── delete ──────────────────────────────────────────────────────────

#[test]
fn root_delete_protection() {
    let dir = tempfile::tempdir().unwrap();
    make_tree(dir.path());
    let opts = local_options(dir.path());

    for extra in [
        json!({}),
        json!({"delete_subdirectories": true}),
        json!({"delete_subdirectories": false}),
    ] {
        let err = run("delete", "/", "Local", &with(opts.clone(), extra)).unwrap_err();
        assert!(matches!(err, StorageError::PermissionDenied(_)));
    }
    assert!(dir.path().join("src/a.txt").exists());
}

#[test]
fn delete_tree() {
    let dir = tempfile::tempdir().unwrap();
    make_tree(dir.path());
    run("delete", "/src", "Local", &local_options(dir.path())).unwrap();
    assert!(!dir.path().join("src").exists());
}

// ── copy / move ─────────────────────────────────────────────────────

#[test]
fn round_trip_copy() {
    let dir = tempfile::tempdir().unwrap();
    make_tree(dir.path());
    fs::create_dir(dir.path().join("dst")).unwrap();
    let opts = local_options(dir.path());

    run(
        "copy",
        "/src",
        "Local",
        &with(opts, json!({"target_directory": "/dst"})),
    )
    .unwrap();

    assert_eq!(snapshot(&dir.path().join("dst")), snapshot(&dir.path().join("src")));
}

#[test]
fn copy_into_named_subdirectory() {
    let dir = tempfile::tempdir().unwrap();
    make_tree(dir.path());
    fs::create_dir(dir.path().join("dst")).unwrap();

    run(
        "copy",
        "/src",
        "Local",
        &with(
            local_options(dir.path()),
            json!({"target_directory": "/dst", "target_name": "backup"}),
        ),
    )
    .unwrap();

    assert_eq!(
        snapshot(&dir.path().join("dst/backup")),
        snapshot(&dir.path().join("src"))
    );
}

#[test]
fn move_file_renames() {
    let dir = tempfile::tempdir().unwrap();
    make_tree(dir.path());

    run(
        "move",
        "/src/a.txt",
        "Local",
        &with(
            local_options(dir.path()),
            json!({"target_directory": "", "target_name": "renamed.txt"}),
        ),
    )
    .unwrap();

    assert!(!dir.path().join("src/a.txt").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("src/renamed.txt")).unwrap(),
        "alpha"
    );
}

#[test]
fn move_directory_removes_source() {
    let dir = tempfile::tempdir().unwrap();
    make_tree(dir.path());
    fs::create_dir(dir.path().join("dst")).unwrap();
    let before = snapshot(&dir.path().join("src"));

    run(
        "move",
        "/src",
        "Local",
        &with(
            local_options(dir.path()),
            json!({"target_directory": "/dst", "target_name": "moved"}),
        ),
    )
    .unwrap();

    assert!(!dir.path().join("src").exists());
    assert_eq!(snapshot(&dir.path().join("dst/moved")), before);
}

#[test]
fn copy_in_place_without_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    make_tree(dir.path());

    let err = run(
        "copy",
        "/src/a.txt",
        "Local",
        &with(local_options(dir.path()), json!({"target_directory": "/src"})),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn copy_directory_into_itself_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    make_tree(dir.path());

    let err = run(
        "copy",
        "/src",
        "Local",
        &with(
            local_options(dir.path()),
            json!({"target_directory": "/src/nested", "target_name": "loop"}),
        ),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn copy_to_missing_target_directory_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    make_tree(dir.path());

    let err = run(
        "copy",
        "/src/a.txt",
        "Local",
        &with(local_options(dir.path()), json!({"target_directory": "/nowhere"})),
    )
    .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[test]
fn copy_across_sessions_with_target_adapter() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    make_tree(source.path());

    run(
        "copy",
        "/src",
        "Local",
        &with(
            local_options(source.path()),
            json!({
                "target_directory": "/",
                "target_adapter": {"backend": "Local", "root": target.path().to_string_lossy()}
            }),
        ),
    )
    .unwrap();

    assert_eq!(snapshot(target.path()), snapshot(&source.path().join("src")));
}

#[test]
fn move_of_root_to_another_session_is_refused() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    make_tree(source.path());
    let before = snapshot(source.path());

    let err = run(
        "move",
        "/",
        "Local",
        &with(
            local_options(source.path()),
            json!({
                "target_directory": "/",
                "target_adapter": {"backend": "local", "root": target.path().to_string_lossy()}
            }),
        ),
    )
    .unwrap_err();

    assert!(matches!(err, StorageError::PermissionDenied(_)));
    assert!(source.path().exists());
    assert_eq!(snapshot(source.path()), before);
    assert!(fs::read_dir(target.path()).unwrap().next().is_none());
}

// ── changePermission / touch ────────────────────────────────────────

#[cfg(unix)]
#[test]
fn change_permission_applies_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("f.sh"), "#!/bin/sh\n").unwrap();

    run(
        "changePermission",
        "/f.sh",
        "Local",
        &with(local_options(dir.path()), json!({"permission": "0750"})),
    )
    .unwrap();

    let mode = fs::metadata(dir.path().join("f.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o750);
}

#[test]
fn touch_sets_modification_time() {
    let dir = tempfile::tempdir().unwrap();
    let opts = local_options(dir.path());

    run(
        "touch",
        "/stamp",
        "Local",
        &with(opts.clone(), json!({"modification_time": 1_500_000_000})),
    )
    .unwrap();

    let m = metadata("/stamp", "Local", &opts).unwrap();
    assert!(m.is_file);
    assert_eq!(m.modified_date.unwrap().timestamp(), 1_500_000_000);
}
