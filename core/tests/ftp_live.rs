//! FTP integration tests against a live server.
//!
//! Expects the `test`/`test` account described in `common`, whose
//! `Data/test1.txt` holds `yabba, dabba, doo` padded to 20 bytes.
//! Skips gracefully if no server is listening.

mod common;

use common::{ftp_options, require_ftp, with};
use fsbridge_core::actions::Outcome;
use fsbridge_core::backends::BackendKind;
use fsbridge_core::operation::{metadata, run, Session};
use serde_json::json;

#[test]
fn ftp_read_success() {
    require_ftp!();

    let outcome = run("read", "/Data/test1.txt", "Ftp", &ftp_options())
        .expect("reading test1.txt should succeed");
    let Outcome::Content(bytes) = outcome else {
        panic!("read should return content, got {outcome:?}");
    };
    assert_eq!(String::from_utf8_lossy(&bytes).trim(), "yabba, dabba, doo");

    let m = metadata("/Data/test1.txt", "Ftp", &ftp_options()).unwrap();
    assert!(m.exists);
    assert!(m.is_file);
    assert_eq!(m.size, Some(20));
    assert_eq!(m.mime_type.as_deref(), Some("text/plain"));
    assert_eq!(
        m.hash_md5.as_deref(),
        Some("73f661695573b01306ca7eafadca485b")
    );
    assert!(m.create_date.is_none());
}

#[test]
fn ftp_write_to_nonexistent_nested_path() {
    require_ftp!();

    run(
        "write",
        "/Data/OneMoreFolder/Cats/love/Dogs",
        "Ftp",
        &with(ftp_options(), json!({"file": "sometimes.txt", "data": "Poop"})),
    )
    .expect("nested write should create every level");

    let m = metadata(
        "/Data/OneMoreFolder/Cats/love/Dogs/sometimes.txt",
        "Ftp",
        &ftp_options(),
    )
    .unwrap();
    assert!(m.exists);

    // Clean up so the test can be repeated. FTP discovery is single-level,
    // so remove the chain one directory at a time, deepest first.
    let opts = ftp_options();
    run("delete", "/Data/OneMoreFolder/Cats/love/Dogs", "Ftp", &opts).unwrap();
    run("delete", "/Data/OneMoreFolder/Cats/love", "Ftp", &opts).unwrap();
    run("delete", "/Data/OneMoreFolder/Cats", "Ftp", &opts).unwrap();
    run("delete", "/Data/OneMoreFolder", "Ftp", &opts).unwrap();
}

#[test]
fn ftp_session_lands_in_initial_directory() {
    require_ftp!();

    let mut session = Session::open_from_value(BackendKind::Ftp, &ftp_options()).unwrap();
    let backend = session.backend_mut();
    assert!(backend.is_connected());
    assert!(backend.absolute_path("test1.txt").ends_with("/Data/test1.txt"));
    assert!(!backend.lists_recursively());
    session.close().unwrap();
}

#[test]
fn ftp_missing_path_metadata() {
    require_ftp!();

    let m = metadata("/Data/definitely-not-here.txt", "Ftp", &ftp_options()).unwrap();
    assert!(!m.exists);
    assert!(m.size.is_none());
}
