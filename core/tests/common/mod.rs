//! Shared test utilities for fsbridge core integration tests.
//!
//! Provides FTP server availability checks, local fixture trees and option
//! builders. The FTP tests expect a server on `localhost:21` with a
//! `test`/`test` account whose home contains `Data/test1.txt`.

// Each integration test is compiled as its own crate, so not every test file
// uses every function from this shared module. Suppress dead_code warnings.
#![allow(dead_code)]

use std::fs;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

pub const FTP_HOST: &str = "localhost";
pub const FTP_PORT: u16 = 21;

/// Check if a TCP port is reachable on the given host.
///
/// Returns `true` if a TCP connection can be established within 2 seconds.
pub fn is_port_reachable(host: &str, port: u16) -> bool {
    let Ok(mut addrs) = (host, port).to_socket_addrs() else {
        return false;
    };
    addrs.any(|addr| TcpStream::connect_timeout(&addr, Duration::from_secs(2)).is_ok())
}

/// Skip the current test if no FTP server is reachable.
///
/// Prints a message to stderr and returns early (runtime check instead of
/// `#[ignore]`).
#[allow(unused_macros)]
macro_rules! require_ftp {
    () => {
        if !common::is_port_reachable(common::FTP_HOST, common::FTP_PORT) {
            eprintln!(
                "SKIPPED: no FTP server reachable on {}:{}",
                common::FTP_HOST,
                common::FTP_PORT
            );
            return;
        }
    };
}
#[allow(unused_imports)]
pub(crate) use require_ftp;

/// Connection options for the test FTP account.
pub fn ftp_options() -> serde_json::Value {
    serde_json::json!({
        "host": FTP_HOST,
        "port": FTP_PORT,
        "username": "test",
        "password": "test",
        "initial_directory": "Data"
    })
}

/// Connection options for a local backend rooted at `root`.
pub fn local_options(root: &Path) -> serde_json::Value {
    serde_json::json!({ "root": root.to_string_lossy() })
}

/// Merge action options into a connection option bag.
pub fn with(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    if let (Some(base), serde_json::Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    base
}

/// Build this tree under `root`:
///
/// ```text
/// src/
///   a.txt          "alpha"
///   b.log          "bravo"
///   nested/
///     c.txt        "charlie"
///     deeper/
///       d.bin      [0, 1, 2, 3]
/// ```
pub fn make_tree(root: &Path) {
    let src = root.join("src");
    fs::create_dir_all(src.join("nested/deeper")).unwrap();
    fs::write(src.join("a.txt"), "alpha").unwrap();
    fs::write(src.join("b.log"), "bravo").unwrap();
    fs::write(src.join("nested/c.txt"), "charlie").unwrap();
    fs::write(src.join("nested/deeper/d.bin"), [0u8, 1, 2, 3]).unwrap();
}

/// All files beneath `dir` as (relative path, content) pairs, sorted.
pub fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut out = Vec::new();
    collect(dir, dir, &mut out);
    out.sort();
    out
}

fn collect(base: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        if path.is_dir() {
            collect(base, &path, out);
        } else {
            let rel = path
                .strip_prefix(base)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            out.push((rel, fs::read(&path).unwrap()));
        }
    }
}
