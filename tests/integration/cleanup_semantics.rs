//! Integration tests for bridge startup failure and teardown behavior.

use std::fs;
use std::os::unix::fs::PermissionsExt;

use dgen_driver::{BridgeError, GeneratorBridge, TaskParameters};

use super::test_utils::FakeInstall;

fn set_mode(install: &FakeInstall, mode: u32) {
    let path = install.node_path();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(mode);
    fs::set_permissions(&path, perms).unwrap();
}

#[test]
fn test_launch_failure_is_typed_and_leaves_no_residue() {
    let install = FakeInstall::new("wordgen");
    install.write_properties("mock.line-count=3\n");
    let params = TaskParameters::resolve(&install.request(1, 0), "load").unwrap();

    // Revoke the execute bit after validation; the spawn itself must fail.
    set_mode(&install, 0o644);
    let err = GeneratorBridge::open(&params).unwrap_err();
    assert!(matches!(err, BridgeError::Launch { .. }));

    // The failed open must have torn down its listener and progress channel;
    // with the executable restored, a fresh open on the same host succeeds
    // and streams normally.
    set_mode(&install, 0o755);
    let mut bridge = GeneratorBridge::open(&params).unwrap();
    let mut lines = 0;
    while bridge.next_line().unwrap().is_some() {
        lines += 1;
    }
    assert_eq!(lines, 3);
    bridge.close();
}

#[test]
fn test_generator_exiting_before_connect_is_an_accept_error() {
    let install = FakeInstall::new("wordgen");
    install.write_properties("mock.skip-connect=true\n");
    let params = TaskParameters::resolve(&install.request(1, 0), "load").unwrap();

    // The mock exits without ever dialing the data channel; open() must
    // report the accept step instead of blocking forever.
    let err = GeneratorBridge::open(&params).unwrap_err();
    assert!(matches!(err, BridgeError::Accept(_)));
}

#[test]
fn test_dropping_an_open_bridge_cleans_up() {
    let install = FakeInstall::new("wordgen");
    install.write_properties("mock.line-count=10\n");
    let params = TaskParameters::resolve(&install.request(1, 0), "load").unwrap();

    {
        let mut bridge = GeneratorBridge::open(&params).unwrap();
        assert!(bridge.next_line().unwrap().is_some());
        // Dropped without an explicit close.
    }

    // Resources were released; the next bridge opens cleanly.
    let mut bridge = GeneratorBridge::open(&params).unwrap();
    assert!(bridge.next_line().unwrap().is_some());
    bridge.close();
}
