//! Integration tests for the generator bridge's streaming path.

use std::time::{Duration, Instant};

use dgen_driver::{GeneratorBridge, TaskParameters};

use super::test_utils::FakeInstall;

/// Drain a bridge to end of stream, returning the lines in order.
fn drain(bridge: &mut GeneratorBridge) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line) = bridge.next_line().unwrap() {
        lines.push(line);
    }
    lines
}

/// Poll `progress()` until it reports `expected` or the timeout expires.
fn wait_for_progress(bridge: &GeneratorBridge, expected: f64) -> Option<f64> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let progress = bridge.progress();
        if progress == Some(expected) || Instant::now() >= deadline {
            return progress;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_streams_known_lines_in_order_then_eof() {
    let install = FakeInstall::new("wordgen");
    install.write_properties("mock.line-count=25\nmock.progress=0.25,0.9\n");
    let params = TaskParameters::resolve(&install.request(1, 0), "token").unwrap();

    let mut bridge = GeneratorBridge::open(&params).unwrap();
    let lines = drain(&mut bridge);
    assert_eq!(lines.len(), 25);
    for (record, line) in lines.iter().enumerate() {
        assert_eq!(line, &format!("token|0|{record}"));
    }

    // After end of stream the bridge keeps reporting it.
    assert_eq!(bridge.next_line().unwrap(), None);

    // Both reports were sent before the mock closed its socket, so the last
    // one must become observable.
    assert_eq!(wait_for_progress(&bridge, 0.9), Some(0.9));
    bridge.close();
}

#[test]
fn test_progress_is_unknown_before_any_report() {
    let install = FakeInstall::new("wordgen");
    // No progress reports at all, a couple of lines.
    install.write_properties("mock.line-count=2\nmock.progress=\n");
    let params = TaskParameters::resolve(&install.request(1, 0), "load").unwrap();

    let mut bridge = GeneratorBridge::open(&params).unwrap();
    assert_eq!(bridge.progress(), None);
    drain(&mut bridge);
    assert_eq!(bridge.progress(), None);
    bridge.close();
}

#[test]
fn test_non_utf8_stdout_noise_does_not_kill_the_stream() {
    let install = FakeInstall::new("wordgen");
    // The node dumps a raw non-UTF-8 line on stdout before streaming, plus
    // its usual periodic stdout chatter. The stdout drain must survive the
    // raw bytes; if it dies and closes the pipe, the node is killed by
    // SIGPIPE on its next chatter line and the tail of the stream is lost.
    install.write_properties("mock.line-count=600\nmock.binary-noise=true\n");
    let params = TaskParameters::resolve(&install.request(1, 0), "load").unwrap();

    let mut bridge = GeneratorBridge::open(&params).unwrap();
    let lines = drain(&mut bridge);
    assert_eq!(lines.len(), 600);
    assert_eq!(lines[599], "load|0|599");
    bridge.close();
}

#[test]
fn test_fast_exiting_generator_still_connects() {
    let install = FakeInstall::new("wordgen");
    install.write_properties("mock.line-count=1\nmock.progress=\n");
    let params = TaskParameters::resolve(&install.request(1, 0), "load").unwrap();

    // A one-record stream fits in the socket buffer, so the node can
    // connect, write and exit before the accept loop ever polls; the
    // connection waiting in the listen backlog must still be picked up.
    for _ in 0..10 {
        let mut bridge = GeneratorBridge::open(&params).unwrap();
        assert_eq!(bridge.next_line().unwrap().as_deref(), Some("load|0|0"));
        bridge.close();
    }
}

#[test]
fn test_concurrent_bridges_do_not_collide() {
    let install = FakeInstall::new("wordgen");
    install.write_properties("mock.line-count=50\n");
    let base = TaskParameters::resolve(&install.request(2, 0), "load").unwrap();

    // Both bridges are open at the same time on this host; ephemeral port
    // allocation must keep their data and progress channels apart.
    let mut first = GeneratorBridge::open(&base).unwrap();
    let mut second = GeneratorBridge::open(&base.for_partition(1).unwrap()).unwrap();

    let first_lines = drain(&mut first);
    let second_lines = drain(&mut second);
    assert_eq!(first_lines.len(), 50);
    assert_eq!(second_lines.len(), 50);
    assert_eq!(first_lines[0], "load|0|0");
    assert_eq!(second_lines[0], "load|1|0");

    first.close();
    second.close();
}

#[test]
fn test_close_is_idempotent() {
    let install = FakeInstall::new("wordgen");
    install.write_properties("mock.line-count=5\n");
    let params = TaskParameters::resolve(&install.request(1, 0), "load").unwrap();

    let mut bridge = GeneratorBridge::open(&params).unwrap();
    drain(&mut bridge);
    bridge.close();

    // Second close must neither hang nor panic, and the bridge stays usable
    // as a closed handle.
    bridge.close();
    assert_eq!(bridge.next_line().unwrap(), None);
    assert_eq!(bridge.progress(), None);
}

#[test]
fn test_close_without_draining_completes() {
    let install = FakeInstall::new("wordgen");
    install.write_properties("mock.line-count=200000\n");
    let params = TaskParameters::resolve(&install.request(1, 0), "load").unwrap();

    // Closing while the generator may still be streaming must complete
    // within the bounded shutdown waits instead of hanging.
    let mut bridge = GeneratorBridge::open(&params).unwrap();
    assert!(bridge.next_line().unwrap().is_some());
    bridge.close();
}
