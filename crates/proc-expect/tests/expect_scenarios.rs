//! Expectation semantics against live processes.

mod common;

use std::time::{Duration, Instant};

use common::spawn_child;
use proc_expect::{
    PatternSource, ProcessSession, StaticSource, property_equals, property_unknown,
};

#[test]
fn ready_matches_well_before_deadline() {
    let session = spawn_child();

    let start = Instant::now();
    let matched = session
        .expect_within(&["ready"], Duration::from_secs(2), false)
        .unwrap();

    assert!(matched);
    assert!(start.elapsed() < Duration::from_millis(1900));
}

#[test]
fn unmatched_pattern_times_out_and_is_logged() {
    let session = spawn_child();

    let start = Instant::now();
    let matched = session
        .expect_within(&["goodbye"], Duration::from_secs(1), false)
        .unwrap();
    let elapsed = start.elapsed();

    assert!(!matched);
    // No earlier than the deadline, no more than a few poll intervals late.
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_millis(2500));

    let comments: Vec<String> = session
        .log()
        .events()
        .into_iter()
        .map(|e| e.text)
        .collect();
    assert!(
        comments
            .iter()
            .any(|t| t.contains("TIMEOUT") && t.contains("goodbye"))
    );
}

#[test]
fn consumed_output_never_rematches() {
    let session = spawn_child();
    session.send("ping").unwrap();

    assert!(session.expect("^pong$").unwrap());

    // Nothing new arrived; the same pattern must not match again.
    let again = session
        .expect_within(&["^pong$"], Duration::from_millis(500), false)
        .unwrap();
    assert!(!again);
}

#[test]
fn all_patterns_must_match_in_any_order() {
    let session = spawn_child();
    session.send("alpha").unwrap();
    session.send("beta").unwrap();

    assert!(session.expect_all(&["^beta$", "^alpha$"]).unwrap());
}

#[test]
fn stderr_is_merged_into_the_stream() {
    let session = spawn_child();
    session.send("stderr oops").unwrap();

    assert!(session.expect("^oops$").unwrap());
}

#[test]
fn closed_stream_fails_fast() {
    common::init();
    let session = ProcessSession::spawn("/bin/sh", &["-c", "echo done"]).unwrap();
    assert!(session.expect("^done$").unwrap());

    let start = Instant::now();
    let matched = session
        .expect_within(&["more"], Duration::from_secs(10), false)
        .unwrap();

    assert!(!matched);
    // The stream closed, so the call returns long before the deadline.
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[test]
fn property_patterns_against_a_live_tool() {
    common::init();
    let session = ProcessSession::spawn(
        "/bin/sh",
        &["-c", "echo 'volume = int:11'; echo 'shuffle = Unknown'"],
    )
    .unwrap();

    let matched = session
        .expect_within(
            &[
                &property_equals("volume", "int", "11"),
                &property_unknown("shuffle"),
            ],
            Duration::from_secs(2),
            false,
        )
        .unwrap();
    assert!(matched);
}

#[test]
fn pattern_source_backends_agree() {
    fn run(source: &mut impl PatternSource) -> bool {
        source
            .expect_patterns(&["^pong$"], Duration::from_secs(5), false)
            .unwrap()
    }

    let mut live = spawn_child();
    live.send("ping").unwrap();
    assert!(run(&mut live));

    let mut saved = StaticSource::new("ping\npong\n");
    assert!(run(&mut saved));
}

#[test]
fn invalid_pattern_is_a_hard_error() {
    let session = spawn_child();
    assert!(session.expect("(unclosed").is_err());
}
