//! End-to-end tests driving the built `multiplex` binary, following the
//! `assert_cmd` + `predicates` style used by comparable process-runner CLIs
//! for black-box coverage of the stdout line grammar.

use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;

fn multiplex() -> Command {
    Command::cargo_bin("multiplex").unwrap()
}

#[test]
fn simple_command_emits_spawn_output_and_exit_records() {
    multiplex()
        .arg("A=echo hello")
        .timeout(Duration::from_secs(5))
        .assert()
        .success()
        .stdout(predicate::str::contains("$│A│echo hello"))
        .stdout(predicate::str::contains("<│A│hello"))
        .stdout(predicate::str::contains("=│A│0"));
}

#[test]
fn auto_assigns_name_when_prefix_is_empty() {
    multiplex()
        .arg("=echo a=b")
        .timeout(Duration::from_secs(5))
        .assert()
        .success()
        .stdout(predicate::str::contains("$│A│echo a=b"))
        .stdout(predicate::str::contains("<│A│a=b"));
}

#[test]
fn dependent_channel_starts_after_its_target_ends() {
    let output = multiplex()
        .args(["A=echo first", "B:A=echo second"])
        .timeout(Duration::from_secs(5))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();

    let a_end = text.find("=│A│0").expect("A should have exited");
    let b_spawn = text.find("$│B│echo second").expect("B should have spawned");
    assert!(
        b_spawn > a_end,
        "B must spawn only after A's exit record:\n{text}"
    );
}

#[test]
fn silent_action_suppresses_stdout_and_stderr_lines() {
    multiplex()
        .arg("A|silent=echo should-not-appear")
        .timeout(Duration::from_secs(5))
        .assert()
        .success()
        .stdout(predicate::str::contains("$│A│").and(predicate::str::contains("=│A│0")))
        .stdout(predicate::str::contains("should-not-appear").not());
}

#[test]
fn noout_only_suppresses_stdout_not_exit_record() {
    multiplex()
        .arg("A|noout=echo quiet")
        .timeout(Duration::from_secs(5))
        .assert()
        .success()
        .stdout(predicate::str::contains("quiet").not())
        .stdout(predicate::str::contains("=│A│0"));
}

#[test]
fn timeout_option_stops_a_long_running_child_with_exit_124() {
    multiplex()
        .args(["--timeout", "0.2", "A=sleep 30"])
        .timeout(Duration::from_secs(10))
        .assert()
        .code(124)
        .stdout(predicate::str::contains("timeout"));
}

#[test]
fn end_action_drives_the_process_exit_code() {
    multiplex()
        .arg("A|end=false")
        .timeout(Duration::from_secs(5))
        .assert()
        .failure()
        .code(predicate::eq(1));
}

#[test]
fn relative_timestamps_prefix_every_line() {
    let output = multiplex()
        .args(["--relative", "A=echo hi"])
        .timeout(Duration::from_secs(5))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    let first_line = text.lines().next().expect("at least one line of output");
    let (ts, rest) = first_line.split_once('|').expect("timestamp separator");
    assert_eq!(ts.len(), 8, "expected HH:MM:SS, got {ts:?}");
    assert!(ts.chars().filter(|c| *c == ':').count() == 2);
    assert!(rest.starts_with("$│A│"), "line was {first_line:?}");
}

#[test]
fn end_action_shuts_down_a_still_running_sibling() {
    multiplex()
        .args(["SRV|silent=sleep 30", "+0.2|end=echo done"])
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("done"));
}

#[test]
fn malformed_command_expression_exits_2() {
    multiplex()
        .arg("A|bogus=echo hi")
        .timeout(Duration::from_secs(5))
        .assert()
        .code(2);
}
