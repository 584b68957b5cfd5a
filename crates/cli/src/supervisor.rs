//! Process supervisor: spawns one channel's child as its own process-group
//! leader, pumps its stdout/stderr into the emitter, waits for exit, and
//! drives the escalating termination protocol on shutdown.

use std::process::Stdio;
use std::time::Duration;

use command_group::AsyncCommandGroup;
use multiplex_core::{Action, Formula};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::bus::EventBus;
use crate::emitter::{Emitter, Kind, Record};

const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Outcome of running one child to completion.
pub struct Outcome {
    pub exit_code: i32,
    pub requests_shutdown: bool,
}

/// Spawns `formula`'s command, streams its output through `emitter`, and
/// resolves once the child has exited. Fires `STARTED`/`ENDED` on `bus` at
/// the appropriate points. Reports the pid on `pid_tx` as soon as it is
/// known, so the run controller can register a termination target without
/// waiting for this future to complete. Does not itself watch for shutdown —
/// callers race the controller's termination protocol against it instead.
pub async fn run(
    formula: &Formula,
    bus: &EventBus,
    emitter: &Emitter,
    pid_tx: tokio::sync::oneshot::Sender<Option<u32>>,
) -> Outcome {
    let name = formula.name.as_deref().expect("names must be assigned");
    let silent = formula.actions.contains(&Action::Silent);
    let noout = silent || formula.actions.contains(&Action::Noout);
    let noerr = silent || formula.actions.contains(&Action::Noerr);

    let mut cmd = Command::new(&formula.argv[0]);
    cmd.args(&formula.argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.group_spawn() {
        Ok(child) => child,
        Err(e) => {
            emitter
                .message(&format!("{name}: failed to spawn: {e}"))
                .await;
            bus.fire_ended(name, -1);
            let _ = pid_tx.send(None);
            return Outcome {
                exit_code: -1,
                requests_shutdown: formula.actions.contains(&Action::End),
            };
        }
    };

    let pid = child.id();
    let _ = pid_tx.send(pid);
    bus.fire_started(name);
    emitter
        .emit(Record {
            kind: Kind::Spawn,
            name,
            color: formula.color,
            payload: &formula.argv.join(" "),
        })
        .await;
    tracing::debug!(channel = name, ?pid, "spawned");

    let stdout = child.inner().stdout.take();
    let stderr = child.inner().stderr.take();

    let stdout_pump = pump(stdout, emitter, name, formula.color, Kind::Stdout, noout);
    let stderr_pump = pump(stderr, emitter, name, formula.color, Kind::Stderr, noerr);

    let (_, _, wait_result) = tokio::join!(stdout_pump, stderr_pump, child.wait());

    let exit_code = match wait_result {
        Ok(status) => exit_code_of(status),
        Err(e) => {
            emitter.message(&format!("{name}: wait failed: {e}")).await;
            -1
        }
    };

    emitter
        .emit(Record {
            kind: Kind::Exit,
            name,
            color: formula.color,
            payload: &exit_code.to_string(),
        })
        .await;
    bus.fire_ended(name, exit_code);

    Outcome {
        exit_code,
        requests_shutdown: formula.actions.contains(&Action::End),
    }
}

#[cfg(unix)]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match status.code() {
        Some(code) => code,
        None => -status.signal().unwrap_or(0),
    }
}

#[cfg(not(unix))]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

async fn pump<R>(
    pipe: Option<R>,
    emitter: &Emitter,
    name: &str,
    color: Option<multiplex_core::Color>,
    kind: Kind,
    suppressed: bool,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let Some(pipe) = pipe else { return };
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !suppressed {
                    emitter
                        .emit(Record {
                            kind,
                            name,
                            color,
                            payload: &line,
                        })
                        .await;
                }
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }
}

/// Escalating termination: SIGINT, wait up to the grace period, SIGTERM,
/// wait again, SIGKILL. `pid` is the child's pid, which `command-group`
/// makes equal to its process group id. Each grace wait races the sleep
/// against `bus`'s `ENDED` signal for `name`, so termination returns as
/// soon as the child actually exits instead of always paying the full
/// grace period.
pub async fn terminate(name: &str, pid: u32, bus: &EventBus, emitter: &Emitter) {
    let pgid = Pid::from_raw(pid as i32);

    if send_signal(name, pgid, Signal::SIGINT, emitter).await {
        return;
    }
    if wait_ended_or_timeout(bus, name, GRACE_PERIOD).await {
        return;
    }

    if send_signal(name, pgid, Signal::SIGTERM, emitter).await {
        return;
    }
    if wait_ended_or_timeout(bus, name, GRACE_PERIOD).await {
        return;
    }

    send_signal(name, pgid, Signal::SIGKILL, emitter).await;
}

/// Waits until `bus` fires `ENDED` for `name` or `timeout` elapses,
/// whichever comes first. Returns `true` if the child ended.
async fn wait_ended_or_timeout(bus: &EventBus, name: &str, timeout: Duration) -> bool {
    tokio::select! {
        _ = bus.await_ended(name) => true,
        _ = tokio::time::sleep(timeout) => false,
    }
}

/// Best-effort: a failure here (e.g. the group already reaped) just means
/// there was nothing left to signal, so treat it as "done".
async fn send_signal(name: &str, pgid: Pid, signal: Signal, emitter: &Emitter) -> bool {
    match killpg(pgid, signal) {
        Ok(()) => false,
        Err(nix::errno::Errno::ESRCH) => true,
        Err(e) => {
            emitter
                .message(&format!("{name}: failed to send {signal}: {e}"))
                .await;
            false
        }
    }
}

/// Best-effort final scan for descendants of `own_pid` (the supervisor
/// process's own pid) that group-wide signaling may have missed because
/// they were re-parented to init after their original parent exited.
/// Linux-only; logged via `tracing::warn!` and otherwise ignored, including
/// on any `/proc` read failure.
#[cfg(target_os = "linux")]
pub fn reap_orphans(own_pid: u32) {
    let entries = match std::fs::read_dir("/proc") {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "orphan scan: failed to read /proc");
            return;
        }
    };

    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        let Some(ppid) = parse_ppid(&stat) else {
            continue;
        };
        if ppid == own_pid {
            tracing::warn!(pid, ppid, "orphaned descendant still running after shutdown");
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn reap_orphans(_own_pid: u32) {}

/// Parses the `ppid` field (the 4th whitespace-separated field) out of a
/// `/proc/<pid>/stat` line. The 2nd field (`comm`) is parenthesized and may
/// itself contain spaces or parens, so field splitting starts after the
/// last `)`.
#[cfg(target_os = "linux")]
fn parse_ppid(stat: &str) -> Option<u32> {
    let close = stat.rfind(')')?;
    let mut fields = stat[close + 1..].split_whitespace();
    fields.next()?; // state
    fields.next()?.parse().ok()
}
