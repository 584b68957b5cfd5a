//! Run controller: the top-level orchestrator tying scheduler, supervisor,
//! and emitter together across every channel in one run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use multiplex_core::Formula;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;
use crate::channel::{Channel, State};
use crate::emitter::Emitter;
use crate::scheduler;
use crate::supervisor;

pub const EXIT_TIMEOUT: i32 = 124;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Drives every channel to completion and returns the process exit code.
pub async fn run(formulas: Vec<Formula>, emitter: Emitter, timeout: Option<Duration>) -> i32 {
    let names: Vec<String> = formulas
        .iter()
        .map(|f| f.name.clone().expect("names must be assigned"))
        .collect();

    let bus = Arc::new(EventBus::new(names));
    let emitter = Arc::new(emitter);
    let shutdown = CancellationToken::new();

    let user_interrupted = Arc::new(AtomicBool::new(false));
    let timed_out = Arc::new(AtomicBool::new(false));
    let end_exit_code: Arc<OnceLock<i32>> = Arc::new(OnceLock::new());

    spawn_signal_listener(shutdown.clone(), emitter.clone(), user_interrupted.clone());
    if let Some(timeout) = timeout {
        spawn_timeout(shutdown.clone(), emitter.clone(), timeout, timed_out.clone());
    }

    let mut tasks: JoinSet<Channel> = JoinSet::new();
    for formula in formulas {
        tasks.spawn(run_channel(
            formula,
            bus.clone(),
            emitter.clone(),
            shutdown.clone(),
            end_exit_code.clone(),
        ));
    }

    let mut channels = Vec::new();
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(channel) => channels.push(channel),
            Err(e) => tracing::error!(error = %e, "channel task panicked"),
        }
    }

    supervisor::reap_orphans(std::process::id());

    if user_interrupted.load(Ordering::SeqCst) {
        return EXIT_INTERRUPTED;
    }
    if timed_out.load(Ordering::SeqCst) {
        return EXIT_TIMEOUT;
    }
    if let Some(code) = end_exit_code.get() {
        return *code;
    }

    let ended: Vec<&Channel> = channels.iter().filter(|c| c.state == State::Ended).collect();
    if ended.iter().all(|c| c.exit_code == Some(0)) {
        0
    } else {
        1
    }
}

/// Runs one channel end to end: wait for its start condition, spawn and
/// supervise it, and race its lifetime against cooperative shutdown.
async fn run_channel(
    formula: Formula,
    bus: Arc<EventBus>,
    emitter: Arc<Emitter>,
    shutdown: CancellationToken,
    end_exit_code: Arc<OnceLock<i32>>,
) -> Channel {
    let name = formula.name.clone().expect("names must be assigned");
    let mut channel = Channel::new(name.clone());

    if !scheduler::await_start(&bus, &formula, &shutdown).await {
        emitter.message(&format!("{name}: not started")).await;
        return channel;
    }

    let (pid_tx, pid_rx) = tokio::sync::oneshot::channel();
    let run_fut = supervisor::run(&formula, &bus, &emitter, pid_tx);
    tokio::pin!(run_fut);

    let pid = tokio::select! {
        biased;
        p = pid_rx => p.unwrap_or(None),
        outcome = &mut run_fut => {
            finish(&mut channel, outcome, &end_exit_code, &shutdown);
            return channel;
        }
    };
    if let Some(pid) = pid {
        channel.mark_started(pid, tokio::time::Instant::now());
    }

    let outcome = tokio::select! {
        outcome = &mut run_fut => outcome,
        _ = shutdown.cancelled() => {
            if let Some(pid) = pid {
                emitter.message(&format!("{name}: still running, stopping")).await;
                supervisor::terminate(&name, pid, &bus, &emitter).await;
            }
            run_fut.await
        }
    };

    finish(&mut channel, outcome, &end_exit_code, &shutdown);
    channel
}

/// Records a channel's terminal state and, if its Formula carries the `END`
/// action, sets the process exit code and requests shutdown for every other
/// channel.
fn finish(
    channel: &mut Channel,
    outcome: supervisor::Outcome,
    end_exit_code: &OnceLock<i32>,
    shutdown: &CancellationToken,
) {
    if channel.state == State::Pending {
        // Spawn failed before `mark_started` ever ran (e.g. exec not found).
        channel.state = State::Started;
    }
    channel.mark_ended(outcome.exit_code, tokio::time::Instant::now());
    if outcome.requests_shutdown {
        let _ = end_exit_code.set(outcome.exit_code);
        shutdown.cancel();
    }
}

fn spawn_signal_listener(
    shutdown: CancellationToken,
    emitter: Arc<Emitter>,
    user_interrupted: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        wait_for_interrupt().await;
        user_interrupted.store(true, Ordering::SeqCst);
        emitter.message("interrupt").await;
        shutdown.cancel();
    });
}

fn spawn_timeout(
    shutdown: CancellationToken,
    emitter: Arc<Emitter>,
    timeout: Duration,
    timed_out: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                timed_out.store(true, Ordering::SeqCst);
                emitter.message("timeout").await;
                shutdown.cancel();
            }
            _ = shutdown.cancelled() => {}
        }
    });
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_interrupt() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
