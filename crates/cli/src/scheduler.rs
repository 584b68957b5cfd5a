//! Start-condition evaluator: resolves once a channel's dependency and
//! delay clauses are all satisfied, or the run is shutting down first.

use std::time::Duration;

use multiplex_core::{Dep, Formula, On};
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;

/// Waits for one `Dep` to be satisfied: the target reaching the requested
/// state (if any), then the dep's own trailing delay, counted from the
/// moment the target condition was met.
async fn wait_dep(bus: &EventBus, dep: &Dep) {
    if !dep.target.is_empty() {
        match dep.on {
            On::Start => bus.await_started(&dep.target).await,
            On::End => {
                bus.await_ended(&dep.target).await;
            }
        }
    }
    let after = dep.after_sum();
    if after > Duration::ZERO {
        tokio::time::sleep(after).await;
    }
}

/// Resolves to `true` once every dep and the top-level start delay have
/// elapsed, or `false` if `shutdown` fires first (the caller must not spawn
/// the channel's process in that case).
pub async fn await_start(bus: &EventBus, formula: &Formula, shutdown: &CancellationToken) -> bool {
    let deps = futures::future::join_all(formula.deps.iter().map(|dep| wait_dep(bus, dep)));
    let top_level_delay = tokio::time::sleep(formula.start_delay_sum());

    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = async {
            tokio::join!(deps, top_level_delay);
        } => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplex_core::parse_formula;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn fires_immediately_with_no_conditions() {
        let bus = EventBus::new(["A".to_string()]);
        let formula = parse_formula("A=echo hi").unwrap();
        let shutdown = CancellationToken::new();
        let started = Instant::now();
        assert!(await_start(&bus, &formula, &shutdown).await);
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn waits_for_dep_end_plus_delay() {
        let bus = Arc::new(EventBus::new(["A".to_string(), "B".to_string()]));
        let formula = parse_formula("B:A+50ms=echo b").unwrap();
        let shutdown = CancellationToken::new();

        let bus2 = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            bus2.fire_ended("A", 0);
        });

        let start = Instant::now();
        assert!(await_start(&bus, &formula, &shutdown).await);
        assert!(start.elapsed() >= Duration::from_millis(95));
    }

    #[tokio::test]
    async fn top_level_delay_and_dep_delay_both_must_elapse() {
        // +200 is the larger of the two, so total wait should be ~200ms,
        // not merely the dep's +10ms.
        let bus = Arc::new(EventBus::new(["A".to_string(), "B".to_string()]));
        bus.fire_ended("A", 0);
        let formula = parse_formula("+200ms:A+10ms=echo b").unwrap();
        let shutdown = CancellationToken::new();

        let start = Instant::now();
        assert!(await_start(&bus, &formula, &shutdown).await);
        assert!(start.elapsed() >= Duration::from_millis(190));
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_wait() {
        let bus = EventBus::new(["A".to_string(), "B".to_string()]);
        let formula = parse_formula("B:A=echo b").unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        assert!(!await_start(&bus, &formula, &shutdown).await);
    }
}
