//! Event bus: per-channel latched `STARTED`/`ENDED` signals that many
//! schedulers can await concurrently.

use std::collections::HashMap;
use std::sync::OnceLock;

use tokio::sync::Notify;

/// A one-shot signal that remembers whether it already fired, so a
/// subscriber that registers late still observes it immediately instead of
/// missing the wakeup.
struct Latch<T> {
    notify: Notify,
    value: OnceLock<T>,
}

impl<T: Clone> Latch<T> {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            value: OnceLock::new(),
        }
    }

    /// Idempotent: the first call wins, later calls are ignored.
    fn fire(&self, value: T) {
        if self.value.set(value).is_ok() {
            self.notify.notify_waiters();
        }
    }

    async fn wait(&self) -> T {
        loop {
            if let Some(v) = self.value.get() {
                return v.clone();
            }
            let notified = self.notify.notified();
            // Re-check after registering the waiter so a `fire` that lands
            // between the first `get` and here isn't missed.
            if let Some(v) = self.value.get() {
                return v.clone();
            }
            notified.await;
        }
    }
}

struct ChannelSignals {
    started: Latch<()>,
    ended: Latch<i32>,
}

/// Registry of every channel's `STARTED`/`ENDED` latches, built once the full
/// set of channel names is known (after parsing and auto-naming) and shared
/// read-only for the rest of the run.
pub struct EventBus {
    channels: HashMap<String, ChannelSignals>,
}

impl EventBus {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        let channels = names
            .into_iter()
            .map(|name| {
                (
                    name,
                    ChannelSignals {
                        started: Latch::new(),
                        ended: Latch::new(),
                    },
                )
            })
            .collect();
        Self { channels }
    }

    fn signals(&self, name: &str) -> &ChannelSignals {
        self.channels
            .get(name)
            .unwrap_or_else(|| panic!("unknown channel {name:?} queried on event bus"))
    }

    pub fn fire_started(&self, name: &str) {
        self.signals(name).started.fire(());
    }

    pub fn fire_ended(&self, name: &str, exit_code: i32) {
        self.signals(name).ended.fire(exit_code);
    }

    pub async fn await_started(&self, name: &str) {
        self.signals(name).started.wait().await;
    }

    /// Resolves to the channel's exit code once it has ended.
    pub async fn await_ended(&self, name: &str) -> i32 {
        self.signals(name).ended.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn fires_before_wait_is_observed_immediately() {
        let bus = EventBus::new(["A".to_string()]);
        bus.fire_started("A");
        bus.await_started("A").await; // must not hang
    }

    #[tokio::test]
    async fn wait_before_fire_wakes_on_fire() {
        let bus = Arc::new(EventBus::new(["A".to_string()]));
        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.await_ended("A").await })
        };
        tokio::task::yield_now().await;
        bus.fire_ended("A", 7);
        assert_eq!(waiter.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn fire_is_idempotent() {
        let bus = EventBus::new(["A".to_string()]);
        bus.fire_ended("A", 1);
        bus.fire_ended("A", 2);
        assert_eq!(bus.await_ended("A").await, 1);
    }

    #[tokio::test]
    #[should_panic(expected = "unknown channel")]
    async fn unknown_channel_panics() {
        let bus = EventBus::new(["A".to_string()]);
        bus.await_started("NOPE").await;
    }
}
