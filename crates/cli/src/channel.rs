//! `Channel`: the mutable, per-`Formula` runtime state the run controller
//! owns from process start to join.

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Started,
    Ended,
}

/// Runtime state for one channel. `formula` is looked up by name from the
/// controller rather than borrowed here, so `Channel` stays `'static` and
/// easy to hand to tasks.
#[derive(Debug)]
pub struct Channel {
    pub name: String,
    pub state: State,
    pub pid: Option<u32>,
    pub started_at: Option<Instant>,
    pub ended_at: Option<Instant>,
    pub exit_code: Option<i32>,
}

impl Channel {
    pub fn new(name: String) -> Self {
        Self {
            name,
            state: State::Pending,
            pid: None,
            started_at: None,
            ended_at: None,
            exit_code: None,
        }
    }

    pub fn mark_started(&mut self, pid: u32, at: Instant) {
        debug_assert_eq!(self.state, State::Pending);
        self.pid = Some(pid);
        self.started_at = Some(at);
        self.state = State::Started;
    }

    pub fn mark_ended(&mut self, exit_code: i32, at: Instant) {
        debug_assert_eq!(self.state, State::Started);
        self.exit_code = Some(exit_code);
        self.ended_at = Some(at);
        self.state = State::Ended;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transitions_are_monotonic() {
        let mut ch = Channel::new("A".to_string());
        assert_eq!(ch.state, State::Pending);
        ch.mark_started(123, Instant::now());
        assert_eq!(ch.state, State::Started);
        assert_eq!(ch.pid, Some(123));
        ch.mark_ended(0, Instant::now());
        assert_eq!(ch.state, State::Ended);
        assert_eq!(ch.exit_code, Some(0));
    }
}
