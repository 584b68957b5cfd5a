//! Structured output emitter: serializes lifecycle and I/O records onto a
//! single stdout stream using the `[TS│]KIND│NAME│PAYLOAD` line grammar.

use std::io::{self, IsTerminal, Write};
use std::time::Instant;

use multiplex_core::Color;
use tokio::sync::Mutex;

const FIELD_SEP: char = '│';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Spawn,
    Stdout,
    Stderr,
    Exit,
    Message,
}

impl Kind {
    fn as_char(self) -> char {
        match self {
            Kind::Spawn => '$',
            Kind::Stdout => '<',
            Kind::Stderr => '!',
            Kind::Exit => '=',
            Kind::Message => '*',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMode {
    Off,
    Absolute,
    Relative,
}

pub struct Record<'a> {
    pub kind: Kind,
    pub name: &'a str,
    pub color: Option<Color>,
    pub payload: &'a str,
}

/// Serializes writes to stdout behind an async mutex so concurrent channel
/// tasks never interleave mid-line.
pub struct Emitter {
    out: Mutex<io::Stdout>,
    time_mode: TimeMode,
    color_enabled: bool,
    start: Instant,
}

impl Emitter {
    pub fn new(time_mode: TimeMode, start: Instant) -> Self {
        let color_enabled = io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self {
            out: Mutex::new(io::stdout()),
            time_mode,
            color_enabled,
            start,
        }
    }

    fn timestamp(&self) -> Option<String> {
        match self.time_mode {
            TimeMode::Off => None,
            TimeMode::Absolute => Some(chrono::Local::now().format("%H:%M:%S").to_string()),
            TimeMode::Relative => {
                let elapsed = self.start.elapsed();
                let total = elapsed.as_secs();
                Some(format!(
                    "{:02}:{:02}:{:02}",
                    total / 3600,
                    (total % 3600) / 60,
                    total % 60
                ))
            }
        }
    }

    pub async fn emit(&self, record: Record<'_>) {
        let mut line = String::new();
        if let Some(ts) = self.timestamp() {
            line.push_str(&ts);
            line.push('|');
        }
        line.push(record.kind.as_char());
        line.push(FIELD_SEP);

        if self.color_enabled {
            if let Some(color) = record.color {
                line.push_str(&color.sgr());
                line.push_str(record.name);
                line.push_str(multiplex_core::color::RESET);
            } else {
                line.push_str(record.name);
            }
        } else {
            line.push_str(record.name);
        }
        line.push(FIELD_SEP);
        line.push_str(record.payload);
        line.push('\n');

        let mut out = self.out.lock().await;
        let _ = out.write_all(line.as_bytes());
        let _ = out.flush();
    }

    pub async fn message(&self, text: &str) {
        self.emit(Record {
            kind: Kind::Message,
            name: "*",
            color: None,
            payload: text,
        })
        .await;
    }
}
