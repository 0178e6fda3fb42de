use crate::{CancelToken, SharedLink};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::debug;

pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Default telemetry polling period.
pub const DEFAULT_POLL_MS: u64 = 100;

/// Most bytes the reader will hold back waiting for a line terminator.
pub const MAX_CARRY_BYTES: usize = 4096;

/// Which way a line crossed the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rx,
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rx => write!(f, "RX"),
            Direction::Tx => write!(f, "TX"),
        }
    }
}

/// One recorded wire line with the moment it was seen.
#[derive(Debug, Clone)]
pub struct TrafficEntry {
    pub direction: Direction,
    pub line: String,
    pub at: OffsetDateTime,
}

type Observer = Arc<dyn Fn(&TrafficEntry) + Send + Sync>;

/// Bounded in-memory record of wire traffic, shared between the player
/// (which records TX) and the telemetry reader (which records RX). A surface
/// can attach one observer to mirror entries live; the ring keeps the most
/// recent entries for inspection or export either way.
#[derive(Clone)]
pub struct TrafficLog {
    inner: Arc<Mutex<LogState>>,
}

struct LogState {
    entries: VecDeque<TrafficEntry>,
    capacity: usize,
    observer: Option<Observer>,
}

impl TrafficLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogState {
                entries: VecDeque::new(),
                capacity: capacity.max(1),
                observer: None,
            })),
        }
    }

    pub fn record(&self, direction: Direction, line: impl Into<String>) {
        let entry = TrafficEntry {
            direction,
            line: line.into(),
            at: OffsetDateTime::now_utc(),
        };
        debug!(dir = %entry.direction, line = %entry.line, "wire");
        // The observer runs outside the lock so it may itself read the log.
        let observer = {
            let mut st = self.state();
            if st.entries.len() == st.capacity {
                st.entries.pop_front();
            }
            st.entries.push_back(entry.clone());
            st.observer.clone()
        };
        if let Some(observer) = observer {
            observer(&entry);
        }
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<TrafficEntry> {
        self.state().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    pub fn clear(&self) {
        self.state().entries.clear();
    }

    /// Mirror every subsequent entry to `observer` as it is recorded.
    pub fn set_observer(&self, observer: impl Fn(&TrafficEntry) + Send + Sync + 'static) {
        self.state().observer = Some(Arc::new(observer));
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TrafficLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

/// Polls the transport on a fixed cadence and turns whatever the controller
/// said into `Rx` log entries.
///
/// Each tick drains all currently buffered bytes; a quiet controller or a
/// disconnected link makes the tick a no-op and polling simply continues.
/// There is no backoff and no reconnect here — plugging the link back in is
/// the session's business. Bytes after the last line terminator are carried
/// to the next tick, so a line straddling two polls is emitted once, whole.
pub struct TelemetryReader {
    link: SharedLink,
    log: TrafficLog,
    period: Duration,
    carry: Vec<u8>,
}

impl TelemetryReader {
    pub fn new(link: SharedLink, log: TrafficLog, period: Duration) -> Self {
        Self {
            link,
            log,
            period,
            carry: Vec::new(),
        }
    }

    /// Drain the link once and record every complete non-blank line.
    pub fn tick(&mut self) {
        let drained = {
            let mut guard = self.link.lock().unwrap_or_else(PoisonError::into_inner);
            match guard.as_mut() {
                Some(link) => match link.read_available() {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        debug!(error = %e, "telemetry poll failed; will poll again");
                        return;
                    }
                },
                None => return,
            }
        };
        if drained.is_empty() {
            return;
        }
        self.carry.extend_from_slice(&drained);
        if let Some(cut) = self.carry.iter().rposition(|&b| b == b'\n') {
            let complete: Vec<u8> = self.carry.drain(..=cut).collect();
            for raw in complete.split(|&b| b == b'\n') {
                let line = decode_dropping_invalid(raw);
                let line = line.trim_end_matches('\r');
                if line.trim().is_empty() {
                    continue;
                }
                self.log.record(Direction::Rx, line);
            }
        }
        // A controller that streams without ever terminating a line is not
        // speaking the protocol; drop the tail instead of hoarding it.
        if self.carry.len() > MAX_CARRY_BYTES {
            debug!(dropped = self.carry.len(), "unterminated telemetry tail over cap; dropping");
            self.carry.clear();
        }
    }

    /// Poll until cancelled. Runs cooperatively on the session's loop; the
    /// suspension between ticks is the polling period itself.
    pub async fn run(mut self, cancel: CancelToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            self.tick();
            tokio::time::sleep(self.period).await;
        }
    }
}

/// UTF-8 decode that drops invalid sequences instead of replacing or
/// erroring, so a glitchy controller never poisons the log.
fn decode_dropping_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match core::str::from_utf8(bytes) {
            Ok(s) => {
                out.push_str(s);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                if let Ok(s) = core::str::from_utf8(valid) {
                    out.push_str(s);
                }
                let skip = e.error_len().unwrap_or(rest.len());
                if skip >= rest.len() {
                    return out;
                }
                bytes = &rest[skip..];
            }
        }
    }
}
