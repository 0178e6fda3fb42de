use crate::{ArmLink, LinkError, PortInfo, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// An in-process loopback link.
///
/// Cloning yields another handle to the same port state, so a test can keep
/// a probe while the session owns the link: inbound bytes are scripted with
/// [`MockLink::push_rx`], outbound lines are inspected with
/// [`MockLink::sent`], and write failures can be injected to exercise the
/// degraded paths.
#[derive(Clone)]
pub struct MockLink {
    name: Arc<str>,
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    rx: VecDeque<Vec<u8>>,
    sent: Vec<String>,
    fail_writes: bool,
    fail_reads: bool,
}

impl MockLink {
    /// Queue one chunk of inbound bytes; each chunk is returned by exactly
    /// one subsequent `read_available` call, mirroring how a real port
    /// surfaces whatever arrived between polls.
    pub fn push_rx(&self, chunk: impl Into<Vec<u8>>) {
        self.state().rx.push_back(chunk.into());
    }

    /// All lines written so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    /// Make every subsequent `write_line` fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Make every subsequent `read_available` fail with an I/O error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ArmLink for MockLink {
    fn open(path: &str, _baud: u32) -> Result<Self> {
        Ok(Self {
            name: Arc::from(path),
            inner: Arc::new(Mutex::new(MockState::default())),
        })
    }

    fn list() -> Result<Vec<PortInfo>> {
        Ok(vec![PortInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut st = self.state();
        if st.fail_writes {
            return Err(LinkError::Io("injected write failure".to_string()));
        }
        debug!(port = %self.name, bytes = line.len(), "mock write");
        st.sent.push(line.to_string());
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut st = self.state();
        if st.fail_reads {
            return Err(LinkError::Io("injected read failure".to_string()));
        }
        Ok(st.rx.pop_front().unwrap_or_default())
    }
}
