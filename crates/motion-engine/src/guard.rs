use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Issues run tokens and remembers only the newest one. Starting a run
/// invalidates every token handed out before it, which is how in-flight
/// animations learn they have been superseded: they compare their token at
/// each frame boundary and stop delivering stale frames.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    generation: Arc<AtomicU64>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run, invalidating all earlier tokens.
    pub fn begin(&self) -> RunToken {
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken {
            generation: Arc::clone(&self.generation),
            id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunToken {
    generation: Arc<AtomicU64>,
    id: u64,
}

impl RunToken {
    /// Whether this token still belongs to the newest run.
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.id
    }
}

/// Cooperative stop flag, checked at frame and step boundaries. Once set it
/// stays set; a new token is created per run that wants independent control.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
