//! Hardware backend abstraction.
//!
//! A backend is whatever delivers register bytes to a real or virtual PSG:
//! GPIO wiring, an emulator core, a capture buffer. The driver never talks
//! to a backend directly — it emits through a [`DriverSink`], and
//! [`BackendSink`] bridges the two while honoring the contract that backend
//! failures never propagate back into the interpreter.
//!
//! Lifecycle: `init` (process-local resources) → `enable` (external side
//! effects allowed) → `reset`/`write_reg` while enabled → `disable`.

use crate::events::DriverSink;

/// Longest last-error text a backend is expected to retain.
pub const LAST_ERROR_MAXLEN: usize = 256;

/// Errors reported by backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Operation requires `enable` to have succeeded first.
    #[error("backend is not enabled")]
    NotEnabled,

    /// IO error from the device path.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else, backend-specific.
    #[error("{0}")]
    Other(String),
}

impl From<String> for BackendError {
    fn from(msg: String) -> Self {
        BackendError::Other(msg)
    }
}

impl From<&str> for BackendError {
    fn from(msg: &str) -> Self {
        BackendError::Other(msg.to_string())
    }
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Operations a PSG backend provides to the host.
///
/// `write_reg` is the only call made on the playback path; the rest are
/// exercised by the host around playback.
pub trait PsgBackend {
    /// Acquire process-local resources.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Begin producing external side effects.
    fn enable(&mut self) -> Result<()> {
        Ok(())
    }

    /// Put the chip into a known silent state. Valid only while enabled.
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Deliver one byte to a PSG register (0..=15). Valid only while
    /// enabled, and must be safe to call at the 2 ms tick rate.
    fn write_reg(&mut self, reg: u8, val: u8) -> Result<()>;

    /// Stop producing external side effects.
    fn disable(&mut self) {}
}

/// Backend that discards every write. Useful for headless runs and tests
/// that only observe note events.
#[derive(Debug, Default)]
pub struct NullBackend;

impl PsgBackend for NullBackend {
    fn write_reg(&mut self, _reg: u8, _val: u8) -> Result<()> {
        Ok(())
    }
}

/// Backend that keeps a full register shadow and a log of every write.
///
/// Feeds the terminal UI and the scenario tests.
#[derive(Debug, Default)]
pub struct CaptureBackend {
    regs: [u8; 16],
    writes: Vec<(u8, u8)>,
}

impl CaptureBackend {
    /// Empty capture state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of one register.
    pub fn reg(&self, reg: u8) -> u8 {
        self.regs.get(reg as usize).copied().unwrap_or(0)
    }

    /// Snapshot of all sixteen registers.
    pub fn regs(&self) -> [u8; 16] {
        self.regs
    }

    /// Every `(reg, val)` pair seen, in emission order.
    pub fn writes(&self) -> &[(u8, u8)] {
        &self.writes
    }

    /// Forget the write log, keeping the shadow.
    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }
}

impl PsgBackend for CaptureBackend {
    fn reset(&mut self) -> Result<()> {
        self.regs = [0; 16];
        Ok(())
    }

    fn write_reg(&mut self, reg: u8, val: u8) -> Result<()> {
        if let Some(slot) = self.regs.get_mut(reg as usize) {
            *slot = val;
        }
        self.writes.push((reg, val));
        Ok(())
    }
}

/// Adapts a [`PsgBackend`] into a [`DriverSink`].
///
/// Failures are swallowed and cached as a bounded last-error string — the
/// interpreter never sees them; the host reads `last_error` when it cares.
pub struct BackendSink<B: PsgBackend> {
    backend: B,
    last_error: String,
}

impl<B: PsgBackend> BackendSink<B> {
    /// Wrap a backend with error caching.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            last_error: String::new(),
        }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the wrapped backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Message from the most recent failure, empty if none.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Unwrap the backend.
    pub fn into_inner(self) -> B {
        self.backend
    }

    fn cache_error(&mut self, err: BackendError) {
        let mut msg = err.to_string();
        msg.truncate(LAST_ERROR_MAXLEN);
        self.last_error = msg;
    }
}

impl<B: PsgBackend> DriverSink for BackendSink<B> {
    fn write_reg(&mut self, reg: u8, val: u8) {
        if let Err(err) = self.backend.write_reg(reg, val) {
            self.cache_error(err);
        }
    }
}
