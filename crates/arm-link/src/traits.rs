use crate::{PortInfo, Result};

/// A duplex, line-oriented channel to the arm controller.
///
/// Writes carry complete newline-terminated command lines; reads drain
/// whatever bytes the controller has produced since the last poll without
/// blocking. The trait is object safe so a session can hold whichever
/// backend it was opened with as `Box<dyn ArmLink>`.
pub trait ArmLink: Send {
    /// Open a port by name (e.g., "/dev/ttyUSB0", "mock0") at the given baud.
    fn open(path: &str, baud: u32) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available ports for this backend.
    fn list() -> Result<Vec<PortInfo>>
    where
        Self: Sized;

    /// The port name this link was opened with.
    fn name(&self) -> &str;

    /// Write one complete command line (terminator included by the caller).
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Drain all currently buffered inbound bytes. Zero bytes is not an
    /// error; it simply means the controller had nothing to say.
    fn read_available(&mut self) -> Result<Vec<u8>>;
}
