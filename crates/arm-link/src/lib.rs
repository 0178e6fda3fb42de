//! arm-link: transport abstractions for the SCARA actuator link
//!
//! This crate provides the trait and types for talking to the arm controller
//! over a line-oriented byte stream, with feature-gated backends. The default
//! build enables a `mock` backend so binaries and tests compile on any host
//! without a physical controller attached; the `serial` feature adds a real
//! serial-port backend.

mod types;
pub use types::PortInfo;

mod error;
pub use error::{LinkError, Result};

mod traits;
pub use traits::ArmLink;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockLink;

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialLink;
