//! Remote command-execution contract.
//!
//! The orchestrator does not implement SSH protocol handling, prompt
//! detection, or command echoing itself; it consumes this contract. The
//! shipped implementation wraps the system `ssh` client (see [`openssh`]),
//! and tests drive the pipeline through a scripted in-memory transport.

pub mod openssh;

pub use openssh::{OpenSshTransport, SshOptions};

use crate::models::Device;
use thiserror::Error;

/// Typed failure surfaced by a transport session.
///
/// The classifier maps these onto the three-bucket failure taxonomy. A
/// transport that can only produce free-text errors should use `Other`;
/// the classifier pattern-matches the text with the same precedence.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No transport connection could be established; the host actively
    /// refused or rejected it.
    #[error("connection refused by {host}")]
    ConnectionRefused { host: String },

    /// The host rejected the session credentials.
    #[error("authentication rejected for {host}")]
    AuthenticationRejected { host: String },

    /// Session establishment or a command round-trip exceeded its deadline.
    #[error("session with {host} timed out")]
    Timeout { host: String },

    /// Anything else the transport could not type.
    #[error("{0}")]
    Other(String),
}

/// Remote command execution against a single device.
///
/// Commands run in order within one session. On success the full response
/// text of each command is returned; on the first transport or
/// authentication failure the remaining commands are abandoned and partial
/// output is discarded. Sessions are independent across devices.
pub trait Transport: Send + Sync {
    fn execute(&self, device: &Device, commands: &[String]) -> Result<Vec<String>, TransportError>;
}
