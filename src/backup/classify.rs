//! Failure classification.
//!
//! Maps transport failures onto the stable three-bucket taxonomy reported
//! to operators. Pure and total: an unrecognized error falls through to
//! `TimedOut` rather than propagating; precise network-layer diagnosis is
//! out of scope, and "anything else" is treated as a timeout.

use crate::models::FailureKind;
use crate::transport::TransportError;

/// Classify a transport failure. First match wins:
/// connection refused → `Blocked`, credential rejection →
/// `AuthenticationFailed`, everything else → `TimedOut`.
pub fn classify(error: &TransportError) -> FailureKind {
    match error {
        TransportError::ConnectionRefused { .. } => FailureKind::Blocked,
        TransportError::AuthenticationRejected { .. } => FailureKind::AuthenticationFailed,
        TransportError::Timeout { .. } => FailureKind::TimedOut,
        TransportError::Other(text) => classify_text(text),
    }
}

/// Free-text fallback for transports that cannot type their failures.
/// Same precedence as the typed path.
fn classify_text(text: &str) -> FailureKind {
    let lower = text.to_lowercase();
    if lower.contains("connection refused") || lower.contains("novalidconnections") {
        FailureKind::Blocked
    } else if lower.contains("authentication failed") || lower.contains("permission denied") {
        FailureKind::AuthenticationFailed
    } else {
        FailureKind::TimedOut
    }
}
