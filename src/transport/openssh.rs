//! System-ssh backed transport.
//!
//! Thin wrapper over the OpenSSH client binary. Network CLIs accept a
//! newline-separated command sequence on stdin and stream back a single
//! session transcript; the transcript is attributed to the final command,
//! which is the only response the orchestrator consumes on every path.
//!
//! Password authentication is delegated to the `sshpass` helper (password
//! passed via the `SSHPASS` environment variable, never argv). Devices
//! with an empty password use key-based auth with `BatchMode=yes`.

use super::{Transport, TransportError};
use crate::models::Device;
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::debug;

/// Session options for the OpenSSH transport.
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// TCP port for the SSH service.
    pub port: u16,
    /// Connection establishment deadline in seconds.
    pub connect_timeout_seconds: u64,
    /// Keepalive interval; a dead session is torn down after three
    /// unanswered probes.
    pub server_alive_seconds: u64,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            port: 22,
            connect_timeout_seconds: 10,
            server_alive_seconds: 30,
        }
    }
}

/// Transport implementation invoking the system `ssh` client, one process
/// per device session.
pub struct OpenSshTransport {
    options: SshOptions,
}

impl OpenSshTransport {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    fn build_command(&self, device: &Device) -> Command {
        let target = format!("{}@{}", device.credentials.username, device.address);
        let use_password = !device.credentials.password.is_empty();

        let mut cmd = if use_password {
            let mut c = Command::new("sshpass");
            c.arg("-e");
            c.env("SSHPASS", &device.credentials.password);
            c.arg("ssh");
            c
        } else {
            let mut c = Command::new("ssh");
            c.arg("-o").arg("BatchMode=yes");
            c
        };

        cmd.arg("-p")
            .arg(self.options.port.to_string())
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.options.connect_timeout_seconds
            ))
            .arg("-o")
            .arg(format!(
                "ServerAliveInterval={}",
                self.options.server_alive_seconds
            ))
            .arg("-o")
            .arg("ServerAliveCountMax=3")
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            // Network device CLIs want a PTY-less exec channel.
            .arg("-T")
            .arg(target)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd
    }

    fn typed_error(host: &str, stderr: &str) -> TransportError {
        let lower = stderr.to_lowercase();
        if lower.contains("connection refused") {
            TransportError::ConnectionRefused {
                host: host.to_string(),
            }
        } else if lower.contains("permission denied") || lower.contains("authentication failed") {
            TransportError::AuthenticationRejected {
                host: host.to_string(),
            }
        } else if lower.contains("timed out") || lower.contains("connection closed") {
            TransportError::Timeout {
                host: host.to_string(),
            }
        } else {
            TransportError::Other(format!("{}: {}", host, stderr.trim()))
        }
    }
}

impl Transport for OpenSshTransport {
    fn execute(&self, device: &Device, commands: &[String]) -> Result<Vec<String>, TransportError> {
        debug!(device = %device.name, commands = commands.len(), "opening ssh session");

        let mut child = self
            .build_command(device)
            .spawn()
            .map_err(|e| TransportError::Other(format!("failed to spawn ssh: {}", e)))?;

        // stdin is piped by build_command; feed the command sequence and
        // close the channel so the remote side sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            let script = commands.join("\n") + "\n";
            stdin
                .write_all(script.as_bytes())
                .map_err(|e| TransportError::Other(format!("ssh stdin write failed: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| TransportError::Other(format!("ssh session failed: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(Self::typed_error(&device.name, &stderr));
        }

        let transcript = String::from_utf8_lossy(&output.stdout).into_owned();

        // One transcript per session; attribute it to the last command.
        let mut responses = vec![String::new(); commands.len()];
        if let Some(last) = responses.last_mut() {
            *last = transcript;
        }
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_error_connection_refused() {
        let err = OpenSshTransport::typed_error("fw1", "ssh: connect to host fw1: Connection refused");
        assert!(matches!(err, TransportError::ConnectionRefused { .. }));
    }

    #[test]
    fn test_typed_error_auth() {
        let err = OpenSshTransport::typed_error("fw1", "admin@fw1: Permission denied (password).");
        assert!(matches!(err, TransportError::AuthenticationRejected { .. }));
    }

    #[test]
    fn test_typed_error_timeout() {
        let err = OpenSshTransport::typed_error("fw1", "ssh: connect to host fw1: Operation timed out");
        assert!(matches!(err, TransportError::Timeout { .. }));
    }

    #[test]
    fn test_typed_error_fallthrough() {
        let err = OpenSshTransport::typed_error("fw1", "something unexpected");
        assert!(matches!(err, TransportError::Other(_)));
    }

    #[test]
    fn test_default_options() {
        let opts = SshOptions::default();
        assert_eq!(opts.port, 22);
        assert_eq!(opts.connect_timeout_seconds, 10);
    }
}
