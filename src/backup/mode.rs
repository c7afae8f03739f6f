//! Mode detection for context-capable firewalls.
//!
//! A firewall either runs one configuration (single mode) or several
//! virtual security contexts (multiple mode). The probe issues `show mode`
//! and reads the last token of the response; `multiple` devices then have
//! their contexts enumerated from `show context` output. The result is an
//! explicit routing decision consumed by the dispatcher; no state is left
//! on the device between runs.

use super::{context_listing_commands, mode_inquiry_commands};
use crate::models::{Context, Device};
use crate::transport::{Transport, TransportError};
use tracing::{debug, warn};

/// Sentinel marking context configuration URLs in `show context` output.
pub const CONTEXT_URL_PREFIX: &str = "disk0:/";

/// Terminal operating mode of a context-capable device, for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    Single,
    Multiple,
}

/// Routing decision for one device's backup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Fetch the single running configuration.
    Plain,
    /// Fetch each discovered context's stored configuration independently.
    Contexts(Vec<Context>),
}

/// Parse the mode-inquiry response: the last whitespace-delimited token
/// decides, e.g. `Security context mode: multiple`.
pub fn parse_mode(response: &str) -> Option<DeviceMode> {
    let last = response.split_whitespace().last()?;
    if last.eq_ignore_ascii_case("single") {
        Some(DeviceMode::Single)
    } else if last.eq_ignore_ascii_case("multiple") {
        Some(DeviceMode::Multiple)
    } else {
        None
    }
}

/// Collect every token carrying the context URL sentinel as one discovered
/// context, in listing order.
pub fn parse_contexts(response: &str) -> Vec<Context> {
    response
        .split_whitespace()
        .filter(|token| token.contains(CONTEXT_URL_PREFIX))
        .map(Context::new)
        .collect()
}

/// Probe a device's operating mode and return its route.
///
/// A transport failure or an unrecognizable response short-circuits into
/// the failure classifier via the returned error; such a device reaches
/// neither path. Context enumeration runs after the connectivity outcome
/// is already established, so an enumeration failure degrades to an empty
/// context list rather than reclassifying the device.
pub fn detect(transport: &dyn Transport, device: &Device) -> Result<Route, TransportError> {
    let responses = transport.execute(device, &mode_inquiry_commands())?;
    let reply = responses.last().map(String::as_str).unwrap_or("");

    match parse_mode(reply) {
        Some(DeviceMode::Single) => {
            debug!(device = %device.name, "single mode, plain path");
            Ok(Route::Plain)
        }
        Some(DeviceMode::Multiple) => {
            debug!(device = %device.name, "multiple mode, enumerating contexts");
            match transport.execute(device, &context_listing_commands()) {
                Ok(responses) => {
                    let listing = responses.last().map(String::as_str).unwrap_or("");
                    let contexts = parse_contexts(listing);
                    debug!(device = %device.name, contexts = contexts.len(), "contexts discovered");
                    Ok(Route::Contexts(contexts))
                }
                Err(err) => {
                    // Connectivity was proven by the probe; a listing
                    // failure costs this device its context files, not
                    // its classification.
                    warn!(device = %device.name, error = %err, "context listing failed");
                    Ok(Route::Contexts(Vec::new()))
                }
            }
        }
        None => Err(TransportError::Other(format!(
            "unrecognized mode response from {}: {:?}",
            device.name,
            reply.split_whitespace().last().unwrap_or("")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credentials;
    use crate::transport::testing::ScriptedTransport;

    fn firewall(name: &str) -> Device {
        Device {
            name: name.to_string(),
            address: format!("{}.example.net", name),
            credentials: Credentials {
                username: "backup".to_string(),
                password: "secret".to_string(),
            },
            groups: vec!["firewall".to_string(), "multi-context".to_string()],
        }
    }

    #[test]
    fn test_parse_mode_tokens() {
        assert_eq!(
            parse_mode("Security context mode: single"),
            Some(DeviceMode::Single)
        );
        assert_eq!(
            parse_mode("Security context mode: multiple"),
            Some(DeviceMode::Multiple)
        );
        assert_eq!(parse_mode("Security context mode: MULTIPLE"), Some(DeviceMode::Multiple));
        assert_eq!(parse_mode("% Invalid input detected"), None);
        assert_eq!(parse_mode(""), None);
    }

    #[test]
    fn test_parse_contexts_token_scan() {
        let listing = "\
Context Name      Class    Interfaces       Mode    URL
*admin            default  Management0/0    Routed  disk0:/admin.cfg
 guest            default  GigabitEthernet0 Routed  disk0:/guest.cfg
 Total active Security Contexts: 2";

        let contexts = parse_contexts(listing);
        assert_eq!(
            contexts,
            vec![Context::new("disk0:/admin.cfg"), Context::new("disk0:/guest.cfg")]
        );
    }

    #[test]
    fn test_detect_single_routes_plain() {
        let transport = ScriptedTransport::new();
        transport.script(
            "fw1",
            Ok(vec![
                String::new(),
                "Security context mode: single".to_string(),
            ]),
        );

        let route = detect(&transport, &firewall("fw1")).unwrap();
        assert_eq!(route, Route::Plain);
    }

    #[test]
    fn test_detect_multiple_enumerates_contexts() {
        let transport = ScriptedTransport::new();
        transport.script(
            "fw1",
            Ok(vec![
                String::new(),
                "Security context mode: multiple".to_string(),
            ]),
        );
        transport.script(
            "fw1",
            Ok(vec![
                String::new(),
                "admin disk0:/admin.cfg\nguest disk0:/guest.cfg".to_string(),
            ]),
        );

        let route = detect(&transport, &firewall("fw1")).unwrap();
        assert_eq!(
            route,
            Route::Contexts(vec![
                Context::new("disk0:/admin.cfg"),
                Context::new("disk0:/guest.cfg")
            ])
        );
    }

    #[test]
    fn test_detect_unrecognized_response_is_error() {
        let transport = ScriptedTransport::new();
        transport.script(
            "fw1",
            Ok(vec![String::new(), "% Invalid input".to_string()]),
        );

        let err = detect(&transport, &firewall("fw1")).unwrap_err();
        assert!(matches!(err, TransportError::Other(_)));
        // The device never reached the context listing.
        assert_eq!(transport.calls_for("fw1").len(), 1);
    }

    #[test]
    fn test_detect_transport_failure_propagates() {
        let transport = ScriptedTransport::new();
        transport.script(
            "fw1",
            Err(TransportError::AuthenticationRejected {
                host: "fw1".to_string(),
            }),
        );

        let err = detect(&transport, &firewall("fw1")).unwrap_err();
        assert!(matches!(err, TransportError::AuthenticationRejected { .. }));
    }

    #[test]
    fn test_detect_listing_failure_degrades_to_empty() {
        let transport = ScriptedTransport::new();
        transport.script(
            "fw1",
            Ok(vec![
                String::new(),
                "Security context mode: multiple".to_string(),
            ]),
        );
        transport.script(
            "fw1",
            Err(TransportError::Timeout {
                host: "fw1".to_string(),
            }),
        );

        let route = detect(&transport, &firewall("fw1")).unwrap();
        assert_eq!(route, Route::Contexts(Vec::new()));
    }
}
