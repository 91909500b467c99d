//! Per-endpoint/authenticator configuration (§6). Fields are mutated only before `start`;
//! after the endpoint or authenticator is running they are read-only (§5 shared-resource
//! policy).

use std::time::Duration;

/// Configuration shared by every endpoint flavor and by the host authenticator.
#[derive(Debug, Clone, Copy)]
pub struct EndpointConfig {
    /// Idle period after which the send loop injects an `InactivityCheckMessage` (§4.4).
    pub inactivity_check_interval: Duration,
    /// Upper bound on a single connection or reconnect attempt (§4.5, §4.6).
    pub connection_timeout: Duration,
}

impl EndpointConfig {
    pub fn new(inactivity_check_interval: Duration, connection_timeout: Duration) -> EndpointConfig {
        EndpointConfig {
            inactivity_check_interval,
            connection_timeout,
        }
    }
}

impl Default for EndpointConfig {
    /// 30s inactivity probing, 10s connection attempts — reasonable LAN defaults for a
    /// framework whose original use case is same-network multiplayer sessions.
    fn default() -> EndpointConfig {
        EndpointConfig {
            inactivity_check_interval: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

/// Hard ceiling on host-side identification, deliberately not configurable (§4.7, §5).
/// The design notes flag the mismatch with the configurable `connection_timeout` as an open
/// hazard in the reference source; this implementation keeps both rather than silently
/// unifying them (see DESIGN.md).
pub const IDENTIFICATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Discovery query collection window (§4.8).
pub const DISCOVERY_QUERY_WINDOW: Duration = Duration::from_secs(1);

/// Well-known UDP port for discovery query/answer exchange (§4.8). Arbitrary but fixed so
/// discoverers and answerers agree without configuration.
pub const DISCOVERY_PORT: u16 = 48900;

/// Fixed header every discovery query datagram must start with (§4.8).
pub const BROADCAST_HEADER: &str = "TBNF-DISCOVER";
