//! Relay endpoint trust classification.
//!
//! Conversation content only leaves the machine for endpoints the client
//! trusts. The level is resolved once at startup from the relay URL and an
//! optional override; nothing re-derives it per call.

use url::Url;

/// Whether a relay endpoint may receive conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointTrust {
    /// Local or explicitly approved endpoint; replication runs.
    Trusted,
    /// Any other endpoint; replication is skipped and the local store stays
    /// the sole copy.
    Untrusted,
}

impl EndpointTrust {
    /// Classify `url` by its host.
    ///
    /// Loopback addresses and `localhost` are trusted, everything else is
    /// not. `force` overrides the host-based result in either direction.
    #[must_use]
    pub fn classify(url: &Url, force: Option<bool>) -> Self {
        if let Some(forced) = force {
            return if forced { Self::Trusted } else { Self::Untrusted };
        }
        match url.host() {
            Some(url::Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
                Self::Trusted
            }
            Some(url::Host::Ipv4(ip)) if ip.is_loopback() => Self::Trusted,
            Some(url::Host::Ipv6(ip)) if ip.is_loopback() => Self::Trusted,
            _ => Self::Untrusted,
        }
    }

    /// Whether replication may run against this endpoint.
    #[must_use]
    pub const fn allows_replication(self) -> bool {
        matches!(self, Self::Trusted)
    }
}
