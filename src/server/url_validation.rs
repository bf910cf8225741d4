use crate::error::{RelayError, Result};
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Reject targets that address the relay's own network.
///
/// Only IP literals and `localhost` are checked. Other hostnames pass
/// without DNS resolution, so a public name resolving to a private address
/// is not caught here.
///
/// # Errors
/// Returns [`RelayError::InvalidUrl`] when the host is a loopback,
/// private, link-local, unique-local or unspecified address (including
/// IPv4-mapped IPv6 forms of those).
pub fn ensure_public_target(target: &str) -> Result<()> {
    let parsed = Url::parse(target).map_err(|e| RelayError::InvalidUrl(format!("{target} ({e})")))?;

    let blocked = match parsed.host() {
        Some(Host::Ipv4(ip)) => is_blocked_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_blocked_ipv6(ip),
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => true,
    };

    if blocked {
        return Err(RelayError::InvalidUrl(format!(
            "{target} (private or local address not allowed)"
        )));
    }

    Ok(())
}

fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local() // includes cloud metadata 169.254.169.254
        || ip.octets()[0] == 0
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(v4);
    }

    ip.is_unspecified() || ip.is_loopback() || ip.is_unicast_link_local() || ip.is_unique_local()
}
