//! Client identification for rate limit accounting.

use std::{fmt, net::IpAddr};

/// Identifier shared by every request whose origin cannot be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Textual prefix of an IPv4 address embedded in an IPv6 address (`::ffff:a.b.c.d`).
const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// The client a request is accounted to.
///
/// Derived fresh for every request from its source address. The same physical client
/// always maps to the same identifier, whether it reached the server over IPv4 or as an
/// IPv4-mapped IPv6 address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentifier(String);

impl ClientIdentifier {
    /// Resolves the client from the transport-layer source address and an optional
    /// `X-Forwarded-For` header value.
    ///
    /// The source address wins when present. Otherwise the first forwarded-for entry is
    /// used. Requests with neither share the `unknown` identifier, so they are limited
    /// together instead of bypassing the limiter.
    pub fn resolve(remote_addr: Option<&str>, forwarded_for: Option<&str>) -> Self {
        let address = remote_addr
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .or_else(|| forwarded_for.and_then(first_forwarded));

        match address {
            Some(address) => Self(normalize(address)),
            None => Self::unknown(),
        }
    }

    /// Identifier for a parsed source address.
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(ip.to_canonical().to_string())
    }

    /// The shared identifier for requests without any origin information.
    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }

    /// Whether this is the shared fallback identifier.
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CLIENT
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientIdentifier {
    fn from(ip: IpAddr) -> Self {
        Self::from_ip(ip)
    }
}

impl fmt::Display for ClientIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn first_forwarded(header: &str) -> Option<&str> {
    header.split(',').next().map(str::trim).filter(|token| !token.is_empty())
}

fn normalize(address: &str) -> String {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return ip.to_canonical().to_string();
    }

    // Not a parseable address. Still strip the mapping prefix so that both spellings of a
    // client share one counter.
    let has_mapped_prefix = address
        .get(..IPV4_MAPPED_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(IPV4_MAPPED_PREFIX));

    match address.get(IPV4_MAPPED_PREFIX.len()..) {
        Some(rest) if has_mapped_prefix && !rest.is_empty() => rest.to_string(),
        _ => address.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    #[test]
    fn prefers_transport_address() {
        let id = ClientIdentifier::resolve(Some("203.0.113.5"), Some("198.51.100.7"));

        assert_eq!(id.as_str(), "203.0.113.5");
    }

    #[test]
    fn falls_back_to_first_forwarded_for_entry() {
        let id = ClientIdentifier::resolve(None, Some(" 198.51.100.7 , 10.0.0.1, 10.0.0.2"));

        assert_eq!(id.as_str(), "198.51.100.7");
    }

    #[test]
    fn empty_transport_address_is_absent() {
        let id = ClientIdentifier::resolve(Some(""), Some("198.51.100.7"));

        assert_eq!(id.as_str(), "198.51.100.7");
    }

    #[test]
    fn unknown_without_any_address() {
        assert_eq!(ClientIdentifier::resolve(None, None), ClientIdentifier::unknown());
        assert_eq!(ClientIdentifier::resolve(None, Some("")), ClientIdentifier::unknown());
        assert_eq!(ClientIdentifier::resolve(Some("  "), Some(" ,10.0.0.1")), ClientIdentifier::unknown());
        assert!(ClientIdentifier::resolve(None, None).is_unknown());
    }

    #[test]
    fn ipv4_mapped_ipv6_is_normalized() {
        let mapped = ClientIdentifier::resolve(Some("::ffff:203.0.113.5"), None);
        let bare = ClientIdentifier::resolve(Some("203.0.113.5"), None);

        assert_eq!(mapped, bare);
        assert_eq!(mapped.to_string(), "203.0.113.5");
    }

    #[test]
    fn ipv4_mapped_forwarded_for_is_normalized() {
        let id = ClientIdentifier::resolve(None, Some("::FFFF:203.0.113.5"));

        assert_eq!(id.as_str(), "203.0.113.5");
    }

    #[test]
    fn unparseable_mapped_address_loses_prefix() {
        let id = ClientIdentifier::resolve(Some("::ffff:client-7"), None);

        assert_eq!(id.as_str(), "client-7");
    }

    #[test]
    fn plain_ipv6_is_kept() {
        let id = ClientIdentifier::resolve(Some("2001:DB8::1"), None);

        assert_eq!(id.as_str(), "2001:db8::1");
    }

    #[test]
    fn from_ip_matches_resolve() {
        let mapped = Ipv4Addr::new(203, 0, 113, 5).to_ipv6_mapped();

        assert_eq!(
            ClientIdentifier::from_ip(IpAddr::V6(mapped)),
            ClientIdentifier::resolve(Some("203.0.113.5"), None)
        );
        assert_eq!(ClientIdentifier::from(IpAddr::V6(Ipv6Addr::LOCALHOST)).as_str(), "::1");
    }
}
