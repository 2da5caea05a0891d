//! Endpoint abstraction for the TCP transport.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// A transport endpoint address.
///
/// This spec's transport is TCP-only; the type remains an enum (rather than
/// a bare `SocketAddr`) so the wire-format prefix stays visible at call
/// sites and future transports have a seam to land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// TCP transport: `tcp://host:port`
    Tcp(SocketAddr),
}

impl Endpoint {
    /// Parse an endpoint from a string.
    ///
    /// # Examples
    ///
    /// ```
    /// use conveyor_core::endpoint::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("tcp://127.0.0.1:4558").unwrap();
    /// assert!(matches!(endpoint, Endpoint::Tcp(_)));
    /// ```
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        s.parse()
    }

    /// The underlying socket address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        match self {
            Self::Tcp(addr) => *addr,
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(addr) = s.strip_prefix("tcp://") {
            let socket_addr = addr
                .parse::<SocketAddr>()
                .map_err(|_| EndpointError::InvalidTcpAddress(addr.to_string()))?;
            Ok(Self::Tcp(socket_addr))
        } else {
            Err(EndpointError::InvalidScheme(s.to_string()))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// Errors that can occur when parsing or using endpoints.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid scheme in endpoint: {0} (expected tcp://)")]
    InvalidScheme(String),

    #[error("invalid TCP address: {0}")]
    InvalidTcpAddress(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_ipv4() {
        let endpoint = Endpoint::parse("tcp://127.0.0.1:4558").unwrap();
        assert!(matches!(endpoint, Endpoint::Tcp(_)));
        assert_eq!(endpoint.to_string(), "tcp://127.0.0.1:4558");
    }

    #[test]
    fn test_parse_tcp_ipv6() {
        let endpoint = Endpoint::parse("tcp://[::1]:4558").unwrap();
        assert!(matches!(endpoint, Endpoint::Tcp(_)));
    }

    #[test]
    fn test_invalid_scheme() {
        let result = Endpoint::parse("udp://127.0.0.1:4558");
        assert!(matches!(result, Err(EndpointError::InvalidScheme(_))));
    }

    #[test]
    fn test_invalid_tcp_address() {
        let result = Endpoint::parse("tcp://invalid:port");
        assert!(matches!(result, Err(EndpointError::InvalidTcpAddress(_))));
    }
}
