//! Next-hop descriptor.
//!
//! A next-hop is one resolved forwarding destination of a multipath group:
//! an IP address, optionally pinned to the L3 interface it was resolved on.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::types::InterfaceId;

/// A single next-hop of a multipath group.
///
/// Ordering is by address then interface, which gives multipath keys a
/// deterministic member order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NextHop {
    ip: IpAddr,
    intf: Option<InterfaceId>,
}

impl NextHop {
    /// Creates a next-hop that is not pinned to an interface.
    pub fn new(ip: IpAddr) -> Self {
        Self { ip, intf: None }
    }

    /// Pins the next-hop to an interface.
    pub fn with_interface(mut self, intf: InterfaceId) -> Self {
        self.intf = Some(intf);
        self
    }

    pub fn ip(&self) -> &IpAddr {
        &self.ip
    }

    pub fn interface(&self) -> Option<InterfaceId> {
        self.intf
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.intf {
            Some(intf) => write!(f, "{}@{}", self.ip, intf),
            None => write!(f, "{}", self.ip),
        }
    }
}

/// Error when parsing a next-hop descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNextHopError {
    pub message: String,
}

impl fmt::Display for ParseNextHopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid next-hop: {}", self.message)
    }
}

impl std::error::Error for ParseNextHopError {}

impl FromStr for NextHop {
    type Err = ParseNextHopError;

    /// Parses the canonical form produced by `Display`.
    ///
    /// Formats supported:
    /// - `ip` - Unpinned next-hop
    /// - `ip@intf` - Next-hop resolved on interface `intf`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (ip_part, intf_part) = match s.split_once('@') {
            Some((ip, intf)) => (ip, Some(intf)),
            None => (s, None),
        };

        let ip: IpAddr = ip_part.parse().map_err(|_| ParseNextHopError {
            message: format!("Invalid IP address: {}", ip_part),
        })?;

        let nexthop = NextHop::new(ip);
        match intf_part {
            Some(intf) => {
                let id = intf.parse().map_err(|_| ParseNextHopError {
                    message: format!("Invalid interface id: {}", intf),
                })?;
                Ok(nexthop.with_interface(InterfaceId(id)))
            }
            None => Ok(nexthop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_nexthop_display() {
        let nh = NextHop::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(nh.to_string(), "10.0.0.1");

        let pinned = nh.with_interface(InterfaceId(100));
        assert_eq!(pinned.to_string(), "10.0.0.1@100");

        let v6 = NextHop::new(IpAddr::V6(Ipv6Addr::LOCALHOST)).with_interface(InterfaceId(7));
        assert_eq!(v6.to_string(), "::1@7");
    }

    #[test]
    fn test_nexthop_parse() {
        let nh: NextHop = "10.0.0.2".parse().unwrap();
        assert_eq!(nh.ip(), &IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(nh.interface(), None);

        let pinned: NextHop = "fe80::1@12".parse().unwrap();
        assert_eq!(pinned.interface(), Some(InterfaceId(12)));
        assert!(pinned.ip().is_ipv6());
    }

    #[test]
    fn test_nexthop_parse_errors() {
        assert!("not-an-ip".parse::<NextHop>().is_err());
        assert!("10.0.0.1@eth0".parse::<NextHop>().is_err());
        let err = "10.0.0.300".parse::<NextHop>().unwrap_err();
        assert!(err.to_string().contains("10.0.0.300"));
    }

    #[test]
    fn test_nexthop_ordering_is_by_address() {
        let a: NextHop = "10.0.0.1".parse().unwrap();
        let b: NextHop = "10.0.0.2".parse().unwrap();
        let a_pinned: NextHop = "10.0.0.1@5".parse().unwrap();
        assert!(a < b);
        assert!(a < a_pinned);
        assert!(a_pinned < b);
    }
}
