//! Host table entries.

use std::fmt;
use std::net::IpAddr;

use super::weak::WeakTable;
use crate::types::{Egress, EgressId, InterfaceId, PortDescriptor, VrfId};

/// Key of one resolved forwarding destination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostKey {
    vrf: VrfId,
    ip: IpAddr,
    intf: Option<InterfaceId>,
}

impl HostKey {
    pub fn new(vrf: VrfId, ip: IpAddr) -> Self {
        Self {
            vrf,
            ip,
            intf: None,
        }
    }

    /// Scopes the host to an interface (link-local and similar hosts).
    pub fn with_interface(mut self, intf: InterfaceId) -> Self {
        self.intf = Some(intf);
        self
    }

    pub fn vrf(&self) -> VrfId {
        self.vrf
    }

    pub fn ip(&self) -> &IpAddr {
        &self.ip
    }

    pub fn interface(&self) -> Option<InterfaceId> {
        self.intf
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vrf{}:{}", self.vrf, self.ip)?;
        if let Some(intf) = self.intf {
            write!(f, "@{}", intf)?;
        }
        Ok(())
    }
}

/// A resolved host.
///
/// The egress object is embedded only when this entry exclusively owns it.
/// Host routes that point at an egress owned elsewhere carry just the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    egress_id: EgressId,
    port: Option<PortDescriptor>,
    egress: Option<Egress>,
}

impl HostEntry {
    /// A host bound directly, with no egress object.
    pub fn direct() -> Self {
        Self {
            egress_id: EgressId::UNSET,
            port: None,
            egress: None,
        }
    }

    /// A host that references an egress object it does not own.
    pub fn referencing(egress_id: EgressId) -> Self {
        Self {
            egress_id,
            port: None,
            egress: None,
        }
    }

    /// A host that exclusively owns its egress object.
    pub fn owning(egress: Egress) -> Self {
        Self {
            egress_id: egress.id,
            port: None,
            egress: Some(egress),
        }
    }

    pub fn with_port(mut self, port: PortDescriptor) -> Self {
        self.port = Some(port);
        self
    }

    pub fn egress_id(&self) -> EgressId {
        self.egress_id
    }

    pub fn port(&self) -> Option<&PortDescriptor> {
        self.port.as_ref()
    }

    /// The owned egress object, if any.
    pub fn egress(&self) -> Option<&Egress> {
        self.egress.as_ref()
    }

    pub fn owns_egress(&self) -> bool {
        self.egress.is_some()
    }
}

/// Host table: weak handles to host entries owned by route resolution.
pub type HostTable = WeakTable<HostKey, HostEntry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MacAddress, PortId};
    use std::net::Ipv4Addr;

    #[test]
    fn test_host_key_display() {
        let key = HostKey::new(VrfId(0), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(key.to_string(), "vrf0:10.0.0.1");
        let scoped = key.with_interface(InterfaceId(100));
        assert_eq!(scoped.to_string(), "vrf0:10.0.0.1@100");
    }

    #[test]
    fn test_host_key_ordering() {
        let a = HostKey::new(VrfId(0), "10.0.0.2".parse().unwrap());
        let b = HostKey::new(VrfId(1), "10.0.0.1".parse().unwrap());
        assert!(a < b);
    }

    #[test]
    fn test_owning_entry_binds_egress_id() {
        let egress = Egress::new(EgressId(5), MacAddress::ZERO, InterfaceId(100));
        let entry = HostEntry::owning(egress.clone()).with_port(PortDescriptor::Physical(PortId(1)));
        assert_eq!(entry.egress_id(), EgressId(5));
        assert!(entry.owns_egress());
        assert_eq!(entry.egress(), Some(&egress));
        assert!(entry.port().unwrap().is_physical());
    }

    #[test]
    fn test_referencing_entry_does_not_own() {
        let entry = HostEntry::referencing(EgressId(5));
        assert!(!entry.owns_egress());
        assert_eq!(entry.egress_id(), EgressId(5));

        let direct = HostEntry::direct();
        assert!(direct.egress_id().is_unset());
    }
}
