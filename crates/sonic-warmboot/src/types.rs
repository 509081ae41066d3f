//! Forwarding resource identifiers and egress objects.
//!
//! These are the values shared by the live tables, the snapshot records and
//! the hardware model. Identifiers are thin newtypes so that a VRF id can
//! never be passed where an egress id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Virtual routing domain identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VrfId(pub u32);

impl fmt::Display for VrfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// L3 interface identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(pub u32);

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical front-panel port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(pub u32);

/// Link-aggregation (trunk) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatePortId(pub u32);

/// Hardware egress resource id.
///
/// Standalone egress objects and ECMP groups share this namespace. The
/// value 0 is a valid "unset/direct" binding and never names a hardware
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EgressId(pub u64);

impl EgressId {
    /// The unset/direct egress id.
    pub const UNSET: Self = EgressId(0);

    /// Returns true if this id does not name a hardware object.
    pub const fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EgressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a MAC address string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MAC address format: {0}")]
pub struct ParseMacError(pub String);

/// A 48-bit Ethernet MAC address.
///
/// Serialized as its canonical lower-case, colon separated string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    /// Accepts `00:11:22:33:44:55` and `00-11-22-33-44-55`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sep = if s.contains('-') { '-' } else { ':' };
        let mut bytes = [0u8; 6];
        let mut count = 0;
        for part in s.split(sep) {
            if count == 6 || part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParseMacError(s.to_string()));
            }
            bytes[count] =
                u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
            count += 1;
        }
        if count != 6 {
            return Err(ParseMacError(s.to_string()));
        }
        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseMacError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

/// The port a resolved host egresses through.
///
/// Only physical ports survive a warm boot; trunk-backed hosts are restored
/// without a port and get their membership from route resolution again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDescriptor {
    Physical(PortId),
    Aggregate(AggregatePortId),
}

impl PortDescriptor {
    pub fn is_physical(&self) -> bool {
        matches!(self, PortDescriptor::Physical(_))
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDescriptor::Physical(p) => write!(f, "phy:{}", p.0),
            PortDescriptor::Aggregate(a) => write!(f, "agg:{}", a.0),
        }
    }
}

/// A standalone egress object: rewrite to `mac` and send out of `intf`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Egress {
    pub id: EgressId,
    pub mac: MacAddress,
    pub intf: InterfaceId,
}

impl Egress {
    pub fn new(id: EgressId, mac: MacAddress, intf: InterfaceId) -> Self {
        Self { id, mac, intf }
    }
}

/// An ECMP egress group spreading traffic across standalone egress objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EcmpEgress {
    pub id: EgressId,
    pub paths: Vec<EgressId>,
}

impl EcmpEgress {
    pub fn new(id: EgressId, paths: impl IntoIterator<Item = EgressId>) -> Self {
        Self {
            id,
            paths: paths.into_iter().collect(),
        }
    }

    /// Compares member sets, ignoring the order members were reported in.
    pub fn same_members(&self, other: &EcmpEgress) -> bool {
        let mut ours = self.paths.clone();
        let mut theirs = other.paths.clone();
        ours.sort_unstable();
        theirs.sort_unstable();
        ours == theirs
    }
}

/// Which kind of egress object a resource id names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EgressKind {
    Standalone,
    Ecmp,
}

impl fmt::Display for EgressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EgressKind::Standalone => write!(f, "egress"),
            EgressKind::Ecmp => write!(f, "ecmp-egress"),
        }
    }
}

/// Any hardware egress object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EgressObject {
    Standalone(Egress),
    Ecmp(EcmpEgress),
}

impl EgressObject {
    pub fn id(&self) -> EgressId {
        match self {
            EgressObject::Standalone(e) => e.id,
            EgressObject::Ecmp(e) => e.id,
        }
    }

    pub fn kind(&self) -> EgressKind {
        match self {
            EgressObject::Standalone(_) => EgressKind::Standalone,
            EgressObject::Ecmp(_) => EgressKind::Ecmp,
        }
    }

    /// Returns true if `other` programs the same forwarding behaviour.
    ///
    /// Standalone objects match on MAC and interface; ECMP groups match on
    /// their member set.
    pub fn same_content(&self, other: &EgressObject) -> bool {
        match (self, other) {
            (EgressObject::Standalone(a), EgressObject::Standalone(b)) => {
                a.mac == b.mac && a.intf == b.intf
            }
            (EgressObject::Ecmp(a), EgressObject::Ecmp(b)) => a.same_members(b),
            _ => false,
        }
    }
}

impl From<Egress> for EgressObject {
    fn from(e: Egress) -> Self {
        EgressObject::Standalone(e)
    }
}

impl From<EcmpEgress> for EgressObject {
    fn from(e: EcmpEgress) -> Self {
        EgressObject::Ecmp(e)
    }
}
