//! Multipath (ECMP) next-hop entries.
//!
//! These were historically kept inside the host table even though they never
//! land in the ASIC host table; the snapshot layout still reflects that.

use std::collections::BTreeSet;
use std::fmt;

use super::nexthop::NextHop;
use super::weak::WeakTable;
use crate::types::{EcmpEgress, EgressId, VrfId};

/// Key of one multipath group: the VRF plus its next-hop set.
///
/// Next-hops are kept sorted so that two groups with the same members
/// compare equal regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MultiPathKey {
    vrf: VrfId,
    nexthops: BTreeSet<NextHop>,
}

impl MultiPathKey {
    pub fn new(vrf: VrfId, nexthops: impl IntoIterator<Item = NextHop>) -> Self {
        Self {
            vrf,
            nexthops: nexthops.into_iter().collect(),
        }
    }

    pub fn vrf(&self) -> VrfId {
        self.vrf
    }

    pub fn nexthops(&self) -> impl Iterator<Item = &NextHop> {
        self.nexthops.iter()
    }

    pub fn len(&self) -> usize {
        self.nexthops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nexthops.is_empty()
    }
}

impl fmt::Display for MultiPathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nexthops: Vec<_> = self.nexthops.iter().map(|nh| nh.to_string()).collect();
        write!(f, "vrf{}:[{}]", self.vrf, nexthops.join(","))
    }
}

/// A multipath next-hop entry.
///
/// `egress_id` is the handle routes program against; `ecmp_egress_id` names
/// the ECMP group as a whole. The group object is embedded only when this
/// entry exclusively owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiPathEntry {
    egress_id: EgressId,
    ecmp_egress_id: EgressId,
    ecmp_egress: Option<EcmpEgress>,
}

impl MultiPathEntry {
    /// An entry that references an ECMP group it does not own.
    pub fn referencing(egress_id: EgressId, ecmp_egress_id: EgressId) -> Self {
        Self {
            egress_id,
            ecmp_egress_id,
            ecmp_egress: None,
        }
    }

    /// An entry that exclusively owns its ECMP group.
    pub fn owning(egress_id: EgressId, ecmp_egress: EcmpEgress) -> Self {
        Self {
            egress_id,
            ecmp_egress_id: ecmp_egress.id,
            ecmp_egress: Some(ecmp_egress),
        }
    }

    pub fn egress_id(&self) -> EgressId {
        self.egress_id
    }

    pub fn ecmp_egress_id(&self) -> EgressId {
        self.ecmp_egress_id
    }

    /// The owned ECMP group, if any.
    pub fn ecmp_egress(&self) -> Option<&EcmpEgress> {
        self.ecmp_egress.as_ref()
    }

    pub fn owns_ecmp_egress(&self) -> bool {
        self.ecmp_egress.is_some()
    }
}

/// Multipath table: weak handles to entries owned by route resolution.
pub type MultiPathTable = WeakTable<MultiPathKey, MultiPathEntry>;
