//! Persisted snapshot document shapes.
//!
//! Field names are part of the on-disk contract shared with deployed
//! software of mixed versions; renaming any of them needs a migration.

use serde::{Deserialize, Serialize};

/// Top-level grouping key holding both host and multipath records.
pub const KEY_HOST_TABLE: &str = "hostTable";
pub const KEY_HOSTS: &str = "hosts";
pub const KEY_ECMP_HOSTS: &str = "ecmpHosts";
pub const KEY_PORT: &str = "port";

/// A whole warm boot snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(rename = "hostTable")]
    pub host_table: HostTableRecord,
}

/// The host table grouping.
///
/// Multipath entries live here next to the hosts because they were once
/// tracked by the host table. `ecmpHosts` is absent in the oldest files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostTableRecord {
    pub hosts: Vec<HostRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecmp_hosts: Option<Vec<MultiPathRecord>>,
}

/// One host table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRecord {
    pub vrf: u32,
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intf: Option<u32>,
    #[serde(default)]
    pub port: PortRecord,
    pub egress_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress: Option<EgressRecord>,
}

/// The `port` field of a host record.
///
/// `0` means unset in every layout. The legacy layout stores a physical
/// port as a bare number; the current layout uses a tagged descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortRecord {
    Number(u32),
    Descriptor(PortTag),
}

impl PortRecord {
    pub const UNSET: PortRecord = PortRecord::Number(0);

    pub fn is_unset(&self) -> bool {
        matches!(self, PortRecord::Number(0))
    }
}

impl Default for PortRecord {
    fn default() -> Self {
        PortRecord::UNSET
    }
}

/// Tagged port descriptor. Unknown tags fail to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortTag {
    #[serde(rename = "phy")]
    Physical(u32),
    #[serde(rename = "agg")]
    Aggregate(u32),
}

/// An embedded standalone egress object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EgressRecord {
    pub egress_id: u64,
    pub mac: String,
    pub intf_id: u32,
}

/// One multipath entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiPathRecord {
    pub vrf: u32,
    pub next_hops: Vec<String>,
    pub egress_id: u64,
    pub ecmp_egress_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecmp_egress: Option<EcmpEgressRecord>,
}

/// An embedded ECMP egress group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EcmpEgressRecord {
    pub egress_id: u64,
    pub paths: Vec<u64>,
}
