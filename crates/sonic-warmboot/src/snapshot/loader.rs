//! Snapshot loader.
//!
//! Turns a persisted document into typed entries without touching hardware.
//! A load either yields every entry of the document or fails as a whole.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

use super::codec::{self, CodecError};
use super::record::{HostTableRecord, SnapshotDocument, KEY_ECMP_HOSTS, KEY_HOSTS};
use super::schema::{sniff_layout, SchemaLayout};
use crate::table::{HostEntry, HostKey, MultiPathEntry, MultiPathKey};
use crate::types::PortDescriptor;

/// Error loading a snapshot document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed snapshot document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("snapshot has no '{0}' section")]
    MissingSection(&'static str),

    #[error(
        "snapshot mixes layouts: {numbered_ports} bare port numbers and {tagged_ports} tagged ports"
    )]
    MixedLayout {
        numbered_ports: usize,
        tagged_ports: usize,
    },

    #[error("{section}[{index}]: {source}")]
    Record {
        section: &'static str,
        index: usize,
        #[source]
        source: CodecError,
    },

    #[error("{section}: duplicate key {key}")]
    DuplicateKey { section: &'static str, key: String },
}

/// Typed contents of one snapshot, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSnapshot {
    pub layout: SchemaLayout,
    pub hosts: Vec<(HostKey, HostEntry)>,
    pub multipaths: Vec<(MultiPathKey, MultiPathEntry)>,
}

/// Entry counts of a loaded snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub layout: &'static str,
    pub hosts: usize,
    pub owned_egresses: usize,
    pub physical_ports: usize,
    pub aggregate_ports: usize,
    pub multipaths: usize,
    pub owned_ecmp_egresses: usize,
}

impl LoadedSnapshot {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.multipaths.is_empty()
    }

    pub fn summary(&self) -> SnapshotSummary {
        let port_count = |physical: bool| {
            self.hosts
                .iter()
                .filter_map(|(_, e)| e.port())
                .filter(|p| p.is_physical() == physical)
                .count()
        };

        SnapshotSummary {
            layout: self.layout.as_str(),
            hosts: self.hosts.len(),
            owned_egresses: self.hosts.iter().filter(|(_, e)| e.owns_egress()).count(),
            physical_ports: port_count(true),
            aggregate_ports: port_count(false),
            multipaths: self.multipaths.len(),
            owned_ecmp_egresses: self
                .multipaths
                .iter()
                .filter(|(_, e)| e.owns_ecmp_egress())
                .count(),
        }
    }

    /// Re-encodes the entries in the current layout, keeping document order.
    ///
    /// Aggregate ports decoded from a file are dropped to unset, as the
    /// builder would.
    pub fn to_document(&self) -> SnapshotDocument {
        SnapshotDocument {
            host_table: HostTableRecord {
                hosts: self
                    .hosts
                    .iter()
                    .map(|(k, e)| codec::encode_host(k, e))
                    .collect(),
                ecmp_hosts: Some(
                    self.multipaths
                        .iter()
                        .map(|(k, e)| codec::encode_multipath(k, e))
                        .collect(),
                ),
            },
        }
    }

    /// Returns true if any host was restored with an aggregate port.
    pub fn has_aggregate_ports(&self) -> bool {
        self.hosts
            .iter()
            .any(|(_, e)| matches!(e.port(), Some(PortDescriptor::Aggregate(_))))
    }
}

/// Loads a snapshot from its JSON text.
pub fn load_from_str(text: &str) -> Result<LoadedSnapshot, LoadError> {
    let value: Value = serde_json::from_str(text)?;
    load_value(value)
}

/// Loads a snapshot from its JSON bytes.
pub fn load_from_slice(bytes: &[u8]) -> Result<LoadedSnapshot, LoadError> {
    let value: Value = serde_json::from_slice(bytes)?;
    load_value(value)
}

/// Loads a snapshot from a parsed JSON document.
pub fn load_value(value: Value) -> Result<LoadedSnapshot, LoadError> {
    let layout = sniff_layout(&value)?;
    let document: SnapshotDocument = serde_json::from_value(value)?;
    decode_document(&document, layout)
}

/// Decodes an already deserialized document under a known layout.
pub fn decode_document(
    document: &SnapshotDocument,
    layout: SchemaLayout,
) -> Result<LoadedSnapshot, LoadError> {
    let table = &document.host_table;

    let mut seen_hosts = BTreeSet::new();
    let mut hosts = Vec::with_capacity(table.hosts.len());
    for (index, record) in table.hosts.iter().enumerate() {
        let (key, entry) =
            codec::decode_host(record, layout).map_err(|source| LoadError::Record {
                section: KEY_HOSTS,
                index,
                source,
            })?;
        if !seen_hosts.insert(key.clone()) {
            return Err(LoadError::DuplicateKey {
                section: KEY_HOSTS,
                key: key.to_string(),
            });
        }
        hosts.push((key, entry));
    }

    let records = table.ecmp_hosts.as_deref().unwrap_or_default();
    let mut seen_multipaths = BTreeSet::new();
    let mut multipaths = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let (key, entry) = codec::decode_multipath(record).map_err(|source| LoadError::Record {
            section: KEY_ECMP_HOSTS,
            index,
            source,
        })?;
        if !seen_multipaths.insert(key.clone()) {
            return Err(LoadError::DuplicateKey {
                section: KEY_ECMP_HOSTS,
                key: key.to_string(),
            });
        }
        multipaths.push((key, entry));
    }

    debug!(
        layout = %layout,
        hosts = hosts.len(),
        multipaths = multipaths.len(),
        "Decoded warm boot snapshot"
    );

    Ok(LoadedSnapshot {
        layout,
        hosts,
        multipaths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EgressId, PortId};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn current_doc() -> Value {
        json!({
            "hostTable": {
                "hosts": [{
                    "vrf": 0, "ip": "10.0.0.1", "port": {"phy": 1}, "egressId": 5,
                    "egress": {"egressId": 5, "mac": "00:11:22:33:44:55", "intfId": 100}
                }],
                "ecmpHosts": [{
                    "vrf": 0, "nextHops": ["10.0.0.1", "10.0.0.2"],
                    "egressId": 10, "ecmpEgressId": 20,
                    "ecmpEgress": {"egressId": 20, "paths": [5, 6]}
                }]
            }
        })
    }

    #[test]
    fn test_load_current_layout() {
        let loaded = load_value(current_doc()).unwrap();
        assert_eq!(loaded.layout, SchemaLayout::Current);
        assert_eq!(loaded.hosts.len(), 1);
        assert_eq!(loaded.multipaths.len(), 1);

        let (key, entry) = &loaded.hosts[0];
        assert_eq!(key.to_string(), "vrf0:10.0.0.1");
        assert_eq!(entry.egress_id(), EgressId(5));
        assert_eq!(entry.port(), Some(&PortDescriptor::Physical(PortId(1))));
        assert!(entry.owns_egress());

        let (_, mp) = &loaded.multipaths[0];
        assert_eq!(mp.ecmp_egress().unwrap().paths, vec![EgressId(5), EgressId(6)]);
    }

    #[test]
    fn test_load_legacy_without_ecmp_hosts() {
        let text = r#"{"hostTable":{"hosts":[{"vrf":0,"ip":"10.0.0.1","port":1,"egressId":5}]}}"#;
        let loaded = load_from_str(text).unwrap();
        assert_eq!(loaded.layout, SchemaLayout::Legacy);
        assert!(loaded.multipaths.is_empty());
        assert_eq!(
            loaded.hosts[0].1.port(),
            Some(&PortDescriptor::Physical(PortId(1)))
        );
    }

    #[test]
    fn test_load_rejects_unparseable_text() {
        assert!(matches!(
            load_from_str("{\"hostTable\": "),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn test_load_rejects_missing_required_field() {
        let mut doc = current_doc();
        doc["hostTable"]["ecmpHosts"][0]
            .as_object_mut()
            .unwrap()
            .remove("ecmpEgressId");
        assert!(matches!(load_value(doc), Err(LoadError::Malformed(_))));
    }

    #[test]
    fn test_load_rejects_unknown_port_tag() {
        let mut doc = current_doc();
        doc["hostTable"]["hosts"][0]["port"] = json!({"lag": 1});
        assert!(matches!(load_value(doc), Err(LoadError::Malformed(_))));
    }

    #[test]
    fn test_load_rejects_bad_record_as_whole() {
        let mut doc = current_doc();
        doc["hostTable"]["ecmpHosts"][0]["nextHops"] = json!(["10.0.0.1", "nope"]);
        match load_value(doc) {
            Err(LoadError::Record { section, index, .. }) => {
                assert_eq!(section, "ecmpHosts");
                assert_eq!(index, 0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_load_rejects_duplicate_host() {
        let mut doc = current_doc();
        let host = doc["hostTable"]["hosts"][0].clone();
        doc["hostTable"]["hosts"].as_array_mut().unwrap().push(host);
        assert!(matches!(
            load_value(doc),
            Err(LoadError::DuplicateKey { section: "hosts", .. })
        ));
    }

    #[test]
    fn test_summary_counts() {
        let summary = load_value(current_doc()).unwrap().summary();
        assert_eq!(
            summary,
            SnapshotSummary {
                layout: "current",
                hosts: 1,
                owned_egresses: 1,
                physical_ports: 1,
                aggregate_ports: 0,
                multipaths: 1,
                owned_ecmp_egresses: 1,
            }
        );
    }

    #[test]
    fn test_to_document_upgrades_legacy_ports() {
        let legacy = json!({
            "hostTable": {"hosts": [{"vrf": 0, "ip": "10.0.0.1", "port": 7, "egressId": 5}]}
        });
        let upgraded = load_value(legacy).unwrap().to_document();
        assert_eq!(
            serde_json::to_value(&upgraded).unwrap(),
            json!({
                "hostTable": {
                    "hosts": [{"vrf": 0, "ip": "10.0.0.1", "port": {"phy": 7}, "egressId": 5}],
                    "ecmpHosts": []
                }
            })
        );
    }
}
