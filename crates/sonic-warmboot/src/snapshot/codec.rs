//! Entry codec: live entries to snapshot records and back.
//!
//! Every function here is a pure transform. Encoding never fails; decoding
//! rejects anything the encoder could not have produced for the given
//! layout.

use std::collections::BTreeSet;
use std::net::IpAddr;
use thiserror::Error;

use super::record::{
    EcmpEgressRecord, EgressRecord, HostRecord, MultiPathRecord, PortRecord, PortTag,
};
use super::schema::SchemaLayout;
use crate::table::{HostEntry, HostKey, MultiPathEntry, MultiPathKey, NextHop, ParseNextHopError};
use crate::types::{
    AggregatePortId, EcmpEgress, Egress, EgressId, InterfaceId, ParseMacError, PortDescriptor,
    PortId, VrfId,
};

/// Error decoding a single record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid IP address: {0}")]
    InvalidIp(String),

    #[error(transparent)]
    InvalidMac(#[from] ParseMacError),

    #[error(transparent)]
    InvalidNextHop(#[from] ParseNextHopError),

    #[error("duplicate next-hop {0}")]
    DuplicateNextHop(String),

    #[error("multipath record has no next-hops")]
    EmptyNextHops,

    #[error("bare port number {0} is not valid in the current layout")]
    UnexpectedPortNumber(u32),

    #[error("{field} is {record} but the embedded object claims {embedded}")]
    EgressIdMismatch {
        field: &'static str,
        record: u64,
        embedded: u64,
    },
}

/// Encodes a standalone egress object.
pub fn encode_egress(egress: &Egress) -> EgressRecord {
    EgressRecord {
        egress_id: egress.id.0,
        mac: egress.mac.to_string(),
        intf_id: egress.intf.0,
    }
}

/// Decodes a standalone egress object.
pub fn decode_egress(record: &EgressRecord) -> Result<Egress, CodecError> {
    Ok(Egress::new(
        EgressId(record.egress_id),
        record.mac.parse()?,
        InterfaceId(record.intf_id),
    ))
}

/// Encodes an ECMP egress group, keeping member order.
pub fn encode_ecmp_egress(ecmp: &EcmpEgress) -> EcmpEgressRecord {
    EcmpEgressRecord {
        egress_id: ecmp.id.0,
        paths: ecmp.paths.iter().map(|p| p.0).collect(),
    }
}

/// Decodes an ECMP egress group.
pub fn decode_ecmp_egress(record: &EcmpEgressRecord) -> EcmpEgress {
    EcmpEgress::new(
        EgressId(record.egress_id),
        record.paths.iter().copied().map(EgressId),
    )
}

/// Encodes a port descriptor.
///
/// Trunk-backed hosts are written with the port unset; trunk warm boot is
/// not supported.
pub fn encode_port(port: Option<&PortDescriptor>) -> PortRecord {
    match port {
        Some(PortDescriptor::Physical(p)) => PortRecord::Descriptor(PortTag::Physical(p.0)),
        Some(PortDescriptor::Aggregate(_)) | None => PortRecord::UNSET,
    }
}

/// Decodes a port field under the given layout.
pub fn decode_port(
    record: &PortRecord,
    layout: SchemaLayout,
) -> Result<Option<PortDescriptor>, CodecError> {
    match (*record, layout) {
        (PortRecord::Number(0), _) => Ok(None),
        (PortRecord::Number(n), SchemaLayout::Legacy) => Ok(Some(PortDescriptor::Physical(PortId(n)))),
        (PortRecord::Number(n), SchemaLayout::Current) => Err(CodecError::UnexpectedPortNumber(n)),
        (PortRecord::Descriptor(PortTag::Physical(p)), _) => {
            Ok(Some(PortDescriptor::Physical(PortId(p))))
        }
        (PortRecord::Descriptor(PortTag::Aggregate(a)), _) => {
            Ok(Some(PortDescriptor::Aggregate(AggregatePortId(a))))
        }
    }
}

/// Encodes one host entry.
///
/// The egress object is embedded only if the entry owns it.
pub fn encode_host(key: &HostKey, entry: &HostEntry) -> HostRecord {
    HostRecord {
        vrf: key.vrf().0,
        ip: key.ip().to_string(),
        intf: key.interface().map(|i| i.0),
        port: encode_port(entry.port()),
        egress_id: entry.egress_id().0,
        egress: entry.egress().map(encode_egress),
    }
}

/// Decodes one host record.
pub fn decode_host(
    record: &HostRecord,
    layout: SchemaLayout,
) -> Result<(HostKey, HostEntry), CodecError> {
    let ip: IpAddr = record
        .ip
        .parse()
        .map_err(|_| CodecError::InvalidIp(record.ip.clone()))?;

    let mut key = HostKey::new(VrfId(record.vrf), ip);
    if let Some(intf) = record.intf {
        key = key.with_interface(InterfaceId(intf));
    }

    let mut entry = match &record.egress {
        Some(egress_record) => {
            if egress_record.egress_id != record.egress_id {
                return Err(CodecError::EgressIdMismatch {
                    field: "egressId",
                    record: record.egress_id,
                    embedded: egress_record.egress_id,
                });
            }
            HostEntry::owning(decode_egress(egress_record)?)
        }
        None => HostEntry::referencing(EgressId(record.egress_id)),
    };

    if let Some(port) = decode_port(&record.port, layout)? {
        entry = entry.with_port(port);
    }

    Ok((key, entry))
}

/// Encodes one multipath entry.
pub fn encode_multipath(key: &MultiPathKey, entry: &MultiPathEntry) -> MultiPathRecord {
    MultiPathRecord {
        vrf: key.vrf().0,
        next_hops: key.nexthops().map(|nh| nh.to_string()).collect(),
        egress_id: entry.egress_id().0,
        ecmp_egress_id: entry.ecmp_egress_id().0,
        ecmp_egress: entry.ecmp_egress().map(encode_ecmp_egress),
    }
}

/// Decodes one multipath record.
pub fn decode_multipath(
    record: &MultiPathRecord,
) -> Result<(MultiPathKey, MultiPathEntry), CodecError> {
    if record.next_hops.is_empty() {
        return Err(CodecError::EmptyNextHops);
    }

    let mut nexthops = BTreeSet::new();
    for raw in &record.next_hops {
        let nh: NextHop = raw.parse()?;
        if !nexthops.insert(nh) {
            return Err(CodecError::DuplicateNextHop(raw.clone()));
        }
    }
    let key = MultiPathKey::new(VrfId(record.vrf), nexthops);

    let entry = match &record.ecmp_egress {
        Some(ecmp_record) => {
            if ecmp_record.egress_id != record.ecmp_egress_id {
                return Err(CodecError::EgressIdMismatch {
                    field: "ecmpEgressId",
                    record: record.ecmp_egress_id,
                    embedded: ecmp_record.egress_id,
                });
            }
            MultiPathEntry::owning(EgressId(record.egress_id), decode_ecmp_egress(ecmp_record))
        }
        None => MultiPathEntry::referencing(
            EgressId(record.egress_id),
            EgressId(record.ecmp_egress_id),
        ),
    };

    Ok((key, entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MacAddress;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn mac() -> MacAddress {
        "00:11:22:33:44:55".parse().unwrap()
    }

    fn host_key() -> HostKey {
        HostKey::new(VrfId(0), "10.0.0.1".parse().unwrap())
    }

    #[test]
    fn test_encode_owned_host() {
        let egress = Egress::new(EgressId(5), mac(), InterfaceId(100));
        let entry = HostEntry::owning(egress).with_port(PortDescriptor::Physical(PortId(1)));

        let record = encode_host(&host_key(), &entry);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "vrf": 0,
                "ip": "10.0.0.1",
                "port": {"phy": 1},
                "egressId": 5,
                "egress": {"egressId": 5, "mac": "00:11:22:33:44:55", "intfId": 100}
            })
        );
    }

    #[test]
    fn test_encode_host_route_never_embeds_egress() {
        let entry = HostEntry::referencing(EgressId(5));
        let key = host_key().with_interface(InterfaceId(100));

        let record = encode_host(&key, &entry);
        assert!(record.egress.is_none());
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"vrf": 0, "ip": "10.0.0.1", "intf": 100, "port": 0, "egressId": 5})
        );
    }

    #[test]
    fn test_encode_aggregate_port_left_unset() {
        let entry = HostEntry::referencing(EgressId(5))
            .with_port(PortDescriptor::Aggregate(AggregatePortId(3)));
        let record = encode_host(&host_key(), &entry);
        assert_eq!(record.port, PortRecord::UNSET);
    }

    #[test]
    fn test_decode_host_roundtrip() {
        let egress = Egress::new(EgressId(5), mac(), InterfaceId(100));
        let entry = HostEntry::owning(egress).with_port(PortDescriptor::Physical(PortId(1)));
        let key = host_key().with_interface(InterfaceId(9));

        let record = encode_host(&key, &entry);
        let (decoded_key, decoded_entry) = decode_host(&record, SchemaLayout::Current).unwrap();
        assert_eq!(decoded_key, key);
        assert_eq!(decoded_entry, entry);
    }

    #[test]
    fn test_decode_legacy_port_number() {
        let record: HostRecord = serde_json::from_value(json!({
            "vrf": 0, "ip": "10.0.0.1", "port": 3, "egressId": 5
        }))
        .unwrap();

        let (_, entry) = decode_host(&record, SchemaLayout::Legacy).unwrap();
        assert_eq!(entry.port(), Some(&PortDescriptor::Physical(PortId(3))));

        assert_eq!(
            decode_host(&record, SchemaLayout::Current).unwrap_err(),
            CodecError::UnexpectedPortNumber(3)
        );
    }

    #[test]
    fn test_decode_host_rejects_mismatched_egress() {
        let record: HostRecord = serde_json::from_value(json!({
            "vrf": 0, "ip": "10.0.0.1", "egressId": 5,
            "egress": {"egressId": 6, "mac": "00:11:22:33:44:55", "intfId": 100}
        }))
        .unwrap();
        assert!(matches!(
            decode_host(&record, SchemaLayout::Current),
            Err(CodecError::EgressIdMismatch { record: 5, embedded: 6, .. })
        ));
    }

    #[test]
    fn test_decode_host_rejects_bad_fields() {
        let mut record = encode_host(&host_key(), &HostEntry::referencing(EgressId(5)));
        record.ip = "10.0.0.256".to_string();
        assert!(matches!(
            decode_host(&record, SchemaLayout::Current),
            Err(CodecError::InvalidIp(_))
        ));

        let mut record = encode_host(
            &host_key(),
            &HostEntry::owning(Egress::new(EgressId(5), mac(), InterfaceId(1))),
        );
        if let Some(egress) = record.egress.as_mut() {
            egress.mac = "not-a-mac".to_string();
        }
        assert!(matches!(
            decode_host(&record, SchemaLayout::Current),
            Err(CodecError::InvalidMac(_))
        ));
    }

    #[test]
    fn test_multipath_roundtrip() {
        let key = MultiPathKey::new(
            VrfId(0),
            ["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()],
        );
        let entry = MultiPathEntry::owning(
            EgressId(10),
            EcmpEgress::new(EgressId(20), [EgressId(5), EgressId(6)]),
        );

        let record = encode_multipath(&key, &entry);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "vrf": 0,
                "nextHops": ["10.0.0.1", "10.0.0.2"],
                "egressId": 10,
                "ecmpEgressId": 20,
                "ecmpEgress": {"egressId": 20, "paths": [5, 6]}
            })
        );

        let (decoded_key, decoded_entry) = decode_multipath(&record).unwrap();
        assert_eq!(decoded_key, key);
        assert_eq!(decoded_entry, entry);
    }

    #[test]
    fn test_multipath_shared_group_not_embedded() {
        let key = MultiPathKey::new(VrfId(1), ["10.1.0.1@3".parse().unwrap()]);
        let entry = MultiPathEntry::referencing(EgressId(10), EgressId(20));
        let record = encode_multipath(&key, &entry);
        assert!(record.ecmp_egress.is_none());
        assert_eq!(record.next_hops, vec!["10.1.0.1@3".to_string()]);
    }

    #[test]
    fn test_decode_multipath_rejects_bad_next_hops() {
        let mut record = MultiPathRecord {
            vrf: 0,
            next_hops: vec![],
            egress_id: 10,
            ecmp_egress_id: 20,
            ecmp_egress: None,
        };
        assert_eq!(decode_multipath(&record).unwrap_err(), CodecError::EmptyNextHops);

        record.next_hops = vec!["10.0.0.1".into(), "10.0.0.1".into()];
        assert_eq!(
            decode_multipath(&record).unwrap_err(),
            CodecError::DuplicateNextHop("10.0.0.1".into())
        );

        record.next_hops = vec!["bogus".into()];
        assert!(matches!(
            decode_multipath(&record),
            Err(CodecError::InvalidNextHop(_))
        ));
    }
}
