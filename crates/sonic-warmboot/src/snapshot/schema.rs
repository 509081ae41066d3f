//! Snapshot layout detection.
//!
//! Snapshot files carry no version tag, so the layout is recognised from the
//! document shape alone. A new layout is added here as another variant; the
//! rest of the loader only switches on the result.

use serde_json::Value;
use std::fmt;

use super::loader::LoadError;
use super::record::{KEY_ECMP_HOSTS, KEY_HOSTS, KEY_HOST_TABLE, KEY_PORT};

/// Known snapshot layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaLayout {
    /// Written before port descriptors and/or multipath records existed:
    /// `port` is a bare physical port number and `ecmpHosts` may be absent.
    Legacy,
    /// `port` is `0` or a tagged descriptor and `ecmpHosts` is always present.
    Current,
}

impl SchemaLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaLayout::Legacy => "legacy",
            SchemaLayout::Current => "current",
        }
    }
}

impl fmt::Display for SchemaLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detects the layout of a raw snapshot document.
///
/// Only checks the shape needed to tell layouts apart; field-level
/// validation is left to the decoder.
pub fn sniff_layout(doc: &Value) -> Result<SchemaLayout, LoadError> {
    let host_table = doc
        .get(KEY_HOST_TABLE)
        .and_then(Value::as_object)
        .ok_or(LoadError::MissingSection(KEY_HOST_TABLE))?;

    let hosts = host_table
        .get(KEY_HOSTS)
        .and_then(Value::as_array)
        .ok_or(LoadError::MissingSection(KEY_HOSTS))?;

    let mut numbered_ports = 0usize;
    let mut tagged_ports = 0usize;
    for host in hosts {
        match host.get(KEY_PORT) {
            Some(Value::Number(n)) if n.as_u64() != Some(0) => numbered_ports += 1,
            Some(Value::Object(_)) => tagged_ports += 1,
            _ => {}
        }
    }

    if numbered_ports > 0 && tagged_ports > 0 {
        return Err(LoadError::MixedLayout {
            numbered_ports,
            tagged_ports,
        });
    }

    if numbered_ports > 0 || !host_table.contains_key(KEY_ECMP_HOSTS) {
        return Ok(SchemaLayout::Legacy);
    }

    Ok(SchemaLayout::Current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sniff_current() {
        let doc = json!({
            "hostTable": {
                "hosts": [{"vrf": 0, "ip": "10.0.0.1", "port": {"phy": 1}, "egressId": 5}],
                "ecmpHosts": []
            }
        });
        assert_eq!(sniff_layout(&doc).unwrap(), SchemaLayout::Current);
    }

    #[test]
    fn test_sniff_legacy_numbered_port() {
        let doc = json!({
            "hostTable": {
                "hosts": [{"vrf": 0, "ip": "10.0.0.1", "port": 3, "egressId": 5}],
                "ecmpHosts": []
            }
        });
        assert_eq!(sniff_layout(&doc).unwrap(), SchemaLayout::Legacy);
    }

    #[test]
    fn test_sniff_legacy_without_ecmp_hosts() {
        let doc = json!({
            "hostTable": {
                "hosts": [{"vrf": 0, "ip": "10.0.0.1", "port": 0, "egressId": 5}]
            }
        });
        assert_eq!(sniff_layout(&doc).unwrap(), SchemaLayout::Legacy);
    }

    #[test]
    fn test_sniff_unset_ports_with_ecmp_is_current() {
        let doc = json!({
            "hostTable": {
                "hosts": [{"vrf": 0, "ip": "10.0.0.1", "port": 0, "egressId": 5}],
                "ecmpHosts": []
            }
        });
        assert_eq!(sniff_layout(&doc).unwrap(), SchemaLayout::Current);
    }

    #[test]
    fn test_sniff_mixed_layout_rejected() {
        let doc = json!({
            "hostTable": {
                "hosts": [
                    {"vrf": 0, "ip": "10.0.0.1", "port": 3, "egressId": 5},
                    {"vrf": 0, "ip": "10.0.0.2", "port": {"phy": 4}, "egressId": 6}
                ],
                "ecmpHosts": []
            }
        });
        assert!(matches!(
            sniff_layout(&doc),
            Err(LoadError::MixedLayout { numbered_ports: 1, tagged_ports: 1 })
        ));
    }

    #[test]
    fn test_sniff_missing_sections() {
        assert!(matches!(
            sniff_layout(&json!({})),
            Err(LoadError::MissingSection("hostTable"))
        ));
        assert!(matches!(
            sniff_layout(&json!({"hostTable": {"ecmpHosts": []}})),
            Err(LoadError::MissingSection("hosts"))
        ));
        assert!(matches!(
            sniff_layout(&json!([1, 2, 3])),
            Err(LoadError::MissingSection("hostTable"))
        ));
    }
}
