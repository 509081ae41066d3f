//! Snapshot builder.
//!
//! Walks the live host and multipath tables under a [`TablesView`] and renders
//! every entry that still resolves. Entries whose owners are already gone are
//! skipped; one churned entry never fails the capture.

use tracing::{debug, instrument};

use super::codec;
use super::record::{HostTableRecord, SnapshotDocument};
use crate::table::{ForwardingTables, TablesView};

/// Builds a snapshot document from a consistent view of both tables.
///
/// Output order is the table key order, so the same graph always produces
/// the same document.
pub fn build(view: &TablesView<'_>) -> SnapshotDocument {
    let mut skipped = 0usize;

    let mut hosts = Vec::with_capacity(view.hosts.len());
    for (key, weak) in view.hosts.iter() {
        match weak.upgrade() {
            Some(entry) => hosts.push(codec::encode_host(key, &entry)),
            None => {
                debug!(host = %key, "Skipping host entry released before capture");
                skipped += 1;
            }
        }
    }

    let mut ecmp_hosts = Vec::with_capacity(view.multipath.len());
    for (key, weak) in view.multipath.iter() {
        match weak.upgrade() {
            Some(entry) => ecmp_hosts.push(codec::encode_multipath(key, &entry)),
            None => {
                debug!(multipath = %key, "Skipping multipath entry released before capture");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "Snapshot omitted released entries");
    }

    SnapshotDocument {
        host_table: HostTableRecord {
            hosts,
            ecmp_hosts: Some(ecmp_hosts),
        },
    }
}

/// Takes the read locks on both tables and builds a snapshot.
#[instrument(skip(tables))]
pub fn capture(tables: &ForwardingTables) -> SnapshotDocument {
    let view = tables.read();
    let document = build(&view);
    debug!(
        hosts = document.host_table.hosts.len(),
        multipaths = document.host_table.ecmp_hosts.as_ref().map_or(0, Vec::len),
        "Captured warm boot snapshot"
    );
    document
}
