//! Live forwarding-resolution tables.
//!
//! Route resolution owns every host and multipath entry (`Arc`); the tables
//! here only index them by key through weak handles. Both tables sit behind
//! one [`ForwardingTables`] pair so a snapshot can read them under a single
//! consistent view while route resolution mutates them from its own context.

mod host;
mod multipath;
mod nexthop;
mod weak;

pub use host::{HostEntry, HostKey, HostTable};
pub use multipath::{MultiPathEntry, MultiPathKey, MultiPathTable};
pub use nexthop::{NextHop, ParseNextHopError};
pub use weak::WeakTable;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// The host table and multipath table behind their locks.
///
/// Locks are always taken host table first, then multipath table.
#[derive(Debug, Default)]
pub struct ForwardingTables {
    hosts: RwLock<HostTable>,
    multipath: RwLock<MultiPathTable>,
}

/// A point-in-time read view over both tables.
///
/// While a view is alive no entry can be registered or erased in either
/// table.
pub struct TablesView<'a> {
    pub hosts: RwLockReadGuard<'a, HostTable>,
    pub multipath: RwLockReadGuard<'a, MultiPathTable>,
}

/// Exclusive access to both tables.
pub struct TablesMut<'a> {
    pub hosts: RwLockWriteGuard<'a, HostTable>,
    pub multipath: RwLockWriteGuard<'a, MultiPathTable>,
}

impl ForwardingTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the shared read locks on both tables.
    pub fn read(&self) -> TablesView<'_> {
        let hosts = self.hosts.read();
        let multipath = self.multipath.read();
        TablesView { hosts, multipath }
    }

    /// Takes the exclusive locks on both tables.
    pub fn write(&self) -> TablesMut<'_> {
        let hosts = self.hosts.write();
        let multipath = self.multipath.write();
        TablesMut { hosts, multipath }
    }

    pub fn register_host(&self, key: HostKey, entry: &Arc<HostEntry>) -> bool {
        self.hosts.write().register(key, entry)
    }

    pub fn erase_host(&self, key: &HostKey) -> bool {
        self.hosts.write().erase(key)
    }

    pub fn register_multipath(&self, key: MultiPathKey, entry: &Arc<MultiPathEntry>) -> bool {
        self.multipath.write().register(key, entry)
    }

    pub fn erase_multipath(&self, key: &MultiPathKey) -> bool {
        self.multipath.write().erase(key)
    }

    pub fn host_count(&self) -> usize {
        self.hosts.read().len()
    }

    pub fn multipath_count(&self) -> usize {
        self.multipath.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EgressId, VrfId};

    #[test]
    fn test_view_blocks_structural_writes() {
        let tables = ForwardingTables::new();
        let entry = Arc::new(HostEntry::referencing(EgressId(5)));
        let key = HostKey::new(VrfId(0), "10.0.0.1".parse().unwrap());
        tables.register_host(key.clone(), &entry);

        let view = tables.read();
        assert!(tables.try_write_hosts_for_test().is_none());
        assert_eq!(view.hosts.lookup(&key).as_deref(), Some(entry.as_ref()));
        drop(view);
        assert!(tables.try_write_hosts_for_test().is_some());
    }

    impl ForwardingTables {
        fn try_write_hosts_for_test(&self) -> Option<RwLockWriteGuard<'_, HostTable>> {
            self.hosts.try_write()
        }
    }
}
