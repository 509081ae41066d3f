//! The rebuilt forwarding-resolution graph handed to route resolution.

use std::sync::Arc;
use tracing::debug;

use crate::table::{ForwardingTables, HostEntry, HostKey, MultiPathEntry, MultiPathKey};

/// Entries that survived reconciliation.
///
/// The graph holds the only strong references until route resolution takes
/// them over with [`ReconciledGraph::into_parts`].
#[derive(Debug, Clone, Default)]
pub struct ReconciledGraph {
    hosts: Vec<(HostKey, Arc<HostEntry>)>,
    multipaths: Vec<(MultiPathKey, Arc<MultiPathEntry>)>,
}

impl ReconciledGraph {
    pub(crate) fn push_host(&mut self, key: HostKey, entry: HostEntry) {
        self.hosts.push((key, Arc::new(entry)));
    }

    pub(crate) fn push_multipath(&mut self, key: MultiPathKey, entry: MultiPathEntry) {
        self.multipaths.push((key, Arc::new(entry)));
    }

    pub fn hosts(&self) -> &[(HostKey, Arc<HostEntry>)] {
        &self.hosts
    }

    pub fn multipaths(&self) -> &[(MultiPathKey, Arc<MultiPathEntry>)] {
        &self.multipaths
    }

    pub fn host(&self, key: &HostKey) -> Option<&Arc<HostEntry>> {
        self.hosts.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn multipath(&self, key: &MultiPathKey) -> Option<&Arc<MultiPathEntry>> {
        self.multipaths.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.multipaths.is_empty()
    }

    /// Registers every entry in `tables` under one write lock.
    ///
    /// The tables only get weak handles; entries stay alive as long as this
    /// graph or its new owner holds them.
    pub fn install_into(&self, tables: &ForwardingTables) {
        let mut guard = tables.write();
        for (key, entry) in &self.hosts {
            guard.hosts.register(key.clone(), entry);
        }
        for (key, entry) in &self.multipaths {
            guard.multipath.register(key.clone(), entry);
        }
        debug!(
            hosts = self.hosts.len(),
            multipaths = self.multipaths.len(),
            "Installed reconciled entries"
        );
    }

    /// Hands ownership of all entries to the caller.
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        Vec<(HostKey, Arc<HostEntry>)>,
        Vec<(MultiPathKey, Arc<MultiPathEntry>)>,
    ) {
        (self.hosts, self.multipaths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EgressId, VrfId};

    #[test]
    fn test_install_registers_weak_handles() {
        let mut graph = ReconciledGraph::default();
        let key = HostKey::new(VrfId(0), "10.0.0.1".parse().unwrap());
        graph.push_host(key.clone(), HostEntry::referencing(EgressId(5)));

        let tables = ForwardingTables::new();
        graph.install_into(&tables);
        assert_eq!(tables.host_count(), 1);
        assert!(tables.read().hosts.lookup(&key).is_some());

        drop(graph);
        assert!(tables.read().hosts.lookup(&key).is_none());
    }

    #[test]
    fn test_into_parts_keeps_entries_alive() {
        let mut graph = ReconciledGraph::default();
        let key = MultiPathKey::new(VrfId(0), ["10.0.0.1".parse().unwrap()]);
        graph.push_multipath(key.clone(), MultiPathEntry::referencing(EgressId(10), EgressId(20)));

        let tables = ForwardingTables::new();
        graph.install_into(&tables);
        let (_, multipaths) = graph.into_parts();
        assert_eq!(tables.read().multipath.lookup(&key).as_deref(), Some(multipaths[0].1.as_ref()));
    }
}
