//! Reconciliation journal and report.

use serde::Serialize;
use std::fmt;

use super::ReconcileError;
use crate::table::{HostKey, MultiPathKey};
use crate::types::{EgressId, EgressKind};

/// What reconciliation did with one claimed egress object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The id was free in hardware and was programmed fresh.
    Created,
    /// Hardware already held matching content; nothing was programmed.
    Reused,
    /// Hardware held different content under the id and was rewritten.
    Reprogrammed,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Created => "created",
            Decision::Reused => "reused",
            Decision::Reprogrammed => "reprogrammed",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot entry, by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryRef {
    Host(HostKey),
    MultiPath(MultiPathKey),
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryRef::Host(key) => write!(f, "host {}", key),
            EntryRef::MultiPath(key) => write!(f, "multipath {}", key),
        }
    }
}

/// One step of reconciliation, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEvent {
    /// An egress object was settled against hardware.
    Egress {
        id: EgressId,
        kind: EgressKind,
        decision: Decision,
    },
    /// An entry was bound into the rebuilt graph.
    Bind(EntryRef),
}

/// An entry left out of the rebuilt graph and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEntry {
    pub entry: EntryRef,
    pub error: ReconcileError,
}

impl fmt::Display for DroppedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entry, self.error)
    }
}

/// Everything one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub strict: bool,
    pub journal: Vec<JournalEvent>,
    pub dropped: Vec<DroppedEntry>,
}

/// Flat counters of a [`ReconcileReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub created: usize,
    pub reused: usize,
    pub reprogrammed: usize,
    pub bound: usize,
    pub dropped: usize,
}

impl ReconcileReport {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            ..Default::default()
        }
    }

    /// Returns true if no entry was dropped.
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }

    pub fn decision_for(&self, id: EgressId) -> Option<Decision> {
        self.journal.iter().find_map(|event| match event {
            JournalEvent::Egress {
                id: event_id,
                decision,
                ..
            } if *event_id == id => Some(*decision),
            _ => None,
        })
    }

    /// Position of an event in the journal.
    pub fn position(&self, event: &JournalEvent) -> Option<usize> {
        self.journal.iter().position(|e| e == event)
    }

    pub fn counts(&self) -> ReportCounts {
        let mut counts = ReportCounts {
            dropped: self.dropped.len(),
            ..Default::default()
        };
        for event in &self.journal {
            match event {
                JournalEvent::Egress { decision, .. } => match decision {
                    Decision::Created => counts.created += 1,
                    Decision::Reused => counts.reused += 1,
                    Decision::Reprogrammed => counts.reprogrammed += 1,
                },
                JournalEvent::Bind(_) => counts.bound += 1,
            }
        }
        counts
    }

    pub(crate) fn drop_entry(&mut self, entry: EntryRef, error: ReconcileError) {
        self.dropped.push(DroppedEntry { entry, error });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VrfId;

    #[test]
    fn test_counts_and_lookup() {
        let host = EntryRef::Host(HostKey::new(VrfId(0), "10.0.0.1".parse().unwrap()));
        let mut report = ReconcileReport::new(false);
        report.journal.push(JournalEvent::Egress {
            id: EgressId(5),
            kind: EgressKind::Standalone,
            decision: Decision::Reused,
        });
        report.journal.push(JournalEvent::Bind(host.clone()));
        report.drop_entry(
            host.clone(),
            ReconcileError::Dangling {
                id: EgressId(9),
                kind: EgressKind::Standalone,
            },
        );

        let counts = report.counts();
        assert_eq!(counts.reused, 1);
        assert_eq!(counts.bound, 1);
        assert_eq!(counts.dropped, 1);
        assert!(!report.is_clean());
        assert_eq!(report.decision_for(EgressId(5)), Some(Decision::Reused));
        assert_eq!(report.decision_for(EgressId(6)), None);
        assert_eq!(report.position(&JournalEvent::Bind(host)), Some(1));
    }

    #[test]
    fn test_dropped_display() {
        let dropped = DroppedEntry {
            entry: EntryRef::Host(HostKey::new(VrfId(0), "10.0.0.1".parse().unwrap())),
            error: ReconcileError::Dangling {
                id: EgressId(9),
                kind: EgressKind::Standalone,
            },
        };
        assert_eq!(
            dropped.to_string(),
            "host vrf0:10.0.0.1: egress 9 is neither in the snapshot nor in hardware"
        );
    }
}
