//! Reconciler: rebuilds the live graph from a loaded snapshot against what
//! hardware currently holds.
//!
//! A pass runs in three stages:
//!
//! 1. **Claims**: every embedded egress object is a claim on its id. Two
//!    records claiming one id with different content are both dropped.
//! 2. **Egress objects**: standalone egresses are settled in id order, then
//!    ECMP groups, whose members must resolve to a standalone egress that
//!    was settled or already sits in hardware. Each object is reused when
//!    hardware holds matching content, rewritten when the content differs,
//!    and created when the id is free.
//! 3. **Entries**: hosts and multipath entries are bound in snapshot order,
//!    only after every object they reference is settled.
//!
//! Entry-level failures drop just that entry. In strict mode any failure
//! aborts the pass; failures found before programming abort it before
//! hardware is touched.
//!
//! The pass is single threaded and owns the hardware handle for its whole
//! run, so every decision on the egress id namespace is serialized.

mod graph;
mod report;

pub use graph::ReconciledGraph;
pub use report::{Decision, DroppedEntry, EntryRef, JournalEvent, ReconcileReport, ReportCounts};

use std::collections::btree_map::{BTreeMap, Entry};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::hw::{HardwareProgrammer, HardwareQuery, HwError};
use crate::snapshot::LoadedSnapshot;
use crate::table::{HostEntry, MultiPathEntry};
use crate::types::{EgressId, EgressKind, EgressObject};

/// Why one entry could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("{kind} {id} is neither in the snapshot nor in hardware")]
    Dangling { id: EgressId, kind: EgressKind },

    #[error("ecmp-egress {group} member {path} does not resolve to an egress")]
    UnresolvedPath { group: EgressId, path: EgressId },

    #[error("{kind} {id} is claimed with conflicting content")]
    ConflictingClaim { id: EgressId, kind: EgressKind },

    #[error("egress id {id} holds a {found} where a {expected} is expected")]
    KindMismatch {
        id: EgressId,
        expected: EgressKind,
        found: EgressKind,
    },

    #[error("embedded {kind} has an unset id")]
    UnsetId { kind: EgressKind },

    #[error(transparent)]
    Hardware(#[from] HwError),
}

/// Reconciliation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Abort on the first entry-level error instead of dropping the entry.
    pub strict: bool,
}

impl ReconcileOptions {
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

/// Terminal result of a reconciliation pass.
#[derive(Debug)]
pub enum ReconcileOutcome {
    Reconciled {
        graph: ReconciledGraph,
        report: ReconcileReport,
    },
    Aborted {
        report: ReconcileReport,
    },
}

impl ReconcileOutcome {
    pub fn is_reconciled(&self) -> bool {
        matches!(self, ReconcileOutcome::Reconciled { .. })
    }

    pub fn report(&self) -> &ReconcileReport {
        match self {
            ReconcileOutcome::Reconciled { report, .. } | ReconcileOutcome::Aborted { report } => {
                report
            }
        }
    }

    pub fn graph(&self) -> Option<&ReconciledGraph> {
        match self {
            ReconcileOutcome::Reconciled { graph, .. } => Some(graph),
            ReconcileOutcome::Aborted { .. } => None,
        }
    }

    pub fn into_graph(self) -> Option<ReconciledGraph> {
        match self {
            ReconcileOutcome::Reconciled { graph, .. } => Some(graph),
            ReconcileOutcome::Aborted { .. } => None,
        }
    }
}

/// Reconciles `snapshot` against `hw`.
#[instrument(
    skip_all,
    fields(
        strict = options.strict,
        hosts = snapshot.hosts.len(),
        multipaths = snapshot.multipaths.len()
    )
)]
pub fn reconcile<H>(
    snapshot: &LoadedSnapshot,
    hw: &mut H,
    options: ReconcileOptions,
) -> ReconcileOutcome
where
    H: HardwareQuery + HardwareProgrammer + ?Sized,
{
    let mut pass = Pass::new(snapshot);
    let mut report = ReconcileReport::new(options.strict);

    pass.collect_claims();
    let steps = pass.plan(&*hw);

    if options.strict {
        let errors = pass.check_entries(&*hw);
        if !errors.is_empty() {
            for (entry, error) in errors {
                record_drop(&mut report, entry, error);
            }
            warn!(
                dropped = report.dropped.len(),
                "Strict reconciliation aborted before programming"
            );
            return ReconcileOutcome::Aborted { report };
        }
    }

    for step in steps {
        if let Err(failed) = pass.execute(hw, step, &mut report) {
            if options.strict {
                for entry in pass.claimants(failed) {
                    let error = pass.failure(failed);
                    record_drop(&mut report, entry, error);
                }
                warn!(egress_id = %failed, "Strict reconciliation aborted on hardware failure");
                return ReconcileOutcome::Aborted { report };
            }
        }
    }

    let mut graph = ReconciledGraph::default();
    for (key, entry) in &snapshot.hosts {
        let entry_ref = EntryRef::Host(key.clone());
        match pass.check_host(&*hw, entry) {
            Ok(()) => {
                graph.push_host(key.clone(), entry.clone());
                report.journal.push(JournalEvent::Bind(entry_ref));
            }
            Err(error) => {
                record_drop(&mut report, entry_ref, error);
                if options.strict {
                    return ReconcileOutcome::Aborted { report };
                }
            }
        }
    }
    for (key, entry) in &snapshot.multipaths {
        let entry_ref = EntryRef::MultiPath(key.clone());
        match pass.check_multipath(&*hw, entry) {
            Ok(()) => {
                graph.push_multipath(key.clone(), entry.clone());
                report.journal.push(JournalEvent::Bind(entry_ref));
            }
            Err(error) => {
                record_drop(&mut report, entry_ref, error);
                if options.strict {
                    return ReconcileOutcome::Aborted { report };
                }
            }
        }
    }

    let counts = report.counts();
    info!(
        created = counts.created,
        reused = counts.reused,
        reprogrammed = counts.reprogrammed,
        bound = counts.bound,
        dropped = counts.dropped,
        "Reconciliation finished"
    );

    ReconcileOutcome::Reconciled { graph, report }
}

fn record_drop(report: &mut ReconcileReport, entry: EntryRef, error: ReconcileError) {
    warn!(entry = %entry, error = %error, "Dropping snapshot entry");
    let object_type = match entry {
        EntryRef::Host(_) => "host",
        EntryRef::MultiPath(_) => "multipath",
    };
    audit_log!(AuditRecord::new(AuditCategory::WarmRestart, "Reconciler", "drop_entry")
        .with_object_id(entry.to_string())
        .with_object_type(object_type)
        .with_error(error.to_string()));
    report.drop_entry(entry, error);
}

struct Claim {
    object: EgressObject,
    claimants: Vec<EntryRef>,
}

struct PlannedStep {
    object: EgressObject,
    decision: Decision,
}

/// Working state of one pass.
struct Pass<'s> {
    snapshot: &'s LoadedSnapshot,
    claims: BTreeMap<EgressId, Claim>,
    /// Objects that are, or are planned to be, in hardware with snapshot content.
    settled: BTreeMap<EgressId, EgressKind>,
    failed: BTreeMap<EgressId, ReconcileError>,
}

impl<'s> Pass<'s> {
    fn new(snapshot: &'s LoadedSnapshot) -> Self {
        Self {
            snapshot,
            claims: BTreeMap::new(),
            settled: BTreeMap::new(),
            failed: BTreeMap::new(),
        }
    }

    fn collect_claims(&mut self) {
        let snapshot = self.snapshot;
        for (key, entry) in &snapshot.hosts {
            if let Some(egress) = entry.egress() {
                self.claim(egress.clone().into(), EntryRef::Host(key.clone()));
            }
        }
        for (key, entry) in &snapshot.multipaths {
            if let Some(ecmp) = entry.ecmp_egress() {
                self.claim(ecmp.clone().into(), EntryRef::MultiPath(key.clone()));
            }
        }
    }

    fn claim(&mut self, object: EgressObject, claimant: EntryRef) {
        let id = object.id();
        if id.is_unset() {
            self.failed
                .insert(id, ReconcileError::UnsetId { kind: object.kind() });
        }
        match self.claims.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(Claim {
                    object,
                    claimants: vec![claimant],
                });
            }
            Entry::Occupied(mut slot) => {
                let claim = slot.get_mut();
                if !claim.object.same_content(&object) && !id.is_unset() {
                    debug!(egress_id = %id, "Conflicting egress claims");
                    self.failed.insert(
                        id,
                        ReconcileError::ConflictingClaim {
                            id,
                            kind: claim.object.kind(),
                        },
                    );
                }
                claim.claimants.push(claimant);
            }
        }
    }

    /// Decides what to do with every claimed object, standalone egresses
    /// first. Does not program anything.
    fn plan<H: HardwareQuery + ?Sized>(&mut self, hw: &H) -> Vec<PlannedStep> {
        let mut steps = Vec::with_capacity(self.claims.len());
        for kind in [EgressKind::Standalone, EgressKind::Ecmp] {
            let ids: Vec<EgressId> = self
                .claims
                .iter()
                .filter(|(id, claim)| claim.object.kind() == kind && !self.failed.contains_key(id))
                .map(|(id, _)| *id)
                .collect();

            for id in ids {
                let Some(object) = self.claims.get(&id).map(|c| c.object.clone()) else {
                    continue;
                };

                if let EgressObject::Ecmp(ecmp) = &object {
                    let unresolved = ecmp
                        .paths
                        .iter()
                        .find(|path| self.resolve(hw, **path, EgressKind::Standalone).is_err());
                    if let Some(path) = unresolved {
                        self.failed.insert(
                            id,
                            ReconcileError::UnresolvedPath {
                                group: id,
                                path: *path,
                            },
                        );
                        continue;
                    }
                }

                let decision = match hw.lookup(id) {
                    None => Decision::Created,
                    Some(existing) if existing.kind() != kind => {
                        self.failed.insert(
                            id,
                            ReconcileError::KindMismatch {
                                id,
                                expected: kind,
                                found: existing.kind(),
                            },
                        );
                        continue;
                    }
                    Some(existing) if existing.same_content(&object) => Decision::Reused,
                    Some(_) => Decision::Reprogrammed,
                };

                self.settled.insert(id, kind);
                steps.push(PlannedStep { object, decision });
            }
        }
        steps
    }

    /// Applies one planned step. On failure returns the id that failed.
    fn execute<H>(
        &mut self,
        hw: &mut H,
        step: PlannedStep,
        report: &mut ReconcileReport,
    ) -> Result<(), EgressId>
    where
        H: HardwareQuery + HardwareProgrammer + ?Sized,
    {
        let id = step.object.id();

        if let EgressObject::Ecmp(ecmp) = &step.object {
            if let Some(path) = ecmp.paths.iter().find(|p| self.failed.contains_key(p)) {
                self.settled.remove(&id);
                self.failed.insert(
                    id,
                    ReconcileError::UnresolvedPath {
                        group: id,
                        path: *path,
                    },
                );
                return Err(id);
            }
        }

        let result = match step.decision {
            Decision::Created => hw.create(&step.object),
            Decision::Reprogrammed => hw.update(&step.object),
            Decision::Reused => Ok(()),
        };

        match result {
            Ok(()) => {
                debug!(
                    egress_id = %id,
                    kind = %step.object.kind(),
                    decision = %step.decision,
                    "Settled egress object"
                );
                if step.decision != Decision::Reused {
                    audit_log!(AuditRecord::new(
                        AuditCategory::ResourceModify,
                        "Reconciler",
                        step.decision.as_str()
                    )
                    .with_outcome(AuditOutcome::Success)
                    .with_object_id(id.to_string())
                    .with_object_type(step.object.kind().to_string()));
                }
                report.journal.push(JournalEvent::Egress {
                    id,
                    kind: step.object.kind(),
                    decision: step.decision,
                });
                Ok(())
            }
            Err(e) => {
                warn!(egress_id = %id, error = %e, "Failed to program egress object");
                self.settled.remove(&id);
                self.failed.insert(id, e.into());
                Err(id)
            }
        }
    }

    /// Checks that `id` names an object of `kind` that will be live.
    fn resolve<H: HardwareQuery + ?Sized>(
        &self,
        hw: &H,
        id: EgressId,
        kind: EgressKind,
    ) -> Result<(), ReconcileError> {
        if let Some(error) = self.failed.get(&id) {
            return Err(error.clone());
        }
        let found = match self.settled.get(&id) {
            Some(settled) => Some(*settled),
            None => hw.lookup(id).map(|object| object.kind()),
        };
        match found {
            None => Err(ReconcileError::Dangling { id, kind }),
            Some(found) if found != kind => Err(ReconcileError::KindMismatch {
                id,
                expected: kind,
                found,
            }),
            Some(_) => Ok(()),
        }
    }

    /// Checks that `id` names an object of either kind that will be live.
    /// Host routes over a multipath next hop point straight at the group.
    fn resolve_any<H: HardwareQuery + ?Sized>(
        &self,
        hw: &H,
        id: EgressId,
    ) -> Result<EgressKind, ReconcileError> {
        if let Some(error) = self.failed.get(&id) {
            return Err(error.clone());
        }
        match self.settled.get(&id) {
            Some(settled) => Ok(*settled),
            None => hw
                .lookup(id)
                .map(|object| object.kind())
                .ok_or(ReconcileError::Dangling {
                    id,
                    kind: EgressKind::Standalone,
                }),
        }
    }

    fn claim_status(&self, id: EgressId) -> Result<(), ReconcileError> {
        match self.failed.get(&id) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn check_host<H: HardwareQuery + ?Sized>(
        &self,
        hw: &H,
        entry: &HostEntry,
    ) -> Result<(), ReconcileError> {
        match entry.egress() {
            Some(egress) => self.claim_status(egress.id),
            None if entry.egress_id().is_unset() => Ok(()),
            None => self.resolve_any(hw, entry.egress_id()).map(|_| ()),
        }
    }

    /// Only the ECMP group is a dependency; the multipath `egress_id` is
    /// carried through as-is.
    fn check_multipath<H: HardwareQuery + ?Sized>(
        &self,
        hw: &H,
        entry: &MultiPathEntry,
    ) -> Result<(), ReconcileError> {
        match entry.ecmp_egress() {
            Some(ecmp) => self.claim_status(ecmp.id),
            None => self.resolve(hw, entry.ecmp_egress_id(), EgressKind::Ecmp),
        }
    }

    fn check_entries<H: HardwareQuery + ?Sized>(&self, hw: &H) -> Vec<(EntryRef, ReconcileError)> {
        let hosts = self.snapshot.hosts.iter().filter_map(|(key, entry)| {
            self.check_host(hw, entry)
                .err()
                .map(|e| (EntryRef::Host(key.clone()), e))
        });
        let multipaths = self.snapshot.multipaths.iter().filter_map(|(key, entry)| {
            self.check_multipath(hw, entry)
                .err()
                .map(|e| (EntryRef::MultiPath(key.clone()), e))
        });
        hosts.chain(multipaths).collect()
    }

    fn claimants(&self, id: EgressId) -> Vec<EntryRef> {
        self.claims
            .get(&id)
            .map(|claim| claim.claimants.clone())
            .unwrap_or_default()
    }

    fn failure(&self, id: EgressId) -> ReconcileError {
        self.failed
            .get(&id)
            .cloned()
            .unwrap_or(ReconcileError::Dangling {
                id,
                kind: EgressKind::Standalone,
            })
    }
}
