//! Warm boot orchestration.
//!
//! ```text
//!  Idle ──> CapturingSnapshot ──> Persisted
//!   │              │
//!   │              └──> Idle (capture failed, next boot is cold)
//!   │
//!   └──> Loading ──> Reconciling ──> WarmBootComplete
//!           │             │
//!           └─────────────┴──> ColdBootFallback
//! ```
//!
//! The orchestrator is the only place that decides to abandon warm boot.
//! Route resolution must wait on the [`RouteUpdateGate`] before it starts
//! claiming egress ids; the gate opens once restore reaches a terminal state.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - CP-10: System Recovery - warm restart with safe cold boot fallback
//! - AU-12: Audit Record Generation - every transition is audited

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::config::WarmBootConfig;
use crate::error::{Result, WarmBootError};
use crate::hw::{HardwareProgrammer, HardwareQuery};
use crate::reconcile::{self, ReconcileOptions, ReconcileOutcome, ReconcileReport, ReconciledGraph};
use crate::snapshot;
use crate::table::ForwardingTables;

/// Warm boot lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarmBootState {
    Idle,
    CapturingSnapshot,
    Persisted,
    Loading,
    Reconciling,
    WarmBootComplete,
    ColdBootFallback,
}

impl WarmBootState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarmBootState::Idle => "idle",
            WarmBootState::CapturingSnapshot => "capturing_snapshot",
            WarmBootState::Persisted => "persisted",
            WarmBootState::Loading => "loading",
            WarmBootState::Reconciling => "reconciling",
            WarmBootState::WarmBootComplete => "warm_boot_complete",
            WarmBootState::ColdBootFallback => "cold_boot_fallback",
        }
    }

    /// Returns true once restore has decided between warm and cold boot.
    pub fn is_restore_terminal(&self) -> bool {
        matches!(
            self,
            WarmBootState::WarmBootComplete | WarmBootState::ColdBootFallback
        )
    }

    pub fn can_transition_to(&self, next: WarmBootState) -> bool {
        use WarmBootState::*;
        matches!(
            (self, next),
            (Idle | WarmBootComplete | ColdBootFallback, CapturingSnapshot)
                | (CapturingSnapshot, Persisted | Idle)
                | (Idle, Loading)
                | (Loading, Reconciling | ColdBootFallback)
                | (Reconciling, WarmBootComplete | ColdBootFallback)
        )
    }
}

impl fmt::Display for WarmBootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why restore fell back to cold boot.
#[derive(Debug)]
pub enum FallbackReason {
    /// No snapshot was found.
    NoSnapshot,
    /// The snapshot could not be read or decoded.
    LoadFailed(snapshot::LoadError),
    /// Reconciliation aborted in strict mode.
    Aborted(ReconcileReport),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoSnapshot => write!(f, "no snapshot"),
            FallbackReason::LoadFailed(e) => write!(f, "snapshot load failed: {}", e),
            FallbackReason::Aborted(report) => {
                write!(f, "reconciliation aborted")?;
                if let Some(first) = report.dropped.first() {
                    write!(f, ": {}", first)?;
                }
                Ok(())
            }
        }
    }
}

/// Result of [`WarmBootOrchestrator::restore`].
#[derive(Debug)]
pub enum RestoreOutcome {
    /// The graph is live and installed. The caller takes ownership of it.
    WarmBoot {
        graph: ReconciledGraph,
        report: ReconcileReport,
    },
    /// Nothing was installed; route resolution must program from scratch.
    ColdBoot { reason: FallbackReason },
}

impl RestoreOutcome {
    pub fn is_warm(&self) -> bool {
        matches!(self, RestoreOutcome::WarmBoot { .. })
    }
}

/// What a successful capture wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureSummary {
    pub path: PathBuf,
    pub hosts: usize,
    pub multipaths: usize,
}

/// Warm boot counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmBootStats {
    pub captures: u64,
    pub capture_failures: u64,
    pub warm_boots: u64,
    pub cold_boots: u64,
    pub dropped_entries: u64,
}

/// Blocks route resolution until restore has finished.
#[derive(Debug, Clone)]
pub struct RouteUpdateGate {
    rx: watch::Receiver<bool>,
}

impl RouteUpdateGate {
    pub fn is_open(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the gate to open.
    ///
    /// Returns false if the orchestrator went away without opening it.
    pub async fn opened(&mut self) -> bool {
        self.rx.wait_for(|open| *open).await.is_ok()
    }
}

/// Sequences capture before shutdown and restore after restart.
#[derive(Debug)]
pub struct WarmBootOrchestrator {
    config: WarmBootConfig,
    state: WarmBootState,
    gate: watch::Sender<bool>,
    stats: WarmBootStats,
}

impl WarmBootOrchestrator {
    pub fn new(config: WarmBootConfig) -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            config,
            state: WarmBootState::Idle,
            gate,
            stats: WarmBootStats::default(),
        }
    }

    pub fn state(&self) -> WarmBootState {
        self.state
    }

    pub fn config(&self) -> &WarmBootConfig {
        &self.config
    }

    pub fn stats(&self) -> &WarmBootStats {
        &self.stats
    }

    /// A gate that opens when restore reaches a terminal state.
    pub fn route_update_gate(&self) -> RouteUpdateGate {
        RouteUpdateGate {
            rx: self.gate.subscribe(),
        }
    }

    fn transition(&mut self, next: WarmBootState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(WarmBootError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        info!(from = %self.state, to = %next, "Warm boot state transition");
        audit_log!(AuditRecord::new(AuditCategory::WarmRestart, "WarmBoot", "transition")
            .with_outcome(AuditOutcome::InProgress)
            .with_object_type("warm_boot_state")
            .with_object_id(next.as_str())
            .with_details(serde_json::json!({"from": self.state.as_str()})));
        self.state = next;
        if next.is_restore_terminal() {
            self.gate.send_replace(true);
        }
        Ok(())
    }

    /// Captures both tables and persists the snapshot.
    ///
    /// On failure the state returns to `Idle` and, if configured, any older
    /// snapshot is removed so the next boot is cold.
    #[instrument(skip_all, fields(path = %self.config.snapshot_path.display()))]
    pub async fn capture(&mut self, tables: &ForwardingTables) -> Result<CaptureSummary> {
        self.transition(WarmBootState::CapturingSnapshot)?;

        let document = snapshot::capture(tables);
        let summary = CaptureSummary {
            path: self.config.snapshot_path.clone(),
            hosts: document.host_table.hosts.len(),
            multipaths: document.host_table.ecmp_hosts.as_ref().map_or(0, Vec::len),
        };

        let written =
            snapshot::write_document(&self.config.snapshot_path, &document, self.config.pretty)
                .await;

        if let Err(e) = written {
            self.stats.capture_failures += 1;
            warn!(error = %e, "Snapshot capture failed");
            if self.config.remove_stale_on_failure {
                match snapshot::remove_snapshot(&self.config.snapshot_path).await {
                    Ok(true) => info!("Removed stale snapshot"),
                    Ok(false) => {}
                    Err(rm) => warn!(error = %rm, "Failed to remove stale snapshot"),
                }
            }
            audit_log!(AuditRecord::new(AuditCategory::ErrorCondition, "WarmBoot", "capture")
                .with_object_id(self.config.snapshot_path.display().to_string())
                .with_object_type("snapshot")
                .with_error(e.to_string()));
            self.transition(WarmBootState::Idle)?;
            return Err(e);
        }

        self.stats.captures += 1;
        self.transition(WarmBootState::Persisted)?;
        audit_log!(AuditRecord::new(AuditCategory::WarmRestart, "WarmBoot", "capture")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(summary.path.display().to_string())
            .with_object_type("snapshot")
            .with_details(serde_json::json!({
                "hosts": summary.hosts,
                "multipaths": summary.multipaths,
            })));
        Ok(summary)
    }

    /// Loads the snapshot, reconciles it against `hw` and installs the
    /// result into `tables`.
    ///
    /// A missing or unreadable snapshot and an aborted reconciliation all
    /// end in `ColdBootFallback` with `tables` untouched. The snapshot file
    /// is consumed either way. Only an invalid transition is an error.
    #[instrument(skip_all, fields(path = %self.config.snapshot_path.display(), strict = self.config.strict))]
    pub async fn restore<H>(
        &mut self,
        tables: &ForwardingTables,
        hw: &mut H,
    ) -> Result<RestoreOutcome>
    where
        H: HardwareQuery + HardwareProgrammer + ?Sized,
    {
        self.transition(WarmBootState::Loading)?;

        let loaded = snapshot::read_snapshot(&self.config.snapshot_path).await;
        if !matches!(loaded, Ok(None)) {
            self.consume_snapshot().await;
        }
        let loaded = match loaded {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return self.fall_back(FallbackReason::NoSnapshot),
            Err(e) => return self.fall_back(FallbackReason::LoadFailed(e)),
        };

        if loaded.has_aggregate_ports() {
            warn!("Snapshot carries aggregate ports; trunk state is not restored");
        }
        info!(
            layout = %loaded.layout,
            hosts = loaded.hosts.len(),
            multipaths = loaded.multipaths.len(),
            "Loaded warm boot snapshot"
        );

        self.transition(WarmBootState::Reconciling)?;
        let options = ReconcileOptions {
            strict: self.config.strict,
        };

        match reconcile::reconcile(&loaded, hw, options) {
            ReconcileOutcome::Reconciled { graph, report } => {
                graph.install_into(tables);
                self.stats.warm_boots += 1;
                self.stats.dropped_entries += report.dropped.len() as u64;
                self.transition(WarmBootState::WarmBootComplete)?;
                audit_log!(AuditRecord::new(AuditCategory::WarmRestart, "WarmBoot", "restore")
                    .with_outcome(AuditOutcome::Success)
                    .with_details(serde_json::to_value(report.counts()).unwrap_or_default()));
                Ok(RestoreOutcome::WarmBoot { graph, report })
            }
            ReconcileOutcome::Aborted { report } => {
                self.stats.dropped_entries += report.dropped.len() as u64;
                self.fall_back(FallbackReason::Aborted(report))
            }
        }
    }

    fn fall_back(&mut self, reason: FallbackReason) -> Result<RestoreOutcome> {
        self.transition(WarmBootState::ColdBootFallback)?;
        self.stats.cold_boots += 1;
        warn!(reason = %reason, "Falling back to cold boot");
        audit_log!(AuditRecord::new(AuditCategory::ErrorCondition, "WarmBoot", "cold_boot_fallback")
            .with_outcome(AuditOutcome::Success)
            .with_details(serde_json::json!({"reason": reason.to_string()})));
        Ok(RestoreOutcome::ColdBoot { reason })
    }

    async fn consume_snapshot(&self) {
        if let Err(e) = snapshot::remove_snapshot(&self.config.snapshot_path).await {
            warn!(error = %e, "Failed to remove consumed snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::InMemoryHardware;
    use crate::table::{HostEntry, HostKey};
    use crate::types::{Egress, EgressId, InterfaceId, MacAddress, VrfId};
    use std::sync::Arc;

    fn config_in(dir: &tempfile::TempDir) -> WarmBootConfig {
        WarmBootConfig::default().with_snapshot_path(dir.path().join("host_table.json"))
    }

    #[test]
    fn test_transitions() {
        use WarmBootState::*;
        assert!(Idle.can_transition_to(CapturingSnapshot));
        assert!(Idle.can_transition_to(Loading));
        assert!(Loading.can_transition_to(ColdBootFallback));
        assert!(Reconciling.can_transition_to(WarmBootComplete));
        assert!(WarmBootComplete.can_transition_to(CapturingSnapshot));
        assert!(!Idle.can_transition_to(Reconciling));
        assert!(!Persisted.can_transition_to(Loading));
        assert!(!WarmBootComplete.can_transition_to(Loading));
        assert_eq!(ColdBootFallback.to_string(), "cold_boot_fallback");
        assert!(WarmBootComplete.is_restore_terminal());
        assert!(ColdBootFallback.is_restore_terminal());
        assert!(!Reconciling.is_restore_terminal());
        assert!(!Persisted.is_restore_terminal());
    }

    #[tokio::test]
    async fn test_capture_then_restore() {
        let dir = tempfile::tempdir().unwrap();
        let before = ForwardingTables::new();
        let entry = Arc::new(HostEntry::owning(Egress::new(
            EgressId(5),
            MacAddress::new([0, 0x11, 0x22, 0x33, 0x44, 0x55]),
            InterfaceId(100),
        )));
        let key = HostKey::new(VrfId(0), "10.0.0.1".parse().unwrap());
        before.register_host(key.clone(), &entry);

        let mut shutdown = WarmBootOrchestrator::new(config_in(&dir));
        let summary = shutdown.capture(&before).await.unwrap();
        assert_eq!(summary.hosts, 1);
        assert_eq!(shutdown.state(), WarmBootState::Persisted);

        let mut hw = InMemoryHardware::new();
        hw.preload(entry.egress().unwrap().clone());

        let after = ForwardingTables::new();
        let mut startup = WarmBootOrchestrator::new(config_in(&dir));
        let mut gate = startup.route_update_gate();
        assert!(!gate.is_open());

        let outcome = startup.restore(&after, &mut hw).await.unwrap();
        assert!(outcome.is_warm());
        assert_eq!(startup.state(), WarmBootState::WarmBootComplete);
        assert!(gate.opened().await);
        assert!(hw.calls().is_empty());
        assert!(after.read().hosts.lookup(&key).is_some());
        assert!(!dir.path().join("host_table.json").exists());
        assert_eq!(startup.stats().warm_boots, 1);
    }

    #[tokio::test]
    async fn test_restore_without_snapshot_is_cold() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = WarmBootOrchestrator::new(config_in(&dir));
        let gate = orchestrator.route_update_gate();
        let mut hw = InMemoryHardware::new();

        let outcome = orchestrator
            .restore(&ForwardingTables::new(), &mut hw)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            RestoreOutcome::ColdBoot {
                reason: FallbackReason::NoSnapshot
            }
        ));
        assert_eq!(orchestrator.state(), WarmBootState::ColdBootFallback);
        assert!(gate.is_open());
        assert_eq!(orchestrator.stats().cold_boots, 1);
    }

    #[tokio::test]
    async fn test_restore_corrupt_snapshot_is_cold_and_consumed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        tokio::fs::write(&config.snapshot_path, b"{\"hostTable\": 1}")
            .await
            .unwrap();

        let mut orchestrator = WarmBootOrchestrator::new(config.clone());
        let tables = ForwardingTables::new();
        let outcome = orchestrator
            .restore(&tables, &mut InMemoryHardware::new())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            RestoreOutcome::ColdBoot {
                reason: FallbackReason::LoadFailed(_)
            }
        ));
        assert!(!config.snapshot_path.exists());
        assert_eq!(tables.host_count(), 0);
    }

    #[tokio::test]
    async fn test_capture_failure_removes_stale_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        tokio::fs::write(&config.snapshot_path, b"stale").await.unwrap();
        // A directory where the temp file should go makes the write fail.
        tokio::fs::create_dir(dir.path().join("host_table.json.tmp"))
            .await
            .unwrap();

        let mut orchestrator = WarmBootOrchestrator::new(config.clone());
        let result = orchestrator.capture(&ForwardingTables::new()).await;
        assert!(result.is_err());
        assert_eq!(orchestrator.state(), WarmBootState::Idle);
        assert!(!config.snapshot_path.exists());
        assert_eq!(orchestrator.stats().capture_failures, 1);
    }

    #[tokio::test]
    async fn test_restore_twice_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = WarmBootOrchestrator::new(config_in(&dir));
        let tables = ForwardingTables::new();
        let mut hw = InMemoryHardware::new();
        orchestrator.restore(&tables, &mut hw).await.unwrap();

        assert!(matches!(
            orchestrator.restore(&tables, &mut hw).await,
            Err(WarmBootError::InvalidTransition {
                from: WarmBootState::ColdBootFallback,
                to: WarmBootState::Loading,
            })
        ));
    }
}
