//! SONiC warm boot host table persistence.
//!
//! Captures the forwarding-resolution graph (resolved hosts, multipath
//! groups and the egress objects they own) before the control process
//! restarts, and rebuilds it afterwards against what the ASIC still holds
//! so that forwarding continues without disruption.
//!
//! ```text
//!  ForwardingTables ──build──> SnapshotDocument ──persist──> host_table.json
//!                                                                  │
//!  ForwardingTables <──install── ReconciledGraph <──reconcile── LoadedSnapshot
//!                                      ▲
//!                                 hardware state
//! ```
//!
//! # Key Components
//!
//! - [`table`]: weak-reference host and multipath tables
//! - [`snapshot`]: document codec, builder, layout sniffing and loader
//! - [`reconcile`]: hardware reconciliation with reuse/reprogram/create decisions
//! - [`orchestrator::WarmBootOrchestrator`]: capture/restore state machine and
//!   cold boot fallback

pub mod audit;
pub mod config;
pub mod error;
pub mod hw;
pub mod orchestrator;
pub mod reconcile;
pub mod snapshot;
pub mod table;
pub mod types;

pub use config::WarmBootConfig;
pub use error::{Result, WarmBootError};
pub use hw::{HardwareProgrammer, HardwareQuery, HwError, HwStatus, InMemoryHardware};
pub use orchestrator::{
    FallbackReason, RestoreOutcome, RouteUpdateGate, WarmBootOrchestrator, WarmBootState,
};
pub use reconcile::{
    reconcile, ReconcileError, ReconcileOptions, ReconcileOutcome, ReconcileReport,
    ReconciledGraph,
};
pub use snapshot::{LoadedSnapshot, SchemaLayout, SnapshotDocument};
pub use table::{
    ForwardingTables, HostEntry, HostKey, MultiPathEntry, MultiPathKey, NextHop,
};
pub use types::{
    EcmpEgress, Egress, EgressId, EgressKind, EgressObject, InterfaceId, MacAddress,
    PortDescriptor, PortId, VrfId,
};
