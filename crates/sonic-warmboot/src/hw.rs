//! Hardware egress state as seen by reconciliation.
//!
//! The reconciler only needs two things from the forwarding ASIC binding:
//! what is currently programmed under an egress id ([`HardwareQuery`]) and a
//! way to create or rewrite an object under a chosen id
//! ([`HardwareProgrammer`]). [`InMemoryHardware`] implements both for tests
//! and offline verification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::snapshot::codec::{self, CodecError};
use crate::snapshot::record::{EcmpEgressRecord, EgressRecord};
use crate::types::{EgressId, EgressKind, EgressObject};

/// Status codes returned by the hardware programming layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum HwStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    NoMemory = -3,
    InsufficientResources = -4,
    InvalidParameter = -5,
    ItemAlreadyExists = -6,
    ItemNotFound = -7,
    TableFull = -13,
    ObjectInUse = -17,
}

impl HwStatus {
    /// Maps a raw status code; unknown codes become `Failure`.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => HwStatus::Success,
            -2 => HwStatus::NotSupported,
            -3 => HwStatus::NoMemory,
            -4 => HwStatus::InsufficientResources,
            -5 => HwStatus::InvalidParameter,
            -6 => HwStatus::ItemAlreadyExists,
            -7 => HwStatus::ItemNotFound,
            -13 => HwStatus::TableFull,
            -17 => HwStatus::ObjectInUse,
            _ => HwStatus::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == HwStatus::Success
    }
}

impl fmt::Display for HwStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HwStatus::Success => "HW_STATUS_SUCCESS",
            HwStatus::Failure => "HW_STATUS_FAILURE",
            HwStatus::NotSupported => "HW_STATUS_NOT_SUPPORTED",
            HwStatus::NoMemory => "HW_STATUS_NO_MEMORY",
            HwStatus::InsufficientResources => "HW_STATUS_INSUFFICIENT_RESOURCES",
            HwStatus::InvalidParameter => "HW_STATUS_INVALID_PARAMETER",
            HwStatus::ItemAlreadyExists => "HW_STATUS_ITEM_ALREADY_EXISTS",
            HwStatus::ItemNotFound => "HW_STATUS_ITEM_NOT_FOUND",
            HwStatus::TableFull => "HW_STATUS_TABLE_FULL",
            HwStatus::ObjectInUse => "HW_STATUS_OBJECT_IN_USE",
        };
        write!(f, "{}", s)
    }
}

/// Which programming call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwOp {
    Create,
    Update,
}

impl fmt::Display for HwOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HwOp::Create => write!(f, "create"),
            HwOp::Update => write!(f, "update"),
        }
    }
}

/// Error from the hardware programming layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HwError {
    #[error("{op} {kind} {id} failed: {status}")]
    Status {
        op: HwOp,
        kind: EgressKind,
        id: EgressId,
        status: HwStatus,
    },

    #[error("invalid hardware dump: {0}")]
    InvalidDump(String),
}

impl HwError {
    pub fn status(op: HwOp, object: &EgressObject, status: HwStatus) -> Self {
        HwError::Status {
            op,
            kind: object.kind(),
            id: object.id(),
            status,
        }
    }

    /// Returns the status code if the error came from a programming call.
    pub fn hw_status(&self) -> Option<HwStatus> {
        match self {
            HwError::Status { status, .. } => Some(*status),
            HwError::InvalidDump(_) => None,
        }
    }
}

impl From<CodecError> for HwError {
    fn from(e: CodecError) -> Self {
        HwError::InvalidDump(e.to_string())
    }
}

/// Read access to what hardware currently holds.
pub trait HardwareQuery {
    /// Returns the object programmed under `id`, if any.
    fn lookup(&self, id: EgressId) -> Option<EgressObject>;
}

/// Programming access to hardware egress objects.
pub trait HardwareProgrammer {
    /// Programs a new object under its id. The id must be free.
    fn create(&mut self, object: &EgressObject) -> Result<(), HwError>;

    /// Rewrites the object already programmed under its id.
    fn update(&mut self, object: &EgressObject) -> Result<(), HwError>;
}

/// A programming call recorded by [`InMemoryHardware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwCall {
    Create(EgressId),
    Update(EgressId),
}

/// JSON image of hardware egress state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HwDump {
    #[serde(default)]
    pub egresses: Vec<EgressRecord>,
    #[serde(default)]
    pub ecmp_egresses: Vec<EcmpEgressRecord>,
}

/// Hardware model backed by a map, recording every programming call.
///
/// ECMP groups may only be created over standalone objects that already
/// exist, as on a real ASIC.
#[derive(Debug, Default)]
pub struct InMemoryHardware {
    objects: BTreeMap<EgressId, EgressObject>,
    calls: Vec<HwCall>,
    failures: BTreeMap<EgressId, HwStatus>,
}

impl InMemoryHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object without recording a call, as if it survived a restart.
    pub fn preload(&mut self, object: impl Into<EgressObject>) {
        let object = object.into();
        self.objects.insert(object.id(), object);
    }

    /// Makes every later programming call for `id` fail with `status`.
    pub fn fail_on(&mut self, id: EgressId, status: HwStatus) {
        self.failures.insert(id, status);
    }

    /// Builds hardware state from a dump. ECMP members must be in the dump.
    pub fn from_dump(dump: &HwDump) -> Result<Self, HwError> {
        let mut hw = Self::new();
        for record in &dump.egresses {
            let egress = codec::decode_egress(record)?;
            if hw.objects.contains_key(&egress.id) {
                return Err(HwError::InvalidDump(format!("duplicate egress id {}", egress.id)));
            }
            hw.preload(egress);
        }
        for record in &dump.ecmp_egresses {
            let ecmp = codec::decode_ecmp_egress(record);
            if hw.objects.contains_key(&ecmp.id) {
                return Err(HwError::InvalidDump(format!("duplicate egress id {}", ecmp.id)));
            }
            if let Some(missing) = ecmp.paths.iter().find(|p| !hw.is_standalone(**p)) {
                return Err(HwError::InvalidDump(format!(
                    "ecmp egress {} references unknown egress {}",
                    ecmp.id, missing
                )));
            }
            hw.preload(ecmp);
        }
        debug!(objects = hw.objects.len(), "Loaded hardware dump");
        Ok(hw)
    }

    /// Reads a JSON [`HwDump`] file.
    pub async fn from_dump_file(path: &Path) -> crate::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let dump: HwDump = serde_json::from_slice(&bytes)?;
        Ok(Self::from_dump(&dump)?)
    }

    pub fn to_dump(&self) -> HwDump {
        let mut dump = HwDump::default();
        for object in self.objects.values() {
            match object {
                EgressObject::Standalone(e) => dump.egresses.push(codec::encode_egress(e)),
                EgressObject::Ecmp(e) => dump.ecmp_egresses.push(codec::encode_ecmp_egress(e)),
            }
        }
        dump
    }

    pub fn get(&self, id: EgressId) -> Option<&EgressObject> {
        self.objects.get(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Programming calls in the order they were made.
    pub fn calls(&self) -> &[HwCall] {
        &self.calls
    }

    fn is_standalone(&self, id: EgressId) -> bool {
        matches!(self.objects.get(&id), Some(EgressObject::Standalone(_)))
    }

    fn check(&self, op: HwOp, object: &EgressObject) -> Result<(), HwError> {
        if let Some(status) = self.failures.get(&object.id()) {
            return Err(HwError::status(op, object, *status));
        }
        if let EgressObject::Ecmp(ecmp) = object {
            if ecmp.paths.iter().any(|p| !self.is_standalone(*p)) {
                return Err(HwError::status(op, object, HwStatus::InvalidParameter));
            }
        }
        Ok(())
    }
}

impl HardwareQuery for InMemoryHardware {
    fn lookup(&self, id: EgressId) -> Option<EgressObject> {
        self.objects.get(&id).cloned()
    }
}

impl HardwareProgrammer for InMemoryHardware {
    fn create(&mut self, object: &EgressObject) -> Result<(), HwError> {
        self.calls.push(HwCall::Create(object.id()));
        self.check(HwOp::Create, object)?;
        if self.objects.contains_key(&object.id()) {
            return Err(HwError::status(HwOp::Create, object, HwStatus::ItemAlreadyExists));
        }
        self.objects.insert(object.id(), object.clone());
        Ok(())
    }

    fn update(&mut self, object: &EgressObject) -> Result<(), HwError> {
        self.calls.push(HwCall::Update(object.id()));
        self.check(HwOp::Update, object)?;
        match self.objects.get_mut(&object.id()) {
            Some(existing) if existing.kind() == object.kind() => {
                *existing = object.clone();
                Ok(())
            }
            Some(_) => Err(HwError::status(HwOp::Update, object, HwStatus::InvalidParameter)),
            None => Err(HwError::status(HwOp::Update, object, HwStatus::ItemNotFound)),
        }
    }
}
