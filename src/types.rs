use std::fmt;

use alloy::primitives::{Address, U256};
use serde::{Serialize, Serializer};
use tokio::sync::mpsc;

use crate::registry::ServiceId;

/// One item of a scan's event stream.
///
/// Serialises as `{"type": "info" | "error" | "found", "serviceId": ..., ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ScanEvent {
    /// Progress narration.
    Info { service_id: ServiceId, message: String },
    /// A non-fatal failure scoped to one query. The scan continues.
    Error { service_id: ServiceId, message: String },
    /// A classified approval granted by the scanned address.
    Found {
        service_id: ServiceId,
        contract: Address,
        kind: FindingKind,
        details: FindingDetails,
    },
}

impl ScanEvent {
    pub fn info(service_id: &ServiceId, message: impl Into<String>) -> Self {
        ScanEvent::Info { service_id: service_id.clone(), message: message.into() }
    }

    pub fn error(service_id: &ServiceId, message: impl Into<String>) -> Self {
        ScanEvent::Error { service_id: service_id.clone(), message: message.into() }
    }

    /// A finding whose `kind` is derived from `details`.
    pub fn found(service_id: &ServiceId, contract: Address, details: FindingDetails) -> Self {
        ScanEvent::Found {
            service_id: service_id.clone(),
            contract,
            kind: details.kind(),
            details,
        }
    }

    #[must_use]
    pub fn service_id(&self) -> &ServiceId {
        match self {
            ScanEvent::Info { service_id, .. }
            | ScanEvent::Error { service_id, .. }
            | ScanEvent::Found { service_id, .. } => service_id,
        }
    }

    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, ScanEvent::Found { .. })
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, ScanEvent::Error { .. })
    }
}

/// Which capability a matched contract was classified as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Erc20,
    Erc721,
    ApprovalForAll,
    Unknown,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FindingKind::Erc20 => "erc20",
            FindingKind::Erc721 => "erc721",
            FindingKind::ApprovalForAll => "approval_for_all",
            FindingKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Kind-specific payload of a finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum FindingDetails {
    Erc20 {
        spender: Address,
        #[serde(serialize_with = "decimal")]
        allowance: U256,
        decimals: u8,
        symbol: String,
    },
    Erc721 {
        spender: Address,
        /// `None` when neither the data payload nor the topics carry a token id.
        #[serde(serialize_with = "decimal_opt")]
        token_id: Option<U256>,
        name: String,
    },
    ApprovalForAll {
        operator: Address,
        /// Current on-chain state; omitted when it could not be read.
        #[serde(skip_serializing_if = "Option::is_none")]
        is_approved: Option<bool>,
    },
    Unknown {
        spender: Address,
    },
}

impl FindingDetails {
    #[must_use]
    pub fn kind(&self) -> FindingKind {
        match self {
            FindingDetails::Erc20 { .. } => FindingKind::Erc20,
            FindingDetails::Erc721 { .. } => FindingKind::Erc721,
            FindingDetails::ApprovalForAll { .. } => FindingKind::ApprovalForAll,
            FindingDetails::Unknown { .. } => FindingKind::Unknown,
        }
    }
}

pub(crate) fn decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[allow(clippy::ref_option)]
fn decimal_opt<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.collect_str(value),
        None => serializer.serialize_none(),
    }
}

pub(crate) trait TryEmit {
    /// Forward `event` downstream. Returns `false` once the receiver is gone.
    async fn try_emit(&self, event: ScanEvent) -> bool;
}

impl TryEmit for mpsc::Sender<ScanEvent> {
    async fn try_emit(&self, event: ScanEvent) -> bool {
        trace!(event = ?event, "Sending event");
        if let Err(err) = self.send(event).await {
            warn!(error = %err, "Downstream channel closed, stopping scan");
            return false;
        }
        true
    }
}
