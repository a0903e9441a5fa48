//! Delegated admin relationship model.
//!
//! This is the partner's view of a delegated admin relationship between a
//! partner and a customer tenant. Records are created locally as drafts and
//! thereafter only ever replaced wholesale by the remote's authoritative copy;
//! the client never partially mutates a relationship.

use serde::{Deserialize, Serialize};

/// A single unified role granted by a relationship or an access assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedRole {
    pub role_definition_id: String,
}

impl UnifiedRole {
    pub fn new<S: Into<String>>(role_definition_id: S) -> Self {
        Self {
            role_definition_id: role_definition_id.into(),
        }
    }
}

/// The set of roles a relationship or assignment grants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDetails {
    #[serde(default)]
    pub unified_roles: Vec<UnifiedRole>,
}

/// The partner participant in a relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(default)]
    pub tenant_id: String,
}

/// The customer participant in a relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerParticipant {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub display_name: String,
}

/// Status of a delegated admin relationship.
///
/// Variants are declared in lexicographic order of their wire names so that
/// sorting by status matches the remote's `$orderby` contract. Add new
/// statuses in the same lexicographic position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RelationshipStatus {
    #[serde(rename = "activating")]
    Activating,
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "approvalPending")]
    ApprovalPending,
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "created")]
    Created,
    /// Local marker recorded when a refresh poll fails. Never sent to the
    /// remote and never produced by it.
    #[serde(rename = "errored")]
    Errored,
    #[serde(rename = "expired")]
    Expired,
    #[serde(rename = "expiring")]
    Expiring,
    #[serde(rename = "terminated")]
    Terminated,
    #[serde(rename = "terminating")]
    Terminating,
    #[serde(rename = "terminationRequested")]
    TerminationRequested,
    /// Evolvable enumeration sentinel. Do not send.
    #[serde(rename = "unknownFutureValue", other)]
    UnknownFutureValue,
}

impl RelationshipStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activating => "activating",
            Self::Active => "active",
            Self::ApprovalPending => "approvalPending",
            Self::Approved => "approved",
            Self::Created => "created",
            Self::Errored => "errored",
            Self::Expired => "expired",
            Self::Expiring => "expiring",
            Self::Terminated => "terminated",
            Self::Terminating => "terminating",
            Self::TerminationRequested => "terminationRequested",
            Self::UnknownFutureValue => "unknownFutureValue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
    }
}

impl std::fmt::Display for RelationshipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delegated admin relationship record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Unique id of the relationship. Assigned by the remote; empty locally
    /// until a create succeeds, and left empty as the failure marker when the
    /// remote rejects a draft.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub customer_delegated_admin_relationship_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub partner: Participant,
    #[serde(default)]
    pub customer: CustomerParticipant,
    #[serde(default, skip_serializing_if = "no_roles")]
    pub access_details: AccessDetails,
    /// Total duration in ISO 8601 form, e.g. `P30D`.
    #[serde(default)]
    pub duration: String,
    /// Absent on a locally built draft; the remote assigns the first status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RelationshipStatus>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_date_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub activated_date_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_modified_date_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub end_date_time: String,
    /// Opaque optimistic-concurrency stamp. Echoed back, never mutated locally.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_stamp: String,
}

fn no_roles(details: &AccessDetails) -> bool {
    details.unified_roles.is_empty()
}

impl Relationship {
    /// Approved relationships are polled for activation, and records marked
    /// errored by an earlier failed poll are retried on the next run. Every
    /// other status is settled or still settling remotely and passes through
    /// a refresh cycle untouched.
    pub fn needs_refresh(&self) -> bool {
        matches!(
            self.status,
            Some(RelationshipStatus::Approved | RelationshipStatus::Errored)
        )
    }

    /// A draft was rejected by the remote when its id is still empty.
    pub fn is_create_failure(&self) -> bool {
        self.id.is_empty()
    }
}
