//! Access assignment models.
//!
//! An access assignment binds one security group (the access container) to a
//! set of unified roles within exactly one relationship. The remote assigns
//! the id on creation.

use serde::{Deserialize, Serialize};

use super::relationship::AccessDetails;

/// Status marker persisted when the remote rejects an assignment request.
pub const STATUS_FAILED: &str = "failed";
/// Status marker persisted when a per-id refresh call faults locally.
pub const STATUS_ERRORED: &str = "errored";
/// Settled assignment status; anything else is eligible for refresh polling.
pub const STATUS_ACTIVE: &str = "active";

/// The type of access container in an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessContainerType {
    #[serde(rename = "securityGroup")]
    SecurityGroup,
    /// Evolvable enumeration sentinel. Do not send.
    #[serde(rename = "unknownFutureValue", other)]
    UnknownFutureValue,
}

/// The container (security group) an assignment grants access through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessContainer {
    pub access_container_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_container_type: Option<AccessContainerType>,
}

/// Wire model of a delegated admin access assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessAssignment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_container: Option<AccessContainer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_details: Option<AccessDetails>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_date_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_modified_date_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_stamp: String,
}

/// Flat state-file row tracking one submitted assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    /// Relationship the assignment belongs to.
    #[serde(default)]
    pub gdap_relationship_id: String,
    /// Remote-assigned assignment id; empty on a rejected request.
    #[serde(default)]
    pub access_assignment_id: String,
    #[serde(default)]
    pub status: String,
}

impl AssignmentRecord {
    pub fn new(
        gdap_relationship_id: impl Into<String>,
        access_assignment_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            gdap_relationship_id: gdap_relationship_id.into(),
            access_assignment_id: access_assignment_id.into(),
            status: status.into(),
        }
    }

    /// Settled assignments are skipped by refresh polling.
    pub fn is_settled(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_ACTIVE)
    }

    /// Refresh polling targets unsettled rows that carry a remote id. A row
    /// with an empty id never had an assignment created, so its failure
    /// marker survives refresh passes until the next create run.
    pub fn is_refreshable(&self) -> bool {
        !self.is_settled() && !self.access_assignment_id.is_empty()
    }
}
