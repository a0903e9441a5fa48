//! Customer models: the remote's delegated admin customer listing and the
//! local relationship-request rows derived from it.

use serde::{Deserialize, Serialize};

/// A delegated admin customer of the partner, as listed by the remote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedAdminCustomer {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub customer_tenant_id: String,
    #[serde(default)]
    pub organization_display_name: String,
    #[serde(default)]
    pub dap_enabled: bool,
}

/// Local input row describing one relationship to request for a customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    /// Display name for the relationship to be created.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub partner_tenant_id: String,
    #[serde(default)]
    pub customer_tenant_id: String,
    #[serde(default)]
    pub organization_display_name: String,
    /// Relationship duration in whole days; becomes `P{n}D` on the wire.
    #[serde(default)]
    pub duration: String,
}
