//! Directory role catalog entry.

use serde::{Deserialize, Serialize};

/// One directory role from the bundled catalog, referenced by relationships
/// and security-group mappings via its role template id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRole {
    /// Role template id.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}
