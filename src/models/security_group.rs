//! Security group model.

use serde::{Deserialize, Serialize};

use super::relationship::UnifiedRole;

/// A partner-tenant security group, optionally mapped to a set of directory
/// roles via a comma-separated id/name list filled in by the operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    /// Role ids or names, comma separated. Empty until the operator maps
    /// roles; assignment creation requires every group to be mapped.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comma_seperated_roles: String,
}

impl SecurityGroup {
    /// Roles parsed from the comma-separated mapping, deduplicated in first
    /// occurrence order.
    pub fn roles(&self) -> Vec<UnifiedRole> {
        let mut seen = std::collections::HashSet::new();
        self.comma_seperated_roles
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter(|entry| seen.insert(entry.to_string()))
            .map(UnifiedRole::new)
            .collect()
    }

    pub fn has_mapped_roles(&self) -> bool {
        !self.roles().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_split_and_deduplicated() {
        let group = SecurityGroup {
            id: "sg-1".to_string(),
            display_name: "Helpdesk".to_string(),
            comma_seperated_roles: "a, b,a , c".to_string(),
        };
        let roles: Vec<String> = group
            .roles()
            .into_iter()
            .map(|role| role.role_definition_id)
            .collect();
        assert_eq!(roles, vec!["a", "b", "c"]);
    }

    #[test]
    fn unmapped_group_has_no_roles() {
        let group = SecurityGroup::default();
        assert!(!group.has_mapped_roles());
    }
}
