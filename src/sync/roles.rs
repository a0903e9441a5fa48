//! Directory role catalog export.
//!
//! The catalog ships with the binary as grouped JSON; exporting flattens the
//! groups into the session format so the operator can trim the list down to
//! the roles the relationships should grant.

use serde::Deserialize;
use tracing::info;

use crate::error::SyncError;
use crate::models::DirectoryRole;

use super::SyncContext;

const ROLE_CATALOG: &str = include_str!("../../assets/directory-roles.json");

#[derive(Debug, Deserialize)]
struct RoleGroup {
    #[serde(default)]
    roles: Vec<DirectoryRole>,
}

pub struct RoleExporter<'a> {
    ctx: &'a SyncContext,
}

impl<'a> RoleExporter<'a> {
    pub fn new(ctx: &'a SyncContext) -> Self {
        Self { ctx }
    }

    pub fn export(&self) -> Result<(), SyncError> {
        let roles = bundled_roles()?;
        let export_path = self.ctx.workspace.roles_export_file(&self.ctx.store);
        self.ctx.store.write(&export_path, &roles)?;
        info!(count = roles.len(), "exported directory roles");
        println!(
            "Exported {} directory role(s) at {}",
            roles.len(),
            export_path.display()
        );
        Ok(())
    }
}

fn bundled_roles() -> Result<Vec<DirectoryRole>, SyncError> {
    let groups: Vec<RoleGroup> = serde_json::from_str(ROLE_CATALOG)
        .map_err(|err| SyncError::precondition(format!("bundled role catalog is malformed: {err}")))?;
    Ok(groups.into_iter().flat_map(|group| group.roles).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_catalog_parses_and_flattens() {
        let roles = bundled_roles().unwrap();
        assert!(!roles.is_empty());
        assert!(roles.iter().all(|role| !role.id.is_empty()));
        assert!(roles
            .iter()
            .any(|role| role.name == "Global Administrator"));
    }

    #[test]
    fn catalog_ids_are_unique() {
        let roles = bundled_roles().unwrap();
        let mut ids: Vec<&str> = roles.iter().map(|role| role.id.as_str()).collect();
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        assert_eq!(before, ids.len());
    }
}
