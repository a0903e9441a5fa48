//! Security group access assignment operations.

use tracing::{error, info, warn};

use crate::auth::{ensure_service_principal, Resource};
use crate::batch::{self, BatchOutcome, CallError};
use crate::console::Prompter;
use crate::error::SyncError;
use crate::http::{assignment_verdict, VERDICT_CREATED};
use crate::models::{
    assignment::{STATUS_ERRORED, STATUS_FAILED},
    AccessAssignment, AccessContainer, AccessContainerType, AccessDetails, AssignmentRecord,
    DirectoryRole, Relationship, RelationshipStatus, SecurityGroup, UnifiedRole,
};
use crate::paging::PagedFetcher;

use super::SyncContext;

pub struct AssignmentSynchronizer<'a> {
    ctx: &'a SyncContext,
}

impl<'a> AssignmentSynchronizer<'a> {
    pub fn new(ctx: &'a SyncContext) -> Self {
        Self { ctx }
    }

    /// Submit one access assignment per (active relationship, security
    /// group) pair and overwrite the assignment state file with the results.
    ///
    /// Returns `false` when the operator declines the confirmation gate.
    pub async fn create(&self, prompter: &dyn Prompter) -> Result<bool, SyncError> {
        let ctx = self.ctx;
        let relationship_path = ctx.workspace.relationship_file(&ctx.store);
        let relationships: Vec<Relationship> = ctx.store.read(&relationship_path)?;
        println!("Reading file @ {}", relationship_path.display());
        if relationships.is_empty() {
            return Err(SyncError::empty_input("relationships", &relationship_path));
        }

        let roles_path = ctx.workspace.roles_input_file(&ctx.store);
        let catalog: Vec<DirectoryRole> = ctx.store.read(&roles_path)?;
        if catalog.is_empty() {
            return Err(SyncError::empty_input("directory roles", &roles_path));
        }

        let groups_path = ctx.workspace.security_groups_input_file(&ctx.store);
        let groups: Vec<SecurityGroup> = ctx.store.read(&groups_path)?;
        if groups.is_empty() {
            return Err(SyncError::precondition(format!(
                "no security groups found in {}",
                groups_path.display()
            )));
        }
        if groups.iter().any(|group| !group.has_mapped_roles()) {
            return Err(SyncError::precondition(format!(
                "one or more security groups do not have roles mapped in {}",
                groups_path.display()
            )));
        }

        let active: Vec<&Relationship> = relationships
            .iter()
            .filter(|r| r.status == Some(RelationshipStatus::Active))
            .collect();
        if active.is_empty() {
            return Err(SyncError::precondition(format!(
                "no active relationships in {}; refresh and wait for activation first",
                relationship_path.display()
            )));
        }

        let confirmed = prompter.confirm(&format!(
            "Warning: there are {} security group(s) configured for access assignment across {} active relationship(s). Continue?",
            groups.len(),
            active.len()
        ));
        if !confirmed {
            return Ok(false);
        }

        // The remote requires the client's service principal to exist in the
        // partner tenant before assignments can be granted.
        let graph_credential = ctx.credentials.acquire(Resource::Graph).await?;
        ensure_service_principal(
            &ctx.client,
            &ctx.graph_api_base,
            &graph_credential.access_token,
            &ctx.client_id,
        )
        .await?;

        let drafts: Vec<AccessAssignment> = groups
            .iter()
            .map(|group| build_assignment(group, &catalog))
            .collect();

        let work: Vec<(String, AccessAssignment)> = active
            .iter()
            .flat_map(|relationship| {
                drafts
                    .iter()
                    .map(|draft| (relationship.id.clone(), draft.clone()))
            })
            .collect();

        // Workers re-acquire from the cache on every call; the acquisition
        // here keeps a sign-in failure terminal before any grant is sent.
        ctx.credentials.acquire(Resource::PartnerApi).await?;
        let base = ctx.relationships_url();
        println!("Creating access assignment(s)...");
        let outcomes = batch::run_all(work, ctx.batch_concurrency, |(relationship_id, draft)| {
            let url = format!("{base}/{relationship_id}/accessAssignments");
            async move {
                let credential = self.ctx.credentials.acquire(Resource::PartnerApi).await?;
                let created = self
                    .ctx
                    .client
                    .post::<_, AccessAssignment>(&url, &credential.access_token, &draft)
                    .await?;
                Ok::<_, CallError>(created)
            }
        })
        .await;

        let mut records = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Succeeded {
                    item: (relationship_id, _),
                    output,
                } => {
                    println!("{relationship_id} - {VERDICT_CREATED}");
                    records.push(AssignmentRecord::new(relationship_id, output.id, output.status));
                }
                BatchOutcome::Failed {
                    item: (relationship_id, _),
                    error,
                } => {
                    println!(
                        "{relationship_id} - {}",
                        assignment_verdict(error.status_code())
                    );
                    error!(%relationship_id, %error, "assignment create rejected");
                    records.push(AssignmentRecord::new(relationship_id, "", STATUS_FAILED));
                }
            }
        }

        let state_path = ctx.workspace.assignment_file(&ctx.store);
        ctx.store.write(&state_path, &records)?;
        info!(count = records.len(), path = %state_path.display(), "wrote assignment state");
        println!("Downloaded access assignment(s) at {}", state_path.display());
        Ok(true)
    }

    /// Poll every unsettled assignment that has a remote id. Active
    /// assignments pass through untouched, as do create-failure rows with no
    /// id to poll; the merged output keeps the input cardinality.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let ctx = self.ctx;
        let state_path = ctx.workspace.assignment_file(&ctx.store);
        let records: Vec<AssignmentRecord> = ctx.store.read(&state_path)?;
        println!("Reading file @ {}", state_path.display());
        if records.is_empty() {
            return Err(SyncError::empty_input("access assignments", &state_path));
        }

        let (pending, skipped): (Vec<AssignmentRecord>, Vec<AssignmentRecord>) =
            records.into_iter().partition(AssignmentRecord::is_refreshable);
        info!(pending = pending.len(), skipped = skipped.len(), "refreshing assignments");

        ctx.credentials.acquire(Resource::PartnerApi).await?;
        let base = ctx.relationships_url();
        println!("Updating access assignment(s)...");
        let outcomes = batch::run_all(pending, ctx.batch_concurrency, |record| {
            let url = format!(
                "{base}/{}/accessAssignments/{}",
                record.gdap_relationship_id, record.access_assignment_id
            );
            async move {
                let credential = self.ctx.credentials.acquire(Resource::PartnerApi).await?;
                let refreshed = self
                    .ctx
                    .client
                    .get::<AccessAssignment>(&url, &credential.access_token)
                    .await?;
                Ok::<_, CallError>(refreshed)
            }
        })
        .await;

        let mut merged = Vec::with_capacity(outcomes.len() + skipped.len());
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Succeeded { item, output } => {
                    merged.push(AssignmentRecord::new(
                        item.gdap_relationship_id,
                        item.access_assignment_id,
                        output.status,
                    ));
                }
                BatchOutcome::Failed { item, error } => {
                    // Remote rejection and local transport fault carry
                    // different markers so the operator can tell them apart.
                    let status = if error.status_code().is_some() {
                        STATUS_FAILED
                    } else {
                        STATUS_ERRORED
                    };
                    warn!(
                        relationship_id = %item.gdap_relationship_id,
                        assignment_id = %item.access_assignment_id,
                        %error,
                        "assignment refresh failed"
                    );
                    merged.push(AssignmentRecord::new(
                        item.gdap_relationship_id,
                        item.access_assignment_id,
                        status,
                    ));
                }
            }
        }
        merged.extend(skipped);

        ctx.store.write(&state_path, &merged)?;
        println!(
            "Downloaded {} access assignment(s) at {}",
            merged.len(),
            state_path.display()
        );
        Ok(())
    }

    /// Download the partner tenant's security groups into the export file,
    /// ready for the operator to map roles onto.
    pub async fn export_security_groups(&self) -> Result<(), SyncError> {
        let ctx = self.ctx;
        println!("Getting security groups...");
        let fetcher = PagedFetcher::new(&ctx.client, &ctx.credentials, Resource::Graph);
        let groups: Vec<SecurityGroup> = fetcher
            .fetch_all(&ctx.security_groups_url())
            .await
            .map_err(|failure| failure.into_sync_error())?;

        let export_path = ctx.workspace.security_groups_export_file(&ctx.store);
        ctx.store.write(&export_path, &groups)?;
        info!(count = groups.len(), "downloaded security groups");
        println!(
            "Downloaded {} security group(s) at {}",
            groups.len(),
            export_path.display()
        );
        Ok(())
    }
}

fn build_assignment(group: &SecurityGroup, catalog: &[DirectoryRole]) -> AccessAssignment {
    AccessAssignment {
        access_container: Some(AccessContainer {
            access_container_id: group.id.clone(),
            access_container_type: Some(AccessContainerType::SecurityGroup),
        }),
        access_details: Some(AccessDetails {
            unified_roles: validate_roles(&group.roles(), catalog),
        }),
        ..Default::default()
    }
}

/// Resolve each requested role against the catalog, by id or by
/// case-insensitive name. Unmatched entries are dropped with a warning so a
/// typo cannot grant an unintended role.
pub fn validate_roles(requested: &[UnifiedRole], catalog: &[DirectoryRole]) -> Vec<UnifiedRole> {
    let mut validated = Vec::new();
    for role in requested {
        let wanted = role.role_definition_id.trim();
        let matched = catalog.iter().find(|entry| {
            entry.id == wanted || entry.name.eq_ignore_ascii_case(wanted)
        });
        match matched {
            Some(entry) => validated.push(UnifiedRole::new(&entry.id)),
            None => warn!(role = wanted, "role not found in the catalog, skipping"),
        }
    }
    validated
}
