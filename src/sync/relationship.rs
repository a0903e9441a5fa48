//! Relationship create, refresh and snapshot operations.

use tracing::{error, info};

use crate::auth::Resource;
use crate::batch::{self, BatchOutcome, CallError};
use crate::console::Prompter;
use crate::error::SyncError;
use crate::http::{relationship_verdict, VERDICT_CREATED};
use crate::models::{
    AccessDetails, CustomerParticipant, CustomerRecord, DirectoryRole, Participant, Relationship,
    RelationshipStatus, UnifiedRole,
};
use crate::paging::PagedFetcher;

use super::SyncContext;

pub struct RelationshipSynchronizer<'a> {
    ctx: &'a SyncContext,
}

impl<'a> RelationshipSynchronizer<'a> {
    pub fn new(ctx: &'a SyncContext) -> Self {
        Self { ctx }
    }

    /// Build one relationship draft per customer row and submit them all.
    /// The state file is overwritten with one record per draft, failed
    /// submissions included as placeholders with an empty id.
    ///
    /// Returns `false` when the operator declines the confirmation gate.
    pub async fn create(&self, prompter: &dyn Prompter) -> Result<bool, SyncError> {
        let ctx = self.ctx;
        let customers_path = ctx.workspace.customers_input_file(&ctx.store);
        let customers: Vec<CustomerRecord> = ctx.store.read(&customers_path)?;
        if customers.is_empty() {
            return Err(SyncError::empty_input("customers", &customers_path));
        }

        let roles_path = ctx.workspace.roles_input_file(&ctx.store);
        let roles: Vec<DirectoryRole> = ctx.store.read(&roles_path)?;
        if roles.is_empty() {
            return Err(SyncError::empty_input("directory roles", &roles_path));
        }

        let confirmed = prompter.confirm(&format!(
            "Warning: about to create {} relationship(s), each granting {} role(s). Continue?",
            customers.len(),
            roles.len()
        ));
        if !confirmed {
            return Ok(false);
        }

        let unified_roles: Vec<UnifiedRole> =
            roles.iter().map(|role| UnifiedRole::new(&role.id)).collect();
        let drafts: Vec<Relationship> = customers
            .iter()
            .map(|customer| build_draft(customer, &unified_roles))
            .collect();

        // A sign-in failure before the fan-out is terminal. Workers then
        // re-acquire from the cache on every call, so a batch that outlives
        // one token picks up a fresh credential mid-run.
        ctx.credentials.acquire(Resource::PartnerApi).await?;
        println!("Creating new relationship(s)...");
        let url = format!("{}/migrate", ctx.relationships_url());
        let outcomes = batch::run_all(drafts, ctx.batch_concurrency, |draft| {
            let url = url.clone();
            async move {
                let credential = self.ctx.credentials.acquire(Resource::PartnerApi).await?;
                let created = self
                    .ctx
                    .client
                    .post::<_, Relationship>(&url, &credential.access_token, &draft)
                    .await?;
                Ok::<_, CallError>(created)
            }
        })
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Succeeded { item, output } => {
                    println!("{} - {VERDICT_CREATED}", item.display_name);
                    results.push(output);
                }
                BatchOutcome::Failed { item, error } => {
                    println!(
                        "{} - {}",
                        item.display_name,
                        relationship_verdict(error.status_code())
                    );
                    error!(
                        display_name = %item.display_name,
                        customer_tenant = %item.customer.tenant_id,
                        %error,
                        "relationship create rejected"
                    );
                    results.push(create_failure_placeholder(item));
                }
            }
        }

        let state_path = ctx.workspace.relationship_file(&ctx.store);
        ctx.store.write(&state_path, &results)?;
        info!(count = results.len(), path = %state_path.display(), "wrote relationship state");
        println!("Downloaded new relationship(s) at {}", state_path.display());
        Ok(true)
    }

    /// Poll every approved relationship, and every one marked errored by an
    /// earlier failed poll, for its current remote state and merge the
    /// results back. Every other record passes through untouched, so the
    /// output cardinality always equals the input's.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let ctx = self.ctx;
        let state_path = ctx.workspace.relationship_file(&ctx.store);
        let relationships: Vec<Relationship> = ctx.store.read(&state_path)?;
        println!("Reading file @ {}", state_path.display());
        if relationships.is_empty() {
            return Err(SyncError::empty_input("relationships", &state_path));
        }

        let (pending, settled): (Vec<Relationship>, Vec<Relationship>) = relationships
            .into_iter()
            .partition(Relationship::needs_refresh);
        info!(pending = pending.len(), settled = settled.len(), "refreshing relationships");

        ctx.credentials.acquire(Resource::PartnerApi).await?;
        let base = ctx.relationships_url();
        let outcomes = batch::run_all(pending, ctx.batch_concurrency, |relationship| {
            let url = format!("{base}/{}", relationship.id);
            async move {
                let credential = self.ctx.credentials.acquire(Resource::PartnerApi).await?;
                let refreshed = self
                    .ctx
                    .client
                    .get::<Relationship>(&url, &credential.access_token)
                    .await?;
                Ok::<_, CallError>(refreshed)
            }
        })
        .await;

        let mut merged = Vec::with_capacity(outcomes.len() + settled.len());
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Succeeded { output, .. } => merged.push(output),
                BatchOutcome::Failed { item, error } => {
                    error!(id = %item.id, %error, "relationship refresh failed");
                    let mut marker = item;
                    marker.status = Some(RelationshipStatus::Errored);
                    merged.push(marker);
                }
            }
        }
        merged.extend(settled);

        ctx.store.write(&state_path, &merged)?;
        println!(
            "Downloaded latest statuses of {} relationship(s) at {}",
            merged.len(),
            state_path.display()
        );
        Ok(())
    }

    /// Download the remote's full relationship collection into the snapshot
    /// file under `downloads/`.
    pub async fn enumerate(&self) -> Result<(), SyncError> {
        let ctx = self.ctx;
        println!("Downloading relationship(s)...");
        let fetcher = PagedFetcher::new(&ctx.client, &ctx.credentials, Resource::PartnerApi);
        let url = format!("{}?PageSize=500", ctx.relationships_url());
        let relationships: Vec<Relationship> = fetcher
            .fetch_all(&url)
            .await
            .map_err(|failure| failure.into_sync_error())?;

        let snapshot_path = ctx.workspace.relationship_snapshot_file(&ctx.store);
        ctx.store.write(&snapshot_path, &relationships)?;
        info!(count = relationships.len(), "downloaded relationship snapshot");
        println!(
            "Downloaded {} existing relationship(s) at {}",
            relationships.len(),
            snapshot_path.display()
        );
        Ok(())
    }
}

fn build_draft(customer: &CustomerRecord, roles: &[UnifiedRole]) -> Relationship {
    Relationship {
        display_name: customer.name.clone(),
        partner: Participant {
            tenant_id: customer.partner_tenant_id.clone(),
        },
        customer: CustomerParticipant {
            tenant_id: customer.customer_tenant_id.clone(),
            display_name: customer.organization_display_name.clone(),
        },
        access_details: AccessDetails {
            unified_roles: roles.to_vec(),
        },
        duration: format!("P{}D", customer.duration),
        ..Default::default()
    }
}

/// Placeholder persisted for a rejected draft: identity preserved, id left
/// empty as the failure marker, no status.
fn create_failure_placeholder(draft: Relationship) -> Relationship {
    Relationship {
        display_name: draft.display_name,
        duration: draft.duration,
        customer: draft.customer,
        partner: draft.partner,
        ..Default::default()
    }
}
