//! Synchronization operations against the partner administration API.
//!
//! Each operation reads a working set from the file store, fans remote calls
//! out through the batch executor, and overwrites the corresponding state
//! file with the merged result. Operations never partially rewrite a file.

pub mod assignment;
pub mod customer;
pub mod relationship;
pub mod roles;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::auth::CredentialCache;
use crate::config::AppConfig;
use crate::console::{Prompter, Transition};
use crate::error::SyncError;
use crate::http::ApiClient;
use crate::store::{FileStore, Workspace};

/// Settle time between submitting relationship drafts and the first refresh.
const RELATIONSHIP_SETTLE_DELAY: Duration = Duration::from_secs(10);
/// Settle time between submitting assignments and their refresh.
const ASSIGNMENT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Shared handles every operation needs.
pub struct SyncContext {
    pub client: ApiClient,
    pub credentials: Arc<CredentialCache>,
    pub store: FileStore,
    pub workspace: Workspace,
    pub batch_concurrency: usize,
    pub partner_api_base: String,
    pub graph_api_base: String,
    pub client_id: String,
}

impl SyncContext {
    pub fn new(
        config: &AppConfig,
        credentials: Arc<CredentialCache>,
        store: FileStore,
        workspace: Workspace,
    ) -> Self {
        Self {
            client: ApiClient::new(),
            credentials,
            store,
            workspace,
            batch_concurrency: config.batch_concurrency,
            partner_api_base: config.partner_api_base.trim_end_matches('/').to_string(),
            graph_api_base: config.graph_api_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
        }
    }

    pub fn relationships_url(&self) -> String {
        format!("{}/v1/delegatedAdminRelationships", self.partner_api_base)
    }

    pub fn customers_url(&self) -> String {
        format!("{}/v1/delegatedAdminCustomers", self.partner_api_base)
    }

    pub fn security_groups_url(&self) -> String {
        format!(
            "{}/v1.0/groups?$filter=securityEnabled+eq+true&$select=id,displayName",
            self.graph_api_base
        )
    }
}

/// Progress of the end-to-end migration flow. The operator is the only
/// trigger for state advancement; remote status changes never advance the
/// flow on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    NotStarted,
    RelationshipsSubmitted,
    RelationshipsConfirmed,
    AssignmentsSubmitted,
    Done,
}

/// One-flow generation: create relationships, poll them until the operator
/// confirms they have gone active, then create and refresh the security
/// group assignments.
pub async fn run_compound_flow(
    ctx: &SyncContext,
    prompter: &dyn Prompter,
) -> Result<FlowState, SyncError> {
    let relationships = relationship::RelationshipSynchronizer::new(ctx);
    let assignments = assignment::AssignmentSynchronizer::new(ctx);

    let confirmed = prompter.confirm(&format!(
        "Warning: this runs the full flow end to end; make sure the input files under {} are in place. Continue?",
        ctx.workspace.operations_dir().display()
    ));
    if !confirmed {
        return Ok(FlowState::NotStarted);
    }

    let mut state = FlowState::NotStarted;
    if !relationships.create(prompter).await? {
        return Ok(state);
    }
    state = FlowState::RelationshipsSubmitted;

    info!(
        ?state,
        delay_secs = RELATIONSHIP_SETTLE_DELAY.as_secs(),
        "waiting for relationships to settle"
    );
    tokio::time::sleep(RELATIONSHIP_SETTLE_DELAY).await;

    // Convergence loop: refresh until the operator is satisfied the
    // relationships have gone active, or abandons the flow.
    loop {
        relationships.refresh().await?;
        let answer = prompter.read_line(
            "Are the relationships active? [y] continue, [r] refresh again, [n] abort",
        );
        match crate::console::parse_convergence(&answer) {
            Transition::Proceed(()) => break,
            Transition::Retry => continue,
            Transition::Abort => {
                info!("flow abandoned while waiting for relationship activation");
                return Ok(state);
            }
        }
    }
    state = FlowState::RelationshipsConfirmed;

    if !assignments.create(prompter).await? {
        return Ok(state);
    }
    state = FlowState::AssignmentsSubmitted;

    info!(
        ?state,
        delay_secs = ASSIGNMENT_SETTLE_DELAY.as_secs(),
        "waiting for assignments to settle"
    );
    tokio::time::sleep(ASSIGNMENT_SETTLE_DELAY).await;
    assignments.refresh().await?;

    Ok(FlowState::Done)
}
