use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use gdap_migrate::auth::{CredentialCache, DeviceCodeAuthenticator};
use gdap_migrate::config::ConfigLoader;
use gdap_migrate::console::{
    parse_format_choice, parse_menu_choice, MenuAction, Prompter, StdPrompter, Transition, MENU,
};
use gdap_migrate::logging;
use gdap_migrate::store::{FileFormat, FileStore, Workspace};
use gdap_migrate::sync::{
    assignment::AssignmentSynchronizer, customer::CustomerExporter,
    relationship::RelationshipSynchronizer, roles::RoleExporter, run_compound_flow, SyncContext,
};

/// Bulk migration of delegated admin (GDAP) relationships for partner
/// tenants.
#[derive(Debug, Parser)]
#[command(name = "gdap-migrate", version)]
struct Args {
    /// Workspace root for operations/, downloads/ and logs/ (overrides
    /// GDAP_WORKSPACE_DIR).
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// State file format, skipping the interactive selection.
    #[arg(long, value_parser = ["csv", "json"])]
    format: Option<String>,

    /// Log filter override, e.g. `info` or `gdap_migrate=debug`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ConfigLoader::new().load().context("loading configuration")?;
    if let Some(workspace) = args.workspace {
        config.workspace_dir = workspace;
    }
    if let Some(log_level) = args.log_level {
        config.log_level = log_level;
    }

    let workspace = Workspace::new(config.workspace_dir.clone());
    workspace
        .ensure_directories()
        .context("creating workspace directories")?;
    logging::init_subscriber(&config, &workspace.logs_dir())
        .context("initializing logging")?;
    info!(
        run_id = %uuid::Uuid::new_v4(),
        config = %config.redacted_json()?,
        "starting"
    );

    let prompter = StdPrompter;
    let format = match args.format.as_deref() {
        Some("csv") => FileFormat::Csv,
        Some("json") => FileFormat::Json,
        _ => match select_format(&prompter) {
            Some(format) => format,
            None => return Ok(()),
        },
    };

    let credentials = Arc::new(CredentialCache::new(Arc::new(
        DeviceCodeAuthenticator::new(config.authority.clone(), config.client_id.clone()),
    )));
    let store = FileStore::new(format);
    let ctx = SyncContext::new(&config, credentials, store, workspace);

    println!("GDAP Bulk Migration Tool.");
    println!("Please choose an option:");
    println!("{MENU}");

    loop {
        let input = prompter.read_line("");
        let action = match parse_menu_choice(&input) {
            Transition::Proceed(action) => action,
            Transition::Retry => {
                println!("Invalid input, please try again.");
                println!("{MENU}");
                continue;
            }
            Transition::Abort => break,
        };

        let started = Instant::now();
        if let Err(err) = dispatch(action, &ctx, &prompter).await {
            error!(%err, ?action, "operation failed");
            println!("{err}");
        }
        println!("[Completed the operation in {:.2?}]\n", started.elapsed());
    }

    Ok(())
}

fn select_format(prompter: &dyn Prompter) -> Option<FileFormat> {
    println!("Please choose the file type to work with for this session:");
    println!("1. CSV");
    println!("2. JSON");
    loop {
        match parse_format_choice(&prompter.read_line("")) {
            Transition::Proceed(format) => return Some(format),
            Transition::Retry => {
                println!("Invalid input, please try again, possible values are {{1, 2}}.")
            }
            Transition::Abort => return None,
        }
    }
}

async fn dispatch(
    action: MenuAction,
    ctx: &SyncContext,
    prompter: &dyn Prompter,
) -> Result<(), gdap_migrate::error::SyncError> {
    match action {
        MenuAction::ExportCustomers => CustomerExporter::new(ctx).export().await,
        MenuAction::ExportCustomersBulk => CustomerExporter::new(ctx).export_bulk().await,
        MenuAction::ExportDirectoryRoles => RoleExporter::new(ctx).export(),
        MenuAction::ExportSecurityGroups => {
            AssignmentSynchronizer::new(ctx).export_security_groups().await
        }
        MenuAction::DownloadExistingRelationships => {
            RelationshipSynchronizer::new(ctx).enumerate().await
        }
        MenuAction::OneFlow => run_compound_flow(ctx, prompter).await.map(|state| {
            info!(?state, "one flow finished");
        }),
        MenuAction::CreateRelationships => RelationshipSynchronizer::new(ctx)
            .create(prompter)
            .await
            .map(|_| ()),
        MenuAction::RefreshRelationships => RelationshipSynchronizer::new(ctx).refresh().await,
        MenuAction::CreateAssignments => AssignmentSynchronizer::new(ctx)
            .create(prompter)
            .await
            .map(|_| ()),
        MenuAction::RefreshAssignments => AssignmentSynchronizer::new(ctx).refresh().await,
    }
}
