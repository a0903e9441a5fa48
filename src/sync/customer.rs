//! Customer export operations.

use tracing::info;

use crate::auth::Resource;
use crate::error::SyncError;
use crate::models::{CustomerRecord, DelegatedAdminCustomer};
use crate::paging::PagedFetcher;

use super::SyncContext;

pub struct CustomerExporter<'a> {
    ctx: &'a SyncContext,
}

impl<'a> CustomerExporter<'a> {
    pub fn new(ctx: &'a SyncContext) -> Self {
        Self { ctx }
    }

    /// Download every customer that still has a legacy delegated admin
    /// relationship and write relationship-request rows for them. The
    /// operator fills in the name and duration columns before creating.
    pub async fn export(&self) -> Result<(), SyncError> {
        let ctx = self.ctx;
        println!("Getting customers...");
        let fetcher = PagedFetcher::new(&ctx.client, &ctx.credentials, Resource::PartnerApi);
        let url = format!(
            "{}?$count=true&$filter=dapEnabled+eq+true&$orderby=organizationDisplayName",
            ctx.customers_url()
        );
        let customers: Vec<DelegatedAdminCustomer> = fetcher
            .fetch_all(&url)
            .await
            .map_err(|failure| failure.into_sync_error())?;

        // The partner credential was acquired during the fetch, so the home
        // tenant id is available to stamp onto every row.
        let partner_tenant_id = ctx.credentials.partner_tenant_id().await.unwrap_or_default();
        let records: Vec<CustomerRecord> = customers
            .iter()
            .map(|customer| to_request_row(customer, &partner_tenant_id))
            .collect();

        let export_path = ctx.workspace.customers_export_file(&ctx.store);
        ctx.store.write(&export_path, &records)?;
        info!(count = records.len(), "downloaded customers");
        println!(
            "Downloaded {} customer(s) at {}",
            records.len(),
            export_path.display()
        );
        Ok(())
    }

    /// Stream the compressed bulk customer export verbatim to
    /// `downloads/customers.gz`. Meant for partners whose customer list is
    /// too large for the paginated export.
    pub async fn export_bulk(&self) -> Result<(), SyncError> {
        let ctx = self.ctx;
        let credential = ctx.credentials.acquire(Resource::PartnerApi).await?;
        println!("Getting customers (compressed)...");
        let url = format!(
            "{}?$count=true&$filter=dapEnabled+eq+true&$orderby=organizationDisplayName",
            ctx.customers_url()
        );
        let target = ctx.workspace.bulk_customers_file();
        let bytes = ctx
            .client
            .download_to_file(&url, &credential.access_token, &target)
            .await?;
        info!(bytes, path = %target.display(), "downloaded bulk customer export");
        println!("Downloaded compressed customer list at {}", target.display());
        Ok(())
    }
}

fn to_request_row(customer: &DelegatedAdminCustomer, partner_tenant_id: &str) -> CustomerRecord {
    CustomerRecord {
        name: String::new(),
        partner_tenant_id: partner_tenant_id.to_string(),
        customer_tenant_id: customer.customer_tenant_id.clone(),
        organization_display_name: customer.organization_display_name.clone(),
        duration: String::new(),
    }
}
