//! Schema migrations, embedded at compile time and applied by the
//! `migrate` CLI subcommand.

use crate::error::StoreError;

refinery::embed_migrations!("migrations");

pub async fn run(client: &mut tokio_postgres::Client) -> Result<(), StoreError> {
    let report = migrations::runner().run_async(client).await?;
    for applied in report.applied_migrations() {
        tracing::info!(migration = %applied.name(), "applied migration");
    }
    Ok(())
}
