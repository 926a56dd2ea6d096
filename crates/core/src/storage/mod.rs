pub mod memory;
pub mod provider;
pub mod snapshots;

use anyhow::Context;

pub use memory::StaticSnapshotProvider;
pub use provider::{SnapshotProvider, SnapshotSource};
pub use snapshots::PgSnapshotProvider;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
