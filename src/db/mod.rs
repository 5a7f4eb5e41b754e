pub mod csv;
pub mod models;
pub mod postgres;

use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use self::models::Row;

/// Destination for device rows, keyed by category (the device-type tag).
///
/// The first save to a category writes its header, every save appends
/// exactly one row. Sinks assume a single writer.
#[allow(async_fn_in_trait)]
pub trait Sink {
    async fn save(&mut self, category: &str, row: &Row) -> Result<()>;
}

pub async fn create_pool(options: PgConnectOptions) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await?;
    Ok(pool)
}
