//! Workspace-scoped persistence. sqlx is used with runtime-checked queries
//! only (`sqlx::query`/`query_as`, never the `query!`/`query_as!` macros),
//! since there is no live database reachable at build time.

pub mod scope;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::Result;

pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    Ok(pool)
}
