use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use std::path::Path;
use tracing::info;

use crate::config::DatabaseConfig;

pub async fn connect(options: &PgConnectOptions) -> Result<PgConnection> {
    let connection = PgConnection::connect_with(options).await?;
    Ok(connection)
}

pub async fn get_db_connection(database: &DatabaseConfig) -> Result<PgConnection> {
    info!(
        "Connecting to database {} at {}:{} as {}",
        database.name, database.host, database.port, database.user
    );
    connect(&database.connect_options()).await
}

/// Runs every statement of a DDL file over one connection. The file must be
/// idempotent since it is applied on every start.
pub async fn apply_ddl_file(connection: &mut PgConnection, path: &Path) -> Result<()> {
    let ddl = read_ddl(path)?;
    sqlx::raw_sql(&ddl)
        .execute(&mut *connection)
        .await
        .with_context(|| format!("failed to apply DDL from {}", path.display()))?;
    info!("Applied schema from {}", path.display());
    Ok(())
}

fn read_ddl(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read DDL file {}", path.display()))
}

/// Connects once, applies the DDL and closes the connection.
pub async fn prepare_schema(database: &DatabaseConfig, ddl_path: &Path) -> Result<()> {
    let mut connection = get_db_connection(database).await?;
    apply_ddl_file(&mut connection, ddl_path).await?;
    connection.close().await?;
    Ok(())
}
