use mongodb::{options::ClientOptions, Client, Database};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::AppConfig;
use crate::error::Result;

pub async fn connect(config: &AppConfig) -> Result<Database> {
    let client_options = ClientOptions::parse(&config.database_url).await?;
    let client = Client::with_options(client_options)?;
    log::info!("Connected to document store, database '{}'", config.database_name);
    Ok(client.database(&config.database_name))
}

pub async fn connect_mirror(config: &AppConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.mirror_database_url)
        .await?;
    log::info!("Connected to relational mirror");
    Ok(pool)
}
