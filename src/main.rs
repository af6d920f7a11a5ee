use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};

use catalog_admin::config::AppConfig;
use catalog_admin::session::TokenKeys;
use catalog_admin::state::AppState;
use catalog_admin::storage::LocalObjectStorage;
use catalog_admin::store::{MongoCarts, MongoCatalog, PgProductStore};
use catalog_admin::{db, routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    let database = db::connect(&config).await.map_err(std::io::Error::other)?;
    let mirror_pool = db::connect_mirror(&config).await.map_err(std::io::Error::other)?;

    let state = AppState {
        catalog: Arc::new(MongoCatalog::new(&database)),
        mirror: Arc::new(PgProductStore::new(mirror_pool)),
        carts: Arc::new(MongoCarts::new(&database)),
        storage: Arc::new(LocalObjectStorage::new(&config.media_root, &config.public_base_url)),
        tokens: TokenKeys::new(&config.jwt_secret, config.token_ttl_minutes),
        update_backend: config.update_backend,
    };

    let address = (config.server_host.clone(), config.server_port);
    log::info!("Listening on {}:{}", address.0, address.1);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::JsonConfig::default().limit(32 * 1024 * 1024))
            .wrap(Logger::default())
            .configure(routes::configure(state.tokens.clone()))
    })
    .bind(address)?
    .run()
    .await
}
