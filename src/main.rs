use std::sync::Arc;

use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use contrack::auth::jwt::JwtService;
use contrack::auth::{password, ROLE_ADMIN};
use contrack::config::AppConfig;
use contrack::contracts::init_system_fields;
use contrack::db::{self, PgPool};
use contrack::models::NewUser;
use contrack::routes::create_router;
use contrack::schema::users;
use contrack::state::AppState;
use contrack::storage::DiskStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!(
        database_url = %config.redacted_database_url(),
        host = %config.server_host,
        port = config.server_port,
        "starting contrack server"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    run_migrations_and_seed(&pool, &config).await?;

    let files = Arc::new(DiskStore::new(config.upload_dir.clone()));
    let jwt = JwtService::from_config(&config)?;
    let addr = format!("{}:{}", config.server_host, config.server_port);

    let state = AppState::new(pool, config, files, jwt);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Migrations and seeding run on a blocking thread; diesel is synchronous.
async fn run_migrations_and_seed(pool: &PgPool, config: &AppConfig) -> Result<()> {
    let pool = pool.clone();
    let config = config.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool.get()?;
        conn.run_pending_migrations(db::MIGRATIONS)
            .map_err(|err| anyhow::anyhow!("failed to run migrations: {err}"))?;
        init_system_fields(&mut conn)?;
        seed_default_admin(&mut conn, &config)?;
        Ok(())
    })
    .await??;
    Ok(())
}

/// A fresh database gets one admin account so the instance is reachable.
fn seed_default_admin(conn: &mut PgConnection, config: &AppConfig) -> Result<()> {
    let admins: i64 = users::table
        .filter(users::role.eq(ROLE_ADMIN))
        .count()
        .get_result(conn)?;
    if admins > 0 {
        return Ok(());
    }

    let admin = NewUser {
        id: Uuid::new_v4(),
        email: config.default_admin_email.clone(),
        password_hash: password::hash_password(&config.default_admin_password)?,
        name: config.default_admin_name.clone(),
        role: ROLE_ADMIN.to_string(),
    };
    diesel::insert_into(users::table).values(&admin).execute(conn)?;
    info!(email = %admin.email, "seeded default admin account");
    Ok(())
}
