#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

mod auth;
mod booking;
mod catalog;
mod cli;
mod config;
mod db;
mod media;
mod utils;
mod web;

use auth::AuthService;
use cli::{Cli, Command};
use config::Config;
use db::DatabaseManager;
use media::FsMediaStore;
use web::metrics::Metrics;
use web::{WebServer, WebState};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

fn spawn_session_purge(auth: AuthService) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = auth.purge_expired().await {
                warn!("failed to purge expired sessions: {}", e);
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config_path, command) = Cli::parse().into_parts();

    let config = Config::load_from_file(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let config = Arc::new(config);
    utils::logging::init_tracing(&config.logging);
    Metrics::init();

    let db_manager = DatabaseManager::new(&config.database).await?;
    db_manager.migrate().await?;
    info!("database ready ({:?})", db_manager.db_type());

    let auth = AuthService::new(db_manager.admin_store(), &config.session);

    match command {
        Command::Migrate => {
            info!("migrations applied");
            return Ok(());
        }
        Command::CreateAdmin {
            username,
            password,
            email,
        } => {
            let id = auth
                .create_admin(&username, &password, email.as_deref())
                .await?;
            println!("created admin {username} (id {id})");
            return Ok(());
        }
        Command::Serve => {}
    }

    if let Some(bootstrap) = &config.admin {
        if auth.ensure_bootstrap_admin(bootstrap).await? {
            info!("created bootstrap admin {}", bootstrap.username);
        }
    }
    if auth.admin_count().await? == 0 {
        warn!("no admin accounts exist; run `tour-booking create-admin` to add one");
    }
    spawn_session_purge(auth);

    tokio::fs::create_dir_all(&config.storage.root)
        .await
        .with_context(|| format!("failed to create {}", config.storage.root.display()))?;
    let media_store = Arc::new(FsMediaStore::new(config.storage.root.clone()));

    info!("tour booking server starting up");
    let web_server = WebServer::new(WebState::new(config.clone(), &db_manager, media_store));
    if let Err(e) = web_server.start().await {
        error!("web server error: {}", e);
        return Err(e);
    }

    info!("tour booking server shutting down");
    Ok(())
}
