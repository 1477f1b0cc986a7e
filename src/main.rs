// src/main.rs

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod common;
mod config;
mod db;
mod handlers;
mod models;
mod services;

use crate::config::{AppConfig, AppState};

fn router(app_state: AppState) -> Router {
    // Disparos manuais da sincronização
    let menu_routes = Router::new()
        .route("/groups", post(handlers::sync::sync_groups))
        .route("/items", post(handlers::sync::sync_items))
        .route("/all", post(handlers::sync::sync_branch))
        .route("/sync-all", post(handlers::sync::sync_all_branches))
        .route("/truncate-and-sync", post(handlers::sync::truncate_and_sync));

    // Leitura do cardápio já sincronizado
    let catalog_routes = Router::new()
        .route("/items", get(handlers::catalog::list_menu_items))
        .route("/categories", get(handlers::catalog::list_all_categories))
        .route("/categories/parents", get(handlers::catalog::list_parent_categories))
        .route("/categories/{parent}/children", get(handlers::catalog::list_subcategories));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/menu", menu_routes)
        .nest("/api/catalog", catalog_routes)
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let bind_addr = config.bind_addr.clone();
    let schedule = config.sync_schedule_enabled.then(|| config.sync_schedule.clone());

    let app_state = AppState::new(config).await?;

    // Mantém o agendador vivo enquanto o servidor roda.
    let _scheduler = match schedule {
        Some(schedule) => Some(
            services::scheduler::start_scheduler(app_state.orchestrator.clone(), &schedule).await?,
        ),
        None => {
            tracing::info!("Sincronização agendada desativada");
            None
        }
    };

    let app = router(app_state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
