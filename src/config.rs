// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use sqlx::postgres::PgPoolOptions;

use crate::{
    db::{CatalogRepository, ErpRepository, PgSourceReader},
    services::SyncOrchestrator,
};

// ---
// Parâmetros do motor de sincronização
// ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Tamanho da página de itens lida do ERP.
    pub batch_size: u64,
    /// Registros por transação no destino.
    pub chunk_size: usize,
    /// Pausa entre o commit dos grupos e o início dos itens.
    pub settle_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            chunk_size: 50,
            settle_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub erp_database_url: String,
    pub db_max_connections: u32,
    pub sync: SyncConfig,
    pub sync_schedule: String,
    pub sync_schedule_enabled: bool,
    pub default_branch_code: Option<String>,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        // O .env é opcional; em produção as variáveis vêm do ambiente.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{key} deve ser definida"))
        };

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            batch_size: parse_or(&lookup, "SYNC_BATCH_SIZE", defaults.batch_size)?,
            chunk_size: parse_or(&lookup, "SYNC_PARALLEL_CHUNK_SIZE", defaults.chunk_size)?,
            settle_delay: Duration::from_millis(parse_or(&lookup, "SYNC_SETTLE_DELAY_MS", 100u64)?),
        };
        if sync.batch_size == 0 || sync.chunk_size == 0 {
            return Err(anyhow!("SYNC_BATCH_SIZE e SYNC_PARALLEL_CHUNK_SIZE devem ser maiores que zero"));
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            erp_database_url: required("ERP_DATABASE_URL")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5u32)?,
            sync,
            sync_schedule: lookup("SYNC_SCHEDULE").unwrap_or_else(|| "0 0 2 * * *".to_string()),
            sync_schedule_enabled: parse_or(&lookup, "SYNC_SCHEDULE_ENABLED", true)?,
            default_branch_code: lookup("DEFAULT_BRANCH_CODE")
                .map(|code| code.trim().to_uppercase())
                .filter(|code| !code.is_empty()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("valor inválido para {key}: '{raw}'")),
        _ => Ok(default),
    }
}

// ---
// Estado compartilhado
// ---
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: SyncOrchestrator,
    pub catalog_repo: CatalogRepository,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("conectando ao banco de destino")?;
        tracing::info!("✅ Conexão com o banco de destino estabelecida com sucesso!");

        let reader = PgSourceReader::connect(&config.erp_database_url, config.db_max_connections)
            .await
            .context("conectando ao ERP")?;
        tracing::info!("✅ Conexão com o ERP estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let catalog_repo = CatalogRepository::new(db_pool);
        let erp_repo = ErpRepository::new(Arc::new(reader));
        let orchestrator = SyncOrchestrator::new(
            Arc::new(erp_repo),
            Arc::new(catalog_repo.clone()),
            &config.sync,
        );

        Ok(Self {
            config: Arc::new(config),
            orchestrator,
            catalog_repo,
        })
    }
}
