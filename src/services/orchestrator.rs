// src/services/orchestrator.rs

use std::{sync::Arc, time::{Duration, Instant}};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    common::error::SyncError,
    config::SyncConfig,
    db::{erp_repo::BRANCHES_QUERY, CatalogSource, EntityKind, TargetStore},
    models::{
        catalog::BranchRef,
        sync::{AggregateReport, BranchSyncResult, CatalogSyncResult, SyncOutcome},
    },
    services::{
        group_sync::GroupSyncService, item_sync::ItemSyncService,
        location_sync::LocationSyncService,
    },
};

// Ordem de limpeza: filhos antes dos pais (itens referenciam grupos).
const TRUNCATE_ORDER: [EntityKind; 4] = [
    EntityKind::Item,
    EntityKind::Group,
    EntityKind::Location,
    EntityKind::BranchMirror,
];

/// Códigos informados pelo chamador: sem espaços, em maiúsculas, vazios descartados.
/// O nome de exibição é o próprio código.
pub fn normalize_branch_codes(codes: &[String]) -> Vec<BranchRef> {
    codes
        .iter()
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .map(|code| BranchRef {
            name: code.clone(),
            code,
        })
        .collect()
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    source: Arc<dyn CatalogSource>,
    target: Arc<dyn TargetStore>,
    groups: GroupSyncService,
    items: ItemSyncService,
    locations: LocationSyncService,
    settle_delay: Duration,
}

impl SyncOrchestrator {
    pub fn new(source: Arc<dyn CatalogSource>, target: Arc<dyn TargetStore>, config: &SyncConfig) -> Self {
        Self {
            groups: GroupSyncService::new(source.clone(), target.clone(), config.chunk_size),
            items: ItemSyncService::new(
                source.clone(),
                target.clone(),
                config.batch_size,
                config.chunk_size,
            ),
            locations: LocationSyncService::new(source.clone(), target.clone(), config.chunk_size),
            settle_delay: config.settle_delay,
            source,
            target,
        }
    }

    // --- Gatilhos por filial ---

    pub async fn sync_groups(&self, branch_code: &str) -> SyncOutcome {
        self.groups.sync_groups(branch_code).await
    }

    pub async fn sync_items(&self, branch_code: &str) -> SyncOutcome {
        self.items.sync_items(branch_code).await
    }

    /// Grupos e depois itens. Itens só rodam se os grupos deram certo.
    pub async fn sync_catalog(&self, branch_code: &str) -> CatalogSyncResult {
        let started = Instant::now();
        info!(branch_code, "Iniciando sincronização completa da filial");

        let groups = self.groups.sync_groups(branch_code).await;
        if !groups.success {
            error!(branch_code, "Falha nos grupos, sincronização de itens ignorada");
            return CatalogSyncResult {
                success: false,
                groups,
                items: SyncOutcome::skipped("Skipped due to group sync failure"),
                message: format!("Group sync failed for branch {branch_code}"),
                duration_ms: elapsed_ms(started),
            };
        }

        // Dá tempo para o destino enxergar os grupos recém-confirmados.
        tokio::time::sleep(self.settle_delay).await;

        let items = self.items.sync_items(branch_code).await;
        let duration_ms = elapsed_ms(started);
        let message = if items.success {
            format!(
                "Sync complete for branch {branch_code} in {:.2}s",
                duration_ms as f64 / 1000.0
            )
        } else {
            format!("Item sync failed for branch {branch_code}")
        };
        CatalogSyncResult {
            success: items.success,
            message,
            groups,
            items,
            duration_ms,
        }
    }

    /// Catálogo + espelho de local. O local nunca derruba a filial.
    pub async fn sync_branch(&self, branch_code: &str, branch_name: &str) -> BranchSyncResult {
        let items = self.sync_catalog(branch_code).await;
        let location = self.locations.sync_location(branch_code, branch_name).await;
        if !location.success {
            warn!(branch_code, "Espelho de local falhou, filial segue com o resultado do catálogo");
        }

        BranchSyncResult {
            success: items.success,
            items,
            location,
        }
    }

    // --- Execução multi-filial ---

    /// Códigos explícitos (normalizados) ou, na falta deles, as filiais ativas do ERP.
    pub async fn resolve_branches(&self, explicit: Option<&[String]>) -> Result<Vec<BranchRef>, SyncError> {
        let requested = normalize_branch_codes(explicit.unwrap_or_default());
        let branches = if requested.is_empty() {
            self.source.fetch_active_branches().await.inspect_err(|e| {
                error!(sql_query = BRANCHES_QUERY, error = %e, "❌ Falha ao descobrir filiais ativas no ERP");
            })?
        } else {
            requested
        };

        if branches.is_empty() {
            return Err(SyncError::NoBranches);
        }
        Ok(branches)
    }

    pub async fn sync_all_branches(&self, explicit: Option<&[String]>) -> Result<AggregateReport, SyncError> {
        let branches = self.resolve_branches(explicit).await?;
        Ok(self.run(branches, false).await)
    }

    /// Limpa as tabelas do catálogo (numa única transação) e sincroniza tudo
    /// de novo. Uma falha na limpeza interrompe a operação antes de qualquer filial.
    pub async fn truncate_and_sync_all(&self, explicit: Option<&[String]>) -> Result<AggregateReport, SyncError> {
        let branches = self.resolve_branches(explicit).await?;

        let removed = self.target.delete_all(&TRUNCATE_ORDER).await.inspect_err(|e| {
            error!(error = %e, "❌ Falha ao limpar o catálogo, nenhuma tabela foi alterada");
        })?;
        for (kind, removed) in TRUNCATE_ORDER.iter().zip(removed) {
            info!(table = kind.table(), removed, "Tabela limpa");
        }

        Ok(self.run(branches, true).await)
    }

    // Filiais em sequência para não esgotar a pool do destino.
    async fn run(&self, branches: Vec<BranchRef>, truncated: bool) -> AggregateReport {
        let started_at = Utc::now();
        let mut results = Vec::with_capacity(branches.len());

        for branch in &branches {
            info!(branch_code = %branch.code, branch_name = %branch.name, "Sincronizando filial");
            let result = self.sync_branch(&branch.code, &branch.name).await;
            if !result.success {
                error!(branch_code = %branch.code, "❌ Falha na sincronização da filial");
            }
            results.push((branch.clone(), result));
        }

        let branch_mirror = self.locations.sync_branch_mirror(&branches).await;
        let report = AggregateReport::build(results, truncated, branch_mirror, started_at);

        info!(
            synced = report.summary.synced_branches,
            failed = report.summary.failed_branches,
            status = ?report.status,
            "Sincronização de filiais concluída"
        );
        report
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
