// src/services/location_sync.rs

use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::{
    common::error::SyncError,
    db::{catalog_repo::LocationWrite, CatalogSource, TargetStore, UpsertOp},
    models::{
        catalog::{BranchMirror, BranchRef, LocationRecord, RawBranchRow},
        sync::{MirrorOutcome, SyncOutcome},
    },
};

const UNKNOWN_CITY: &str = "Unknown";

/// Monta o registro de local a partir do perfil da filial no ERP.
///
/// O nome segue a ordem: nome no ERP, nome informado pelo chamador, `Branch <código>`.
/// O link do mapa usa o nome do ERP (ou o código), codificado para URL.
pub fn build_location(
    branch_code: &str,
    branch_name: &str,
    profile: Option<&RawBranchRow>,
) -> LocationRecord {
    let erp_name = profile
        .and_then(|p| p.branch_name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let caller_name = Some(branch_name.trim()).filter(|name| !name.is_empty());

    let name = erp_name
        .or(caller_name)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Branch {branch_code}"));
    let map_query = erp_name.unwrap_or(branch_code);

    LocationRecord {
        name,
        address: format!("{branch_code} Branch"),
        city: UNKNOWN_CITY.to_string(),
        map_link: format!("https://maps.google.com/?q={}", urlencoding::encode(map_query)),
        working_hours: None,
    }
}

/// Espelhos auxiliares: o local da filial e a tabela `restaurant_branches`.
/// Nenhum dos dois afeta o sucesso de uma filial.
#[derive(Clone)]
pub struct LocationSyncService {
    source: Arc<dyn CatalogSource>,
    target: Arc<dyn TargetStore>,
    chunk_size: usize,
}

impl LocationSyncService {
    pub fn new(source: Arc<dyn CatalogSource>, target: Arc<dyn TargetStore>, chunk_size: usize) -> Self {
        Self {
            source,
            target,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn sync_location(&self, branch_code: &str, branch_name: &str) -> SyncOutcome {
        // Falha na leitura do perfil não é fatal: seguimos com os valores padrão.
        let profile = match self.source.fetch_branch_profile(branch_code).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(branch_code, error = %e, "Não foi possível ler o perfil da filial no ERP");
                None
            }
        };
        if profile.is_none() {
            warn!(branch_code, "Filial sem perfil ativo no ERP, usando dados básicos");
        }

        let location = build_location(branch_code, branch_name, profile.as_ref());
        match self.target.upsert_location(&location).await {
            Ok(write) => {
                let (updated, location_id) = match write {
                    LocationWrite::Updated(id) => (true, id),
                    LocationWrite::Created(id) => (false, id),
                };
                let verb = if updated { "Updated" } else { "Created" };
                info!(branch_code, %location_id, location = %location.name, verb, "Local sincronizado");
                SyncOutcome {
                    updated: Some(updated),
                    ..SyncOutcome::succeeded(1, format!("Location sync done for branch {branch_code}: {verb}"))
                }
            }
            Err(e) => {
                error!(branch_code, error = %e, "❌ Falha ao sincronizar o local da filial");
                SyncOutcome::failed(
                    format!("Failed to transfer location for branch {branch_code}: {e}"),
                    e,
                )
            }
        }
    }

    /// Upsert de cada (código, nome) no espelho de filiais. Dentro de um chunk
    /// os upserts são concorrentes e cada um é resolvido isoladamente.
    pub async fn sync_branch_mirror(&self, branches: &[BranchRef]) -> MirrorOutcome {
        let mut outcome = MirrorOutcome::default();

        for chunk in branches.chunks(self.chunk_size) {
            let results = join_all(chunk.iter().map(|branch| self.mirror_one(branch))).await;
            for (branch, result) in chunk.iter().zip(results) {
                match result {
                    Ok(_) => outcome.synced += 1,
                    Err(e) => {
                        warn!(branch_code = %branch.code, error = %e, "Falha ao espelhar a filial");
                        outcome.failed += 1;
                    }
                }
            }
        }

        info!(synced = outcome.synced, failed = outcome.failed, "Espelho de filiais atualizado");
        outcome
    }

    async fn mirror_one(&self, branch: &BranchRef) -> Result<u64, SyncError> {
        let op = UpsertOp::from(BranchMirror::from(branch));
        self.target.upsert(&op).await
    }
}
