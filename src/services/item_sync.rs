// src/services/item_sync.rs

use std::{collections::HashSet, sync::Arc};

use tracing::{debug, error, info, warn};

use crate::{
    common::error::SyncError,
    db::{erp_repo::ITEMS_QUERY, CatalogSource, TargetStore},
    models::sync::SyncOutcome,
    services::{normalizer::normalize_item, upsert::chunked_upsert},
};

#[derive(Clone)]
pub struct ItemSyncService {
    source: Arc<dyn CatalogSource>,
    target: Arc<dyn TargetStore>,
    batch_size: u64,
    chunk_size: usize,
}

impl ItemSyncService {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        target: Arc<dyn TargetStore>,
        batch_size: u64,
        chunk_size: usize,
    ) -> Self {
        Self {
            source,
            target,
            batch_size: batch_size.max(1),
            chunk_size,
        }
    }

    /// Deve rodar só depois que os grupos da mesma filial foram confirmados:
    /// os itens referenciam os grupos por chave estrangeira.
    pub async fn sync_items(&self, branch_code: &str) -> SyncOutcome {
        info!(branch_code, "Sincronizando itens");

        match self.transfer(branch_code).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    branch_code,
                    sql_query = ITEMS_QUERY,
                    error = %e,
                    "❌ Falha ao transferir itens"
                );
                SyncOutcome::failed(
                    format!("Failed to transfer items for branch {branch_code}: {e}"),
                    e,
                )
            }
        }
    }

    async fn transfer(&self, branch_code: &str) -> Result<SyncOutcome, SyncError> {
        let valid_groups = self.source.fetch_valid_group_codes(branch_code).await?;
        if valid_groups.is_empty() {
            warn!(branch_code, "Nenhum grupo válido para a filial, itens ignorados");
            return Ok(SyncOutcome::succeeded(
                0,
                format!("No valid item group codes for branch {branch_code}, skipped item sync."),
            ));
        }

        let mut offset = 0;
        let mut total = 0;

        loop {
            let page = self
                .source
                .fetch_items_page(branch_code, offset, self.batch_size)
                .await?;
            if page.is_empty() {
                debug!(branch_code, offset, "Fim da paginação de itens");
                break;
            }

            let eligible = page
                .iter()
                .filter(|row| belongs_to(row.group_code.as_deref(), &valid_groups))
                .map(|row| normalize_item(row, &valid_groups, branch_code))
                .collect::<Result<Vec<_>, _>>()?;

            if eligible.is_empty() {
                // Páginas seguintes ainda podem ter itens elegíveis.
                warn!(branch_code, offset, "Nenhum item da página pertence a um grupo válido");
            } else {
                let count = eligible.len() as u64;
                chunked_upsert(self.target.as_ref(), eligible, self.chunk_size).await?;
                total += count;
            }

            offset += self.batch_size;
        }

        info!(branch_code, upserted = total, "✅ Itens sincronizados");
        Ok(SyncOutcome::succeeded(
            total,
            format!("Item sync done for branch {branch_code}: Upserted={total}"),
        ))
    }
}

fn belongs_to(group_code: Option<&str>, valid_groups: &HashSet<String>) -> bool {
    group_code.is_some_and(|code| valid_groups.contains(code.trim()))
}
