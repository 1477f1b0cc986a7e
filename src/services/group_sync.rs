// src/services/group_sync.rs

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    common::error::SyncError,
    db::{erp_repo::GROUPS_QUERY, CatalogSource, TargetStore},
    models::{
        catalog::{CatalogGroup, RawGroupRow},
        sync::SyncOutcome,
    },
    services::{hierarchy::resolve_hierarchy, normalizer::normalize_group, upsert::chunked_upsert},
};

/// Resolve a hierarquia e normaliza todas as linhas de grupo de uma filial.
pub fn build_groups(rows: &[RawGroupRow], branch_code: &str) -> Result<Vec<CatalogGroup>, SyncError> {
    rows.iter()
        .zip(resolve_hierarchy(rows))
        .map(|(row, hierarchy)| normalize_group(row, hierarchy, branch_code))
        .collect()
}

#[derive(Clone)]
pub struct GroupSyncService {
    source: Arc<dyn CatalogSource>,
    target: Arc<dyn TargetStore>,
    chunk_size: usize,
}

impl GroupSyncService {
    pub fn new(source: Arc<dyn CatalogSource>, target: Arc<dyn TargetStore>, chunk_size: usize) -> Self {
        Self {
            source,
            target,
            chunk_size,
        }
    }

    /// Nunca devolve erro: qualquer falha vira um `SyncOutcome` com `success = false`.
    pub async fn sync_groups(&self, branch_code: &str) -> SyncOutcome {
        info!(branch_code, "Sincronizando grupos de itens");

        match self.transfer(branch_code).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    branch_code,
                    sql_query = GROUPS_QUERY,
                    error = %e,
                    "❌ Falha ao transferir grupos de itens"
                );
                SyncOutcome::failed(
                    format!("Failed to transfer item groups for branch {branch_code}: {e}"),
                    e,
                )
            }
        }
    }

    async fn transfer(&self, branch_code: &str) -> Result<SyncOutcome, SyncError> {
        let rows = self.source.fetch_groups(branch_code).await?;
        if rows.is_empty() {
            warn!(branch_code, "Nenhum grupo de itens no ERP para a filial");
            return Ok(SyncOutcome::succeeded(
                0,
                format!("No item groups found in ERP for branch {branch_code}"),
            ));
        }

        let groups = build_groups(&rows, branch_code)?;
        let count = groups.len() as u64;
        chunked_upsert(self.target.as_ref(), groups, self.chunk_size).await?;

        info!(branch_code, upserted = count, "✅ Grupos de itens sincronizados");
        Ok(SyncOutcome::succeeded(
            count,
            format!("Item group sync done for branch {branch_code}: Upserted={count}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::EntityKind,
        services::testing::{group_row, FakeCatalogSource, FakeTargetStore},
    };
    use pretty_assertions::assert_eq;

    fn service(source: FakeCatalogSource) -> (GroupSyncService, Arc<FakeTargetStore>) {
        let target = Arc::new(FakeTargetStore::default());
        let service = GroupSyncService::new(Arc::new(source), target.clone(), 50);
        (service, target)
    }

    #[tokio::test]
    async fn empty_branch_is_a_zero_success() {
        let (service, target) = service(FakeCatalogSource::default());

        let outcome = service.sync_groups("07").await;

        assert!(outcome.success);
        assert_eq!(outcome.upserted, 0);
        assert_eq!(outcome.message, "No item groups found in ERP for branch 07");
        assert!(target.transaction_sizes().is_empty());
    }

    #[tokio::test]
    async fn groups_are_stored_with_resolved_paths() {
        let source = FakeCatalogSource::default().with_groups(
            "01",
            vec![group_row("G1", None), group_row("G2", Some("G1"))],
        );
        let (service, target) = service(source);

        let outcome = service.sync_groups("01").await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.upserted, 2);
        let g2 = target.group("G2", "01").unwrap();
        assert_eq!(g2.path, "G1->G2");
        assert_eq!(g2.nested_level, 2);
        assert_eq!(g2.parent_group_code, "G1");
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let source = FakeCatalogSource::default().with_groups(
            "01",
            vec![group_row("G1", None), group_row("G2", Some("G1"))],
        );
        let (service, target) = service(source);

        let first = service.sync_groups("01").await;
        let second = service.sync_groups("01").await;

        assert_eq!(first, second);
        assert_eq!(target.count(EntityKind::Group, "01"), 2);
    }

    #[tokio::test]
    async fn source_failure_becomes_failed_outcome() {
        let source = FakeCatalogSource::default();
        source.fail_groups("01");
        let (service, _) = service(source);

        let outcome = service.sync_groups("01").await;

        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Failed to transfer item groups for branch 01"));
        assert!(outcome.error.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn write_failure_becomes_failed_outcome() {
        let source = FakeCatalogSource::default().with_groups("01", vec![group_row("G1", None)]);
        let (service, target) = service(source);
        target.fail_transaction_number(1);

        let outcome = service.sync_groups("01").await;

        assert!(!outcome.success);
        assert_eq!(target.count(EntityKind::Group, "01"), 0);
    }
}
