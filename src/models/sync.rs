// src/models/sync.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::catalog::BranchRef;

// ---
// 1. Resultado de uma fase (grupos, itens, local)
// ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    pub upserted: u64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    // Só o espelho de local informa se atualizou ou criou.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<bool>,
}

impl SyncOutcome {
    pub fn succeeded(upserted: u64, message: impl Into<String>) -> Self {
        Self {
            success: true,
            upserted,
            message: message.into(),
            error: None,
            updated: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: impl ToString) -> Self {
        Self {
            success: false,
            upserted: 0,
            message: message.into(),
            error: Some(error.to_string()),
            updated: None,
        }
    }

    /// Fase não executada (ex.: itens quando os grupos falharam).
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: false,
            upserted: 0,
            message: message.into(),
            error: None,
            updated: None,
        }
    }
}

// ---
// 2. Resultado por filial
// ---
/// Grupos seguidos de itens para uma filial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSyncResult {
    pub success: bool,
    pub groups: SyncOutcome,
    pub items: SyncOutcome,
    pub message: String,
    pub duration_ms: u64,
}

impl CatalogSyncResult {
    /// Texto para o operador: a primeira fase que falhou e o erro dela.
    pub fn failure_reason(&self) -> String {
        let failed = [&self.groups, &self.items]
            .into_iter()
            .find(|outcome| !outcome.success);
        match failed {
            Some(outcome) => {
                let detail = outcome.error.as_deref().unwrap_or(&outcome.message);
                format!("{}: {}", self.message, detail)
            }
            None => self.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSyncResult {
    // Igual a `items.success`; o espelho de local nunca derruba a filial.
    pub success: bool,
    pub items: CatalogSyncResult,
    pub location: SyncOutcome,
}

// ---
// 3. Relatório agregado
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Partial,
    Failed,
}

impl SyncStatus {
    pub fn classify(total: usize, failed: usize) -> Self {
        if failed == 0 && total > 0 {
            SyncStatus::Success
        } else if failed >= total {
            SyncStatus::Failed
        } else {
            SyncStatus::Partial
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub total_branches: usize,
    pub synced_branches: usize,
    pub failed_branches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSuccess {
    pub branch_code: String,
    pub branch_name: String,
    pub result: BranchSyncResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchFailure {
    pub branch_code: String,
    pub branch_name: String,
    pub error: String,
    pub details: BranchSyncResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorOutcome {
    pub synced: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub success: bool,
    pub status: SyncStatus,
    pub message: String,
    pub summary: SyncSummary,
    pub successes: Vec<BranchSuccess>,
    pub failures: Vec<BranchFailure>,
    pub branch_mirror: MirrorOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AggregateReport {
    /// Separa as filiais em sucessos e falhas e monta o resumo de três estados.
    pub fn build(
        results: Vec<(BranchRef, BranchSyncResult)>,
        truncated: bool,
        branch_mirror: MirrorOutcome,
        started_at: DateTime<Utc>,
    ) -> Self {
        let total = results.len();
        let mut successes = Vec::new();
        let mut failures = Vec::new();

        for (branch, result) in results {
            if result.success {
                successes.push(BranchSuccess {
                    branch_code: branch.code,
                    branch_name: branch.name,
                    result,
                });
            } else {
                failures.push(BranchFailure {
                    branch_code: branch.code,
                    branch_name: branch.name,
                    error: result.items.failure_reason(),
                    details: result,
                });
            }
        }

        let status = SyncStatus::classify(total, failures.len());
        let verb = if truncated { "Truncated and synced" } else { "Synced" };
        let message = match status {
            SyncStatus::Success => format!("{verb} {} branches successfully.", successes.len()),
            SyncStatus::Failed if truncated => "Truncate and sync failed for all branches.".to_string(),
            SyncStatus::Failed => "Sync failed for all branches.".to_string(),
            SyncStatus::Partial => format!(
                "{verb} {} branches. {} branch(es) failed.",
                successes.len(),
                failures.len()
            ),
        };

        Self {
            success: failures.is_empty(),
            status,
            message,
            summary: SyncSummary {
                total_branches: total,
                synced_branches: successes.len(),
                failed_branches: failures.len(),
                truncated: truncated.then_some(true),
            },
            successes,
            failures,
            branch_mirror,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn branch_result(groups_ok: bool) -> BranchSyncResult {
        let groups = if groups_ok {
            SyncOutcome::succeeded(2, "groups ok")
        } else {
            SyncOutcome::failed("Failed to transfer item groups", "connection reset")
        };
        let items = if groups_ok {
            SyncOutcome::succeeded(1, "items ok")
        } else {
            SyncOutcome::skipped("Skipped due to group sync failure")
        };
        BranchSyncResult {
            success: groups_ok,
            items: CatalogSyncResult {
                success: groups_ok,
                groups,
                items,
                message: if groups_ok { "done".into() } else { "Group sync failed for branch B".into() },
                duration_ms: 5,
            },
            location: SyncOutcome::succeeded(1, "location ok"),
        }
    }

    fn branch(code: &str) -> BranchRef {
        BranchRef { code: code.into(), name: format!("Branch {code}") }
    }

    #[test]
    fn classify_three_way_status() {
        assert_eq!(SyncStatus::classify(3, 0), SyncStatus::Success);
        assert_eq!(SyncStatus::classify(3, 1), SyncStatus::Partial);
        assert_eq!(SyncStatus::classify(3, 3), SyncStatus::Failed);
    }

    #[test]
    fn mixed_results_build_partial_report_with_failure_detail() {
        let report = AggregateReport::build(
            vec![
                (branch("A"), branch_result(true)),
                (branch("B"), branch_result(false)),
                (branch("C"), branch_result(true)),
            ],
            false,
            MirrorOutcome::default(),
            Utc::now(),
        );

        assert_eq!(report.status, SyncStatus::Partial);
        assert!(!report.success);
        assert_eq!(
            report.summary,
            SyncSummary { total_branches: 3, synced_branches: 2, failed_branches: 1, truncated: None }
        );
        assert_eq!(report.failures[0].branch_code, "B");
        assert_eq!(report.failures[0].branch_name, "Branch B");
        assert!(report.failures[0].error.contains("connection reset"));
        assert_eq!(report.message, "Synced 2 branches. 1 branch(es) failed.");
    }

    #[test]
    fn truncated_report_flags_summary() {
        let report = AggregateReport::build(
            vec![(branch("A"), branch_result(true))],
            true,
            MirrorOutcome::default(),
            Utc::now(),
        );
        assert_eq!(report.summary.truncated, Some(true));
        assert_eq!(report.message, "Truncated and synced 1 branches successfully.");
    }

    #[test]
    fn outcome_serializes_without_empty_error() {
        let json = serde_json::to_value(SyncOutcome::succeeded(3, "ok")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "upserted": 3, "message": "ok" }));
    }
}
