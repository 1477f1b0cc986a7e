// src/handlers/sync.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::sync::{AggregateReport, SyncStatus},
};

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BranchPayload {
    #[serde(alias = "branch_code", default)]
    #[validate(length(min = 1, message = "Branch code is required"))]
    pub branch_code: String,
}

impl BranchPayload {
    fn branch_code(&self) -> Result<String, AppError> {
        self.validate()?;
        let code = self.branch_code.trim();
        if code.is_empty() {
            return Err(AppError::BranchCodeRequired);
        }
        Ok(code.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAllPayload {
    #[serde(alias = "branch_codes", default)]
    pub branch_codes: Option<Vec<String>>,
}

/// 200 quando todas as filiais sincronizaram, 207 no sucesso parcial, 500 quando todas falharam.
pub fn report_status(report: &AggregateReport) -> StatusCode {
    match report.status {
        SyncStatus::Success => StatusCode::OK,
        SyncStatus::Partial => StatusCode::MULTI_STATUS,
        SyncStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ---
// Handlers por filial
// ---
pub async fn sync_groups(
    State(app_state): State<AppState>,
    Json(payload): Json<BranchPayload>,
) -> Result<impl IntoResponse, AppError> {
    let branch_code = payload.branch_code()?;
    let outcome = app_state.orchestrator.sync_groups(&branch_code).await;
    Ok((StatusCode::OK, Json(outcome)))
}

pub async fn sync_items(
    State(app_state): State<AppState>,
    Json(payload): Json<BranchPayload>,
) -> Result<impl IntoResponse, AppError> {
    let branch_code = payload.branch_code()?;
    let outcome = app_state.orchestrator.sync_items(&branch_code).await;
    Ok((StatusCode::OK, Json(outcome)))
}

pub async fn sync_branch(
    State(app_state): State<AppState>,
    Json(payload): Json<BranchPayload>,
) -> Result<impl IntoResponse, AppError> {
    let branch_code = payload.branch_code()?;
    let result = app_state
        .orchestrator
        .sync_branch(&branch_code, &branch_code)
        .await;
    Ok((StatusCode::OK, Json(result)))
}

// ---
// Handlers multi-filial
// ---
pub async fn sync_all_branches(
    State(app_state): State<AppState>,
    payload: Option<Json<SyncAllPayload>>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let report = app_state
        .orchestrator
        .sync_all_branches(payload.branch_codes.as_deref())
        .await?;
    Ok((report_status(&report), Json(report)))
}

pub async fn truncate_and_sync(
    State(app_state): State<AppState>,
    payload: Option<Json<SyncAllPayload>>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("Limpando o catálogo do destino antes de sincronizar");
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let report = app_state
        .orchestrator
        .truncate_and_sync_all(payload.branch_codes.as_deref())
        .await?;
    Ok((report_status(&report), Json(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn branch_payload_accepts_both_spellings() {
        let camel: BranchPayload = serde_json::from_str(r#"{"branchCode":" 01 "}"#).unwrap();
        let snake: BranchPayload = serde_json::from_str(r#"{"branch_code":"02"}"#).unwrap();

        assert_eq!(camel.branch_code().unwrap(), "01");
        assert_eq!(snake.branch_code().unwrap(), "02");
    }

    #[test]
    fn blank_branch_code_is_rejected() {
        let missing: BranchPayload = serde_json::from_str("{}").unwrap();
        assert!(matches!(missing.branch_code(), Err(AppError::ValidationError(_))));

        let blank: BranchPayload = serde_json::from_str(r#"{"branchCode":"   "}"#).unwrap();
        assert!(matches!(blank.branch_code(), Err(AppError::BranchCodeRequired)));
    }

    #[test]
    fn sync_all_payload_is_optional() {
        let empty: SyncAllPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.branch_codes, None);

        let codes: SyncAllPayload = serde_json::from_str(r#"{"branchCodes":["01","02"]}"#).unwrap();
        assert_eq!(codes.branch_codes, Some(vec!["01".to_string(), "02".to_string()]));
    }
}
