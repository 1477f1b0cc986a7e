// src/handlers/catalog.rs

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    common::error::AppError,
    config::AppState,
    db::CategoryFilter,
    models::catalog::{MenuCategoryView, MenuItemView},
};

const BRANCH_HEADER: &str = "x-branch-code";
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    pub branch_code: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    /// `page` e `limit` abaixo de 1 são corrigidos para 1; `limit` ausente vale 10
    /// e nunca passa de 100.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            total: 0,
            total_pages: 0,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn with_total(self, total: i64) -> Self {
        Self {
            total,
            total_pages: if total > 0 { (total - 1) / self.limit + 1 } else { 0 },
            ..self
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub success: bool,
    pub pagination: Pagination,
    pub data: Vec<T>,
}

// Query string, depois o header, depois a filial padrão da configuração.
fn resolve_branch(app_state: &AppState, query: &CatalogQuery, headers: &HeaderMap) -> Result<String, AppError> {
    query
        .branch_code
        .clone()
        .or_else(|| {
            headers
                .get(BRANCH_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .or_else(|| app_state.config.default_branch_code.clone())
        .ok_or(AppError::BranchCodeRequired)
}

pub async fn list_menu_items(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CatalogQuery>,
) -> Result<impl IntoResponse, AppError> {
    let branch_code = resolve_branch(&app_state, &query, &headers)?;
    let pagination = Pagination::new(query.page, query.limit);

    let items = app_state
        .catalog_repo
        .list_menu_items(&branch_code, pagination.limit, pagination.offset())
        .await?;
    let total = app_state.catalog_repo.count_menu_items(&branch_code).await?;

    Ok((
        StatusCode::OK,
        Json(Paginated {
            success: true,
            pagination: pagination.with_total(total),
            data: items.into_iter().map(MenuItemView::from).collect(),
        }),
    ))
}

async fn list_categories(
    app_state: &AppState,
    branch_code: &str,
    filter: CategoryFilter<'_>,
    query: &CatalogQuery,
) -> Result<Paginated<MenuCategoryView>, AppError> {
    let pagination = Pagination::new(query.page, query.limit);

    let groups = app_state
        .catalog_repo
        .list_categories(branch_code, filter, pagination.limit, pagination.offset())
        .await?;
    let total = app_state.catalog_repo.count_categories(branch_code, filter).await?;

    Ok(Paginated {
        success: true,
        pagination: pagination.with_total(total),
        data: groups.into_iter().map(MenuCategoryView::from).collect(),
    })
}

pub async fn list_all_categories(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CatalogQuery>,
) -> Result<impl IntoResponse, AppError> {
    let branch_code = resolve_branch(&app_state, &query, &headers)?;
    let page = list_categories(&app_state, &branch_code, CategoryFilter::All, &query).await?;
    Ok((StatusCode::OK, Json(page)))
}

pub async fn list_parent_categories(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CatalogQuery>,
) -> Result<impl IntoResponse, AppError> {
    let branch_code = resolve_branch(&app_state, &query, &headers)?;
    let page = list_categories(&app_state, &branch_code, CategoryFilter::Parents, &query).await?;
    Ok((StatusCode::OK, Json(page)))
}

pub async fn list_subcategories(
    State(app_state): State<AppState>,
    Path(parent): Path<String>,
    headers: HeaderMap,
    Query(query): Query<CatalogQuery>,
) -> Result<impl IntoResponse, AppError> {
    let branch_code = resolve_branch(&app_state, &query, &headers)?;
    let parent = parent.trim();
    let page = list_categories(&app_state, &branch_code, CategoryFilter::ChildrenOf(parent), &query).await?;
    Ok((StatusCode::OK, Json(page)))
}
