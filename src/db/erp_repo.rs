// src/db/erp_repo.rs

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo};
use tokio::sync::RwLock;

use crate::common::error::SyncError;
use crate::models::catalog::{BranchRef, RawBranchRow, RawGroupRow, RawItemRow};

/// Uma linha do ERP com os nomes de coluna em maiúsculas.
pub type SourceRow = serde_json::Map<String, Value>;

// Identidade das consultas, usada nos logs de falha.
pub const GROUPS_QUERY: &str = "INV_ITEM_MAIN_GROUP join SYS_COMPANY_BRANCHES_SETUP";
pub const ITEMS_QUERY: &str = "INV_ITEM_MASTER join SYS_COMPANY_BRANCHES_SETUP";
pub const BRANCHES_QUERY: &str = "SYS_COMPANY_BRANCHES_SETUP join SYS_COMPANY_BRANCHES";

// Itens "normais" do cadastro; os demais tipos não vão para o cardápio.
const ITEM_TYPE_DISCRIMINATOR: &str = "N";

// ---
// SourceReader: a capacidade de consulta sobre a base de origem
// ---
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Executa `sql` com parâmetros nomeados (`@nome`). Nunca devolve `None`:
    /// sem linhas, o resultado é um vetor vazio.
    async fn query(&self, sql: &str, params: &[(&str, Value)]) -> Result<Vec<SourceRow>, SyncError>;
}

/// Leitor sobre uma conexão sqlx (espelho Postgres do ERP).
/// A pool é reaberta sob demanda se for encontrada fechada.
pub struct PgSourceReader {
    url: String,
    max_connections: u32,
    pool: RwLock<PgPool>,
}

impl PgSourceReader {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = open_pool(url, max_connections).await?;
        Ok(Self {
            url: url.to_string(),
            max_connections,
            pool: RwLock::new(pool),
        })
    }

    async fn handle(&self) -> Result<PgPool, sqlx::Error> {
        {
            let pool = self.pool.read().await;
            if !pool.is_closed() {
                return Ok(pool.clone());
            }
        }

        let mut pool = self.pool.write().await;
        if pool.is_closed() {
            tracing::info!("⚠️ Conexão com o ERP estava fechada. Reconectando...");
            *pool = open_pool(&self.url, self.max_connections).await?;
        }
        Ok(pool.clone())
    }
}

async fn open_pool(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await
}

#[async_trait]
impl SourceReader for PgSourceReader {
    async fn query(&self, sql: &str, params: &[(&str, Value)]) -> Result<Vec<SourceRow>, SyncError> {
        let (text, values) = bind_named(sql, params)?;
        tracing::debug!(params = ?params, "Executando consulta no ERP: {}", text);

        let pool = self.handle().await.map_err(SyncError::Source)?;
        let query = values
            .into_iter()
            .fold(sqlx::query(&text), bind_value);

        let rows = query.fetch_all(&pool).await.map_err(SyncError::Source)?;
        rows.iter()
            .map(row_to_map)
            .collect::<Result<_, _>>()
            .map_err(SyncError::Source)
    }
}

/// Reescreve `@nome` para `$n` (mesmo nome, mesmo índice) e devolve os valores na ordem.
/// Literais entre aspas simples não são tocados.
pub(crate) fn bind_named(sql: &str, params: &[(&str, Value)]) -> Result<(String, Vec<Value>), SyncError> {
    let mut text = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut values = Vec::new();
    let mut in_literal = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
        }
        if c != '@' || in_literal {
            text.push(c);
            continue;
        }

        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            text.push('@');
            continue;
        }

        let position = match names.iter().position(|n| *n == name) {
            Some(position) => position,
            None => {
                let value = params
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| SyncError::UnboundParameter(name.clone()))?;
                names.push(name);
                values.push(value);
                names.len() - 1
            }
        };
        let _ = write!(text, "${}", position + 1);
    }

    Ok((text, values))
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s),
        other => query.bind(sqlx::types::Json(other)),
    }
}

fn row_to_map(row: &PgRow) -> Result<SourceRow, sqlx::Error> {
    let mut map = SourceRow::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = match column.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::from),
            "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(Value::from),
            "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(Value::from),
            "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::from),
            "FLOAT4" => row.try_get::<Option<f32>, _>(idx)?.map(|f| Value::from(f64::from(f))),
            "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(Value::from),
            // Texto preserva a escala; o normalizador converte para Decimal.
            "NUMERIC" => row
                .try_get::<Option<Decimal>, _>(idx)?
                .map(|d| Value::String(d.to_string())),
            _ => row.try_get::<Option<String>, _>(idx)?.map(Value::String),
        };
        map.insert(column.name().to_ascii_uppercase(), value.unwrap_or(Value::Null));
    }
    Ok(map)
}

// ---
// CatalogSource: as consultas tipadas que o motor consome
// ---
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_groups(&self, branch_code: &str) -> Result<Vec<RawGroupRow>, SyncError>;
    async fn fetch_valid_group_codes(&self, branch_code: &str) -> Result<HashSet<String>, SyncError>;
    async fn fetch_items_page(
        &self,
        branch_code: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<RawItemRow>, SyncError>;
    async fn fetch_active_branches(&self) -> Result<Vec<BranchRef>, SyncError>;
    async fn fetch_branch_profile(&self, branch_code: &str) -> Result<Option<RawBranchRow>, SyncError>;
}

#[derive(Clone)]
pub struct ErpRepository {
    reader: Arc<dyn SourceReader>,
}

impl ErpRepository {
    pub fn new(reader: Arc<dyn SourceReader>) -> Self {
        Self { reader }
    }

    async fn query_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[(&str, Value)],
    ) -> Result<Vec<T>, SyncError> {
        let rows = self.reader.query(sql, params).await?;
        decode_rows(rows)
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<SourceRow>) -> Result<Vec<T>, SyncError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).map_err(SyncError::from))
        .collect()
}

fn items_page_sql(with_photo: bool) -> String {
    let photo = if with_photo { "A.ITEM_PIC," } else { "" };
    format!(
        r#"
        SELECT
            A.ITEM_CODE,
            A.ITEM_NAME,
            A.ITM_GROUP_CODE,
            A.MENU_ORDER,
            A.SALES_PRICE,
            A.SHOW_IN_WEBSITE,
            A.WEBSITE_NAME_EN,
            A.WEBSITE_NAME_AR,
            A.WEBSITE_DESCRIPTION_EN,
            A.WEBSITE_DESCRIPTION_AR,
            A.SALEABLE,
            A.FASTING,
            A.VEGETARIAN,
            A.HEALTHY_CHOICE,
            A.SIGNATURE_DISH,
            A.SPICY,
            {photo}
            B.BRANCH
        FROM INV_ITEM_MASTER A
        INNER JOIN SYS_COMPANY_BRANCHES_SETUP B
            ON A.ITEM_CODE = B.CODE
            AND B.TYPE_CODE = 'ITEM'
            AND B.BRANCH = @branchCode
        WHERE A.ITEM_TYPE = @itemType
        ORDER BY A.MENU_ORDER, A.ITEM_CODE
        OFFSET @offset ROWS FETCH NEXT @limit ROWS ONLY
        "#
    )
}

// Bases antigas do ERP não têm a coluna de foto.
fn is_missing_photo_column(err: &sqlx::Error) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("item_pic") || message.contains("invalid column")
}

#[async_trait]
impl CatalogSource for ErpRepository {
    async fn fetch_groups(&self, branch_code: &str) -> Result<Vec<RawGroupRow>, SyncError> {
        self.query_as(
            r#"
            SELECT
                g.ITM_GROUP_CODE,
                g.ITM_GROUP_NAME,
                g.SHOW_IN_WEBSITE,
                g.GROUP_ORDER,
                g.WEBSITE_DESCRIPTION_AR,
                g.WEBSITE_DESCRIPTION_EN,
                g.WEBSITE_NAME_AR,
                g.WEBSITE_NAME_EN,
                g.SALEABLE,
                g.MAIN_GROUP AS PARENT_GROUP_CODE,
                b.BRANCH
            FROM INV_ITEM_MAIN_GROUP g
            INNER JOIN SYS_COMPANY_BRANCHES_SETUP b
                ON g.ITM_GROUP_CODE = b.CODE
                AND b.TYPE_CODE = 'ITEM_GROUP'
                AND b.BRANCH = @branchCode
            ORDER BY g.GROUP_ORDER
            "#,
            &[("branchCode", Value::from(branch_code))],
        )
        .await
    }

    async fn fetch_valid_group_codes(&self, branch_code: &str) -> Result<HashSet<String>, SyncError> {
        let rows: Vec<RawGroupRow> = self
            .query_as(
                r#"
                SELECT g.ITM_GROUP_CODE
                FROM INV_ITEM_MAIN_GROUP g
                INNER JOIN SYS_COMPANY_BRANCHES_SETUP b
                    ON g.ITM_GROUP_CODE = b.CODE
                    AND b.TYPE_CODE = 'ITEM_GROUP'
                WHERE b.BRANCH = @branchCode
                "#,
                &[("branchCode", Value::from(branch_code))],
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.group_code)
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .collect())
    }

    async fn fetch_items_page(
        &self,
        branch_code: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<RawItemRow>, SyncError> {
        let params = [
            ("branchCode", Value::from(branch_code)),
            ("itemType", Value::from(ITEM_TYPE_DISCRIMINATOR)),
            ("offset", Value::from(offset)),
            ("limit", Value::from(limit)),
        ];

        match self.reader.query(&items_page_sql(true), &params).await {
            Ok(rows) => decode_rows(rows),
            Err(SyncError::Source(err)) if is_missing_photo_column(&err) => {
                tracing::debug!(
                    branch_code,
                    "Coluna ITEM_PIC ausente, consultando itens sem foto"
                );
                let rows = self.reader.query(&items_page_sql(false), &params).await?;
                decode_rows(rows)
            }
            Err(err) => Err(err),
        }
    }

    async fn fetch_active_branches(&self) -> Result<Vec<BranchRef>, SyncError> {
        let rows: Vec<RawBranchRow> = self
            .query_as(
                r#"
                SELECT DISTINCT
                    B.BRANCH AS BRANCH_CODE,
                    COALESCE(BS.BRANCH_NAME, B.BRANCH) AS BRANCH_NAME
                FROM SYS_COMPANY_BRANCHES_SETUP B
                LEFT JOIN SYS_COMPANY_BRANCHES BS
                    ON BS.BRANCH_CODE = B.BRANCH
                WHERE B.TYPE_CODE = 'ITEM_GROUP'
                    AND B.BRANCH IS NOT NULL
                    AND LTRIM(RTRIM(B.BRANCH)) <> ''
                    AND BS.Active = 1
                ORDER BY BRANCH_CODE
                "#,
                &[],
            )
            .await?;

        Ok(rows.into_iter().filter_map(branch_from_row).collect())
    }

    async fn fetch_branch_profile(&self, branch_code: &str) -> Result<Option<RawBranchRow>, SyncError> {
        let rows: Vec<RawBranchRow> = self
            .query_as(
                r#"
                SELECT BS.BRANCH_CODE, BS.BRANCH_NAME
                FROM SYS_COMPANY_BRANCHES BS
                WHERE BS.BRANCH_CODE = @branchCode
                    AND BS.Active = 1
                "#,
                &[("branchCode", Value::from(branch_code))],
            )
            .await?;

        Ok(rows.into_iter().next())
    }
}

fn branch_from_row(row: RawBranchRow) -> Option<BranchRef> {
    let code = row.branch_code.as_deref().map(str::trim).unwrap_or_default();
    if code.is_empty() {
        return None;
    }
    let name = row
        .branch_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(code);
    Some(BranchRef {
        code: code.to_string(),
        name: name.to_string(),
    })
}
