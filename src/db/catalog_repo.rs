// src/db/catalog_repo.rs

use std::{
    collections::{hash_map::Entry, HashMap},
    hash::Hash,
};

use async_trait::async_trait;
use sqlx::{Executor, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::{AppError, SyncError},
    models::catalog::{BranchMirror, CatalogGroup, CatalogItem, LocationRecord},
};

// ---
// Tipos de entidade e operações de escrita
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Group,
    Item,
    Location,
    BranchMirror,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Group => "item_groups",
            EntityKind::Item => "items",
            EntityKind::Location => "locations",
            EntityKind::BranchMirror => "restaurant_branches",
        }
    }
}

/// Um upsert chaveado por (código, filial). O caminho de update atualiza
/// todos os atributos mutáveis; o de create grava também a identidade.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOp {
    Group(CatalogGroup),
    Item(CatalogItem),
    BranchMirror(BranchMirror),
}

impl From<CatalogGroup> for UpsertOp {
    fn from(group: CatalogGroup) -> Self {
        UpsertOp::Group(group)
    }
}

impl From<CatalogItem> for UpsertOp {
    fn from(item: CatalogItem) -> Self {
        UpsertOp::Item(item)
    }
}

impl From<BranchMirror> for UpsertOp {
    fn from(branch: BranchMirror) -> Self {
        UpsertOp::BranchMirror(branch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationWrite {
    Created(Uuid),
    Updated(Uuid),
}

// ---
// TargetStore: a capacidade de escrita sobre a base de destino
// ---
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Upsert avulso, fora de transação.
    async fn upsert(&self, op: &UpsertOp) -> Result<u64, SyncError>;

    /// Aplica todas as operações numa única transação (tudo ou nada).
    /// Devolve o total de linhas afetadas.
    async fn run_transaction(&self, ops: Vec<UpsertOp>) -> Result<u64, SyncError>;

    /// Esvazia as tabelas na ordem dada, numa única transação. Devolve as
    /// linhas removidas por tabela; a falha vem como `SyncError::Truncate`.
    async fn delete_all(&self, kinds: &[EntityKind]) -> Result<Vec<u64>, SyncError>;

    /// Atualiza o local com o mesmo nome ou cria um novo.
    async fn upsert_location(&self, location: &LocationRecord) -> Result<LocationWrite, SyncError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter<'a> {
    All,
    Parents,
    ChildrenOf(&'a str),
}

#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Funções de "Leitura" (cardápio)
    // ---
    // Só entra o que está visível no site e é vendável.

    pub async fn list_menu_items(
        &self,
        branch_code: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CatalogItem>, AppError> {
        let items = sqlx::query_as::<_, CatalogItem>(
            r#"
            SELECT * FROM items
            WHERE show_in_website = TRUE AND saleable = TRUE AND branch_code = $1
            ORDER BY item_order ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(branch_code)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn count_menu_items(&self, branch_code: &str) -> Result<i64, AppError> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM items
            WHERE show_in_website = TRUE AND saleable = TRUE AND branch_code = $1
            "#,
        )
        .bind(branch_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    pub async fn list_categories(
        &self,
        branch_code: &str,
        filter: CategoryFilter<'_>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CatalogGroup>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM item_groups");
        push_category_filter(&mut builder, branch_code, filter);
        builder
            .push(" ORDER BY order_group ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let groups = builder
            .build_query_as::<CatalogGroup>()
            .fetch_all(&self.pool)
            .await?;
        Ok(groups)
    }

    pub async fn count_categories(
        &self,
        branch_code: &str,
        filter: CategoryFilter<'_>,
    ) -> Result<i64, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM item_groups");
        push_category_filter(&mut builder, branch_code, filter);

        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}

fn push_category_filter<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    branch_code: &'a str,
    filter: CategoryFilter<'a>,
) {
    builder
        .push(" WHERE show_in_website = TRUE AND saleable = TRUE AND branch_code = ")
        .push_bind(branch_code);
    match filter {
        CategoryFilter::All => {}
        CategoryFilter::Parents => {
            builder.push(" AND nested_level = 1");
        }
        CategoryFilter::ChildrenOf(parent) => {
            builder
                .push(" AND nested_level = 2 AND parent_group_code = ")
                .push_bind(parent);
        }
    }
}

// ---
// Funções de "Escrita"
// ---
// Cada lote vira um único INSERT multi-linha com ON CONFLICT. Genéricas sobre
// `Executor` para rodar na pool ou dentro de uma transação.

async fn upsert_groups<'e, E>(executor: E, groups: &[&CatalogGroup]) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    if groups.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        r#"
        INSERT INTO item_groups (
            itm_group_code, branch_code, itm_group_name, order_group,
            show_in_website, saleable,
            website_name_en, website_name_ar, website_description_en, website_description_ar,
            parent_group_code, nested_level, path
        )
        "#,
    );
    builder.push_values(groups.iter().copied(), |mut row, group| {
        row.push_bind(&group.itm_group_code)
            .push_bind(&group.branch_code)
            .push_bind(&group.itm_group_name)
            .push_bind(group.order_group)
            .push_bind(group.show_in_website)
            .push_bind(group.saleable)
            .push_bind(&group.website_name_en)
            .push_bind(&group.website_name_ar)
            .push_bind(&group.website_description_en)
            .push_bind(&group.website_description_ar)
            .push_bind(&group.parent_group_code)
            .push_bind(group.nested_level)
            .push_bind(&group.path);
    });
    builder.push(
        r#"
        ON CONFLICT (itm_group_code, branch_code)
        DO UPDATE SET
            itm_group_name = EXCLUDED.itm_group_name,
            order_group = EXCLUDED.order_group,
            show_in_website = EXCLUDED.show_in_website,
            saleable = EXCLUDED.saleable,
            website_name_en = EXCLUDED.website_name_en,
            website_name_ar = EXCLUDED.website_name_ar,
            website_description_en = EXCLUDED.website_description_en,
            website_description_ar = EXCLUDED.website_description_ar,
            parent_group_code = EXCLUDED.parent_group_code,
            nested_level = EXCLUDED.nested_level,
            path = EXCLUDED.path
        "#,
    );

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

async fn upsert_items<'e, E>(executor: E, items: &[&CatalogItem]) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    if items.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        r#"
        INSERT INTO items (
            itm_code, branch_code, itm_name, item_order, itm_group_code, photo_url, sales_price,
            show_in_website, saleable,
            website_name_en, website_name_ar, website_description_en, website_description_ar,
            fasting, vegetarian, healthy_choice, signature_dish, spicy
        )
        "#,
    );
    builder.push_values(items.iter().copied(), |mut row, item| {
        row.push_bind(&item.itm_code)
            .push_bind(&item.branch_code)
            .push_bind(&item.itm_name)
            .push_bind(item.item_order)
            .push_bind(&item.itm_group_code)
            .push_bind(&item.photo_url)
            .push_bind(item.sales_price)
            .push_bind(item.show_in_website)
            .push_bind(item.saleable)
            .push_bind(&item.website_name_en)
            .push_bind(&item.website_name_ar)
            .push_bind(&item.website_description_en)
            .push_bind(&item.website_description_ar)
            .push_bind(item.fasting)
            .push_bind(item.vegetarian)
            .push_bind(item.healthy_choice)
            .push_bind(item.signature_dish)
            .push_bind(item.spicy);
    });
    builder.push(
        r#"
        ON CONFLICT (itm_code, branch_code)
        DO UPDATE SET
            itm_name = EXCLUDED.itm_name,
            item_order = EXCLUDED.item_order,
            itm_group_code = EXCLUDED.itm_group_code,
            photo_url = EXCLUDED.photo_url,
            sales_price = EXCLUDED.sales_price,
            show_in_website = EXCLUDED.show_in_website,
            saleable = EXCLUDED.saleable,
            website_name_en = EXCLUDED.website_name_en,
            website_name_ar = EXCLUDED.website_name_ar,
            website_description_en = EXCLUDED.website_description_en,
            website_description_ar = EXCLUDED.website_description_ar,
            fasting = EXCLUDED.fasting,
            vegetarian = EXCLUDED.vegetarian,
            healthy_choice = EXCLUDED.healthy_choice,
            signature_dish = EXCLUDED.signature_dish,
            spicy = EXCLUDED.spicy
        "#,
    );

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

async fn upsert_branch_mirrors<'e, E>(executor: E, branches: &[&BranchMirror]) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    if branches.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO restaurant_branches (branch_code, branch_name, company) ");
    builder.push_values(branches.iter().copied(), |mut row, branch| {
        row.push_bind(&branch.branch_code)
            .push_bind(&branch.branch_name)
            .push("NULL");
    });
    builder.push(
        r#"
        ON CONFLICT (branch_code)
        DO UPDATE SET
            branch_name = EXCLUDED.branch_name,
            updated_at = NOW()
        "#,
    );

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

// O Postgres recusa um INSERT .. ON CONFLICT que atinja a mesma linha duas vezes.
fn last_wins<'a, T, K>(rows: Vec<&'a T>, key: impl Fn(&'a T) -> K) -> Vec<&'a T>
where
    K: Eq + Hash,
{
    let mut positions = HashMap::new();
    let mut unique: Vec<&'a T> = Vec::with_capacity(rows.len());
    for row in rows {
        match positions.entry(key(row)) {
            Entry::Occupied(slot) => unique[*slot.get()] = row,
            Entry::Vacant(slot) => {
                slot.insert(unique.len());
                unique.push(row);
            }
        }
    }
    unique
}

/// As operações de um chunk separadas por tabela, sem chaves repetidas
/// (a última ocorrência vence).
#[derive(Debug, Default)]
struct ChunkRows<'a> {
    groups: Vec<&'a CatalogGroup>,
    items: Vec<&'a CatalogItem>,
    branches: Vec<&'a BranchMirror>,
}

impl<'a> ChunkRows<'a> {
    fn from_ops(ops: &'a [UpsertOp]) -> Self {
        let mut rows = Self::default();
        for op in ops {
            match op {
                UpsertOp::Group(group) => rows.groups.push(group),
                UpsertOp::Item(item) => rows.items.push(item),
                UpsertOp::BranchMirror(branch) => rows.branches.push(branch),
            }
        }

        Self {
            groups: last_wins(rows.groups, |g| (g.itm_group_code.as_str(), g.branch_code.as_str())),
            items: last_wins(rows.items, |i| (i.itm_code.as_str(), i.branch_code.as_str())),
            branches: last_wins(rows.branches, |b| b.branch_code.as_str()),
        }
    }

    // Pais antes dos filhos: grupos, depois itens.
    async fn write(&self, conn: &mut PgConnection) -> Result<u64, (EntityKind, sqlx::Error)> {
        let groups = upsert_groups(&mut *conn, &self.groups)
            .await
            .map_err(|e| (EntityKind::Group, e))?;
        let items = upsert_items(&mut *conn, &self.items)
            .await
            .map_err(|e| (EntityKind::Item, e))?;
        let branches = upsert_branch_mirrors(&mut *conn, &self.branches)
            .await
            .map_err(|e| (EntityKind::BranchMirror, e))?;
        Ok(groups + items + branches)
    }
}

fn truncate_error(kind: EntityKind) -> impl FnOnce(sqlx::Error) -> SyncError {
    move |e| SyncError::Truncate {
        table: kind.table(),
        source: Box::new(SyncError::Target(e)),
    }
}

#[async_trait]
impl TargetStore for CatalogRepository {
    async fn upsert(&self, op: &UpsertOp) -> Result<u64, SyncError> {
        let rows = ChunkRows::from_ops(std::slice::from_ref(op));
        let mut conn = self.pool.acquire().await.map_err(SyncError::Target)?;
        rows.write(&mut *conn).await.map_err(|(_, e)| SyncError::Target(e))
    }

    async fn run_transaction(&self, ops: Vec<UpsertOp>) -> Result<u64, SyncError> {
        let rows = ChunkRows::from_ops(&ops);
        let mut tx = self.pool.begin().await.map_err(SyncError::Target)?;

        // Um erro aqui descarta `tx` sem commit: rollback do chunk inteiro.
        let affected = rows.write(&mut *tx).await.map_err(|(kind, e)| {
            tracing::error!(table = kind.table(), error = %e, "Upsert falhou, chunk desfeito");
            SyncError::Target(e)
        })?;

        tx.commit().await.map_err(SyncError::Target)?;
        Ok(affected)
    }

    async fn delete_all(&self, kinds: &[EntityKind]) -> Result<Vec<u64>, SyncError> {
        let (Some(&first), Some(&last)) = (kinds.first(), kinds.last()) else {
            return Ok(Vec::new());
        };

        let mut tx = self.pool.begin().await.map_err(truncate_error(first))?;
        let mut removed = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            let sql = format!("DELETE FROM {}", kind.table());
            let result = sqlx::query(&sql)
                .execute(&mut *tx)
                .await
                .map_err(truncate_error(kind))?;
            removed.push(result.rows_affected());
        }
        tx.commit().await.map_err(truncate_error(last))?;

        Ok(removed)
    }

    async fn upsert_location(&self, location: &LocationRecord) -> Result<LocationWrite, SyncError> {
        let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM locations WHERE name = $1 LIMIT 1")
            .bind(&location.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(SyncError::Target)?;

        match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE locations
                    SET name = $2, address = $3, city = $4, map_link = $5, working_hours = $6
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&location.name)
                .bind(&location.address)
                .bind(&location.city)
                .bind(&location.map_link)
                .bind(&location.working_hours)
                .execute(&self.pool)
                .await
                .map_err(SyncError::Target)?;
                Ok(LocationWrite::Updated(id))
            }
            None => {
                // Ordem e 24/7 ficam nulos; são definidos pelo painel.
                let id = sqlx::query_scalar::<_, Uuid>(
                    r#"
                    INSERT INTO locations (name, address, city, map_link, location_order, is_open_24_7, working_hours)
                    VALUES ($1, $2, $3, $4, NULL, NULL, $5)
                    RETURNING id
                    "#,
                )
                .bind(&location.name)
                .bind(&location.address)
                .bind(&location.city)
                .bind(&location.map_link)
                .bind(&location.working_hours)
                .fetch_one(&self.pool)
                .await
                .map_err(SyncError::Target)?;
                Ok(LocationWrite::Created(id))
            }
        }
    }
}
