// src/services/testing.rs
//
// Dublês em memória para os testes dos serviços de sincronização.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::SyncError,
    db::{catalog_repo::LocationWrite, CatalogSource, EntityKind, TargetStore, UpsertOp},
    models::catalog::{
        BranchRef, CatalogGroup, CatalogItem, LocationRecord, RawBranchRow, RawGroupRow, RawItemRow,
    },
};

fn source_error(message: impl Into<String>) -> SyncError {
    SyncError::Source(sqlx::Error::Protocol(message.into()))
}

fn target_error(message: impl Into<String>) -> SyncError {
    SyncError::Target(sqlx::Error::Protocol(message.into()))
}

// ---
// Helpers de construção
// ---
pub fn group_row(code: &str, parent: Option<&str>) -> RawGroupRow {
    RawGroupRow {
        group_code: Some(code.to_string()),
        group_name: Some(format!("Group {code}")),
        parent_group_code: parent.map(str::to_string),
        ..Default::default()
    }
}

pub fn item_row(code: &str, group: &str) -> RawItemRow {
    RawItemRow {
        item_code: Some(code.to_string()),
        item_name: Some(format!("Item {code}")),
        group_code: Some(group.to_string()),
        ..Default::default()
    }
}

pub fn group(code: &str, branch_code: &str) -> CatalogGroup {
    CatalogGroup {
        itm_group_code: code.to_string(),
        branch_code: branch_code.to_string(),
        itm_group_name: format!("Group {code}"),
        order_group: None,
        show_in_website: None,
        saleable: None,
        website_name_en: String::new(),
        website_name_ar: String::new(),
        website_description_en: String::new(),
        website_description_ar: String::new(),
        parent_group_code: code.to_string(),
        nested_level: 1,
        path: code.to_string(),
    }
}

pub fn branch(code: &str, name: &str) -> BranchRef {
    BranchRef {
        code: code.to_string(),
        name: name.to_string(),
    }
}

// ---
// FakeCatalogSource
// ---
#[derive(Default)]
pub struct FakeCatalogSource {
    groups: Mutex<HashMap<String, Vec<RawGroupRow>>>,
    items: Mutex<HashMap<String, Vec<RawItemRow>>>,
    branches: Mutex<Vec<BranchRef>>,
    profiles: Mutex<HashMap<String, RawBranchRow>>,
    failing_groups: Mutex<HashSet<String>>,
    failing_items: Mutex<HashSet<String>>,
    failing_profiles: Mutex<HashSet<String>>,
    failing_discovery: AtomicBool,
    page_requests: Mutex<Vec<(String, u64, u64)>>,
}

impl FakeCatalogSource {
    pub fn with_groups(self, branch_code: &str, rows: Vec<RawGroupRow>) -> Self {
        self.groups.lock().unwrap().insert(branch_code.to_string(), rows);
        self
    }

    pub fn with_items(self, branch_code: &str, rows: Vec<RawItemRow>) -> Self {
        self.items.lock().unwrap().insert(branch_code.to_string(), rows);
        self
    }

    pub fn with_branches(self, branches: Vec<BranchRef>) -> Self {
        *self.branches.lock().unwrap() = branches;
        self
    }

    pub fn with_profile(self, branch_code: &str, name: &str) -> Self {
        self.profiles.lock().unwrap().insert(
            branch_code.to_string(),
            RawBranchRow {
                branch_code: Some(branch_code.to_string()),
                branch_name: Some(name.to_string()),
            },
        );
        self
    }

    pub fn fail_groups(&self, branch_code: &str) {
        self.failing_groups.lock().unwrap().insert(branch_code.to_string());
    }

    pub fn fail_items(&self, branch_code: &str) {
        self.failing_items.lock().unwrap().insert(branch_code.to_string());
    }

    pub fn fail_profile(&self, branch_code: &str) {
        self.failing_profiles.lock().unwrap().insert(branch_code.to_string());
    }

    pub fn fail_discovery(&self) {
        self.failing_discovery.store(true, Ordering::SeqCst);
    }

    /// (filial, offset, limit) de cada página pedida, em ordem.
    pub fn page_requests(&self) -> Vec<(String, u64, u64)> {
        self.page_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogSource for FakeCatalogSource {
    async fn fetch_groups(&self, branch_code: &str) -> Result<Vec<RawGroupRow>, SyncError> {
        if self.failing_groups.lock().unwrap().contains(branch_code) {
            return Err(source_error("connection reset by peer"));
        }
        Ok(self.groups.lock().unwrap().get(branch_code).cloned().unwrap_or_default())
    }

    async fn fetch_valid_group_codes(&self, branch_code: &str) -> Result<HashSet<String>, SyncError> {
        Ok(self
            .groups
            .lock()
            .unwrap()
            .get(branch_code)
            .into_iter()
            .flatten()
            .filter_map(|row| row.group_code.as_deref())
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
        self.page_requests
            .lock()
            .unwrap()
            .push((branch_code.to_string(), offset, limit));
        if self.failing_items.lock().unwrap().contains(branch_code) {
            return Err(source_error("timeout reading INV_ITEM_MASTER"));
        }
        let items = self.items.lock().unwrap();
        let rows = items.get(branch_code).map(Vec::as_slice).unwrap_or_default();
        Ok(rows
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_active_branches(&self) -> Result<Vec<BranchRef>, SyncError> {
        if self.failing_discovery.load(Ordering::SeqCst) {
            return Err(source_error("login failed"));
        }
        Ok(self.branches.lock().unwrap().clone())
    }

    async fn fetch_branch_profile(&self, branch_code: &str) -> Result<Option<RawBranchRow>, SyncError> {
        if self.failing_profiles.lock().unwrap().contains(branch_code) {
            return Err(source_error("SYS_COMPANY_BRANCHES unavailable"));
        }
        Ok(self.profiles.lock().unwrap().get(branch_code).cloned())
    }
}

// ---
// FakeTargetStore
// ---
type RowKey = (EntityKind, String, String);

fn row_key(op: &UpsertOp) -> RowKey {
    match op {
        UpsertOp::Group(g) => (EntityKind::Group, g.itm_group_code.clone(), g.branch_code.clone()),
        UpsertOp::Item(i) => (EntityKind::Item, i.itm_code.clone(), i.branch_code.clone()),
        UpsertOp::BranchMirror(b) => (EntityKind::BranchMirror, b.branch_code.clone(), String::new()),
    }
}

#[derive(Default)]
pub struct FakeTargetStore {
    rows: Mutex<BTreeMap<RowKey, UpsertOp>>,
    locations: Mutex<Vec<(Uuid, LocationRecord)>>,
    transactions: Mutex<Vec<usize>>,
    failing_transaction: AtomicUsize,
    failing_deletes: Mutex<HashSet<EntityKind>>,
    failing_mirror_codes: Mutex<HashSet<String>>,
    failing_locations: AtomicBool,
    deletes: Mutex<Vec<EntityKind>>,
}

impl FakeTargetStore {
    /// Faz a n-ésima transação (1-based) falhar sem aplicar nada.
    pub fn fail_transaction_number(&self, n: usize) {
        self.failing_transaction.store(n, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, kind: EntityKind) {
        self.failing_deletes.lock().unwrap().insert(kind);
    }

    pub fn fail_mirror_for(&self, branch_code: &str) {
        self.failing_mirror_codes.lock().unwrap().insert(branch_code.to_string());
    }

    pub fn fail_locations(&self) {
        self.failing_locations.store(true, Ordering::SeqCst);
    }

    pub fn transaction_sizes(&self) -> Vec<usize> {
        self.transactions.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<EntityKind> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn count(&self, kind: EntityKind, branch_code: &str) -> usize {
        self.rows
            .lock()
            .unwrap()
            .keys()
            .filter(|(k, _, b)| *k == kind && b == branch_code)
            .count()
    }

    pub fn total_rows(&self) -> usize {
        self.rows.lock().unwrap().len() + self.locations.lock().unwrap().len()
    }

    pub fn group(&self, code: &str, branch_code: &str) -> Option<CatalogGroup> {
        let key = (EntityKind::Group, code.to_string(), branch_code.to_string());
        match self.rows.lock().unwrap().get(&key) {
            Some(UpsertOp::Group(g)) => Some(g.clone()),
            _ => None,
        }
    }

    pub fn item(&self, code: &str, branch_code: &str) -> Option<CatalogItem> {
        let key = (EntityKind::Item, code.to_string(), branch_code.to_string());
        match self.rows.lock().unwrap().get(&key) {
            Some(UpsertOp::Item(i)) => Some(i.clone()),
            _ => None,
        }
    }

    pub fn mirrored_branches(&self) -> Vec<String> {
        self.rows
            .lock()
            .unwrap()
            .keys()
            .filter(|(k, _, _)| *k == EntityKind::BranchMirror)
            .map(|(_, code, _)| code.clone())
            .collect()
    }

    pub fn locations(&self) -> Vec<LocationRecord> {
        self.locations
            .lock()
            .unwrap()
            .iter()
            .map(|(_, l)| l.clone())
            .collect()
    }

    pub fn seed(&self, op: UpsertOp) {
        self.rows.lock().unwrap().insert(row_key(&op), op);
    }

    // Aplica uma operação num mapa, com a checagem de FK item -> grupo.
    fn apply(rows: &mut BTreeMap<RowKey, UpsertOp>, op: UpsertOp) -> Result<u64, SyncError> {
        if let UpsertOp::Item(item) = &op {
            if let Some(group_code) = &item.itm_group_code {
                let parent = (EntityKind::Group, group_code.clone(), item.branch_code.clone());
                if !rows.contains_key(&parent) {
                    return Err(target_error(format!(
                        "foreign key violation: group {group_code} not found"
                    )));
                }
            }
        }
        rows.insert(row_key(&op), op);
        Ok(1)
    }

    fn check_mirror(&self, op: &UpsertOp) -> Result<(), SyncError> {
        if let UpsertOp::BranchMirror(b) = op {
            if self.failing_mirror_codes.lock().unwrap().contains(&b.branch_code) {
                return Err(target_error("relation \"restaurant_branches\" is locked"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TargetStore for FakeTargetStore {
    async fn upsert(&self, op: &UpsertOp) -> Result<u64, SyncError> {
        self.check_mirror(op)?;
        Self::apply(&mut self.rows.lock().unwrap(), op.clone())
    }

    async fn run_transaction(&self, ops: Vec<UpsertOp>) -> Result<u64, SyncError> {
        let number = {
            let mut transactions = self.transactions.lock().unwrap();
            transactions.push(ops.len());
            transactions.len()
        };
        if self.failing_transaction.load(Ordering::SeqCst) == number {
            return Err(target_error("deadlock detected"));
        }

        let mut rows = self.rows.lock().unwrap();
        let mut staged = rows.clone();
        let mut affected = 0;
        for op in ops {
            self.check_mirror(&op)?;
            affected += Self::apply(&mut staged, op)?;
        }
        *rows = staged;
        Ok(affected)
    }

    async fn delete_all(&self, kinds: &[EntityKind]) -> Result<Vec<u64>, SyncError> {
        // Tudo ou nada, como a transação real.
        let failing = self.failing_deletes.lock().unwrap();
        if let Some(kind) = kinds.iter().find(|kind| failing.contains(*kind)) {
            return Err(SyncError::Truncate {
                table: kind.table(),
                source: Box::new(target_error(format!("permission denied for table {}", kind.table()))),
            });
        }

        let mut rows = self.rows.lock().unwrap();
        let mut locations = self.locations.lock().unwrap();
        let mut removed = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            if kind == EntityKind::Location {
                removed.push(locations.len() as u64);
                locations.clear();
            } else {
                let before = rows.len();
                rows.retain(|(k, _, _), _| *k != kind);
                removed.push((before - rows.len()) as u64);
            }
        }
        self.deletes.lock().unwrap().extend_from_slice(kinds);
        Ok(removed)
    }

    async fn upsert_location(&self, location: &LocationRecord) -> Result<LocationWrite, SyncError> {
        if self.failing_locations.load(Ordering::SeqCst) {
            return Err(target_error("relation \"locations\" does not exist"));
        }
        let mut locations = self.locations.lock().unwrap();
        if let Some((id, existing)) = locations.iter_mut().find(|(_, l)| l.name == location.name) {
            *existing = location.clone();
            return Ok(LocationWrite::Updated(*id));
        }
        let id = Uuid::new_v4();
        locations.push((id, location.clone()));
        Ok(LocationWrite::Created(id))
    }
}
