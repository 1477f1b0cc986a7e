// src/db.rs

pub mod erp_repo;
pub use erp_repo::{CatalogSource, ErpRepository, PgSourceReader};
pub mod catalog_repo;
pub use catalog_repo::{CatalogRepository, CategoryFilter, EntityKind, TargetStore, UpsertOp};
