// src/services.rs

pub mod group_sync;
pub mod hierarchy;
pub mod item_sync;
pub mod location_sync;
pub mod normalizer;
pub mod orchestrator;
pub mod scheduler;
pub mod upsert;

#[cfg(test)]
pub mod testing;

pub use orchestrator::SyncOrchestrator;
