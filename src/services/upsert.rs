// src/services/upsert.rs

use crate::{
    common::error::SyncError,
    db::{TargetStore, UpsertOp},
};

/// Grava os registros em chunks de `chunk_size`, um chunk por transação.
///
/// Os chunks rodam em sequência. O primeiro chunk que falhar é desfeito por
/// inteiro e interrompe os seguintes; os já confirmados permanecem.
pub async fn chunked_upsert<T>(
    store: &dyn TargetStore,
    records: Vec<T>,
    chunk_size: usize,
) -> Result<u64, SyncError>
where
    T: Into<UpsertOp>,
{
    let chunk_size = chunk_size.max(1);
    let mut ops: Vec<UpsertOp> = records.into_iter().map(Into::into).collect();
    let mut affected = 0;

    while !ops.is_empty() {
        let rest = ops.split_off(chunk_size.min(ops.len()));
        affected += store.run_transaction(std::mem::replace(&mut ops, rest)).await?;
    }

    Ok(affected)
}
