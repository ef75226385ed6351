use std::sync::Arc;

use tracing::{error, warn};

use crate::store::DocumentStore;

/// Idempotency guard over the global processed-update set.
///
/// Callers must check `has_processed` before doing any side-effecting work
/// for an update, and call `mark_processed` before dispatching its actual
/// processing — marking first closes the race where two concurrent
/// deliveries both pass the check. The crash window between marking and
/// completing is an accepted tradeoff; marking after processing would
/// reopen the duplicate-delivery race under transport retries.
pub struct UpdateGuard {
    store: Arc<dyn DocumentStore>,
}

impl UpdateGuard {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Whether this update id has already been handled. A failed existence
    /// check counts as "not processed": a duplicate reply beats a silently
    /// dropped message.
    pub async fn has_processed(&self, update_id: i64) -> bool {
        match self.store.has_processed_update(update_id).await {
            Ok(seen) => seen,
            Err(e) => {
                error!(update_id, "processed-update check failed, assuming new: {e}");
                false
            }
        }
    }

    pub async fn mark_processed(&self, update_id: i64) {
        if let Err(e) = self.store.mark_update_processed(update_id).await {
            warn!(update_id, "could not record processed update: {e}");
        }
    }
}
