use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use perspectivedb_primitives::DocId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes writes per `(tree, id)` (spec §5: "writes to the same id
/// are serialized; writes to different ids may proceed concurrently").
/// Grounded on `calimero-network-core`'s connection-pool idiom of a
/// `Mutex<HashMap<K, Arc<...>>>` registry handing out per-key guards
/// without holding the registry lock across the guarded work.
#[derive(Default)]
pub struct IdLockTable {
    locks: Mutex<HashMap<DocId, Arc<AsyncMutex<()>>>>,
}

impl IdLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Awaits exclusive access to `id`, cloning (or creating) its entry
    /// under a short-held `std::sync::Mutex` so the async wait itself
    /// never blocks other ids.
    pub async fn lock(&self, id: &DocId) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().expect("lock table poisoned");
            locks.entry(id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        entry.lock_owned().await
    }
}
