use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Serializes chat turns per user. Turns of different users never wait on
/// each other; a second turn of the same user waits until the first one has
/// released its guard.
#[derive(Default)]
pub struct TurnLocks {
    inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl TurnLocks {
    pub async fn acquire(&self, user_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Only the map holds these: nobody owns or waits on them.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(user_id).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
