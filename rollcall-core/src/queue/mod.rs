//! Durable queue of scans waiting for server acknowledgment.
//!
//! The queue is an ordered sequence persisted as a JSON array in a single
//! [`StorageSlot`]. The slot is the only copy: every operation reads it, and
//! every mutation re-reads and writes it while holding the slot lock, so
//! several queues over the same slot (one per process) never overwrite each
//! other's entries. Order is kept but carries no meaning for replay.

pub mod slot;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::QueueError;
use crate::types::{EntryId, PendingSubmission};

pub use slot::{FileSlot, MemorySlot, QUEUE_SLOT, SlotGuard, StorageSlot};

/// Parse persisted queue contents. Blank contents are an empty queue.
pub fn decode_entries(raw: &str) -> Result<Vec<PendingSubmission>, QueueError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(QueueError::Corrupt)
}

/// Serialize queue contents. An empty queue encodes as `[]`.
pub fn encode_entries(entries: &[PendingSubmission]) -> Result<String, QueueError> {
    serde_json::to_string(entries).map_err(QueueError::Serialize)
}

/// Offline queue over one storage slot.
pub struct OfflineQueue {
    slot: Arc<dyn StorageSlot>,
    // Queues writers in this process before they contend for the slot lock.
    writer: Mutex<()>,
}

impl fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("slot", &self.slot.describe())
            .finish()
    }
}

impl OfflineQueue {
    pub fn new(slot: impl StorageSlot + 'static) -> Self {
        Self::with_slot(Arc::new(slot))
    }

    pub fn with_slot(slot: Arc<dyn StorageSlot>) -> Self {
        Self {
            slot,
            writer: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<PendingSubmission>, QueueError> {
        let entries = match self.slot.load().await? {
            Some(raw) => decode_entries(&raw)?,
            None => Vec::new(),
        };
        debug!(
            slot = %self.slot.describe(),
            count = entries.len(),
            "read offline queue"
        );
        Ok(entries)
    }

    async fn persist(&self, entries: &[PendingSubmission]) -> Result<(), QueueError> {
        let encoded = encode_entries(entries)?;
        self.slot.store(&encoded).await
    }

    /// Append an entry. Never deduplicates.
    pub async fn enqueue(&self, item: PendingSubmission) -> Result<(), QueueError> {
        let _local = self.writer.lock().await;
        let _slot = self.slot.lock().await?;

        let mut entries = self.load().await?;
        entries.push(item);
        self.persist(&entries).await?;

        info!(count = entries.len(), "scan saved to offline queue");
        Ok(())
    }

    /// Snapshot of every pending entry. Nothing is removed.
    pub async fn drain(&self) -> Result<Vec<PendingSubmission>, QueueError> {
        self.load().await
    }

    /// Remove exactly the given entries, leaving anything enqueued since the
    /// snapshot in place. Returns how many were removed.
    pub async fn remove(&self, ids: &[EntryId]) -> Result<usize, QueueError> {
        let _local = self.writer.lock().await;
        let _slot = self.slot.lock().await?;

        let entries = self.load().await?;
        let doomed: HashSet<EntryId> = ids.iter().copied().collect();
        let before = entries.len();
        let kept: Vec<PendingSubmission> = entries
            .into_iter()
            .filter(|entry| !doomed.contains(&entry.id))
            .collect();
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        self.persist(&kept).await?;
        Ok(removed)
    }

    /// Empty the queue unconditionally.
    ///
    /// Also recovers a slot holding unreadable data, so the current contents
    /// are only inspected for logging.
    pub async fn clear(&self) -> Result<(), QueueError> {
        let _local = self.writer.lock().await;
        let _slot = self.slot.lock().await?;

        let pending = self.load().await.map(|entries| entries.len());
        self.persist(&[]).await?;
        if !matches!(pending, Ok(0)) {
            warn!(pending = ?pending.ok(), "offline queue cleared with pending entries");
        }
        Ok(())
    }

    pub async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.load().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SectionId, UserId};

    fn item(token: &str) -> PendingSubmission {
        PendingSubmission::student_token(token, SectionId(1))
    }

    #[test]
    fn empty_queue_encodes_as_empty_array() {
        assert_eq!(encode_entries(&[]).unwrap(), "[]");
        assert!(decode_entries("[]").unwrap().is_empty());
        assert!(decode_entries("  ").unwrap().is_empty());
    }

    #[test]
    fn entries_round_trip_in_order() {
        let entries = vec![
            item("a"),
            PendingSubmission::lecture("LEC42", UserId(2), SectionId(7), None),
            item("a"),
        ];
        let decoded = decode_entries(&encode_entries(&entries).unwrap()).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn unreadable_contents_are_corrupt() {
        assert!(matches!(
            decode_entries("null"),
            Err(QueueError::Corrupt(_))
        ));
        assert!(matches!(
            decode_entries("{\"token\":1}"),
            Err(QueueError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn absent_slot_is_an_empty_queue() {
        let queue = OfflineQueue::new(MemorySlot::new());
        assert!(queue.is_empty().await.unwrap());
        assert!(queue.drain().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enqueue_keeps_duplicates_and_persists() {
        let slot = MemorySlot::new();
        let queue = OfflineQueue::new(slot.clone());

        queue.enqueue(item("ABC")).await.unwrap();
        queue.enqueue(item("ABC")).await.unwrap();

        assert_eq!(queue.len().await.unwrap(), 2);
        let persisted = decode_entries(&slot.contents().unwrap()).unwrap();
        assert_eq!(persisted.len(), 2);
        assert!(persisted.iter().all(|entry| entry.token == "ABC"));
    }

    #[tokio::test]
    async fn drain_does_not_remove() {
        let queue = OfflineQueue::new(MemorySlot::new());
        queue.enqueue(item("a")).await.unwrap();

        assert_eq!(queue.drain().await.unwrap().len(), 1);
        assert_eq!(queue.drain().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_spares_entries_added_after_snapshot() {
        let queue = OfflineQueue::new(MemorySlot::new());
        queue.enqueue(item("a")).await.unwrap();
        queue.enqueue(item("b")).await.unwrap();

        let snapshot = queue.drain().await.unwrap();
        queue.enqueue(item("late")).await.unwrap();

        let ids: Vec<EntryId> = snapshot.iter().map(|entry| entry.id).collect();
        assert_eq!(queue.remove(&ids).await.unwrap(), 2);

        let left = queue.drain().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].token, "late");
    }

    #[tokio::test]
    async fn failed_write_leaves_queue_unchanged() {
        let slot = MemorySlot::new();
        let queue = OfflineQueue::new(slot.clone());
        queue.enqueue(item("a")).await.unwrap();

        slot.set_fail_writes(true);
        assert!(queue.enqueue(item("b")).await.is_err());
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn corrupt_slot_blocks_writes_until_cleared() {
        let slot = MemorySlot::with_contents("not json");
        let queue = OfflineQueue::new(slot.clone());

        assert!(matches!(
            queue.enqueue(item("a")).await,
            Err(QueueError::Corrupt(_))
        ));
        assert_eq!(slot.contents().as_deref(), Some("not json"));

        queue.clear().await.unwrap();
        queue.enqueue(item("a")).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn queues_sharing_a_file_keep_each_others_entries() {
        let dir = tempfile::tempdir().unwrap();
        let station = OfflineQueue::new(FileSlot::new(dir.path(), QUEUE_SLOT));
        let one_shot = OfflineQueue::new(FileSlot::new(dir.path(), QUEUE_SLOT));

        assert!(station.is_empty().await.unwrap());
        one_shot.enqueue(item("X")).await.unwrap();
        station.enqueue(item("Y")).await.unwrap();

        let reloaded = OfflineQueue::new(FileSlot::new(dir.path(), QUEUE_SLOT));
        let tokens: Vec<String> = reloaded
            .drain()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.token)
            .collect();
        assert_eq!(tokens, ["X", "Y"]);
    }

    #[tokio::test]
    async fn clear_and_remove_from_another_queue_are_not_undone() {
        let dir = tempfile::tempdir().unwrap();
        let station = OfflineQueue::new(FileSlot::new(dir.path(), QUEUE_SLOT));
        let other = OfflineQueue::new(FileSlot::new(dir.path(), QUEUE_SLOT));

        station.enqueue(item("a")).await.unwrap();
        station.enqueue(item("b")).await.unwrap();

        let synced: Vec<EntryId> = other
            .drain()
            .await
            .unwrap()
            .iter()
            .map(|entry| entry.id)
            .collect();
        assert_eq!(other.remove(&synced).await.unwrap(), 2);

        station.enqueue(item("c")).await.unwrap();
        assert_eq!(station.len().await.unwrap(), 1);

        other.clear().await.unwrap();
        station.enqueue(item("d")).await.unwrap();
        let left = station.drain().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].token, "d");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_on_one_file_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let queues: Vec<Arc<OfflineQueue>> = (0..3)
            .map(|_| Arc::new(OfflineQueue::new(FileSlot::new(dir.path(), QUEUE_SLOT))))
            .collect();

        let mut tasks = Vec::new();
        for n in 0..24 {
            let queue = queues[n % queues.len()].clone();
            tasks.push(tokio::spawn(async move {
                queue.enqueue(item(&format!("t{n}"))).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(queues[0].len().await.unwrap(), 24);
    }

    #[tokio::test]
    async fn state_survives_a_new_queue_over_the_same_slot() {
        let slot = MemorySlot::new();
        {
            let queue = OfflineQueue::new(slot.clone());
            queue.enqueue(item("persisted")).await.unwrap();
        }

        let reloaded = OfflineQueue::new(slot);
        let entries = reloaded.drain().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].token, "persisted");
    }
}
