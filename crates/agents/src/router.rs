//! Routes each user action to a fixed partition so one user's actions are
//! always applied by the same worker, in delivery order.

use eventrank_core::types::{UserAction, UserId};
use tokio::sync::mpsc;
use tracing::error;

/// Partition index for `user`. Stable across calls; negative ids map into
/// range.
pub fn partition_for(user: UserId, partitions: usize) -> usize {
    if partitions == 0 {
        return 0;
    }
    user.rem_euclid(partitions as i64) as usize
}

#[derive(Clone)]
pub struct PartitionRouter {
    partitions: Vec<mpsc::Sender<UserAction>>,
}

impl PartitionRouter {
    /// Create `count` bounded partitions. Returns the router and one receiver
    /// per partition, in partition order.
    pub fn new(count: usize, capacity: usize) -> (Self, Vec<mpsc::Receiver<UserAction>>) {
        let count = count.max(1);
        let capacity = capacity.max(1);
        let (partitions, receivers) = (0..count).map(|_| mpsc::channel(capacity)).unzip();
        (Self { partitions }, receivers)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Hand `action` to its partition, waiting while the partition is full.
    /// Returns false if the partition's worker has stopped.
    pub async fn dispatch(&self, action: UserAction) -> bool {
        let index = partition_for(action.user_id, self.partitions.len());
        let user = action.user_id;
        match self.partitions[index].send(action).await {
            Ok(()) => true,
            Err(_) => {
                error!(user_id = user, partition = index, "Partition worker is gone");
                metrics::counter!("router.undeliverable").increment(1);
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eventrank_core::types::ActionKind;

    fn action(user: UserId, item: i64) -> UserAction {
        UserAction {
            user_id: user,
            event_id: item,
            action: ActionKind::View,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_partition_for() {
        assert_eq!(partition_for(0, 4), 0);
        assert_eq!(partition_for(5, 4), 1);
        assert_eq!(partition_for(-1, 4), 3);
        assert_eq!(partition_for(9, 0), 0);
    }

    #[tokio::test]
    async fn test_same_user_lands_on_same_partition_in_order() {
        let (router, mut receivers) = PartitionRouter::new(3, 16);
        assert_eq!(router.partition_count(), 3);

        for item in 0..5 {
            assert!(router.dispatch(action(7, item)).await);
        }
        assert!(router.dispatch(action(8, 100)).await);

        let partition = &mut receivers[partition_for(7, 3)];
        for item in 0..5 {
            let received = partition.recv().await.unwrap();
            assert_eq!(received.user_id, 7);
            assert_eq!(received.event_id, item);
        }
        let other = receivers[partition_for(8, 3)].recv().await.unwrap();
        assert_eq!(other.event_id, 100);
    }

    #[tokio::test]
    async fn test_dispatch_to_stopped_worker_fails() {
        let (router, receivers) = PartitionRouter::new(1, 1);
        drop(receivers);
        assert!(!router.dispatch(action(1, 1)).await);
    }
}
