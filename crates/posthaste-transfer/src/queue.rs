//! Bounded work queue with producer-counted termination.
//!
//! Consumers see the queue as finished only when every [`Producer`] handle
//! has been dropped *and* the queue is empty. An empty queue with a live
//! producer suspends consumers instead of ending them, so a slow listing
//! page never causes workers to exit early.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

struct State<T> {
    items: VecDeque<T>,
    producers: usize,
}

/// FIFO of pending work shared by producers and workers.
pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    item_ready: Notify,
    space_ready: Notify,
}

impl<T> WorkQueue<T> {
    /// Create a queue holding at most `capacity` items, plus its first producer.
    pub fn new(capacity: usize) -> (Arc<Self>, Producer<T>) {
        let queue = Arc::new(Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                producers: 1,
            }),
            capacity: capacity.max(1),
            item_ready: Notify::new(),
            space_ready: Notify::new(),
        });
        let producer = Producer {
            queue: queue.clone(),
        };
        (queue, producer)
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the next item, waiting while producers are still active.
    ///
    /// Returns `None` once all producers are gone and the queue is drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let mut notified = pin!(self.item_ready.notified());
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    drop(state);
                    self.space_ready.notify_one();
                    return Some(item);
                }
                if state.producers == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every producer has finished.
    pub fn is_closed(&self) -> bool {
        self.lock().producers == 0
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Handle that keeps a [`WorkQueue`] open.
///
/// Cloning registers another producer; dropping the last handle closes the
/// queue and wakes every waiting consumer.
pub struct Producer<T> {
    queue: Arc<WorkQueue<T>>,
}

impl<T> Producer<T> {
    /// Enqueue an item, waiting while the queue is at capacity.
    pub async fn push(&self, item: T) {
        let queue = &self.queue;
        loop {
            let mut notified = pin!(queue.space_ready.notified());
            notified.as_mut().enable();

            {
                let mut state = queue.lock();
                if state.items.len() < queue.capacity {
                    state.items.push_back(item);
                    drop(state);
                    queue.item_ready.notify_one();
                    return;
                }
            }

            notified.await;
        }
    }

    /// Current queue depth.
    pub fn depth(&self) -> usize {
        self.queue.len()
    }

    /// The queue this handle feeds.
    pub fn queue(&self) -> &Arc<WorkQueue<T>> {
        &self.queue
    }
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        self.queue.lock().producers += 1;
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        let remaining = {
            let mut state = self.queue.lock();
            state.producers -= 1;
            state.producers
        };
        if remaining == 0 {
            self.queue.item_ready.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_then_closed() {
        let (queue, producer) = WorkQueue::new(10);
        producer.push(1).await;
        producer.push(2).await;
        drop(producer);

        assert!(queue.is_closed());
        assert_eq!(queue.pop().await, Some(1));
        assert_eq!(queue.pop().await, Some(2));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn test_empty_queue_with_live_producer_waits() {
        let (queue, producer) = WorkQueue::<u32>::new(10);

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        producer.push(7).await;
        assert_eq!(consumer.await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_last_producer_drop_wakes_consumers() {
        let (queue, producer) = WorkQueue::<u32>::new(10);
        let second = producer.clone();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.pop().await })
            })
            .collect();

        drop(producer);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!queue.is_closed());

        drop(second);
        for consumer in consumers {
            assert_eq!(consumer.await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_push_waits_for_space() {
        let (queue, producer) = WorkQueue::new(2);
        producer.push(1).await;
        producer.push(2).await;

        let blocked = tokio::spawn(async move {
            producer.push(3).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().await, Some(1));
        blocked.await.unwrap();
        assert_eq!(queue.len(), 2);
    }
}
