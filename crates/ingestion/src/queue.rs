//! Unbounded FIFO queue

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// Growable FIFO of pending items
///
/// `push` never blocks and never fails; there is no maximum size.
/// `len` is a lock-free read, safe to call from a monitoring task while
/// another task pushes and pops.
#[derive(Debug)]
pub struct Queue<T> {
    items: Mutex<VecDeque<T>>,
    len: AtomicUsize,
    available: Notify,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            len: AtomicUsize::new(0),
            available: Notify::new(),
        }
    }

    /// Append an item at the back
    pub fn push(&self, item: T) {
        let mut items = self.lock();
        items.push_back(item);
        self.len.store(items.len(), Ordering::Release);
        drop(items);
        self.available.notify_one();
    }

    /// Remove the front item if there is one
    pub fn try_pop(&self) -> Option<T> {
        let mut items = self.lock();
        let item = items.pop_front();
        self.len.store(items.len(), Ordering::Release);
        item
    }

    /// Remove the front item, waiting until one is available
    pub async fn pop(&self) -> T {
        loop {
            let notified = self.available.notified();
            if let Some(item) = self.try_pop() {
                return item;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
