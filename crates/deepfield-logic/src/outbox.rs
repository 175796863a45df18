//! Post-commit notification handoff.
//!
//! A successful commit only enqueues a message. Delivery happens later in
//! [`NotificationOutbox::dispatch`], whose failures are logged and dropped so
//! they can never affect the deployment that produced them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::store::{NotificationSink, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNotification {
    pub user: UserId,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationOutbox {
    queue: VecDeque<PendingNotification>,
}

impl NotificationOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, notification: PendingNotification) {
        self.queue.push_back(notification);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingNotification> {
        self.queue.iter()
    }

    /// Deliver everything queued. Failed deliveries are not retried.
    pub fn dispatch<S: NotificationSink + ?Sized>(&mut self, sink: &mut S) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        while let Some(n) = self.queue.pop_front() {
            match sink.notify(&n.user, &n.title, &n.body) {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    log::warn!("dropping notification {:?} for {}: {}", n.title, n.user, e);
                    summary.dropped += 1;
                }
            }
        }
        summary
    }
}
