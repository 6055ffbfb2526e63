//! The notification hub.
//!
//! Subscribers register a [`Filter`] and either a callback or a mailbox.
//! Each dispatched [`ChangeSet`] is narrowed per subscriber and delivered
//! only when something passes the filter. Mailboxes never block the
//! dispatcher: undelivered sets are merged so a slow reader sees the latest
//! state of every topic.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::change_set::ChangeSet;
use crate::filter::Filter;

/// Identifies one subscription on a hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

type Callback = Arc<dyn Fn(&ChangeSet) + Send + Sync>;

#[derive(Default)]
struct Mailbox {
    pending: Mutex<Option<ChangeSet>>,
    notify: Notify,
    /// The receiving [`Subscription`] was dropped.
    dropped: AtomicBool,
    /// The hub shut down; nothing more will arrive.
    closed: AtomicBool,
}

impl Mailbox {
    fn post(&self, set: ChangeSet) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.as_mut() {
            Some(existing) => existing.merge(set),
            None => *pending = Some(set),
        }
        drop(pending);
        self.notify.notify_one();
    }

    fn take(&self) -> Option<ChangeSet> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

#[derive(Clone)]
enum Sink {
    Callback(Callback),
    Mailbox(Arc<Mailbox>),
}

#[derive(Clone)]
struct Subscriber {
    filter: Filter,
    sink: Sink,
}

/// Receiving end of a mailbox subscription. Dropping it unsubscribes at the
/// next dispatch.
pub struct Subscription {
    id: SubscriptionId,
    mailbox: Arc<Mailbox>,
}

impl Subscription {
    /// The id to unsubscribe with.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next change set. Returns `None` once the hub has shut
    /// down and everything pending has been received.
    pub async fn recv(&mut self) -> Option<ChangeSet> {
        loop {
            if let Some(set) = self.mailbox.take() {
                return Some(set);
            }
            if self.mailbox.closed.load(Ordering::Acquire) {
                return None;
            }
            self.mailbox.notify.notified().await;
        }
    }

    /// Everything delivered so far, merged, without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeSet> {
        self.mailbox.take()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.mailbox.dropped.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Subscribers that received a non-empty view.
    pub delivered: usize,
    /// Subscribers whose filter accepted nothing.
    pub filtered_out: usize,
    /// Callbacks that panicked.
    pub failed: usize,
    /// Dropped mailbox subscriptions removed during this dispatch.
    pub pruned: usize,
}

/// Fans change sets out to subscribers.
#[derive(Default)]
pub struct NotificationHub {
    subscribers: DashMap<SubscriptionId, Subscriber>,
}

impl NotificationHub {
    /// A hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. It runs on the dispatching task and must not
    /// block.
    pub fn subscribe(
        &self,
        filter: Filter,
        callback: impl Fn(&ChangeSet) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.subscribers.insert(
            id,
            Subscriber {
                filter,
                sink: Sink::Callback(Arc::new(callback)),
            },
        );
        debug!(subscription = %id, "callback subscribed");
        id
    }

    /// Register a mailbox subscription for async consumers.
    pub fn subscribe_channel(&self, filter: Filter) -> Subscription {
        let id = SubscriptionId::new();
        let mailbox = Arc::new(Mailbox::default());
        self.subscribers.insert(
            id,
            Subscriber {
                filter,
                sink: Sink::Mailbox(Arc::clone(&mailbox)),
            },
        );
        debug!(subscription = %id, "mailbox subscribed");
        Subscription { id, mailbox }
    }

    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.subscribers.remove(&id) {
            Some((_, subscriber)) => {
                if let Sink::Mailbox(mailbox) = subscriber.sink {
                    mailbox.close();
                }
                debug!(subscription = %id, "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns `true` if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `set` to every subscriber whose filter accepts part of it.
    /// Delivery happens outside the subscriber table's locks, so callbacks
    /// may subscribe or unsubscribe.
    pub fn dispatch(&self, set: &ChangeSet) -> DispatchReport {
        let mut report = DispatchReport::default();
        if set.is_empty() {
            return report;
        }
        let targets: Vec<(SubscriptionId, Subscriber)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (id, subscriber) in targets {
            if let Sink::Mailbox(mailbox) = &subscriber.sink {
                if mailbox.dropped.load(Ordering::Acquire) {
                    self.subscribers.remove(&id);
                    report.pruned += 1;
                    continue;
                }
            }
            let view = subscriber.filter.apply(set);
            if view.is_empty() {
                report.filtered_out += 1;
                continue;
            }
            match subscriber.sink {
                Sink::Callback(callback) => {
                    if catch_unwind(AssertUnwindSafe(|| callback(&view))).is_err() {
                        error!(subscription = %id, tick_id = set.tick, "notification callback panicked");
                        report.failed += 1;
                        continue;
                    }
                }
                Sink::Mailbox(mailbox) => mailbox.post(view),
            }
            report.delivered += 1;
        }
        trace!(
            tick_id = set.tick,
            records = set.len(),
            delivered = report.delivered,
            "change set dispatched"
        );
        report
    }

    /// Drop every subscriber. Mailbox readers drain what is pending and then
    /// see the end of the stream.
    pub fn close(&self) {
        let ids: Vec<SubscriptionId> = self.subscribers.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.unsubscribe(id);
        }
    }

    /// Deliver change sets from `rx` on a background task until the sender
    /// side is dropped.
    pub fn spawn_dispatcher(self: Arc<Self>, mut rx: mpsc::Receiver<ChangeSet>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(set) = rx.recv().await {
                self.dispatch(&set);
            }
            debug!("notification dispatcher stopped");
        })
    }
}
