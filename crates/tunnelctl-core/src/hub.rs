// ── Status notification hub ──
//
// Typed publish/subscribe for composite status changes. The hub holds
// only the sending half of each subscriber's bounded channel; dropping a
// `Subscription` unregisters it on the next publish.
//
// Back-pressure policy: `publish` never waits. A subscriber whose buffer
// is full misses that delivery, and after `max_missed` consecutive misses
// it is dropped. A successful delivery resets the count.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::model::ManagerStatus;
use crate::stream::Subscription;

/// Opaque registration handle for one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberToken(u64);

impl fmt::Display for SubscriberToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What happened to one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Subscribers that missed this delivery but stay registered.
    pub missed: usize,
    /// Subscribers unregistered during this publish (closed or over budget).
    pub dropped: usize,
}

struct Subscriber {
    tx: mpsc::Sender<ManagerStatus>,
    missed: u32,
}

pub struct NotificationHub {
    subscribers: DashMap<SubscriberToken, Subscriber>,
    next_token: AtomicU64,
    buffer: usize,
    max_missed: u32,
}

impl NotificationHub {
    /// `buffer` and `max_missed` are clamped to at least 1.
    pub fn new(buffer: usize, max_missed: u32) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_token: AtomicU64::new(1),
            buffer: buffer.max(1),
            max_missed: max_missed.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let token = SubscriberToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers.insert(token, Subscriber { tx, missed: 0 });
        debug!(%token, "subscriber registered");
        Subscription::new(token, rx)
    }

    /// Returns `false` if the token was not (or no longer) registered.
    pub fn unsubscribe(&self, token: SubscriberToken) -> bool {
        let removed = self.subscribers.remove(&token).is_some();
        if removed {
            debug!(%token, "subscriber unregistered");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Fan `status` out to every subscriber without waiting on any of them.
    pub fn publish(&self, status: ManagerStatus) -> PublishReport {
        let max_missed = self.max_missed;
        let mut report = PublishReport::default();

        self.subscribers
            .retain(|token, sub| match sub.tx.try_send(status) {
                Ok(()) => {
                    sub.missed = 0;
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    sub.missed += 1;
                    if sub.missed >= max_missed {
                        warn!(%token, missed = sub.missed, "dropping unresponsive subscriber");
                        report.dropped += 1;
                        false
                    } else {
                        report.missed += 1;
                        true
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%token, "subscriber went away");
                    report.dropped += 1;
                    false
                }
            });

        report
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_SUBSCRIBER_BUFFER,
            crate::config::DEFAULT_MAX_MISSED_DELIVERIES,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_publish_order() {
        let hub = NotificationHub::new(8, 2);
        let mut sub = hub.subscribe();

        hub.publish(ManagerStatus::Connecting);
        hub.publish(ManagerStatus::Connected);

        assert_eq!(sub.try_recv(), Some(ManagerStatus::Connecting));
        assert_eq!(sub.try_recv(), Some(ManagerStatus::Connected));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn fans_out_to_every_subscriber() {
        let hub = NotificationHub::new(8, 2);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_ne!(a.token(), b.token());

        let report = hub.publish(ManagerStatus::Restarting);
        assert_eq!(report.delivered, 2);
        assert_eq!(a.try_recv(), Some(ManagerStatus::Restarting));
        assert_eq!(b.try_recv(), Some(ManagerStatus::Restarting));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub = NotificationHub::new(8, 2);
        let sub = hub.subscribe();
        assert!(hub.unsubscribe(sub.token()));
        assert!(!hub.unsubscribe(sub.token()));
        assert_eq!(hub.publish(ManagerStatus::Connected), PublishReport::default());
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let hub = NotificationHub::new(8, 2);
        drop(hub.subscribe());
        let report = hub.publish(ManagerStatus::Connected);
        assert_eq!(report.dropped, 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn full_subscriber_is_dropped_after_miss_budget() {
        let hub = NotificationHub::new(1, 2);
        let _stalled = hub.subscribe();

        // Fills the one-slot buffer.
        assert_eq!(hub.publish(ManagerStatus::Connecting).delivered, 1);
        // First miss: kept.
        assert_eq!(hub.publish(ManagerStatus::Connected).missed, 1);
        assert_eq!(hub.subscriber_count(), 1);
        // Second consecutive miss: dropped.
        assert_eq!(hub.publish(ManagerStatus::Disconnecting).dropped, 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn draining_resets_the_miss_count() {
        let hub = NotificationHub::new(1, 2);
        let mut sub = hub.subscribe();

        hub.publish(ManagerStatus::Connecting);
        assert_eq!(hub.publish(ManagerStatus::Connected).missed, 1);

        assert_eq!(sub.try_recv(), Some(ManagerStatus::Connecting));
        assert_eq!(hub.publish(ManagerStatus::Reasserting).delivered, 1);
        // Full again, but the budget restarted after the delivery above.
        assert_eq!(hub.publish(ManagerStatus::Connected).missed, 1);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn stalled_subscriber_does_not_starve_a_healthy_one() {
        let hub = NotificationHub::new(1, 3);
        let _stalled = hub.subscribe();
        let mut healthy = hub.subscribe();

        for status in [
            ManagerStatus::Connecting,
            ManagerStatus::Connected,
            ManagerStatus::Reasserting,
            ManagerStatus::Connected,
        ] {
            hub.publish(status);
            assert_eq!(healthy.try_recv(), Some(status));
        }
        assert_eq!(hub.subscriber_count(), 1);
    }
}
