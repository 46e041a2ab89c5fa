// ── Status subscriptions ──
//
// Receiving side of a `NotificationHub` registration.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::hub::SubscriberToken;
use crate::model::ManagerStatus;

/// A registration with the notification hub.
///
/// Receives each published composite status in order. Dropping it
/// unregisters the subscriber on the next publish.
pub struct Subscription {
    token: SubscriberToken,
    rx: mpsc::Receiver<ManagerStatus>,
}

impl Subscription {
    pub(crate) fn new(token: SubscriberToken, rx: mpsc::Receiver<ManagerStatus>) -> Self {
        Self { token, rx }
    }

    /// Token to pass to `unsubscribe`.
    pub fn token(&self) -> SubscriberToken {
        self.token
    }

    /// Wait for the next status. Returns `None` once unsubscribed (or
    /// dropped by the hub) and the buffer is drained.
    pub async fn recv(&mut self) -> Option<ManagerStatus> {
        self.rx.recv().await
    }

    /// Take a buffered status without waiting.
    pub fn try_recv(&mut self) -> Option<ManagerStatus> {
        self.rx.try_recv().ok()
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> StatusStream {
        StatusStream {
            token: self.token,
            inner: ReceiverStream::new(self.rx),
        }
    }
}

/// `Stream` adapter over a [`Subscription`].
pub struct StatusStream {
    token: SubscriberToken,
    inner: ReceiverStream<ManagerStatus>,
}

impl StatusStream {
    pub fn token(&self) -> SubscriberToken {
        self.token
    }
}

impl Stream for StatusStream {
    type Item = ManagerStatus;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
