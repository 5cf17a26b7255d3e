//! Bridge from publishers into async streams.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{Error, Result};
use crate::sinks::subscribe_edge;
use crate::subscription::{SubscribeConfig, Subscription};
use crate::traits::{Publisher, Subscriber};

/// A subscription consumed as a [`Stream`] of results.
///
/// Values arrive as `Ok`, an error as a final `Err`, and the stream ends
/// after the terminal signal. Dropping the stream cancels the subscription.
pub struct SignalStream<T> {
    inner: UnboundedReceiverStream<Result<T>>,
    subscription: Subscription,
}

impl<T: Send + 'static> SignalStream<T> {
    pub(crate) fn new<P>(publisher: &P) -> Self
    where
        P: Publisher<Item = T> + ?Sized,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = subscribe_edge(
            publisher,
            Box::new(ChannelSubscriber { tx: Some(tx) }),
            SubscribeConfig::default(),
        );
        Self {
            inner: UnboundedReceiverStream::new(rx),
            subscription,
        }
    }
}

impl<T> SignalStream<T> {
    /// The subscription feeding this stream
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl<T> Stream for SignalStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> Drop for SignalStream<T> {
    fn drop(&mut self) {
        self.subscription.cancel();
    }
}

struct ChannelSubscriber<T> {
    tx: Option<mpsc::UnboundedSender<Result<T>>>,
}

impl<T: Send> Subscriber<T> for ChannelSubscriber<T> {
    fn on_next(&mut self, value: T) {
        if let Some(tx) = &self.tx {
            // A closed channel means the stream is being dropped.
            let _ = tx.send(Ok(value));
        }
    }

    fn on_error(&mut self, error: Error) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(error));
        }
    }

    fn on_complete(&mut self) {
        self.tx.take();
    }
}
