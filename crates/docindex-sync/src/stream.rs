//! Stream adapters for the progress read models.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;

/// Rate-limits a stream to one item per interval, leading and trailing.
///
/// The first item passes through immediately; items arriving during the
/// cooldown are coalesced to the latest one, which is emitted when the
/// cooldown expires. Bounds UI update pressure without losing the final
/// state.
pub struct Throttle<S: Stream> {
    stream: S,
    interval: Duration,
    cooldown: Option<Pin<Box<tokio::time::Sleep>>>,
    pending: Option<S::Item>,
    done: bool,
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, interval: Duration) -> Self {
        Self {
            stream,
            interval,
            cooldown: None,
            pending: None,
            done: false,
        }
    }
}

impl<S: Stream + Unpin> Stream for Throttle<S>
where
    S::Item: Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
        let this = self.get_mut();

        // Drain the source, keeping only the latest item.
        while !this.done {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => this.pending = Some(item),
                Poll::Ready(None) => this.done = true,
                Poll::Pending => break,
            }
        }

        if let Some(cooldown) = this.cooldown.as_mut() {
            match cooldown.as_mut().poll(cx) {
                Poll::Ready(()) => this.cooldown = None,
                Poll::Pending => {
                    if this.done && this.pending.is_none() {
                        return Poll::Ready(None);
                    }
                    return Poll::Pending;
                }
            }
        }

        if let Some(item) = this.pending.take() {
            this.cooldown = Some(Box::pin(tokio::time::sleep(this.interval)));
            return Poll::Ready(Some(item));
        }

        if this.done {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}
