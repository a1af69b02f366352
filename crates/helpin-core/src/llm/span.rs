//! Stream adapter that enters a tracing span on every poll.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use pin_project_lite::pin_project;

pin_project! {
    /// Polls `inner` inside `span`, so events emitted by the producer while
    /// generating fragments are attributed to the model call.
    pub struct StreamInSpan<S> {
        #[pin]
        inner: S,
        span: tracing::Span,
    }
}

impl<S> StreamInSpan<S> {
    pub fn new(inner: S, span: tracing::Span) -> Self {
        Self { inner, span }
    }
}

impl<S: Stream> Stream for StreamInSpan<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let _enter = this.span.enter();
        this.inner.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_passes_items_through() {
        let inner = futures_util::stream::iter(vec!["a", "b"]);
        let wrapped = StreamInSpan::new(inner, tracing::info_span!("test"));
        let items: Vec<_> = wrapped.collect().await;
        assert_eq!(items, vec!["a", "b"]);
    }
}
