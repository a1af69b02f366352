//! StreamRelay: forwards model fragments to a client as they arrive.
//!
//! The relay is transport-agnostic. It writes to a [`FragmentSink`] and
//! watches two signals while waiting for the next fragment: the sink's
//! liveness and a cancellation token. Whichever fires first wins; a
//! disconnect cancels the token and aborts the model call exactly once, and
//! nothing is read or written afterwards.

use std::io;

use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use helpin_types::llm::LlmError;
use helpin_types::quota::QuotaSnapshot;

use crate::llm::{AbortHandle, FragmentStream};

/// Content type of a relayed response: fragments concatenated, no envelope.
pub const PLAIN_TEXT_UTF8: &str = "text/plain; charset=utf-8";

/// Response metadata committed before the first fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    pub content_type: &'static str,
    pub quota: QuotaSnapshot,
}

impl ResponseHead {
    pub fn plain_text(quota: QuotaSnapshot) -> Self {
        Self {
            content_type: PLAIN_TEXT_UTF8,
            quota,
        }
    }
}

/// The client side has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("client sink closed")]
pub struct SinkClosed;

/// Destination of a relayed response.
pub trait FragmentSink: Send {
    /// Commit the response head. Called once, before any fragment.
    fn commit(
        &mut self,
        head: ResponseHead,
    ) -> impl std::future::Future<Output = Result<(), SinkClosed>> + Send;

    /// Write and flush one fragment.
    fn send(
        &mut self,
        fragment: String,
    ) -> impl std::future::Future<Output = Result<(), SinkClosed>> + Send;

    /// Terminate the response abnormally, without a structured payload.
    fn fail(&mut self, reason: String) -> impl std::future::Future<Output = ()> + Send;

    /// Resolves once the client can no longer be reached.
    fn closed(&self) -> impl std::future::Future<Output = ()> + Send;
}

/// Body chunk delivered through a [`ChannelSink`]. An `Err` tells the
/// transport to cut the connection instead of ending it cleanly.
pub type BodyChunk = Result<String, io::Error>;

/// [`FragmentSink`] backed by tokio channels, for handing a response to an
/// HTTP layer running on another task.
#[derive(Debug)]
pub struct ChannelSink {
    head: Option<oneshot::Sender<ResponseHead>>,
    body: mpsc::Sender<BodyChunk>,
}

/// Create a channel sink and its receiving halves.
///
/// `buffer` bounds how many fragments may wait for the transport; a slow
/// client applies backpressure to the relay rather than growing memory.
pub fn channel_sink(
    buffer: usize,
) -> (ChannelSink, oneshot::Receiver<ResponseHead>, mpsc::Receiver<BodyChunk>) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(buffer.max(1));
    (
        ChannelSink {
            head: Some(head_tx),
            body: body_tx,
        },
        head_rx,
        body_rx,
    )
}

impl FragmentSink for ChannelSink {
    async fn commit(&mut self, head: ResponseHead) -> Result<(), SinkClosed> {
        match self.head.take() {
            Some(tx) => tx.send(head).map_err(|_| SinkClosed),
            None => Ok(()),
        }
    }

    async fn send(&mut self, fragment: String) -> Result<(), SinkClosed> {
        self.body.send(Ok(fragment)).await.map_err(|_| SinkClosed)
    }

    async fn fail(&mut self, reason: String) {
        let _ = self.body.send(Err(io::Error::other(reason))).await;
    }

    async fn closed(&self) {
        self.body.closed().await
    }
}

/// How a relay ended.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The fragment sequence ended normally.
    Completed { fragments: usize },
    /// The client went away or the token was cancelled.
    Aborted { fragments: usize },
    /// The model failed after the head was committed.
    Failed { fragments: usize, error: LlmError },
}

impl RelayOutcome {
    pub fn fragments(&self) -> usize {
        match self {
            RelayOutcome::Completed { fragments }
            | RelayOutcome::Aborted { fragments }
            | RelayOutcome::Failed { fragments, .. } => *fragments,
        }
    }
}

enum Step {
    Stop,
    Next(Option<Result<String, LlmError>>),
}

/// Forwards fragments from one model invocation to one sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamRelay;

impl StreamRelay {
    pub fn new() -> Self {
        Self
    }

    /// Relay `fragments` into `sink` until the sequence ends, fails, or the
    /// client disappears. The sink is dropped (and so closed) on return.
    pub async fn relay<K: FragmentSink>(
        &self,
        mut fragments: FragmentStream,
        mut abort: AbortHandle,
        head: ResponseHead,
        mut sink: K,
        cancel: &CancellationToken,
    ) -> RelayOutcome {
        if sink.commit(head).await.is_err() {
            debug!("client gone before response head was committed");
            cancel.cancel();
            abort.abort();
            return RelayOutcome::Aborted { fragments: 0 };
        }

        let mut forwarded = 0usize;
        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Stop,
                _ = sink.closed() => Step::Stop,
                next = fragments.next() => Step::Next(next),
            };

            match step {
                Step::Stop => break,
                Step::Next(None) => {
                    debug!(fragments = forwarded, "model stream finished");
                    return RelayOutcome::Completed {
                        fragments: forwarded,
                    };
                }
                Step::Next(Some(Ok(fragment))) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    if sink.send(fragment).await.is_err() {
                        break;
                    }
                    forwarded += 1;
                }
                Step::Next(Some(Err(error))) => {
                    warn!(fragments = forwarded, error = %error, "model stream failed mid-response");
                    sink.fail(error.to_string()).await;
                    return RelayOutcome::Failed {
                        fragments: forwarded,
                        error,
                    };
                }
            }
        }

        cancel.cancel();
        if abort.abort() {
            debug!(fragments = forwarded, "client disconnected, model call aborted");
        }
        RelayOutcome::Aborted {
            fragments: forwarded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_stream::stream;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum Event {
        Head(ResponseHead),
        Fragment(String),
        Failed(String),
    }

    /// Records everything written; reports closed after `close_after` fragments.
    struct RecordingSink {
        events: Vec<Event>,
        close_after: Option<usize>,
        closed_tx: tokio::sync::watch::Sender<bool>,
    }

    impl RecordingSink {
        fn new(close_after: Option<usize>) -> Self {
            let (closed_tx, _) = tokio::sync::watch::channel(false);
            Self {
                events: Vec::new(),
                close_after,
                closed_tx,
            }
        }
    }

    impl FragmentSink for &mut RecordingSink {
        async fn commit(&mut self, head: ResponseHead) -> Result<(), SinkClosed> {
            self.events.push(Event::Head(head));
            Ok(())
        }

        async fn send(&mut self, fragment: String) -> Result<(), SinkClosed> {
            if *self.closed_tx.borrow() {
                return Err(SinkClosed);
            }
            self.events.push(Event::Fragment(fragment));
            let sent = self
                .events
                .iter()
                .filter(|e| matches!(e, Event::Fragment(_)))
                .count();
            if Some(sent) == self.close_after {
                self.closed_tx.send_replace(true);
            }
            Ok(())
        }

        async fn fail(&mut self, reason: String) {
            self.events.push(Event::Failed(reason));
        }

        async fn closed(&self) {
            let mut rx = self.closed_tx.subscribe();
            let _ = rx.wait_for(|closed| *closed).await;
        }
    }

    fn head() -> ResponseHead {
        ResponseHead::plain_text(QuotaSnapshot {
            remaining: 19,
            max: 20,
        })
    }

    fn counting_abort() -> (AbortHandle, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = AbortHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (handle, calls)
    }

    /// Endless fragment source that counts how many fragments were pulled.
    fn endless(pulled: Arc<AtomicUsize>) -> FragmentStream {
        Box::pin(stream! {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let n = pulled.fetch_add(1, Ordering::SeqCst);
                yield Ok(format!("f{n} "));
            }
        })
    }

    #[tokio::test]
    async fn test_head_first_then_fragments_in_order() {
        let fragments: FragmentStream = Box::pin(futures_util::stream::iter(vec![
            Ok("נגזרת ".to_string()),
            Ok(String::new()),
            Ok("היא ".to_string()),
            Ok("שיפוע".to_string()),
        ]));
        let (abort, aborts) = counting_abort();
        let mut sink = RecordingSink::new(None);
        let cancel = CancellationToken::new();

        let outcome = StreamRelay::new()
            .relay(fragments, abort, head(), &mut sink, &cancel)
            .await;

        assert!(matches!(outcome, RelayOutcome::Completed { fragments: 3 }));
        assert_eq!(
            sink.events,
            vec![
                Event::Head(head()),
                Event::Fragment("נגזרת ".into()),
                Event::Fragment("היא ".into()),
                Event::Fragment("שיפוע".into()),
            ]
        );
        assert_eq!(aborts.load(Ordering::SeqCst), 0);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_aborts_once_and_stops_reading() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let (abort, aborts) = counting_abort();
        let mut sink = RecordingSink::new(Some(2));
        let cancel = CancellationToken::new();

        let outcome = StreamRelay::new()
            .relay(endless(Arc::clone(&pulled)), abort, head(), &mut sink, &cancel)
            .await;

        assert!(matches!(outcome, RelayOutcome::Aborted { fragments: 2 }));
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
        assert!(cancel.is_cancelled());
        assert_eq!(pulled.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_receiver_dropped_mid_stream() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let (abort, aborts) = counting_abort();
        let (sink, head_rx, mut body_rx) = channel_sink(4);
        let cancel = CancellationToken::new();

        let relay_cancel = cancel.clone();
        let task = tokio::spawn({
            let pulled = Arc::clone(&pulled);
            async move {
                StreamRelay::new()
                    .relay(endless(pulled), abort, head(), sink, &relay_cancel)
                    .await
            }
        });

        assert_eq!(head_rx.await.unwrap(), head());
        assert_eq!(body_rx.recv().await.unwrap().unwrap(), "f0 ");
        assert_eq!(body_rx.recv().await.unwrap().unwrap(), "f1 ");
        drop(body_rx);

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, RelayOutcome::Aborted { .. }));
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
        assert!(cancel.is_cancelled());

        let seen = pulled.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_head_rejected_aborts_without_reading() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let (abort, aborts) = counting_abort();
        let (sink, head_rx, body_rx) = channel_sink(4);
        drop(head_rx);
        drop(body_rx);
        let cancel = CancellationToken::new();

        let outcome = StreamRelay::new()
            .relay(endless(Arc::clone(&pulled)), abort, head(), sink, &cancel)
            .await;

        assert!(matches!(outcome, RelayOutcome::Aborted { fragments: 0 }));
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
        assert_eq!(pulled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancellation_aborts() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let (abort, aborts) = counting_abort();
        let mut sink = RecordingSink::new(None);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            trigger.cancel();
        });

        let outcome = StreamRelay::new()
            .relay(endless(pulled), abort, head(), &mut sink, &cancel)
            .await;

        assert!(matches!(outcome, RelayOutcome::Aborted { fragments: 3 }));
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_model_error_after_head_fails_without_payload() {
        let fragments: FragmentStream = Box::pin(futures_util::stream::iter(vec![
            Ok("partial".to_string()),
            Err(LlmError::Stream("connection reset".into())),
            Ok("never".to_string()),
        ]));
        let (abort, aborts) = counting_abort();
        let mut sink = RecordingSink::new(None);
        let cancel = CancellationToken::new();

        let outcome = StreamRelay::new()
            .relay(fragments, abort, head(), &mut sink, &cancel)
            .await;

        match outcome {
            RelayOutcome::Failed { fragments, error } => {
                assert_eq!(fragments, 1);
                assert!(matches!(error, LlmError::Stream(_)));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(sink.events.len(), 3);
        assert!(matches!(sink.events[2], Event::Failed(_)));
        assert_eq!(aborts.load(Ordering::SeqCst), 0);
    }
}
