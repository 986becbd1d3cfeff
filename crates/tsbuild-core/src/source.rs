//! Task sources.
//!
//! A task source is a push-based sequence of chunks. Running out of items is
//! the end signal; an `Err` item is the failure signal, after which the source
//! is considered finished.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

use crate::error::SourceError;

type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, SourceError>> + Send>>;

/// A labelled, single-use stream of chunks produced by some task.
pub struct TaskSource<T> {
    label: String,
    inner: BoxedStream<T>,
}

impl<T> TaskSource<T> {
    /// Wrap an existing stream.
    pub fn from_stream<S>(label: impl Into<String>, stream: S) -> Self
    where
        S: Stream<Item = Result<T, SourceError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            inner: Box::pin(stream),
        }
    }

    /// A source that ends without producing anything.
    pub fn empty(label: impl Into<String>) -> Self
    where
        T: Send + 'static,
    {
        Self::from_stream(label, tokio_stream::empty())
    }

    /// Label used when reporting this source's failures.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<T: Send + 'static> TaskSource<T> {
    /// Create a bounded channel-backed source.
    ///
    /// Returns the producer half and the source. The source ends once every
    /// sender has been dropped.
    pub fn channel(label: impl Into<String>, capacity: usize) -> (SourceSender<T>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            SourceSender { tx },
            Self::from_stream(label, ReceiverStream::new(rx)),
        )
    }
}

impl<T> Stream for TaskSource<T> {
    type Item = Result<T, SourceError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<T> fmt::Debug for TaskSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSource")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Producer half of a channel-backed [`TaskSource`].
#[derive(Debug)]
pub struct SourceSender<T> {
    tx: mpsc::Sender<Result<T, SourceError>>,
}

impl<T> Clone for SourceSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> SourceSender<T> {
    /// Push one chunk, waiting for capacity.
    ///
    /// Fails with `SourceError::Aborted` if nobody is draining the source.
    pub async fn send(&self, chunk: T) -> Result<(), SourceError> {
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| SourceError::Aborted)
    }

    /// Emit the failure signal and close this sender.
    pub async fn fail(self, error: SourceError) {
        // Nobody left to observe the failure if the receiver is gone.
        self.tx.send(Err(error)).await.ok();
    }

    /// Close this sender. Equivalent to dropping it.
    pub fn finish(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_channel_source_yields_then_ends() {
        let (tx, mut source) = TaskSource::channel("numbers", 4);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        tx.finish();

        assert_eq!(source.label(), "numbers");
        assert_eq!(source.next().await.unwrap().unwrap(), 1);
        assert_eq!(source.next().await.unwrap().unwrap(), 2);
        assert!(source.next().await.is_none());
    }

    #[tokio::test]
    async fn test_fail_emits_error_and_closes() {
        let (tx, mut source) = TaskSource::<u8>::channel("broken", 1);
        tokio::spawn(tx.fail(SourceError::other("boom")));

        let item = source.next().await.unwrap();
        assert!(matches!(item, Err(SourceError::Other(ref m)) if m == "boom"));
        assert!(source.next().await.is_none());
    }

    #[tokio::test]
    async fn test_send_after_source_dropped_is_aborted() {
        let (tx, source) = TaskSource::channel("dropped", 1);
        drop(source);
        assert!(matches!(tx.send(()).await, Err(SourceError::Aborted)));
    }

    #[tokio::test]
    async fn test_empty_source_ends_immediately() {
        let mut source = TaskSource::<String>::empty("nothing");
        assert!(source.next().await.is_none());
    }

    #[tokio::test]
    async fn test_from_stream() {
        let stream = tokio_stream::iter(vec![Ok("a"), Ok("b")]);
        let source = TaskSource::from_stream("letters", stream);
        let items: Vec<_> = source.map(|r| r.unwrap()).collect().await;
        assert_eq!(items, vec!["a", "b"]);
    }
}
