//! Completion aggregator.
//!
//! Reduces any number of task sources to a single [`Completion`]. Sources are
//! merged and drained on a background task, so they keep making progress
//! whether or not anyone polls the completion, and a failure in one source
//! never cancels the others.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, error};

use crate::error::SourceError;
use crate::source::TaskSource;

/// Combined completion of a set of task sources.
///
/// Resolves to `Ok(())` once every source has ended, or to the first error
/// any source emitted.
#[derive(Debug)]
#[must_use = "a Completion does nothing to the caller unless awaited"]
pub struct Completion {
    rx: oneshot::Receiver<Result<(), SourceError>>,
}

impl Future for Completion {
    type Output = Result<(), SourceError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(SourceError::Aborted)))
    }
}

/// Merge `sources` and return a handle for their combined completion.
///
/// Every chunk is read and discarded. The first error is logged and
/// reported through the handle; the failed source is dropped from the merge
/// and the remaining sources are still drained to their end, with any further
/// errors only logged.
///
/// Must be called from within a tokio runtime.
pub fn complete_all<T, I>(sources: I) -> Completion
where
    T: Send + 'static,
    I: IntoIterator<Item = TaskSource<T>>,
{
    let mut merged = StreamMap::new();
    let mut labels = Vec::new();
    for (index, source) in sources.into_iter().enumerate() {
        labels.push(source.label().to_string());
        merged.insert(index, source);
    }

    debug!(sources = labels.len(), "Aggregating task sources");

    let (tx, rx) = oneshot::channel();
    tokio::spawn(drive(merged, labels, tx));
    Completion { rx }
}

async fn drive<T>(
    mut merged: StreamMap<usize, TaskSource<T>>,
    labels: Vec<String>,
    tx: oneshot::Sender<Result<(), SourceError>>,
) {
    let mut result_tx = Some(tx);
    let mut chunks = 0u64;

    while let Some((index, item)) = merged.next().await {
        match item {
            Ok(_) => chunks += 1,
            Err(e) => {
                merged.remove(&index);
                let label = labels.get(index).map(String::as_str).unwrap_or("unknown");
                error!(source = %label, error = %e, "Task source failed");

                if let Some(tx) = result_tx.take() {
                    // The caller may have dropped the completion; nothing to do then.
                    tx.send(Err(e)).ok();
                }
            }
        }
    }

    debug!(chunks = chunks, "All task sources ended");

    if let Some(tx) = result_tx.take() {
        tx.send(Ok(())).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs() -> (CapturedLog, tracing::subscriber::DefaultGuard) {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        (log, tracing::subscriber::set_default(subscriber))
    }

    #[tokio::test]
    async fn test_zero_sources_resolves_immediately() {
        let result = complete_all(Vec::<TaskSource<()>>::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_after_every_source_ends() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut sources = Vec::new();

        // Producers end in reverse order of creation.
        for (i, delay_ms) in [30u64, 20, 10].into_iter().enumerate() {
            let (tx, source) = TaskSource::channel(format!("source-{}", i), 1);
            sources.push(source);
            let finished = finished.clone();
            tokio::spawn(async move {
                for chunk in 0..3 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    tx.send(chunk).await.unwrap();
                }
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }

        complete_all(sources).await.unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pending_while_any_source_is_open() {
        let (done_tx, done) = TaskSource::<u8>::channel("done", 1);
        let (open_tx, open) = TaskSource::<u8>::channel("open", 1);
        done_tx.finish();

        let mut completion = complete_all(vec![done, open]);
        let early = tokio::time::timeout(Duration::from_millis(50), &mut completion).await;
        assert!(early.is_err(), "completion resolved while a source was open");

        open_tx.finish();
        assert!(completion.await.is_ok());
    }

    #[tokio::test]
    async fn test_first_error_rejects_without_waiting_for_others() {
        let (bad_tx, bad) = TaskSource::<u8>::channel("bad", 1);
        let (_open_tx, open) = TaskSource::<u8>::channel("open", 1);

        let completion = complete_all(vec![bad, open]);
        bad_tx.fail(SourceError::other("boom")).await;

        match completion.await {
            Err(SourceError::Other(message)) => assert_eq!(message, "boom"),
            other => panic!("Expected Other error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_is_logged_once() {
        let (log, _guard) = capture_logs();

        let (bad_tx, bad) = TaskSource::<u8>::channel("compile", 1);
        let (ok_tx, ok) = TaskSource::<u8>::channel("copy", 1);

        let completion = complete_all(vec![bad, ok]);
        ok_tx.send(1).await.unwrap();
        ok_tx.finish();
        bad_tx.fail(SourceError::other("syntax error")).await;

        assert!(completion.await.is_err());

        let output = log.contents();
        assert_eq!(output.matches("Task source failed").count(), 1);
        assert!(output.contains("syntax error"));
        assert!(output.contains("compile"));
    }

    #[tokio::test]
    async fn test_siblings_keep_draining_after_failure() {
        let (bad_tx, bad) = TaskSource::<u8>::channel("bad", 1);
        let (slow_tx, slow) = TaskSource::<u8>::channel("slow", 1);

        let completion = complete_all(vec![bad, slow]);
        bad_tx.fail(SourceError::other("first")).await;
        assert!(completion.await.is_err());

        // A capacity-1 channel only accepts all of these if it is still drained.
        let producer = tokio::spawn(async move {
            for chunk in 0..10 {
                slow_tx.send(chunk).await?;
            }
            Ok::<_, SourceError>(())
        });

        let sent = tokio::time::timeout(Duration::from_secs(5), producer)
            .await
            .expect("sibling source was not drained")
            .unwrap();
        assert!(sent.is_ok());
    }

    #[tokio::test]
    async fn test_only_first_error_is_reported() {
        let (first_tx, first) = TaskSource::<u8>::channel("first", 1);
        let (second_tx, second) = TaskSource::<u8>::channel("second", 1);

        let completion = complete_all(vec![first, second]);
        first_tx.fail(SourceError::other("one")).await;

        let result = completion.await;
        second_tx.fail(SourceError::other("two")).await;

        assert!(matches!(result, Err(SourceError::Other(ref m)) if m == "one"));
    }

    #[tokio::test]
    async fn test_dropped_completion_still_drives_sources() {
        let (tx, source) = TaskSource::channel("unobserved", 1);
        drop(complete_all(vec![source]));

        let producer = tokio::spawn(async move {
            for chunk in 0..5u8 {
                tx.send(chunk).await?;
            }
            Ok::<_, SourceError>(())
        });

        let sent = tokio::time::timeout(Duration::from_secs(5), producer)
            .await
            .expect("source was not drained")
            .unwrap();
        assert!(sent.is_ok());
    }
}
