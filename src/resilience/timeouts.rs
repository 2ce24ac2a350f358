//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound connection establishment to an upstream
//! - Bound idle time while the request uploads and the response head is awaited
//! - Bound the wait for each body chunk
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - An upload that keeps making progress never times out
//! - Timeout errors are distinct from other upstream errors
//! - Timed-out requests are reported as 502 like any transport failure

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper::body::{Body as HttpBody, Frame, SizeHint};
use tokio::sync::watch;

use crate::config::UpstreamConfig;

/// Deadlines applied to every upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl From<&UpstreamConfig> for UpstreamTimeouts {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            connect: Duration::from_secs(config.connect_timeout_secs),
            read: Duration::from_secs(config.read_timeout_secs),
        }
    }
}

impl Default for UpstreamTimeouts {
    fn default() -> Self {
        Self::from(&UpstreamConfig::default())
    }
}

/// Elapsed deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline of {0:?} elapsed")]
pub struct Elapsed(pub Duration);

/// Body wrapper that bumps a counter for every frame it yields.
///
/// The counter's sender is dropped with the body, which marks the upload finished.
#[derive(Debug)]
pub struct ProgressBody<B> {
    inner: B,
    progress: watch::Sender<u64>,
}

/// Wrap `body` so its consumption can be observed.
pub fn track_progress<B>(body: B) -> (ProgressBody<B>, watch::Receiver<u64>) {
    let (progress, observed) = watch::channel(0);
    (ProgressBody { inner: body, progress }, observed)
}

impl<B> HttpBody for ProgressBody<B>
where
    B: HttpBody + Unpin,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if let Poll::Ready(Some(Ok(_))) = &polled {
            this.progress.send_modify(|frames| *frames += 1);
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Run `future` until it completes or `limit` passes without anything on `progress`.
///
/// Each change on `progress` restarts the deadline. Once the sender is gone the
/// deadline runs one last time from that point.
pub async fn with_idle_deadline<F: Future>(
    limit: Duration,
    mut progress: watch::Receiver<u64>,
    future: F,
) -> Result<F::Output, Elapsed> {
    tokio::pin!(future);
    let mut watching = true;
    loop {
        tokio::select! {
            output = &mut future => return Ok(output),
            changed = progress.changed(), if watching => watching = changed.is_ok(),
            () = tokio::time::sleep(limit) => return Err(Elapsed(limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};

    #[test]
    fn built_from_config() {
        let config = UpstreamConfig {
            connect_timeout_secs: 2,
            read_timeout_secs: 15,
        };
        let timeouts = UpstreamTimeouts::from(&config);
        assert_eq!(timeouts.connect, Duration::from_secs(2));
        assert_eq!(timeouts.read, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn fast_future_completes() {
        let (_tx, rx) = watch::channel(0u64);
        let value = with_idle_deadline(Duration::from_millis(50), rx, async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn idle_future_elapses() {
        let (_tx, rx) = watch::channel(0u64);
        let limit = Duration::from_millis(20);
        let result =
            with_idle_deadline(limit, rx, tokio::time::sleep(Duration::from_secs(5))).await;
        assert_eq!(result, Err(Elapsed(limit)));
    }

    #[tokio::test]
    async fn progress_restarts_deadline() {
        let (tx, rx) = watch::channel(0u64);
        tokio::spawn(async move {
            for _ in 0..6 {
                tokio::time::sleep(Duration::from_millis(40)).await;
                tx.send_modify(|frames| *frames += 1);
            }
        });

        // 300 ms of work against a 100 ms limit, kept alive by progress until 240 ms.
        let result = with_idle_deadline(Duration::from_millis(100), rx, async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            "done"
        })
        .await;
        assert_eq!(result, Ok("done"));
    }

    #[tokio::test]
    async fn deadline_runs_after_progress_ends() {
        let (tx, rx) = watch::channel(0u64);
        drop(tx);
        let limit = Duration::from_millis(20);
        let result =
            with_idle_deadline(limit, rx, tokio::time::sleep(Duration::from_secs(5))).await;
        assert_eq!(result, Err(Elapsed(limit)));
    }

    #[tokio::test]
    async fn body_frames_are_counted() {
        let (tracked, observed) = track_progress(Body::from("upload"));
        let bytes = to_bytes(Body::new(tracked), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"upload");
        assert!(*observed.borrow() >= 1);
    }
}
