use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reverb_core::{ByteStream, ReverbError};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone)]
pub struct TeeConfig {
    /// Upper bound on the capture accumulator. Beyond it the capture is
    /// abandoned; the live side is unaffected.
    pub capture_max_bytes: usize,
    /// Upper bound on how long the drive keeps consuming the source after
    /// the live consumer has gone away.
    pub deadline: Duration,
}

impl Default for TeeConfig {
    fn default() -> Self {
        Self {
            capture_max_bytes: 1_048_576,
            deadline: Duration::from_millis(120_000),
        }
    }
}

impl TeeConfig {
    pub fn with_capture_max_bytes(mut self, max: usize) -> Self {
        self.capture_max_bytes = max;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

/// How a capture ended.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// The source ended cleanly; every byte it produced is here.
    Done(Bytes),
    /// The accumulator hit its cap and the capture was abandoned.
    Overflowed { max_bytes: usize },
    /// The source errored or the deadline fired before it ended.
    Incomplete,
}

impl CaptureOutcome {
    /// The captured bytes if this capture is eligible for cache admission,
    /// otherwise the error that voids it.
    pub fn into_admissible(self) -> Result<Bytes, ReverbError> {
        match self {
            CaptureOutcome::Done(bytes) => Ok(bytes),
            CaptureOutcome::Overflowed { max_bytes } => {
                Err(ReverbError::CaptureOverflow { max_bytes })
            }
            CaptureOutcome::Incomplete => Err(ReverbError::Upstream(
                "stream did not end cleanly".to_string(),
            )),
        }
    }
}

/// Handle to a running capture; resolves when the drive finishes.
pub struct CaptureHandle {
    rx: oneshot::Receiver<CaptureOutcome>,
}

impl CaptureHandle {
    pub async fn join(self) -> CaptureOutcome {
        self.rx.await.unwrap_or(CaptureOutcome::Incomplete)
    }
}

/// Fan a byte stream out to a live consumer and a background capture.
///
/// One driver task owns the source. Live delivery goes through a
/// capacity-1 channel, so the live consumer paces upstream consumption and
/// is never more than one chunk behind the source. The capture is an
/// in-memory accumulator that can never stall the live side: it stops
/// accumulating on overflow and the drive carries on.
///
/// If the live consumer is dropped mid-stream, the drive keeps consuming
/// the source into the capture until the source ends or the deadline
/// fires.
pub struct StreamTee;

impl StreamTee {
    pub fn split(mut source: ByteStream, config: TeeConfig) -> (ByteStream, CaptureHandle) {
        let (live_tx, mut live_rx) = mpsc::channel::<Result<Bytes, ReverbError>>(1);
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            let deadline = tokio::time::sleep(config.deadline);
            tokio::pin!(deadline);

            let mut captured = BytesMut::new();
            let mut overflowed = false;
            let mut live_gone = false;
            let mut ended_clean = false;

            'drive: loop {
                // The deadline only cuts the drive short once the live
                // consumer is gone; while a client is attached, the client
                // paces the stream.
                let next = if live_gone {
                    tokio::select! {
                        next = source.next() => next,
                        _ = &mut deadline => break 'drive,
                    }
                } else {
                    source.next().await
                };

                match next {
                    Some(Ok(chunk)) => {
                        if !overflowed {
                            if captured.len() + chunk.len() > config.capture_max_bytes {
                                overflowed = true;
                                captured = BytesMut::new();
                            } else {
                                captured.extend_from_slice(&chunk);
                            }
                        }
                        if !live_gone && live_tx.send(Ok(chunk)).await.is_err() {
                            live_gone = true;
                        }
                    }
                    Some(Err(e)) => {
                        if !live_gone {
                            let _ = live_tx.send(Err(e)).await;
                        }
                        break 'drive;
                    }
                    None => {
                        ended_clean = true;
                        break 'drive;
                    }
                }
            }

            let outcome = if overflowed {
                CaptureOutcome::Overflowed {
                    max_bytes: config.capture_max_bytes,
                }
            } else if ended_clean {
                CaptureOutcome::Done(captured.freeze())
            } else {
                CaptureOutcome::Incomplete
            };
            let _ = done_tx.send(outcome);
        });

        let live: ByteStream = Box::pin(async_stream::stream! {
            while let Some(item) = live_rx.recv().await {
                yield item;
            }
        });

        (live, CaptureHandle { rx: done_rx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_capture_is_admissible() {
        let outcome = CaptureOutcome::Done(Bytes::from_static(b"payload"));
        assert_eq!(&outcome.into_admissible().unwrap()[..], b"payload");
    }

    #[test]
    fn overflow_is_a_capture_overflow_error() {
        let outcome = CaptureOutcome::Overflowed { max_bytes: 16 };
        assert!(matches!(
            outcome.into_admissible(),
            Err(ReverbError::CaptureOverflow { max_bytes: 16 })
        ));
    }

    #[test]
    fn incomplete_capture_is_not_admissible() {
        assert!(CaptureOutcome::Incomplete.into_admissible().is_err());
    }
}
