//! Pull adapter over a server-streaming call.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::stub::MessageStream;

/// Messages pre-requested before the first delivery, to hide first-response
/// latency. One more is requested per delivered message.
pub const INITIAL_REQUEST_QUOTA: usize = 16;

pub const CLOSE_REASON: &str = "Call got closed by the client.";

/// Lazy, pull-based iterator over a server-streaming call.
///
/// A pump task forwards transport messages into a bounded channel whose
/// capacity is the request quota; the receiver frees one slot per delivered
/// message, which is what keeps the transport window open. Dropping the
/// transport stream on close cancels the in-flight call; messages racing in
/// after the cancel are discarded by the pump.
pub struct GrpcStreamIterator<T> {
    rx: mpsc::Receiver<Result<T, tonic::Status>>,
    cancel: CancellationToken,
    closed: bool,
}

impl<T: Send + 'static> GrpcStreamIterator<T> {
    pub fn spawn(mut stream: MessageStream<T>) -> Self {
        let (tx, rx) = mpsc::channel(INITIAL_REQUEST_QUOTA);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("{CLOSE_REASON}");
                        break;
                    }
                    message = stream.next() => {
                        let Some(item) = message else { break };
                        tokio::select! {
                            _ = token.cancelled() => break,
                            sent = tx.send(item) => {
                                if sent.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            // the in-flight call is cancelled when `stream` drops here
        });
        Self {
            rx,
            cancel,
            closed: false,
        }
    }

    /// Next message, end of stream, or transport error.
    pub async fn next(&mut self) -> Option<Result<T, tonic::Status>> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Cancels the underlying call. Idempotent; effective even when invoked
    /// before the call delivered its first message.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.cancel.cancel();
            self.rx.close();
        }
    }
}

impl<T> Drop for GrpcStreamIterator<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn scripted(values: Vec<Result<u32, tonic::Status>>) -> MessageStream<u32> {
        stream::iter(values).boxed()
    }

    #[tokio::test]
    async fn delivers_messages_in_order() {
        let mut iter = GrpcStreamIterator::spawn(scripted(vec![Ok(1), Ok(2), Ok(3)]));
        assert_eq!(iter.next().await.unwrap().unwrap(), 1);
        assert_eq!(iter.next().await.unwrap().unwrap(), 2);
        assert_eq!(iter.next().await.unwrap().unwrap(), 3);
        assert!(iter.next().await.is_none());
    }

    #[tokio::test]
    async fn surfaces_transport_error() {
        let mut iter = GrpcStreamIterator::spawn(scripted(vec![
            Ok(1),
            Err(tonic::Status::unavailable("gone")),
        ]));
        assert_eq!(iter.next().await.unwrap().unwrap(), 1);
        let err = iter.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unavailable);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_ends_iteration() {
        let mut iter = GrpcStreamIterator::spawn(scripted(vec![Ok(1), Ok(2)]));
        iter.close();
        iter.close();
        assert!(iter.next().await.is_none());
    }

    #[tokio::test]
    async fn pump_buffers_up_to_quota_without_consumer() {
        let many: Vec<Result<u32, tonic::Status>> = (0..100).map(Ok).collect();
        let mut iter = GrpcStreamIterator::spawn(scripted(many));
        // give the pump a chance to fill the quota
        tokio::task::yield_now().await;
        for expected in 0..100 {
            assert_eq!(iter.next().await.unwrap().unwrap(), expected);
        }
        assert!(iter.next().await.is_none());
    }
}
