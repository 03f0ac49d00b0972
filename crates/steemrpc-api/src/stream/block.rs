use tokio::sync::mpsc;

use crate::client::Steem;
use crate::error::Error;
use crate::stream::{StreamConfig, StreamHandle};
use crate::types::Block;

/// Fetches blocks for incoming numbers one at a time, skipping repeats.
struct BlockFetcher<F> {
    client: Steem,
    handle: StreamHandle,
    numbers: mpsc::UnboundedReceiver<Result<u64, Error>>,
    last: Option<u64>,
    callback: F,
}

impl<F> BlockFetcher<F>
where
    F: FnMut(Result<Block, Error>) + Send + 'static,
{
    async fn run(mut self) {
        loop {
            let next = tokio::select! {
                next = self.numbers.recv() => next,
                _ = self.handle.cancelled() => None,
            };
            let Some(next) = next else { break };
            if self.handle.is_cancelled() {
                break;
            }

            let number = match next {
                Ok(number) => number,
                Err(e) => {
                    self.fail(e);
                    break;
                }
            };
            if self.last == Some(number) {
                tracing::trace!(number, "duplicate block number, skipping");
                continue;
            }
            self.last = Some(number);

            let fetched = self.client.get_block(number).await;
            if self.handle.is_cancelled() {
                break;
            }
            match fetched {
                Ok(block) => (self.callback)(Ok(block)),
                Err(e) => {
                    tracing::warn!(number, error = %e, "block fetch failed, stopping stream");
                    self.fail(e);
                    break;
                }
            }
        }
        tracing::debug!(last = ?self.last, "block stream stopped");
    }

    fn fail(&mut self, e: Error) {
        if self.handle.terminate() {
            (self.callback)(Err(e));
        }
    }
}

impl Steem {
    /// Deliver the block for every number of [`Steem::stream_block_number`],
    /// in order, each at most once.
    pub fn stream_block<F>(&self, config: StreamConfig, callback: F) -> StreamHandle
    where
        F: FnMut(Result<Block, Error>) + Send + 'static,
    {
        let handle = StreamHandle::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let upstream = self.stream_block_number(config, move |number| {
            let _ = tx.send(number);
        });
        handle.attach(upstream);

        let fetcher = BlockFetcher {
            client: self.clone(),
            handle: handle.clone(),
            numbers: rx,
            last: None,
            callback,
        };
        tokio::spawn(fetcher.run());
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;
    use steemrpc_core::mock::MockTransport;

    fn fetcher_for<F>(
        mock: &Arc<MockTransport>,
        numbers: &[u64],
        callback: F,
    ) -> BlockFetcher<F> {
        let (tx, rx) = mpsc::unbounded_channel();
        for &n in numbers {
            tx.send(Ok(n)).unwrap();
        }
        BlockFetcher {
            client: Steem::builder().transport(mock.clone()).build().unwrap(),
            handle: StreamHandle::new(),
            numbers: rx,
            last: None,
            callback,
        }
    }

    #[tokio::test]
    async fn redelivered_numbers_are_fetched_once() {
        let mock = Arc::new(MockTransport::fixed(json!({ "transactions": [] })));
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = delivered.clone();

        // sender is dropped inside fetcher_for, so run() ends once the queue drains
        fetcher_for(&mock, &[5, 5, 5, 6, 6], move |block: Result<Block, Error>| {
            block.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .run()
        .await;

        let fetched: Vec<_> = mock.calls().iter().map(|c| c.call.params[0].clone()).collect();
        assert_eq!(fetched, vec![json!(5), json!(6)]);
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_fetcher_fetches_nothing() {
        let mock = Arc::new(MockTransport::fixed(json!({ "transactions": [] })));
        let fetcher = fetcher_for(&mock, &[1, 2, 3], |_: Result<Block, Error>| {
            panic!("cancelled fetcher delivered a block");
        });
        fetcher.handle.cancel();
        fetcher.run().await;
        assert_eq!(mock.count("get_block"), 0);
    }
}
