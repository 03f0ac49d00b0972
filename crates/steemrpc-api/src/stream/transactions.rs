use crate::client::Steem;
use crate::error::Error;
use crate::stream::{StreamConfig, StreamHandle};
use crate::types::Transaction;

impl Steem {
    /// Deliver every transaction of every streamed block, in block order.
    pub fn stream_transactions<F>(&self, config: StreamConfig, mut callback: F) -> StreamHandle
    where
        F: FnMut(Result<Transaction, Error>) + Send + 'static,
    {
        let handle = StreamHandle::new();
        let own = handle.clone();
        let upstream = self.stream_block(config, move |block| match block {
            Ok(block) => {
                for trx in block.transactions {
                    if own.is_cancelled() {
                        return;
                    }
                    callback(Ok(trx));
                }
            }
            Err(e) => {
                if own.terminate() {
                    callback(Err(e));
                }
            }
        });
        handle.attach(upstream);
        handle
    }
}
