use crate::client::Steem;
use crate::error::Error;
use crate::stream::{StreamConfig, StreamHandle};
use crate::types::Operation;

impl Steem {
    /// Deliver every operation of every streamed transaction, in order.
    pub fn stream_operations<F>(&self, config: StreamConfig, mut callback: F) -> StreamHandle
    where
        F: FnMut(Result<Operation, Error>) + Send + 'static,
    {
        let handle = StreamHandle::new();
        let own = handle.clone();
        let upstream = self.stream_transactions(config, move |trx| match trx {
            Ok(trx) => {
                for op in trx.operations {
                    if own.is_cancelled() {
                        return;
                    }
                    callback(Ok(op));
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
