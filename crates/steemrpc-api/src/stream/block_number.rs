use std::time::Duration;

use crate::client::Steem;
use crate::error::Error;
use crate::stream::{StreamConfig, StreamHandle, StreamMode};

/// Tracks the last delivered block number and fills gaps.
///
/// The first observation is delivered as-is. Afterwards every number between
/// the last delivered one and the newly observed one is produced in order, so
/// a poll that jumps from 100 to 103 yields 101, 102 and 103. Observations at
/// or below the cursor produce nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockCursor {
    current: Option<u64>,
}

impl BlockCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last delivered number.
    pub fn current(&self) -> Option<u64> {
        self.current
    }

    /// `true` when `observed` is older than what was already delivered.
    pub fn is_regression(&self, observed: u64) -> bool {
        self.current.is_some_and(|current| observed < current)
    }

    /// Next number to deliver on the way to `observed`, advancing the cursor.
    pub fn next(&mut self, observed: u64) -> Option<u64> {
        let next = match self.current {
            None => observed,
            Some(current) if current < observed => current + 1,
            Some(_) => return None,
        };
        self.current = Some(next);
        Some(next)
    }
}

struct BlockNumberPoller<F> {
    client: Steem,
    mode: StreamMode,
    interval: Duration,
    cursor: BlockCursor,
    handle: StreamHandle,
    callback: F,
}

impl<F> BlockNumberPoller<F>
where
    F: FnMut(Result<u64, Error>) + Send + 'static,
{
    async fn run(mut self) {
        tracing::debug!(mode = %self.mode, interval_ms = self.interval.as_millis() as u64, "block number stream started");
        loop {
            if self.handle.is_cancelled() {
                break;
            }
            let polled = self.client.get_dynamic_global_properties().await;
            if self.handle.is_cancelled() {
                break;
            }
            match polled {
                Ok(props) => {
                    let observed = self.mode.select(&props);
                    self.deliver(observed);
                }
                Err(e) => {
                    tracing::warn!(error = %e, mode = %self.mode, "block number poll failed, stopping stream");
                    if self.handle.terminate() {
                        (self.callback)(Err(e));
                    }
                    break;
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.handle.cancelled() => break,
            }
        }
        tracing::debug!(mode = %self.mode, last = ?self.cursor.current(), "block number stream stopped");
    }

    fn deliver(&mut self, observed: u64) {
        if self.cursor.is_regression(observed) {
            tracing::warn!(
                observed,
                current = ?self.cursor.current(),
                "node reported an older block number, ignoring"
            );
            return;
        }
        while !self.handle.is_cancelled() {
            match self.cursor.next(observed) {
                Some(number) => (self.callback)(Ok(number)),
                None => break,
            }
        }
    }
}

impl Steem {
    /// Poll `get_dynamic_global_properties` and deliver every block number in
    /// order, filling gaps between polls.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stream_block_number<F>(&self, config: StreamConfig, callback: F) -> StreamHandle
    where
        F: FnMut(Result<u64, Error>) + Send + 'static,
    {
        let handle = StreamHandle::new();
        let poller = BlockNumberPoller {
            client: self.clone(),
            mode: config.mode,
            interval: config.interval(),
            cursor: BlockCursor::new(),
            handle: handle.clone(),
            callback,
        };
        tokio::spawn(poller.run());
        handle
    }
}
