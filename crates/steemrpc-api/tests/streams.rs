use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

use steemrpc_api::{Error, Steem, StreamConfig, TransportError};
use steemrpc_core::mock::MockTransport;
use steemrpc_core::request::JsonRpcError;

const WAIT: Duration = Duration::from_secs(2);

fn config() -> StreamConfig {
    StreamConfig::head().with_interval(Duration::from_millis(5))
}

/// Node whose head walks through `heads` (then stays on the last one) and
/// whose blocks come from `block`.
fn node<B>(heads: Vec<u64>, block: B) -> Arc<MockTransport>
where
    B: Fn(u64) -> Result<Value, TransportError> + Send + Sync + 'static,
{
    let polls = AtomicUsize::new(0);
    Arc::new(MockTransport::new(move |_, call| match call.method.as_str() {
        "get_dynamic_global_properties" => {
            let i = polls.fetch_add(1, Ordering::SeqCst).min(heads.len() - 1);
            Ok(json!({
                "head_block_number": heads[i],
                "last_irreversible_block_num": heads[i].saturating_sub(20),
            }))
        }
        "get_block" => block(call.params[0].as_u64().unwrap()),
        other => panic!("unexpected call {other}"),
    }))
}

fn empty_block(n: u64) -> Result<Value, TransportError> {
    Ok(json!({ "previous": format!("{:08x}", n - 1), "transactions": [] }))
}

fn client(mock: &Arc<MockTransport>) -> Steem {
    Steem::builder().transport(mock.clone()).build().unwrap()
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("stream delivered in time")
        .expect("stream channel open")
}

async fn assert_quiet<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "stream delivered after it should have stopped");
}

#[tokio::test]
async fn block_numbers_fill_gaps() {
    let mock = node(vec![100, 100, 103], empty_block);
    let steem = client(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = steem.stream_block_number(config(), move |n| {
        let _ = tx.send(n.unwrap());
    });

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(next(&mut rx).await);
    }
    assert_eq!(seen, vec![100, 101, 102, 103]);
    assert_quiet(&mut rx).await;
    handle.cancel();
}

#[tokio::test]
async fn block_numbers_ignore_regression() {
    let mock = node(vec![50, 48, 51], empty_block);
    let steem = client(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = steem.stream_block_number(config(), move |n| {
        let _ = tx.send(n.unwrap());
    });

    assert_eq!(next(&mut rx).await, 50);
    assert_eq!(next(&mut rx).await, 51);
    handle.cancel();
}

#[tokio::test]
async fn irreversible_mode_follows_irreversible_number() {
    let mock = node(vec![120], empty_block);
    let steem = client(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = steem.stream_block_number(
        StreamConfig::irreversible().with_interval(Duration::from_millis(5)),
        move |n| {
            let _ = tx.send(n.unwrap());
        },
    );

    assert_eq!(next(&mut rx).await, 100);
    handle.cancel();
}

#[tokio::test]
async fn cancel_stops_polling() {
    let mock = node(vec![7], empty_block);
    let steem = client(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = steem.stream_block_number(config(), move |n| {
        let _ = tx.send(n);
    });
    next(&mut rx).await.unwrap();
    handle.cancel();
    tokio::task::yield_now().await;

    let polls = mock.count("get_dynamic_global_properties");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.count("get_dynamic_global_properties"), polls);
    assert!(handle.is_cancelled());
}

#[tokio::test]
async fn cancelling_operations_cancels_the_whole_chain() {
    let mock = node(vec![1], empty_block);
    let steem = client(&mock);

    let handle = steem.stream_operations(config(), |_| {});
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let polls = mock.count("get_dynamic_global_properties");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.count("get_dynamic_global_properties"), polls);
}

#[tokio::test]
async fn each_block_fetched_once() {
    let mock = node(vec![100, 100, 103], empty_block);
    let steem = client(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = steem.stream_block(config(), move |block| {
        let _ = tx.send(block.unwrap());
    });
    for _ in 0..4 {
        next(&mut rx).await;
    }
    assert_quiet(&mut rx).await;
    handle.cancel();

    let fetched: Vec<u64> = mock
        .calls()
        .iter()
        .filter(|c| c.call.method == "get_block")
        .map(|c| c.call.params[0].as_u64().unwrap())
        .collect();
    assert_eq!(fetched, vec![100, 101, 102, 103]);
}

#[tokio::test]
async fn operations_arrive_in_block_order() {
    let mock = node(vec![100], |_| {
        Ok(json!({
            "transactions": [
                { "operations": [["vote", {"n": 0}], ["vote", {"n": 1}]] },
                { "operations": [["transfer", {"n": 2}]] }
            ]
        }))
    });
    let steem = client(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = steem.stream_operations(config(), move |op| {
        let _ = tx.send(op.unwrap());
    });

    let mut ops = Vec::new();
    for _ in 0..3 {
        ops.push(next(&mut rx).await[1]["n"].as_u64().unwrap());
    }
    assert_eq!(ops, vec![0, 1, 2]);
    assert_quiet(&mut rx).await;
    handle.cancel();
}

#[tokio::test]
async fn transactions_are_delivered_per_block() {
    let mock = node(vec![5, 6], |n| {
        Ok(json!({ "transactions": [{ "ref_block_num": n, "operations": [] }] }))
    });
    let steem = client(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = steem.stream_transactions(config(), move |trx| {
        let _ = tx.send(trx.unwrap());
    });

    assert_eq!(next(&mut rx).await.extra["ref_block_num"], json!(5));
    assert_eq!(next(&mut rx).await.extra["ref_block_num"], json!(6));
    handle.cancel();
}

#[tokio::test]
async fn block_failure_reaches_operations_once() {
    let mock = node(vec![100, 101], |n| {
        if n == 100 {
            Ok(json!({ "transactions": [] }))
        } else {
            Err(TransportError::Rpc(JsonRpcError {
                code: -32000,
                message: "node busy".into(),
                data: None,
            }))
        }
    });
    let steem = client(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = steem.stream_operations(config(), move |op| {
        let _ = tx.send(op);
    });

    let err = next(&mut rx).await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Rpc(ref e)) if e.message == "node busy"));
    assert_quiet(&mut rx).await;
    assert!(handle.is_cancelled());

    let polls = mock.count("get_dynamic_global_properties");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.count("get_dynamic_global_properties"), polls);
}

#[tokio::test]
async fn poll_failure_is_delivered_once() {
    let mock = Arc::new(MockTransport::new(|_, _| {
        Err(TransportError::Http("connection refused".into()))
    }));
    let steem = client(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = steem.stream_block_number(config(), move |n| {
        let _ = tx.send(n);
    });

    assert!(next(&mut rx).await.is_err());
    assert_quiet(&mut rx).await;
    assert!(handle.is_cancelled());
    assert_eq!(mock.count("get_dynamic_global_properties"), 1);
}

#[tokio::test]
async fn missing_block_is_an_error() {
    let mock = node(vec![9], |_| Ok(Value::Null));
    let steem = client(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = steem.stream_block(config(), move |block| {
        let _ = tx.send(block);
    });

    assert!(matches!(next(&mut rx).await, Err(Error::BlockNotFound(9))));
    assert!(handle.is_cancelled());
}
