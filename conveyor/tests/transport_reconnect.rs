//! Scenario 4 (spec §8): client sends "test 0".."test 9", the server is
//! stopped mid-stream, the client keeps buffering 10 more items while
//! disconnected, the server restarts and the client reconnects, and the
//! restarted server receives every buffered item in order with no
//! duplicates.
#![cfg(feature = "transport")]

use bytes::Bytes;
use conveyor::prelude::*;
use conveyor_core::endpoint::Endpoint;
use std::time::Duration;

const ADDR: &str = "tcp://127.0.0.1:18558";

#[compio::test]
async fn test_client_buffers_across_a_server_restart_and_replays_in_order() {
    let endpoint = Endpoint::parse(ADDR).unwrap();
    // Shorten the ack timeout and retry interval so the client notices the
    // dead connection and starts retrying quickly instead of waiting out the
    // 10s production default.
    let tunables = Tunables::default()
        .with_ack_timeout(Duration::from_millis(300))
        .with_retry_interval(Duration::from_millis(100));

    let (server_out_tx, server_out_rx) = flume::unbounded::<Bytes>();
    let mut server = ReliableServer::new(server_out_tx, endpoint, &tunables);
    let server_stop = server.hard_stop_handle();
    let server_handle = compio::runtime::spawn(async move { server.run().await });

    compio::time::sleep(Duration::from_millis(50)).await;

    let (client_in_tx, client_in_rx) = flume::unbounded::<Bytes>();
    let mut client = ReliableClient::new(client_in_rx, endpoint, &tunables);
    let client_handle = compio::runtime::spawn(async move { client.run().await });

    for i in 0..10 {
        client_in_tx.send_async(Bytes::from(format!("test {i}"))).await.unwrap();
    }

    let mut first_batch = Vec::new();
    for _ in 0..10 {
        first_batch.push(server_out_rx.recv_async().await.unwrap());
    }
    assert_eq!(
        first_batch,
        (0..10).map(|i| Bytes::from(format!("test {i}"))).collect::<Vec<_>>()
    );

    // Stop the server; the client's outstanding acks will never arrive, so
    // it falls back to reconnect-retry once its ack timeout elapses. It
    // keeps accepting and buffering new input the whole time (bounded by
    // `hwm`, far above what this test sends).
    server_stop.stop();
    server_handle.await.unwrap();

    for i in 10..20 {
        client_in_tx.send_async(Bytes::from(format!("test {i}"))).await.unwrap();
    }

    // Give the client a couple of retry intervals to notice the drop before
    // the replacement server comes up.
    compio::time::sleep(Duration::from_millis(250)).await;

    let (server_out_tx2, server_out_rx2) = flume::unbounded::<Bytes>();
    let mut server2 = ReliableServer::new(server_out_tx2, endpoint, &tunables);
    let server2_stop = server2.hard_stop_handle();
    let server2_handle = compio::runtime::spawn(async move { server2.run().await });

    let mut second_batch = Vec::new();
    for _ in 0..10 {
        second_batch.push(server_out_rx2.recv_async().await.unwrap());
    }
    assert_eq!(
        second_batch,
        (10..20).map(|i| Bytes::from(format!("test {i}"))).collect::<Vec<_>>(),
        "reconnect must replay buffered items in order with no duplicates"
    );

    drop(client_in_tx);
    server2_stop.stop();
    client_handle.await.unwrap();
    server2_handle.await.unwrap();
}
