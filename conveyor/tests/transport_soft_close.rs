//! Scenario 6 (spec §8): the client soft-closes (its input queue closes)
//! after sending 10 items; the server, configured with
//! `server_soft_close_on_last_exit`, exits once that connection's handler
//! returns after processing the CLOSE frame. Both sides report success.
#![cfg(feature = "transport")]

use bytes::Bytes;
use conveyor::prelude::*;
use conveyor_core::endpoint::Endpoint;
use std::time::Duration;

const ADDR: &str = "tcp://127.0.0.1:18560";

#[compio::test]
async fn test_server_soft_closes_once_the_last_connection_handler_returns() {
    let endpoint = Endpoint::parse(ADDR).unwrap();
    let tunables = Tunables::default().with_server_soft_close_on_last_exit(true);

    let (server_out_tx, server_out_rx) = flume::unbounded::<Bytes>();
    let mut server = ReliableServer::new(server_out_tx, endpoint, &tunables);
    let server_handle = compio::runtime::spawn(async move { server.run().await });

    compio::time::sleep(Duration::from_millis(50)).await;

    let (client_in_tx, client_in_rx) = flume::unbounded::<Bytes>();
    let mut client = ReliableClient::new(client_in_rx, endpoint, &tunables);
    let client_handle = compio::runtime::spawn(async move { client.run().await });

    for i in 0..10 {
        client_in_tx.send_async(Bytes::from(format!("item {i}"))).await.unwrap();
    }
    drop(client_in_tx); // soft close: the client sends CLOSE once every item is acked

    let mut received = Vec::new();
    for _ in 0..10 {
        received.push(server_out_rx.recv_async().await.unwrap());
    }
    assert_eq!(received.len(), 10);

    let client_result = client_handle.await;
    let server_result = server_handle.await;
    assert!(client_result.is_ok(), "client must report success after a clean soft close");
    assert!(server_result.is_ok(), "server must exit cleanly once the last connection handler returns");
}
