//! Reliable transport server (spec §4.9). Grounded on `transport/server.go`.
//!
//! Binds a TCP listener and spawns one handler per accepted connection.
//! Each handler pairs a frame reader with a frame writer and applies
//! cumulative, coalesced acknowledgements: an immediate ACK once
//! `last_received - last_acked` exceeds `hwm / ack_hwm_divisor`, otherwise a
//! short coalescing timer so a burst of small DATA frames doesn't provoke
//! an ACK per frame.

use super::io::{FramedIo, PollOutcome};
use async_trait::async_trait;
use bytes::Bytes;
use compio::net::{TcpListener, TcpStream};
use conveyor_core::endpoint::Endpoint;
use conveyor_core::error::{CoreError, Result};
use conveyor_core::events::{EventSender, OperatorEvent};
use conveyor_core::operator::{HardStop, HasOutput, Operator, StopHandle, StopNotifier};
use conveyor_core::options::Tunables;
use conveyor_core::tcp::enable_tcp_nodelay;
use conveyor_wire::{Command, Frame};
use futures::future::Either;
use futures::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Receives byte payloads framed by a [`super::ReliableClient`] peer,
/// forwarding each to a local output queue and acknowledging receipt.
pub struct ReliableServer {
    output: flume::Sender<Bytes>,
    endpoint: Endpoint,
    tunables: Tunables,
    events: Option<EventSender>,
    stop: StopHandle,
    /// Number of currently-open connection handlers, used to decide when
    /// soft close (spec §4.9 "server exits once the last connection handler
    /// returns") is satisfied.
    active_connections: Arc<AtomicUsize>,
}

impl ReliableServer {
    /// Build a server that binds `endpoint` and forwards every received
    /// payload to `output`.
    #[must_use]
    pub fn new(output: flume::Sender<Bytes>, endpoint: Endpoint, tunables: &Tunables) -> Self {
        Self {
            output,
            endpoint,
            tunables: tunables.clone(),
            events: None,
            stop: StopHandle::new(),
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Route lifecycle events (bind/accept/failure) to `events`.
    #[must_use]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: OperatorEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl Operator for ReliableServer {
    async fn run(&mut self) -> Result<()> {
        let stop_notifier = self.stop.notifier();

        let listener = match TcpListener::bind(self.endpoint.addr()).await {
            Ok(listener) => {
                self.emit(OperatorEvent::Bound(self.endpoint));
                listener
            }
            Err(err) => {
                self.emit(OperatorEvent::BindFailed {
                    endpoint: self.endpoint,
                    reason: err.to_string(),
                });
                return Err(CoreError::Io(err));
            }
        };

        let soft_close = self.tunables.server_soft_close_on_last_exit;
        let mut ever_accepted = false;
        let mut handles = Vec::new();
        // Pinged by a handler right before it returns, so the accept loop
        // below wakes up to re-check the soft-close condition instead of
        // blocking forever on `listener.accept()`.
        let (conn_done_tx, conn_done_rx) = flume::unbounded::<()>();

        loop {
            if soft_close && ever_accepted && self.active_connections.load(Ordering::SeqCst) == 0 {
                break;
            }

            futures::select! {
                _ = stop_notifier.wait().fuse() => {
                    break;
                }
                _ = conn_done_rx.recv_async().fuse() => {
                    // Loop back around to re-check the soft-close condition.
                }
                accepted = listener.accept().fuse() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let _ = enable_tcp_nodelay(&stream);
                            self.emit(OperatorEvent::Accepted(Endpoint::Tcp(peer)));
                            ever_accepted = true;
                            self.active_connections.fetch_add(1, Ordering::SeqCst);

                            let output = self.output.clone();
                            let tunables = self.tunables.clone();
                            let handler_stop = self.stop.notifier();
                            let active = self.active_connections.clone();
                            let done_tx = conn_done_tx.clone();

                            let handle = compio::runtime::spawn(async move {
                                if let Err(err) = handle_connection(stream, output, &tunables, handler_stop).await {
                                    tracing::warn!(%err, "connection handler exited with error");
                                }
                                active.fetch_sub(1, Ordering::SeqCst);
                                let _ = done_tx.send(());
                            });
                            handles.push(handle);
                        }
                        Err(err) => {
                            tracing::warn!(%err, "accept failed");
                        }
                    }
                }
            }
        }

        for handle in handles {
            handle.await;
        }

        Ok(())
    }

    fn hard_stop_handle(&self) -> Arc<HardStop> {
        self.stop.trigger()
    }
}

impl HasOutput<Bytes> for ReliableServer {
    fn output(&self) -> &flume::Sender<Bytes> {
        &self.output
    }

    fn set_output(&mut self, output: flume::Sender<Bytes>) {
        self.output = output;
    }
}

/// Drive one accepted connection: forward DATA payloads to `output`,
/// cumulative-ack on the `hwm / ack_hwm_divisor` threshold or the
/// coalescing timer, and honor CLOSE.
async fn handle_connection(
    stream: TcpStream,
    output: flume::Sender<Bytes>,
    tunables: &Tunables,
    stop_notifier: StopNotifier,
) -> Result<()> {
    let mut io = FramedIo::new(stream);
    let mut last_received: u32 = 0;
    let mut last_acked: u32 = 0;
    let mut ack_deadline: Option<Instant> = None;
    let ack_threshold = tunables.ack_threshold();

    loop {
        let ack_timer = match ack_deadline {
            Some(deadline) => {
                Either::Left(compio::time::sleep(deadline.saturating_duration_since(Instant::now())))
            }
            None => Either::Right(futures::future::pending()),
        };

        futures::select! {
            _ = stop_notifier.wait().fuse() => {
                return Ok(());
            }
            () = ack_timer.fuse() => {
                io.write_frame(&Frame::ack(last_received)).await.map_err(CoreError::Io)?;
                last_acked = last_received;
                ack_deadline = None;
            }
            poll = io.poll_frames().fuse() => {
                match poll {
                    Ok(PollOutcome::TimedOut) => {}
                    Ok(PollOutcome::Frames(frames)) => {
                        for frame in frames {
                            match frame.command {
                                Command::Data => {
                                    last_received = frame.sequence;
                                    if output.send_async(frame.payload).await.is_err() {
                                        // Downstream operator gone; nothing
                                        // left to forward to.
                                        return Ok(());
                                    }
                                    if last_received.saturating_sub(last_acked) as usize > ack_threshold {
                                        io.write_frame(&Frame::ack(last_received)).await.map_err(CoreError::Io)?;
                                        last_acked = last_received;
                                        ack_deadline = None;
                                    } else if ack_deadline.is_none() {
                                        ack_deadline = Some(Instant::now() + tunables.ack_coalesce_interval);
                                    }
                                }
                                Command::Close => {
                                    if last_received > last_acked {
                                        let _ = io.write_frame(&Frame::ack(last_received)).await;
                                    }
                                    return Ok(());
                                }
                                Command::Ack => {
                                    return Err(CoreError::protocol("server received unexpected ACK"));
                                }
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, "connection broken");
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::endpoint::Endpoint;

    #[compio::test]
    async fn test_server_binds_and_accepts() {
        let (tx, _rx) = flume::unbounded();
        let endpoint = Endpoint::parse("tcp://127.0.0.1:0").unwrap();
        let tunables = Tunables::default();
        let mut server = ReliableServer::new(tx, endpoint, &tunables);
        let stop = server.hard_stop_handle();
        let handle = compio::runtime::spawn(async move { server.run().await });
        stop.stop();
        let result = handle.await;
        assert!(result.is_ok());
    }
}
