//! Reliable transport client (spec §4.8). Grounded on `transport/client.go`.
//!
//! Reliable, in-order, at-least-once delivery of byte payloads over a
//! single TCP connection, with automatic reconnection and replay of
//! unacknowledged payloads from the sequential buffer.

use super::io::{data_frame, FramedIo, PollOutcome, POLL_INTERVAL};
use super::CLOSE_SEQUENCE;
use async_trait::async_trait;
use bytes::Bytes;
use compio::net::TcpStream;
use conveyor_core::buffer::SequentialBuffer;
use conveyor_core::endpoint::Endpoint;
use conveyor_core::error::Result;
use conveyor_core::events::{EventSender, OperatorEvent};
use conveyor_core::operator::{HardStop, HasInput, Operator, StopHandle, StopNotifier};
use conveyor_core::options::Tunables;
use conveyor_core::reconnect::RetryState;
use conveyor_core::tcp::enable_tcp_nodelay;
use conveyor_wire::{Command, Frame};
use futures::future::Either;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Instant;

use crate::batcher::ProcessedNotifier;

/// Outcome of a single connection attempt's session loop.
enum SessionOutcome {
    /// The caller asked us to hard-stop.
    HardStopped,
    /// The upstream input closed, the buffer drained, and a CLOSE frame went
    /// out — a clean, permanent shutdown.
    Closed,
    /// The connection broke (send, receive, or ack timeout); the caller
    /// should reconnect.
    Failed,
}

/// Sends byte payloads from an upstream queue to a server over TCP,
/// buffering unacknowledged payloads and replaying them across reconnects.
pub struct ReliableClient {
    input: flume::Receiver<Bytes>,
    endpoint: Endpoint,
    tunables: Tunables,
    buffer: SequentialBuffer,
    retry: RetryState,
    notifier: ProcessedNotifier,
    events: Option<EventSender>,
    stop: StopHandle,
}

impl ReliableClient {
    /// Build a client that drains `input` to `endpoint`, using `tunables`
    /// for the high-water mark, ack timeout, and retry budget.
    #[must_use]
    pub fn new(input: flume::Receiver<Bytes>, endpoint: Endpoint, tunables: &Tunables) -> Self {
        Self {
            input,
            endpoint,
            buffer: SequentialBuffer::new(tunables.hwm),
            retry: RetryState::new(tunables),
            notifier: ProcessedNotifier::new(),
            events: None,
            stop: StopHandle::new(),
            tunables: tunables.clone(),
        }
    }

    /// Route lifecycle events (connect/disconnect/failure) to `events`.
    #[must_use]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// A handle downstream (e.g. a batcher feeding this client) uses to
    /// learn how many more payloads it may safely have outstanding: each ack
    /// advances this by the number of newly-acknowledged payloads.
    #[must_use]
    pub fn notifier(&self) -> ProcessedNotifier {
        self.notifier.clone()
    }

    fn emit(&self, event: OperatorEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    async fn run_session(&mut self, stream: TcpStream, stop_notifier: &StopNotifier) -> SessionOutcome {
        let mut io = FramedIo::new(stream);

        if !self.buffer.is_empty() {
            for (seq, payload) in self.buffer.reset() {
                if let Err(err) = io.write_frame(&data_frame(seq, payload)).await {
                    tracing::warn!(%err, "replay write failed, reconnecting");
                    return SessionOutcome::Failed;
                }
            }
        }

        let mut ack_deadline =
            (!self.buffer.is_empty()).then(|| Instant::now() + self.tunables.ack_timeout);
        let mut closing = false;

        loop {
            match io.poll_frames().await {
                Ok(PollOutcome::TimedOut) => {}
                Ok(PollOutcome::Frames(frames)) => {
                    for frame in frames {
                        if frame.command != Command::Ack {
                            tracing::warn!(?frame.command, "unexpected command from server");
                            return SessionOutcome::Failed;
                        }
                        let before = self.buffer.len();
                        self.buffer.ack(u64::from(frame.sequence));
                        self.retry.reset();
                        let newly_acked = before.saturating_sub(self.buffer.len());
                        if newly_acked > 0 {
                            self.notifier.notify(newly_acked as u64);
                        }
                        ack_deadline = (!self.buffer.is_empty())
                            .then(|| Instant::now() + self.tunables.ack_timeout);
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "receive direction broken");
                    return SessionOutcome::Failed;
                }
            }

            if closing && self.buffer.is_empty() {
                let _ = io.write_frame(&Frame::close(CLOSE_SEQUENCE)).await;
                return SessionOutcome::Closed;
            }

            let ack_timer = match ack_deadline {
                Some(deadline) => {
                    Either::Left(compio::time::sleep(deadline.saturating_duration_since(Instant::now())))
                }
                None => Either::Right(futures::future::pending()),
            };
            let upstream_fut = if !closing && self.buffer.can_add() {
                Either::Left(self.input.recv_async())
            } else {
                Either::Right(futures::future::pending())
            };

            futures::select! {
                _ = stop_notifier.wait().fuse() => {
                    return SessionOutcome::HardStopped;
                }
                () = compio::time::sleep(POLL_INTERVAL).fuse() => {
                    // Cadence tick: loop back around to poll the socket again.
                }
                () = ack_timer.fuse() => {
                    tracing::warn!("ack timeout waiting for server, reconnecting");
                    return SessionOutcome::Failed;
                }
                item = upstream_fut.fuse() => {
                    match item {
                        Ok(payload) => {
                            let seq = self
                                .buffer
                                .add(payload.clone())
                                .expect("upstream branch only enabled when buffer.can_add()");
                            if let Err(err) = io.write_frame(&data_frame(seq, payload)).await {
                                tracing::warn!(%err, "send direction broken");
                                return SessionOutcome::Failed;
                            }
                            if ack_deadline.is_none() {
                                ack_deadline = Some(Instant::now() + self.tunables.ack_timeout);
                            }
                        }
                        Err(_) => {
                            closing = true;
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Operator for ReliableClient {
    async fn run(&mut self) -> Result<()> {
        let stop_notifier = self.stop.notifier();

        loop {
            if self.retry.exhausted() {
                tracing::warn!(
                    buffered = self.buffer.len(),
                    attempts = self.retry.max_retries(),
                    "retry budget exhausted, giving up with buffered payloads unsent"
                );
                return Ok(());
            }
            self.retry.next_delay();

            let outcome = match TcpStream::connect(self.endpoint.addr()).await {
                Ok(stream) => {
                    let _ = enable_tcp_nodelay(&stream);
                    self.emit(OperatorEvent::Connected(self.endpoint));
                    let outcome = self.run_session(stream, &stop_notifier).await;
                    if matches!(outcome, SessionOutcome::Failed) {
                        self.emit(OperatorEvent::Disconnected(self.endpoint));
                    }
                    outcome
                }
                Err(err) => {
                    self.emit(OperatorEvent::ConnectFailed {
                        endpoint: self.endpoint,
                        reason: err.to_string(),
                    });
                    SessionOutcome::Failed
                }
            };

            match outcome {
                SessionOutcome::HardStopped | SessionOutcome::Closed => return Ok(()),
                SessionOutcome::Failed => {
                    futures::select! {
                        _ = stop_notifier.wait().fuse() => return Ok(()),
                        () = compio::time::sleep(self.retry.interval()).fuse() => {}
                    }
                }
            }
        }
    }

    fn hard_stop_handle(&self) -> Arc<HardStop> {
        self.stop.trigger()
    }
}

impl HasInput<Bytes> for ReliableClient {
    fn input(&self) -> &flume::Receiver<Bytes> {
        &self.input
    }

    fn set_input(&mut self, input: flume::Receiver<Bytes>) {
        self.input = input;
    }
}
