//! # Conveyor
//!
//! A streaming dataflow runtime: chain operators into pipelines, fan work out
//! across a worker pool or to multiple downstream branches, adaptively batch
//! items for bulk processing, and move data between processes over a
//! reliable length-delimited framed transport.
//!
//! ## Architecture
//!
//! - **`conveyor-core`**: transport-agnostic primitives — the `Operator`
//!   lifecycle contract, buffers, tunable defaults, reconnect backoff.
//! - **`conveyor-wire`**: a sans-IO frame codec for the reliable transport.
//! - **`conveyor`** (this crate): the operators themselves (worker pools,
//!   batcher, fan-out, distributor, chain) plus, behind the `transport`
//!   feature, a TCP client/server pair implementing the wire protocol.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use conveyor::prelude::*;
//!
//! # async fn example() -> conveyor::error::Result<()> {
//! let tunables = Tunables::default();
//! let mut chain: Chain<i32> = Chain::new(&tunables);
//! let input = chain.input_sender().unwrap();
//! chain.run();
//! input.send_async(1).await.ok();
//! chain.close_input();
//! chain.wait().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Transport (opt-in via the `transport` feature)
//!
//! ```toml
//! [dependencies]
//! conveyor = { version = "0.1", features = ["transport"] }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::future_not_send)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub use bytes::Bytes;

pub mod batcher;
pub mod chain;
pub mod distributor;
pub mod error;
pub mod fanout;
pub mod ordered_chain;
pub mod pool;
pub mod runner;
pub mod worker;

#[cfg(feature = "transport")]
pub mod transport;

/// Development helpers (benches/tests)
pub mod dev_tracing;

/// Convenience re-exports of the types most pipelines need.
pub mod prelude {
    pub use crate::batcher::{BatchContainer, BatcherOperator, ProcessedNotifier, VecBatchContainer};
    pub use crate::chain::Chain;
    pub use crate::distributor::DistributorOperator;
    pub use crate::error::{ConveyorError, Result};
    pub use crate::fanout::FanoutOperator;
    pub use crate::ordered_chain::OrderedChain;
    pub use crate::pool::{OrderedPool, UnorderedPool};
    pub use crate::runner::Runner;
    pub use crate::worker::{FnWorker, Worker, WorkerFactory, WorkerOutput};
    pub use conveyor_core::prelude::*;

    #[cfg(feature = "transport")]
    pub use crate::transport::{ReliableClient, ReliableServer};
}
