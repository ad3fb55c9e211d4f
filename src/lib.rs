//! Account content deletion worker.
//!
//! Delete requests arrive on a queue; for each one the [`pipeline`] pages
//! through the account's content records in the [`store`] and deletes them in
//! batches with a bounded pool of workers.

#[cfg(feature = "aws-sdk")]
pub mod aws;
pub mod config;
pub mod observability;
pub mod pipeline;
pub mod queue;
pub mod seed;
pub mod service;
pub mod store;
