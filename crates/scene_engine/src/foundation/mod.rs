//! Foundation utilities: math, logging and the worker pool

pub mod logging;
pub mod math;
pub mod worker_pool;

pub use worker_pool::{await_all, Watch, WorkerPool};
