//! cluster-proxy library
//!
//! A dispatcher accepts HTTP requests and hands each one to a randomly
//! chosen worker as a JSON envelope. The worker matches a rule, calls the
//! upstream, and replies with an envelope carrying the same correlation id.

pub mod config;
pub mod http;
pub mod ipc;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod routing;
pub mod worker;

pub use config::ProxyConfig;
pub use http::{Dispatcher, HttpServer, ProxyError};
pub use lifecycle::{start, RunningProxy, Shutdown};
pub use worker::{WorkerLauncher, WorkerUnit};
