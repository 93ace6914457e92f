//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (buffer body, collect headers)
//!     → dispatcher.rs (pick worker, send envelope, await reply)
//!     → response.rs (reply or error → status and body)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::Dispatcher;
pub use request::{InboundRequest, X_REQUEST_ID};
pub use response::{reply_into_response, ProxyError};
pub use server::HttpServer;
