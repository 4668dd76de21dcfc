//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request pipeline)
//!     → request.rs (request ID)
//!     → [routing → security → policy]
//!     → forward.rs (stream to upstream, redirects, timeouts)
//!     → response.rs (relay status/headers/body)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::Forwarder;
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
