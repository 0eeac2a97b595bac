//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, tracing span)
//!     → handlers.rs (extract, call RulesService)
//!     → response.rs (RuleError → status code + JSON body)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::ApiError;
pub use server::{build_router, AppState, HttpServer};
