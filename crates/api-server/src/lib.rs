#![warn(clippy::unwrap_used)]

//! HTTP surface: bearer-auth REST handlers over the engine
//! crates, wired together by `ApiServer`. Generalizes a REST + gRPC +
//! Swagger surface over a single processing engine down to the
//! JSON-only contract, dropping gRPC/OpenAPI generation —
//! this backend has no OpenRTB-style binary protocol to mirror and no
//! external spec to render (see DESIGN.md for the dependency drop).

pub mod auth;
pub mod conversion;
pub mod crm_types;
pub mod error;
pub mod handlers;
pub mod orchestration;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::ApiServer;
pub use state::AppState;
