/// datagate - license-gated artifact download service
///
/// Serves a single artifact to callers holding a shared secret, answers
/// license checks for installed clients and exposes a small admin API for
/// the key generator.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod downloads;
pub mod error;
pub mod license;
pub mod server;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{GateError, GateResult};
pub use server::{build_router, serve};
