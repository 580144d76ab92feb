//! REST surface: routes, handlers and the `PURGE` middleware

pub mod extract;
pub mod handler;
pub mod purge;
pub mod server;
pub mod state;

pub use server::{build_router, GatewayApp, GatewayServer};
pub use state::AppState;
