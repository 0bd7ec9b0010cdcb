mod auth;
mod connection;
mod middleware;
mod protocol;
mod routes;
mod server;
mod state;

pub use protocol::{ClientFrame, ErrorBody, EventPayload, ServerEvent, ServerResponse};
pub use server::{router, GatewayServer};
pub use state::AppState;
