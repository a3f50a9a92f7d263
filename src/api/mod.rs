//! HTTP gateway surface: signed-order submission, session permits,
//! market/book/position reads, and the `/health` and `/metrics` endpoints.

pub mod error_response;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
