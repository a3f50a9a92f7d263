//! Signed-order gateway & session permits (C7).

pub mod eip712;
pub mod policy;
pub mod session;

pub use eip712::{
    CancelTypedMessage, Eip712Domain, OrderTypedMessage, SessionPermitTypedMessage,
    SessionRevokeTypedMessage,
};
pub use policy::{GatewayRateLimiter, PolicyConfig, RateLimitConfig};
pub use session::{NonceStore, Session, SessionStatus};
