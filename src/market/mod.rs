pub mod registry;
pub mod types;

pub use registry::MarketRegistry;
pub use types::{Market, MarketStatus};
