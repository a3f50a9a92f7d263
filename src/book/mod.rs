pub mod actor;
pub mod expiry;
pub mod order_book;
pub mod types;

pub use actor::{spawn_book_actor, BookHandle, BookSnapshot};
pub use order_book::OrderBook;
pub use types::{Fill, MatchOutcome, Order, OrderId, OrderStatus, OrderType, Side, TimeInForce};
