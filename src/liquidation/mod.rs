pub mod context;
pub mod queue;
pub mod worker;

pub use context::EngineLiquidationContext;
pub use queue::{LiquidationJob, LiquidationQueue};
pub use worker::{CloseOutcome, LiquidationContext, LiquidationParams, LiquidationWorker, ProcessResult};
