//! Transaction dispatch & nonce allocation (C8).

pub mod nonce;
pub mod receipt;
pub mod signer_pool;
pub mod submission;

pub use nonce::{ChainRpc, NonceAllocator};
pub use receipt::{KillSwitch, ReceiptRpc, ReceiptRpcError, ReceiptState, ReceiptTracker};
pub use signer_pool::{SignerPool, SignerRecord};
pub use submission::{RelayerSubmission, SubmissionLog, SubmissionStatus};
