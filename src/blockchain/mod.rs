// Core ledger implementation:
// - Wallets, addresses and signatures
// - Transactions and the pending pool
// - Blocks and proof-of-work hashing
// - The chain, mining and longest-chain consensus
// - The periodic mining task
// - Persistence of mined and adopted blocks

pub mod block;
pub mod chain;
pub mod crypto;
pub mod miner;
pub mod storage;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::Blockchain;
pub use crypto::{Address, DigitalSignature, Wallet};
pub use miner::Miner;
pub use transaction::{Transaction, TransactionRequest};
