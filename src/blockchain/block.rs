use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// Previous-hash value of the genesis block: 64 zero characters
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// An ordered batch of transactions plus its linkage metadata and
/// proof-of-work nonce.
///
/// Blocks are immutable once appended; only the nonce varies while a
/// candidate is being mined. The block hash is always computed on demand
/// from the full contents, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Proof-of-work nonce
    pub nonce: u64,

    /// Hex hash of the previous block
    pub previous_hash: String,

    /// Creation time in unix milliseconds
    pub timestamp: i64,

    /// Transactions captured from the pool, plus the reward transaction
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block linked to the given previous hash
    pub fn new(nonce: u64, previous_hash: String, transactions: Vec<Transaction>) -> Self {
        Block {
            nonce,
            previous_hash,
            timestamp: Utc::now().timestamp_millis(),
            transactions,
        }
    }

    /// The deterministic genesis block.
    ///
    /// Fixed in every field so that independently started nodes agree on
    /// block 0 and can adopt each other's chains. Genesis is exempt from
    /// the proof-of-work predicate; `is_valid_chain` checks its shape
    /// instead.
    pub fn genesis() -> Self {
        Block {
            nonce: 0,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            timestamp: 0,
            transactions: Vec::new(),
        }
    }

    /// Calculates the hex SHA-256 hash over the canonical block encoding
    pub fn calculate_hash(&self) -> String {
        let block_data = serde_json::json!({
            "nonce": self.nonce,
            "previous_hash": self.previous_hash,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
        });

        // Canonical encoding of a fixed-shape value cannot fail
        let encoded = serde_json::to_string(&block_data).unwrap();

        let mut hasher = Sha256::new();
        hasher.update(encoded.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Proof-of-work predicate: the hex hash starts with `difficulty`
    /// zero characters
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.calculate_hash().starts_with(&"0".repeat(difficulty))
    }

    /// Checks the deterministic genesis shape
    pub fn is_valid_genesis(&self) -> bool {
        self.nonce == 0
            && self.previous_hash == GENESIS_PREVIOUS_HASH
            && self.timestamp == 0
            && self.transactions.is_empty()
    }
}
