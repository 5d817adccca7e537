use std::sync::{Arc, Mutex};

use log::{error, info, warn};
use thiserror::Error;

use super::block::Block;
use super::crypto::Address;
use super::storage::{BlockchainStorage, StorageError};
use super::transaction::{Transaction, TransactionError};

/// Number of leading zero characters a block hash must carry
pub const MINING_DIFFICULTY: usize = 3;

/// Amount credited to the miner address by each reward transaction
pub const MINING_REWARD: u64 = 1;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Signature verification failed for transaction {0}")]
    InvalidSignature(String),

    #[error("Transaction {0} is already pending")]
    DuplicateTransaction(String),

    #[error("Linkage mismatch: block points at {got}, chain head is {expected}")]
    LinkageMismatch { expected: String, got: String },
}

/// The `{blocks, pool}` pair, guarded as one unit.
///
/// Holding both under a single mutex means no caller can observe a chain
/// mid-replacement or a pool mid-clear.
#[derive(Debug)]
struct ChainState {
    blocks: Vec<Block>,
    pool: Vec<Transaction>,
}

impl ChainState {
    fn last_hash(&self) -> String {
        // A chain always holds at least its genesis block
        self.blocks.last().unwrap().calculate_hash()
    }

    /// Appends a block after checking its linkage against the chain head.
    ///
    /// Proof-of-work is not re-checked here; it was established during
    /// mining. A mismatch is refused and the chain left untouched.
    fn append_block(&mut self, block: Block) -> Result<(), ChainError> {
        let expected = self.last_hash();
        if block.previous_hash != expected {
            return Err(ChainError::LinkageMismatch {
                expected,
                got: block.previous_hash,
            });
        }

        self.blocks.push(block);
        Ok(())
    }
}

/// A single node's append-only chain of blocks plus its pending
/// transaction pool.
///
/// Cloning shares the underlying state; one `Blockchain` handle is passed
/// into the HTTP layer and the miner. All mutation (pool admission,
/// mining, consensus replacement) and all reads serialize on the same
/// per-instance mutex.
#[derive(Debug, Clone)]
pub struct Blockchain {
    state: Arc<Mutex<ChainState>>,

    /// Address credited by the reward transaction of each mined block
    miner_address: Address,

    /// Optional persistence hook for mined and adopted blocks
    storage: Option<Arc<BlockchainStorage>>,
}

impl Blockchain {
    /// Creates a genesis-only in-memory chain
    pub fn new(miner_address: Address) -> Self {
        Blockchain {
            state: Arc::new(Mutex::new(ChainState {
                blocks: vec![Block::genesis()],
                pool: Vec::new(),
            })),
            miner_address,
            storage: None,
        }
    }

    /// Creates a chain backed by persistent storage, resuming from the
    /// stored blocks when there are any
    pub fn with_storage<P: AsRef<std::path::Path>>(
        miner_address: Address,
        storage_path: P,
    ) -> Result<Self, ChainError> {
        let storage = Arc::new(BlockchainStorage::new(storage_path)?);

        let blocks = storage.load_chain()?;
        let blocks = if blocks.is_empty() {
            info!("No stored chain found, starting from genesis");
            let genesis = vec![Block::genesis()];
            storage.append_new(&genesis)?;
            genesis
        } else if !Self::is_valid_chain(&blocks) {
            // Corrupt or partially-decoded store; never mine on top of a
            // chain that fails validation
            warn!("Stored chain fails validation, restarting from genesis");
            let genesis = vec![Block::genesis()];
            storage.rewrite(&genesis)?;
            genesis
        } else {
            info!("Resumed chain of {} blocks from storage", blocks.len());
            blocks
        };

        Ok(Blockchain {
            state: Arc::new(Mutex::new(ChainState {
                blocks,
                pool: Vec::new(),
            })),
            miner_address,
            storage: Some(storage),
        })
    }

    /// The address credited by this node's reward transactions
    pub fn miner_address(&self) -> &Address {
        &self.miner_address
    }

    /// Snapshot of all blocks, for export and reporting
    pub fn chain(&self) -> Vec<Block> {
        self.state.lock().unwrap().blocks.clone()
    }

    /// Current chain length
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().blocks.len()
    }

    /// Read-only snapshot of the pending transaction pool
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().pool.clone()
    }

    /// Verifies a transaction's signature and admits it to the pool.
    ///
    /// A transaction failing verification is discarded, not retried, and
    /// the pool is left unchanged. Pool membership identity is the
    /// transfer hash, so resubmitting an already-pending transaction is
    /// refused rather than mined twice. Admission decisions are
    /// serialized by the chain mutex.
    pub fn add_transaction(&self, transaction: Transaction) -> Result<(), ChainError> {
        if !transaction.verify() {
            return Err(ChainError::InvalidSignature(transaction.tx_hash));
        }

        let mut state = self.state.lock().unwrap();
        if state.pool.contains(&transaction) {
            return Err(ChainError::DuplicateTransaction(transaction.tx_hash));
        }

        state.pool.push(transaction);
        info!("Transaction admitted, pool size {}", state.pool.len());
        Ok(())
    }

    /// Mines one block: snapshots the pool plus a reward transaction,
    /// searches nonces until the difficulty predicate holds, appends the
    /// solved block and clears the pool, all as one critical section.
    ///
    /// Returns false only if the solved block is refused at append, which
    /// is unreachable while the mutex discipline holds.
    pub fn mine(&self) -> bool {
        let mut state = self.state.lock().unwrap();

        let mut transactions = state.pool.clone();
        transactions.push(Transaction::new_reward(
            self.miner_address.clone(),
            MINING_REWARD,
        ));

        let mut block = Block::new(0, state.last_hash(), transactions);
        while !block.meets_difficulty(MINING_DIFFICULTY) {
            block.nonce += 1;
        }

        let nonce = block.nonce;
        if let Err(err) = state.append_block(block) {
            error!("Mined block refused: {}", err);
            return false;
        }
        state.pool.clear();

        let height = state.blocks.len();
        info!("Mined block {} with nonce {}", height - 1, nonce);

        let snapshot = state.blocks.clone();
        drop(state);

        self.persist_appended(&snapshot);
        true
    }

    /// Validates a candidate chain wholesale.
    ///
    /// True iff the chain is non-empty, starts with a valid genesis, every
    /// later block links to its predecessor's hash and satisfies the
    /// proof-of-work predicate, and every non-reward transaction verifies
    /// against its own embedded public key.
    pub fn is_valid_chain(blocks: &[Block]) -> bool {
        let genesis = match blocks.first() {
            Some(block) => block,
            None => return false,
        };
        if !genesis.is_valid_genesis() {
            return false;
        }

        for i in 1..blocks.len() {
            let block = &blocks[i];

            if block.previous_hash != blocks[i - 1].calculate_hash() {
                return false;
            }
            if !block.meets_difficulty(MINING_DIFFICULTY) {
                return false;
            }
            if !block
                .transactions
                .iter()
                .all(|tx| tx.is_reward() || tx.verify())
            {
                return false;
            }
        }

        true
    }

    /// Validates this node's own chain
    pub fn is_valid(&self) -> bool {
        Self::is_valid_chain(&self.state.lock().unwrap().blocks)
    }

    /// Adopts the longest valid neighbor chain that is strictly longer
    /// than the local one.
    ///
    /// Candidates failing validation are ignored; equal-length candidates
    /// never trigger a replacement. Adopting a chain drops the local pool,
    /// since pending transactions may already be reflected in, or conflict
    /// with, the adopted chain. Runs under the same mutex as mining, so
    /// the two never interleave. Returns true iff a replacement occurred.
    pub fn resolve_conflicts(&self, neighbor_chains: Vec<(String, Vec<Block>)>) -> bool {
        let mut state = self.state.lock().unwrap();

        let mut longest: Option<Vec<Block>> = None;
        let mut max_length = state.blocks.len();

        for (peer, candidate) in neighbor_chains {
            if candidate.len() <= max_length {
                info!(
                    "Peer {} chain of {} blocks is not longer than {}, skipping",
                    peer,
                    candidate.len(),
                    max_length
                );
                continue;
            }
            if !Self::is_valid_chain(&candidate) {
                warn!("Peer {} offered an invalid chain, ignoring", peer);
                continue;
            }

            info!("Peer {} offers a valid chain of {} blocks", peer, candidate.len());
            max_length = candidate.len();
            longest = Some(candidate);
        }

        match longest {
            Some(chain) => {
                state.blocks = chain;
                state.pool.clear();
                info!("Local chain replaced, new length {}", state.blocks.len());

                let snapshot = state.blocks.clone();
                drop(state);

                self.persist_replaced(&snapshot);
                true
            }
            None => false,
        }
    }

    /// Computes an address's balance by replaying every transaction in
    /// chain order: received minus sent, rewards included.
    ///
    /// Takes the chain lock for the whole read, so it never observes a
    /// chain mid-replacement.
    pub fn balance_of(&self, address: &Address) -> i64 {
        let state = self.state.lock().unwrap();

        let mut balance: i64 = 0;
        for block in &state.blocks {
            for tx in &block.transactions {
                if tx.recipient == *address {
                    balance += tx.amount as i64;
                }
                if tx.sender == *address {
                    balance -= tx.amount as i64;
                }
            }
        }

        balance
    }

    /// Looks up a block by its position in the chain
    pub fn block_by_index(&self, index: usize) -> Option<Block> {
        self.state.lock().unwrap().blocks.get(index).cloned()
    }

    /// Looks up a block by its hex hash
    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.state
            .lock()
            .unwrap()
            .blocks
            .iter()
            .find(|block| block.calculate_hash() == hash)
            .cloned()
    }

    /// Collects every mined transaction sent from or received at an address
    pub fn transactions_for_address(&self, address: &Address) -> Vec<Transaction> {
        let state = self.state.lock().unwrap();

        state
            .blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| tx.sender == *address || tx.recipient == *address)
            .cloned()
            .collect()
    }

    /// Looks up a mined transaction by its transfer hash
    pub fn transaction_by_hash(&self, tx_hash: &str) -> Option<Transaction> {
        let state = self.state.lock().unwrap();

        state
            .blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .find(|tx| tx.tx_hash == tx_hash)
            .cloned()
    }

    fn persist_appended(&self, blocks: &[Block]) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.append_new(blocks) {
                warn!("Failed to persist mined blocks: {}", err);
            }
        }
    }

    fn persist_replaced(&self, blocks: &[Block]) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.rewrite(blocks) {
                warn!("Failed to persist adopted chain: {}", err);
            }
        }
    }
}
