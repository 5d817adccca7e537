use std::path::Path;

use log::warn;
use sled::{Db, Tree};
use thiserror::Error;

use super::block::Block;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

/// Persistent store for chain state.
///
/// Blocks are keyed by their big-endian chain position, transactions by
/// their transfer hash. Re-appending an already-stored position is a
/// no-op, so replaying the same chain against the store is idempotent.
pub struct BlockchainStorage {
    db: Db,

    /// Blocks keyed by big-endian index
    blocks: Tree,

    /// Mined transactions keyed by transfer hash
    transactions: Tree,
}

impl std::fmt::Debug for BlockchainStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainStorage").finish()
    }
}

impl BlockchainStorage {
    /// Opens (or creates) the store at the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;

        let blocks = db.open_tree("blocks")?;
        let transactions = db.open_tree("transactions")?;

        Ok(Self {
            db,
            blocks,
            transactions,
        })
    }

    /// Number of blocks currently stored
    pub fn height(&self) -> usize {
        self.blocks.len()
    }

    /// Appends the blocks beyond the stored height.
    ///
    /// `blocks` is the full chain; positions already present are left
    /// untouched, so calling this twice with the same chain writes nothing
    /// the second time.
    pub fn append_new(&self, blocks: &[Block]) -> Result<(), StorageError> {
        let stored = self.height();
        if blocks.len() <= stored {
            return Ok(());
        }

        for (index, block) in blocks.iter().enumerate().skip(stored) {
            self.put_block(index, block)?;
        }

        self.db.flush()?;
        Ok(())
    }

    /// Replaces the stored chain wholesale, for consensus adoption.
    ///
    /// An adopted chain can diverge from the stored prefix, so every
    /// position is rewritten.
    pub fn rewrite(&self, blocks: &[Block]) -> Result<(), StorageError> {
        self.blocks.clear()?;
        self.transactions.clear()?;

        for (index, block) in blocks.iter().enumerate() {
            self.put_block(index, block)?;
        }

        self.db.flush()?;
        Ok(())
    }

    /// Loads the stored chain sorted by position.
    ///
    /// Corrupt entries are skipped with a warning rather than taking the
    /// node down; the chain re-validates after load anyway.
    pub fn load_chain(&self) -> Result<Vec<Block>, StorageError> {
        let mut blocks = Vec::new();

        for result in self.blocks.iter() {
            let (key, value) = result?;
            match bincode::deserialize::<Block>(&value) {
                Ok(block) => blocks.push((key.to_vec(), block)),
                Err(err) => {
                    warn!(
                        "Skipping undecodable stored block {}: {}",
                        hex::encode(&key),
                        err
                    );
                }
            }
        }

        // Big-endian keys sort positionally
        blocks.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(blocks.into_iter().map(|(_, block)| block).collect())
    }

    /// Looks up a stored transaction by its transfer hash
    pub fn get_transaction(&self, tx_hash: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.transactions.get(tx_hash.as_bytes())?.map(|v| v.to_vec()))
    }

    fn put_block(&self, index: usize, block: &Block) -> Result<(), StorageError> {
        let key = (index as u64).to_be_bytes();
        let value = bincode::serialize(block)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        self.blocks.insert(key, value)?;

        for tx in &block.transactions {
            let value = bincode::serialize(tx)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?;
            self.transactions.insert(tx.tx_hash.as_bytes(), value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::chain::Blockchain;
    use crate::blockchain::crypto::Wallet;
    use crate::blockchain::transaction::Transaction;

    fn temp_store() -> BlockchainStorage {
        let dir = std::env::temp_dir().join(format!(
            "powledger-test-{}-{}",
            std::process::id(),
            rand::random::<u64>()
        ));
        BlockchainStorage::new(dir).unwrap()
    }

    fn mined_blocks(blocks_to_mine: usize) -> Vec<Block> {
        let wallet = Wallet::new();
        let chain = Blockchain::new(wallet.address().clone());
        for _ in 0..blocks_to_mine {
            assert!(chain.mine());
        }
        chain.chain()
    }

    #[test]
    fn test_append_and_load_round_trip() {
        let storage = temp_store();
        let blocks = mined_blocks(2);

        storage.append_new(&blocks).unwrap();
        assert_eq!(storage.height(), 3);

        let loaded = storage.load_chain().unwrap();
        assert_eq!(loaded, blocks);
    }

    #[test]
    fn test_append_is_idempotent_by_position() {
        let storage = temp_store();
        let blocks = mined_blocks(2);

        storage.append_new(&blocks).unwrap();
        storage.append_new(&blocks).unwrap();
        assert_eq!(storage.height(), blocks.len());

        // A shorter chain never shrinks the store
        storage.append_new(&blocks[..1]).unwrap();
        assert_eq!(storage.height(), blocks.len());
    }

    #[test]
    fn test_rewrite_replaces_stored_chain() {
        let storage = temp_store();
        storage.append_new(&mined_blocks(3)).unwrap();

        let adopted = mined_blocks(1);
        storage.rewrite(&adopted).unwrap();

        assert_eq!(storage.height(), 2);
        assert_eq!(storage.load_chain().unwrap(), adopted);
    }

    #[test]
    fn test_transactions_are_indexed_by_hash() {
        let storage = temp_store();

        let miner = Wallet::new();
        let sender = Wallet::new();
        let chain = Blockchain::new(miner.address().clone());
        let tx = Transaction::new(&sender, miner.address().clone(), 5).unwrap();
        let tx_hash = tx.tx_hash.clone();
        chain.add_transaction(tx).unwrap();
        assert!(chain.mine());

        storage.append_new(&chain.chain()).unwrap();

        assert!(storage.get_transaction(&tx_hash).unwrap().is_some());
        assert!(storage.get_transaction("missing").unwrap().is_none());
    }
}
