use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::transaction::TransactionError;
use crate::blockchain::{Address, Block, Blockchain, Miner, Transaction, TransactionRequest, Wallet};

/// Shared handle to the node's chain
pub type BlockchainData = web::Data<Blockchain>;

/// Shared handle to the node's mining task
pub type MinerData = web::Data<Miner>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,
}

/// Response for the pending transactions endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct PoolResponse {
    /// The pending transactions, in submission order
    pub transactions: Vec<Transaction>,

    /// The number of pending transactions
    pub length: usize,
}

/// Generic status message
#[derive(Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// The outcome message
    pub message: String,
}

/// One already-fetched neighbor chain
#[derive(Serialize, Deserialize, ToSchema)]
pub struct NeighborChain {
    /// Identifier of the peer, for diagnostics
    pub peer: String,

    /// The peer's full chain
    pub chain: Vec<Block>,
}

/// Request for the consensus endpoint.
///
/// Peer chain retrieval happens outside the node; this endpoint consumes
/// the fetched chains.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ConsensusRequest {
    /// The neighbor chains to compare against
    pub neighbors: Vec<NeighborChain>,
}

/// Response for the consensus endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ConsensusResponse {
    /// Whether the local chain was replaced
    pub replaced: bool,

    /// The chain length after resolution
    pub length: usize,
}

/// Response for the balance endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    /// The queried address
    pub address: String,

    /// Received minus sent, rewards included
    pub balance: i64,
}

/// Request for the block-by-hash endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BlockHashRequest {
    /// The hex hash of the block
    pub hash: String,
}

/// Request for the transaction-by-hash endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionHashRequest {
    /// The transfer hash of the transaction
    pub transaction_hash: String,
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The wallet's public key (hex encoded)
    pub public_key: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

/// Get the full blockchain
///
/// Returns every block for export to peers or inspection
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> impl Responder {
    let chain = blockchain.chain();

    HttpResponse::Ok().json(ChainResponse {
        length: chain.len(),
        chain,
    })
}

/// Get all pending transactions
///
/// Returns the pool snapshot in submission order
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = PoolResponse)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    let transactions = blockchain.pending_transactions();

    HttpResponse::Ok().json(PoolResponse {
        length: transactions.len(),
        transactions,
    })
}

/// Submit a signed transaction
///
/// The transaction must be signed client-side; the node verifies the
/// signature before admitting it to the pool
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction admitted to the pool", body = StatusResponse),
        (status = 400, description = "Malformed request or invalid signature")
    )
)]
pub async fn new_transaction(
    blockchain: BlockchainData,
    request: web::Json<TransactionRequest>,
) -> impl Responder {
    let transaction = match request.into_inner().into_transaction() {
        Ok(tx) => tx,
        Err(err @ TransactionError::MalformedRequest(_)) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": err.to_string()
            }));
        }
        Err(err) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Invalid transaction: {}", err)
            }));
        }
    };

    match blockchain.add_transaction(transaction) {
        Ok(()) => HttpResponse::Created().json(StatusResponse {
            message: "Transaction will be added to the next block".to_string(),
        }),
        Err(err) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Failed to add transaction: {}", err)
        })),
    }
}

/// Mine one block
///
/// Drains the pool into a new block and solves the proof-of-work puzzle.
/// The search runs on the blocking pool; the handler stays responsive.
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    responses(
        (status = 200, description = "Block mined successfully", body = ChainResponse),
        (status = 500, description = "Mining failed")
    )
)]
pub async fn mine(blockchain: BlockchainData) -> impl Responder {
    let chain = blockchain.clone();
    let mined = web::block(move || chain.mine()).await;

    match mined {
        Ok(true) => {
            let chain = blockchain.chain();
            HttpResponse::Ok().json(ChainResponse {
                length: chain.len(),
                chain,
            })
        }
        Ok(false) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "Mining failed"
        })),
        Err(err) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Mining task failed: {}", err)
        })),
    }
}

/// Start periodic mining
///
/// Spawns the repeating mining task; a no-op when one is already running
#[utoipa::path(
    post,
    path = "/api/v1/mine/start",
    responses(
        (status = 200, description = "Mining task running", body = StatusResponse)
    )
)]
pub async fn start_mining(miner: MinerData) -> impl Responder {
    miner.start();
    HttpResponse::Ok().json(StatusResponse {
        message: "Mining task running".to_string(),
    })
}

/// Stop periodic mining
///
/// Cancels the repeating task; an in-flight mining run completes first
#[utoipa::path(
    post,
    path = "/api/v1/mine/stop",
    responses(
        (status = 200, description = "Mining task stopped", body = StatusResponse)
    )
)]
pub async fn stop_mining(miner: MinerData) -> impl Responder {
    miner.stop();
    HttpResponse::Ok().json(StatusResponse {
        message: "Mining task stopped".to_string(),
    })
}

/// Resolve conflicts against neighbor chains
///
/// Adopts the longest valid neighbor chain strictly longer than the local
/// one; ties and invalid chains never replace
#[utoipa::path(
    put,
    path = "/api/v1/consensus",
    request_body = ConsensusRequest,
    responses(
        (status = 200, description = "Consensus resolution outcome", body = ConsensusResponse)
    )
)]
pub async fn consensus(
    blockchain: BlockchainData,
    request: web::Json<ConsensusRequest>,
) -> impl Responder {
    let neighbors = request
        .into_inner()
        .neighbors
        .into_iter()
        .map(|neighbor| (neighbor.peer, neighbor.chain))
        .collect();

    let replaced = blockchain.resolve_conflicts(neighbors);

    HttpResponse::Ok().json(ConsensusResponse {
        replaced,
        length: blockchain.len(),
    })
}

/// Get an address balance
///
/// Replays every mined transaction to compute received minus sent
#[utoipa::path(
    get,
    path = "/api/v1/balance/{address}",
    responses(
        (status = 200, description = "Balance computed successfully", body = BalanceResponse)
    )
)]
pub async fn get_balance(
    blockchain: BlockchainData,
    address: web::Path<String>,
) -> impl Responder {
    let address = Address(address.into_inner());
    let balance = blockchain.balance_of(&address);

    HttpResponse::Ok().json(BalanceResponse {
        address: address.0,
        balance,
    })
}

/// Get a block by chain position
#[utoipa::path(
    get,
    path = "/api/v1/blocks/{index}",
    responses(
        (status = 200, description = "Block found", body = Block),
        (status = 404, description = "No block at that position")
    )
)]
pub async fn get_block_by_index(
    blockchain: BlockchainData,
    index: web::Path<usize>,
) -> impl Responder {
    match blockchain.block_by_index(index.into_inner()) {
        Some(block) => HttpResponse::Ok().json(block),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Block not found"
        })),
    }
}

/// Get a block by hash
#[utoipa::path(
    post,
    path = "/api/v1/blocks/hash",
    request_body = BlockHashRequest,
    responses(
        (status = 200, description = "Block found", body = Block),
        (status = 404, description = "No block with that hash")
    )
)]
pub async fn get_block_by_hash(
    blockchain: BlockchainData,
    request: web::Json<BlockHashRequest>,
) -> impl Responder {
    match blockchain.block_by_hash(&request.hash) {
        Some(block) => HttpResponse::Ok().json(block),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Block not found"
        })),
    }
}

/// List mined transactions touching an address
#[utoipa::path(
    get,
    path = "/api/v1/address/{address}/transactions",
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_transactions_by_address(
    blockchain: BlockchainData,
    address: web::Path<String>,
) -> impl Responder {
    let address = Address(address.into_inner());
    HttpResponse::Ok().json(blockchain.transactions_for_address(&address))
}

/// Get a mined transaction by its transfer hash
#[utoipa::path(
    post,
    path = "/api/v1/transactions/hash",
    request_body = TransactionHashRequest,
    responses(
        (status = 200, description = "Transaction found", body = Transaction),
        (status = 404, description = "No transaction with that hash")
    )
)]
pub async fn get_transaction_by_hash(
    blockchain: BlockchainData,
    request: web::Json<TransactionHashRequest>,
) -> impl Responder {
    match blockchain.transaction_by_hash(&request.transaction_hash) {
        Some(tx) => HttpResponse::Ok().json(tx),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Transaction not found"
        })),
    }
}

/// Create a new wallet
///
/// Generates a fresh keypair. The private key is returned once and never
/// stored by the node
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse)
    )
)]
pub async fn create_wallet() -> impl Responder {
    let wallet = Wallet::new();

    HttpResponse::Created().json(WalletResponse {
        address: wallet.address().0.clone(),
        public_key: wallet.public_key_hex(),
        private_key: hex::encode(wallet.export_secret_key()),
    })
}

/// Check if the local chain is valid
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.is_valid())
}
