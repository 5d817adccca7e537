use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod blockchain;

// Create this node's chain, backed by storage when it can be opened
fn initialize_blockchain() -> blockchain::Blockchain {
    // The miner wallet is generated per process; rewards of every block
    // this node mines credit its address
    let miner_wallet = blockchain::Wallet::new();
    info!("Miner address: {}", miner_wallet.address());
    info!("Miner public key: {}", miner_wallet.public_key_hex());
    info!(
        "Miner private key: {}",
        hex::encode(miner_wallet.export_secret_key())
    );

    let data_dir = std::env::var("POWLEDGER_DATA_DIR")
        .unwrap_or_else(|_| "data/powledger".to_string());

    match blockchain::Blockchain::with_storage(miner_wallet.address().clone(), &data_dir) {
        Ok(chain) => {
            info!("Chain backed by storage at {}", data_dir);
            chain
        }
        Err(err) => {
            warn!("Failed to open storage: {}", err);
            warn!("Running with an in-memory chain instead");
            blockchain::Blockchain::new(miner_wallet.address().clone())
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_pending_transactions,
        api::handlers::new_transaction,
        api::handlers::mine,
        api::handlers::start_mining,
        api::handlers::stop_mining,
        api::handlers::consensus,
        api::handlers::get_balance,
        api::handlers::get_block_by_index,
        api::handlers::get_block_by_hash,
        api::handlers::get_transactions_by_address,
        api::handlers::get_transaction_by_hash,
        api::handlers::create_wallet,
        api::handlers::validate_chain
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::TransactionRequest,
            blockchain::crypto::Address,
            blockchain::crypto::DigitalSignature,
            api::handlers::ChainResponse,
            api::handlers::PoolResponse,
            api::handlers::StatusResponse,
            api::handlers::NeighborChain,
            api::handlers::ConsensusRequest,
            api::handlers::ConsensusResponse,
            api::handlers::BalanceResponse,
            api::handlers::BlockHashRequest,
            api::handlers::TransactionHashRequest,
            api::handlers::WalletResponse
        )
    ),
    tags(
        (name = "powledger", description = "Proof-of-work ledger node endpoints")
    ),
    info(
        title = "Powledger API",
        version = "1.0.0",
        description = "A proof-of-work ledger node"
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let blockchain = web::Data::new(initialize_blockchain());
    let miner = web::Data::new(blockchain::Miner::new(blockchain.get_ref().clone()));

    info!("Starting HTTP server at http://localhost:{}", port);

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(blockchain.clone())
            .app_data(miner.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind(("127.0.0.1", port))?
    .run()
    .await
}
