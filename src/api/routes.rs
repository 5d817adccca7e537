use actix_web::web;

use super::handlers;

/// Configures the API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/chain", web::get().to(handlers::get_chain))
            .route("/transactions", web::get().to(handlers::get_pending_transactions))
            .route("/transactions", web::post().to(handlers::new_transaction))
            .route("/transactions/hash", web::post().to(handlers::get_transaction_by_hash))
            .route("/mine", web::post().to(handlers::mine))
            .route("/mine/start", web::post().to(handlers::start_mining))
            .route("/mine/stop", web::post().to(handlers::stop_mining))
            .route("/consensus", web::put().to(handlers::consensus))
            .route("/balance/{address}", web::get().to(handlers::get_balance))
            .route("/blocks/hash", web::post().to(handlers::get_block_by_hash))
            .route("/blocks/{index}", web::get().to(handlers::get_block_by_index))
            .route(
                "/address/{address}/transactions",
                web::get().to(handlers::get_transactions_by_address),
            )
            .route("/wallet/new", web::post().to(handlers::create_wallet))
            .route("/validate", web::get().to(handlers::validate_chain)),
    );
}
