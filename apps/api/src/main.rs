use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use series_cell::{SeriesManager, SessionStore};
use shared_config::AppConfig;
use shared_gateways::{LogNotifier, LogPaymentGateway, RetryPolicy, RetryingNotifier};
use slot_ledger_cell::SlotLedger;
use waitlist_cell::{spawn_offer_sweeper, OfferCoordinator};

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booking API server");

    // Load configuration
    let config = AppConfig::from_env();

    // External collaborators; the log implementations stand in for the
    // real messaging and payment providers.
    let notifier = Arc::new(RetryingNotifier::new(LogNotifier, RetryPolicy::default()));
    let payments = Arc::new(LogPaymentGateway);

    // Wire the cells together around the one slot ledger.
    let ledger = Arc::new(SlotLedger::new());
    let sessions = Arc::new(SessionStore::new());
    let manager = Arc::new(SeriesManager::new(
        Arc::clone(&ledger),
        Arc::clone(&sessions),
        notifier.clone(),
        payments,
    ));
    let coordinator = Arc::new(OfferCoordinator::new(
        Arc::clone(&ledger),
        Arc::clone(&sessions),
        notifier,
        config.offer_ttl_minutes,
    ));

    // Background expiry sweep; reads also expire lazily on their own.
    spawn_offer_sweeper(
        Arc::clone(&coordinator),
        config.offer_sweep_interval_seconds,
    );

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(manager, coordinator)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::new(
        config
            .bind_host
            .parse()
            .unwrap_or(IpAddr::from([0, 0, 0, 0])),
        config.bind_port,
    );
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
