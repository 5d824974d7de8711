//! Festpass Server
//!
//! Runs the event registration service as a standalone HTTP server.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use festpass::{
    build_router, AdminAuth, ApiState, AppConfig, ArtifactStore, LedgerMirror, Notifier,
    PaymentGateway, PendingStore, Registrar, RegistrantStore,
};

#[derive(Parser, Debug)]
#[command(name = "festpass-server")]
#[command(about = "Event registration HTTP server")]
struct Args {
    /// Server port
    #[arg(short, long, default_value = "8080", env = "FESTPASS_PORT")]
    port: u16,

    /// Server host
    #[arg(long, default_value = "0.0.0.0", env = "FESTPASS_HOST")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("festpass=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    info!("Starting Festpass Server");
    info!("  Event code: {}", config.event_code);
    info!("  Database: {:?}", config.database_path);
    info!("  Ledger mirror: {:?}", config.ledger_path);
    info!("  Artifacts: {:?}", config.artifacts_dir);
    info!(
        "  Messaging: {}",
        if config.messaging.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );

    let store = RegistrantStore::open(&config.database_path)?;
    let ledger = LedgerMirror::new(config.ledger_path.clone())?;
    let pending = PendingStore::new(Duration::from_secs(config.pending_ttl_secs));
    let gateway = PaymentGateway::new(&config.gateway);
    let notifier = Notifier::new(config.messaging.as_ref());
    let artifacts = ArtifactStore::new(&config.artifacts_dir)?;

    let registrar = Registrar::new(
        store,
        ledger,
        pending,
        gateway,
        notifier,
        artifacts,
        config.fee.clone(),
        config.event_code.clone(),
    );
    let admin = AdminAuth::new(&config.admin);
    let state = Arc::new(ApiState::new(registrar, admin));

    let app = build_router(state);
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);
    info!("Endpoints:");
    info!("  POST /pay                  - start registration, returns payment page data");
    info!("  POST /payment-success      - finalize registration after payment");
    info!("  GET  /get-qr/:uid          - QR pass download");
    info!("  GET  /get-pdf/:uid         - PDF receipt download");
    info!("  GET  /verify/:uid          - attendance scan");
    info!("  POST /admin/login          - admin session");
    info!("  GET  /admin                - registrant listing (gated)");
    info!("  GET  /admin-dashboard      - attendance aggregates (gated)");
    info!("  POST /process_refund/:uid  - refund (gated)");
    info!("  GET  /export/csv|pdf       - snapshot exports (gated)");
    info!("  GET  /dashboard_data       - public aggregates");
    info!("  GET  /chart_data           - public chart series");

    axum::serve(listener, app).await?;
    Ok(())
}
