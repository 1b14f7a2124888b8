use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use approval_sync::cli::{Cli, Commands};
use approval_sync::store::postgres::PgStore;
use approval_sync::{api, build_ingestor, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "approval_sync=debug,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(Commands::Backfill { instance_code }) => run_backfill(cfg, &instance_code).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {e:?}");
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let ingestor = build_ingestor(&cfg, db);
    let state = Arc::new(AppState { ingestor });

    let app = api::router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_backfill(cfg: config::Config, instance_code: &str) -> anyhow::Result<()> {
    let db = PgStore::connect(&cfg.database_url).await?;
    db.migrate().await?;

    let ingestor = build_ingestor(&cfg, db.clone());
    ingestor
        .process_instance_code(instance_code)
        .await
        .map_err(|e| anyhow::anyhow!("backfill failed: {e}"))?;

    match db.get_instance(instance_code).await? {
        Some(row) => println!(
            "backfilled {}: status={} tasks={} fields={}",
            row.instance_code,
            row.status.as_deref().unwrap_or("-"),
            db.task_count(instance_code).await?,
            db.field_count(instance_code).await?,
        ),
        None => println!("backfilled {instance_code}, but no instance row was stored"),
    }
    Ok(())
}
