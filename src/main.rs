use loanledger::datasource::HttpSourceOfRecord;
use loanledger::orchestration::{
    EventIngestor, LoanRecomputer, RecalcJobs, RecalculationOrchestrator, SyncReconciler,
};
use loanledger::{api, config::Config, db::init_db_with_connections, Clock, Repository};
use loanledger::{SourceOfRecord, SystemClock};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match init_db_with_connections(&config.database_path, config.db_max_connections).await
    {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let source: Arc<dyn SourceOfRecord> =
        Arc::new(HttpSourceOfRecord::new(config.upstream_api_url.clone()));

    let recomputer = LoanRecomputer::new(repo.clone(), clock, config.score_weights.clone());
    let ingestor = EventIngestor::new(recomputer.clone());
    let sync = SyncReconciler::new(source, ingestor.clone(), config.sync_page_size);
    let orchestrator = RecalculationOrchestrator::new(
        recomputer,
        config.recalc_batch_size,
        config.recalc_concurrency,
    );
    let jobs = RecalcJobs::new(orchestrator);

    let app = api::create_router(api::AppState::new(repo, ingestor, sync, jobs));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        %addr,
        recalc_concurrency = config.recalc_concurrency,
        "Server listening"
    );

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
