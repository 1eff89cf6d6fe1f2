use std::net::SocketAddr;
use std::sync::Arc;

use api_server::http::{AppState, build_router};
use api_server::session_purge::run_purge_loop;
use campaign_engine::config::{ApiConfig, load_dotenv};
use campaign_engine::llm::{ChatCompletionsConfig, ChatCompletionsGateway};
use campaign_engine::session::{SessionEngine, SessionRegistry};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

const DEFAULT_LOG_FILTER: &str = "api_server=info,campaign_engine=info,axum=info";

#[tokio::main]
async fn main() {
    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let config = match ApiConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to read config: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(config.json_logs);

    let llm_config = match ChatCompletionsConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to read completion provider config");
            std::process::exit(1);
        }
    };
    let gateway = match ChatCompletionsGateway::new(llm_config) {
        Ok(gateway) => gateway,
        Err(err) => {
            error!(error = %err, "failed to initialize completion gateway");
            std::process::exit(1);
        }
    };
    info!(model = gateway.model(), "completion gateway ready");

    let registry = Arc::new(SessionRegistry::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let purge_task = tokio::spawn(run_purge_loop(
        registry.clone(),
        config.session_idle_ttl_seconds,
        config.session_purge_interval_seconds,
        shutdown_rx,
    ));

    let app = build_router(AppState {
        engine: SessionEngine::new(Arc::new(gateway)),
        registry,
    });

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(bind_addr = %config.bind_addr, "invalid API_BIND_ADDR: {err}");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%addr, "failed to bind listener: {err}");
            std::process::exit(1);
        }
    };

    info!(
        "api server listening on {}",
        listener.local_addr().unwrap_or(addr)
    );

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = signal::ctrl_c().await;
        info!("shutdown signal received");
    });
    if let Err(err) = server.await {
        error!("server exited with error: {err}");
    }

    let _ = shutdown_tx.send(true);
    if let Err(err) = purge_task.await {
        error!("session purge task failed: {err}");
    }
}

fn init_tracing(json_logs: bool) {
    let filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
