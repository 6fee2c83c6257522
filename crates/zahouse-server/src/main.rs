mod error;
mod logging;
mod routes;

use std::{collections::VecDeque, sync::Arc, time::Instant};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::sync::broadcast;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zahouse_agent::{build_backend, LlmBackend, ThreadMemory};
use zahouse_core::{
    config::Config,
    knowledge::KnowledgeBase,
    mailer::{mailer_from_config, Mailer},
    search::{search_from_config, SearchService},
    store::{InquiryStore, LeadStore},
};

use crate::logging::{BroadcastLayer, LOG_RING_CAPACITY};

const DEFAULT_LOG_FILTER: &str =
    "zahouse_server=info,zahouse_core=info,zahouse_agent=info,tower_http=info";

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub config: Arc<Config>,
    pub start_time: Instant,
    pub log_tx: broadcast::Sender<String>,
    pub log_ring: Arc<std::sync::Mutex<VecDeque<String>>>,
    pub backend: Arc<dyn LlmBackend>,
    pub search: Arc<dyn SearchService>,
    pub mailer: Arc<dyn Mailer>,
    pub knowledge: Arc<KnowledgeBase>,
    pub leads: LeadStore,
    pub inquiries: InquiryStore,
    pub memory: ThreadMemory,
}

pub(crate) fn app(state: Arc<AppState>) -> Router {
    let public_dir = state.config.public_dir.clone();
    let serve_dir =
        ServeDir::new(&public_dir).fallback(ServeFile::new(format!("{public_dir}/index.html")));
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        // Health
        .route("/api/health", get(routes::health))
        .route("/api/status", get(routes::get_status))
        // Strategist
        .route("/audit", post(routes::audit))
        .route("/chat", post(routes::chat))
        // Leads and inquiries
        .route("/capture-lead", post(routes::capture_lead_handler))
        .route("/submit-inquiry", post(routes::submit_inquiry))
        // Report
        .route("/generate-report", post(routes::generate_report))
        // Admin
        .route("/admin", get(routes::admin))
        .route("/api/logs", get(routes::sse_logs))
        // Static client
        .fallback_service(serve_dir)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (log_tx, _) = broadcast::channel::<String>(1024);
    let log_ring = Arc::new(std::sync::Mutex::new(VecDeque::with_capacity(
        LOG_RING_CAPACITY,
    )));

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(BroadcastLayer {
            tx: log_tx.clone(),
            ring: Arc::clone(&log_ring),
        })
        .init();

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.data_dir)?;

    let knowledge_dir = config.knowledge_dir.clone();
    let knowledge = tokio::task::spawn_blocking(move || KnowledgeBase::load(knowledge_dir)).await?;
    info!(
        sources = knowledge.len(),
        chars = knowledge.text().chars().count(),
        "knowledge base loaded"
    );

    let backend = build_backend(&config);
    let search = search_from_config(&config);
    let mailer = mailer_from_config(&config);

    let state = Arc::new(AppState {
        leads: LeadStore::new(config.leads_path()),
        inquiries: InquiryStore::new(config.inquiries_path()),
        memory: ThreadMemory::new(config.thread_history_turns),
        config: Arc::new(config),
        start_time: Instant::now(),
        log_tx,
        log_ring,
        backend,
        search,
        mailer,
        knowledge: Arc::new(knowledge),
    });

    let addr = format!("{}:{}", state.config.web_bind, state.config.web_port);
    let app = app(Arc::clone(&state));

    info!(
        provider = state.backend.name(),
        model = state.backend.model(),
        "ZaHouse Strategist listening on {addr}"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
