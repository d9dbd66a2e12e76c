//! HTTP surface for the newsroom: article CRUD, verification, the source
//! ranking and the unified news listing.

pub mod auth;
pub mod error;
pub mod handlers;

use anyhow::{Context, Result, bail};
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use newsdesk_core::config::AppConfig;
use newsdesk_core::{GNewsClient, NewsDesk, ReliabilityLedger, Store, VerdictPipeline, oracle};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span};

pub use auth::TokenSigner;
pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub pipeline: Arc<VerdictPipeline>,
    pub ledger: ReliabilityLedger,
    pub news: Arc<NewsDesk>,
    pub tokens: TokenSigner,
}

impl AppState {
    pub fn new(
        store: Store,
        oracle: Arc<dyn newsdesk_core::FactChecker>,
        upstream: Arc<dyn newsdesk_core::NewsListing>,
        tokens: TokenSigner,
    ) -> Self {
        let ledger = ReliabilityLedger::new(store.clone());
        let pipeline = VerdictPipeline::new(store.clone(), oracle, ledger.clone());
        let news = NewsDesk::new(store.clone(), upstream);
        Self {
            store,
            pipeline: Arc::new(pipeline),
            ledger,
            news: Arc::new(news),
            tokens,
        }
    }

    /// Wires storage, the oracle and the upstream listing from config.
    /// Refuses to start without a token secret.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let Some(secret) = config.auth.token_secret.as_deref() else {
            bail!("auth.token_secret (AUTH_TOKEN_SECRET) must be set to serve requests");
        };
        let store = Store::open(&config.database.path)
            .with_context(|| format!("open database {}", config.database.path))?;
        let checker = oracle::from_config(&config.oracle)?;
        info!(mode = %checker.mode(), "fact-check oracle ready");
        let upstream = Arc::new(GNewsClient::new(&config.news)?);
        Ok(Self::new(store, checker, upstream, TokenSigner::new(secret)))
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/articles",
            get(handlers::list_articles).post(handlers::publish_article),
        )
        .route("/api/articles/:id", delete(handlers::delete_article))
        .route("/api/articles/:id/verify", post(handlers::verify_article))
        .route("/api/articles/:id/reset", post(handlers::reset_article))
        .route("/api/sources", get(handlers::list_sources))
        .route("/news", get(handlers::news_listing))
        .layer(middleware::from_fn(request_tracing))
        .with_state(state)
}

async fn request_tracing(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let span = info_span!("http_request", method = %method, path = %path);
    let started = Instant::now();
    async move {
        let response = next.run(req).await;
        info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
        response
    }
    .instrument(span)
    .await
}

pub async fn serve(config: &AppConfig) -> Result<()> {
    let state = AppState::from_config(config)?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("bind {}", config.server.bind))?;
    info!(addr = %listener.local_addr()?, "newsdesk listening");
    axum::serve(listener, build_router(state))
        .await
        .context("http server failed")
}
