use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use clap::Args;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Settings;
use crate::error::{CardError, Result};
use crate::pipeline::{CardRequest, CardService};
use crate::render::{RenderParams, render_svg};
use crate::theme::Theme;

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";
pub const NO_STORE: &str = "no-cache, no-store, must-revalidate";

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to listen on (default 127.0.0.1:3000).
    #[arg(long)]
    pub bind: Option<String>,

    /// Env-style settings file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CardService>,
}

type SharedState = Arc<AppState>;

#[must_use]
pub fn build_router(service: Arc<CardService>) -> Router {
    let state = Arc::new(AppState { service });
    Router::new()
        .route("/", get(card))
        .route("/api", get(card))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// First value for `key`, ignoring empty ones the same way a missing key is.
fn query_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(candidate, _)| candidate == key)
        .map(|(_, value)| value.as_str())
        .filter(|value| !value.is_empty())
}

/// `username` wins over `user`; `transparent` is on only for the literal `true`.
#[must_use]
pub fn card_request_from_query(pairs: &[(String, String)]) -> CardRequest {
    let username = query_value(pairs, "username").or_else(|| query_value(pairs, "user"));
    CardRequest::from_optional(
        username,
        query_value(pairs, "theme"),
        query_value(pairs, "mode"),
        query_value(pairs, "length"),
        query_value(pairs, "transparent") == Some("true"),
    )
}

fn svg_response(svg: String) -> Response {
    ([(CONTENT_TYPE, SVG_CONTENT_TYPE), (CACHE_CONTROL, NO_STORE)], svg).into_response()
}

/// The card endpoint answers 200 with an SVG no matter what went wrong
/// upstream; image embeds cannot show error pages.
async fn card(
    State(state): State<SharedState>,
    query: std::result::Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    let pairs = query.map(|Query(pairs)| pairs).unwrap_or_default();
    let request = card_request_from_query(&pairs);

    let service = Arc::clone(&state.service);
    let task_request = request.clone();
    let generated =
        tokio::task::spawn_blocking(move || service.generate(&task_request).svg).await;

    let svg = match generated {
        Ok(svg) => svg,
        Err(join_error) => {
            error!(%join_error, user = %request.username, "card task failed");
            let theme = Theme::fallback();
            let label = request.mode_label();
            render_svg(&RenderParams {
                username: &request.username,
                mode_label: &label,
                wpm: 0.0,
                accuracy: 0.0,
                theme: &theme,
                transparent: request.transparent,
            })
        }
    };

    svg_response(svg)
}

async fn health() -> &'static str {
    "ok"
}

pub async fn serve(addr: SocketAddr, service: Arc<CardService>) -> Result<()> {
    let router = build_router(service);
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "serving stat cards");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub fn run_serve(args: ServeArgs) -> Result<()> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }
    let addr: SocketAddr = settings
        .bind
        .parse()
        .map_err(|_| CardError::invalid(format!("invalid bind address: {}", settings.bind)))?;

    // The blocking HTTP client has to be created, and finally dropped, outside
    // of the runtime.
    let service = Arc::new(CardService::from_settings(&settings)?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(addr, Arc::clone(&service)))?;
    drop(runtime);
    drop(service);
    Ok(())
}
