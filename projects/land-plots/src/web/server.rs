use crate::cli::Args;
use crate::web::api::{
    create_session_handler, events_handler, get_crops, get_session_handler, get_sessions,
    plot_at_handler, plots_csv_handler, pointer_handler, render_svg_handler, summary_handler,
    undo_handler, update_inputs_handler, AppState,
};
use crate::web::assets::{index_handler, static_handler};
use anyhow::{Context, Result};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const EVICT_INTERVAL: Duration = Duration::from_secs(300);

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/crops", get(get_crops))
        .route(
            "/api/sessions",
            get(get_sessions).post(create_session_handler),
        )
        .route("/api/sessions/:session_id", get(get_session_handler))
        .route(
            "/api/sessions/:session_id/inputs",
            put(update_inputs_handler),
        )
        .route("/api/sessions/:session_id/pointer", post(pointer_handler))
        .route("/api/sessions/:session_id/undo", post(undo_handler))
        .route("/api/sessions/:session_id/plots/at", get(plot_at_handler))
        .route("/api/sessions/:session_id/plots.csv", get(plots_csv_handler))
        .route("/api/sessions/:session_id/render.svg", get(render_svg_handler))
        .route("/api/sessions/:session_id/summary", get(summary_handler))
        .route("/api/sessions/:session_id/events", get(events_handler))
        .route("/", get(index_handler))
        .fallback(static_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(args: Args) -> Result<()> {
    std::fs::create_dir_all(&args.output_root)
        .with_context(|| format!("Failed to create output root {}", args.output_root))?;

    let mut current_port = args.port;
    let listener = loop {
        let addr = SocketAddr::new(args.host, current_port);
        match TcpListener::bind(addr) {
            Ok(listener) => {
                // Tokio requires a non-blocking socket
                listener.set_nonblocking(true)?;
                info!("Successfully bound to {}", addr);
                break listener;
            }
            Err(e) => {
                warn!("Failed to bind to {}: {}. Trying next port...", addr, e);
                current_port = current_port.wrapping_add(1);
                if current_port == 0 {
                    return Err(anyhow::anyhow!("No available ports found"));
                }
            }
        }
    };

    let state = Arc::new(AppState::new(args));

    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EVICT_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep_state.sessions.evict_idle();
        }
    });

    let app = build_router(state);

    let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
    info!(
        "Land plots server started on http://{:?}",
        tokio_listener.local_addr()?
    );

    axum::serve(tokio_listener, app).await?;

    Ok(())
}
