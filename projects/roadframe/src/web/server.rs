use crate::cli::ServeArgs;
use crate::web::api;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn router(args: Arc<ServeArgs>) -> Router {
    Router::new()
        .route("/api/videos", get(api::get_videos))
        .route("/api/extract", post(api::start_extract))
        .route("/api/redact", post(api::start_redact))
        .route("/api/jobs", get(api::get_jobs))
        .route("/api/jobs/:id", get(api::get_job))
        .route("/api/jobs/:id/events", get(api::job_events))
        .route("/api/jobs/:id/stop", post(api::stop_job))
        .layer(TraceLayer::new_for_http())
        .with_state(args)
}

pub async fn run_server(args: ServeArgs) -> Result<()> {
    let mut current_port = args.port;
    let listener = loop {
        let addr = SocketAddr::new(args.host, current_port);
        match TcpListener::bind(addr) {
            Ok(listener) => {
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

    info!(
        "Serving videos from {} into {}",
        args.video_root.display(),
        args.output_root.display()
    );
    let app = router(Arc::new(args));

    let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
    info!(
        "Roadframe server started on http://{:?}",
        tokio_listener.local_addr()?
    );

    axum::serve(tokio_listener, app).await?;

    Ok(())
}
