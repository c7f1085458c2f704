use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{
    cookie::SameSite, ExpiredDeletion, Expiry, MemoryStore, SessionManagerLayer, SessionStore,
};
use tower_sessions_sqlx_store::PostgresStore;
use crate::state::AppState;
use crate::{auth, recipes};

const EXPIRED_SESSION_SWEEP: Duration = Duration::from_secs(60);

/// Sessions live in Postgres next to the recipes when that backing is in use,
/// so they survive restarts and are shared between instances.
pub async fn build_with_sessions(state: AppState) -> anyhow::Result<Router> {
    match state.db.clone() {
        Some(pool) => {
            let store = PostgresStore::new(pool);
            store.migrate().await.context("migrate session store")?;
            tokio::task::spawn(store.clone().continuously_delete_expired(EXPIRED_SESSION_SWEEP));
            tracing::info!("using postgres session store");
            Ok(build_app(state, store))
        }
        None => {
            tracing::info!("using in-memory session store");
            Ok(build_app(state, MemoryStore::default()))
        }
    }
}

pub fn build_app<S: SessionStore + Clone>(state: AppState, store: S) -> Router {
    let sessions = SessionManagerLayer::new(store)
        .with_name(state.config.session_cookie.clone())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            state.config.session_ttl_minutes,
        )));

    Router::new()
        .nest("/api/v1",
              Router::new()
                  .merge(auth::router())
                  .merge(recipes::router())
                  .route("/health", get(|| async { "ok" }))
        )
        .with_state(state)
        .layer(sessions)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "9000".into())
    )
        .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
