//! HTTP transport: every path is parsed into a [RouteOp] and answered with JSON.

use crate::{
    action::{Reply, RouteContext, RouteOp},
    config::ServerConfig,
    credential::CredentialHasher,
    sqlite::filter::FilterPolicy,
    store::Store,
};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::any,
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use std::{sync::Arc, time::Instant};

///
/// What every request shares
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub filter_policy: FilterPolicy,
}

impl AppState {
    pub fn new(
        store: Store,
        hasher: Arc<dyn CredentialHasher>,
        filter_policy: FilterPolicy,
    ) -> Self {
        Self {
            store: Arc::new(store),
            hasher,
            filter_policy,
        }
    }
}

///
/// Build the router. Every command accepts GET, POST, PUT and DELETE.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(handle_index))
        .route("/*path", any(handle_path))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

///
/// Bind the configured address and serve until the process stops
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, db_file = %config.db_file, policy = ?state.filter_policy, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn handle_index(
    State(state): State<AppState>,
    method: Method,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    respond(state, method, String::new(), raw_query, query).await
}

async fn handle_path(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    respond(state, method, path, raw_query, query).await
}

async fn respond(
    state: AppState,
    method: Method,
    path: String,
    raw_query: Option<String>,
    query: Vec<(String, String)>,
) -> Response {
    let started = Instant::now();
    let op = RouteOp::from_path(&path);
    let command = op.name();
    // credentials may travel in the path
    let shown_path = match &op {
        RouteOp::Login(_) => "/login".to_string(),
        _ => format!("/{}", path.trim_matches('/')),
    };

    let reply = match tokio::task::spawn_blocking(move || execute(&state, &op, &query)).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::error!(error = %err, "request task failed");
            Reply::Failed
        }
    };
    let response = into_response(reply, raw_query);
    tracing::info!(
        %method,
        path = %shown_path,
        command,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

fn execute(state: &AppState, op: &RouteOp, query: &[(String, String)]) -> Reply {
    let conn = match state.store.session() {
        Ok(conn) => conn,
        Err(err) => {
            tracing::error!(error = ?err, "no database session");
            return Reply::Failed;
        }
    };
    let ctx = RouteContext {
        conn: &conn,
        hasher: state.hasher.as_ref(),
        filter_policy: state.filter_policy,
    };
    op.run(&ctx, query)
}

fn into_response(reply: Reply, raw_query: Option<String>) -> Response {
    let status = match &reply {
        Reply::Redirect(location) => {
            let location = match raw_query.filter(|q| !q.is_empty()) {
                Some(q) => format!("{location}?{q}"),
                None => location.clone(),
            };
            return Redirect::to(&location).into_response();
        }
        Reply::Json(_) => StatusCode::OK,
        Reply::NotFound(_) => StatusCode::NOT_FOUND,
        Reply::Failed => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(reply.body())).into_response()
}
