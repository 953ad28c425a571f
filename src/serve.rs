//! Purpose: Provide the HTTP read-rows emulator behind `widerow serve`.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum server answering the v0 read-rows protocol from a fixture-backed `MemoryStore`.
//! Invariants: Responses are JSONL chunk-events; errors use the `{"error": {...}}` envelope.
//! Invariants: Loopback-only unless explicitly allowed.
//! Notes: Filters in requests are accepted and ignored, like `MemoryStore`.

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Path as AxumPath, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use widerow::api::wire::{ErrorEnvelope, ReadRowsRequest, WireChunk};
use widerow::api::{
    CancelToken, Error, ErrorKind, Fetch, FetchRequest, JSONL_CONTENT_TYPE, MemoryStore, RowSet,
    TableRef,
};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub fixture: PathBuf,
    pub token: Option<String>,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
}

struct AppState {
    store: MemoryStore,
    token: Option<String>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;
    let store = MemoryStore::load_fixture(&config.fixture)?;
    info!(
        fixture = %config.fixture.display(),
        tables = store.table_names().count(),
        "fixture loaded"
    );
    let app = router(
        Arc::new(AppState {
            store,
            token: config.token,
        }),
        max_body_bytes,
    );

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    info!(bind = %config.bind, "serving read_rows");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v0/tables", get(list_tables))
        .route("/v0/tables/:table/read_rows", post(read_rows))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }
    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), Error> {
    let Some(token) = state.token.as_ref() else {
        return Ok(());
    };
    let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(Error::new(ErrorKind::Permission).with_message("missing bearer token"));
    };
    let value = value.to_str().unwrap_or_default();
    let expected = format!("Bearer {token}");
    if value != expected {
        return Err(Error::new(ErrorKind::Permission).with_message("invalid bearer token"));
    }
    Ok(())
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn list_tables(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let tables: Vec<_> = state
        .store
        .table_names()
        .map(|name| json!({ "name": name, "rows": state.store.row_count(name) }))
        .collect();
    Json(json!({ "tables": tables })).into_response()
}

async fn read_rows(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AxumPath(table): AxumPath<String>,
    Json(payload): Json<ReadRowsRequest>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let table = match TableRef::new(table) {
        Ok(table) => table,
        Err(err) => return error_response(err),
    };
    let row_set = RowSet::from(payload.row_set);
    let filter = payload.filter;
    let rows_limit = payload.rows_limit;

    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        let cancel = CancelToken::new();
        let request = FetchRequest {
            table: &table,
            row_set: &row_set,
            filter: filter.as_ref(),
            rows_limit,
            cancel: &cancel,
        };
        worker_state.store.fetch_batch(&request)
    })
    .await;
    let chunks = match result {
        Ok(Ok(chunks)) => chunks,
        Ok(Err(err)) => return error_response(err),
        Err(join_err) => {
            return error_response(
                Error::new(ErrorKind::Internal)
                    .with_message("read_rows worker failed")
                    .with_source(join_err),
            );
        }
    };

    let mut lines = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        match serde_json::to_vec(&WireChunk::from(chunk)) {
            Ok(mut line) => {
                line.push(b'\n');
                lines.push(Ok::<Bytes, std::io::Error>(Bytes::from(line)));
            }
            Err(err) => {
                return error_response(
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode chunk")
                        .with_source(err),
                );
            }
        }
    }

    let mut response = Response::new(Body::from_stream(tokio_stream::iter(lines)));
    response.headers_mut().insert(
        "content-type",
        HeaderValue::from_static(JSONL_CONTENT_TYPE),
    );
    response
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Usage | ErrorKind::Range => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Permission => StatusCode::UNAUTHORIZED,
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        kind if kind.is_codec() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: Error) -> Response {
    let status = status_for(err.kind());
    (status, Json(ErrorEnvelope::from(&err))).into_response()
}

#[cfg(test)]
mod tests {
    use super::{AppState, ServeConfig, router, serve, status_for, validate_config};
    use axum::http::StatusCode;
    use std::future::IntoFuture;
    use std::sync::Arc;
    use widerow::api::{
        Cell, ErrorKind, MemoryStore, RemoteClient, Row, RowRange, RowSet, ScanOptions, TableRef,
        read_rows,
    };

    fn config(bind: &str) -> ServeConfig {
        ServeConfig {
            bind: bind.parse().expect("bind"),
            fixture: "missing.json".into(),
            token: None,
            allow_non_loopback: false,
            max_body_bytes: 1024 * 1024,
        }
    }

    #[tokio::test]
    async fn serve_rejects_non_loopback_bind() {
        let err = serve(config("0.0.0.0:0")).await.expect_err("expected usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn non_loopback_allowed_with_flag() {
        let mut config = config("0.0.0.0:0");
        config.allow_non_loopback = true;
        validate_config(&config).expect("config ok");
    }

    #[test]
    fn zero_body_limit_is_rejected() {
        let mut config = config("127.0.0.1:0");
        config.max_body_bytes = 0;
        let err = validate_config(&config).expect_err("usage");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[tokio::test]
    async fn missing_fixture_is_an_io_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = config("127.0.0.1:0");
        config.fixture = temp.path().join("absent.json");
        let err = serve(config).await.expect_err("io");
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn status_mapping_is_stable() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Permission), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::InvalidTerm), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Io), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn remote_scan_round_trips_through_router() {
        let mut store = MemoryStore::new();
        for key in ["a", "b", "c"] {
            let mut row = Row::new(key);
            row.push_cell("cf", b"q", Cell::new(vec![0xff, 0x00], 9));
            store.insert_row("t", row);
        }
        let state = Arc::new(AppState {
            store,
            token: Some("secret".to_string()),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(axum::serve(listener, router(state, 1024 * 1024)).into_future());

        let base = format!("http://{addr}");
        let (rows, denied) = tokio::task::spawn_blocking(move || {
            let table = TableRef::new("t").expect("table");
            let client = RemoteClient::new(base.clone()).expect("client").with_token("secret");
            let rows = read_rows(
                &client,
                table.clone(),
                RowSet::from_ranges([RowRange::from_key("b")]),
                ScanOptions::new().with_batch_size(1),
            );
            let anonymous = RemoteClient::new(base).expect("client");
            let denied = read_rows(&anonymous, table, RowSet::all(), ScanOptions::new());
            (rows, denied)
        })
        .await
        .expect("join");
        server.abort();

        let rows = rows.expect("rows");
        let keys: Vec<_> = rows.iter().map(|row| row.key().to_vec()).collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(rows[0].cells("cf", b"q"), &[Cell::new(vec![0xff, 0x00], 9)]);
        assert_eq!(denied.expect_err("denied").kind(), ErrorKind::Permission);
    }
}
