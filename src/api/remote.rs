//! Purpose: HTTP fetch collaborator speaking the v0 read-rows protocol (JSON in, JSONL out).
//! Exports: `RemoteClient`, `parse_table_uri`.
//! Role: Concrete transport for scans against a remote store or `widerow serve`.
//! Invariants: Requests go to `POST {base}/v0/tables/{table}/read_rows`.
//! Invariants: Responses are JSONL, one chunk-event per line, in store order.
//! Invariants: The cancel token is checked before the request and between lines.
//! Notes: No retries; transport failures surface as `Io` errors to the scan.
#![allow(clippy::result_large_err)]

use crate::api::fetch::{Fetch, FetchRequest, TableRef};
use crate::api::wire::{ErrorEnvelope, ReadRowsRequest, WireChunk};
use crate::core::chunk::ChunkEvent;
use crate::core::error::{Error, ErrorKind};
use std::io::BufRead;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use url::Url;

type ApiResult<T> = Result<T, Error>;

pub const JSONL_CONTENT_TYPE: &str = "application/jsonl";

#[derive(Clone)]
pub struct RemoteClient {
    inner: Arc<RemoteClientInner>,
}

struct RemoteClientInner {
    base_url: Url,
    token: Option<String>,
    agent: ureq::Agent,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self {
            inner: Arc::new(RemoteClientInner {
                base_url,
                token: None,
                agent,
            }),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.token = Some(token.into());
        } else {
            self.inner = Arc::new(RemoteClientInner {
                base_url: self.inner.base_url.clone(),
                token: Some(token.into()),
                agent: self.inner.agent.clone(),
            });
        }
        self
    }

    /// Bound connect and per-read waits; unset means wait indefinitely.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .build();
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.agent = agent;
        } else {
            self.inner = Arc::new(RemoteClientInner {
                base_url: self.inner.base_url.clone(),
                token: self.inner.token.clone(),
                agent,
            });
        }
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        let mut request = self.inner.agent.request(method, url.as_str());
        if let Some(token) = &self.inner.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request
    }
}

impl Fetch for RemoteClient {
    fn fetch_batch(&self, request: &FetchRequest<'_>) -> ApiResult<Vec<ChunkEvent>> {
        request.cancel.check()?;
        let table = request.table.as_str();
        let url = build_url(&self.inner.base_url, &["v0", "tables", table, "read_rows"])?;
        let payload = ReadRowsRequest {
            row_set: request.row_set.into(),
            filter: request.filter.cloned(),
            rows_limit: request.rows_limit,
        };
        let body = serde_json::to_string(&payload).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })?;

        let response = self
            .request("POST", &url)
            .set("Accept", JSONL_CONTENT_TYPE)
            .set("Content-Type", "application/json")
            .send_string(&body);
        let response = match response {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, resp)) => {
                return Err(parse_error_response(code, resp).with_table(table));
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(Error::new(ErrorKind::Io)
                    .with_message("request failed")
                    .with_table(table)
                    .with_source(err));
            }
        };

        let mut reader = BufReader::new(response.into_reader());
        let mut chunks = Vec::new();
        let mut line = String::new();
        loop {
            request.cancel.check()?;
            line.clear();
            let bytes = reader.read_line(&mut line).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read read_rows stream")
                    .with_table(table)
                    .with_source(err)
            })?;
            if bytes == 0 {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            let chunk: WireChunk = serde_json::from_str(&line).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("invalid chunk json")
                    .with_table(table)
                    .with_source(err)
            })?;
            chunks.push(ChunkEvent::from(chunk));
        }
        trace!(table, chunks = chunks.len(), "read_rows stream complete");
        Ok(chunks)
    }
}

/// Split `http(s)://host[:port]/<table>` into a client and a table.
///
/// Also accepts `.../v0/tables/<table>`.
pub fn parse_table_uri(uri: &str) -> ApiResult<(RemoteClient, TableRef)> {
    let mut url = Url::parse(uri).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid table uri")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("table uri must use http or https scheme")
        );
    }
    let table = extract_table_from_url(&url)?;
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok((RemoteClient::new(url.to_string())?, TableRef::new(table)?))
}

fn extract_table_from_url(url: &Url) -> ApiResult<String> {
    let segments: Vec<_> = url
        .path_segments()
        .map(|segments| segments.filter(|segment| !segment.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default();
    match segments.as_slice() {
        [table] => Ok(table.to_string()),
        ["v0", "tables", table] => Ok(table.to_string()),
        [] => Err(Error::new(ErrorKind::Usage)
            .with_message("table uri missing path")
            .with_hint("Use http://host:port/<table>.")),
        _ => Err(Error::new(ErrorKind::Usage).with_message("table uri path must name one table")),
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid remote base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("remote base url must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("remote base url must not include a path")
        );
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("remote base url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
        return Error::from(envelope.error);
    }
    let kind = error_kind_from_status(status);
    Error::new(kind).with_message(format!("remote error status {status}"))
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 | 422 => ErrorKind::Usage,
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}
