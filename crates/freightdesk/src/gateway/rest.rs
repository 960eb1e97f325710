//! PostgREST-compatible remote backend (e.g. Supabase).
//!
//! Each kind maps to `{url}/rest/v1/master_<kind>`. List joins are expressed
//! as resource embeds built from the kind's join tree; mutations ask for the
//! affected rows back so an empty answer can be reported as not found.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{ensure_kind, TableGateway};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::kind::{Join, MasterKind};
use crate::record::{MasterPayload, MasterRecord};

const REST_PATH: &str = "rest/v1";
const RETURN_REPRESENTATION: &str = "return=representation";
/// Postgres `invalid_text_representation`, raised for an id that is not a uuid.
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

/// Error body PostgREST sends with non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    details: Option<String>,
    code: Option<String>,
}

/// Gateway speaking the PostgREST dialect over HTTP.
pub struct RestGateway {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl fmt::Debug for RestGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestGateway")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl RestGateway {
    /// Create a gateway for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token,
        })
    }

    /// Create a gateway from the `[backend]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or API key is missing, or the client cannot be built.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| Error::ConfigValidation {
            message: "backend.url is required for the rest backend".to_string(),
        })?;
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::ConfigValidation {
                message: "backend.api_key is required for the rest backend".to_string(),
            })?;
        Self::new(url, api_key, config.access_token.clone(), config.timeout())
    }

    /// URL of the collection backing `kind`.
    #[must_use]
    pub fn collection_url(&self, kind: MasterKind) -> String {
        format!("{}/{REST_PATH}/{}", self.base_url, kind.collection())
    }

    /// The `select` parameter for listing `kind`, with its parents embedded.
    #[must_use]
    pub fn select_clause(kind: MasterKind) -> String {
        std::iter::once("*".to_string())
            .chain(kind.joins().iter().map(embed))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn request(&self, method: Method, kind: MasterKind) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, self.collection_url(kind))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn rows(&self, kind: MasterKind, builder: RequestBuilder) -> Result<Vec<MasterRecord>> {
        let response = check(builder.send().await?).await?;
        let rows: Vec<Value> = response.json().await?;
        rows.into_iter()
            .map(|row| MasterRecord::from_value(kind, row))
            .collect()
    }
}

fn embed(join: &Join) -> String {
    let columns: Vec<String> = std::iter::once("name".to_string())
        .chain(join.nested.iter().map(embed))
        .collect();
    format!(
        "{}:{}({})",
        join.field(),
        join.parent.collection(),
        columns.join(",")
    )
}

/// Turn a non-2xx response into [`Error::Backend`].
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => {
            let mut message = body.message.unwrap_or_else(|| text.clone());
            if let Some(details) = body.details.filter(|d| !d.is_empty()) {
                message = format!("{message} ({details})");
            }
            match body.code {
                Some(code) => format!("[{code}] {message}"),
                None => message,
            }
        }
        Err(_) if text.is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => text,
    };
    Err(Error::backend(status.as_u16(), message))
}

/// An id the key column cannot parse names no row, so report it as missing.
///
/// Only a rejection quoting `id` itself is rewritten; a malformed value inside
/// the payload stays a backend error.
fn missing_if_unparsable_id(err: Error, kind: MasterKind, id: &str) -> Error {
    let unparsable = matches!(
        &err,
        Error::Backend { status: 400, message }
            if message.starts_with(&format!("[{INVALID_TEXT_REPRESENTATION}]"))
                && message.contains(&format!("\"{id}\""))
    );
    if !unparsable {
        return err;
    }
    debug!("{} id {id} is not a valid key", kind.collection());
    Error::not_found(kind, id)
}

#[async_trait]
impl TableGateway for RestGateway {
    fn backend_name(&self) -> &'static str {
        "rest"
    }

    async fn list(&self, kind: MasterKind) -> Result<Vec<MasterRecord>> {
        let select = Self::select_clause(kind);
        debug!("GET {} select={}", kind.collection(), select);
        let builder = self
            .request(Method::GET, kind)
            .query(&[("select", select.as_str()), ("order", "created_at.desc")]);
        let records = self.rows(kind, builder).await?;
        debug!("Fetched {} rows from {}", records.len(), kind.collection());
        Ok(records)
    }

    async fn create(&self, kind: MasterKind, payload: &MasterPayload) -> Result<MasterRecord> {
        ensure_kind(kind, payload)?;
        debug!("POST {}", kind.collection());
        let builder = self
            .request(Method::POST, kind)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&[payload.to_value()]);
        self.rows(kind, builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::malformed(kind, "insert returned no row"))
    }

    async fn update(
        &self,
        kind: MasterKind,
        id: &str,
        payload: &MasterPayload,
    ) -> Result<MasterRecord> {
        ensure_kind(kind, payload)?;
        debug!("PATCH {} id={}", kind.collection(), id);
        let builder = self
            .request(Method::PATCH, kind)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&payload.to_value());
        self.rows(kind, builder)
            .await
            .map_err(|err| missing_if_unparsable_id(err, kind, id))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(kind, id))
    }

    async fn delete(&self, kind: MasterKind, id: &str) -> Result<()> {
        debug!("DELETE {} id={}", kind.collection(), id);
        let builder = self
            .request(Method::DELETE, kind)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION);
        let response = check(builder.send().await?)
            .await
            .map_err(|err| missing_if_unparsable_id(err, kind, id))?;
        let rows: Vec<Value> = response.json().await?;
        if rows.is_empty() {
            return Err(Error::not_found(kind, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Country;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (url, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..head_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= head_end + 4 + length
    }

    fn gateway(url: &str) -> RestGateway {
        RestGateway::new(url, "anon-key", None, Duration::from_secs(5)).unwrap()
    }

    fn india() -> MasterPayload {
        MasterPayload::Country(Country {
            name: "India".to_string(),
            code: Some("IN".to_string()),
        })
    }

    #[test]
    fn test_select_clauses_match_join_depth() {
        assert_eq!(RestGateway::select_clause(MasterKind::Countries), "*");
        assert_eq!(
            RestGateway::select_clause(MasterKind::States),
            "*,country:master_countries(name)"
        );
        assert_eq!(
            RestGateway::select_clause(MasterKind::Cities),
            "*,state:master_states(name,country:master_countries(name))"
        );
        assert_eq!(
            RestGateway::select_clause(MasterKind::Transporters),
            "*,city:master_cities(name)"
        );
    }

    #[test]
    fn test_collection_url_trims_trailing_slash() {
        let gateway = gateway("https://example.supabase.co/");
        assert_eq!(
            gateway.collection_url(MasterKind::States),
            "https://example.supabase.co/rest/v1/master_states"
        );
    }

    #[test]
    fn test_debug_redacts_keys() {
        let rendered = format!("{:?}", gateway("https://example.supabase.co"));
        assert!(!rendered.contains("anon-key"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_from_config_requires_url() {
        let config = BackendConfig::default();
        assert!(matches!(
            RestGateway::from_config(&config),
            Err(Error::ConfigValidation { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_sends_select_and_order() {
        let body = r#"[{"id":"s-1","country_id":"IN","name":"Goa","code":null,
            "created_at":"2024-03-01T10:00:00+00:00","country":{"name":"India"}}]"#;
        let (url, server) = serve_once("200 OK", body).await;

        let records = gateway(&url).list(MasterKind::States).await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("GET /rest/v1/master_states?select="));
        assert!(request.contains("order=created_at.desc"));
        assert!(request.contains("apikey: anon-key"));
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get_path("country.name"),
            Some(serde_json::json!("India"))
        );
    }

    #[tokio::test]
    async fn test_create_posts_array_and_returns_row() {
        let body = r#"[{"id":"IN","name":"India","code":"IN","created_at":"2024-03-01T10:00:00Z"}]"#;
        let (url, server) = serve_once("201 Created", body).await;

        let record = gateway(&url)
            .create(MasterKind::Countries, &india())
            .await
            .unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /rest/v1/master_countries"));
        assert!(request.to_ascii_lowercase().contains("prefer: return=representation"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let sent: Value = serde_json::from_str(body).unwrap();
        assert_eq!(sent, serde_json::json!([{"name": "India", "code": "IN"}]));
        assert_eq!(record.id, "IN");
    }

    #[tokio::test]
    async fn test_update_with_empty_representation_is_not_found() {
        let (url, server) = serve_once("200 OK", "[]").await;

        let err = gateway(&url)
            .update(MasterKind::Countries, "missing", &india())
            .await
            .unwrap_err();
        let request = server.await.unwrap();

        assert!(request.starts_with("PATCH /rest/v1/master_countries?id=eq.missing"));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_with_empty_representation_is_not_found() {
        let (url, _server) = serve_once("200 OK", "[]").await;
        let err = gateway(&url)
            .delete(MasterKind::Cities, "gone")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    const BAD_UUID_BODY: &str = r#"{"code":"22P02","details":null,"hint":null,
        "message":"invalid input syntax for type uuid: \"abc\""}"#;

    #[tokio::test]
    async fn test_delete_with_unparsable_id_is_not_found() {
        let (url, _server) = serve_once("400 Bad Request", BAD_UUID_BODY).await;
        let err = gateway(&url)
            .delete(MasterKind::Countries, "abc")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("abc"));
    }

    #[tokio::test]
    async fn test_update_with_unparsable_id_is_not_found() {
        let (url, _server) = serve_once("400 Bad Request", BAD_UUID_BODY).await;
        let err = gateway(&url)
            .update(MasterKind::Countries, "abc", &india())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unparsable_payload_value_stays_backend_error() {
        let (url, _server) = serve_once("400 Bad Request", BAD_UUID_BODY).await;
        let id = "0b7c6a52-31d5-4f5e-9a43-2a0d3c1f9e10";
        let err = gateway(&url)
            .update(MasterKind::Countries, id, &india())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_backend_error_body_is_reported() {
        let body = r#"{"code":"23503","details":"Key is still referenced","hint":null,
            "message":"update or delete on table violates foreign key constraint"}"#;
        let (url, _server) = serve_once("409 Conflict", body).await;

        let err = gateway(&url)
            .delete(MasterKind::Countries, "IN")
            .await
            .unwrap_err();
        match err {
            Error::Backend { status, message } => {
                assert_eq!(status, 409);
                assert!(message.starts_with("[23503]"));
                assert!(message.contains("Key is still referenced"));
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_payload_for_wrong_kind_never_leaves_the_client() {
        let gateway = gateway("http://127.0.0.1:9");
        let err = gateway
            .create(MasterKind::States, &india())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::KindMismatch { .. }));
    }
}
