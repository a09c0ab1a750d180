use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::query::{Page, PageRequest, PaginationMeta};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation(msg) => AppError::Conflict(msg),
            DatabaseError::ForeignKeyViolation(_) => {
                AppError::BadRequest("Referenced record does not exist".to_string())
            }
            DatabaseError::NotFound(msg) => AppError::NotFound(msg),
            DatabaseError::Transport(e) => AppError::ExternalService(e.to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self, extra: &[(&str, &str)]) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|_| DatabaseError::Auth("service key is not a valid header value".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|_| DatabaseError::Auth("service key is not a valid header value".into()))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in extra {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| DatabaseError::Decode(e.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| DatabaseError::Decode(e.to_string()))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, &[]).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: &[(&str, &str)],
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body, extra_headers).await?;
        let response = Self::check_status(response).await?;

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            // 204 No Content decodes as JSON null
            return serde_json::from_value(Value::Null).map_err(|e| DatabaseError::Decode(e.to_string()));
        }
        serde_json::from_slice(&bytes).map_err(|e| DatabaseError::Decode(e.to_string()))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: &[(&str, &str)],
    ) -> Result<reqwest::Response, DatabaseError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let headers = self.get_headers(extra_headers)?;
        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        Ok(req.send().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DatabaseError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<PostgrestError>(&error_text).ok();
        let code = parsed.as_ref().and_then(|e| e.code.clone()).unwrap_or_default();
        let message = parsed
            .as_ref()
            .and_then(|e| e.message.clone().or_else(|| e.details.clone()))
            .unwrap_or_else(|| error_text.clone());

        match code.as_str() {
            "23505" => {
                warn!("Unique violation: {}", message);
                return Err(DatabaseError::UniqueViolation(message));
            }
            "23503" => {
                warn!("Foreign key violation: {}", message);
                return Err(DatabaseError::ForeignKeyViolation(message));
            }
            _ => {}
        }

        error!("API error ({}): {}", status, error_text);

        Err(match status.as_u16() {
            401 | 403 => DatabaseError::Auth(message),
            404 => DatabaseError::NotFound(message),
            _ => DatabaseError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// GET returning every row matched by `path`.
    pub async fn select<T>(&self, path: &str) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, None).await
    }

    /// GET returning the first matched row, if any.
    pub async fn select_one<T>(&self, path: &str) -> Result<Option<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self.select(path).await?;
        Ok(rows.into_iter().next())
    }

    /// POST a single row to `path` (a table path, optionally with `select=`) and
    /// return its stored representation.
    pub async fn insert<T>(&self, path: &str, row: Value) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self
            .request_with_headers(
                Method::POST,
                path,
                Some(row),
                &[("Prefer", "return=representation")],
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::Decode(format!("insert into {} returned no rows", path)))
    }

    /// PATCH every row matched by `path`; returns the updated rows.
    pub async fn update<T>(&self, path: &str, changes: Value) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(
            Method::PATCH,
            path,
            Some(changes),
            &[("Prefer", "return=representation")],
        )
        .await
    }

    /// DELETE every row matched by `path`; returns how many rows were removed.
    pub async fn delete(&self, path: &str) -> Result<usize, DatabaseError> {
        let rows: Vec<Value> = self
            .request_with_headers(
                Method::DELETE,
                path,
                None,
                &[("Prefer", "return=representation")],
            )
            .await?;
        Ok(rows.len())
    }

    /// Calls a Postgres function exposed under `/rest/v1/rpc`.
    pub async fn rpc<T>(&self, function: &str, args: Value) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/rpc/{}", function);
        self.request(Method::POST, &path, Some(args)).await
    }

    /// Exact row count of `path` via a HEAD request.
    pub async fn count(&self, path: &str) -> Result<u64, DatabaseError> {
        let response = self
            .send(Method::HEAD, path, None, &[("Prefer", "count=exact")])
            .await?;
        let response = Self::check_status(response).await?;

        content_range_total(response.headers())
            .ok_or_else(|| DatabaseError::Decode("missing Content-Range total".to_string()))
    }

    /// Fetches one page of `path` (which must not carry limit/offset) along with the total.
    pub async fn fetch_page<T>(&self, path: &str, page: PageRequest) -> Result<Page<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let separator = if path.contains('?') { '&' } else { '?' };
        let paged_path = format!(
            "{}{}limit={}&offset={}",
            path,
            separator,
            page.per_page,
            page.offset()
        );

        let response = self
            .send(Method::GET, &paged_path, None, &[("Prefer", "count=exact")])
            .await?;

        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            // offset past the last row: empty page, total still reported
            let total = match content_range_total(response.headers()) {
                Some(total) => total,
                None => self.count(path).await?,
            };
            return Ok(Page::new(Vec::new(), PaginationMeta::new(total, page, 0)));
        }

        let response = Self::check_status(response).await?;
        let total = content_range_total(response.headers());
        let bytes = response.bytes().await?;
        let items: Vec<T> =
            serde_json::from_slice(&bytes).map_err(|e| DatabaseError::Decode(e.to_string()))?;

        let total = total.unwrap_or(items.len() as u64 + page.offset());
        let meta = PaginationMeta::new(total, page, items.len() as u64);
        Ok(Page::new(items, meta))
    }
}

/// Parses the total out of `Content-Range: 0-14/57` or `*/57`.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_RANGE)?
        .to_str()
        .ok()?
        .rsplit('/')
        .next()?
        .parse()
        .ok()
}
