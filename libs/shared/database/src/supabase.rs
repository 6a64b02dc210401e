use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Unique or exclusion constraint violation reported by the store.
    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl DatabaseError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err.to_string())
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        headers
    }

    /// Headers asking PostgREST to echo the written rows back.
    pub fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response, DatabaseError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DatabaseError::Auth(error_text),
                StatusCode::NOT_FOUND => DatabaseError::NotFound(error_text),
                StatusCode::CONFLICT => DatabaseError::Conflict(error_text),
                _ => DatabaseError::Api { status: status.as_u16(), message: error_text },
            });
        }

        Ok(response)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        let response = self.send(method, path, auth_token, body, headers).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| DatabaseError::Decode(e.to_string()))
    }

    /// Runs a write whose response body is irrelevant (PostgREST answers
    /// deletes and minimal-return writes with 204).
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(), DatabaseError> {
        self.send(method, path, auth_token, body, None).await?;
        Ok(())
    }

    /// Fetches the rows matching `path` and decodes the first one, if any.
    pub async fn find_one<T>(&self, path: &str, auth_token: &str) -> Result<Option<T>, DatabaseError>
    where T: DeserializeOwned {
        let rows: Vec<Value> = self.request(Method::GET, path, Some(auth_token), None).await?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| DatabaseError::Decode(e.to_string())),
            None => Ok(None),
        }
    }

    /// Decodes every row matching `path`.
    pub async fn find_many<T>(&self, path: &str, auth_token: &str) -> Result<Vec<T>, DatabaseError>
    where T: DeserializeOwned {
        self.request(Method::GET, path, Some(auth_token), None).await
    }

    /// POSTs `body` to `table` and returns the stored rows.
    pub async fn insert<T>(&self, table: &str, auth_token: &str, body: Value) -> Result<Vec<T>, DatabaseError>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}", table);
        self.request_with_headers(
            Method::POST,
            &path,
            Some(auth_token),
            Some(body),
            Some(Self::representation_headers()),
        ).await
    }

    /// PATCHes the rows matched by `path` and returns them after the update.
    pub async fn update<T>(&self, path: &str, auth_token: &str, body: Value) -> Result<Vec<T>, DatabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(
            Method::PATCH,
            path,
            Some(auth_token),
            Some(body),
            Some(Self::representation_headers()),
        ).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// `eq.` filter with the value percent-encoded.
pub fn eq_filter(value: impl AsRef<str>) -> String {
    format!("eq.{}", urlencoding::encode(value.as_ref()))
}

/// Case-insensitive substring filter value (`ilike.*term*`).
pub fn ilike_contains(term: &str) -> String {
    // PostgREST reserves these inside filter values.
    let cleaned: String = term
        .chars()
        .filter(|c| !matches!(c, '*' | '%' | ',' | '(' | ')'))
        .collect();
    format!("ilike.*{}*", urlencoding::encode(cleaned.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> AppConfig {
        AppConfig {
            supabase_url: url.to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            server_port: 5000,
            upload_dir: PathBuf::from("cover"),
            max_upload_bytes: 1024,
        }
    }

    #[test]
    fn test_filters_are_encoded() {
        assert_eq!(eq_filter("a b"), "eq.a%20b");
        assert_eq!(ilike_contains(" Cardio(*) "), "ilike.*Cardio*");
    }

    #[tokio::test]
    async fn test_conflict_status_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .and(header("Prefer", "return=representation"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key value"))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config(&server.uri()));
        let result: Result<Vec<Value>, _> = client
            .insert("appointments", "token", json!({ "time": "09:00" }))
            .await;

        let err = result.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_find_one_returns_none_for_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config(&server.uri()));
        let found: Option<Value> = client
            .find_one("/rest/v1/patients?user_id=eq.x", "token")
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
