use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database is not configured")]
    NotConfigured,

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// `eq.` filter operand with the value URL-encoded.
pub fn eq(value: impl AsRef<str>) -> String {
    format!("eq.{}", urlencoding::encode(value.as_ref()))
}

/// Client for the managed document store's REST data API.
///
/// Collections are addressed as `/rest/v1/{table}` and filtered with
/// PostgREST-style query strings (`field=eq.value&order=created_at.desc`).
pub struct DatabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl DatabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.database_url.trim_end_matches('/').to_string(),
            api_key: config.database_api_key.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", key);
        }
        if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, bearer);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        if !self.is_configured() {
            return Err(DatabaseError::NotConfigured);
        }

        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers();
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("Database API error ({}): {}", status, text);
            return Err(Self::map_status(status, text));
        }

        if text.trim().is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn map_status(status: StatusCode, message: String) -> DatabaseError {
        match status.as_u16() {
            401 | 403 => DatabaseError::Auth(message),
            404 => DatabaseError::NotFound(message),
            409 => DatabaseError::Conflict(message),
            code => DatabaseError::Api { status: code, message },
        }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn table_path(table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("/rest/v1/{}", table)
        } else {
            format!("/rest/v1/{}?{}", table, query)
        }
    }

    pub async fn select<T>(&self, table: &str, query: &str) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<Value> = self
            .request(Method::GET, &Self::table_path(table, query), None)
            .await?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(DatabaseError::from)
    }

    pub async fn select_one<T>(&self, table: &str, query: &str) -> Result<Option<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let query = if query.is_empty() {
            "limit=1".to_string()
        } else {
            format!("{}&limit=1", query)
        };
        let mut rows = self.select::<T>(table, &query).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
    }

    pub async fn insert<T>(&self, table: &str, document: Value) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let mut rows: Vec<Value> = self
            .request_with_headers(
                Method::POST,
                &Self::table_path(table, ""),
                Some(document),
                Some(Self::representation_headers()),
            )
            .await?;

        if rows.is_empty() {
            return Err(DatabaseError::Api {
                status: 500,
                message: format!("Insert into {} returned no rows", table),
            });
        }

        Ok(serde_json::from_value(rows.remove(0))?)
    }

    /// PATCH every row matching `filter`; returns the updated rows (empty when nothing matched).
    pub async fn update<T>(&self, table: &str, filter: &str, changes: Value) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<Value> = self
            .request_with_headers(
                Method::PATCH,
                &Self::table_path(table, filter),
                Some(changes),
                Some(Self::representation_headers()),
            )
            .await?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(DatabaseError::from)
    }

    pub async fn delete(&self, table: &str, filter: &str) -> Result<(), DatabaseError> {
        let _: Value = self
            .request(Method::DELETE, &Self::table_path(table, filter), None)
            .await?;
        Ok(())
    }

    /// Exact row count for `filter`, read from the `Content-Range` header.
    pub async fn count(&self, table: &str, filter: &str) -> Result<i64, DatabaseError> {
        if !self.is_configured() {
            return Err(DatabaseError::NotConfigured);
        }

        let query = if filter.is_empty() {
            "select=id".to_string()
        } else {
            format!("select=id&{}", filter)
        };
        let url = format!("{}{}", self.base_url, Self::table_path(table, &query));
        debug!("Counting rows at {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.get_headers())
            .header("Prefer", "count=exact")
            .header("Range-Unit", "items")
            .header("Range", "0-0")
            .send()
            .await?;

        let status = response.status();
        let content_range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let text = response.text().await?;
            error!("Database count error ({}): {}", status, text);
            return Err(Self::map_status(status, text));
        }

        content_range
            .as_deref()
            .and_then(|range| range.rsplit('/').next())
            .and_then(|total| total.parse::<i64>().ok())
            .ok_or_else(|| DatabaseError::Api {
                status: status.as_u16(),
                message: "Missing or malformed Content-Range header".to_string(),
            })
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(uri: &str) -> AppConfig {
        AppConfig {
            database_url: uri.to_string(),
            database_api_key: "service-key".to_string(),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn select_sends_api_key_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/doctors"))
            .and(query_param("specialty", "eq.Cardiology"))
            .and(header("apikey", "service-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
            .mount(&server)
            .await;

        let client = DatabaseClient::new(&config_for(&server.uri()));
        let rows: Vec<Value> = client
            .select("doctors", &format!("specialty={}", eq("Cardiology")))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn select_one_returns_none_for_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = DatabaseClient::new(&config_for(&server.uri()));
        let row: Option<Value> = client.select_one("users", "auth_id=eq.x").await.unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn conflict_status_maps_to_conflict_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
            .mount(&server)
            .await;

        let client = DatabaseClient::new(&config_for(&server.uri()));
        let result: Result<Value, _> = client.insert("appointments", json!({})).await;
        assert!(matches!(result, Err(DatabaseError::Conflict(_))));
    }

    #[tokio::test]
    async fn count_reads_content_range_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .and(header("Prefer", "count=exact"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "0-0/42")
                    .set_body_json(json!([{"id": "a"}])),
            )
            .mount(&server)
            .await;

        let client = DatabaseClient::new(&config_for(&server.uri()));
        assert_eq!(client.count("patients", "").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_requests() {
        let client = DatabaseClient::new(&AppConfig::default());
        let result: Result<Vec<Value>, _> = client.select("users", "").await;
        assert!(matches!(result, Err(DatabaseError::NotConfigured)));
    }

    #[test]
    fn eq_encodes_values() {
        assert_eq!(eq("a b@c"), "eq.a%20b%40c");
    }
}
