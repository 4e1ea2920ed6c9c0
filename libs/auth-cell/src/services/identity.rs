use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_models::auth::Role;

use crate::models::AuthError;

/// Backend API of the identity provider that issues session tokens.
pub struct IdentityClient {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl IdentityClient {
    /// `None` when no identity secret is configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        if !config.is_identity_configured() {
            return None;
        }

        Some(Self {
            client: Client::new(),
            base_url: config.identity_api_url.trim_end_matches('/').to_string(),
            secret_key: config.identity_secret_key.clone(),
        })
    }

    /// Publish the role in public metadata so new session tokens carry it.
    pub async fn update_role(&self, user_id: &str, role: Role) -> Result<(), AuthError> {
        let body = json!({ "public_metadata": { "role": role } });
        self.send(Method::PATCH, &format!("/users/{}/metadata", urlencoding::encode(user_id)), Some(body))
            .await?;
        info!("Identity metadata role for {} set to {}", user_id, role);
        Ok(())
    }

    pub async fn ban(&self, user_id: &str) -> Result<(), AuthError> {
        self.send(Method::POST, &format!("/users/{}/ban", urlencoding::encode(user_id)), None)
            .await?;
        info!("Identity user {} banned", user_id);
        Ok(())
    }

    pub async fn unban(&self, user_id: &str) -> Result<(), AuthError> {
        self.send(Method::POST, &format!("/users/{}/unban", urlencoding::encode(user_id)), None)
            .await?;
        info!("Identity user {} unbanned", user_id);
        Ok(())
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, AuthError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Identity provider request: {} {}", method, url);

        let mut request = self.client.request(method, &url).bearer_auth(&self.secret_key);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| AuthError::Identity(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| AuthError::Identity(e.to_string()))?;

        if !status.is_success() {
            error!("Identity provider returned {}: {}", status, text);
            return Err(AuthError::Identity(format!("HTTP {}: {}", status, text)));
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| AuthError::Identity(format!("Failed to parse response: {}", e)))
    }
}
