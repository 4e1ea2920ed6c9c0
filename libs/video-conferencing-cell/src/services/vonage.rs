use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

use crate::models::{CreatedSession, VideoError, VonageClaims, CLIENT_TOKEN_TTL_SECS};

/// Video API client. Requests and client tokens are RS256 JWTs signed with
/// the application's private key.
pub struct VonageClient {
    client: Client,
    base_url: String,
    application_id: String,
    key: EncodingKey,
}

impl std::fmt::Debug for VonageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VonageClient")
            .field("base_url", &self.base_url)
            .field("application_id", &self.application_id)
            .finish_non_exhaustive()
    }
}

impl VonageClient {
    /// `Ok(None)` when video is not configured.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, VideoError> {
        if !config.is_video_configured() {
            return Ok(None);
        }

        // Keys supplied through a single-line env var carry escaped newlines
        let pem = config.vonage_private_key.replace("\\n", "\n");
        let key = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| VideoError::InvalidKey(e.to_string()))?;

        Ok(Some(Self {
            client: Client::new(),
            base_url: config.vonage_api_base.trim_end_matches('/').to_string(),
            application_id: config.vonage_application_id.clone(),
            key,
        }))
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    fn sign(&self, claims: &VonageClaims) -> Result<String, VideoError> {
        encode(&Header::new(Algorithm::RS256), claims, &self.key).map_err(|e| VideoError::Signing(e.to_string()))
    }

    fn base_claims(&self, now: DateTime<Utc>, ttl: Duration) -> VonageClaims {
        VonageClaims {
            application_id: self.application_id.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            scope: None,
            session_id: None,
            role: None,
            initial_layout_class_list: None,
            data: None,
        }
    }

    /// POST /session/create
    pub async fn create_session(&self) -> Result<String, VideoError> {
        let url = format!("{}/session/create", self.base_url);
        let app_token = self.sign(&self.base_claims(Utc::now(), Duration::minutes(5)))?;

        debug!("Creating video session at {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(app_token)
            .header("Accept", "application/json")
            .form(&[("archiveMode", "manual"), ("p2p.preference", "disabled")])
            .send()
            .await
            .map_err(|e| VideoError::Provider(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| VideoError::Provider(e.to_string()))?;

        if !status.is_success() {
            error!("Video session creation failed: {} - {}", status, text);
            return Err(VideoError::Provider(format!("HTTP {}: {}", status, text)));
        }

        let mut sessions: Vec<CreatedSession> = serde_json::from_str(&text)
            .map_err(|e| VideoError::Provider(format!("Failed to parse session response: {}", e)))?;
        if sessions.is_empty() {
            return Err(VideoError::Provider("Session response was empty".to_string()));
        }

        let session = sessions.remove(0);
        info!("Video session {} created", session.session_id);
        Ok(session.session_id)
    }

    /// Publisher token for `user` on `session_id`.
    pub fn client_token(&self, session_id: &str, user: &User, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>), VideoError> {
        let ttl = Duration::seconds(CLIENT_TOKEN_TTL_SECS);
        let data = json!({ "name": user.display_name(), "role": user.role() }).to_string();

        let claims = VonageClaims {
            scope: Some("session.connect".to_string()),
            session_id: Some(session_id.to_string()),
            role: Some("publisher".to_string()),
            initial_layout_class_list: Some(String::new()),
            data: Some(data),
            ..self.base_claims(now, ttl)
        };

        Ok((self.sign(&claims)?, now + ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use shared_utils::test_utils::{TestUser, TEST_RSA_PRIVATE_KEY, TEST_RSA_PUBLIC_KEY};

    fn config(base: &str) -> AppConfig {
        AppConfig {
            vonage_application_id: "app-123".to_string(),
            vonage_private_key: TEST_RSA_PRIVATE_KEY.to_string(),
            vonage_api_base: base.to_string(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn client_token_carries_session_scope() {
        let client = VonageClient::from_config(&config("http://localhost")).unwrap().unwrap();
        let user = TestUser::patient("p@example.com").to_user();
        let now = Utc::now();

        let (token, expires_at) = client.client_token("session-1", &user, now).unwrap();
        assert_eq!((expires_at - now).num_seconds(), CLIENT_TOKEN_TTL_SECS);

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        let decoded = decode::<VonageClaims>(
            &token,
            &DecodingKey::from_rsa_pem(TEST_RSA_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.application_id, "app-123");
        assert_eq!(decoded.claims.scope.as_deref(), Some("session.connect"));
        assert_eq!(decoded.claims.session_id.as_deref(), Some("session-1"));
        assert_eq!(decoded.claims.role.as_deref(), Some("publisher"));
    }

    #[test]
    fn unusable_key_is_reported() {
        let broken = AppConfig {
            vonage_private_key: "not a key".to_string(),
            ..config("http://localhost")
        };
        assert_matches!(VonageClient::from_config(&broken), Err(VideoError::InvalidKey(_)));
        assert!(VonageClient::from_config(&AppConfig::default()).unwrap().is_none());
    }

    #[tokio::test]
    async fn create_session_reads_first_session() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/session/create"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "session_id": "2_MX4xMjM0NTZ-" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = VonageClient::from_config(&config(&server.uri())).unwrap().unwrap();
        assert_eq!(client.create_session().await.unwrap(), "2_MX4xMjM0NTZ-");
    }
}
