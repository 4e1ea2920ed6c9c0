use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_api_key: String,
    pub auth_jwt_secret: String,
    pub identity_api_url: String,
    pub identity_secret_key: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub vonage_application_id: String,
    pub vonage_private_key: String,
    pub vonage_api_base: String,
    pub resend_api_key: String,
    pub resend_api_base: String,
    pub email_from: String,
    pub app_url: String,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub credits_per_appointment: i64,
    pub initial_patient_credits: i64,
    pub port: u16,
}

fn var_or_empty(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn var_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using default", name);
        default.to_string()
    })
}

fn parsed_or_default<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            database_url: var_or_empty("DATABASE_URL"),
            database_api_key: var_or_empty("DATABASE_API_KEY"),
            auth_jwt_secret: var_or_empty("AUTH_JWT_SECRET"),
            identity_api_url: var_or_default("IDENTITY_API_URL", "https://api.clerk.com/v1"),
            identity_secret_key: var_or_empty("IDENTITY_SECRET_KEY"),
            stripe_secret_key: var_or_empty("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: var_or_empty("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: var_or_default("STRIPE_API_BASE", "https://api.stripe.com/v1"),
            vonage_application_id: var_or_empty("VONAGE_APPLICATION_ID"),
            vonage_private_key: var_or_empty("VONAGE_PRIVATE_KEY").replace("\\n", "\n"),
            vonage_api_base: var_or_default("VONAGE_API_BASE", "https://video.api.vonage.com"),
            resend_api_key: var_or_empty("RESEND_API_KEY"),
            resend_api_base: var_or_default("RESEND_API_BASE", "https://api.resend.com"),
            email_from: var_or_default("EMAIL_FROM", "no-reply@telehealth.local"),
            app_url: var_or_default("APP_URL", "http://localhost:3000"),
            rate_limit_max_requests: parsed_or_default("RATE_LIMIT_MAX_REQUESTS", 100),
            rate_limit_window_secs: parsed_or_default("RATE_LIMIT_WINDOW_SECS", 60),
            credits_per_appointment: parsed_or_default("CREDITS_PER_APPOINTMENT", 2),
            initial_patient_credits: parsed_or_default("INITIAL_PATIENT_CREDITS", 2),
            port: parsed_or_default("PORT", 3000),
        };

        if !config.is_database_configured() {
            warn!("Database not configured - handlers will serve demo data");
        }
        if !config.is_auth_configured() {
            warn!("AUTH_JWT_SECRET missing - every authenticated request will be rejected");
        }

        config
    }

    pub fn is_database_configured(&self) -> bool {
        !self.database_url.is_empty() && !self.database_api_key.is_empty()
    }

    pub fn is_auth_configured(&self) -> bool {
        !self.auth_jwt_secret.is_empty()
    }

    pub fn is_identity_configured(&self) -> bool {
        !self.identity_api_url.is_empty() && !self.identity_secret_key.is_empty()
    }

    pub fn is_payments_configured(&self) -> bool {
        !self.stripe_secret_key.is_empty() && !self.stripe_api_base.is_empty()
    }

    pub fn is_video_configured(&self) -> bool {
        !self.vonage_application_id.is_empty()
            && !self.vonage_private_key.is_empty()
            && !self.vonage_api_base.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.resend_api_key.is_empty() && !self.resend_api_base.is_empty()
    }
}

impl Default for AppConfig {
    /// Everything unconfigured: the demo-mode baseline.
    fn default() -> Self {
        Self {
            database_url: String::new(),
            database_api_key: String::new(),
            auth_jwt_secret: String::new(),
            identity_api_url: "https://api.clerk.com/v1".to_string(),
            identity_secret_key: String::new(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_api_base: "https://api.stripe.com/v1".to_string(),
            vonage_application_id: String::new(),
            vonage_private_key: String::new(),
            vonage_api_base: "https://video.api.vonage.com".to_string(),
            resend_api_key: String::new(),
            resend_api_base: "https://api.resend.com".to_string(),
            email_from: "no-reply@telehealth.local".to_string(),
            app_url: "http://localhost:3000".to_string(),
            rate_limit_max_requests: 100,
            rate_limit_window_secs: 60,
            credits_per_appointment: 2,
            initial_patient_credits: 2,
            port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_in_demo_mode() {
        let config = AppConfig::default();
        assert!(!config.is_database_configured());
        assert!(!config.is_payments_configured());
        assert!(!config.is_video_configured());
        assert!(!config.is_email_configured());
        assert_eq!(config.credits_per_appointment, 2);
    }

    #[test]
    fn database_needs_url_and_key() {
        let mut config = AppConfig::default();
        config.database_url = "http://localhost:54321".to_string();
        assert!(!config.is_database_configured());
        config.database_api_key = "key".to_string();
        assert!(config.is_database_configured());
    }
}
