//! Runtime configuration.
//!
//! Everything is resolved once from the environment (after `.env` has been
//! loaded) into an [`AppConfig`] that is handed to the services explicitly.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub catalogue: Option<CatalogueConfig>,
    pub public_base_url: String,
    pub notification: NotificationConfig,
    pub pricing: PricingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Storefront REST API credentials.
#[derive(Clone, Debug)]
pub struct CatalogueConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Clone, Debug)]
pub struct SmsConfig {
    pub gateway_url: String,
    pub api_token: String,
    pub sender_id: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub email: Option<SmtpConfig>,
    pub sms: Option<SmsConfig>,
    pub monthly_email_quota: u32,
    pub monthly_sms_quota: u32,
    /// Bank transfer details appended to the pending-enrolment email.
    pub payment_instructions: String,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub prices_include_gst: bool,
    pub gst_label: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            prices_include_gst: true,
            gst_label: "GST".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            email: None,
            sms: None,
            monthly_email_quota: 1000,
            monthly_sms_quota: 200,
            payment_instructions: String::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let bind_addr = parse_or("ACADEMY_BIND", SocketAddr::from(([127, 0, 0, 1], 3000)))?;

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://academy.db".to_string()),
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
        };

        let catalogue = match env::var("CATALOGUE_BASE_URL").ok() {
            Some(base_url) => Some(CatalogueConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                consumer_key: required("CATALOGUE_CONSUMER_KEY")?,
                consumer_secret: required("CATALOGUE_CONSUMER_SECRET")?,
                timeout_secs: parse_or("CATALOGUE_TIMEOUT_SECS", 30)?,
                max_attempts: parse_or("CATALOGUE_MAX_ATTEMPTS", 2)?,
            }),
            None => None,
        };

        let email = match env::var("SMTP_SERVER").ok() {
            Some(server) => Some(SmtpConfig {
                server,
                port: parse_or("SMTP_PORT", 587)?,
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
                from_email: required("SMTP_FROM_EMAIL")?,
                from_name: env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Academy".to_string()),
            }),
            None => None,
        };

        let sms = match env::var("SMS_GATEWAY_URL").ok() {
            Some(gateway_url) => Some(SmsConfig {
                gateway_url,
                api_token: required("SMS_API_TOKEN")?,
                sender_id: env::var("SMS_SENDER_ID").unwrap_or_else(|_| "Academy".to_string()),
                timeout_secs: parse_or("SMS_TIMEOUT_SECS", 10)?,
            }),
            None => None,
        };

        let defaults = NotificationConfig::default();
        let notification = NotificationConfig {
            email,
            sms,
            monthly_email_quota: parse_or("EMAIL_MONTHLY_QUOTA", defaults.monthly_email_quota)?,
            monthly_sms_quota: parse_or("SMS_MONTHLY_QUOTA", defaults.monthly_sms_quota)?,
            payment_instructions: env::var("PAYMENT_INSTRUCTIONS").unwrap_or_default(),
        };

        let pricing = PricingConfig {
            prices_include_gst: parse_or("PRICES_INCLUDE_GST", true)?,
            gst_label: env::var("GST_LABEL").unwrap_or_else(|_| "GST".to_string()),
        };

        let config = Self {
            server: ServerConfig { bind_addr },
            database,
            catalogue,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            notification,
            pricing,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.database.max_connections == 0 {
            return Err(AppError::Config("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string()));
        }
        if let Some(catalogue) = &self.catalogue {
            if !(1..=2).contains(&catalogue.max_attempts) {
                return Err(AppError::Config("CATALOGUE_MAX_ATTEMPTS must be 1 or 2".to_string()));
            }
            if catalogue.timeout_secs == 0 {
                return Err(AppError::Config("CATALOGUE_TIMEOUT_SECS must be greater than 0".to_string()));
            }
        }
        if self.public_base_url.is_empty() {
            return Err(AppError::Config("PUBLIC_BASE_URL is empty".to_string()));
        }
        Ok(())
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Config(format!("{} is not set", key)))
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AppConfig {
        AppConfig {
            server: ServerConfig { bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)) },
            database: DatabaseConfig { url: "sqlite::memory:".to_string(), max_connections: 1 },
            catalogue: None,
            public_base_url: "https://school.example".to_string(),
            notification: NotificationConfig::default(),
            pricing: PricingConfig::default(),
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_more_than_two_attempts() {
        let mut config = base();
        config.catalogue = Some(CatalogueConfig {
            base_url: "https://shop.example/wp-json/wc/v3".to_string(),
            consumer_key: "ck".to_string(),
            consumer_secret: "cs".to_string(),
            timeout_secs: 30,
            max_attempts: 5,
        });
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
