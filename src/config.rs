//! Application configuration.
//!
//! Everything is read from the environment once at startup. In debug builds a
//! `.env` file in the working directory is loaded first.

use std::env;
use std::time::Duration;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 5000;
const DATABASE_NAME: &str = "tourease";
const CORS_ORIGIN: &str = "http://localhost:3000";
const KHALTI_BASE_URL: &str = "https://a.khalti.com/api/v2";
const FROM_EMAIL: &str = "noreply@tourease.com";

/// Upper bound on gateway retries, whatever the environment asks for.
pub const MAX_KHALTI_RETRIES: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct KhaltiConfig {
    pub secret_key: String,
    pub base_url: String,
    pub return_url: String,
    pub website_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub sendgrid_api_key: String,
    pub from_email: String,
}

#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub cookie_secure: bool,
    pub cors_origin: String,
    pub from_email: String,
    pub khalti: Option<KhaltiConfig>,
    pub email: Option<EmailConfig>,
    pub cloudinary: Option<CloudinaryConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if cfg!(debug_assertions) {
            dotenv::dotenv().ok();
        }

        let host = env::var("HOST").unwrap_or_else(|_| HOST.to_string());
        let port = parse_var("PORT", PORT)?;
        let mongo_uri = required_var("MONGODB_URI")?;
        let database_name =
            env::var("DATABASE_NAME").unwrap_or_else(|_| DATABASE_NAME.to_string());
        let jwt_secret = required_var("JWT_SECRET")?;
        let jwt_ttl_hours = parse_var("JWT_TTL_HOURS", 24i64)?;
        let cookie_secure = parse_var("COOKIE_SECURE", !cfg!(debug_assertions))?;
        let cors_origin = env::var("CORS_ORIGIN").unwrap_or_else(|_| CORS_ORIGIN.to_string());
        let from_email = env::var("FROM_EMAIL").unwrap_or_else(|_| FROM_EMAIL.to_string());

        let khalti = match env::var("KHALTI_SECRET_KEY").ok() {
            Some(secret_key) => Some(KhaltiConfig {
                secret_key,
                base_url: env::var("KHALTI_BASE_URL")
                    .unwrap_or_else(|_| KHALTI_BASE_URL.to_string()),
                return_url: required_var("KHALTI_RETURN_URL")?,
                website_url: env::var("KHALTI_WEBSITE_URL")
                    .unwrap_or_else(|_| cors_origin.clone()),
                timeout: Duration::from_secs(parse_var("KHALTI_TIMEOUT_SECS", 10u64)?),
                max_retries: parse_var("KHALTI_MAX_RETRIES", 2u32)?
                    .min(MAX_KHALTI_RETRIES),
            }),
            None => None,
        };

        let email = env::var("SENDGRID_API_KEY").ok().map(|sendgrid_api_key| EmailConfig {
            sendgrid_api_key,
            from_email: from_email.clone(),
        });

        let cloudinary = match (
            env::var("CLOUDINARY_CLOUD_NAME").ok(),
            env::var("CLOUDINARY_API_KEY").ok(),
            env::var("CLOUDINARY_API_SECRET").ok(),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        Ok(Self {
            host,
            port,
            mongo_uri,
            database_name,
            jwt_secret,
            jwt_ttl_hours,
            cookie_secure,
            cors_origin,
            from_email,
            khalti,
            email,
            cloudinary,
        })
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
