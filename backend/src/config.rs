use crate::services::media_service::MediaService;
use crate::services::token_service::TokenService;
use crate::AppState;
use anyhow::{Context, Result};
use env_logger::Builder;
use log::{info, LevelFilter};
use mongodb::{Client, Database};
use rocket::http::Method;
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_DB_NAME: &str = "clipstream";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:8080";
pub const DEFAULT_MEDIA_BASE_URL: &str = "https://api.cloudinary.com";
pub const DEFAULT_UPLOAD_DIR: &str = "./public/temp";

/// 15 minutes / 10 days, overridable per environment.
pub const DEFAULT_ACCESS_TOKEN_EXPIRY_SECS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TOKEN_EXPIRY_SECS: i64 = 10 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mongo_uri: String,
    pub db_name: String,
    pub cors_origin: String,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry_secs: i64,
    pub refresh_token_expiry_secs: i64,
    pub media_base_url: String,
    pub media_cloud_name: String,
    pub media_api_key: String,
    pub media_api_secret: String,
    pub upload_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            mongo_uri: env::var("MONGODB_URI")
                .context("MONGODB_URI environment variable must be set")?,
            db_name: env::var("DB_NAME").unwrap_or_else(|_| DEFAULT_DB_NAME.to_string()),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string()),
            access_token_secret: env::var("ACCESS_TOKEN_SECRET")
                .context("ACCESS_TOKEN_SECRET environment variable must be set")?,
            refresh_token_secret: env::var("REFRESH_TOKEN_SECRET")
                .context("REFRESH_TOKEN_SECRET environment variable must be set")?,
            access_token_expiry_secs: seconds_from_env(
                "ACCESS_TOKEN_EXPIRY",
                DEFAULT_ACCESS_TOKEN_EXPIRY_SECS,
            )?,
            refresh_token_expiry_secs: seconds_from_env(
                "REFRESH_TOKEN_EXPIRY",
                DEFAULT_REFRESH_TOKEN_EXPIRY_SECS,
            )?,
            media_base_url: env::var("MEDIA_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_MEDIA_BASE_URL.to_string()),
            media_cloud_name: env::var("MEDIA_CLOUD_NAME")
                .context("MEDIA_CLOUD_NAME environment variable must be set")?,
            media_api_key: env::var("MEDIA_API_KEY")
                .context("MEDIA_API_KEY environment variable must be set")?,
            media_api_secret: env::var("MEDIA_API_SECRET")
                .context("MEDIA_API_SECRET environment variable must be set")?,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR)),
        })
    }
}

fn seconds_from_env(key: &str, default: i64) -> Result<i64> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("{key} must be a number of seconds, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

pub fn init_logger() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
    info!("Starting Rocket backend...");
}

pub async fn create_mongo_database(config: &AppConfig) -> Result<Database> {
    info!("Connecting to MongoDB database {}", config.db_name);
    let client = Client::with_uri_str(&config.mongo_uri)
        .await
        .context("Failed to connect to MongoDB")?;
    Ok(client.database(&config.db_name))
}

pub async fn create_app_state() -> Result<AppState> {
    let config = AppConfig::from_env()?;
    let db = create_mongo_database(&config).await?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;

    let media = MediaService::new(
        &config.media_base_url,
        &config.media_cloud_name,
        &config.media_api_key,
        &config.media_api_secret,
    );
    let tokens = TokenService::new(
        &config.access_token_secret,
        &config.refresh_token_secret,
        config.access_token_expiry_secs,
        config.refresh_token_expiry_secs,
    );

    Ok(AppState {
        db,
        media,
        tokens,
        config,
    })
}

pub fn create_cors(config: &AppConfig) -> Result<rocket_cors::Cors> {
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::some_exact(&[config.cors_origin.as_str()]))
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Patch,
                Method::Delete,
                Method::Options,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allowed_headers(AllowedHeaders::some(&[
            "Authorization",
            "Accept",
            "Content-Type",
        ]))
        .allow_credentials(true)
        .to_cors()
        .map_err(|e| anyhow::anyhow!("Failed to create CORS options: {}", e))?;

    Ok(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_from_env_uses_default_when_unset() {
        env::remove_var("TEST_EXPIRY_UNSET");
        assert_eq!(seconds_from_env("TEST_EXPIRY_UNSET", 900).unwrap(), 900);
    }

    #[test]
    fn seconds_from_env_parses_override() {
        env::set_var("TEST_EXPIRY_SET", "3600");
        assert_eq!(seconds_from_env("TEST_EXPIRY_SET", 900).unwrap(), 3600);
        env::remove_var("TEST_EXPIRY_SET");
    }

    #[test]
    fn seconds_from_env_rejects_garbage() {
        env::set_var("TEST_EXPIRY_BAD", "ten minutes");
        assert!(seconds_from_env("TEST_EXPIRY_BAD", 900).is_err());
        env::remove_var("TEST_EXPIRY_BAD");
    }
}
