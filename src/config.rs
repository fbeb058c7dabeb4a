use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

pub const PLACEHOLDER_AVATAR_URL: &str =
    "https://res.cloudinary.com/ephaig/image/upload/v1555015808/download.png";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2id work factor.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub time_cost: u32,
    pub memory_kib: u32,
}

/// S3-compatible media host used for profile images.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub media: MediaConfig,
    pub default_avatar_url: String,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mongodb_uri = std::env::var("MONGODB_URI").context("MONGODB_URI is not set")?;
        let mongodb_database =
            std::env::var("MONGODB_DATABASE").unwrap_or_else(|_| "accounts".into());

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "accounts-api".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "accounts-api-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60 * 24 * 7),
        };

        let password = PasswordConfig {
            time_cost: env_parse("PASSWORD_TIME_COST").unwrap_or(10),
            memory_kib: env_parse("PASSWORD_MEMORY_KIB").unwrap_or(argon2::Params::DEFAULT_M_COST),
        };

        let endpoint = std::env::var("MEDIA_ENDPOINT").context("MEDIA_ENDPOINT is not set")?;
        let bucket = std::env::var("MEDIA_BUCKET").context("MEDIA_BUCKET is not set")?;
        let public_url = std::env::var("MEDIA_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let media = MediaConfig {
            access_key: std::env::var("MEDIA_ACCESS_KEY")
                .context("MEDIA_ACCESS_KEY is not set")?,
            secret_key: std::env::var("MEDIA_SECRET_KEY")
                .context("MEDIA_SECRET_KEY is not set")?,
            region: std::env::var("MEDIA_REGION").unwrap_or_else(|_| "us-east-1".into()),
            public_url: public_url.trim_end_matches('/').to_string(),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES").unwrap_or(5 * 1024 * 1024),
            endpoint,
            bucket,
        };

        let bind_addr = format!(
            "{}:{}",
            std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
        )
        .parse()
        .context("APP_HOST/APP_PORT do not form a socket address")?;

        Ok(Self {
            mongodb_uri,
            mongodb_database,
            jwt,
            password,
            media,
            default_avatar_url: std::env::var("DEFAULT_AVATAR_URL")
                .unwrap_or_else(|_| PLACEHOLDER_AVATAR_URL.into()),
            bind_addr,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
