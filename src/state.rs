use std::sync::Arc;

use anyhow::Context;
use mongodb::Client;

use crate::config::AppConfig;
use crate::storage::{Storage, StorageClient};
use crate::users::repo::{MongoUserRepository, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let client = Client::with_uri_str(&config.mongodb_uri)
            .await
            .context("connect to mongodb")?;
        let db = client.database(&config.mongodb_database);
        let users = MongoUserRepository::new(&db);
        users
            .init_indexes()
            .await
            .context("create user indexes")?;

        let storage = Arc::new(
            Storage::new(&config.media)
                .await
                .context("configure media storage")?,
        ) as Arc<dyn StorageClient>;

        Ok(Self::from_parts(config, Arc::new(users), storage))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            config,
            users,
            storage,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// In-memory users, recording storage and cheap hashing.
    pub fn fake() -> Self {
        Self::fake_with(Arc::new(crate::storage::fake::FakeStorage::default()))
    }

    pub fn fake_with(storage: Arc<dyn StorageClient>) -> Self {
        use crate::config::{JwtConfig, MediaConfig, PasswordConfig, PLACEHOLDER_AVATAR_URL};
        use crate::users::repo::memory::InMemoryUserRepository;

        let config = Arc::new(AppConfig {
            mongodb_uri: "mongodb://localhost:27017".into(),
            mongodb_database: "accounts_test".into(),
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            password: PasswordConfig {
                time_cost: 1,
                memory_kib: argon2::Params::MIN_M_COST,
            },
            media: MediaConfig {
                endpoint: "fake".into(),
                bucket: "fake".into(),
                access_key: "fake".into(),
                secret_key: "fake".into(),
                region: "us-east-1".into(),
                public_url: "https://fake.local".into(),
                max_upload_bytes: 1024 * 1024,
            },
            default_avatar_url: PLACEHOLDER_AVATAR_URL.into(),
            bind_addr: "127.0.0.1:0".parse().expect("static addr"),
        });

        Self::from_parts(
            config,
            Arc::new(InMemoryUserRepository::default()),
            storage,
        )
    }
}
