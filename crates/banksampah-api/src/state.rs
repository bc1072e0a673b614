use std::{num::NonZeroU32, sync::Arc};

use anyhow::Context;
use banksampah_core::{
    security::JwtManager, BankStore, HttpReceiptSender, LogReceiptSender, MemoryStore,
    ReceiptSender, Settings,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::info;

/// Per-username limiter for `POST /auth/login`.
pub type LoginLimiter = DefaultKeyedRateLimiter<String>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BankStore>,
    pub jwt: Arc<JwtManager>,
    pub receipts: Arc<dyn ReceiptSender>,
    pub login_limiter: Arc<LoginLimiter>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Builds the store and receipt sender described by `settings`.
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let store: Arc<dyn BankStore> = match &settings.storage.snapshot_path {
            Some(path) => {
                info!(path = %path.display(), "Opening snapshot-backed store");
                Arc::new(
                    MemoryStore::open(path.clone())
                        .await
                        .context("opening store snapshot")?,
                )
            }
            None => {
                info!("Using in-memory store, data is lost on shutdown");
                Arc::new(MemoryStore::new())
            }
        };

        let receipts: Arc<dyn ReceiptSender> = if settings.mail.enabled {
            Arc::new(HttpReceiptSender::from_config(&settings.mail).context("configuring mail relay")?)
        } else {
            Arc::new(LogReceiptSender)
        };

        Self::from_parts(settings, store, receipts)
    }

    pub fn from_parts(
        settings: Settings,
        store: Arc<dyn BankStore>,
        receipts: Arc<dyn ReceiptSender>,
    ) -> anyhow::Result<Self> {
        let jwt = JwtManager::new(
            &settings.jwt_secret()?,
            chrono::Duration::minutes(settings.auth.access_token_minutes),
            chrono::Duration::days(settings.auth.refresh_token_days),
        );

        let per_minute = NonZeroU32::new(settings.security.login_attempts_per_minute)
            .context("security.login_attempts_per_minute must be > 0")?;
        let login_limiter = RateLimiter::keyed(Quota::per_minute(per_minute));

        Ok(Self {
            store,
            jwt: Arc::new(jwt),
            receipts,
            login_limiter: Arc::new(login_limiter),
            settings: Arc::new(settings),
        })
    }
}
