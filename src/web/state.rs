use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::{AppConfig, SiteSettings},
    web::storage::{STORAGE_AREAS, ensure_storage_area},
};

const LINK_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    config: Arc<AppConfig>,
    settings: Arc<RwLock<SiteSettings>>,
    http: reqwest::Client,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
            .context("failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        SiteSettings::ensure_defaults(&pool)
            .await
            .context("failed to seed default site settings")?;
        let settings = SiteSettings::load(&pool)
            .await
            .context("failed to load site settings")?;

        for area in STORAGE_AREAS {
            ensure_storage_area(&config.storage_root, area).await?;
        }

        let http = reqwest::Client::builder()
            .timeout(LINK_CHECK_TIMEOUT)
            .user_agent(concat!("curriculum-portal/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            pool,
            config: Arc::new(config),
            settings: Arc::new(RwLock::new(settings)),
            http,
        })
    }

    pub async fn ensure_seed_admin(&self) -> Result<()> {
        let has_admin: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM admin_users)")
            .fetch_one(&self.pool)
            .await
            .context("failed to verify admin presence")?;

        if has_admin {
            return Ok(());
        }

        let username = &self.config.seed_admin_username;
        let password_hash = crate::web::auth::hash_password(&self.config.seed_admin_password)
            .map_err(|err| anyhow!("failed to hash seed admin password: {err}"))?;

        sqlx::query("INSERT INTO admin_users (id, username, password_hash) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .context("failed to insert seed admin user")?;

        if self.config.uses_default_seed_password() {
            warn!(
                %username,
                "Seeded admin user with the default password 'change-me'. Update it promptly."
            );
        } else {
            info!(%username, "Seeded admin user from SEED_ADMIN_PASSWORD");
        }

        Ok(())
    }

    pub fn pool_ref(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn storage_root(&self) -> &Path {
        &self.config.storage_root
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.config.public_base_url.as_deref()
    }

    pub fn http_client(&self) -> reqwest::Client {
        self.http.clone()
    }

    pub async fn site_settings(&self) -> SiteSettings {
        self.settings.read().await.clone()
    }

    pub async fn reload_settings(&self) -> Result<()> {
        let latest = SiteSettings::load(&self.pool)
            .await
            .context("failed to reload site settings")?;
        let mut guard = self.settings.write().await;
        *guard = latest;
        Ok(())
    }
}
