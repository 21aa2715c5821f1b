use std::{env, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

const SITE_SETTINGS_KEY: &str = "site";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STORAGE_ROOT: &str = "storage";
const DEFAULT_MAX_UPLOAD_MB: u64 = 50;
const DEFAULT_DB_CONNECTIONS: u32 = 10;
const DEFAULT_SEED_ADMIN: &str = "admin";
const DEFAULT_SEED_PASSWORD: &str = "change-me";

/// Process-level configuration read once from the environment at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub storage_root: PathBuf,
    pub public_base_url: Option<String>,
    pub max_upload_bytes: u64,
    pub db_max_connections: u32,
    pub seed_admin_username: String,
    pub seed_admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database_url = get("DATABASE_URL").context("DATABASE_URL env var is missing")?;

        let port = match get("PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT must be a port number, got `{raw}`"))?,
            None => DEFAULT_PORT,
        };

        let max_upload_mb: u64 = match get("MAX_UPLOAD_MB") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("MAX_UPLOAD_MB must be an integer, got `{raw}`"))?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };
        if max_upload_mb == 0 {
            return Err(anyhow!("MAX_UPLOAD_MB must be greater than zero"));
        }
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .context("MAX_UPLOAD_MB is too large")?;

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS must be an integer, got `{raw}`"))?,
            None => DEFAULT_DB_CONNECTIONS,
        };

        let public_base_url = get("PUBLIC_BASE_URL").map(|url| url.trim_end_matches('/').to_string());
        if let Some(url) = &public_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow!("PUBLIC_BASE_URL must start with http:// or https://"));
            }
        }

        Ok(Self {
            database_url,
            port,
            storage_root: PathBuf::from(
                get("STORAGE_ROOT").unwrap_or_else(|| DEFAULT_STORAGE_ROOT.to_string()),
            ),
            public_base_url,
            max_upload_bytes,
            db_max_connections,
            seed_admin_username: get("SEED_ADMIN_USERNAME")
                .unwrap_or_else(|| DEFAULT_SEED_ADMIN.to_string()),
            seed_admin_password: get("SEED_ADMIN_PASSWORD")
                .unwrap_or_else(|| DEFAULT_SEED_PASSWORD.to_string()),
        })
    }

    pub fn uses_default_seed_password(&self) -> bool {
        self.seed_admin_password == DEFAULT_SEED_PASSWORD
    }
}

/// Site-wide presentation settings, stored as JSON in `site_settings` and editable by admins.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SiteSettings {
    pub site_title: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub footer_text: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_title: "Curriculum Portal".to_string(),
            tagline: "Teaching materials organised by grade and unit.".to_string(),
            footer_text: "Shared for classroom use.".to_string(),
        }
    }
}

impl SiteSettings {
    pub async fn ensure_defaults(pool: &PgPool) -> Result<()> {
        let payload = serde_json::to_value(SiteSettings::default())?;
        sqlx::query(
            "INSERT INTO site_settings (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO NOTHING",
        )
        .bind(SITE_SETTINGS_KEY)
        .bind(payload)
        .execute(pool)
        .await
        .context("failed to seed site settings")?;
        Ok(())
    }

    pub async fn load(pool: &PgPool) -> Result<Self> {
        let value: Option<Value> =
            sqlx::query_scalar("SELECT value FROM site_settings WHERE key = $1")
                .bind(SITE_SETTINGS_KEY)
                .fetch_optional(pool)
                .await
                .context("failed to query site settings")?;

        match value {
            Some(value) => serde_json::from_value(value)
                .map_err(|err| anyhow!("failed to parse site settings: {err}")),
            None => Ok(SiteSettings::default()),
        }
    }

    pub async fn save(&self, pool: &PgPool) -> Result<()> {
        let payload = serde_json::to_value(self)
            .map_err(|err| anyhow!("failed to serialize site settings: {err}"))?;
        sqlx::query(
            "INSERT INTO site_settings (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(SITE_SETTINGS_KEY)
        .bind(payload)
        .execute(pool)
        .await
        .context("failed to store site settings")?;
        Ok(())
    }

    /// Trims every field; the title is required.
    pub fn normalized(self) -> Option<Self> {
        let site_title = self.site_title.trim().to_string();
        if site_title.is_empty() {
            return None;
        }
        Some(Self {
            site_title,
            tagline: self.tagline.trim().to_string(),
            footer_text: self.footer_text.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/portal")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage_root, PathBuf::from("storage"));
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.public_base_url, None);
        assert!(config.uses_default_seed_password());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = config_from(&[("PORT", "9000")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db/portal"),
            ("PORT", "3001"),
            ("MAX_UPLOAD_MB", "5"),
            ("PUBLIC_BASE_URL", "https://portal.example.org/"),
            ("SEED_ADMIN_PASSWORD", "s3cret"),
        ])
        .unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://portal.example.org")
        );
        assert!(!config.uses_default_seed_password());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("DATABASE_URL", "x"), ("PORT", "http")]).is_err());
        assert!(config_from(&[("DATABASE_URL", "x"), ("MAX_UPLOAD_MB", "0")]).is_err());
        assert!(config_from(&[("DATABASE_URL", "x"), ("PUBLIC_BASE_URL", "portal.org")]).is_err());
    }

    #[test]
    fn oversized_upload_limit_is_rejected() {
        let err = config_from(&[
            ("DATABASE_URL", "x"),
            ("MAX_UPLOAD_MB", "18446744073709551615"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn site_settings_require_title() {
        let blank = SiteSettings {
            site_title: "   ".into(),
            ..SiteSettings::default()
        };
        assert!(blank.normalized().is_none());

        let padded = SiteSettings {
            site_title: " Grade Hub ".into(),
            tagline: " hi ".into(),
            footer_text: String::new(),
        };
        let normalized = padded.normalized().unwrap();
        assert_eq!(normalized.site_title, "Grade Hub");
        assert_eq!(normalized.tagline, "hi");
    }
}
