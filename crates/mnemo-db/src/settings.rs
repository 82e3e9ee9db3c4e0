//! Per-user AI provider preferences.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::warn;
use uuid::Uuid;

use mnemo_core::{Error, ProviderConfig, ProviderSettings, ProviderType, Result};

/// Reads and writes `user_ai_provider`.
#[derive(Clone)]
pub struct PgProviderSettings {
    pool: Pool<Postgres>,
}

impl PgProviderSettings {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Store a user's default provider, replacing any previous one.
    pub async fn set_default_provider(&self, user_id: Uuid, config: &ProviderConfig) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_ai_provider (user_id, provider_type, base_url, api_key, model)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id) DO UPDATE SET
                 provider_type = EXCLUDED.provider_type,
                 base_url = EXCLUDED.base_url,
                 api_key = EXCLUDED.api_key,
                 model = EXCLUDED.model,
                 updated_at = NOW()",
        )
        .bind(user_id)
        .bind(config.provider_type.to_string())
        .bind(&config.base_url)
        .bind(&config.api_key)
        .bind(&config.model)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl ProviderSettings for PgProviderSettings {
    async fn default_provider(&self, user_id: Uuid) -> Result<Option<ProviderConfig>> {
        let row = sqlx::query(
            "SELECT provider_type, base_url, api_key, model
             FROM user_ai_provider WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw_type: String = row.get("provider_type");
        let provider_type = match raw_type.parse::<ProviderType>() {
            Ok(t) => t,
            Err(e) => {
                warn!(
                    subsystem = "database",
                    component = "provider_settings",
                    %user_id,
                    error = %e,
                    "Ignoring unusable provider preference"
                );
                return Ok(None);
            }
        };

        let base_url: Option<String> = row.get("base_url");
        Ok(Some(ProviderConfig {
            provider_type,
            base_url: base_url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| provider_type.default_base_url().to_string()),
            api_key: row.get("api_key"),
            model: row.get("model"),
        }))
    }
}
