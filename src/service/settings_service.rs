use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::OtpError;
use crate::models::settings::{GlobalSettings, OtpSettings};
use crate::utils::cache::TtlCache;
use crate::utils::clock::Clock;

const CURRENT_GLOBAL_SETTINGS: &str = "current_global_settings";

#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn load(&self) -> Result<OtpSettings, OtpError>;
}

/// Reads the active `global_settings` row, creating it with defaults on first use.
pub struct PgSettingsSource {
    pool: PgPool,
}

impl PgSettingsSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsSource for PgSettingsSource {
    async fn load(&self) -> Result<OtpSettings, OtpError> {
        let existing = sqlx::query_as::<_, GlobalSettings>(
            r#"
                SELECT
                    id,
                    name,
                    otp_generation_feature,
                    otp_valid_duration_seconds,
                    otp_resend_wait_duration_seconds,
                    otp_digit_count,
                    otp_test_phone_number
                FROM global_settings
                WHERE is_active
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let row = match existing {
            Some(row) => row,
            None => {
                info!("creating default global settings");
                // A concurrent creator wins the partial unique index; the update returns its row.
                sqlx::query_as::<_, GlobalSettings>(
                    r#"
                        INSERT INTO global_settings (id, name, is_active)
                        VALUES ($1, 'Default', TRUE)
                        ON CONFLICT (is_active) WHERE is_active
                        DO UPDATE SET is_active = EXCLUDED.is_active
                        RETURNING
                            id,
                            name,
                            otp_generation_feature,
                            otp_valid_duration_seconds,
                            otp_resend_wait_duration_seconds,
                            otp_digit_count,
                            otp_test_phone_number
                    "#,
                )
                .bind(Uuid::new_v4())
                .fetch_one(&self.pool)
                .await?
            }
        };

        debug!(settings_id = %row.id, name = %row.name, "loaded global settings");
        OtpSettings::try_from(row)
    }
}

/// Fixed settings, used when there is no database.
pub struct StaticSettingsSource {
    settings: OtpSettings,
}

impl StaticSettingsSource {
    pub fn new(settings: OtpSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SettingsSource for StaticSettingsSource {
    async fn load(&self) -> Result<OtpSettings, OtpError> {
        self.settings.validate()?;
        Ok(self.settings.clone())
    }
}

/// Serves the current settings from a TTL cache in front of a [`SettingsSource`].
pub struct SettingsService {
    source: Arc<dyn SettingsSource>,
    cache: TtlCache<OtpSettings>,
    ttl: Duration,
}

impl SettingsService {
    pub fn new(source: Arc<dyn SettingsSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            cache: TtlCache::new(clock),
            ttl,
        }
    }

    pub async fn current(&self) -> Result<OtpSettings, OtpError> {
        if let Some(settings) = self.cache.get(CURRENT_GLOBAL_SETTINGS).await {
            return Ok(settings);
        }

        let settings = self.source.load().await?;
        self.cache
            .insert(CURRENT_GLOBAL_SETTINGS, settings.clone(), self.ttl)
            .await;
        Ok(settings)
    }

    /// Drops the cached snapshot so the next read goes to the source.
    pub async fn invalidate(&self) {
        if self.cache.invalidate(CURRENT_GLOBAL_SETTINGS).await {
            info!("global settings cache cleared");
        }
    }
}
