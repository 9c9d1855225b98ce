use std::time::Duration;

use color_eyre::Result;
use dotenv::dotenv;
use eyre::WrapErr;
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::models::settings::OtpSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub platform_name: String,

    // Used when no database is configured.
    pub otp_generation_feature: String,
    pub otp_digit_count: u32,
    pub otp_valid_duration_seconds: u32,
    pub otp_resend_wait_duration_seconds: u32,
    pub otp_test_phone_number: Option<String>,

    pub settings_cache_ttl_seconds: u64,
    pub otp_purge_interval_seconds: u64,

    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::load(config::Environment::default())
    }

    /// Values stay strings until deserialized, so phone numbers keep their `+` and leading zeros.
    pub fn load(environment: config::Environment) -> Result<Self> {
        info!("Initializing configuration");
        let settings = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("platform_name", "Fitconnect")?
            .set_default("otp_generation_feature", "RANDOM")?
            .set_default("otp_digit_count", 6)?
            .set_default("otp_valid_duration_seconds", 300)?
            .set_default("otp_resend_wait_duration_seconds", 60)?
            .set_default("settings_cache_ttl_seconds", 60)?
            .set_default("otp_purge_interval_seconds", 600)?
            .set_default("argon2_memory_kib", 32_768)?
            .set_default("argon2_iterations", 3)?
            .set_default("argon2_parallelism", 1)?
            .add_source(environment)
            .build()
            .wrap_err("Building configuration")?;

        settings
            .try_deserialize()
            .wrap_err("loading configuration from environment")
    }

    /// Settings used when OTP settings are not stored in the database.
    pub fn otp_settings(&self) -> OtpSettings {
        OtpSettings {
            otp_generation_feature: self.otp_generation_feature.clone(),
            otp_digit_count: self.otp_digit_count,
            otp_valid_duration_seconds: self.otp_valid_duration_seconds,
            otp_resend_wait_duration_seconds: self.otp_resend_wait_duration_seconds,
            otp_test_phone_number: self.otp_test_phone_number.clone(),
        }
    }

    pub async fn db_pool(&self, database_url: &str) -> Result<PgPool> {
        info!("Initializing database pool");
        PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .wrap_err("Creating database pool")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::crypto::test_crypto;
    use crate::service::otp_service::OtpService;
    use crate::service::otp_store::InMemoryOtpStore;
    use crate::utils::clock::SystemClock;

    fn load(vars: &[(&str, &str)]) -> Config {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::load(config::Environment::default().source(Some(source))).unwrap()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = load(&[]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, None);
        assert_eq!(config.otp_settings(), OtpSettings::default());
    }

    #[test]
    fn numeric_values_are_parsed_from_strings() {
        let config = load(&[
            ("PORT", "9000"),
            ("OTP_DIGIT_COUNT", "4"),
            ("OTP_VALID_DURATION_SECONDS", "120"),
            ("ARGON2_MEMORY_KIB", "65536"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.otp_digit_count, 4);
        assert_eq!(config.otp_valid_duration_seconds, 120);
        assert_eq!(config.argon2_memory_kib, 65_536);
    }

    #[test]
    fn test_phone_number_keeps_its_prefix() {
        let config = load(&[("OTP_TEST_PHONE_NUMBER", "+94771234567")]);
        assert_eq!(config.otp_test_phone_number.as_deref(), Some("+94771234567"));

        let config = load(&[("OTP_TEST_PHONE_NUMBER", "0094771234567")]);
        assert_eq!(config.otp_test_phone_number.as_deref(), Some("0094771234567"));
    }

    #[test]
    fn configured_test_phone_number_builds_a_service() {
        let config = load(&[("OTP_TEST_PHONE_NUMBER", "+94771234567")]);
        let service = OtpService::new(
            Arc::new(InMemoryOtpStore::new()),
            test_crypto(),
            Arc::new(SystemClock),
            config.otp_settings(),
        );
        assert!(service.is_ok());
    }
}
