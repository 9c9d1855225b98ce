use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::OtpError;

pub const ALL_ZERO: &str = "ALL_ZERO";
pub const RANDOM: &str = "RANDOM";

/// Snapshot of the OTP-related global settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpSettings {
    pub otp_generation_feature: String,
    pub otp_digit_count: u32,
    pub otp_valid_duration_seconds: u32,
    pub otp_resend_wait_duration_seconds: u32,
    pub otp_test_phone_number: Option<String>,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            otp_generation_feature: RANDOM.to_string(),
            otp_digit_count: 6,
            otp_valid_duration_seconds: 300,
            otp_resend_wait_duration_seconds: 60,
            otp_test_phone_number: None,
        }
    }
}

impl OtpSettings {
    pub fn validate(&self) -> Result<(), OtpError> {
        if self.otp_digit_count == 0 {
            return Err(OtpError::Configuration(
                "OTP digit count must be positive".to_string(),
            ));
        }
        if self.otp_valid_duration_seconds == 0 {
            return Err(OtpError::Configuration(
                "OTP valid duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// The active row of the `global_settings` table.
#[derive(Debug, Clone, FromRow)]
pub struct GlobalSettings {
    pub id: Uuid,
    pub name: String,
    pub otp_generation_feature: String,
    pub otp_valid_duration_seconds: i32,
    pub otp_resend_wait_duration_seconds: i32,
    pub otp_digit_count: i32,
    pub otp_test_phone_number: Option<String>,
}

impl TryFrom<GlobalSettings> for OtpSettings {
    type Error = OtpError;

    fn try_from(row: GlobalSettings) -> Result<Self, Self::Error> {
        let positive = |value: i32, field: &str| {
            u32::try_from(value).map_err(|_| {
                OtpError::Configuration(format!("{field} must not be negative, got {value}"))
            })
        };

        let settings = OtpSettings {
            otp_generation_feature: row.otp_generation_feature,
            otp_digit_count: positive(row.otp_digit_count, "otp_digit_count")?,
            otp_valid_duration_seconds: positive(
                row.otp_valid_duration_seconds,
                "otp_valid_duration_seconds",
            )?,
            otp_resend_wait_duration_seconds: positive(
                row.otp_resend_wait_duration_seconds,
                "otp_resend_wait_duration_seconds",
            )?,
            otp_test_phone_number: row.otp_test_phone_number,
        };
        settings.validate()?;
        Ok(settings)
    }
}
