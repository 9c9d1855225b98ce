use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// One pending OTP challenge. Its existence is the pending state.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MobileOtp {
    pub id: Uuid,
    pub phone_number: String,
    pub user_id: Option<Uuid>,
    pub otp_hash: String,
    pub expiration_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl MobileOtp {
    pub fn key(&self) -> OtpKey {
        OtpKey {
            phone_number: self.phone_number.clone(),
            user_id: self.user_id,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_at < now
    }
}

/// Identifies the slot an OTP occupies: a bare phone number for the login flow,
/// or an account and phone number pair for a phone number change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OtpKey {
    pub phone_number: String,
    pub user_id: Option<Uuid>,
}

impl OtpKey {
    pub fn new(phone_number: impl Into<String>, user_id: Option<Uuid>) -> Self {
        Self {
            phone_number: phone_number.into(),
            user_id,
        }
    }
}

/// What the caller gets back from issuing: the only copy of the plaintext code.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub code: String,
    pub expiration_at: DateTime<Utc>,
}
