use thiserror::Error;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("OTP not created")]
    NotFound,

    #[error("OTP is expired")]
    Expired,

    #[error("OTP is invalid")]
    Invalid,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("hashing error: {0}")]
    Hashing(String),
}

impl OtpError {
    /// Failures the end user can recover from by requesting or retrying a code.
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, OtpError::NotFound | OtpError::Expired | OtpError::Invalid)
    }
}
