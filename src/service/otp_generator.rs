use std::sync::Arc;

use rand::rngs::OsRng;
use rand::Rng;

use crate::error::OtpError;
use crate::models::settings::{ALL_ZERO, RANDOM};

pub trait OtpGenerator: Send + Sync {
    /// Returns exactly `digit_count` decimal digits.
    fn generate(&self, digit_count: u32) -> String;
}

/// Predictable codes for test accounts and local development.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllZeroOtpGenerator;

impl OtpGenerator for AllZeroOtpGenerator {
    fn generate(&self, digit_count: u32) -> String {
        "0".repeat(digit_count as usize)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomOtpGenerator;

impl OtpGenerator for RandomOtpGenerator {
    fn generate(&self, digit_count: u32) -> String {
        // Independent uniform digits give a uniform value in [0, 10^n) with leading zeros kept.
        (0..digit_count)
            .map(|_| char::from(b'0' + OsRng.gen_range(0..10u8)))
            .collect()
    }
}

pub fn otp_generator(feature: &str) -> Result<Arc<dyn OtpGenerator>, OtpError> {
    match feature {
        ALL_ZERO => Ok(Arc::new(AllZeroOtpGenerator)),
        RANDOM => Ok(Arc::new(RandomOtpGenerator)),
        other => Err(OtpError::Configuration(format!(
            "Unknown OTP generation feature value {other}"
        ))),
    }
}
