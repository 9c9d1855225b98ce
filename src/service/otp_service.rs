use std::sync::Arc;

use chrono::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::crypto::CryptoService;
use crate::error::OtpError;
use crate::models::otp_codes::{IssuedOtp, OtpKey};
use crate::models::settings::OtpSettings;
use crate::service::otp_generator::{otp_generator, AllZeroOtpGenerator, OtpGenerator};
use crate::service::otp_store::OtpStore;
use crate::utils::clock::Clock;
use crate::utils::phone::PhoneNumber;

/// Issues and verifies mobile OTPs against one settings snapshot.
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    crypto: CryptoService,
    clock: Arc<dyn Clock>,
    settings: OtpSettings,
    generator: Arc<dyn OtpGenerator>,
    test_phone_number: Option<PhoneNumber>,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        crypto: CryptoService,
        clock: Arc<dyn Clock>,
        settings: OtpSettings,
    ) -> Result<Self, OtpError> {
        settings.validate()?;
        let generator = otp_generator(&settings.otp_generation_feature)?;
        let test_phone_number = settings
            .otp_test_phone_number
            .as_deref()
            .map(PhoneNumber::parse)
            .transpose()
            .map_err(|e| OtpError::Configuration(format!("OTP test phone number: {e}")))?;

        Ok(Self {
            store,
            crypto,
            clock,
            settings,
            generator,
            test_phone_number,
        })
    }

    pub fn settings(&self) -> &OtpSettings {
        &self.settings
    }

    fn is_test_phone_number(&self, phone_number: &str) -> bool {
        self.test_phone_number
            .as_ref()
            .is_some_and(|test| test.as_str() == phone_number)
    }

    /// Creates a new code for `(user_id, phone_number)`, replacing any earlier one.
    #[instrument(skip(self))]
    pub async fn issue(
        &self,
        phone_number: &str,
        user_id: Option<Uuid>,
    ) -> Result<IssuedOtp, OtpError> {
        let digit_count = self.settings.otp_digit_count;
        let code = if self.is_test_phone_number(phone_number) {
            AllZeroOtpGenerator.generate(digit_count)
        } else {
            self.generator.generate(digit_count)
        };

        let otp_hash = self.crypto.spawn_hash(code.clone()).await?;
        let now = self.clock.now();
        let expiration_at =
            now + Duration::seconds(i64::from(self.settings.otp_valid_duration_seconds));

        let key = OtpKey::new(phone_number, user_id);
        self.store
            .upsert(&key, &otp_hash, expiration_at, now)
            .await?;

        info!(%expiration_at, "issued OTP");
        Ok(IssuedOtp {
            code,
            expiration_at,
        })
    }

    /// Checks `code` against the pending challenge and consumes it on success or expiry.
    #[instrument(skip(self, code))]
    pub async fn verify(
        &self,
        phone_number: &str,
        code: &str,
        user_id: Option<Uuid>,
    ) -> Result<(), OtpError> {
        let key = OtpKey::new(phone_number, user_id);
        let Some(record) = self.store.find(&key).await? else {
            return Err(OtpError::NotFound);
        };

        if record.is_expired(self.clock.now()) {
            self.store.delete(&record).await?;
            return Err(OtpError::Expired);
        }

        let matches = self
            .crypto
            .spawn_verify(code.to_string(), record.otp_hash.clone())
            .await?;
        if !matches {
            return Err(OtpError::Invalid);
        }

        if !self.store.delete(&record).await? {
            warn!("OTP consumed or replaced concurrently");
            return Err(OtpError::NotFound);
        }

        Ok(())
    }

    /// Removes every record whose validity window has passed.
    pub async fn purge_expired(&self) -> Result<u64, OtpError> {
        self.store.delete_expired(self.clock.now()).await
    }
}
