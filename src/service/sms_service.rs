use async_trait::async_trait;
use color_eyre::Result;
use tracing::debug;

/// Out-of-band delivery of OTP codes. Real providers live outside this service.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_sms(&self, phone_number: &str, message: &str) -> Result<()>;
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_sms(&self, phone_number: &str, message: &str) -> Result<()> {
        debug!(phone_number, message, "SMS (not sent)");
        Ok(())
    }
}

pub fn login_otp_message(platform_name: &str, code: &str) -> String {
    format!("Your Login OTP for {platform_name} is {code}")
}

pub fn phone_number_change_otp_message(platform_name: &str, code: &str) -> String {
    format!("Your OTP for {platform_name} is {code}")
}
