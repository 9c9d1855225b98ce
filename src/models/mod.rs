pub mod otp_codes;
pub mod settings;
