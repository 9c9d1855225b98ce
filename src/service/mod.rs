pub mod handler;
pub mod otp_generator;
pub mod otp_service;
pub mod otp_store;
pub mod settings_service;
pub mod sms_service;
