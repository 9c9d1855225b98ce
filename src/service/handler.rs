use std::sync::Arc;

use actix_web::web;

use crate::config::crypto::CryptoService;
use crate::error::OtpError;
use crate::service::otp_service::OtpService;
use crate::service::otp_store::OtpStore;
use crate::service::settings_service::SettingsService;
use crate::service::sms_service::SmsSender;
use crate::utils::clock::Clock;

/// Shared dependencies handed to every request.
pub struct AppState {
    pub otp_store: Arc<dyn OtpStore>,
    pub crypto: CryptoService,
    pub clock: Arc<dyn Clock>,
    pub settings: SettingsService,
    pub sms: Arc<dyn SmsSender>,
    pub platform_name: String,
}

impl AppState {
    /// Builds an [`OtpService`] bound to the current settings snapshot.
    pub async fn otp_service(&self) -> Result<OtpService, OtpError> {
        let settings = self.settings.current().await?;
        let service = OtpService::new(
            self.otp_store.clone(),
            self.crypto.clone(),
            self.clock.clone(),
            settings,
        );

        // Don't keep serving a broken snapshot until the cache times out.
        if let Err(OtpError::Configuration(_)) = &service {
            self.settings.invalidate().await;
        }
        service
    }
}

pub fn app_config(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(state).app_data(
            web::JsonConfig::default()
                .limit(4096)
                .content_type_required(false),
        );
    }
}
