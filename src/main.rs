use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, middleware::Logger, web};
use color_eyre::Result;
use eyre::WrapErr;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mobile_otp::config::config::Config;
use mobile_otp::config::crypto::CryptoService;
use mobile_otp::config::routes::routes;
use mobile_otp::error::OtpError;
use mobile_otp::service::handler::{AppState, app_config};
use mobile_otp::service::otp_store::{InMemoryOtpStore, OtpStore, PgOtpStore};
use mobile_otp::service::settings_service::{
    PgSettingsSource, SettingsService, SettingsSource, StaticSettingsSource,
};
use mobile_otp::service::sms_service::LogSmsSender;
use mobile_otp::utils::clock::{Clock, SystemClock};

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let config = Config::from_env()?;

    let (otp_store, settings_source): (Arc<dyn OtpStore>, Arc<dyn SettingsSource>) =
        match &config.database_url {
            Some(database_url) => {
                let pool = config.db_pool(database_url).await?;
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .wrap_err("Running database migrations")?;
                (
                    Arc::new(PgOtpStore::new(pool.clone())),
                    Arc::new(PgSettingsSource::new(pool)),
                )
            }
            None => {
                warn!("DATABASE_URL is not set, OTPs are kept in memory");
                (
                    Arc::new(InMemoryOtpStore::new()),
                    Arc::new(StaticSettingsSource::new(config.otp_settings())),
                )
            }
        };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let crypto = CryptoService::new(
        config.argon2_memory_kib,
        config.argon2_iterations,
        config.argon2_parallelism,
    )?;
    let settings = SettingsService::new(
        settings_source,
        clock.clone(),
        Duration::from_secs(config.settings_cache_ttl_seconds),
    );

    // Fail at startup rather than on the first request.
    let state = web::Data::new(AppState {
        otp_store,
        crypto,
        clock,
        settings,
        sms: Arc::new(LogSmsSender),
        platform_name: config.platform_name.clone(),
    });
    state
        .otp_service()
        .await
        .wrap_err("Validating OTP settings")?;

    if config.otp_purge_interval_seconds > 0 {
        spawn_expired_otp_sweeper(
            state.clone(),
            Duration::from_secs(config.otp_purge_interval_seconds),
        );
    }

    info!(host = %config.host, port = config.port, "Starting server");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(app_config(state.clone()))
            .configure(routes)
    })
    .bind(format!("{}:{}", config.host, config.port))?
    .run()
    .await?;

    Ok(())
}

fn spawn_expired_otp_sweeper(state: web::Data<AppState>, period: Duration) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let purged = match state.otp_service().await {
                Ok(service) => service.purge_expired().await,
                Err(err) => Err(err),
            };
            match purged {
                Ok(0) => {}
                Ok(count) => info!(count, "purged expired OTPs"),
                Err(err @ OtpError::Configuration(_)) => error!(error = %err, "OTP sweeper"),
                Err(err) => warn!(error = %err, "OTP sweeper"),
            }
        }
    });
}
