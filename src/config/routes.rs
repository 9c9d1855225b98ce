use crate::controllers::auth_controller::AuthController;
use actix_web::web;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(AuthController::health))
        .route(
            "/api/auth/send-otp",
            web::post().to(AuthController::send_login_otp),
        )
        .route(
            "/api/auth/verify-otp",
            web::post().to(AuthController::verify_login_otp),
        )
        .route(
            "/api/users/{user_id}/phone-number/send-otp",
            web::post().to(AuthController::send_phone_number_change_otp),
        )
        .route(
            "/api/users/{user_id}/phone-number/verify-otp",
            web::post().to(AuthController::verify_phone_number_change_otp),
        );
}
