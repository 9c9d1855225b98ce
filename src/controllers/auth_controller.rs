use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::OtpError;
use crate::service::handler::AppState;
use crate::service::sms_service::{login_otp_message, phone_number_change_otp_message};
use crate::utils::phone::PhoneNumber;

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(length(min = 1, max = 32))]
    pub phone_number: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 1, max = 32))]
    pub phone_number: String,
    #[validate(length(min = 1, max = 16))]
    pub code: String,
}

impl VerifyOtpRequest {
    /// Surrounding whitespace is not part of the code, so `"   "` counts as empty.
    fn trimmed(&self) -> Self {
        Self {
            phone_number: self.phone_number.clone(),
            code: self.code.trim().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendOtpResponse {
    pub expiration_at: DateTime<Utc>,
    pub retry_after: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyOtpResponse {
    pub verified: bool,
    pub phone_number: String,
}

#[derive(Debug, Clone, Copy)]
enum OtpFlow {
    Login,
    PhoneNumberChange,
}

impl OtpFlow {
    fn message(self, platform_name: &str, code: &str) -> String {
        match self {
            OtpFlow::Login => login_otp_message(platform_name, code),
            OtpFlow::PhoneNumberChange => phone_number_change_otp_message(platform_name, code),
        }
    }

    // One message for every failure so callers cannot tell which one happened.
    fn failure(self) -> &'static str {
        match self {
            OtpFlow::Login => "Unable to log in with provided OTP",
            OtpFlow::PhoneNumberChange => "Unable to verify provided OTP",
        }
    }
}

pub struct AuthController;

impl AuthController {
    pub async fn health() -> impl Responder {
        HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
    }

    /// Send the login OTP. Works whether or not an account exists for the number.
    pub async fn send_login_otp(
        state: web::Data<AppState>,
        request: web::Json<SendOtpRequest>,
    ) -> impl Responder {
        send_otp(&state, &request, None, OtpFlow::Login).await
    }

    pub async fn verify_login_otp(
        state: web::Data<AppState>,
        request: web::Json<VerifyOtpRequest>,
    ) -> impl Responder {
        verify_otp(&state, &request, None, OtpFlow::Login).await
    }

    /// Send the OTP confirming that `user_id` controls a new phone number.
    pub async fn send_phone_number_change_otp(
        state: web::Data<AppState>,
        user_id: web::Path<Uuid>,
        request: web::Json<SendOtpRequest>,
    ) -> impl Responder {
        let user_id = user_id.into_inner();
        send_otp(&state, &request, Some(user_id), OtpFlow::PhoneNumberChange).await
    }

    pub async fn verify_phone_number_change_otp(
        state: web::Data<AppState>,
        user_id: web::Path<Uuid>,
        request: web::Json<VerifyOtpRequest>,
    ) -> impl Responder {
        let user_id = user_id.into_inner();
        verify_otp(&state, &request, Some(user_id), OtpFlow::PhoneNumberChange).await
    }
}

fn parse_phone_number(raw: &str) -> Result<PhoneNumber, HttpResponse> {
    PhoneNumber::parse(raw).map_err(|message| {
        HttpResponse::BadRequest().json(serde_json::json!({ "phone_number": [message] }))
    })
}

fn internal_error(err: OtpError) -> HttpResponse {
    error!(error = %err, "OTP request failed");
    HttpResponse::InternalServerError().json(serde_json::json!({
        "detail": "Something went wrong, please try again later"
    }))
}

async fn send_otp(
    state: &AppState,
    request: &SendOtpRequest,
    user_id: Option<Uuid>,
    flow: OtpFlow,
) -> HttpResponse {
    if let Err(errors) = request.validate() {
        return HttpResponse::BadRequest().json(errors);
    }
    let phone_number = match parse_phone_number(&request.phone_number) {
        Ok(phone_number) => phone_number,
        Err(response) => return response,
    };

    let service = match state.otp_service().await {
        Ok(service) => service,
        Err(err) => return internal_error(err),
    };
    let issued = match service.issue(phone_number.as_str(), user_id).await {
        Ok(issued) => issued,
        Err(err) => return internal_error(err),
    };

    let sms = state.sms.clone();
    let message = flow.message(&state.platform_name, &issued.code);
    let recipient = phone_number.to_string();
    actix_web::rt::spawn(async move {
        match sms.send_sms(&recipient, &message).await {
            Ok(()) => info!(phone_number = %recipient, ?flow, "OTP sent"),
            Err(err) => error!(phone_number = %recipient, error = %err, "failed to send OTP"),
        }
    });

    let retry_after = state.clock.now()
        + Duration::seconds(i64::from(
            service.settings().otp_resend_wait_duration_seconds,
        ));

    HttpResponse::Ok().json(SendOtpResponse {
        expiration_at: issued.expiration_at,
        retry_after,
    })
}

async fn verify_otp(
    state: &AppState,
    request: &VerifyOtpRequest,
    user_id: Option<Uuid>,
    flow: OtpFlow,
) -> HttpResponse {
    let request = request.trimmed();
    if let Err(errors) = request.validate() {
        return HttpResponse::BadRequest().json(errors);
    }
    let phone_number = match parse_phone_number(&request.phone_number) {
        Ok(phone_number) => phone_number,
        Err(response) => return response,
    };

    let service = match state.otp_service().await {
        Ok(service) => service,
        Err(err) => return internal_error(err),
    };

    match service
        .verify(phone_number.as_str(), &request.code, user_id)
        .await
    {
        Ok(()) => {
            info!(%phone_number, ?flow, "verified OTP");
            HttpResponse::Ok().json(VerifyOtpResponse {
                verified: true,
                phone_number: phone_number.to_string(),
            })
        }
        Err(err) if err.is_verification_failure() => {
            warn!(%phone_number, reason = %err, "OTP verification failed");
            HttpResponse::BadRequest().json(serde_json::json!({ "detail": flow.failure() }))
        }
        Err(err) => internal_error(err),
    }
}
