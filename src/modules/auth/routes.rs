use super::middleware::Auth;
use super::repository::Purpose;
use super::service;
use crate::modules::account;
use crate::types::{AppEnvironment, Context};
use crate::utils;
use crate::utils::identifier::Identifier;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::borrow::Cow;
use std::sync::Arc;
use validator::{Validate, ValidationError};

fn error_body(ctx: &Context, message: &str, detail: Option<String>) -> serde_json::Value {
    let mut body = json!({ "success": false, "message": message });
    if ctx.app.environment == AppEnvironment::Development {
        if let Some(detail) = detail {
            body["detail"] = json!(detail);
        }
    }
    body
}

fn registration_conflict(email_taken: bool, phone_taken: bool) -> Option<&'static str> {
    match (email_taken, phone_taken) {
        (true, true) => Some("Email and phone number already in use"),
        (true, false) => Some("Email already in use"),
        (false, true) => Some("Phone number already in use"),
        (false, false) => None,
    }
}

fn validate_phone_number(phone_number: &str) -> Result<(), ValidationError> {
    let regex = Regex::new(r"^\+?[0-9\s()\-]{7,20}$").expect("Invalid phone number regex");
    match regex.is_match(phone_number) {
        true => Ok(()),
        false => Err(ValidationError::new("INVALID_PHONE_NUMBER")
            .with_message(Cow::from("Phone number must be 7 to 20 digits"))),
    }
}

#[derive(Deserialize, Validate)]
struct RegisterPayload {
    #[validate(email(code = "INVALID_EMAIL", message = "Invalid email address"))]
    email: String,
    #[validate(custom(code = "INVALID_PHONE_NUMBER", function = "validate_phone_number"))]
    phone_number: String,
    #[validate(length(min = 1, code = "INVALID_FULL_NAME", message = "Full name is required"))]
    full_name: String,
    referral_code: Option<String>,
}

async fn register(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<RegisterPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return utils::validation::into_response(errors);
    }

    let email = payload.email.trim().to_lowercase();
    let phone = match Identifier::parse(&payload.phone_number) {
        Ok(Identifier::Phone(phone)) => phone,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(error_body(&ctx, "Invalid phone number", None)),
            )
        }
    };

    let existing = tokio::try_join!(
        account::repository::find_by_email(&ctx.db_conn.pool, email.clone()),
        account::repository::find_by_phone_number(&ctx.db_conn.pool, phone.clone()),
    );

    let (by_email, by_phone) = match existing {
        Ok(found) => found,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_body(&ctx, "Sorry, an error occurred", None)),
            )
        }
    };

    if let Some(message) = registration_conflict(by_email.is_some(), by_phone.is_some()) {
        return (StatusCode::CONFLICT, Json(error_body(&ctx, message, None)));
    }

    let referred_by = match payload.referral_code {
        Some(code) => {
            match account::repository::find_by_referral_code(&ctx.db_conn.pool, code).await {
                Ok(referrer) => referrer.map(|account| account.id),
                Err(_) => None,
            }
        }
        None => None,
    };

    let created = account::repository::create(
        &ctx.db_conn.pool,
        account::repository::CreateAccountPayload {
            email: email.clone(),
            phone_number: phone.clone(),
            full_name: payload.full_name.trim().to_string(),
            referred_by,
        },
    )
    .await;

    if created.is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_body(&ctx, "Sign up failed", None)),
        );
    }

    match service::otp::issue(ctx.clone(), &Identifier::Phone(phone.clone()), Purpose::Register)
        .await
    {
        Ok(_) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "email": email,
                "phone_number": phone,
                "otp_sent": true,
            })),
        ),
        Err(service::otp::IssueError::DeliveryFailed(cause)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(error_body(
                &ctx,
                "Verification code could not be delivered",
                Some(cause),
            )),
        ),
        Err(service::otp::IssueError::UnexpectedError) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_body(&ctx, "Failed to send OTP", None)),
        ),
    }
}

#[derive(Deserialize, Validate)]
struct LoginPayload {
    #[validate(length(min = 1, code = "INVALID_IDENTIFIER", message = "Email or phone required"))]
    email_or_phone: String,
}

async fn login(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<LoginPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return utils::validation::into_response(errors);
    }

    let identifier = match Identifier::parse(&payload.email_or_phone) {
        Ok(identifier) => identifier,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(error_body(&ctx, "Invalid email or phone number", None)),
            )
        }
    };

    match service::resolver::resolve(&ctx.db_conn.pool, &identifier).await {
        Ok(_) => (),
        Err(service::resolver::Error::NotFound) => {
            return (
                StatusCode::NOT_FOUND,
                Json(error_body(&ctx, "Account not found", None)),
            )
        }
        Err(service::resolver::Error::Deactivated) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(error_body(&ctx, "Account deactivated", None)),
            )
        }
        Err(service::resolver::Error::UnexpectedError) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_body(&ctx, "Sorry, an error occurred", None)),
            )
        }
    }

    match service::otp::issue(ctx.clone(), &identifier, Purpose::Login).await {
        Ok(_) => {
            let mut body = json!({ "success": true, "otp_sent": true });
            match &identifier {
                Identifier::Email(email) => body["email"] = json!(email),
                Identifier::Phone(phone) => body["phone_number"] = json!(phone),
            }
            (StatusCode::OK, Json(body))
        }
        Err(service::otp::IssueError::DeliveryFailed(cause)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(error_body(
                &ctx,
                "Verification code could not be delivered",
                Some(cause),
            )),
        ),
        Err(service::otp::IssueError::UnexpectedError) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_body(&ctx, "Failed to send OTP", None)),
        ),
    }
}

#[derive(Deserialize)]
struct VerifyOtpPayload {
    email_or_phone: String,
    otp: String,
}

async fn verify_otp(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<VerifyOtpPayload>,
) -> impl IntoResponse {
    let identifier = match Identifier::parse(&payload.email_or_phone) {
        Ok(identifier) => identifier,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(error_body(&ctx, "Invalid email or phone number", None)),
            )
        }
    };

    match service::otp::verify(ctx.clone(), &identifier, payload.otp.trim()).await {
        Ok((account, pair)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "access_token": pair.access_token,
                "refresh_token": pair.refresh_token,
                "account": account::repository::summary(&account),
            })),
        ),
        // Wrong and expired codes read the same on purpose: responses must
        // not reveal which identifiers exist or how close a guess was.
        Err(service::otp::VerifyError::NotFound) | Err(service::otp::VerifyError::Expired) => (
            StatusCode::BAD_REQUEST,
            Json(error_body(&ctx, "Invalid or expired OTP", None)),
        ),
        Err(service::otp::VerifyError::Deactivated) => (
            StatusCode::UNAUTHORIZED,
            Json(error_body(&ctx, "Account deactivated", None)),
        ),
        Err(service::otp::VerifyError::UnexpectedError) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_body(&ctx, "Sorry, an error occurred", None)),
        ),
    }
}

#[derive(Deserialize)]
struct ResendOtpPayload {
    email_or_phone: String,
    purpose: Option<Purpose>,
}

async fn resend_otp(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<ResendOtpPayload>,
) -> impl IntoResponse {
    let identifier = match Identifier::parse(&payload.email_or_phone) {
        Ok(identifier) => identifier,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(error_body(&ctx, "Invalid email or phone number", None)),
            )
        }
    };

    match service::resolver::resolve(&ctx.db_conn.pool, &identifier).await {
        Ok(_) => (),
        Err(service::resolver::Error::NotFound) => {
            return (
                StatusCode::NOT_FOUND,
                Json(error_body(&ctx, "Account not found", None)),
            )
        }
        Err(service::resolver::Error::Deactivated) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(error_body(&ctx, "Account deactivated", None)),
            )
        }
        Err(service::resolver::Error::UnexpectedError) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_body(&ctx, "Sorry, an error occurred", None)),
            )
        }
    }

    match service::otp::issue(
        ctx.clone(),
        &identifier,
        payload.purpose.unwrap_or(Purpose::Login),
    )
    .await
    {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "success": true, "otp_sent": true })),
        ),
        Err(service::otp::IssueError::DeliveryFailed(cause)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(error_body(
                &ctx,
                "Verification code could not be delivered",
                Some(cause),
            )),
        ),
        Err(service::otp::IssueError::UnexpectedError) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_body(&ctx, "Failed to send OTP", None)),
        ),
    }
}

#[derive(Deserialize)]
struct RefreshPayload {
    refresh_token: String,
}

async fn refresh(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<RefreshPayload>,
) -> impl IntoResponse {
    let account_id = match service::token::verify_refresh_token(&ctx.token, &payload.refresh_token)
    {
        Ok(account_id) => account_id,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(error_body(&ctx, "Invalid refresh token", None)),
            )
        }
    };

    let account = match account::repository::find_by_id(&ctx.db_conn.pool, account_id).await {
        Ok(Some(account)) if account.is_active => account,
        Ok(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(error_body(&ctx, "Invalid refresh token", None)),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_body(&ctx, "Sorry, an error occurred", None)),
            )
        }
    };

    match service::token::issue_access_token(&ctx.token, &account.id) {
        Ok(access_token) => (
            StatusCode::OK,
            Json(json!({ "success": true, "access_token": access_token })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_body(&ctx, "Failed to refresh token", None)),
        ),
    }
}

/// Tokens are stateless, so there is nothing to revoke server-side. The
/// endpoint exists so clients have a uniform place to end a session; the
/// tokens themselves are discarded client-side.
async fn logout(_auth: Auth) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Logged out" })),
    )
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_the_clashing_fields() {
        assert_eq!(
            registration_conflict(true, false),
            Some("Email already in use")
        );
        assert_eq!(
            registration_conflict(false, true),
            Some("Phone number already in use")
        );
        assert_eq!(
            registration_conflict(true, true),
            Some("Email and phone number already in use")
        );
        assert_eq!(registration_conflict(false, false), None);
    }

    #[test]
    fn phone_validation_accepts_common_formats() {
        assert!(validate_phone_number("9876543210").is_ok());
        assert!(validate_phone_number("+91 99939-11855").is_ok());
        assert!(validate_phone_number("(800) 123-4567").is_ok());
    }

    #[test]
    fn phone_validation_rejects_garbage() {
        assert!(validate_phone_number("123").is_err());
        assert!(validate_phone_number("not-a-number").is_err());
        assert!(validate_phone_number("a@b.com").is_err());
    }
}
