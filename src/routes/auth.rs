use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::{info, warn};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Collection;
use serde::Serialize;

use crate::db::mongo;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{expired_session_cookie, generate_token, session_cookie};
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::user::{
    AccountStatus, ChangePasswordInput, EmailInput, LoginInput, Preferences, PreferencesInput,
    ResetPasswordInput, SignupInput, User, UserProfile, UserRole, VerifyEmailInput,
};
use crate::services::account_service::{
    check_otp, generate_otp, hash_password, normalize_email, otp_attempt_filter,
    otp_attempt_update, otp_clear_fields, otp_issue_update, validate_password, validate_signup,
    verify_password, OtpPurpose,
};
use crate::services::email_service::otp_email;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn session_response(state: &AppState, user: User) -> AppResult<HttpResponse> {
    let user_id = user
        .id
        .ok_or_else(|| AppError::Internal("User without an id".to_string()))?;
    let token = generate_token(&state.config, &user.email, user_id, user.role)?;

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&state.config, token.clone()))
        .json(SessionResponse {
            user: UserProfile::from(user),
            token,
        }))
}

pub async fn signup(
    state: web::Data<AppState>,
    input: web::Json<SignupInput>,
) -> AppResult<HttpResponse> {
    let input = input.into_inner();
    let email = normalize_email(&input.email);
    validate_signup(&input.name, &email, &input.password)?;

    let role = input.role.unwrap_or_default();
    if role == UserRole::Admin {
        return Err(AppError::forbidden("Admin accounts cannot be self-registered"));
    }

    let now = Utc::now();
    let mut user = User {
        id: None,
        name: input.name.trim().to_string(),
        email,
        password: hash_password(&input.password)?,
        phone: None,
        address: None,
        role,
        status: AccountStatus::Active,
        preferences: Preferences::default(),
        last_login: Some(now),
        is_account_verified: false,
        verify_otp: None,
        verify_otp_expire_at: None,
        reset_otp: None,
        reset_otp_expire_at: None,
        created_at: Some(now),
        updated_at: Some(now),
    };

    let result = mongo::users(&state.db)
        .insert_one(&user)
        .await
        .map_err(|e| AppError::from_insert(e, "User already exists"))?;
    user.id = result.inserted_id.as_object_id();

    info!("New {} account for {}", user.role.as_str(), user.email);
    session_response(&state, user)
}

pub async fn login(
    state: web::Data<AppState>,
    input: web::Json<LoginInput>,
) -> AppResult<HttpResponse> {
    let email = normalize_email(&input.email);
    let users = mongo::users(&state.db);

    let Some(mut user) = users.find_one(doc! { "email": email.as_str() }).await? else {
        return Err(AppError::bad_request("Invalid credentials"));
    };
    if !verify_password(&input.password, &user.password) {
        return Err(AppError::bad_request("Invalid credentials"));
    }
    if user.status == AccountStatus::Inactive {
        return Err(AppError::forbidden("Account is inactive"));
    }

    let now = Utc::now();
    users
        .update_one(
            doc! { "email": email.as_str() },
            doc! { "$set": { "lastLogin": mongo::stored_time(now) } },
        )
        .await?;
    user.last_login = Some(now);

    session_response(&state, user)
}

pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(expired_session_cookie(&state.config))
        .json(MessageResponse::new("Logged out"))
}

async fn find_user(state: &AppState, user_id: ObjectId) -> AppResult<User> {
    mongo::users(&state.db)
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn user_session(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
) -> AppResult<HttpResponse> {
    let user = find_user(&state, caller.user_id).await?;
    Ok(HttpResponse::Ok().json(UserProfile::from(user)))
}

pub async fn save_preferences(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    input: web::Json<PreferencesInput>,
) -> AppResult<HttpResponse> {
    let interests: Vec<String> = input
        .into_inner()
        .interests
        .into_iter()
        .map(|interest| interest.trim().to_string())
        .filter(|interest| !interest.is_empty())
        .collect();

    let result = mongo::users(&state.db)
        .update_one(
            doc! { "_id": caller.user_id },
            doc! { "$set": {
                "preferences.interests": interests.clone(),
                "updatedAt": mongo::stored_time(Utc::now()),
            } },
        )
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found("User not found"));
    }

    Ok(HttpResponse::Ok().json(Preferences { interests }))
}

pub async fn change_password(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    input: web::Json<ChangePasswordInput>,
) -> AppResult<HttpResponse> {
    validate_password(&input.new_password)?;
    let user = find_user(&state, caller.user_id).await?;

    if !verify_password(&input.current_password, &user.password) {
        return Err(AppError::bad_request("Current password is incorrect"));
    }

    mongo::users(&state.db)
        .update_one(
            doc! { "_id": caller.user_id },
            doc! { "$set": {
                "password": hash_password(&input.new_password)?,
                "updatedAt": mongo::stored_time(Utc::now()),
            } },
        )
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Password updated")))
}

pub async fn send_verify_otp(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
) -> AppResult<HttpResponse> {
    let user = find_user(&state, caller.user_id).await?;
    if user.is_account_verified {
        return Err(AppError::bad_request("Account is already verified"));
    }

    let otp = generate_otp();
    mongo::users(&state.db)
        .update_one(
            doc! { "_id": caller.user_id },
            otp_issue_update(OtpPurpose::Verification, &otp, Utc::now()),
        )
        .await?;

    state
        .mailer
        .send(&otp_email(&user.email, "account verification", &otp))
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Verification code sent")))
}

/// Uses up one guess at `purpose`'s code. Once none are left the code is
/// revoked and every further guess fails until a new one is sent.
async fn claim_otp_attempt(
    users: &Collection<User>,
    email: &str,
    purpose: OtpPurpose,
) -> AppResult<()> {
    let claimed = users
        .update_one(otp_attempt_filter(email, purpose), otp_attempt_update(purpose))
        .await?;
    if claimed.matched_count > 0 {
        return Ok(());
    }

    warn!("OTP attempts exhausted for {} ({:?})", email, purpose);
    users
        .update_one(
            doc! { "email": email },
            doc! { "$unset": otp_clear_fields(purpose, false) },
        )
        .await?;
    Err(AppError::bad_request(
        "Too many incorrect attempts, request a new code",
    ))
}

pub async fn verify_email(
    state: web::Data<AppState>,
    input: web::Json<VerifyEmailInput>,
) -> AppResult<HttpResponse> {
    let email = normalize_email(&input.email);
    let users = mongo::users(&state.db);
    let user = users
        .find_one(doc! { "email": email.as_str() })
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    claim_otp_attempt(&users, &email, OtpPurpose::Verification).await?;
    check_otp(
        &input.otp,
        user.verify_otp.as_deref(),
        user.verify_otp_expire_at,
        Utc::now(),
    )?;

    users
        .update_one(
            doc! { "email": email.as_str() },
            doc! {
                "$set": { "isAccountVerified": true, "updatedAt": mongo::stored_time(Utc::now()) },
                "$unset": otp_clear_fields(OtpPurpose::Verification, true),
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Email verified")))
}

pub async fn send_reset_otp(
    state: web::Data<AppState>,
    input: web::Json<EmailInput>,
) -> AppResult<HttpResponse> {
    let email = normalize_email(&input.email);
    let otp = generate_otp();

    let result = mongo::users(&state.db)
        .update_one(
            doc! { "email": email.as_str() },
            otp_issue_update(OtpPurpose::Reset, &otp, Utc::now()),
        )
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found("User not found"));
    }

    state
        .mailer
        .send(&otp_email(&email, "password reset", &otp))
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Password reset code sent")))
}

pub async fn reset_password(
    state: web::Data<AppState>,
    input: web::Json<ResetPasswordInput>,
) -> AppResult<HttpResponse> {
    validate_password(&input.new_password)?;
    let email = normalize_email(&input.email);
    let users = mongo::users(&state.db);
    let user = users
        .find_one(doc! { "email": email.as_str() })
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    claim_otp_attempt(&users, &email, OtpPurpose::Reset).await?;
    check_otp(
        &input.otp,
        user.reset_otp.as_deref(),
        user.reset_otp_expire_at,
        Utc::now(),
    )?;

    users
        .update_one(
            doc! { "email": email.as_str() },
            doc! {
                "$set": {
                    "password": hash_password(&input.new_password)?,
                    "updatedAt": mongo::stored_time(Utc::now()),
                },
                "$unset": otp_clear_fields(OtpPurpose::Reset, true),
            },
        )
        .await?;

    warn!("Password reset for {}", email);
    Ok(HttpResponse::Ok().json(MessageResponse::new("Password has been reset")))
}
