use std::rc::Rc;

use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, HttpRequest,
};
use chrono::{Duration, Utc};
use futures::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::auth_context::load_caller;
use crate::models::user::UserRole;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "jwt";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // subject (email)
    pub exp: usize,
    pub iat: usize,
    pub user_id: String,
    pub role: UserRole,
}

pub fn generate_token(
    config: &AppConfig,
    email: &str,
    user_id: ObjectId,
    role: UserRole,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: email.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(config.jwt_ttl_hours)).timestamp() as usize,
        user_id: user_id.to_hex(),
        role,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "iat", "sub"]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
}

pub fn session_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::hours(config.jwt_ttl_hours))
        .finish()
}

pub fn expired_session_cookie(config: &AppConfig) -> Cookie<'static> {
    let mut cookie = session_cookie(config, String::new());
    cookie.make_removal();
    cookie
}

/// The session cookie wins over an `Authorization: Bearer` header.
pub fn token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

pub fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, AppError> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::Internal("Application state is missing".to_string()))
}

/// Reads and verifies the caller's token against the configured secret.
pub fn claims_from_request(req: &HttpRequest) -> Result<Claims, AppError> {
    let token = token_from_request(req)
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;
    let state = app_state(req)?;

    decode_token(&state.config.jwt_secret, &token).map_err(|err| {
        debug!("Rejected session token: {}", err);
        AppError::Unauthorized("Invalid or expired session".to_string())
    })
}

/// Resolves the session to its stored account before the request reaches
/// the scope, leaving an `AuthenticatedUser` in the request extensions.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let claims = claims_from_request(req.request()).map_err(Error::from)?;
            let state = app_state(req.request()).map_err(Error::from)?;
            let user = load_caller(&state, &claims).await.map_err(Error::from)?;

            req.extensions_mut().insert(user);
            service.call(req).await
        })
    }
}
