use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, LocalBoxFuture};
use log::debug;
use mongodb::bson::oid::ObjectId;

use crate::error::AppError;
use crate::middleware::auth::{app_state, claims_from_request, Claims};
use crate::models::user::{AccountStatus, UserRole};
use crate::state::AppState;

/// The caller behind a request, as stored now rather than as the token
/// remembers it. Reuses what `AuthMiddleware` resolved when present,
/// otherwise resolves the session itself, so handlers outside a guarded
/// scope can require a session too.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: ObjectId,
    pub email: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Resolves verified claims to the account they name. Deleted and
/// inactive accounts lose their sessions immediately.
pub async fn load_caller(
    state: &AppState,
    claims: &Claims,
) -> Result<AuthenticatedUser, AppError> {
    let user_id = ObjectId::parse_str(&claims.user_id)
        .map_err(|_| AppError::Unauthorized("Invalid session".to_string()))?;

    let user = state.users.find_user(user_id).await?.ok_or_else(|| {
        debug!("Session for {} names a missing account", claims.sub);
        AppError::Unauthorized("Account no longer exists".to_string())
    })?;

    if user.status != AccountStatus::Active {
        return Err(AppError::Unauthorized("Account is inactive".to_string()));
    }

    Ok(AuthenticatedUser {
        user_id,
        email: user.email,
        role: user.role,
    })
}

fn authenticate(
    req: &HttpRequest,
) -> LocalBoxFuture<'static, Result<AuthenticatedUser, AppError>> {
    let resolved = req.extensions().get::<AuthenticatedUser>().cloned();
    if let Some(user) = resolved {
        return Box::pin(ready(Ok(user)));
    }

    let req = req.clone();
    Box::pin(async move {
        let claims = claims_from_request(&req)?;
        let state = app_state(&req)?;
        let user = load_caller(&state, &claims).await?;
        req.extensions_mut().insert(user.clone());
        Ok(user)
    })
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        authenticate(req)
    }
}

/// An authenticated caller whose stored account holds the admin role.
#[derive(Clone, Debug)]
pub struct AdminUser(pub AuthenticatedUser);

impl std::ops::Deref for AdminUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AdminUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = authenticate(req);
        Box::pin(async move {
            let user = user.await?;
            if user.is_admin() {
                Ok(AdminUser(user))
            } else {
                Err(AppError::forbidden("Admin access required"))
            }
        })
    }
}
