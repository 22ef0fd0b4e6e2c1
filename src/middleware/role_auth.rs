use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::warn;

use crate::error::AppError;
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::user::UserRole;

/// Lets a request through only if the caller's stored account holds the
/// required role. Must sit inside `AuthMiddleware` (wrapped before it).
pub struct RequireRole {
    required_role: UserRole,
}

impl RequireRole {
    pub fn new(role: UserRole) -> Self {
        RequireRole { required_role: role }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequireRoleService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireRoleService {
            service,
            required_role: self.required_role,
        }))
    }
}

pub struct RequireRoleService<S> {
    service: S,
    required_role: UserRole,
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let caller = req.extensions().get::<AuthenticatedUser>().cloned();

        match caller {
            Some(caller) if caller.role == self.required_role || caller.is_admin() => {
                Box::pin(self.service.call(req))
            }
            Some(caller) => {
                warn!(
                    "{} ({}) denied access to {}",
                    caller.email,
                    caller.role.as_str(),
                    req.path()
                );
                Box::pin(ready(Err(Error::from(AppError::forbidden(
                    "Insufficient permissions",
                )))))
            }
            None => Box::pin(ready(Err(Error::from(AppError::Unauthorized(
                "Not authenticated".to_string(),
            ))))),
        }
    }
}
