use actix_web::web;

use crate::middleware::auth::AuthMiddleware;
use crate::middleware::role_auth::RequireRole;
use crate::models::user::UserRole;

pub mod dashboard;
pub mod users;

/// Admin-only scopes. `RequireRole` is wrapped first so it runs after
/// `AuthMiddleware` has put the claims on the request.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(RequireRole::new(UserRole::Admin))
            .wrap(AuthMiddleware)
            .route("/dashboard", web::get().to(dashboard::dashboard)),
    )
    .service(
        web::scope("/users")
            .wrap(RequireRole::new(UserRole::Admin))
            .wrap(AuthMiddleware)
            .route("", web::get().to(users::list_users))
            .route("/{id}", web::get().to(users::get_user))
            .route("/{id}", web::delete().to(users::delete_user))
            .route("/{id}/role", web::put().to(users::update_user_role)),
    );
}
