use actix_web::{error, web};

use crate::error::AppError;
use crate::middleware::auth::AuthMiddleware;
use crate::middleware::role_auth::RequireRole;
use crate::models::user::UserRole;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod contact;
pub mod destinations;
pub mod health;
pub mod packages;
pub mod photos;

/// Everything under `/api`. Routes that mix public and restricted methods
/// on one path check the caller through the `AuthenticatedUser` and
/// `AdminUser` extractors instead of scope middleware.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api")
                .service(
                    web::scope("/auth")
                        .route("/signup", web::post().to(auth::signup))
                        .route("/login", web::post().to(auth::login))
                        .route("/logout", web::post().to(auth::logout))
                        .route("/session", web::get().to(auth::user_session))
                        .route("/save-preferences", web::post().to(auth::save_preferences))
                        .route("/change-password", web::patch().to(auth::change_password))
                        .route("/send-verify-otp", web::post().to(auth::send_verify_otp))
                        .route("/verify-email", web::post().to(auth::verify_email))
                        .route("/send-reset-otp", web::post().to(auth::send_reset_otp))
                        .route("/reset-password", web::post().to(auth::reset_password)),
                )
                .service(
                    web::scope("/bookings")
                        .wrap(AuthMiddleware)
                        .route("", web::get().to(bookings::my_bookings))
                        .route("/create", web::post().to(bookings::create_booking))
                        .route("/admin", web::get().to(bookings::admin_bookings))
                        .route(
                            "/admin/notifications",
                            web::get().to(bookings::admin_notifications),
                        )
                        .route("/confirm/{id}", web::put().to(bookings::confirm_booking))
                        .route("/reject/{id}", web::put().to(bookings::reject_booking))
                        .route("/cancel/{id}", web::put().to(bookings::cancel_booking))
                        .route("/process-khalti", web::post().to(bookings::process_khalti)),
                )
                .service(
                    web::scope("/booking-history")
                        .wrap(RequireRole::new(UserRole::Admin))
                        .wrap(AuthMiddleware)
                        .route("", web::get().to(bookings::booking_history)),
                )
                .service(
                    web::scope("/destinations")
                        .route("", web::get().to(destinations::list_destinations))
                        .route("", web::post().to(destinations::create_destination))
                        .route(
                            "/highest-rated-reviews",
                            web::get().to(destinations::highest_rated_reviews),
                        )
                        .route("/admin", web::get().to(destinations::admin_destinations))
                        .route("/{id}", web::get().to(destinations::get_destination))
                        .route("/{id}", web::put().to(destinations::update_destination))
                        .route("/{id}", web::delete().to(destinations::delete_destination))
                        .route("/{id}/reviews", web::post().to(destinations::add_review)),
                )
                .service(
                    web::scope("/packages")
                        .route("", web::get().to(packages::list_packages))
                        .route("", web::post().to(packages::create_package))
                        .route("/admin", web::get().to(packages::admin_packages))
                        .route("/{id}", web::get().to(packages::get_package))
                        .route("/{id}", web::put().to(packages::update_package))
                        .route("/{id}", web::delete().to(packages::delete_package)),
                )
                .service(
                    web::scope("/contact")
                        .route("", web::post().to(contact::send_message))
                        .route("", web::get().to(contact::list_messages))
                        .route("/{id}", web::delete().to(contact::delete_message)),
                )
                .service(
                    web::scope("/photos")
                        .route("", web::get().to(photos::list_photos))
                        .route("/upload", web::post().to(photos::upload_photo))
                        .route("/{id}", web::delete().to(photos::delete_photo)),
                )
                .configure(admin::config),
        );
}

/// Malformed bodies get the same `{"error": ...}` shape as every other
/// client error.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        error::Error::from(AppError::bad_request(format!("Invalid request body: {}", err)))
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        error::Error::from(AppError::bad_request(format!("Invalid query string: {}", err)))
    })
}
