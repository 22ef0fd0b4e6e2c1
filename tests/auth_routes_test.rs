mod common;

use actix_web::{cookie::Cookie, test};
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};
use serial_test::serial;

use common::TestApp;
use tourease_api::models::user::{AccountStatus, UserRole};

fn cancel_uri() -> String {
    format!("/api/bookings/cancel/{}", ObjectId::new().to_hex())
}

#[actix_rt::test]
#[serial]
async fn test_session_without_token_is_unauthorized() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/api/auth/session").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_rt::test]
#[serial]
async fn test_session_with_forged_cookie_is_unauthorized() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get()
        .uri("/api/auth/session")
        .cookie(Cookie::new("jwt", "not.a.token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_rt::test]
#[serial]
async fn test_signup_rejects_short_password() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .set_json(json!({
            "name": "Asha",
            "email": "asha@example.com",
            "password": "short"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Password must be at least 8 characters");
}

#[actix_rt::test]
#[serial]
async fn test_signup_rejects_invalid_email() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .set_json(json!({
            "name": "Asha",
            "email": "not-an-email",
            "password": "long-enough"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
#[serial]
async fn test_admin_accounts_cannot_self_register() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .set_json(json!({
            "name": "Mallory",
            "email": "mallory@example.com",
            "password": "long-enough",
            "role": "admin"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}

#[actix_rt::test]
#[serial]
async fn test_logout_expires_session_cookie() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post().uri("/api/auth/logout").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == "jwt")
        .expect("logout sets the session cookie");
    assert_eq!(cookie.value(), "");
}

#[actix_rt::test]
#[serial]
async fn test_reset_password_rejects_short_password() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/reset-password")
        .set_json(json!({
            "email": "asha@example.com",
            "otp": "123456",
            "newPassword": "short"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
#[serial]
async fn test_deleted_account_loses_its_session() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let id = test_app.register(UserRole::User);
    let bearer = test_app.bearer_as(id, UserRole::User);

    let req = test::TestRequest::put()
        .uri(&cancel_uri())
        .insert_header(bearer.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    test_app.users.remove(id);
    let req = test::TestRequest::put()
        .uri(&cancel_uri())
        .insert_header(bearer)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_rt::test]
#[serial]
async fn test_inactive_account_is_unauthorized() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let id = test_app.register(UserRole::User);
    test_app
        .users
        .update(id, |user| user.status = AccountStatus::Inactive);

    let req = test::TestRequest::put()
        .uri(&cancel_uri())
        .insert_header(test_app.bearer_as(id, UserRole::User))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Account is inactive");
}

#[actix_rt::test]
#[serial]
async fn test_demoted_admin_loses_admin_routes() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let id = test_app.register(UserRole::Admin);
    test_app.users.update(id, |user| user.role = UserRole::User);

    for req in [
        test::TestRequest::put().uri(&format!(
            "/api/bookings/confirm/{}",
            ObjectId::new().to_hex()
        )),
        test::TestRequest::get().uri("/api/users"),
        test::TestRequest::get().uri("/api/booking-history"),
    ] {
        let req = req
            .insert_header(test_app.bearer_as(id, UserRole::Admin))
            .to_request();
        let path = req.uri().to_string();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403, "{}", path);
    }
}

#[actix_rt::test]
#[serial]
async fn test_promotion_applies_to_existing_tokens() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let id = test_app.register(UserRole::User);
    test_app.users.update(id, |user| user.role = UserRole::Admin);

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/confirm/{}", ObjectId::new().to_hex()))
        .insert_header(test_app.bearer_as(id, UserRole::User))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_rt::test]
#[serial]
async fn test_malformed_json_gets_an_error_body() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(r#"{"name": "Asha", "email": "#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));
}
