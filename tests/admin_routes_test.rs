mod common;

use actix_web::test;
use mongodb::bson::oid::ObjectId;
use serde_json::json;
use serial_test::serial;

use common::TestApp;
use tourease_api::models::user::UserRole;

#[actix_rt::test]
#[serial]
async fn test_dashboard_requires_a_session() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/api/admin/dashboard").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_rt::test]
#[serial]
async fn test_admin_scopes_reject_regular_users() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    for uri in ["/api/admin/dashboard", "/api/users"] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(test_app.bearer(UserRole::User))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403, "{}", uri);
    }
}

#[actix_rt::test]
#[serial]
async fn test_role_change_rejects_unknown_role() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{}/role", ObjectId::new().to_hex()))
        .insert_header(test_app.bearer(UserRole::Admin))
        .set_json(json!({ "role": "superuser" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
#[serial]
async fn test_catalogue_writes_are_admin_only() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let id = ObjectId::new().to_hex();
    let requests = vec![
        test::TestRequest::delete().uri(&format!("/api/destinations/{}", id)),
        test::TestRequest::delete().uri(&format!("/api/packages/{}", id)),
        test::TestRequest::delete().uri(&format!("/api/photos/{}", id)),
        test::TestRequest::delete().uri(&format!("/api/contact/{}", id)),
        test::TestRequest::get().uri("/api/contact"),
        test::TestRequest::get().uri("/api/destinations/admin"),
        test::TestRequest::get().uri("/api/packages/admin"),
    ];

    for builder in requests {
        let req = builder
            .insert_header(test_app.bearer(UserRole::User))
            .to_request();
        let path = req.uri().to_string();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403, "{}", path);
    }
}

#[actix_rt::test]
#[serial]
async fn test_reviews_need_a_session() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/destinations/{}/reviews", ObjectId::new().to_hex()))
        .set_json(json!({ "rating": 5, "comment": "Stunning views" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_rt::test]
#[serial]
async fn test_review_rating_out_of_range() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/destinations/{}/reviews", ObjectId::new().to_hex()))
        .insert_header(test_app.bearer(UserRole::User))
        .set_json(json!({ "rating": 7, "comment": "Too good" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
#[serial]
async fn test_contact_requires_valid_email() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/contact")
        .set_json(json!({
            "name": "Asha",
            "email": "asha-at-example",
            "message": "Is the Annapurna trek open in June?"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}
