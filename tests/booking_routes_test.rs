mod common;

use actix_web::test;
use chrono::{Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};
use serial_test::serial;

use common::TestApp;
use tourease_api::models::user::UserRole;

fn booking_body(date: String) -> Value {
    json!({
        "packageId": ObjectId::new().to_hex(),
        "numberOfPeople": 2,
        "bookingDate": date,
        "contactInfo": {
            "name": "Asha Gurung",
            "email": "asha@example.com",
            "phone": "9800000000",
            "address": "Pokhara"
        },
        "paymentMethod": "cash"
    })
}

#[actix_rt::test]
#[serial]
async fn test_bookings_require_a_session() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    for uri in ["/api/bookings", "/api/bookings/admin"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401, "{}", uri);
    }
}

#[actix_rt::test]
#[serial]
async fn test_create_booking_rejects_past_date() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let yesterday = (Utc::now() - Duration::days(1)).date_naive().to_string();
    let req = test::TestRequest::post()
        .uri("/api/bookings/create")
        .insert_header(test_app.bearer(UserRole::User))
        .set_json(booking_body(yesterday))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
#[serial]
async fn test_create_booking_rejects_zero_people() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let mut body = booking_body((Utc::now() + Duration::days(10)).date_naive().to_string());
    body["numberOfPeople"] = json!(0);

    let req = test::TestRequest::post()
        .uri("/api/bookings/create")
        .insert_header(test_app.bearer(UserRole::User))
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
#[serial]
async fn test_create_booking_rejects_blank_contact() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let mut body = booking_body((Utc::now() + Duration::days(10)).date_naive().to_string());
    body["contactInfo"]["phone"] = json!("  ");

    let req = test::TestRequest::post()
        .uri("/api/bookings/create")
        .insert_header(test_app.bearer(UserRole::User))
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
#[serial]
async fn test_moderation_is_admin_only() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let id = ObjectId::new().to_hex();
    for action in ["confirm", "reject"] {
        let req = test::TestRequest::put()
            .uri(&format!("/api/bookings/{}/{}", action, id))
            .insert_header(test_app.bearer(UserRole::User))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403, "{}", action);
    }
}

#[actix_rt::test]
#[serial]
async fn test_confirm_rejects_malformed_id() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::put()
        .uri("/api/bookings/confirm/not-an-id")
        .insert_header(test_app.bearer(UserRole::Admin))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid booking ID");
}

#[actix_rt::test]
#[serial]
async fn test_process_khalti_requires_pidx() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/bookings/process-khalti")
        .insert_header(test_app.bearer(UserRole::User))
        .set_json(json!({ "pidx": "   " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
#[serial]
async fn test_incomplete_khalti_payment_leaves_booking_alone() {
    let test_app = TestApp::with_lookup_status("User canceled").await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/bookings/process-khalti")
        .insert_header(test_app.bearer(UserRole::User))
        .set_json(json!({ "pidx": "HT6o6PEZRWFJ5ygavzHWd5" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Payment not completed (status: User canceled)");
}

#[actix_rt::test]
#[serial]
async fn test_booking_history_is_admin_only() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get()
        .uri("/api/booking-history?search=asha")
        .insert_header(test_app.bearer(UserRole::User))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}
