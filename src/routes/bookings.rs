use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::TryStreamExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::Serialize;

use crate::db::mongo;
use crate::error::{AppError, AppResult};
use crate::middleware::auth_context::{AdminUser, AuthenticatedUser};
use crate::models::bookings::{
    Booking, BookingHistoryQuery, BookingInput, BookingStatus, KhaltiCallbackInput,
    PaymentMethod,
};
use crate::services::booking_workflow::{
    change_status, new_booking, notify_customer, payment_payload, settle_payment,
    validate_booking_input, verify_payment,
};
use crate::services::payment::interface::{PaymentError, PaymentPayload};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRedirect {
    pub pidx: String,
    pub payment_url: String,
    pub payload: PaymentPayload,
}

#[derive(Debug, Serialize)]
pub struct BookingCreated {
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentRedirect>,
}

#[derive(Debug, Serialize)]
pub struct BookingUpdated {
    pub message: String,
    pub booking: Booking,
}

fn parse_id(raw: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::bad_request("Invalid booking ID"))
}

async fn collect_bookings(state: &AppState, filter: Document) -> AppResult<Vec<Booking>> {
    let bookings = mongo::bookings(&state.db)
        .find(filter)
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(bookings)
}

pub async fn create_booking(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    input: web::Json<BookingInput>,
) -> AppResult<HttpResponse> {
    let input = input.into_inner();
    let package_id = validate_booking_input(&input, Utc::now().date_naive())?;

    let package = mongo::packages(&state.db)
        .find_one(doc! { "_id": package_id })
        .await?
        .ok_or_else(|| AppError::not_found("Package not found"))?;

    let booking_id = ObjectId::new();
    let mut payment = None;

    if input.payment_method == PaymentMethod::Khalti {
        let khalti = state
            .config
            .khalti
            .as_ref()
            .ok_or(AppError::Gateway(PaymentError::NotConfigured))?;
        let payload = payment_payload(booking_id, &package, &input, khalti);
        let initiated = state.payments.initiate(&payload).await?;

        payment = Some(PaymentRedirect {
            pidx: initiated.pidx,
            payment_url: initiated.payment_url,
            payload,
        });
    }

    let booking = new_booking(
        booking_id,
        caller.user_id,
        &package,
        &input,
        payment.as_ref().map(|p| p.pidx.clone()),
        Utc::now(),
    )?;

    mongo::bookings(&state.db)
        .insert_one(&booking)
        .await
        .map_err(|e| AppError::from_insert(e, "Payment reference is already in use"))?;

    info!(
        "Booking {} created by {} for package {} ({:?})",
        booking_id, caller.email, package_id, booking.payment_method
    );

    Ok(HttpResponse::Created().json(BookingCreated { booking, payment }))
}

pub async fn my_bookings(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
) -> AppResult<HttpResponse> {
    let bookings = collect_bookings(&state, doc! { "user": caller.user_id }).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

pub async fn admin_bookings(
    state: web::Data<AppState>,
    caller: AdminUser,
) -> AppResult<HttpResponse> {
    let packages = mongo::package_ids_created_by(&state.db, caller.user_id).await?;
    if packages.is_empty() {
        return Ok(HttpResponse::Ok().json(Vec::<Booking>::new()));
    }

    let bookings = collect_bookings(&state, doc! { "package": { "$in": packages } }).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

pub async fn admin_notifications(
    state: web::Data<AppState>,
    caller: AdminUser,
) -> AppResult<HttpResponse> {
    let packages = mongo::package_ids_created_by(&state.db, caller.user_id).await?;
    if packages.is_empty() {
        return Ok(HttpResponse::Ok().json(Vec::<Booking>::new()));
    }

    let bookings = collect_bookings(
        &state,
        doc! {
            "package": { "$in": packages },
            "status": BookingStatus::Pending.as_str(),
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(bookings))
}

async fn moderate(
    state: web::Data<AppState>,
    caller: AdminUser,
    path: web::Path<String>,
    to: BookingStatus,
) -> AppResult<HttpResponse> {
    let booking_id = parse_id(&path)?;
    let booking =
        change_status(state.bookings.as_ref(), booking_id, None, to, Utc::now()).await?;
    info!("Booking {} {} by {}", booking_id, to.as_str(), caller.email);

    notify_customer(state.bookings.as_ref(), state.mailer.as_ref(), &booking).await;
    Ok(HttpResponse::Ok().json(BookingUpdated {
        message: format!("Booking {}", to.as_str()),
        booking,
    }))
}

pub async fn confirm_booking(
    state: web::Data<AppState>,
    caller: AdminUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    moderate(state, caller, path, BookingStatus::Confirmed).await
}

pub async fn reject_booking(
    state: web::Data<AppState>,
    caller: AdminUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    moderate(state, caller, path, BookingStatus::Rejected).await
}

pub async fn cancel_booking(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let booking_id = parse_id(&path)?;
    let booking = change_status(
        state.bookings.as_ref(),
        booking_id,
        Some(caller.user_id),
        BookingStatus::Cancelled,
        Utc::now(),
    )
    .await?;
    info!("Booking {} cancelled by its owner {}", booking_id, caller.email);

    Ok(HttpResponse::Ok().json(BookingUpdated {
        message: "Booking cancelled".to_string(),
        booking,
    }))
}

/// Gateway return leg. The reference is verified with the gateway before
/// anything is written.
pub async fn process_khalti(
    state: web::Data<AppState>,
    input: web::Json<KhaltiCallbackInput>,
) -> AppResult<HttpResponse> {
    let pidx = input.into_inner().pidx.trim().to_string();
    let lookup = verify_payment(state.payments.as_ref(), &pidx).await?;
    let booking = settle_payment(state.bookings.as_ref(), &pidx, &lookup, Utc::now()).await?;

    Ok(HttpResponse::Ok().json(BookingUpdated {
        message: "Payment verified".to_string(),
        booking,
    }))
}

pub async fn booking_history(
    state: web::Data<AppState>,
    query: web::Query<BookingHistoryQuery>,
) -> AppResult<HttpResponse> {
    let filter = match query.search.as_deref().map(str::trim) {
        Some(search) if !search.is_empty() => {
            let pattern = regex::escape(search);
            doc! {
                "$or": [
                    { "contactInfo.name": { "$regex": pattern.as_str(), "$options": "i" } },
                    { "contactInfo.email": { "$regex": pattern.as_str(), "$options": "i" } },
                ]
            }
        }
        _ => doc! {},
    };

    let bookings = collect_bookings(&state, filter).await?;
    Ok(HttpResponse::Ok().json(bookings))
}
