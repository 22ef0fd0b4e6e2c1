//! Rules of the booking lifecycle: request validation, pricing, the gateway
//! payload, guarded status changes and payment settlement. Storage, mail and
//! the gateway come in as trait objects.

use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info, warn};
use mongodb::bson::{doc, oid::ObjectId, Document};

use crate::config::KhaltiConfig;
use crate::db::bookings::BookingStore;
use crate::db::mongo::stored_time;
use crate::error::{AppError, AppResult};
use crate::models::bookings::{
    Booking, BookingInput, BookingStatus, PaymentMethod, PaymentStatus,
};
use crate::models::package::Package;
use crate::services::account_service::is_valid_email;
use crate::services::email_service::{booking_status_email, Mailer};
use crate::services::payment::interface::{
    CustomerInfo, PaymentGateway, PaymentLookup, PaymentPayload,
};

/// Validates a booking request and returns the referenced package id.
/// Same-day bookings are accepted; anything earlier than `today` is not.
pub fn validate_booking_input(input: &BookingInput, today: NaiveDate) -> AppResult<ObjectId> {
    let package_id = ObjectId::parse_str(input.package_id.trim())
        .map_err(|_| AppError::bad_request("Invalid package ID"))?;

    if input.number_of_people < 1 {
        return Err(AppError::bad_request("Number of people must be at least 1"));
    }

    if input.booking_date < today {
        return Err(AppError::bad_request("Booking date cannot be in the past"));
    }

    let contact = &input.contact_info;
    if [&contact.name, &contact.email, &contact.phone, &contact.address]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(AppError::bad_request(
            "Contact name, email, phone and address are required",
        ));
    }
    if !is_valid_email(contact.email.trim()) {
        return Err(AppError::bad_request("Invalid contact email"));
    }

    Ok(package_id)
}

pub fn total_price(price: f64, number_of_people: u32) -> f64 {
    price * number_of_people as f64
}

/// Converts an amount in rupees to paisa.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn from_minor_units(amount: i64) -> f64 {
    amount as f64 / 100.0
}

/// Builds the pending booking for a request. Cash bookings are priced up
/// front and count as paid; gateway bookings start unpaid with nothing
/// collected until the gateway confirms.
pub fn new_booking(
    id: ObjectId,
    user: ObjectId,
    package: &Package,
    input: &BookingInput,
    transaction_id: Option<String>,
    now: DateTime<Utc>,
) -> AppResult<Booking> {
    let package_id = package
        .id
        .ok_or_else(|| AppError::Internal("Package without an id".to_string()))?;

    let (amount_paid, payment_status) = match input.payment_method {
        PaymentMethod::Cash => (
            total_price(package.price, input.number_of_people),
            PaymentStatus::Paid,
        ),
        PaymentMethod::Khalti => (0.0, PaymentStatus::Pending),
    };

    let mut contact_info = input.contact_info.clone();
    contact_info.email = contact_info.email.trim().to_lowercase();

    Ok(Booking {
        id: Some(id),
        user,
        package: package_id,
        number_of_people: input.number_of_people,
        booking_date: input.booking_date,
        contact_info,
        amount_paid,
        status: BookingStatus::Pending,
        payment_method: input.payment_method,
        payment_status,
        transaction_id,
        payment_details: None,
        created_at: Some(now),
        updated_at: Some(now),
    })
}

pub fn payment_payload(
    booking_id: ObjectId,
    package: &Package,
    input: &BookingInput,
    khalti: &KhaltiConfig,
) -> PaymentPayload {
    PaymentPayload {
        return_url: khalti.return_url.clone(),
        website_url: khalti.website_url.clone(),
        amount: to_minor_units(total_price(package.price, input.number_of_people)),
        purchase_order_id: booking_id.to_hex(),
        purchase_order_name: package.package_name.clone(),
        customer_info: CustomerInfo {
            name: input.contact_info.name.trim().to_string(),
            email: input.contact_info.email.trim().to_string(),
            phone: input.contact_info.phone.trim().to_string(),
        },
    }
}

/// Filter for a guarded transition: it only matches while the booking is
/// still in `from`.
pub fn transition_filter(booking_id: ObjectId, from: BookingStatus) -> Document {
    doc! { "_id": booking_id, "status": from.as_str() }
}

pub fn transition_update(to: BookingStatus, now: DateTime<Utc>) -> Document {
    doc! {
        "$set": {
            "status": to.as_str(),
            "updatedAt": stored_time(now),
        }
    }
}

/// Pipeline update applied when the gateway confirms a payment. Payment
/// fields are always written; the booking only moves to confirmed if it is
/// still pending, so a decision made before the callback stands.
pub fn payment_confirmation_update(
    lookup: &PaymentLookup,
    now: DateTime<Utc>,
) -> AppResult<Vec<Document>> {
    let details = mongodb::bson::to_bson(&lookup.raw)
        .map_err(|e| AppError::Internal(format!("Failed to encode payment details: {}", e)))?;

    Ok(vec![doc! {
        "$set": {
            "status": {
                "$cond": [
                    { "$eq": ["$status", BookingStatus::Pending.as_str()] },
                    BookingStatus::Confirmed.as_str(),
                    "$status"
                ]
            },
            "paymentStatus": PaymentStatus::Paid.as_str(),
            "amountPaid": from_minor_units(lookup.total_amount),
            "paymentDetails": { "$literal": details },
            "updatedAt": { "$literal": stored_time(now) },
        }
    }])
}

/// The in-memory counterpart of `payment_confirmation_update`.
pub fn apply_payment(booking: &mut Booking, lookup: &PaymentLookup, now: DateTime<Utc>) {
    if booking.status == BookingStatus::Pending {
        booking.status = BookingStatus::Confirmed;
    }
    booking.payment_status = PaymentStatus::Paid;
    booking.amount_paid = from_minor_units(lookup.total_amount);
    booking.payment_details = Some(lookup.raw.clone());
    booking.updated_at = Some(now);
}

/// Explains why a guarded transition matched nothing, given what is stored
/// under that id (if anything). `owner` is set for owner-only transitions.
pub fn explain_transition_miss(
    existing: Option<&Booking>,
    owner: Option<ObjectId>,
    to: BookingStatus,
) -> AppError {
    match existing {
        None => AppError::not_found("Booking not found"),
        Some(booking) => {
            if let Some(owner) = owner {
                if booking.user != owner {
                    return AppError::forbidden("You can only modify your own bookings");
                }
            }
            if booking.status.can_transition_to(to) {
                // Lost a race with a concurrent write
                AppError::conflict("Booking was modified concurrently, try again")
            } else {
                AppError::conflict(format!(
                    "Booking is already {} and cannot be {}",
                    booking.status.as_str(),
                    to.as_str()
                ))
            }
        }
    }
}

/// Applies a guarded transition and explains a miss.
pub async fn change_status(
    store: &dyn BookingStore,
    booking_id: ObjectId,
    owner: Option<ObjectId>,
    to: BookingStatus,
    now: DateTime<Utc>,
) -> AppResult<Booking> {
    match store.transition(booking_id, owner, to, now).await? {
        Some(booking) => Ok(booking),
        None => {
            let existing = store.find(booking_id).await?;
            Err(explain_transition_miss(existing.as_ref(), owner, to))
        }
    }
}

/// Emails the customer about their booking's current status. Delivery
/// failures are logged and never surface to the caller.
pub async fn notify_customer(
    store: &dyn BookingStore,
    mailer: &dyn Mailer,
    booking: &Booking,
) {
    let package_name = match store.package_name(booking.package).await {
        Ok(Some(name)) => name,
        Ok(None) => "your trip".to_string(),
        Err(e) => {
            warn!("Could not load package for booking email: {}", e);
            "your trip".to_string()
        }
    };

    let message = booking_status_email(
        &booking.contact_info.email,
        &booking.contact_info.name,
        &package_name,
        booking.status,
    );
    if let Err(e) = mailer.send(&message).await {
        error!(
            "Failed to send {} email for booking {:?}: {}",
            booking.status.as_str(),
            booking.id,
            e
        );
    }
}

/// Asks the gateway about `pidx` and only returns a completed payment.
pub async fn verify_payment(
    gateway: &dyn PaymentGateway,
    pidx: &str,
) -> AppResult<PaymentLookup> {
    let pidx = pidx.trim();
    if pidx.is_empty() {
        return Err(AppError::bad_request("pidx is required"));
    }

    let lookup = gateway.lookup(pidx).await?;
    if !lookup.is_completed() {
        info!("Khalti payment {} is {}, booking left pending", pidx, lookup.status);
        return Err(AppError::bad_request(format!(
            "Payment not completed (status: {})",
            lookup.status
        )));
    }
    Ok(lookup)
}

/// Records a verified payment against its booking and returns the booking
/// as stored afterwards.
pub async fn settle_payment(
    store: &dyn BookingStore,
    pidx: &str,
    lookup: &PaymentLookup,
    now: DateTime<Utc>,
) -> AppResult<Booking> {
    match store.record_payment(pidx, lookup, now).await? {
        Some(mut booking) => {
            let prior = booking.status;
            apply_payment(&mut booking, lookup, now);
            if prior == BookingStatus::Pending {
                info!(
                    "Khalti payment {} confirmed booking {:?} ({} paisa)",
                    pidx, booking.id, lookup.total_amount
                );
            } else {
                error!(
                    "Khalti payment {} ({} paisa) landed on {} booking {:?}, needs manual review",
                    pidx,
                    lookup.total_amount,
                    prior.as_str(),
                    booking.id
                );
            }
            Ok(booking)
        }
        None => match store.find_by_transaction(pidx).await? {
            Some(existing) => {
                warn!(
                    "Duplicate Khalti callback for {} on booking {:?}",
                    pidx, existing.id
                );
                Err(AppError::conflict("Payment is already recorded for this booking"))
            }
            None => {
                error!(
                    "Unreconciled payment: Khalti pidx {} (transaction {:?}, {} paisa) has no booking",
                    pidx, lookup.transaction_id, lookup.total_amount
                );
                Err(AppError::not_found("No booking matches this payment"))
            }
        },
    }
}
