use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};

use crate::db::mongo;
use crate::error::AppResult;
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::bookings::{BookingStatus, PaymentStatus};
use crate::models::dashboard::{BookingFigures, DashboardStats};
use crate::state::AppState;

/// One pass over the bookings of the given packages.
pub fn booking_figures_pipeline(packages: Vec<ObjectId>) -> Vec<Document> {
    vec![
        doc! { "$match": { "package": { "$in": packages } } },
        doc! {
            "$facet": {
                "totalNumberOfPeople": [
                    { "$group": { "_id": null, "total": { "$sum": "$numberOfPeople" } } }
                ],
                "totalBookings": [ { "$count": "total" } ],
                "totalRevenue": [
                    { "$match": { "paymentStatus": PaymentStatus::Paid.as_str() } },
                    { "$group": { "_id": null, "total": { "$sum": "$amountPaid" } } }
                ],
                "canceledBookings": [
                    { "$match": { "status": BookingStatus::Cancelled.as_str() } },
                    { "$count": "total" }
                ],
            }
        },
    ]
}

async fn booking_figures(state: &AppState, packages: Vec<ObjectId>) -> AppResult<BookingFigures> {
    if packages.is_empty() {
        return Ok(BookingFigures::default());
    }

    let results: Vec<Document> = mongo::bookings(&state.db)
        .aggregate(booking_figures_pipeline(packages))
        .await?
        .try_collect()
        .await?;

    Ok(results
        .first()
        .map(BookingFigures::from_facet)
        .unwrap_or_default())
}

pub async fn dashboard(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
) -> AppResult<HttpResponse> {
    let packages = mongo::package_ids_created_by(&state.db, caller.user_id).await?;
    if packages.is_empty() {
        return Ok(HttpResponse::Ok().json(DashboardStats::default()));
    }

    let figures = booking_figures(&state, packages).await?;

    let stats = DashboardStats {
        total_number_of_people: figures.total_number_of_people,
        total_bookings: figures.total_bookings,
        total_revenue: figures.total_revenue,
        canceled_bookings: figures.canceled_bookings,
        total_users: mongo::users(&state.db).count_documents(doc! {}).await?,
        total_destinations: mongo::destinations(&state.db).count_documents(doc! {}).await?,
        total_packages: mongo::packages(&state.db).count_documents(doc! {}).await?,
        total_messages: mongo::contacts(&state.db).count_documents(doc! {}).await?,
    };

    Ok(HttpResponse::Ok().json(stats))
}
