use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::ReturnDocument,
    Database,
};

use crate::db::mongo;
use crate::error::AppResult;
use crate::models::bookings::{Booking, BookingStatus, PaymentStatus};
use crate::services::booking_workflow::{
    payment_confirmation_update, transition_filter, transition_update,
};
use crate::services::payment::interface::PaymentLookup;

/// Storage behind the status and payment workflow. Every write is a single
/// conditional update so concurrent requests cannot both succeed.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find(&self, id: ObjectId) -> AppResult<Option<Booking>>;

    async fn find_by_transaction(&self, pidx: &str) -> AppResult<Option<Booking>>;

    /// Moves the booking to `to` if it is still pending and, when `owner`
    /// is set, belongs to that user. Returns the updated booking.
    async fn transition(
        &self,
        id: ObjectId,
        owner: Option<ObjectId>,
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Booking>>;

    /// Records a verified payment on the unpaid booking holding `pidx`.
    /// Returns the booking as it was before the write.
    async fn record_payment(
        &self,
        pidx: &str,
        lookup: &PaymentLookup,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Booking>>;

    async fn package_name(&self, package: ObjectId) -> AppResult<Option<String>>;
}

pub struct MongoBookingStore {
    db: Database,
}

impl MongoBookingStore {
    pub fn new(db: Database) -> Self {
        MongoBookingStore { db }
    }
}

#[async_trait]
impl BookingStore for MongoBookingStore {
    async fn find(&self, id: ObjectId) -> AppResult<Option<Booking>> {
        Ok(mongo::bookings(&self.db).find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_transaction(&self, pidx: &str) -> AppResult<Option<Booking>> {
        Ok(mongo::bookings(&self.db)
            .find_one(doc! { "transactionId": pidx })
            .await?)
    }

    async fn transition(
        &self,
        id: ObjectId,
        owner: Option<ObjectId>,
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Booking>> {
        let mut filter = transition_filter(id, BookingStatus::Pending);
        if let Some(owner) = owner {
            filter.insert("user", owner);
        }

        Ok(mongo::bookings(&self.db)
            .find_one_and_update(filter, transition_update(to, now))
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn record_payment(
        &self,
        pidx: &str,
        lookup: &PaymentLookup,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Booking>> {
        let filter = doc! {
            "transactionId": pidx,
            "paymentStatus": PaymentStatus::Pending.as_str(),
        };

        Ok(mongo::bookings(&self.db)
            .find_one_and_update(filter, payment_confirmation_update(lookup, now)?)
            .return_document(ReturnDocument::Before)
            .await?)
    }

    async fn package_name(&self, package: ObjectId) -> AppResult<Option<String>> {
        Ok(mongo::packages(&self.db)
            .find_one(doc! { "_id": package })
            .await?
            .map(|package| package.package_name))
    }
}
