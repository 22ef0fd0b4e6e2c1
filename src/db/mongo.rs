use chrono::{DateTime, Utc};
use log::{info, warn};
use mongodb::{
    bson::{doc, oid::ObjectId, Bson},
    options::{ClientOptions, IndexOptions, ServerApi, ServerApiVersion},
    Client, Collection, Database, IndexModel,
};
use std::time::Duration;

use crate::models::{
    bookings::{Booking, BookingStatus},
    contact::Contact,
    destination::Destination,
    package::Package,
    photo::Photo,
    user::User,
};

pub const USERS: &str = "users";
pub const DESTINATIONS: &str = "destinations";
pub const PACKAGES: &str = "packages";
pub const BOOKINGS: &str = "bookings";
pub const CONTACTS: &str = "contacts";
pub const PHOTOS: &str = "photos";

/// Timestamps in partial updates, written exactly as serde writes the
/// `DateTime<Utc>` fields of whole documents.
pub fn stored_time(at: DateTime<Utc>) -> Bson {
    mongodb::bson::to_bson(&at).unwrap_or_else(|_| Bson::String(at.to_rfc3339()))
}

pub async fn create_mongo_client(uri: &str) -> Result<Client, mongodb::error::Error> {
    let mut client_options = ClientOptions::parse(uri).await?;

    client_options.app_name = Some("tourease-api".to_string());
    client_options.connect_timeout = Some(Duration::from_secs(10));
    client_options.server_selection_timeout = Some(Duration::from_secs(10));
    client_options.max_pool_size = Some(10);
    client_options.min_pool_size = Some(1);

    let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
    client_options.server_api = Some(server_api);

    Client::with_options(client_options)
}

/// Pings the server, then makes sure indexes exist and legacy data is in the
/// canonical shape. A failed ping is logged but not fatal.
pub async fn prepare_database(db: &Database) -> Result<(), mongodb::error::Error> {
    match db.run_command(doc! { "ping": 1 }).await {
        Ok(_) => info!("Connected to MongoDB database '{}'", db.name()),
        Err(e) => {
            warn!("Connected to MongoDB but ping failed: {}", e);
            return Ok(());
        }
    }

    ensure_indexes(db).await?;
    let migrated = normalize_booking_statuses(db).await?;
    if migrated > 0 {
        info!("Normalised status casing on {} bookings", migrated);
    }
    Ok(())
}

async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    users(db)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    let bookings = bookings(db);
    bookings
        .create_index(
            IndexModel::builder()
                .keys(doc! { "transactionId": 1 })
                .options(IndexOptions::builder().unique(true).sparse(true).build())
                .build(),
        )
        .await?;
    bookings
        .create_index(IndexModel::builder().keys(doc! { "package": 1, "status": 1 }).build())
        .await?;
    bookings
        .create_index(IndexModel::builder().keys(doc! { "user": 1 }).build())
        .await?;

    packages(db)
        .create_index(IndexModel::builder().keys(doc! { "createdBy": 1 }).build())
        .await?;

    Ok(())
}

/// Rewrites capitalised booking statuses left by older revisions.
pub async fn normalize_booking_statuses(db: &Database) -> Result<u64, mongodb::error::Error> {
    let collection = db.collection::<mongodb::bson::Document>(BOOKINGS);
    let mut modified = 0;

    for status in BookingStatus::ALL {
        let result = collection
            .update_many(
                doc! { "status": status.legacy_name() },
                doc! { "$set": { "status": status.as_str() } },
            )
            .await?;
        modified += result.modified_count;
    }

    let result = collection
        .update_many(
            doc! { "paymentStatus": { "$in": ["Pending", "Paid"] } },
            vec![doc! { "$set": { "paymentStatus": { "$toLower": "$paymentStatus" } } }],
        )
        .await?;

    Ok(modified + result.modified_count)
}

/// Ids of the packages an admin created.
pub async fn package_ids_created_by(
    db: &Database,
    admin: ObjectId,
) -> Result<Vec<ObjectId>, mongodb::error::Error> {
    let ids = packages(db)
        .distinct("_id", doc! { "createdBy": admin })
        .await?;
    Ok(ids.iter().filter_map(Bson::as_object_id).collect())
}

pub fn users(db: &Database) -> Collection<User> {
    db.collection(USERS)
}

pub fn destinations(db: &Database) -> Collection<Destination> {
    db.collection(DESTINATIONS)
}

pub fn packages(db: &Database) -> Collection<Package> {
    db.collection(PACKAGES)
}

pub fn bookings(db: &Database) -> Collection<Booking> {
    db.collection(BOOKINGS)
}

pub fn contacts(db: &Database) -> Collection<Contact> {
    db.collection(CONTACTS)
}

pub fn photos(db: &Database) -> Collection<Photo> {
    db.collection(PHOTOS)
}
