use std::collections::HashMap;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::TryStreamExt;
use log::{info, warn};
use mongodb::bson::{doc, oid::ObjectId, Document};

use crate::db::mongo;
use crate::error::{AppError, AppResult};
use crate::middleware::auth_context::{AdminUser, AuthenticatedUser};
use crate::models::destination::{Category, Destination, Review, ReviewInput};
use crate::models::user::User;
use crate::routes::auth::MessageResponse;
use crate::services::review_service::{rank_reviews, reviewer_ids, validate_review, TOP_REVIEWS};
use crate::services::upload_form::{read_form, UploadForm};
use crate::state::AppState;

const PHOTO_FOLDER: &str = "tourease/destinations";
pub const MAX_DESTINATION_PHOTOS: usize = 10;

fn parse_id(raw: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::bad_request("Invalid destination ID"))
}

fn parse_category(raw: &str) -> AppResult<Category> {
    Category::parse(raw).ok_or_else(|| {
        AppError::bad_request(
            "Category must be one of Mountains, Wildlife, Heritage, Lakes, Adventure",
        )
    })
}

async fn find_destination(state: &AppState, id: ObjectId) -> AppResult<Destination> {
    mongo::destinations(&state.db)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::not_found("Destination not found"))
}

async fn find_owned(
    state: &AppState,
    id: ObjectId,
    caller: &AuthenticatedUser,
) -> AppResult<Destination> {
    let destination = find_destination(state, id).await?;
    if destination.created_by != caller.user_id {
        return Err(AppError::forbidden("You can only modify destinations you created"));
    }
    Ok(destination)
}

async fn upload_photos(state: &AppState, form: &mut UploadForm) -> AppResult<Vec<String>> {
    let files = form.take_files("photos");
    if files.is_empty() {
        return Ok(Vec::new());
    }
    Ok(state.images()?.upload_images(files, PHOTO_FOLDER).await?)
}

pub async fn create_destination(
    state: web::Data<AppState>,
    caller: AdminUser,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let mut form = read_form(payload, MAX_DESTINATION_PHOTOS).await?;

    let place_name = form.required("placeName")?;
    let location = form.required("location")?;
    let information = form.required("information")?;
    let category = parse_category(&form.required("category")?)?;

    let photos = upload_photos(&state, &mut form).await?;
    if photos.is_empty() {
        return Err(AppError::bad_request("At least one photo is required"));
    }

    let now = Utc::now();
    let mut destination = Destination {
        id: None,
        place_name,
        location,
        photos,
        reviews: Vec::new(),
        information,
        category,
        created_by: caller.user_id,
        created_at: Some(now),
        updated_at: Some(now),
    };

    let result = mongo::destinations(&state.db).insert_one(&destination).await?;
    destination.id = result.inserted_id.as_object_id();
    info!("Destination '{}' created by {}", destination.place_name, caller.email);

    Ok(HttpResponse::Created().json(destination))
}

pub async fn list_destinations(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let destinations: Vec<Destination> = mongo::destinations(&state.db)
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(destinations))
}

pub async fn admin_destinations(
    state: web::Data<AppState>,
    caller: AdminUser,
) -> AppResult<HttpResponse> {
    let destinations: Vec<Destination> = mongo::destinations(&state.db)
        .find(doc! { "createdBy": caller.user_id })
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(destinations))
}

pub async fn get_destination(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let destination = find_destination(&state, parse_id(&path)?).await?;
    Ok(HttpResponse::Ok().json(destination))
}

pub async fn update_destination(
    state: web::Data<AppState>,
    caller: AdminUser,
    path: web::Path<String>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    find_owned(&state, id, &caller).await?;
    let mut form = read_form(payload, MAX_DESTINATION_PHOTOS).await?;

    let mut set = Document::new();
    for field in ["placeName", "location", "information"] {
        if let Some(value) = form.text(field) {
            set.insert(field, value);
        }
    }
    if let Some(raw) = form.text("category") {
        set.insert("category", parse_category(raw)?.as_str());
    }

    let photos = upload_photos(&state, &mut form).await?;
    if !photos.is_empty() {
        set.insert("photos", photos);
    }

    if set.is_empty() {
        return Err(AppError::bad_request("Nothing to update"));
    }
    set.insert("updatedAt", mongo::stored_time(Utc::now()));

    mongo::destinations(&state.db)
        .update_one(doc! { "_id": id }, doc! { "$set": set })
        .await?;

    let destination = find_destination(&state, id).await?;
    Ok(HttpResponse::Ok().json(destination))
}

pub async fn delete_destination(
    state: web::Data<AppState>,
    caller: AdminUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    let destination = find_owned(&state, id, &caller).await?;

    mongo::destinations(&state.db)
        .delete_one(doc! { "_id": id })
        .await?;

    if let Some(images) = state.images.as_ref() {
        for url in &destination.photos {
            if let Err(e) = images.delete_image(url).await {
                warn!("Could not remove photo {} of destination {}: {}", url, id, e);
            }
        }
    }

    info!("Destination {} deleted by {}", id, caller.email);
    Ok(HttpResponse::Ok().json(MessageResponse::new("Destination deleted")))
}

pub async fn add_review(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
    input: web::Json<ReviewInput>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    let (rating, comment) = validate_review(&input)?;

    let review = Review {
        user: caller.user_id,
        rating,
        comment,
        created_at: Utc::now(),
    };
    let review_doc = mongodb::bson::to_document(&review)
        .map_err(|e| AppError::Internal(format!("Failed to encode review: {}", e)))?;

    let result = mongo::destinations(&state.db)
        .update_one(doc! { "_id": id }, doc! { "$push": { "reviews": review_doc } })
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found("Destination not found"));
    }

    Ok(HttpResponse::Created().json(review))
}

pub async fn highest_rated_reviews(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let destinations: Vec<Destination> = mongo::destinations(&state.db)
        .find(doc! { "reviews.0": { "$exists": true } })
        .await?
        .try_collect()
        .await?;

    let ids = reviewer_ids(&destinations);
    let users: Vec<User> = if ids.is_empty() {
        Vec::new()
    } else {
        mongo::users(&state.db)
            .find(doc! { "_id": { "$in": ids } })
            .await?
            .try_collect()
            .await?
    };
    let reviewers: HashMap<ObjectId, String> = users
        .into_iter()
        .filter_map(|user| user.id.map(|id| (id, user.name)))
        .collect();

    Ok(HttpResponse::Ok().json(rank_reviews(&destinations, &reviewers, TOP_REVIEWS)))
}
