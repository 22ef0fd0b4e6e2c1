use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::TryStreamExt;
use log::{info, warn};
use mongodb::bson::{doc, oid::ObjectId};

use crate::db::mongo;
use crate::error::{AppError, AppResult};
use crate::middleware::auth_context::AdminUser;
use crate::models::photo::Photo;
use crate::routes::auth::MessageResponse;
use crate::services::upload_form::read_form;
use crate::state::AppState;

const PHOTO_FOLDER: &str = "tourease/gallery";

pub async fn upload_photo(
    state: web::Data<AppState>,
    caller: AdminUser,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let mut form = read_form(payload, 1).await?;
    let title = form.required("title")?;

    let image = form
        .take_files("image")
        .pop()
        .ok_or_else(|| AppError::bad_request("image is required"))?;

    let url = state.images()?.upload_single_image(image, PHOTO_FOLDER).await?;

    let mut photo = Photo {
        id: None,
        url,
        title,
        created_at: Some(Utc::now()),
    };
    let result = mongo::photos(&state.db).insert_one(&photo).await?;
    photo.id = result.inserted_id.as_object_id();

    info!("Gallery photo '{}' uploaded by {}", photo.title, caller.email);
    Ok(HttpResponse::Created().json(photo))
}

pub async fn list_photos(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let photos: Vec<Photo> = mongo::photos(&state.db)
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(photos))
}

pub async fn delete_photo(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = ObjectId::parse_str(path.trim())
        .map_err(|_| AppError::bad_request("Invalid photo ID"))?;

    let photos = mongo::photos(&state.db);
    let photo = photos
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::not_found("Photo not found"))?;

    match state.images.as_ref() {
        Some(images) => images.delete_image(&photo.url).await?,
        None => warn!("Image host not configured, leaving {} in place", photo.url),
    }

    photos.delete_one(doc! { "_id": id }).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Photo deleted")))
}
