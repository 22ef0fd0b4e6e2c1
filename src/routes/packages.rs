use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::TryStreamExt;
use log::{info, warn};
use mongodb::bson::{doc, oid::ObjectId, Document};

use crate::db::mongo;
use crate::error::{AppError, AppResult};
use crate::middleware::auth_context::{AdminUser, AuthenticatedUser};
use crate::models::package::{ItineraryDay, Package};
use crate::routes::auth::MessageResponse;
use crate::services::upload_form::{read_form, UploadForm};
use crate::state::AppState;

const PHOTO_FOLDER: &str = "tourease/packages";
pub const MAX_PACKAGE_PHOTOS: usize = 5;

fn parse_id(raw: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::bad_request("Invalid package ID"))
}

fn parse_price(raw: &str) -> AppResult<f64> {
    match raw.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(AppError::bad_request("Price must be a non-negative number")),
    }
}

fn parse_destinations(form: &UploadForm) -> AppResult<Option<Vec<ObjectId>>> {
    let Some(raw) = form.json::<Vec<String>>("destinations")? else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Err(AppError::bad_request("At least one destination is required"));
    }

    let mut ids = Vec::with_capacity(raw.len());
    for id in raw {
        let id = ObjectId::parse_str(id.trim())
            .map_err(|_| AppError::bad_request(format!("Invalid destination ID: {}", id)))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(Some(ids))
}

fn parse_itinerary(form: &UploadForm) -> AppResult<Option<Vec<ItineraryDay>>> {
    let Some(mut days) = form.json::<Vec<ItineraryDay>>("itinerary")? else {
        return Ok(None);
    };
    if days
        .iter()
        .any(|day| day.day == 0 || day.title.trim().is_empty())
    {
        return Err(AppError::bad_request(
            "Every itinerary day needs a day number and a title",
        ));
    }
    days.sort_by_key(|day| day.day);
    Ok(Some(days))
}

async fn ensure_destinations_exist(state: &AppState, ids: &[ObjectId]) -> AppResult<()> {
    let found = mongo::destinations(&state.db)
        .count_documents(doc! { "_id": { "$in": ids.to_vec() } })
        .await?;
    if found as usize != ids.len() {
        return Err(AppError::bad_request("One or more destinations do not exist"));
    }
    Ok(())
}

async fn upload_photos(state: &AppState, form: &mut UploadForm) -> AppResult<Vec<String>> {
    let files = form.take_files("photos");
    if files.is_empty() {
        return Ok(Vec::new());
    }
    Ok(state.images()?.upload_images(files, PHOTO_FOLDER).await?)
}

async fn find_package(state: &AppState, id: ObjectId) -> AppResult<Package> {
    mongo::packages(&state.db)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::not_found("Package not found"))
}

async fn find_owned(
    state: &AppState,
    id: ObjectId,
    caller: &AuthenticatedUser,
) -> AppResult<Package> {
    let package = find_package(state, id).await?;
    if package.created_by != caller.user_id {
        return Err(AppError::forbidden("You can only modify packages you created"));
    }
    Ok(package)
}

pub async fn create_package(
    state: web::Data<AppState>,
    caller: AdminUser,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let mut form = read_form(payload, MAX_PACKAGE_PHOTOS).await?;

    let package_name = form.required("packageName")?;
    let price = parse_price(&form.required("price")?)?;
    let duration = form.required("duration")?;
    let description = form.required("description")?;
    let destinations = parse_destinations(&form)?
        .ok_or_else(|| AppError::bad_request("destinations is required"))?;
    let itinerary = parse_itinerary(&form)?.unwrap_or_default();

    ensure_destinations_exist(&state, &destinations).await?;
    let photos = upload_photos(&state, &mut form).await?;

    let now = Utc::now();
    let mut package = Package {
        id: None,
        package_name,
        price,
        duration,
        description,
        destinations,
        itinerary,
        photos,
        created_by: caller.user_id,
        created_at: Some(now),
        updated_at: Some(now),
    };

    let result = mongo::packages(&state.db).insert_one(&package).await?;
    package.id = result.inserted_id.as_object_id();
    info!("Package '{}' created by {}", package.package_name, caller.email);

    Ok(HttpResponse::Created().json(package))
}

pub async fn list_packages(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let packages: Vec<Package> = mongo::packages(&state.db)
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(packages))
}

pub async fn admin_packages(
    state: web::Data<AppState>,
    caller: AdminUser,
) -> AppResult<HttpResponse> {
    let packages: Vec<Package> = mongo::packages(&state.db)
        .find(doc! { "createdBy": caller.user_id })
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(packages))
}

pub async fn get_package(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let package = find_package(&state, parse_id(&path)?).await?;
    Ok(HttpResponse::Ok().json(package))
}

pub async fn update_package(
    state: web::Data<AppState>,
    caller: AdminUser,
    path: web::Path<String>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    find_owned(&state, id, &caller).await?;
    let mut form = read_form(payload, MAX_PACKAGE_PHOTOS).await?;

    let mut set = Document::new();
    for field in ["packageName", "duration", "description"] {
        if let Some(value) = form.text(field) {
            set.insert(field, value);
        }
    }
    if let Some(raw) = form.text("price") {
        set.insert("price", parse_price(raw)?);
    }
    if let Some(destinations) = parse_destinations(&form)? {
        ensure_destinations_exist(&state, &destinations).await?;
        set.insert("destinations", destinations);
    }
    if let Some(itinerary) = parse_itinerary(&form)? {
        let days = mongodb::bson::to_bson(&itinerary)
            .map_err(|e| AppError::Internal(format!("Failed to encode itinerary: {}", e)))?;
        set.insert("itinerary", days);
    }

    let photos = upload_photos(&state, &mut form).await?;
    if !photos.is_empty() {
        set.insert("photos", photos);
    }

    if set.is_empty() {
        return Err(AppError::bad_request("Nothing to update"));
    }
    set.insert("updatedAt", mongo::stored_time(Utc::now()));

    mongo::packages(&state.db)
        .update_one(doc! { "_id": id }, doc! { "$set": set })
        .await?;

    let package = find_package(&state, id).await?;
    Ok(HttpResponse::Ok().json(package))
}

pub async fn delete_package(
    state: web::Data<AppState>,
    caller: AdminUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    let package = find_owned(&state, id, &caller).await?;

    mongo::packages(&state.db).delete_one(doc! { "_id": id }).await?;

    if let Some(images) = state.images.as_ref() {
        for url in &package.photos {
            if let Err(e) = images.delete_image(url).await {
                warn!("Could not remove photo {} of package {}: {}", url, id, e);
            }
        }
    }

    info!("Package {} deleted by {}", id, caller.email);
    Ok(HttpResponse::Ok().json(MessageResponse::new("Package deleted")))
}
