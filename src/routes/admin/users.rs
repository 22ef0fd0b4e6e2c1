use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::TryStreamExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId};
use serde::Serialize;

use crate::db::mongo;
use crate::error::{AppError, AppResult};
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::user::{RoleInput, User, UserProfile};
use crate::routes::auth::MessageResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UpdateRoleResponse {
    pub success: bool,
    pub message: String,
    pub user_id: String,
    pub role: String,
}

fn parse_id(raw: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::bad_request("Invalid user ID format"))
}

pub async fn list_users(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let users: Vec<User> = mongo::users(&state.db)
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;

    let profiles: Vec<UserProfile> = users.into_iter().map(UserProfile::from).collect();
    Ok(HttpResponse::Ok().json(profiles))
}

pub async fn get_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let user = mongo::users(&state.db)
        .find_one(doc! { "_id": parse_id(&path)? })
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(HttpResponse::Ok().json(UserProfile::from(user)))
}

pub async fn delete_user(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let user_id = parse_id(&path)?;
    if user_id == caller.user_id {
        return Err(AppError::bad_request("You cannot delete your own account"));
    }

    let result = mongo::users(&state.db)
        .delete_one(doc! { "_id": user_id })
        .await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("User not found"));
    }

    info!("User {} deleted by {}", user_id, caller.email);
    Ok(HttpResponse::Ok().json(MessageResponse::new("User deleted")))
}

pub async fn update_user_role(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
    input: web::Json<RoleInput>,
) -> AppResult<HttpResponse> {
    let user_id = parse_id(&path)?;
    if user_id == caller.user_id {
        return Err(AppError::bad_request("You cannot change your own role"));
    }

    let role = input.into_inner().role;
    let result = mongo::users(&state.db)
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": {
                "role": role.as_str(),
                "updatedAt": mongo::stored_time(Utc::now()),
            } },
        )
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found("User not found"));
    }

    info!("User {} is now {} (set by {})", user_id, role.as_str(), caller.email);
    Ok(HttpResponse::Ok().json(UpdateRoleResponse {
        success: true,
        message: format!("User role updated to {}", role.as_str()),
        user_id: user_id.to_hex(),
        role: role.as_str().to_string(),
    }))
}
