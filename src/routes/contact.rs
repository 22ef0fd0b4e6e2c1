use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};

use crate::db::mongo;
use crate::middleware::auth_context::AdminUser;
use crate::error::{AppError, AppResult};
use crate::models::contact::{Contact, ContactInput};
use crate::routes::auth::MessageResponse;
use crate::services::account_service::{is_valid_email, normalize_email};
use crate::state::AppState;

fn required(value: Option<String>, name: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("{} is required", name)))
}

pub async fn send_message(
    state: web::Data<AppState>,
    input: web::Json<ContactInput>,
) -> AppResult<HttpResponse> {
    let input = input.into_inner();
    let name = required(input.name, "name")?;
    let email = normalize_email(&required(input.email, "email")?);
    let message = required(input.message, "message")?;

    if !is_valid_email(&email) {
        return Err(AppError::bad_request("Invalid email address"));
    }

    let mut contact = Contact {
        id: None,
        name,
        email,
        message,
        created_at: Some(Utc::now()),
    };
    let result = mongo::contacts(&state.db).insert_one(&contact).await?;
    contact.id = result.inserted_id.as_object_id();

    Ok(HttpResponse::Created().json(contact))
}

pub async fn list_messages(
    state: web::Data<AppState>,
    _admin: AdminUser,
) -> AppResult<HttpResponse> {
    let messages: Vec<Contact> = mongo::contacts(&state.db)
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(messages))
}

pub async fn delete_message(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = ObjectId::parse_str(path.trim())
        .map_err(|_| AppError::bad_request("Invalid message ID"))?;

    let result = mongo::contacts(&state.db)
        .delete_one(doc! { "_id": id })
        .await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("Message not found"));
    }
    Ok(HttpResponse::Ok().json(MessageResponse::new("Message deleted")))
}
