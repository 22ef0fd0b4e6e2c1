use actix_web::{web, HttpResponse};
use log::error;
use mongodb::bson::doc;
use serde::Serialize;
use std::collections::HashMap;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthStatus {
    status: String,
    services: HashMap<String, ServiceStatus>,
    version: String,
}

#[derive(Serialize, Clone)]
struct ServiceStatus {
    status: String,
    details: Option<String>,
}

impl ServiceStatus {
    fn ok(details: impl Into<String>) -> Self {
        ServiceStatus {
            status: "ok".to_string(),
            details: Some(details.into()),
        }
    }

    fn disabled(details: impl Into<String>) -> Self {
        ServiceStatus {
            status: "disabled".to_string(),
            details: Some(details.into()),
        }
    }
}

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let mut health = HealthStatus {
        status: "ok".to_string(),
        services: HashMap::new(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let mongo_result = check_mongodb(&state).await;
    if mongo_result.status != "ok" {
        health.status = "degraded".to_string();
    }
    health.services.insert("mongodb".to_string(), mongo_result);

    // Optional collaborators only report whether they are configured
    let config = &state.config;
    health.services.insert(
        "khalti".to_string(),
        match &config.khalti {
            Some(khalti) => ServiceStatus::ok(format!("Gateway at {}", khalti.base_url)),
            None => ServiceStatus::disabled("KHALTI_SECRET_KEY not configured"),
        },
    );
    health.services.insert(
        "email".to_string(),
        match &config.email {
            Some(email) => ServiceStatus::ok(format!("Sending as {}", email.from_email)),
            None => ServiceStatus::disabled("SENDGRID_API_KEY not configured, mail is only logged"),
        },
    );
    health.services.insert(
        "cloudinary".to_string(),
        match &config.cloudinary {
            Some(cloudinary) => ServiceStatus::ok(format!("Cloud {}", cloudinary.cloud_name)),
            None => ServiceStatus::disabled("Cloudinary credentials not configured"),
        },
    );

    let mut response = if health.status == "ok" {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };
    response.json(health)
}

async fn check_mongodb(state: &AppState) -> ServiceStatus {
    match state.db.run_command(doc! { "ping": 1 }).await {
        Ok(_) => ServiceStatus::ok(format!("Connected to database '{}'", state.db.name())),
        Err(e) => {
            error!("MongoDB health check failed: {}", e);
            ServiceStatus {
                status: "error".to_string(),
                details: Some("Database unreachable".to_string()),
            }
        }
    }
}
