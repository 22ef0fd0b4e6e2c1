use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info, warn};

use tourease_api::config::AppConfig;
use tourease_api::db::bookings::MongoBookingStore;
use tourease_api::db::mongo;
use tourease_api::db::users::MongoUserDirectory;
use tourease_api::routes;
use tourease_api::services::email_service::{LogMailer, Mailer, SendGridMailer};
use tourease_api::services::image_service::ImageService;
use tourease_api::services::payment::interface::{DisabledGateway, PaymentGateway};
use tourease_api::services::payment::khalti::KhaltiGateway;
use tourease_api::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let client = mongo::create_mongo_client(&config.mongo_uri)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let db = client.database(&config.database_name);
    if let Err(e) = mongo::prepare_database(&db).await {
        error!("Failed to prepare database: {}", e);
        return Err(std::io::Error::new(std::io::ErrorKind::Other, e));
    }

    let payments: Arc<dyn PaymentGateway> = match &config.khalti {
        Some(khalti) => Arc::new(
            KhaltiGateway::new(khalti)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?,
        ),
        None => {
            warn!("KHALTI_SECRET_KEY not set, online payments are disabled");
            Arc::new(DisabledGateway)
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.email {
        Some(email) => Arc::new(SendGridMailer::new(email)),
        None => {
            warn!("SENDGRID_API_KEY not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let images = config
        .cloudinary
        .as_ref()
        .map(|cloudinary| Arc::new(ImageService::new(cloudinary)));
    if images.is_none() {
        warn!("Cloudinary credentials not set, photo uploads are disabled");
    }

    let host = config.host.clone();
    let port = config.port;
    let cors_origin = config.cors_origin.clone();

    let state = web::Data::new(AppState {
        users: Arc::new(MongoUserDirectory::new(db.clone())),
        bookings: Arc::new(MongoBookingStore::new(db.clone())),
        db,
        config: Arc::new(config),
        payments,
        mailer,
        images,
    });

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cors_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
