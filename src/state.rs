use std::sync::Arc;

use mongodb::Database;

use crate::config::AppConfig;
use crate::db::bookings::BookingStore;
use crate::db::users::UserDirectory;
use crate::services::email_service::Mailer;
use crate::services::image_service::ImageService;
use crate::services::payment::interface::PaymentGateway;

/// Shared by every worker through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserDirectory>,
    pub bookings: Arc<dyn BookingStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub images: Option<Arc<ImageService>>,
}

impl AppState {
    pub fn images(&self) -> Result<&ImageService, crate::error::AppError> {
        self.images
            .as_deref()
            .ok_or_else(|| crate::error::AppError::Internal("Image host is not configured".to_string()))
    }
}
