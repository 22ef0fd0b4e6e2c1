#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use actix_web::{web, App};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;

use tourease_api::config::AppConfig;
use tourease_api::db::bookings::BookingStore;
use tourease_api::db::users::UserDirectory;
use tourease_api::error::AppResult;
use tourease_api::middleware::auth::generate_token;
use tourease_api::models::bookings::{
    Booking, BookingStatus, ContactInfo, PaymentMethod, PaymentStatus,
};
use tourease_api::models::user::{AccountStatus, Preferences, User, UserRole};
use tourease_api::routes;
use tourease_api::services::booking_workflow::apply_payment;
use tourease_api::services::email_service::{EmailError, EmailMessage, Mailer};
use tourease_api::services::payment::interface::{
    InitiatedPayment, PaymentError, PaymentGateway, PaymentLookup, PaymentPayload,
};
use tourease_api::state::AppState;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PACKAGE_NAME: &str = "Annapurna Base Camp";

/// Gateway double that answers every lookup with a fixed status and amount.
pub struct StubGateway {
    pub lookup_status: String,
    pub total_amount: i64,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn initiate(&self, payload: &PaymentPayload) -> Result<InitiatedPayment, PaymentError> {
        Ok(InitiatedPayment {
            pidx: format!("pidx-{}", payload.purchase_order_id),
            payment_url: "https://test-pay.khalti.com/?pidx=stub".to_string(),
        })
    }

    async fn lookup(&self, pidx: &str) -> Result<PaymentLookup, PaymentError> {
        Ok(PaymentLookup {
            pidx: pidx.to_string(),
            status: self.lookup_status.clone(),
            transaction_id: Some("txn-stub".to_string()),
            total_amount: self.total_amount,
            raw: serde_json::json!({
                "pidx": pidx,
                "status": self.lookup_status,
                "total_amount": self.total_amount,
            }),
        })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}

/// Mail provider that is always down.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _message: &EmailMessage) -> Result<(), EmailError> {
        Err(EmailError::RequestError("connection refused".to_string()))
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<ObjectId, User>>,
}

impl MemoryUsers {
    pub fn insert(&self, user: User) {
        if let Some(id) = user.id {
            self.users.lock().unwrap().insert(id, user);
        }
    }

    pub fn update(&self, id: ObjectId, change: impl FnOnce(&mut User)) {
        if let Some(user) = self.users.lock().unwrap().get_mut(&id) {
            change(user);
        }
    }

    pub fn remove(&self, id: ObjectId) {
        self.users.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl UserDirectory for MemoryUsers {
    async fn find_user(&self, id: ObjectId) -> AppResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }
}

/// Bookings kept in memory with the same guarded writes as the database.
#[derive(Default)]
pub struct MemoryBookings {
    bookings: Mutex<HashMap<ObjectId, Booking>>,
    packages: Mutex<HashMap<ObjectId, String>>,
}

impl MemoryBookings {
    pub fn insert(&self, booking: Booking) {
        if let Some(id) = booking.id {
            self.packages
                .lock()
                .unwrap()
                .insert(booking.package, PACKAGE_NAME.to_string());
            self.bookings.lock().unwrap().insert(id, booking);
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<Booking> {
        self.bookings.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl BookingStore for MemoryBookings {
    async fn find(&self, id: ObjectId) -> AppResult<Option<Booking>> {
        Ok(self.get(id))
    }

    async fn find_by_transaction(&self, pidx: &str) -> AppResult<Option<Booking>> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .values()
            .find(|b| b.transaction_id.as_deref() == Some(pidx))
            .cloned())
    }

    async fn transition(
        &self,
        id: ObjectId,
        owner: Option<ObjectId>,
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Booking>> {
        let mut bookings = self.bookings.lock().unwrap();
        let booking = bookings.get_mut(&id).filter(|b| {
            b.status == BookingStatus::Pending && owner.map_or(true, |owner| b.user == owner)
        });

        Ok(booking.map(|booking| {
            booking.status = to;
            booking.updated_at = Some(now);
            booking.clone()
        }))
    }

    async fn record_payment(
        &self,
        pidx: &str,
        lookup: &PaymentLookup,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Booking>> {
        let mut bookings = self.bookings.lock().unwrap();
        let booking = bookings.values_mut().find(|b| {
            b.transaction_id.as_deref() == Some(pidx) && b.payment_status == PaymentStatus::Pending
        });

        Ok(booking.map(|booking| {
            let before = booking.clone();
            apply_payment(booking, lookup, now);
            before
        }))
    }

    async fn package_name(&self, package: ObjectId) -> AppResult<Option<String>> {
        Ok(self.packages.lock().unwrap().get(&package).cloned())
    }
}

pub fn account(role: UserRole) -> User {
    User {
        id: Some(ObjectId::new()),
        name: "Asha Gurung".to_string(),
        email: format!("{}-{}@example.com", role.as_str(), ObjectId::new().to_hex()),
        password: String::new(),
        phone: None,
        address: None,
        role,
        status: AccountStatus::Active,
        preferences: Preferences::default(),
        last_login: None,
        is_account_verified: true,
        verify_otp: None,
        verify_otp_expire_at: None,
        reset_otp: None,
        reset_otp_expire_at: None,
        created_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
    }
}

/// A pending booking owned by `user`. Khalti bookings start unpaid with
/// `pidx` as their payment reference.
pub fn booking(user: ObjectId, method: PaymentMethod, pidx: Option<&str>) -> Booking {
    let (amount_paid, payment_status) = match method {
        PaymentMethod::Cash => (400.0, PaymentStatus::Paid),
        PaymentMethod::Khalti => (0.0, PaymentStatus::Pending),
    };

    Booking {
        id: Some(ObjectId::new()),
        user,
        package: ObjectId::new(),
        number_of_people: 2,
        booking_date: (Utc::now() + Duration::days(30)).date_naive(),
        contact_info: ContactInfo {
            name: "Asha Gurung".to_string(),
            email: "asha@example.com".to_string(),
            phone: "9800000000".to_string(),
            address: "Lakeside, Pokhara".to_string(),
        },
        amount_paid,
        status: BookingStatus::Pending,
        payment_method: method,
        payment_status,
        transaction_id: pidx.map(str::to_string),
        payment_details: None,
        created_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        mongo_uri: mongo_uri(),
        database_name: "tourease_integration_test".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_ttl_hours: 1,
        cookie_secure: false,
        cors_origin: "http://localhost:3000".to_string(),
        from_email: "noreply@tourease.com".to_string(),
        khalti: None,
        email: None,
        cloudinary: None,
    }
}

fn mongo_uri() -> String {
    std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

pub struct TestApp {
    pub state: AppState,
    pub users: Arc<MemoryUsers>,
    pub bookings: Arc<MemoryBookings>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_lookup_status("Pending").await
    }

    pub async fn with_lookup_status(status: &str) -> Self {
        Self::with_gateway(status, 0).await
    }

    /// Accounts and the booking workflow run against in-memory stores. The
    /// driver connects lazily, so the remaining routes only need a server
    /// once they actually query.
    pub async fn with_gateway(status: &str, total_amount: i64) -> Self {
        let config = test_config();
        let client = mongodb::Client::with_uri_str(&config.mongo_uri)
            .await
            .expect("mongodb uri parses");
        let db = client.database(&config.database_name);

        let users = Arc::new(MemoryUsers::default());
        let bookings = Arc::new(MemoryBookings::default());
        let mailer = Arc::new(RecordingMailer::default());

        let state = AppState {
            db,
            config: Arc::new(config),
            users: users.clone(),
            bookings: bookings.clone(),
            payments: Arc::new(StubGateway {
                lookup_status: status.to_string(),
                total_amount,
            }),
            mailer: mailer.clone(),
            images: None,
        };
        Self {
            state,
            users,
            bookings,
            mailer,
        }
    }

    pub fn with_failing_mailer(mut self) -> Self {
        self.state.mailer = Arc::new(FailingMailer);
        self
    }

    pub fn create_app(
        &self,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::new(self.state.clone()))
            .configure(routes::configure)
    }

    /// Stores a fresh active account and returns its id.
    pub fn register(&self, role: UserRole) -> ObjectId {
        let user = account(role);
        let id = user.id.expect("account has an id");
        self.users.insert(user);
        id
    }

    /// A token for an existing account. The claims name `role`, whatever
    /// the account holds now.
    pub fn token_as(&self, id: ObjectId, role: UserRole) -> String {
        generate_token(&self.state.config, "someone@example.com", id, role)
            .expect("token is issued")
    }

    pub fn token_for(&self, role: UserRole) -> String {
        let id = self.register(role);
        self.token_as(id, role)
    }

    pub fn bearer(&self, role: UserRole) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token_for(role)))
    }

    pub fn bearer_as(&self, id: ObjectId, role: UserRole) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token_as(id, role)))
    }
}
