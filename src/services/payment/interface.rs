use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment gateway is not configured")]
    NotConfigured,
    #[error("Request to payment gateway failed: {0}")]
    RequestFailed(String),
    #[error("Payment gateway returned status {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("Could not parse payment gateway response: {0}")]
    ResponseParseFailed(String),
}

impl PaymentError {
    /// Network trouble and gateway-side 5xx are worth another attempt.
    /// Anything the gateway answered deliberately is not.
    pub fn is_transient(&self) -> bool {
        match self {
            PaymentError::RequestFailed(_) => true,
            PaymentError::ApiError { status, .. } => *status >= 500,
            PaymentError::NotConfigured | PaymentError::ResponseParseFailed(_) => false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// What the client needs to hand the customer over to the hosted payment page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaymentPayload {
    pub return_url: String,
    pub website_url: String,
    /// Amount in minor units (paisa).
    pub amount: i64,
    pub purchase_order_id: String,
    pub purchase_order_name: String,
    pub customer_info: CustomerInfo,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InitiatedPayment {
    pub pidx: String,
    pub payment_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaymentLookup {
    pub pidx: String,
    pub status: String,
    pub transaction_id: Option<String>,
    /// Amount in minor units (paisa).
    pub total_amount: i64,
    /// Raw gateway response, kept for audit.
    pub raw: serde_json::Value,
}

impl PaymentLookup {
    pub fn is_completed(&self) -> bool {
        self.status == "Completed"
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, payload: &PaymentPayload) -> Result<InitiatedPayment, PaymentError>;
    async fn lookup(&self, pidx: &str) -> Result<PaymentLookup, PaymentError>;
}

/// Used when no gateway credentials are configured. Every call fails.
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn initiate(&self, _payload: &PaymentPayload) -> Result<InitiatedPayment, PaymentError> {
        Err(PaymentError::NotConfigured)
    }

    async fn lookup(&self, _pidx: &str) -> Result<PaymentLookup, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}
