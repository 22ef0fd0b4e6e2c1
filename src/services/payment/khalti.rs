//! Khalti ePayment client.
//!
//! Every call has a bounded timeout. Transient failures (network errors,
//! timeouts, 5xx) are retried a few times with a short backoff; answers the
//! gateway gave on purpose are returned as-is.

use async_trait::async_trait;
use log::warn;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::config::{KhaltiConfig, MAX_KHALTI_RETRIES};

use super::interface::{
    InitiatedPayment, PaymentError, PaymentGateway, PaymentLookup, PaymentPayload,
};

const BASE_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct KhaltiGateway {
    client: Client,
    secret_key: String,
    base_url: String,
    max_retries: u32,
    backoff: Duration,
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    pidx: &'a str,
}

#[derive(Deserialize)]
struct LookupBody {
    pidx: String,
    status: String,
    transaction_id: Option<String>,
    #[serde(default)]
    total_amount: i64,
}

impl KhaltiGateway {
    pub fn new(config: &KhaltiConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries.min(MAX_KHALTI_RETRIES),
            backoff: BASE_BACKOFF,
        })
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, PaymentError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            match self.post_once(path, body).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "Khalti {} failed (attempt {}/{}): {}",
                        path,
                        attempt,
                        self.max_retries + 1,
                        err
                    );
                    let delay = self.backoff.saturating_mul(2u32.saturating_pow(attempt - 1));
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn post_once<B, R>(&self, path: &str, body: &B) -> Result<R, PaymentError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{}/", self.base_url, path))
            .header("Authorization", format!("key {}", self.secret_key))
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::RequestFailed(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json::<R>()
                .await
                .map_err(|e| PaymentError::ResponseParseFailed(e.to_string())),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(PaymentError::ApiError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for KhaltiGateway {
    async fn initiate(&self, payload: &PaymentPayload) -> Result<InitiatedPayment, PaymentError> {
        self.post("epayment/initiate", payload).await
    }

    async fn lookup(&self, pidx: &str) -> Result<PaymentLookup, PaymentError> {
        let raw: serde_json::Value = self.post("epayment/lookup", &LookupRequest { pidx }).await?;
        let body: LookupBody = serde_json::from_value(raw.clone())
            .map_err(|e| PaymentError::ResponseParseFailed(e.to_string()))?;

        Ok(PaymentLookup {
            pidx: body.pidx,
            status: body.status,
            transaction_id: body.transaction_id,
            total_amount: body.total_amount,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::payment::interface::CustomerInfo;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer, max_retries: u32) -> KhaltiGateway {
        let config = KhaltiConfig {
            secret_key: "test_secret".to_string(),
            base_url: server.uri(),
            return_url: "http://localhost:3000/payment/return".to_string(),
            website_url: "http://localhost:3000".to_string(),
            timeout: Duration::from_secs(2),
            max_retries,
        };
        KhaltiGateway::new(&config)
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn lookup_reports_completed_payment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/epayment/lookup/"))
            .and(header("Authorization", "key test_secret"))
            .and(body_json(json!({ "pidx": "abc123" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pidx": "abc123",
                "total_amount": 20000,
                "status": "Completed",
                "transaction_id": "GFq9PFS7b2iYvL8Lir9oXe",
                "fee": 0,
                "refunded": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let lookup = gateway(&server, 2).lookup("abc123").await.unwrap();
        assert!(lookup.is_completed());
        assert_eq!(lookup.total_amount, 20000);
        assert_eq!(lookup.raw["fee"], 0);
    }

    #[tokio::test]
    async fn declined_payment_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/epayment/lookup/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error_key": "validation_error",
                "detail": "Not found."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = gateway(&server, 3).lookup("missing").await.unwrap_err();
        assert!(matches!(err, PaymentError::ApiError { status: 400, .. }));
    }

    #[tokio::test]
    async fn server_errors_exhaust_the_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/epayment/lookup/"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = gateway(&server, 2).lookup("abc123").await.unwrap_err();
        assert!(matches!(err, PaymentError::ApiError { status: 503, .. }));
    }

    #[tokio::test]
    async fn oversized_retry_budget_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/epayment/lookup/"))
            .respond_with(ResponseTemplate::new(503))
            .expect(u64::from(MAX_KHALTI_RETRIES) + 1)
            .mount(&server)
            .await;

        let err = gateway(&server, 40).lookup("abc123").await.unwrap_err();
        assert!(matches!(err, PaymentError::ApiError { status: 503, .. }));
    }

    #[tokio::test]
    async fn recovers_after_a_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/epayment/lookup/"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/epayment/lookup/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pidx": "abc123",
                "total_amount": 1000,
                "status": "Pending",
                "transaction_id": null
            })))
            .mount(&server)
            .await;

        let lookup = gateway(&server, 2).lookup("abc123").await.unwrap();
        assert_eq!(lookup.status, "Pending");
        assert!(!lookup.is_completed());
    }

    #[tokio::test]
    async fn initiate_returns_payment_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/epayment/initiate/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pidx": "bZQLD9wRVWo4CdESSfuSsB",
                "payment_url": "https://test-pay.khalti.com/?pidx=bZQLD9wRVWo4CdESSfuSsB",
                "expires_at": "2030-01-01T00:00:00+05:45",
                "expires_in": 1800
            })))
            .mount(&server)
            .await;

        let payload = PaymentPayload {
            return_url: "http://localhost:3000/payment/return".to_string(),
            website_url: "http://localhost:3000".to_string(),
            amount: 20000,
            purchase_order_id: "65f0c0ffee0000000000abcd".to_string(),
            purchase_order_name: "Annapurna Base Camp".to_string(),
            customer_info: CustomerInfo {
                name: "Asha".to_string(),
                email: "asha@example.com".to_string(),
                phone: "9800000000".to_string(),
            },
        };

        let initiated = gateway(&server, 0).initiate(&payload).await.unwrap();
        assert_eq!(initiated.pidx, "bZQLD9wRVWo4CdESSfuSsB");
        assert!(initiated.payment_url.contains("pidx="));
    }
}
