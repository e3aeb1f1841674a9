use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};

use super::error::ApiError;
use super::types::{ErrorBody, StatusUpdate};
use crate::offline::{QueuedSale, SaleSubmitter};
use crate::state_machine::Job;

/// Client for the business backend's job and sales endpoints.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /jobs/{id}`
    pub async fn get_job(&self, id: &str) -> Result<Job, ApiError> {
        let request = self.client.get(format!("{}/jobs/{id}", self.base_url));
        let response = self.authorized(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::JobNotFound(id.to_string()));
        }
        let job = check(response).await?.json::<Job>().await?;
        Ok(job)
    }

    /// `PATCH /jobs/{id}` with the job's current status and full history.
    pub async fn update_job_status(&self, job: &Job) -> Result<(), ApiError> {
        let request = self
            .client
            .patch(format!("{}/jobs/{}", self.base_url, job.id))
            .json(&StatusUpdate::from(job));
        let response = self.authorized(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::JobNotFound(job.id.clone()));
        }
        check(response).await?;
        Ok(())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl SaleSubmitter for ApiClient {
    type Error = ApiError;

    /// `POST /sales` with the captured payload. The queue id doubles as an
    /// idempotency key so a replay the server already accepted is not
    /// booked twice.
    async fn submit_sale(&self, sale: &QueuedSale) -> Result<(), ApiError> {
        let request = self
            .client
            .post(format!("{}/sales", self.base_url))
            .header("Idempotency-Key", &sale.id)
            .header("X-Offline-Captured-At", sale.timestamp.to_rfc3339())
            .json(&sale.payload);
        let response = self.authorized(request).send().await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1000))
            .unwrap_or(1000);
        return Err(ApiError::RateLimited { retry_after_ms });
    }

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}
