//! Client for the counseling schedule endpoint.

use std::time::Duration;

use reqwest::{header, Client, Url};
use tracing::{debug, warn};

use crate::calendar::AvailabilityCalendar;
use crate::config::REQUEST_TIMEOUT_SECS;
use crate::models::AvailabilityResponse;

use super::ApiError;

/// Client for the schedule endpoint.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AvailabilityClient {
    client: Client,
    endpoint: Url,
}

impl AvailabilityClient {
    pub fn new(endpoint: Url) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Fetch the day list. One attempt, no retry.
    pub async fn fetch_days(&self) -> Result<AvailabilityResponse, ApiError> {
        let result = self.try_fetch_days().await;
        if let Err(ref e) = result {
            warn!(endpoint = %self.endpoint, error = %e, "Failed to load counseling schedule");
        }
        result
    }

    async fn try_fetch_days(&self) -> Result<AvailabilityResponse, ApiError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = Self::check_response(response).await?;

        let text = response.text().await?;
        let parsed: AvailabilityResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse schedule: {}", e)))?;
        debug!(days = parsed.days.len(), "Loaded counseling schedule");
        Ok(parsed)
    }

    /// Fetch the day list and build the date-keyed calendar from it.
    pub async fn load_calendar(&self) -> Result<AvailabilityCalendar, ApiError> {
        self.fetch_days().await.map(AvailabilityCalendar::from_response)
    }
}
