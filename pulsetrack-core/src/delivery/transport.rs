// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Delivery sink abstraction and the HTTP implementation.

use super::DeliveryUnit;
use crate::config::TrackerConfig;
use crate::error::DeliveryError;
use async_trait::async_trait;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Sends one delivery unit to the collection endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, unit: &DeliveryUnit) -> Result<(), DeliveryError>;
}

/// POSTs units as JSON: one object for a single event, an array for a batch.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &TrackerConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(
            client,
            config.server_url(),
            config.api_key(),
        ))
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, unit: &DeliveryUnit) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(unit)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(events = unit.event_count(), "Delivered to collector");
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}
