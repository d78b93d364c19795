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

//! Instrumented HTTP client.
//!
//! Hosts opt in by sending their requests through [`InstrumentedClient`]
//! instead of a bare `reqwest::Client`. Every request produces one batched
//! `behavior` signal named `http`; requests to the tracker's own endpoint
//! are passed through unrecorded.

use pulsetrack_core::event::{EventData, EventKind, EVENT_NAME_KEY};
use pulsetrack_core::scheduler::Scheduler;
use pulsetrack_core::{EventSender, Tracker};
use reqwest::{Client, IntoUrl, Method, Request, RequestBuilder, Response};
use serde_json::json;
use std::sync::Arc;

/// Event name of HTTP behavior signals.
pub const HTTP_EVENT: &str = "http";

/// `reqwest::Client` wrapper that reports each request.
#[derive(Clone)]
pub struct InstrumentedClient {
    client: Client,
    sender: EventSender,
    scheduler: Arc<dyn Scheduler>,
    tracker_endpoint: String,
}

impl InstrumentedClient {
    /// `tracker_endpoint` is the delivery URL; requests under it are not recorded.
    pub fn new(
        client: Client,
        sender: EventSender,
        scheduler: Arc<dyn Scheduler>,
        tracker_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            sender,
            scheduler,
            tracker_endpoint: tracker_endpoint.into(),
        }
    }

    /// Wire to a running tracker.
    pub fn for_tracker(client: Client, tracker: &Tracker) -> Self {
        let endpoint = tracker.config().server_url().to_string();
        Self::new(client, tracker.sender(), tracker.scheduler(), endpoint)
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.post(url)
    }

    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Build and execute `builder`.
    pub async fn send(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
        let request = builder.build()?;
        self.execute(request).await
    }

    /// Execute `request`, reporting its outcome.
    pub async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        let url = request.url().to_string();
        if self.is_tracker_request(&url) {
            return self.client.execute(request).await;
        }

        let method = request.method().to_string();
        let start = self.scheduler.now_ms();
        let result = self.client.execute(request).await;
        let end = self.scheduler.now_ms();

        let (success, error_msg) = match &result {
            Ok(response) => {
                let status = response.status();
                let error_msg = if status.as_u16() >= 400 {
                    format!("HTTP {}", status.as_u16())
                } else {
                    String::new()
                };
                (status.is_success(), error_msg)
            }
            Err(e) => (false, e.to_string()),
        };

        tracing::debug!(%url, %method, success, duration_ms = end.saturating_sub(start), "HTTP request recorded");
        let mut data = EventData::new();
        data.insert(EVENT_NAME_KEY.into(), json!(HTTP_EVENT));
        data.insert("type".into(), json!(HTTP_EVENT));
        data.insert("url".into(), json!(url));
        data.insert("method".into(), json!(method));
        data.insert("startTime".into(), json!(start));
        data.insert("endTime".into(), json!(end));
        data.insert("duration".into(), json!(end.saturating_sub(start)));
        data.insert("success".into(), json!(success));
        data.insert("errorMsg".into(), json!(error_msg));
        self.sender.send(EventKind::Behavior, data);

        result
    }

    fn is_tracker_request(&self, url: &str) -> bool {
        !self.tracker_endpoint.is_empty() && url.starts_with(&self.tracker_endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsetrack_core::{ManualScheduler, RawSignal};
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Answers every connection with `status_line` and an empty body.
    async fn serve(status_line: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        status_line
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr
    }

    fn client(endpoint: &str) -> (InstrumentedClient, UnboundedReceiver<RawSignal>) {
        let (sender, rx) = EventSender::channel();
        let client = InstrumentedClient::new(
            Client::new(),
            sender,
            Arc::new(ManualScheduler::new(5_000)),
            endpoint,
        );
        (client, rx)
    }

    #[tokio::test]
    async fn test_error_status_is_recorded() {
        let addr = serve("404 Not Found").await;
        let (client, mut rx) = client("http://collector.invalid/track");

        let url = format!("http://{}/missing", addr);
        let response = client.send(client.get(&url)).await.unwrap();
        assert_eq!(response.status().as_u16(), 404);

        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.kind, EventKind::Behavior);
        assert!(!signal.immediate);
        assert_eq!(signal.event_name(), Some("http"));
        assert_eq!(signal.data["url"], url);
        assert_eq!(signal.data["method"], "GET");
        assert_eq!(signal.data["success"], false);
        assert_eq!(signal.data["errorMsg"], "HTTP 404");
        assert_eq!(signal.data["startTime"], 5_000);
    }

    #[tokio::test]
    async fn test_success_has_no_error_message() {
        let addr = serve("200 OK").await;
        let (client, mut rx) = client("http://collector.invalid/track");

        client
            .send(client.post(format!("http://{}/api", addr)))
            .await
            .unwrap();

        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.data["method"], "POST");
        assert_eq!(signal.data["success"], true);
        assert_eq!(signal.data["errorMsg"], "");
    }

    #[tokio::test]
    async fn test_transport_failure_is_recorded() {
        let (client, mut rx) = client("http://collector.invalid/track");

        let result = client.send(client.get("http://127.0.0.1:1/")).await;
        assert!(result.is_err());

        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.data["success"], false);
        assert!(!signal.data["errorMsg"].as_str().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_tracker_endpoint_is_not_recorded() {
        let addr = serve("200 OK").await;
        let endpoint = format!("http://{}/track", addr);
        let (client, mut rx) = client(&endpoint);

        client.send(client.post(&endpoint)).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
