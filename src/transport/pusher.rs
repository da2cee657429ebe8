use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Method, Response};

use crate::config::PusherConfig;
use crate::error::AppError;
use crate::metrics::DeliveryMetrics;
use crate::webhook::WebhookPayload;

use super::signature::{signed_query, validate_webhook};
use super::{ChannelsInfo, Transport, TransportError, TriggerRequest};

/// Pusher Channels HTTP API client.
pub struct PusherClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    key: String,
    secret: String,
}

impl PusherClient {
    pub fn new(config: &PusherConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            app_id: config.app_id.clone(),
            key: config.key.clone(),
            secret: config.secret.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Response, TransportError> {
        let timestamp = chrono::Utc::now().timestamp();
        let query = signed_query(
            method.as_str(),
            path,
            &self.key,
            &self.secret,
            timestamp,
            body.as_deref(),
        )
        .map_err(|e| TransportError::Signing(e.to_string()))?;

        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .query(&query);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let start = Instant::now();
        let response = request.send().await?;
        DeliveryMetrics::observe_latency(start.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for PusherClient {
    #[tracing::instrument(
        name = "transport.trigger",
        skip(self, request),
        fields(event_name = %request.name, channels = request.channels.len())
    )]
    async fn trigger(&self, request: &TriggerRequest) -> Result<(), TransportError> {
        let path = format!("/apps/{}/events", self.app_id);
        let body = serde_json::to_vec(request)?;

        self.send(Method::POST, &path, Some(body))
            .await
            .inspect_err(|_| DeliveryMetrics::record_transport_error("trigger"))?;

        tracing::debug!("Event triggered");
        Ok(())
    }

    #[tracing::instrument(name = "transport.channels_info", skip(self))]
    async fn channels_info(&self) -> Result<ChannelsInfo, TransportError> {
        let path = format!("/apps/{}/channels", self.app_id);

        let response = self
            .send(Method::GET, &path, None)
            .await
            .inspect_err(|_| DeliveryMetrics::record_transport_error("channels_info"))?;
        let info: ChannelsInfo = response.json().await?;

        tracing::debug!(occupied = info.channels.len(), "Channel list fetched");
        Ok(info)
    }

    fn validate_webhook(
        &self,
        key: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookPayload, AppError> {
        validate_webhook(&self.key, &self.secret, key, signature, body)
    }
}
