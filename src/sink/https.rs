//! HTTPS collector sink with client-certificate authentication

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::trace;

use super::EventSink;
use crate::config::SinkConfig;
use crate::error::{FerryError, Result};
use crate::event::AuditEvent;
use crate::tls::{load_certificate, load_identity};

/// POSTs each event as a JSON document; any non-2xx answer is a failure
#[derive(Debug, Clone)]
pub struct HttpsSink {
    client: Client,
    url: Url,
}

impl HttpsSink {
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| FerryError::Config(format!("Invalid sink URL {}: {}", config.url, e)))?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ref ca) = config.ca_path {
            builder = builder.add_root_certificate(load_certificate(ca)?);
        }
        if let (Some(cert), Some(key)) = (&config.cert_path, &config.key_path) {
            builder = builder.identity(load_identity(cert, key)?);
        }

        let client = builder
            .build()
            .map_err(|e| FerryError::Config(format!("Failed to build sink client: {}", e)))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl EventSink for HttpsSink {
    async fn send(&self, event: &AuditEvent) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(event)
            .send()
            .await
            .map_err(|e| FerryError::sink(e.to_string(), None))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.trim();
            return Err(FerryError::sink(
                format!(
                    "collector rejected event {}: {}",
                    event.id(),
                    body.chars().take(256).collect::<String>()
                ),
                Some(status.as_u16()),
            ));
        }

        trace!(event_id = %event.id(), status = status.as_u16(), "Collector accepted event");
        Ok(())
    }
}
