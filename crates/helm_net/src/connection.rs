//! NATS connection management.

use async_nats::Subject;
use async_nats::subject::ToSubject;
use serde::Serialize;
use tracing::{debug, info};

use crate::codec::Codec;
use crate::error::NetError;
use crate::messages::ApiResponse;

pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// Environment variable overriding the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// An `async-nats` client with helm-specific helpers.
#[derive(Debug, Clone)]
pub struct NatsConnection {
    client: async_nats::Client,
}

impl NatsConnection {
    /// Connect to `$NATS_URL`, falling back to [`DEFAULT_NATS_URL`].
    pub async fn connect() -> Result<Self, NetError> {
        let url = std::env::var(NATS_URL_ENV).unwrap_or_else(|_| DEFAULT_NATS_URL.to_string());
        Self::connect_to(&url).await
    }

    /// Connect to `url`.
    pub async fn connect_to(url: &str) -> Result<Self, NetError> {
        info!(url, "connecting to NATS");
        let client = async_nats::connect(url).await?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// The underlying client.
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Encode `message` with `codec` and publish it.
    pub async fn publish<T: Serialize>(
        &self,
        subject: impl ToSubject,
        codec: Codec,
        message: &T,
    ) -> Result<(), NetError> {
        let payload = codec.encode(message)?;
        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }

    /// Answer a request on its reply inbox. Requests without one (plain
    /// publishes) are acknowledged silently.
    pub async fn reply(
        &self,
        reply_to: Option<Subject>,
        response: &ApiResponse,
    ) -> Result<(), NetError> {
        match reply_to {
            Some(inbox) => {
                self.client
                    .publish(inbox, response.to_bytes().into())
                    .await?;
                Ok(())
            }
            None => {
                debug!("request had no reply subject");
                Ok(())
            }
        }
    }

    /// Subscribe to `subject`.
    pub async fn subscribe(
        &self,
        subject: impl ToSubject,
    ) -> Result<async_nats::Subscriber, NetError> {
        Ok(self.client.subscribe(subject).await?)
    }
}
