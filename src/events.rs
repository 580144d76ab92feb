//! Mutation notifications
//!
//! Every successful instance create, update or delete is announced on a
//! message queue so downstream indexers can follow the triplestore.

use crate::cache::password_digest;
use crate::config::EventBusConfig;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error};

/// Attributes the gateway adds to instance documents; never part of the
/// instance data sent downstream
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "$schema",
    "@context",
    "@id",
    "@type",
    "_base_url",
    "_class_prefix",
    "_instance_prefix",
    "_resource_id",
    "_schema_url",
    "class_prefix",
    "instance_prefix",
    "links",
    "resource_id",
];

/// Notification delivery failed
#[derive(Error, Debug)]
#[error("Failed to notify event bus: {0}")]
pub struct NotificationFailure(pub String);

/// Kind of mutation being announced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Post,
    Put,
    Delete,
}

/// Message describing one instance mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub instance: String,
    #[serde(rename = "class")]
    pub klass: String,
    pub graph: String,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_data: Option<Value>,
}

/// Drop gateway bookkeeping attributes from an instance document
pub fn clean_up_reserved_attributes(data: Value) -> Value {
    match data {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !RESERVED_ATTRIBUTES.contains(&key.as_str()))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Outbound notification channel
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationFailure>;

    /// One-line health report; contains `FAILED` when the bus is unreachable
    async fn status(&self) -> String;
}

/// Bus used when notifications are switched off
#[derive(Debug, Default)]
pub struct DisabledEventBus;

#[async_trait]
impl EventBus for DisabledEventBus {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationFailure> {
        debug!(
            "Event bus disabled, not announcing {:?} of {}",
            notification.action, notification.instance
        );
        Ok(())
    }

    async fn status(&self) -> String {
        "Event bus is disabled".to_string()
    }
}

/// Broker reached through its REST message bridge
pub struct HttpEventBus {
    client: Client,
    endpoint: String,
    queue: String,
    user: Option<String>,
    password: Option<String>,
}

impl HttpEventBus {
    pub fn new(config: &EventBusConfig) -> Result<Self, NotificationFailure> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| NotificationFailure(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            queue: config.queue.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.user {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }

    pub fn queue_url(&self) -> String {
        format!("{}/{}?type=queue", self.endpoint, self.queue)
    }
}

#[async_trait]
impl EventBus for HttpEventBus {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationFailure> {
        let request = self.client.post(self.queue_url()).json(notification);
        let resp = self.authorize(request).send().await.map_err(|e| {
            error!("Event bus unreachable: {}", e);
            NotificationFailure(e.to_string())
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            error!("Event bus rejected notification: HTTP {} {}", status, body);
            return Err(NotificationFailure(format!("HTTP {}: {}", status, body)));
        }
        debug!(
            "Notified {:?} of {} on {}",
            notification.action, notification.instance, self.queue
        );
        Ok(())
    }

    async fn status(&self) -> String {
        let credentials = format!(
            "{}:{}",
            self.user.as_deref().unwrap_or(""),
            password_digest(self.password.as_deref().unwrap_or(""))
        );
        match self.authorize(self.client.get(&self.endpoint)).send().await {
            Ok(_) => format!(
                "Event bus connection authenticated [{}] | SUCCEED | {}",
                credentials, self.endpoint
            ),
            Err(e) => format!(
                "Event bus connection authenticated [{}] | FAILED | {} | {}",
                credentials, self.endpoint, e
            ),
        }
    }
}
