use async_trait::async_trait;
use notify_domain::MessageEnvelope;
use notify_store::MessageStore;
use notify_worker_core::{ProviderClient, ProviderFailure, ProviderSuccess};
use serde_json::Value;

use crate::config::WorkerConfig;

/// Email provider client modeled on a SendGrid-style transactional send API.
/// Per-site from-address/API key are resolved from the site's stored
/// configuration, falling back to process-wide defaults (§4.4.1).
pub struct SendgridClient {
    http: reqwest::Client,
    store: MessageStore,
    config: WorkerConfig,
}

impl SendgridClient {
    pub fn new(store: MessageStore, config: WorkerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("build reqwest client");
        Self { http, store, config }
    }
}

#[async_trait]
impl ProviderClient for SendgridClient {
    async fn send(&self, envelope: &MessageEnvelope) -> Result<ProviderSuccess, ProviderFailure> {
        let site = self
            .store
            .get_site(&envelope.site_id)
            .await
            .map_err(|err| ProviderFailure {
                http_status: None,
                response_body: None,
                transport_error: Some(err.to_string()),
            })?;

        let api_key = site
            .as_ref()
            .and_then(|s| s.sendgrid_api_key_encrypted.clone())
            .or_else(|| self.config.default_api_key.clone())
            .ok_or_else(|| ProviderFailure {
                http_status: None,
                response_body: None,
                transport_error: Some("no sendgrid api key configured for site".into()),
            })?;

        let from_email = envelope
            .from_email
            .clone()
            .or_else(|| site.as_ref().and_then(|s| s.sendgrid_from_email.clone()))
            .unwrap_or_else(|| self.config.default_from_email.clone());
        let from_name = envelope
            .from_name
            .clone()
            .or_else(|| site.as_ref().and_then(|s| s.sendgrid_from_name.clone()))
            .unwrap_or_else(|| self.config.default_from_name.clone());

        let payload = serde_json::json!({
            "personalizations": [{ "to": [{ "email": envelope.recipient }] }],
            "from": { "email": from_email, "name": from_name },
            "subject": envelope.subject.clone().unwrap_or_default(),
            "content": [{
                "type": if envelope.is_html { "text/html" } else { "text/plain" },
                "value": envelope.body,
            }],
        });

        if self.config.provider_base_url.starts_with("mock://") {
            return Ok(ProviderSuccess {
                provider_message_id: Some(format!("mock:{}", envelope.message_id)),
            });
        }

        let response = self
            .http
            .post(format!("{}/mail/send", self.config.provider_base_url))
            .bearer_auth(&api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ProviderFailure {
                http_status: err.status().map(|s| s.as_u16()),
                response_body: None,
                transport_error: Some(err.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ProviderFailure {
                http_status: Some(status.as_u16()),
                response_body: Some(body_text),
                transport_error: None,
            });
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let _: Value = response.json().await.unwrap_or(Value::Null);

        Ok(ProviderSuccess {
            provider_message_id: message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_domain::{Channel, NewMessage};
    use std::collections::HashMap;

    fn worker_config(base_url: &str) -> WorkerConfig {
        WorkerConfig {
            database_path: ":memory:".into(),
            nats_url: "nats://127.0.0.1:4222".into(),
            consumer_group: "worker-email".into(),
            provider_base_url: base_url.into(),
            default_api_key: Some("default-key".into()),
            default_from_email: "noreply@notify.test".into(),
            default_from_name: "Notify Platform".into(),
            request_timeout: std::time::Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn mock_base_url_short_circuits_network_call() {
        let store = MessageStore::open_in_memory().unwrap();
        let (site_id, _) = store.register_site("acme".into()).await.unwrap();
        let (message_id, _) = store
            .create_message(NewMessage {
                site_id: site_id.clone(),
                channel: Channel::Email,
                recipient: "u@x.test".into(),
                subject: Some("hi".into()),
                body: "hello".into(),
                from_email: None,
                from_name: None,
                is_html: false,
                image_url: None,
                video_url: None,
                document_url: None,
                file_name: None,
                caption: None,
                metadata: HashMap::new(),
                scheduled_at: None,
                whatsapp_session_name: None,
            })
            .await
            .unwrap();

        let client = SendgridClient::new(store, worker_config("mock://sendgrid"));
        let envelope = MessageEnvelope {
            message_id: message_id.clone(),
            site_id,
            channel: Channel::Email,
            recipient: "u@x.test".into(),
            subject: Some("hi".into()),
            body: "hello".into(),
            from_email: None,
            from_name: None,
            is_html: false,
            image_url: None,
            video_url: None,
            document_url: None,
            file_name: None,
            caption: None,
            whatsapp_session_name: None,
        };

        let result = client.send(&envelope).await.unwrap();
        assert_eq!(result.provider_message_id.as_deref(), Some(format!("mock:{message_id}")).as_deref());
    }
}
