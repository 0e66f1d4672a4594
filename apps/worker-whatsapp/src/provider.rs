use async_trait::async_trait;
use notify_domain::MessageEnvelope;
use notify_store::MessageStore;
use notify_worker_core::{ProviderClient, ProviderFailure, ProviderSuccess};
use serde_json::Value;

use crate::config::WorkerConfig;

/// WhatsApp provider client modeled on a WASender-style send API. Per-site
/// API key is resolved from the site's stored configuration, falling back
/// to the process-wide default (§4.4.1 applied to the WhatsApp channel).
pub struct WasenderClient {
    http: reqwest::Client,
    store: MessageStore,
    config: WorkerConfig,
}

impl WasenderClient {
    pub fn new(store: MessageStore, config: WorkerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("build reqwest client");
        Self { http, store, config }
    }
}

fn build_payload(envelope: &MessageEnvelope) -> Value {
    let mut body = serde_json::json!({ "to": envelope.recipient });
    if let Some(session) = &envelope.whatsapp_session_name {
        body["whatsapp_session"] = Value::String(session.clone());
    }

    if let Some(document_url) = &envelope.document_url {
        body["documentUrl"] = Value::String(document_url.clone());
        body["fileName"] = Value::String(envelope.file_name.clone().unwrap_or_default());
        body["text"] = Value::String(envelope.caption.clone().unwrap_or_else(|| envelope.body.clone()));
    } else if let Some(video_url) = &envelope.video_url {
        body["videoUrl"] = Value::String(video_url.clone());
        body["text"] = Value::String(envelope.caption.clone().unwrap_or_else(|| envelope.body.clone()));
    } else if let Some(image_url) = &envelope.image_url {
        body["imageUrl"] = Value::String(image_url.clone());
        body["text"] = Value::String(envelope.caption.clone().unwrap_or_else(|| envelope.body.clone()));
    } else {
        body["text"] = Value::String(envelope.body.clone());
    }

    body
}

#[async_trait]
impl ProviderClient for WasenderClient {
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
            .and_then(|s| s.wasender_api_key_encrypted)
            .or_else(|| self.config.default_api_key.clone())
            .ok_or_else(|| ProviderFailure {
                http_status: None,
                response_body: None,
                transport_error: Some("no wasender api key configured for site".into()),
            })?;

        let payload = build_payload(envelope);

        if self.config.provider_base_url.starts_with("mock://") {
            return Ok(ProviderSuccess {
                provider_message_id: Some(format!("mock:{}", envelope.message_id)),
            });
        }

        let response = self
            .http
            .post(format!("{}/send-message", self.config.provider_base_url))
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

        let raw: Value = response.json().await.unwrap_or(Value::Null);
        let message_id = raw
            .get("data")
            .and_then(|v| v.get("msgId"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(ProviderSuccess {
            provider_message_id: message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_domain::Channel;

    fn envelope() -> MessageEnvelope {
        MessageEnvelope {
            message_id: "MSG-1".into(),
            site_id: "SITE-1".into(),
            channel: Channel::Whatsapp,
            recipient: "15551234567".into(),
            subject: None,
            body: "hello".into(),
            from_email: None,
            from_name: None,
            is_html: false,
            image_url: None,
            video_url: None,
            document_url: None,
            file_name: None,
            caption: None,
            whatsapp_session_name: Some("conv-42".into()),
        }
    }

    #[test]
    fn text_only_payload_carries_text() {
        let payload = build_payload(&envelope());
        assert_eq!(payload["text"], "hello");
        assert_eq!(payload["whatsapp_session"], "conv-42");
        assert!(payload.get("imageUrl").is_none());
    }

    #[test]
    fn document_payload_carries_file_name_and_caption() {
        let mut env = envelope();
        env.document_url = Some("https://cdn.test/doc.pdf".into());
        env.file_name = Some("doc.pdf".into());
        env.caption = Some("see attached".into());
        let payload = build_payload(&env);
        assert_eq!(payload["documentUrl"], "https://cdn.test/doc.pdf");
        assert_eq!(payload["fileName"], "doc.pdf");
        assert_eq!(payload["text"], "see attached");
    }

    #[tokio::test]
    async fn mock_base_url_short_circuits_network_call() {
        let store = MessageStore::open_in_memory().unwrap();
        let config = WorkerConfig {
            database_path: ":memory:".into(),
            nats_url: "nats://127.0.0.1:4222".into(),
            consumer_group: "worker-whatsapp".into(),
            provider_base_url: "mock://wasender".into(),
            default_api_key: Some("default-key".into()),
            request_timeout: std::time::Duration::from_secs(30),
            inter_message_delay: std::time::Duration::from_millis(1),
        };
        let client = WasenderClient::new(store, config);
        let result = client.send(&envelope()).await.unwrap();
        assert_eq!(result.provider_message_id.as_deref(), Some("mock:MSG-1"));
    }
}
