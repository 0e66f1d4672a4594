use async_trait::async_trait;
use notify_domain::MessageEnvelope;
use notify_session_sequencer::{session_key, SessionSequencer};
use notify_worker_core::{ProviderClient, ProviderFailure, ProviderSuccess};

/// Wraps a `ProviderClient` so every send is serialized per session and
/// followed by the mandatory inter-message delay (§4.4.2), regardless of
/// which concrete provider implementation is underneath.
pub struct SequencedProvider<P> {
    inner: P,
    sequencer: SessionSequencer,
}

impl<P> SequencedProvider<P>
where
    P: ProviderClient,
{
    pub fn new(inner: P, sequencer: SessionSequencer) -> Self {
        Self { inner, sequencer }
    }
}

#[async_trait]
impl<P> ProviderClient for SequencedProvider<P>
where
    P: ProviderClient,
{
    async fn send(&self, envelope: &MessageEnvelope) -> Result<ProviderSuccess, ProviderFailure> {
        let key = session_key(envelope.whatsapp_session_name.as_deref(), &envelope.site_id);
        self.sequencer
            .run(&key, || self.inner.send(envelope))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use notify_domain::Channel;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingProvider {
        concurrent: Arc<AtomicU32>,
        max_concurrent: Arc<AtomicU32>,
    }

    #[async_trait]
    impl ProviderClient for CountingProvider {
        async fn send(&self, _envelope: &MessageEnvelope) -> Result<ProviderSuccess, ProviderFailure> {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);
            Ok(ProviderSuccess::default())
        }
    }

    fn envelope(session: &str) -> MessageEnvelope {
        MessageEnvelope {
            message_id: "MSG-1".into(),
            site_id: "SITE-1".into(),
            channel: Channel::Whatsapp,
            recipient: "1555".into(),
            subject: None,
            body: "hi".into(),
            from_email: None,
            from_name: None,
            is_html: false,
            image_url: None,
            video_url: None,
            document_url: None,
            file_name: None,
            caption: None,
            whatsapp_session_name: Some(session.to_string()),
        }
    }

    #[tokio::test]
    async fn serializes_sends_within_the_same_session() {
        let concurrent = Arc::new(AtomicU32::new(0));
        let max_concurrent = Arc::new(AtomicU32::new(0));
        let provider = Arc::new(SequencedProvider::new(
            CountingProvider {
                concurrent: concurrent.clone(),
                max_concurrent: max_concurrent.clone(),
            },
            SessionSequencer::new(Duration::from_millis(1)),
        ));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let provider = provider.clone();
            handles.push(tokio::spawn(async move {
                provider.send(&envelope("conv-1")).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }
}
