/// Common dimensions attached to every counter/histogram/gauge emitted by
/// the notification pipeline.
#[derive(Debug, Clone, Default)]
pub struct TelemetryLabels {
    pub site_id: Option<String>,
    pub channel: Option<String>,
    pub message_id: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl TelemetryLabels {
    pub fn site(site_id: impl Into<String>) -> Self {
        Self {
            site_id: Some(site_id.into()),
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn tags(&self) -> Vec<(String, String)> {
        let mut tags = Vec::with_capacity(3 + self.extra.len());
        if let Some(site_id) = &self.site_id {
            tags.push(("site_id".into(), site_id.clone()));
        }
        if let Some(channel) = &self.channel {
            tags.push(("channel".into(), channel.clone()));
        }
        if let Some(message_id) = &self.message_id {
            tags.push(("message_id".into(), message_id.clone()));
        }
        tags.extend(self.extra.iter().cloned());
        tags
    }
}
