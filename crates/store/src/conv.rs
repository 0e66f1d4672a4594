use notify_domain::{Channel, Classification, MessageStatus, StatusSource};

pub fn channel_to_str(c: Channel) -> &'static str {
    match c {
        Channel::Email => "EMAIL",
        Channel::Whatsapp => "WHATSAPP",
    }
}

pub fn channel_from_str(s: &str) -> anyhow::Result<Channel> {
    match s {
        "EMAIL" => Ok(Channel::Email),
        "WHATSAPP" => Ok(Channel::Whatsapp),
        other => anyhow::bail!("unknown channel {other}"),
    }
}

pub fn status_to_str(s: MessageStatus) -> &'static str {
    match s {
        MessageStatus::Pending => "PENDING",
        MessageStatus::Scheduled => "SCHEDULED",
        MessageStatus::Sent => "SENT",
        MessageStatus::Delivered => "DELIVERED",
        MessageStatus::Failed => "FAILED",
        MessageStatus::Bounced => "BOUNCED",
        MessageStatus::Rejected => "REJECTED",
    }
}

pub fn status_from_str(s: &str) -> anyhow::Result<MessageStatus> {
    Ok(match s {
        "PENDING" => MessageStatus::Pending,
        "SCHEDULED" => MessageStatus::Scheduled,
        "SENT" => MessageStatus::Sent,
        "DELIVERED" => MessageStatus::Delivered,
        "FAILED" => MessageStatus::Failed,
        "BOUNCED" => MessageStatus::Bounced,
        "REJECTED" => MessageStatus::Rejected,
        other => anyhow::bail!("unknown status {other}"),
    })
}

pub fn source_to_str(s: StatusSource) -> &'static str {
    match s {
        StatusSource::Api => "API",
        StatusSource::WorkerEmail => "WORKER_EMAIL",
        StatusSource::WorkerWhatsapp => "WORKER_WHATSAPP",
        StatusSource::Retry => "RETRY",
        StatusSource::Scheduler => "SCHEDULER",
    }
}

pub fn classification_to_str(c: Classification) -> &'static str {
    match c {
        Classification::Permanent => "PERMANENT",
        Classification::RateLimit => "RATE_LIMIT",
        Classification::Transient => "TRANSIENT",
    }
}

pub fn classification_from_str(s: &str) -> anyhow::Result<Classification> {
    Ok(match s {
        "PERMANENT" => Classification::Permanent,
        "RATE_LIMIT" => Classification::RateLimit,
        "TRANSIENT" => Classification::Transient,
        other => anyhow::bail!("unknown classification {other}"),
    })
}
