use notify_domain::Classification;

/// The raw outcome of a provider HTTP call, before classification. Only the
/// worker ever sees `response_body` in full; it must not survive past
/// classification into the stored `error_message`.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub http_status: Option<u16>,
    pub response_body: Option<String>,
    pub transport_error: Option<String>,
}

/// Classifies a non-success provider outcome per §4.4: `PERMANENT` on
/// authentication failure or an API-key complaint, `RATE_LIMIT` on 429 or a
/// "too many requests" body, `TRANSIENT` for everything else (network,
/// timeout, 5xx).
pub fn classify(failure: &ProviderFailure) -> Classification {
    if let Some(status) = failure.http_status {
        if status == 401 || status == 403 {
            return Classification::Permanent;
        }
        if status == 429 {
            return Classification::RateLimit;
        }
    }
    if let Some(body) = &failure.response_body {
        let lower = body.to_lowercase();
        if lower.contains("invalid") && lower.contains("key") {
            return Classification::Permanent;
        }
        if lower.contains("too many requests") {
            return Classification::RateLimit;
        }
    }
    Classification::Transient
}

/// Builds the bounded, redacted text stored in `message_logs.error_message`.
/// Never includes the raw response body verbatim — only a short excerpt with
/// provider-issued API keys stripped.
pub fn bounded_redacted_message(failure: &ProviderFailure, context: &str) -> String {
    const MAX_EXCERPT: usize = 256;
    let status_part = failure
        .http_status
        .map(|s| format!("http_status={s}"))
        .unwrap_or_default();
    let excerpt = failure
        .response_body
        .as_deref()
        .map(redact)
        .map(|s| truncate(&s, MAX_EXCERPT))
        .or_else(|| failure.transport_error.clone());

    match (status_part.is_empty(), excerpt) {
        (false, Some(excerpt)) => format!("{context}: {status_part} {excerpt}"),
        (false, None) => format!("{context}: {status_part}"),
        (true, Some(excerpt)) => format!("{context}: {excerpt}"),
        (true, None) => context.to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}... [truncated]", &s[..max])
    }
}

/// Strips anything that looks like a provider-issued API key or bearer token
/// out of a response body before it is allowed anywhere near persisted
/// storage or logs.
fn redact(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    for token in body.split_inclusive(char::is_whitespace) {
        let trimmed = token.trim();
        if looks_like_secret(trimmed) {
            out.push_str("[REDACTED]");
            out.push_str(&token[trimmed.len()..]);
        } else {
            out.push_str(token);
        }
    }
    out
}

fn looks_like_secret(token: &str) -> bool {
    let lower = token.to_lowercase();
    (lower.starts_with("sk-") || lower.starts_with("bearer ") || lower.starts_with("key-"))
        || (token.len() >= 24 && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_permanent() {
        let f = ProviderFailure {
            http_status: Some(401),
            response_body: None,
            transport_error: None,
        };
        assert_eq!(classify(&f), Classification::Permanent);
    }

    #[test]
    fn rate_limited_is_rate_limit() {
        let f = ProviderFailure {
            http_status: Some(429),
            response_body: None,
            transport_error: None,
        };
        assert_eq!(classify(&f), Classification::RateLimit);
    }

    #[test]
    fn body_mentioning_invalid_key_is_permanent() {
        let f = ProviderFailure {
            http_status: Some(400),
            response_body: Some("Invalid API Key provided".into()),
            transport_error: None,
        };
        assert_eq!(classify(&f), Classification::Permanent);
    }

    #[test]
    fn server_error_is_transient() {
        let f = ProviderFailure {
            http_status: Some(503),
            response_body: Some("upstream unavailable".into()),
            transport_error: None,
        };
        assert_eq!(classify(&f), Classification::Transient);
    }

    #[test]
    fn redaction_strips_bearer_like_tokens() {
        let f = ProviderFailure {
            http_status: Some(400),
            response_body: Some("auth failed for key sk-abcdefghijklmnopqrstuvwxyz1234".into()),
            transport_error: None,
        };
        let msg = bounded_redacted_message(&f, "send failed");
        assert!(!msg.contains("sk-abcdefghijklmnopqrstuvwxyz1234"));
        assert!(msg.contains("[REDACTED]"));
    }

    #[test]
    fn long_body_is_bounded() {
        let body = "x".repeat(10 * 1024 * 1024);
        let f = ProviderFailure {
            http_status: Some(500),
            response_body: Some(body),
            transport_error: None,
        };
        let msg = bounded_redacted_message(&f, "send failed");
        assert!(msg.len() < 1024);
    }
}
