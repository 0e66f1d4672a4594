use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use notify_bus::BusClient;
use notify_domain::{Channel, DomainError, MessageFilters, MessageStatus, NewMessage, Site};
use notify_store::MessageStore;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};

use crate::config::GatewayConfig;

#[derive(Clone)]
pub struct GatewayState {
    pub store: MessageStore,
    pub bus: Arc<dyn BusClient>,
    pub config: GatewayConfig,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub error: String,
}

type ApiErrorResponse = (StatusCode, Json<ApiError>);

fn error_response(err: DomainError) -> ApiErrorResponse {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiError {
            code: err.code().to_string(),
            error: err.to_string(),
        }),
    )
}

fn invalid(message: impl Into<String>) -> ApiErrorResponse {
    error_response(DomainError::InvalidInput(message.into()))
}

pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/sites/register", post(register_site))
        .route("/notifications/send", post(send_single))
        .route("/notifications/send/bulk", post(send_bulk))
        .route("/notifications/schedule", post(schedule_single))
        .route("/notifications/schedule/bulk", post(schedule_bulk))
        .route("/messages/logs", get(list_logs))
        .route("/messages/logs/{message_id}", get(get_log))
        .route("/messages/stats", get(get_stats))
        .route("/metrics/site/summary", get(get_stats))
        .route("/metrics/site/daily", get(get_daily_metrics))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(Extension(state))
}

async fn authenticate(
    state: &GatewayState,
    headers: &HeaderMap,
) -> Result<Site, ApiErrorResponse> {
    let raw_key = headers
        .get("x-site-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| error_response(DomainError::Unauthorized))?;

    state
        .store
        .authenticate_site(raw_key)
        .await
        .map_err(error_response)?
        .ok_or_else(|| error_response(DomainError::Unauthorized))
}

// ---- Site registration ------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterSiteRequest {
    site_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterSiteResponse {
    site_id: String,
    api_key: String,
}

async fn register_site(
    Extension(state): Extension<Arc<GatewayState>>,
    Json(payload): Json<RegisterSiteRequest>,
) -> Result<(StatusCode, Json<RegisterSiteResponse>), ApiErrorResponse> {
    if payload.site_name.trim().is_empty() {
        return Err(invalid("site_name is required"));
    }
    let (site_id, api_key) = state
        .store
        .register_site(payload.site_name.trim().to_string())
        .await
        .map_err(error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterSiteResponse { site_id, api_key }),
    ))
}

// ---- Send / schedule ---------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendItem {
    channel: Channel,
    recipient: String,
    subject: Option<String>,
    body: Option<String>,
    #[serde(default)]
    is_html: bool,
    from_email: Option<String>,
    from_name: Option<String>,
    image_url: Option<String>,
    video_url: Option<String>,
    document_url: Option<String>,
    file_name: Option<String>,
    caption: Option<String>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
    scheduled_at: Option<String>,
    whatsapp_session_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    message_id: String,
    status: MessageStatus,
}

#[derive(Debug, Deserialize)]
struct BulkRequest {
    items: Vec<SendItem>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BulkResult {
    Ok {
        #[serde(rename = "messageId")]
        message_id: String,
        status: MessageStatus,
    },
    Err {
        error: String,
    },
}

#[derive(Debug, Serialize)]
struct BulkResponse {
    results: Vec<BulkResult>,
}

/// Strips control characters from a raw recipient/session string (spec §4.3
/// "recipients are normalized").
fn normalize_recipient(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_control()).collect::<String>().trim().to_string()
}

fn parse_scheduled_at(raw: &str) -> Result<OffsetDateTime, ApiErrorResponse> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|_| invalid("scheduledAt must be RFC3339"))
}

fn build_new_message(site_id: &str, item: SendItem) -> Result<NewMessage, String> {
    let recipient = normalize_recipient(&item.recipient);
    if recipient.is_empty() {
        return Err("recipient is required".into());
    }

    match item.channel {
        Channel::Email => {
            let subject = item.subject.clone().filter(|s| !s.trim().is_empty());
            let body = item.body.clone().filter(|s| !s.trim().is_empty());
            if subject.is_none() || body.is_none() {
                return Err("email requires subject and body".into());
            }
        }
        Channel::Whatsapp => {
            let has_content = item.body.as_deref().is_some_and(|s| !s.trim().is_empty())
                || item.image_url.is_some()
                || item.video_url.is_some()
                || item.document_url.is_some();
            if !has_content {
                return Err(
                    "whatsapp requires at least one of body, imageUrl, videoUrl, documentUrl".into(),
                );
            }
        }
    }

    let scheduled_at = match item.scheduled_at {
        Some(raw) => Some(
            OffsetDateTime::parse(&raw, &Rfc3339)
                .map_err(|_| "scheduledAt must be RFC3339".to_string())?,
        ),
        None => None,
    };

    Ok(NewMessage {
        site_id: site_id.to_string(),
        channel: item.channel,
        recipient,
        subject: item.subject,
        body: item.body.unwrap_or_default(),
        from_email: item.from_email,
        from_name: item.from_name,
        is_html: item.is_html,
        image_url: item.image_url,
        video_url: item.video_url,
        document_url: item.document_url,
        file_name: item.file_name,
        caption: item.caption,
        metadata: item.metadata,
        scheduled_at,
        whatsapp_session_name: item.whatsapp_session_name,
    })
}

async fn submit_one(
    state: &GatewayState,
    site: &Site,
    item: SendItem,
) -> Result<SendResponse, String> {
    let new_message = build_new_message(&site.site_id, item)?;
    let channel = new_message.channel;
    let (message_id, status) = state
        .store
        .create_message(new_message)
        .await
        .map_err(|e| e.to_string())?;

    if status == MessageStatus::Pending {
        // The just-persisted row is the source of truth for what gets
        // published, not the raw request body.
        let stored = state
            .store
            .get_message(&message_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("message {message_id} vanished after create"))?;
        let envelope = notify_domain::MessageEnvelope {
            message_id: stored.message_id,
            site_id: stored.site_id,
            channel: stored.channel,
            recipient: stored.recipient,
            subject: stored.subject,
            body: stored.body,
            from_email: stored.from_email,
            from_name: stored.from_name,
            is_html: stored.is_html,
            image_url: stored.image_url,
            video_url: stored.video_url,
            document_url: stored.document_url,
            file_name: stored.file_name,
            caption: stored.caption,
            whatsapp_session_name: stored.whatsapp_session_name,
        };

        if state
            .bus
            .publish_envelope(channel.bus_subject(), &envelope)
            .await
            .is_err()
        {
            // Persist-then-publish: a publish failure leaves the row PENDING
            // for the Retry & Scheduler Loop to pick up (spec §4.3).
            tracing::warn!(message_id = %message_id, "publish failed after persist, leaving PENDING for retry loop");
        }
    }

    Ok(SendResponse { message_id, status })
}

async fn send_single(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(payload): Json<SendItem>,
) -> Result<(StatusCode, Json<SendResponse>), ApiErrorResponse> {
    let site = authenticate(&state, &headers).await?;
    let response = submit_one(&state, &site, payload).await.map_err(invalid)?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn schedule_single(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(payload): Json<SendItem>,
) -> Result<(StatusCode, Json<SendResponse>), ApiErrorResponse> {
    let site = authenticate(&state, &headers).await?;
    match &payload.scheduled_at {
        None => return Err(invalid("scheduledAt is required for /notifications/schedule")),
        Some(raw) => {
            parse_scheduled_at(raw)?;
        }
    }
    let response = submit_one(&state, &site, payload).await.map_err(invalid)?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn bulk_submit(
    state: &Arc<GatewayState>,
    site: &Site,
    items: Vec<SendItem>,
) -> Result<Json<BulkResponse>, ApiErrorResponse> {
    if items.is_empty() {
        return Err(invalid("items must be non-empty"));
    }
    if items.len() > state.config.max_bulk_items {
        return Err(invalid(format!(
            "items exceeds the batch ceiling of {}",
            state.config.max_bulk_items
        )));
    }

    let mut results = Vec::with_capacity(items.len());
    for item in items {
        match submit_one(state, site, item).await {
            Ok(r) => results.push(BulkResult::Ok {
                message_id: r.message_id,
                status: r.status,
            }),
            Err(e) => results.push(BulkResult::Err { error: e }),
        }
    }
    Ok(Json(BulkResponse { results }))
}

async fn send_bulk(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(payload): Json<BulkRequest>,
) -> Result<(StatusCode, Json<BulkResponse>), ApiErrorResponse> {
    let site = authenticate(&state, &headers).await?;
    let body = bulk_submit(&state, &site, payload.items).await?;
    Ok((StatusCode::MULTI_STATUS, body))
}

async fn schedule_bulk(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(payload): Json<BulkRequest>,
) -> Result<(StatusCode, Json<BulkResponse>), ApiErrorResponse> {
    let site = authenticate(&state, &headers).await?;
    for item in &payload.items {
        if item.scheduled_at.is_none() {
            return Err(invalid("every item requires scheduledAt for the schedule/bulk endpoint"));
        }
    }
    let body = bulk_submit(&state, &site, payload.items).await?;
    Ok((StatusCode::MULTI_STATUS, body))
}

// ---- Query endpoints ----------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct ListLogsQuery {
    status: Option<MessageStatus>,
    channel: Option<Channel>,
    #[serde(default)]
    page: u32,
    #[serde(default)]
    page_size: u32,
}

#[derive(Debug, Serialize)]
struct ListLogsResponse {
    messages: Vec<notify_domain::MessageLog>,
    total: u64,
}

async fn list_logs(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(query): Query<ListLogsQuery>,
) -> Result<Json<ListLogsResponse>, ApiErrorResponse> {
    let site = authenticate(&state, &headers).await?;
    let filters = MessageFilters {
        status: query.status,
        channel: query.channel,
        from: None,
        to: None,
        page: if query.page == 0 { 1 } else { query.page },
        page_size: if query.page_size == 0 { 50 } else { query.page_size },
    };
    let (messages, total) = state
        .store
        .list_messages(&site.site_id, filters)
        .await
        .map_err(error_response)?;
    Ok(Json(ListLogsResponse { messages, total }))
}

async fn get_log(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(message_id): Path<String>,
) -> Result<Json<notify_domain::MessageLog>, ApiErrorResponse> {
    let site = authenticate(&state, &headers).await?;
    let message = state
        .store
        .get_message(&message_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| error_response(DomainError::NotFound(message_id.clone())))?;
    if message.site_id != site.site_id {
        return Err(error_response(DomainError::NotFound(message_id)));
    }
    Ok(Json(message))
}

async fn get_stats(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Json<notify_domain::SiteStats>, ApiErrorResponse> {
    let site = authenticate(&state, &headers).await?;
    let stats = state
        .store
        .stats_for_site(&site.site_id)
        .await
        .map_err(error_response)?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
struct DailyMetricsQuery {
    from: String,
    to: String,
}

async fn get_daily_metrics(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(query): Query<DailyMetricsQuery>,
) -> Result<Json<Vec<notify_domain::SiteMetricsDaily>>, ApiErrorResponse> {
    let site = authenticate(&state, &headers).await?;
    let from = Date::parse(&query.from, &time::format_description::well_known::Iso8601::DATE)
        .map_err(|_| invalid("from must be an ISO-8601 date"))?;
    let to = Date::parse(&query.to, &time::format_description::well_known::Iso8601::DATE)
        .map_err(|_| invalid("to must be an ISO-8601 date"))?;
    let metrics = state
        .store
        .daily_metrics(&site.site_id, from, to)
        .await
        .map_err(error_response)?;
    Ok(Json(metrics))
}
